use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::custom_attribute::merge_custom_attributes;
use super::{insert_opt, list_items, numeric_id, success_record, unwrap_payload};
use super::{ExecutionContext, OperationOutput};
use crate::error::NodeError;
use crate::params::{push_query, Params};
use crate::transport::account_path;
use crate::validation::{validate_email, validate_phone_number};

const DEFAULT_LIMIT: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContactOperation {
    Create,
    Get,
    Update,
    Delete,
    GetAll,
    Search,
    SetCustomAttributes,
    RemoveCustomAttributes,
}

pub async fn execute(
    op: ContactOperation,
    ctx: &ExecutionContext<'_>,
    params: &Params,
) -> Result<OperationOutput> {
    let account_id = ctx.account_id(params)?;
    match op {
        ContactOperation::Create => create(ctx, &account_id, params).await,
        ContactOperation::Get => {
            let contact_id = params.id("contactId")?;
            let contact = ctx
                .transport
                .get(&contact_path(&account_id, &contact_id), &[])
                .await
                .with_context(|| format!("Failed to fetch contact {}", contact_id))?;
            Ok(OperationOutput::one(unwrap_payload(contact)))
        }
        ContactOperation::Update => {
            let contact_id = params.id("contactId")?;
            let body = contact_fields(params)?;
            if body.is_empty() {
                return Err(NodeError::configuration("Contact update has no fields to change").into());
            }
            let contact = ctx
                .transport
                .put(&contact_path(&account_id, &contact_id), Value::Object(body))
                .await
                .with_context(|| format!("Failed to update contact {}", contact_id))?;
            Ok(OperationOutput::one(unwrap_payload(contact)))
        }
        ContactOperation::Delete => {
            let contact_id = params.id("contactId")?;
            ctx.transport
                .delete(&contact_path(&account_id, &contact_id))
                .await
                .with_context(|| format!("Failed to delete contact {}", contact_id))?;
            Ok(OperationOutput::one(success_record()))
        }
        ContactOperation::GetAll => get_all(ctx, &account_id, params).await,
        ContactOperation::Search => {
            let mut query = vec![("q".to_string(), params.str("query")?)];
            push_query(&mut query, "page", Some(params.u64_or("page", 1)?));
            push_query(&mut query, "sort", params.opt_str("sort"));
            let response = ctx
                .transport
                .get(&account_path(&account_id, "contacts/search"), &query)
                .await
                .context("Failed to search contacts")?;
            Ok(OperationOutput {
                records: list_items(response),
                hints: Vec::new(),
            })
        }
        ContactOperation::SetCustomAttributes => {
            let contact_id = params.id("contactId")?;
            let updates = params.opt_object("customAttributes")?.ok_or_else(|| {
                NodeError::configuration("Parameter 'customAttributes' is required")
            })?;
            let path = contact_path(&account_id, &contact_id);

            let current = ctx
                .transport
                .get(&path, &[])
                .await
                .with_context(|| format!("Failed to fetch contact {}", contact_id))?;
            let merged = merge_custom_attributes(&unwrap_payload(current), updates);

            let contact = ctx
                .transport
                .put(&path, json!({ "custom_attributes": merged }))
                .await
                .with_context(|| format!("Failed to update contact {} attributes", contact_id))?;
            Ok(OperationOutput::one(unwrap_payload(contact)))
        }
        ContactOperation::RemoveCustomAttributes => {
            let contact_id = params.id("contactId")?;
            let keys = params.string_list("attributeKeys")?;
            if keys.is_empty() {
                return Err(NodeError::configuration("Parameter 'attributeKeys' is required").into());
            }
            let contact = ctx
                .transport
                .post(
                    &format!(
                        "{}/destroy_custom_attributes",
                        contact_path(&account_id, &contact_id)
                    ),
                    json!({ "custom_attributes": keys }),
                )
                .await
                .with_context(|| format!("Failed to remove contact {} attributes", contact_id))?;
            Ok(OperationOutput::one(unwrap_payload(contact)))
        }
    }
}

fn contact_path(account_id: &str, contact_id: &str) -> String {
    account_path(account_id, &format!("contacts/{}", contact_id))
}

/// Optional contact fields shared by create and update, validated before
/// anything is sent.
fn contact_fields(params: &Params) -> Result<Map<String, Value>> {
    let mut body = Map::new();
    insert_opt(&mut body, "name", params.opt_str("name"));
    if let Some(email) = params.opt_str("email") {
        validate_email(&email)?;
        body.insert("email".to_string(), email.into());
    }
    if let Some(phone) = params.opt_str("phoneNumber") {
        validate_phone_number(&phone)?;
        body.insert("phone_number".to_string(), phone.into());
    }
    insert_opt(&mut body, "identifier", params.opt_str("identifier"));
    insert_opt(&mut body, "avatar_url", params.opt_str("avatarUrl"));
    insert_opt(
        &mut body,
        "custom_attributes",
        params.opt_object("customAttributes")?.map(Value::Object),
    );
    Ok(body)
}

async fn create(ctx: &ExecutionContext<'_>, account_id: &str, params: &Params) -> Result<OperationOutput> {
    let inbox_id = params.id("inboxId")?;
    let mut body = contact_fields(params)?;
    body.insert(
        "inbox_id".to_string(),
        numeric_id("inboxId", &inbox_id)?.into(),
    );
    let missing_key = !body.contains_key("email") && !body.contains_key("identifier");

    let response = ctx
        .transport
        .post(&account_path(account_id, "contacts"), Value::Object(body))
        .await
        .context("Failed to create contact")?;

    // Create answers {"payload": {"contact": {...}, "contact_inbox": {...}}}.
    let contact = match unwrap_payload(response) {
        Value::Object(mut payload) if payload.contains_key("contact") => {
            payload.remove("contact").unwrap_or(Value::Null)
        }
        other => other,
    };

    let mut output = OperationOutput::one(contact);
    if missing_key {
        output = output.with_hint(
            "Contact was created without an email or identifier; Chatwoot cannot match it to \
             existing contacts, so repeated runs may create duplicates",
        );
    }
    Ok(output)
}

/// Page-number paging: `returnAll` reads until an empty page, otherwise the
/// result is cut to `limit`.
async fn get_all(ctx: &ExecutionContext<'_>, account_id: &str, params: &Params) -> Result<OperationOutput> {
    let return_all = params.bool("returnAll", false);
    let limit = params.u64_or("limit", DEFAULT_LIMIT)? as usize;
    let sort = params.opt_str("sort");
    let path = account_path(account_id, "contacts");

    let mut records = Vec::new();
    let mut page = 1u64;
    loop {
        let mut query = vec![("page".to_string(), page.to_string())];
        push_query(&mut query, "sort", sort.as_ref());
        let response = ctx
            .transport
            .get(&path, &query)
            .await
            .with_context(|| format!("Failed to list contacts (page {})", page))?;

        let items = list_items(response);
        if items.is_empty() {
            break;
        }
        records.extend(items);
        if !return_all && records.len() >= limit {
            break;
        }
        page += 1;
    }

    if !return_all {
        records.truncate(limit);
    }
    Ok(OperationOutput {
        records,
        hints: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;
    use crate::testing::{context, fast_polling, FakeTransport};
    use crate::transport::Method;

    const CONTACTS: &str = "/api/v1/accounts/1/contacts";

    fn created_response() -> Value {
        json!({"payload": {"contact": {"id": 31, "name": "Jo"}, "contact_inbox": {"source_id": "abc"}}})
    }

    #[tokio::test]
    async fn test_create_with_phone_only_warns() {
        let transport = FakeTransport::new();
        transport.on(Method::POST, CONTACTS, created_response());
        let polling = fast_polling();
        let params = Params::from_value(json!({
            "inboxId": {"mode": "list", "value": "4"},
            "name": "Jo",
            "phoneNumber": "+5511999999999"
        }))
        .unwrap();

        let output = execute(ContactOperation::Create, &context(&transport, &polling), &params)
            .await
            .unwrap();

        assert_eq!(output.records, vec![json!({"id": 31, "name": "Jo"})]);
        assert_eq!(output.hints.len(), 1);
        assert!(output.hints[0].contains("without an email or identifier"));
        assert_eq!(
            transport.calls()[0].body,
            Some(json!({"inbox_id": 4, "name": "Jo", "phone_number": "+5511999999999"}))
        );
    }

    #[tokio::test]
    async fn test_create_with_email_has_no_hint() {
        let transport = FakeTransport::new();
        transport.on(Method::POST, CONTACTS, created_response());
        let polling = fast_polling();
        let params = Params::from_value(json!({"inboxId": 4, "email": "jo@example.com"})).unwrap();

        let output = execute(ContactOperation::Create, &context(&transport, &polling), &params)
            .await
            .unwrap();
        assert!(output.hints.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_phone_without_plus() {
        let transport = FakeTransport::new();
        let polling = fast_polling();
        let params = Params::from_value(json!({"inboxId": 4, "phoneNumber": "5511999999999"})).unwrap();

        let err = execute(ContactOperation::Create, &context(&transport, &polling), &params)
            .await
            .unwrap_err();

        assert!(matches!(classify(&err), Some(NodeError::Validation(_))));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_without_fields_fails() {
        let transport = FakeTransport::new();
        let polling = fast_polling();
        let params = Params::from_value(json!({"contactId": 31})).unwrap();

        let err = execute(ContactOperation::Update, &context(&transport, &polling), &params)
            .await
            .unwrap_err();
        assert!(matches!(classify(&err), Some(NodeError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_get_all_truncates_to_limit() {
        let transport = FakeTransport::new();
        let page: Vec<Value> = (1..=15).map(|id| json!({"id": id})).collect();
        transport.on(Method::GET, CONTACTS, json!({"payload": page}));
        let polling = fast_polling();
        let params = Params::from_value(json!({"limit": 20})).unwrap();

        let output = execute(ContactOperation::GetAll, &context(&transport, &polling), &params)
            .await
            .unwrap();

        assert_eq!(output.records.len(), 20);
        let calls = transport.calls_to(Method::GET, CONTACTS);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].query_value("page"), Some("2"));
    }

    #[tokio::test]
    async fn test_get_all_return_all_stops_on_empty_page() {
        let transport = FakeTransport::new();
        transport
            .on(Method::GET, CONTACTS, json!({"payload": [{"id": 1}, {"id": 2}]}))
            .on(Method::GET, CONTACTS, json!({"payload": [{"id": 3}]}))
            .on(Method::GET, CONTACTS, json!({"payload": []}));
        let polling = fast_polling();
        let params = Params::from_value(json!({"returnAll": true})).unwrap();

        let output = execute(ContactOperation::GetAll, &context(&transport, &polling), &params)
            .await
            .unwrap();

        assert_eq!(output.records.len(), 3);
        assert_eq!(transport.calls_to(Method::GET, CONTACTS).len(), 3);
    }

    #[tokio::test]
    async fn test_set_custom_attributes_merges_current() {
        let transport = FakeTransport::new();
        let path = "/api/v1/accounts/1/contacts/31";
        transport.on(
            Method::GET,
            path,
            json!({"payload": {"id": 31, "custom_attributes": {"plan": "free", "seats": 2}}}),
        );
        transport.on(Method::PUT, path, json!({"payload": {"id": 31}}));
        let polling = fast_polling();
        let params = Params::from_value(json!({
            "contactId": 31,
            "customAttributes": {"plan": "pro"}
        }))
        .unwrap();

        execute(ContactOperation::SetCustomAttributes, &context(&transport, &polling), &params)
            .await
            .unwrap();

        let put = &transport.calls_to(Method::PUT, path)[0];
        assert_eq!(
            put.body,
            Some(json!({"custom_attributes": {"plan": "pro", "seats": 2}}))
        );
    }

    #[tokio::test]
    async fn test_search_sends_query() {
        let transport = FakeTransport::new();
        transport.on(
            Method::GET,
            "/api/v1/accounts/1/contacts/search",
            json!({"payload": [{"id": 1}]}),
        );
        let polling = fast_polling();
        let params = Params::from_value(json!({"query": "jo"})).unwrap();

        let output = execute(ContactOperation::Search, &context(&transport, &polling), &params)
            .await
            .unwrap();

        assert_eq!(output.records.len(), 1);
        let call = &transport.calls()[0];
        assert_eq!(call.query_value("q"), Some("jo"));
        assert_eq!(call.query_value("page"), Some("1"));
    }
}
