use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{insert_opt, list_items, one_of, success_record, ExecutionContext, OperationOutput};
use crate::error::NodeError;
use crate::params::Params;
use crate::transport::account_path;

const TARGETS: &[&str] = &["conversation", "contact"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LabelOperation {
    GetAll,
    Create,
    Delete,
    /// Adds labels to a conversation or contact, keeping the ones it has.
    Add,
    /// Removes labels from a conversation or contact.
    Remove,
    /// Replaces the whole label set of a conversation or contact.
    Update,
}

pub async fn execute(
    op: LabelOperation,
    ctx: &ExecutionContext<'_>,
    params: &Params,
) -> Result<OperationOutput> {
    let account_id = ctx.account_id(params)?;
    match op {
        LabelOperation::GetAll => {
            let response = ctx
                .transport
                .get(&account_path(&account_id, "labels"), &[])
                .await
                .context("Failed to list labels")?;
            Ok(OperationOutput {
                records: list_items(response),
                hints: Vec::new(),
            })
        }
        LabelOperation::Create => {
            let mut body = Map::new();
            body.insert("title".to_string(), params.str("title")?.into());
            insert_opt(&mut body, "description", params.opt_str("description"));
            insert_opt(&mut body, "color", params.opt_str("color"));
            body.insert(
                "show_on_sidebar".to_string(),
                params.bool("showOnSidebar", true).into(),
            );
            let label = ctx
                .transport
                .post(&account_path(&account_id, "labels"), Value::Object(body))
                .await
                .context("Failed to create label")?;
            Ok(OperationOutput::one(label))
        }
        LabelOperation::Delete => {
            let label_id = params.id("labelId")?;
            ctx.transport
                .delete(&account_path(&account_id, &format!("labels/{}", label_id)))
                .await
                .with_context(|| format!("Failed to delete label {}", label_id))?;
            Ok(OperationOutput::one(success_record()))
        }
        LabelOperation::Add | LabelOperation::Remove | LabelOperation::Update => {
            let target = params
                .opt_str("target")
                .unwrap_or_else(|| "conversation".to_string());
            let target = one_of("target", target, TARGETS)?;
            let target_id = params.id(&format!("{}Id", target))?;
            let labels = params.string_list("labels")?;
            if labels.is_empty() && op != LabelOperation::Update {
                return Err(NodeError::configuration("Parameter 'labels' is required").into());
            }

            let path = account_path(&account_id, &format!("{}s/{}/labels", target, target_id));
            let next = if op == LabelOperation::Update {
                dedup(labels)
            } else {
                let current = ctx
                    .transport
                    .get(&path, &[])
                    .await
                    .with_context(|| format!("Failed to read labels of {} {}", target, target_id))?;
                let current = label_names(current);
                if op == LabelOperation::Add {
                    union(&current, &labels)
                } else {
                    difference(&current, &labels)
                }
            };

            let response = ctx
                .transport
                .post(&path, json!({ "labels": &next }))
                .await
                .with_context(|| format!("Failed to write labels of {} {}", target, target_id))?;
            let written = match label_names(response) {
                names if names.is_empty() => next,
                names => names,
            };
            Ok(OperationOutput::one(json!({
                "id": target_id,
                "target": target,
                "labels": written,
            })))
        }
    }
}

fn label_names(response: Value) -> Vec<String> {
    list_items(response)
        .into_iter()
        .filter_map(|label| match label {
            Value::String(name) => Some(name),
            Value::Object(mut map) => match map.remove("title") {
                Some(Value::String(title)) => Some(title),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// `current` followed by the new entries of `added`, without duplicates.
pub fn union(current: &[String], added: &[String]) -> Vec<String> {
    let mut out = dedup(current.to_vec());
    for label in added {
        if !out.contains(label) {
            out.push(label.clone());
        }
    }
    out
}

/// `current` minus every entry of `removed`, order kept.
pub fn difference(current: &[String], removed: &[String]) -> Vec<String> {
    dedup(
        current
            .iter()
            .filter(|label| !removed.contains(label))
            .cloned()
            .collect(),
    )
}

fn dedup(labels: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        if !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, fast_polling, FakeTransport};
    use crate::transport::Method;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_union_appends_new_labels() {
        assert_eq!(
            union(&strings(&["b", "c"]), &strings(&["a", "b"])),
            strings(&["b", "c", "a"])
        );
    }

    #[test]
    fn test_difference_keeps_order() {
        assert_eq!(
            difference(&strings(&["a", "b", "c"]), &strings(&["b"])),
            strings(&["a", "c"])
        );
        assert_eq!(difference(&strings(&["a"]), &strings(&["z"])), strings(&["a"]));
    }

    #[tokio::test]
    async fn test_add_writes_union_to_conversation() {
        let transport = FakeTransport::new();
        let path = "/api/v1/accounts/1/conversations/77/labels";
        transport.on(Method::GET, path, json!({"payload": ["b", "c"]}));
        transport.on(Method::POST, path, json!({"payload": ["b", "c", "a"]}));
        let polling = fast_polling();
        let params = Params::from_value(json!({"conversationId": 77, "labels": ["a", "b"]})).unwrap();

        let output = execute(LabelOperation::Add, &context(&transport, &polling), &params)
            .await
            .unwrap();

        let post = &transport.calls_to(Method::POST, path)[0];
        assert_eq!(post.body, Some(json!({"labels": ["b", "c", "a"]})));
        let mut written: Vec<String> = serde_json::from_value(output.records[0]["labels"].clone()).unwrap();
        written.sort();
        assert_eq!(written, strings(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_remove_from_contact() {
        let transport = FakeTransport::new();
        let path = "/api/v1/accounts/1/contacts/31/labels";
        transport.on(Method::GET, path, json!({"payload": ["a", "b", "c"]}));
        transport.on(Method::POST, path, json!({"payload": ["a", "c"]}));
        let polling = fast_polling();
        let params = Params::from_value(json!({
            "target": "contact",
            "contactId": 31,
            "labels": "b"
        }))
        .unwrap();

        execute(LabelOperation::Remove, &context(&transport, &polling), &params)
            .await
            .unwrap();

        let post = &transport.calls_to(Method::POST, path)[0];
        assert_eq!(post.body, Some(json!({"labels": ["a", "c"]})));
    }

    #[tokio::test]
    async fn test_update_replaces_without_reading() {
        let transport = FakeTransport::new();
        let path = "/api/v1/accounts/1/conversations/77/labels";
        transport.on(Method::POST, path, json!({"payload": ["x"]}));
        let polling = fast_polling();
        let params = Params::from_value(json!({"conversationId": 77, "labels": ["x", "x"]})).unwrap();

        execute(LabelOperation::Update, &context(&transport, &polling), &params)
            .await
            .unwrap();

        assert!(transport.calls_to(Method::GET, path).is_empty());
        assert_eq!(transport.calls()[0].body, Some(json!({"labels": ["x"]})));
    }

    #[tokio::test]
    async fn test_add_requires_labels() {
        let transport = FakeTransport::new();
        let polling = fast_polling();
        let params = Params::from_value(json!({"conversationId": 77})).unwrap();

        assert!(execute(LabelOperation::Add, &context(&transport, &polling), &params)
            .await
            .is_err());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_defaults_sidebar() {
        let transport = FakeTransport::new();
        transport.on(Method::POST, "/api/v1/accounts/1/labels", json!({"id": 3, "title": "vip"}));
        let polling = fast_polling();
        let params = Params::from_value(json!({"title": "vip", "color": "#ff0000"})).unwrap();

        execute(LabelOperation::Create, &context(&transport, &polling), &params)
            .await
            .unwrap();
        assert_eq!(
            transport.calls()[0].body,
            Some(json!({"title": "vip", "color": "#ff0000", "show_on_sidebar": true}))
        );
    }
}
