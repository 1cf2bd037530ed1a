use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{insert_opt, one_of, success_record, ExecutionContext, OperationOutput};
use crate::params::Params;
use crate::transport::account_path;

const DISPLAY_TYPES: &[&str] = &[
    "text", "number", "currency", "percent", "link", "date", "list", "checkbox",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CustomAttributeOperation {
    GetAll,
    Create,
    Delete,
}

/// Chatwoot's numeric `attribute_model`: conversation attributes are 0,
/// contact attributes are 1.
fn attribute_model(params: &Params) -> Result<u8> {
    let model = params
        .opt_str("attributeModel")
        .unwrap_or_else(|| "conversation".to_string());
    Ok(
        match one_of("attributeModel", model, &["conversation", "contact"])?.as_str() {
            "contact" => 1,
            _ => 0,
        },
    )
}

pub async fn execute(
    op: CustomAttributeOperation,
    ctx: &ExecutionContext<'_>,
    params: &Params,
) -> Result<OperationOutput> {
    let account_id = ctx.account_id(params)?;
    match op {
        CustomAttributeOperation::GetAll => {
            let model = attribute_model(params)?;
            let query = vec![("attribute_model".to_string(), model.to_string())];
            let definitions = ctx
                .transport
                .get(&account_path(&account_id, "custom_attribute_definitions"), &query)
                .await
                .context("Failed to list custom attribute definitions")?;
            Ok(OperationOutput::many(definitions))
        }
        CustomAttributeOperation::Create => {
            let display_type = params
                .opt_str("displayType")
                .unwrap_or_else(|| "text".to_string());
            let display_type = one_of("displayType", display_type, DISPLAY_TYPES)?;

            let mut body = Map::new();
            body.insert(
                "attribute_display_name".to_string(),
                params.str("displayName")?.into(),
            );
            body.insert("attribute_key".to_string(), params.str("key")?.into());
            body.insert("attribute_model".to_string(), attribute_model(params)?.into());
            insert_opt(&mut body, "attribute_description", params.opt_str("description"));
            if display_type == "list" {
                body.insert(
                    "attribute_values".to_string(),
                    params.string_list("listValues")?.into(),
                );
            }
            body.insert("attribute_display_type".to_string(), display_type.into());

            let definition = ctx
                .transport
                .post(
                    &account_path(&account_id, "custom_attribute_definitions"),
                    Value::Object(body),
                )
                .await
                .context("Failed to create custom attribute definition")?;
            Ok(OperationOutput::one(definition))
        }
        CustomAttributeOperation::Delete => {
            let definition_id = params.id("definitionId")?;
            ctx.transport
                .delete(&account_path(
                    &account_id,
                    &format!("custom_attribute_definitions/{}", definition_id),
                ))
                .await
                .with_context(|| {
                    format!("Failed to delete custom attribute definition {}", definition_id)
                })?;
            Ok(OperationOutput::one(success_record()))
        }
    }
}

/// Overlays `updates` on the resource's current `custom_attributes`.
/// Keys absent from `updates` keep their current value.
pub fn merge_custom_attributes(resource: &Value, updates: Map<String, Value>) -> Map<String, Value> {
    let mut merged = resource
        .get("custom_attributes")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    merged.extend(updates);
    merged
}
