use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::conversation::conversation_path;
use super::{insert_opt, list_items, one_of, ExecutionContext, OperationOutput};
use crate::params::Params;
use crate::transport::Transport;

const MESSAGE_TYPES: &[&str] = &["outgoing", "incoming"];
const CONTENT_TYPES: &[&str] = &[
    "text",
    "input_text",
    "input_textarea",
    "input_email",
    "input_select",
    "cards",
    "form",
    "article",
];
const DEFAULT_LIMIT: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageOperation {
    Send,
    GetAll,
}

pub async fn execute(
    op: MessageOperation,
    ctx: &ExecutionContext<'_>,
    params: &Params,
) -> Result<OperationOutput> {
    let account_id = ctx.account_id(params)?;
    let conversation_id = params.id("conversationId")?;
    let messages_path = format!("{}/messages", conversation_path(&account_id, &conversation_id));

    match op {
        MessageOperation::Send => {
            let mut body = Map::new();
            body.insert("content".to_string(), params.str("content")?.into());
            let message_type = params
                .opt_str("messageType")
                .unwrap_or_else(|| "outgoing".to_string());
            body.insert(
                "message_type".to_string(),
                one_of("messageType", message_type, MESSAGE_TYPES)?.into(),
            );
            body.insert("private".to_string(), params.bool("private", false).into());
            if let Some(content_type) = params.opt_str("contentType") {
                body.insert(
                    "content_type".to_string(),
                    one_of("contentType", content_type, CONTENT_TYPES)?.into(),
                );
            }
            insert_opt(
                &mut body,
                "content_attributes",
                params.opt_object("contentAttributes")?.map(Value::Object),
            );

            let message = ctx
                .transport
                .post(&messages_path, Value::Object(body))
                .await
                .with_context(|| {
                    format!("Failed to send message to conversation {}", conversation_id)
                })?;
            Ok(OperationOutput::one(message))
        }
        MessageOperation::GetAll => {
            let limit = if params.bool("returnAll", false) {
                None
            } else {
                Some(params.u64_or("limit", DEFAULT_LIMIT)? as usize)
            };
            let mut records = fetch_messages(ctx.transport, &messages_path, limit)
                .await
                .with_context(|| {
                    format!("Failed to list messages of conversation {}", conversation_id)
                })?;
            if let Some(limit) = limit {
                records.truncate(limit);
            }
            Ok(OperationOutput {
                records,
                hints: Vec::new(),
            })
        }
    }
}

/// Walks the message history backwards with a `before` cursor taken from the
/// last message of the previous page.
///
/// An empty page always ends the walk. With a `limit`, the walk also ends
/// once more than `limit` messages have been collected. The last page is
/// kept whole; callers cut the result down to `limit`.
pub async fn fetch_messages(
    transport: &dyn Transport,
    path: &str,
    limit: Option<usize>,
) -> Result<Vec<Value>> {
    let mut messages: Vec<Value> = Vec::new();
    let mut before: Option<String> = None;

    loop {
        let query: Vec<(String, String)> = before
            .iter()
            .map(|id| ("before".to_string(), id.clone()))
            .collect();
        let page = list_items(transport.get(path, &query).await?);
        if page.is_empty() {
            break;
        }

        before = page.last().and_then(|m| m.get("id")).map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        messages.extend(page);
        tracing::debug!("Fetched {} messages from {}", messages.len(), path);

        match limit {
            Some(limit) if messages.len() > limit => break,
            _ => {}
        }
        // A page without ids cannot be continued.
        if before.is_none() {
            break;
        }
    }

    Ok(messages)
}
