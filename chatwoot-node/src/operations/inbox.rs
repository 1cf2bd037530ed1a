use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{list_items, ExecutionContext, OperationOutput};
use crate::error::NodeError;
use crate::params::Params;
use crate::transport::account_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InboxOperation {
    GetAll,
    Get,
    /// Pair a WhatsApp channel by QR code.
    GetQrCode,
}

pub async fn execute(
    op: InboxOperation,
    ctx: &ExecutionContext<'_>,
    params: &Params,
) -> Result<OperationOutput> {
    let account_id = ctx.account_id(params)?;
    match op {
        InboxOperation::GetAll => {
            let response = ctx
                .transport
                .get(&account_path(&account_id, "inboxes"), &[])
                .await
                .context("Failed to list inboxes")?;
            Ok(OperationOutput {
                records: list_items(response),
                hints: Vec::new(),
            })
        }
        InboxOperation::Get => {
            let inbox_id = params.id("inboxId")?;
            let inbox = ctx
                .transport
                .get(&account_path(&account_id, &format!("inboxes/{}", inbox_id)), &[])
                .await
                .with_context(|| format!("Failed to fetch inbox {}", inbox_id))?;
            Ok(OperationOutput::one(inbox))
        }
        InboxOperation::GetQrCode => {
            let inbox_id = params.id("inboxId")?;
            let record = fetch_qr_code(ctx, &account_id, &inbox_id).await?;
            Ok(OperationOutput::one(record))
        }
    }
}

fn connection_state(inbox: &Value) -> Option<&str> {
    inbox
        .pointer("/provider_connection/connection")
        .and_then(Value::as_str)
}

fn is_connected(state: Option<&str>) -> bool {
    matches!(state, Some("open") | Some("connected"))
}

fn qr_payload(inbox: &Value) -> Option<&str> {
    inbox
        .pointer("/provider_connection/qr_data_url")
        .and_then(Value::as_str)
        .filter(|qr| !qr.is_empty())
}

fn connected_record(inbox_id: &str, state: Option<&str>) -> Value {
    json!({
        "inbox_id": inbox_id,
        "status": "connected",
        "connection": state,
        "message": "Inbox is already connected",
    })
}

/// Starts channel setup and polls the inbox until the provider publishes a QR
/// code or reports the channel as connected.
///
/// States `connecting` and `reconnecting` keep the poll going; the attempt
/// budget and interval come from [`crate::config::PollingConfig`].
async fn fetch_qr_code(ctx: &ExecutionContext<'_>, account_id: &str, inbox_id: &str) -> Result<Value> {
    let inbox_path = account_path(account_id, &format!("inboxes/{}", inbox_id));

    let inbox = ctx
        .transport
        .get(&inbox_path, &[])
        .await
        .with_context(|| format!("Failed to fetch inbox {}", inbox_id))?;
    let state = connection_state(&inbox);
    if is_connected(state) {
        return Ok(connected_record(inbox_id, state));
    }

    ctx.transport
        .post(&format!("{}/setup_channel_provider", inbox_path), json!({}))
        .await
        .with_context(|| format!("Failed to start channel setup for inbox {}", inbox_id))?;

    let max_attempts = ctx.polling.qr_max_attempts;
    let poll_interval = ctx.polling.qr_interval();

    for attempt in 1..=max_attempts {
        let inbox = ctx
            .transport
            .get(&inbox_path, &[])
            .await
            .with_context(|| format!("Failed to poll inbox {}", inbox_id))?;

        let state = connection_state(&inbox);
        if is_connected(state) {
            tracing::info!("Inbox {} connected while waiting for QR code", inbox_id);
            return Ok(connected_record(inbox_id, state));
        }
        if let Some(qr) = qr_payload(&inbox) {
            return Ok(json!({
                "inbox_id": inbox_id,
                "status": "qr_code",
                "connection": state,
                "qr_code": qr,
            }));
        }

        tracing::debug!(
            "QR code for inbox {} not ready (state {:?}, attempt {}/{})",
            inbox_id,
            state,
            attempt,
            max_attempts
        );
        if attempt < max_attempts {
            tokio::time::sleep(poll_interval).await;
        }
    }

    Err(NodeError::Timeout(format!(
        "QR code for inbox {} not available after {} attempts",
        inbox_id, max_attempts
    ))
    .into())
}
