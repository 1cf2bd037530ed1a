//! HTTP endpoint Chatwoot posts webhook events to.

use anyhow::{Context, Result};
use poem::{
    handler,
    http::StatusCode,
    listener::TcpListener,
    post,
    web::{Data, Json},
    Body, Endpoint, EndpointExt, Error as PoemError, Route, Server,
};
use serde_json::{json, Value};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::trigger::WebhookTrigger;

struct ReceiverState {
    trigger: Arc<WebhookTrigger>,
    records: mpsc::Sender<Value>,
}

#[handler]
async fn receive_webhook(
    state: Data<&Arc<ReceiverState>>,
    body: Body,
) -> Result<Json<Value>, PoemError> {
    let bytes = body.into_vec().await.map_err(|e| {
        PoemError::from_string(format!("Failed to read body: {}", e), StatusCode::BAD_REQUEST)
    })?;
    let payload: Value = serde_json::from_slice(&bytes).map_err(|e| {
        PoemError::from_string(format!("Invalid JSON: {}", e), StatusCode::BAD_REQUEST)
    })?;

    tracing::debug!(
        "Received webhook event {}",
        payload.get("event").and_then(|e| e.as_str()).unwrap_or("<none>")
    );

    for record in state.trigger.deliver(payload) {
        state.records.send(record).await.map_err(|_| {
            tracing::error!("Webhook record dropped: output channel closed");
            PoemError::from_string("Receiver is shutting down", StatusCode::SERVICE_UNAVAILABLE)
        })?;
    }

    Ok(Json(json!({ "received": true })))
}

/// `POST /webhook`; each delivered record is forwarded on `records`.
pub fn app(trigger: Arc<WebhookTrigger>, records: mpsc::Sender<Value>) -> impl Endpoint {
    Route::new()
        .at("/webhook", post(receive_webhook))
        .data(Arc::new(ReceiverState { trigger, records }))
}

/// Serves [`app`] on `addr` until `shutdown` resolves.
pub async fn serve(
    addr: &str,
    trigger: Arc<WebhookTrigger>,
    records: mpsc::Sender<Value>,
    shutdown: impl Future<Output = ()> + Send,
) -> Result<()> {
    tracing::info!("Listening for Chatwoot webhooks on {}", addr);
    Server::new(TcpListener::bind(addr.to_string()))
        .run_with_graceful_shutdown(app(trigger, records), shutdown, None)
        .await
        .with_context(|| format!("Webhook server on {} failed", addr))
}

/// Writes each record as one JSON line until every sender is gone.
pub async fn forward_records<W: Write>(
    mut records: mpsc::Receiver<Value>,
    mut out: W,
) -> Result<usize> {
    let mut written = 0;
    while let Some(record) = records.recv().await {
        writeln!(out, "{}", record).context("Failed to write webhook record")?;
        out.flush().context("Failed to flush webhook record")?;
        written += 1;
    }
    Ok(written)
}
