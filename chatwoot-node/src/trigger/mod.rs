//! Chatwoot webhook registration for the trigger.
//!
//! A trigger owns at most one remote webhook, found by callback URL and
//! remembered in a [`WebhookStore`] under the trigger's instance key.
//! Registrations that no longer match the wanted name or subscriptions are
//! deleted and created again, never patched.

pub mod store;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::TriggerConfig;
use crate::error::{classify, NodeError};
use crate::operations::list_items;
use crate::transport::{account_path, Transport};
pub use store::{FileStore, MemoryStore, StaticData, WebhookStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    ConversationCreated,
    ConversationStatusChanged,
    ConversationUpdated,
    ConversationTypingOn,
    ConversationTypingOff,
    MessageCreated,
    MessageUpdated,
    WebwidgetTriggered,
    ContactCreated,
    ContactUpdated,
}

impl WebhookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::ConversationCreated => "conversation_created",
            WebhookEvent::ConversationStatusChanged => "conversation_status_changed",
            WebhookEvent::ConversationUpdated => "conversation_updated",
            WebhookEvent::ConversationTypingOn => "conversation_typing_on",
            WebhookEvent::ConversationTypingOff => "conversation_typing_off",
            WebhookEvent::MessageCreated => "message_created",
            WebhookEvent::MessageUpdated => "message_updated",
            WebhookEvent::WebwidgetTriggered => "webwidget_triggered",
            WebhookEvent::ContactCreated => "contact_created",
            WebhookEvent::ContactUpdated => "contact_updated",
        }
    }
}

impl std::fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Production and test registrations of the same node coexist under
/// different names and callback URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationMode {
    Production,
    Test,
}

impl ActivationMode {
    fn name_prefix(self) -> &'static str {
        match self {
            ActivationMode::Production => "[N8N]",
            ActivationMode::Test => "[N8N-TEST]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSettings {
    pub node_name: String,
    pub callback_url: String,
    pub events: Vec<WebhookEvent>,
    pub inbox_id: Option<u64>,
    pub mode: ActivationMode,
}

impl WebhookSettings {
    pub fn from_config(config: &TriggerConfig) -> Result<Self> {
        if config.events.is_empty() {
            return Err(NodeError::configuration("Trigger needs at least one event").into());
        }
        let public_url = config.public_url.trim();
        if public_url.is_empty() {
            return Err(NodeError::configuration("Trigger public_url is empty").into());
        }
        // Webhooks are matched by URL, so test and production must not share one.
        let callback_url = if config.test_mode {
            let test_url = config.test_public_url.as_deref().map(str::trim).unwrap_or_default();
            if test_url.is_empty() {
                return Err(NodeError::configuration("Trigger test_mode needs test_public_url").into());
            }
            if test_url == public_url {
                return Err(NodeError::configuration(
                    "Trigger test_public_url must differ from public_url",
                )
                .into());
            }
            test_url
        } else {
            public_url
        };
        Ok(Self {
            node_name: config.node_name.clone(),
            callback_url: callback_url.to_string(),
            events: config.events.clone(),
            inbox_id: config.inbox_id,
            mode: if config.test_mode {
                ActivationMode::Test
            } else {
                ActivationMode::Production
            },
        })
    }

    pub fn webhook_name(&self) -> String {
        format!("{} {}", self.mode.name_prefix(), self.node_name)
    }

    fn subscriptions(&self) -> BTreeSet<String> {
        self.events.iter().map(|e| e.as_str().to_string()).collect()
    }
}

pub struct WebhookTrigger {
    transport: Arc<dyn Transport>,
    store: Arc<dyn WebhookStore>,
    account_id: String,
    instance_key: String,
    settings: WebhookSettings,
}

impl WebhookTrigger {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn WebhookStore>,
        account_id: impl Into<String>,
        instance_key: impl Into<String>,
        settings: WebhookSettings,
    ) -> Self {
        Self {
            transport,
            store,
            account_id: account_id.into(),
            instance_key: instance_key.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &WebhookSettings {
        &self.settings
    }

    fn webhooks_path(&self) -> String {
        account_path(&self.account_id, "webhooks")
    }

    fn webhook_path(&self, webhook_id: &str) -> String {
        account_path(&self.account_id, &format!("webhooks/{}", webhook_id))
    }

    /// Looks for a registration pointing at our callback URL.
    ///
    /// A matching one is adopted and its ID stored. One with the wrong name
    /// or subscriptions is deleted and the stored ID cleared, so the caller
    /// creates a fresh registration.
    pub async fn check_exists(&self) -> Result<bool> {
        let response = self
            .transport
            .get(&self.webhooks_path(), &[])
            .await
            .context("Failed to list webhooks")?;

        let expected_name = self.settings.webhook_name();
        let expected_subscriptions = self.settings.subscriptions();
        let mut adopted: Option<String> = None;

        for hook in webhook_list(response) {
            if hook.get("url").and_then(Value::as_str) != Some(self.settings.callback_url.as_str()) {
                continue;
            }
            let Some(id) = hook.get("id").map(id_string) else {
                continue;
            };
            let name_matches = hook.get("name").and_then(Value::as_str) == Some(expected_name.as_str());
            let subscriptions: BTreeSet<String> = hook
                .get("subscriptions")
                .and_then(Value::as_array)
                .map(|subs| {
                    subs.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            if adopted.is_none() && name_matches && subscriptions == expected_subscriptions {
                adopted = Some(id);
            } else {
                tracing::info!(
                    "Deleting outdated webhook {} for {}",
                    id,
                    self.settings.callback_url
                );
                self.delete_remote(&id).await?;
            }
        }

        match adopted {
            Some(id) => {
                tracing::info!("Webhook {} already registered as '{}'", id, expected_name);
                self.store
                    .set(&self.instance_key, StaticData { webhook_id: id })?;
                Ok(true)
            }
            None => {
                self.store.delete(&self.instance_key)?;
                Ok(false)
            }
        }
    }

    /// Registers the webhook and stores its ID.
    pub async fn create(&self) -> Result<String> {
        let mut body = Map::new();
        body.insert("name".to_string(), self.settings.webhook_name().into());
        body.insert("url".to_string(), self.settings.callback_url.clone().into());
        body.insert(
            "subscriptions".to_string(),
            json!(self.settings.subscriptions()),
        );
        if let Some(inbox_id) = self.settings.inbox_id {
            body.insert("inbox_id".to_string(), inbox_id.into());
        }

        let response = self
            .transport
            .post(&self.webhooks_path(), Value::Object(body))
            .await
            .context("Failed to create webhook")?;

        let id = response
            .pointer("/payload/webhook/id")
            .or_else(|| response.pointer("/payload/id"))
            .or_else(|| response.get("id"))
            .map(id_string)
            .ok_or_else(|| NodeError::Api {
                status: None,
                message: "Webhook created but the response carries no ID".to_string(),
            })?;

        tracing::info!(
            "Registered webhook {} '{}' for {}",
            id,
            self.settings.webhook_name(),
            self.settings.callback_url
        );
        self.store.set(
            &self.instance_key,
            StaticData {
                webhook_id: id.clone(),
            },
        )?;
        Ok(id)
    }

    /// Removes the stored registration. Returns whether there was one.
    pub async fn delete(&self) -> Result<bool> {
        let Some(data) = self.store.get(&self.instance_key)? else {
            return Ok(false);
        };
        self.delete_remote(&data.webhook_id).await?;
        self.store.delete(&self.instance_key)?;
        tracing::info!("Removed webhook {}", data.webhook_id);
        Ok(true)
    }

    /// Adopts a matching registration or creates one. Returns the webhook ID.
    pub async fn activate(&self) -> Result<String> {
        if self.check_exists().await? {
            if let Some(data) = self.store.get(&self.instance_key)? {
                return Ok(data.webhook_id);
            }
        }
        self.create().await
    }

    /// The delivered body is the single output record, untouched.
    pub fn deliver(&self, body: Value) -> Vec<Value> {
        vec![body]
    }

    async fn delete_remote(&self, webhook_id: &str) -> Result<()> {
        match self.transport.delete(&self.webhook_path(webhook_id)).await {
            Ok(_) => Ok(()),
            Err(err) if classify(&err).and_then(NodeError::status) == Some(404) => {
                tracing::debug!("Webhook {} was already gone", webhook_id);
                Ok(())
            }
            Err(err) => Err(err.context(format!("Failed to delete webhook {}", webhook_id))),
        }
    }
}

/// `GET webhooks` answers `{"payload": {"webhooks": [...]}}`.
fn webhook_list(response: Value) -> Vec<Value> {
    match response.pointer("/payload/webhooks") {
        Some(Value::Array(hooks)) => hooks.clone(),
        _ => list_items(response),
    }
}

fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
