//! Resource operations and their dispatch.
//!
//! Every `(resource, operation)` pair the node supports is a variant of
//! [`Operation`]; dispatch is a single exhaustive match, so adding an
//! operation without a handler does not compile.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::PollingConfig;
use crate::error::NodeError;
use crate::params::Params;
use crate::transport::Transport;

pub mod account;
pub mod agent;
pub mod contact;
pub mod conversation;
pub mod custom_attribute;
pub mod inbox;
pub mod kanban;
pub mod label;
pub mod message;
pub mod team;

pub use account::AccountOperation;
pub use agent::AgentOperation;
pub use contact::ContactOperation;
pub use conversation::ConversationOperation;
pub use custom_attribute::CustomAttributeOperation;
pub use inbox::InboxOperation;
pub use kanban::KanbanOperation;
pub use label::LabelOperation;
pub use message::MessageOperation;
pub use team::TeamOperation;

/// Everything a handler may use besides its parameters.
pub struct ExecutionContext<'a> {
    pub transport: &'a dyn Transport,
    pub default_account_id: Option<u64>,
    pub polling: &'a PollingConfig,
}

impl ExecutionContext<'_> {
    pub fn account_id(&self, params: &Params) -> Result<String> {
        params.account_id(self.default_account_id)
    }
}

/// Records produced for one input item, plus non-fatal hints.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OperationOutput {
    pub records: Vec<Value>,
    pub hints: Vec<String>,
}

impl OperationOutput {
    pub fn one(record: Value) -> Self {
        Self {
            records: vec![record],
            hints: Vec::new(),
        }
    }

    /// Arrays fan out into one record each; anything else is a single record.
    pub fn many(value: Value) -> Self {
        match value {
            Value::Array(records) => Self {
                records,
                hints: Vec::new(),
            },
            other => Self::one(other),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resource", content = "operation", rename_all = "camelCase")]
pub enum Operation {
    Account(AccountOperation),
    Inbox(InboxOperation),
    Agent(AgentOperation),
    Contact(ContactOperation),
    Conversation(ConversationOperation),
    Message(MessageOperation),
    Label(LabelOperation),
    Team(TeamOperation),
    CustomAttribute(CustomAttributeOperation),
    Kanban(KanbanOperation),
}

impl Operation {
    /// Parses the UI's resource and operation names, e.g. `("contact", "create")`.
    pub fn parse(resource: &str, operation: &str) -> Result<Self> {
        serde_json::from_value(json!({ "resource": resource, "operation": operation })).map_err(
            |_| {
                NodeError::configuration(format!(
                    "Unsupported operation '{}' for resource '{}'",
                    operation, resource
                ))
                .into()
            },
        )
    }

    pub async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        params: &Params,
    ) -> Result<OperationOutput> {
        match *self {
            Operation::Account(op) => account::execute(op, ctx, params).await,
            Operation::Inbox(op) => inbox::execute(op, ctx, params).await,
            Operation::Agent(op) => agent::execute(op, ctx, params).await,
            Operation::Contact(op) => contact::execute(op, ctx, params).await,
            Operation::Conversation(op) => conversation::execute(op, ctx, params).await,
            Operation::Message(op) => message::execute(op, ctx, params).await,
            Operation::Label(op) => label::execute(op, ctx, params).await,
            Operation::Team(op) => team::execute(op, ctx, params).await,
            Operation::CustomAttribute(op) => custom_attribute::execute(op, ctx, params).await,
            Operation::Kanban(op) => kanban::execute(op, ctx, params).await,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = serde_json::to_value(self).map_err(|_| std::fmt::Error)?;
        write!(
            f,
            "{}.{}",
            value["resource"].as_str().unwrap_or_default(),
            value["operation"].as_str().unwrap_or_default()
        )
    }
}

/// Chatwoot wraps most responses in `{"payload": ...}`.
pub(crate) fn unwrap_payload(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("payload") => {
            map.remove("payload").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Items of a list response, whichever envelope the endpoint uses.
pub(crate) fn list_items(value: Value) -> Vec<Value> {
    match unwrap_payload(value) {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if let Some(Value::Object(mut data)) = map.remove("data") {
                if let Some(Value::Array(items)) = data.remove("payload") {
                    return items;
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

pub(crate) fn success_record() -> Value {
    json!({ "success": true })
}

pub(crate) fn insert_opt(body: &mut Map<String, Value>, key: &str, value: Option<impl Into<Value>>) {
    if let Some(value) = value {
        body.insert(key.to_string(), value.into());
    }
}

/// Parses a numeric ID for request bodies, which Chatwoot expects as integers.
pub(crate) fn numeric_id(name: &str, id: &str) -> Result<u64> {
    id.parse().map_err(|_| {
        NodeError::configuration(format!("Parameter '{}' must be a numeric ID, got '{}'", name, id))
            .into()
    })
}

/// Rejects values outside the allowed set.
pub(crate) fn one_of(name: &str, value: String, allowed: &[&str]) -> Result<String> {
    if allowed.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(NodeError::configuration(format!(
            "Parameter '{}' must be one of {}, got '{}'",
            name,
            allowed.join(", "),
            value
        ))
        .into())
    }
}
