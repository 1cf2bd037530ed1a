//! Runs one operation over a batch of input items.

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::PollingConfig;
use crate::error::classify;
use crate::operations::{ExecutionContext, Operation};
use crate::params::Params;
use crate::transport::Transport;

/// One output record and the index of the input item that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputItem {
    pub json: Value,
    pub paired_item: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct NodeOutput {
    pub items: Vec<OutputItem>,
    pub hints: Vec<String>,
}

pub struct ChatwootNode {
    transport: Arc<dyn Transport>,
    default_account_id: Option<u64>,
    polling: PollingConfig,
}

impl ChatwootNode {
    pub fn new(
        transport: Arc<dyn Transport>,
        default_account_id: Option<u64>,
        polling: PollingConfig,
    ) -> Self {
        Self {
            transport,
            default_account_id,
            polling,
        }
    }

    /// Executes `operation` once per item, in order. An empty batch runs the
    /// operation once with no parameters.
    ///
    /// With `continue_on_failure`, API and timeout failures become
    /// `{"error": ...}` records and the batch goes on. Configuration and
    /// validation failures always abort.
    pub async fn execute(
        &self,
        operation: Operation,
        items: Vec<Params>,
        continue_on_failure: bool,
    ) -> Result<NodeOutput> {
        let items = if items.is_empty() {
            vec![Params::default()]
        } else {
            items
        };
        let ctx = ExecutionContext {
            transport: self.transport.as_ref(),
            default_account_id: self.default_account_id,
            polling: &self.polling,
        };

        let mut output = NodeOutput::default();
        for (index, params) in items.iter().enumerate() {
            match operation.execute(&ctx, params).await {
                Ok(result) => {
                    for hint in &result.hints {
                        tracing::warn!("{} (item {}): {}", operation, index, hint);
                    }
                    output.hints.extend(result.hints);
                    output
                        .items
                        .extend(result.records.into_iter().map(|json| OutputItem {
                            json,
                            paired_item: index,
                        }));
                }
                Err(err) => {
                    let recoverable = classify(&err).is_some_and(|e| e.is_recoverable());
                    if !(continue_on_failure && recoverable) {
                        return Err(err.context(format!("{} failed on item {}", operation, index)));
                    }
                    let message = format!("{:#}", err);
                    tracing::warn!("{} failed on item {}: {}", operation, index, message);
                    output.items.push(OutputItem {
                        json: json!({ "error": message }),
                        paired_item: index,
                    });
                }
            }
        }

        tracing::info!(
            "{} produced {} records from {} items",
            operation,
            output.items.len(),
            items.len()
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use crate::operations::{AccountOperation, ContactOperation};
    use crate::testing::{fast_polling, FakeTransport};
    use crate::transport::Method;

    fn node(transport: Arc<FakeTransport>) -> ChatwootNode {
        ChatwootNode::new(transport, Some(1), fast_polling())
    }

    fn items(values: Vec<Value>) -> Vec<Params> {
        values
            .into_iter()
            .map(|v| Params::from_value(v).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_empty_batch_runs_once() {
        let transport = Arc::new(FakeTransport::new());
        transport.on(Method::GET, "/api/v1/accounts/1", json!({"id": 1, "name": "Acme"}));

        let output = node(transport.clone())
            .execute(Operation::Account(AccountOperation::Get), Vec::new(), false)
            .await
            .unwrap();

        assert_eq!(output.items.len(), 1);
        assert_eq!(output.items[0].paired_item, 0);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_api_error_captured_when_continuing() {
        let transport = Arc::new(FakeTransport::new());
        transport.on(Method::GET, "/api/v1/accounts/1/contacts/1", json!({"payload": {"id": 1}}));
        transport.on_error(
            Method::GET,
            "/api/v1/accounts/1/contacts/2",
            NodeError::Api {
                status: Some(404),
                message: "Resource could not be found".to_string(),
            },
        );

        let output = node(transport)
            .execute(
                Operation::Contact(ContactOperation::Get),
                items(vec![json!({"contactId": 1}), json!({"contactId": 2}), json!({"contactId": 1})]),
                true,
            )
            .await
            .unwrap();

        assert_eq!(output.items.len(), 3);
        assert_eq!(output.items[0].json["id"], 1);
        let error = output.items[1].json["error"].as_str().unwrap();
        assert!(error.contains("Resource could not be found"));
        assert_eq!(output.items[1].paired_item, 1);
        assert_eq!(output.items[2].paired_item, 2);
    }

    #[tokio::test]
    async fn test_api_error_aborts_without_flag() {
        let transport = Arc::new(FakeTransport::new());
        transport.on_error(
            Method::GET,
            "/api/v1/accounts/1/contacts/2",
            NodeError::Api {
                status: Some(500),
                message: "boom".to_string(),
            },
        );

        let err = node(transport)
            .execute(
                Operation::Contact(ContactOperation::Get),
                items(vec![json!({"contactId": 2})]),
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(classify(&err), Some(NodeError::Api { status: Some(500), .. })));
    }

    #[tokio::test]
    async fn test_validation_error_aborts_even_when_continuing() {
        let transport = Arc::new(FakeTransport::new());

        let err = node(transport.clone())
            .execute(
                Operation::Contact(ContactOperation::Create),
                items(vec![json!({"inboxId": 4, "phoneNumber": "5511999999999"})]),
                true,
            )
            .await
            .unwrap_err();

        assert!(matches!(classify(&err), Some(NodeError::Validation(_))));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_hints_are_collected() {
        let transport = Arc::new(FakeTransport::new());
        transport.on(
            Method::POST,
            "/api/v1/accounts/1/contacts",
            json!({"payload": {"contact": {"id": 31}}}),
        );

        let output = node(transport)
            .execute(
                Operation::Contact(ContactOperation::Create),
                items(vec![json!({"inboxId": 4, "phoneNumber": "+5511999999999"})]),
                false,
            )
            .await
            .unwrap();

        assert_eq!(output.items[0].json, json!({"id": 31}));
        assert_eq!(output.hints.len(), 1);
    }
}
