use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{ExecutionContext, OperationOutput};
use crate::params::Params;
use crate::transport::account_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountOperation {
    Get,
}

pub async fn execute(
    op: AccountOperation,
    ctx: &ExecutionContext<'_>,
    params: &Params,
) -> Result<OperationOutput> {
    let account_id = ctx.account_id(params)?;
    match op {
        AccountOperation::Get => {
            let account = ctx
                .transport
                .get(&account_path(&account_id, ""), &[])
                .await
                .with_context(|| format!("Failed to fetch account {}", account_id))?;
            Ok(OperationOutput::one(account))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, fast_polling, FakeTransport};
    use crate::transport::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_account_uses_default_account() {
        let transport = FakeTransport::new();
        transport.on(Method::GET, "/api/v1/accounts/1", json!({"id": 1, "name": "Acme"}));
        let polling = fast_polling();

        let output = execute(
            AccountOperation::Get,
            &context(&transport, &polling),
            &Params::default(),
        )
        .await
        .unwrap();

        assert_eq!(output.records, vec![json!({"id": 1, "name": "Acme"})]);
    }

    #[tokio::test]
    async fn test_get_account_from_locator() {
        let transport = FakeTransport::new();
        transport.on(Method::GET, "/api/v1/accounts/5", json!({"id": 5}));
        let polling = fast_polling();
        let params = Params::from_value(json!({"accountId": {"mode": "list", "value": "5"}})).unwrap();

        let output = execute(AccountOperation::Get, &context(&transport, &polling), &params)
            .await
            .unwrap();

        assert_eq!(output.records[0]["id"], 5);
    }
}
