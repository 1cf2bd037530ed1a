use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{insert_opt, one_of, success_record, ExecutionContext, OperationOutput};
use crate::error::NodeError;
use crate::params::Params;
use crate::transport::account_path;
use crate::validation::validate_email;

const ROLES: &[&str] = &["agent", "administrator"];
const AVAILABILITY: &[&str] = &["available", "busy", "offline"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentOperation {
    GetAll,
    Create,
    Update,
    Delete,
}

pub async fn execute(
    op: AgentOperation,
    ctx: &ExecutionContext<'_>,
    params: &Params,
) -> Result<OperationOutput> {
    let account_id = ctx.account_id(params)?;
    match op {
        AgentOperation::GetAll => {
            let agents = ctx
                .transport
                .get(&account_path(&account_id, "agents"), &[])
                .await
                .context("Failed to list agents")?;
            Ok(OperationOutput::many(agents))
        }
        AgentOperation::Create => {
            let name = params.str("name")?;
            let email = params.str("email")?;
            validate_email(&email)?;

            let mut body = Map::new();
            body.insert("name".to_string(), name.into());
            body.insert("email".to_string(), email.into());
            body.insert(
                "role".to_string(),
                one_of("role", params.opt_str("role").unwrap_or_else(|| "agent".to_string()), ROLES)?
                    .into(),
            );
            add_availability(&mut body, params)?;

            let agent = ctx
                .transport
                .post(&account_path(&account_id, "agents"), Value::Object(body))
                .await
                .context("Failed to create agent")?;
            Ok(OperationOutput::one(agent))
        }
        AgentOperation::Update => {
            let agent_id = params.id("agentId")?;
            let mut body = Map::new();
            if let Some(role) = params.opt_str("role") {
                body.insert("role".to_string(), one_of("role", role, ROLES)?.into());
            }
            add_availability(&mut body, params)?;
            if body.is_empty() {
                return Err(NodeError::configuration(
                    "Agent update needs at least one of 'role', 'availabilityStatus' or 'autoOffline'",
                )
                .into());
            }

            let agent = ctx
                .transport
                .patch(
                    &account_path(&account_id, &format!("agents/{}", agent_id)),
                    Value::Object(body),
                )
                .await
                .with_context(|| format!("Failed to update agent {}", agent_id))?;
            Ok(OperationOutput::one(agent))
        }
        AgentOperation::Delete => {
            let agent_id = params.id("agentId")?;
            ctx.transport
                .delete(&account_path(&account_id, &format!("agents/{}", agent_id)))
                .await
                .with_context(|| format!("Failed to delete agent {}", agent_id))?;
            Ok(OperationOutput::one(success_record()))
        }
    }
}

fn add_availability(body: &mut Map<String, Value>, params: &Params) -> Result<()> {
    if let Some(status) = params.opt_str("availabilityStatus") {
        body.insert(
            "availability_status".to_string(),
            one_of("availabilityStatus", status, AVAILABILITY)?.into(),
        );
    }
    let auto_offline = params
        .contains("autoOffline")
        .then(|| params.bool("autoOffline", true));
    insert_opt(body, "auto_offline", auto_offline);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;
    use crate::testing::{context, fast_polling, FakeTransport};
    use crate::transport::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_defaults_role() {
        let transport = FakeTransport::new();
        transport.on(Method::POST, "/api/v1/accounts/1/agents", json!({"id": 12}));
        let polling = fast_polling();
        let params = Params::from_value(json!({
            "name": "Ana",
            "email": "ana@example.com",
            "autoOffline": false
        }))
        .unwrap();

        let output = execute(AgentOperation::Create, &context(&transport, &polling), &params)
            .await
            .unwrap();

        assert_eq!(output.records[0]["id"], 12);
        let call = &transport.calls()[0];
        assert_eq!(
            call.body,
            Some(json!({
                "name": "Ana",
                "email": "ana@example.com",
                "role": "agent",
                "auto_offline": false
            }))
        );
    }

    #[tokio::test]
    async fn test_create_rejects_bad_email_before_request() {
        let transport = FakeTransport::new();
        let polling = fast_polling();
        let params = Params::from_value(json!({"name": "Ana", "email": "not-an-email"})).unwrap();

        let err = execute(AgentOperation::Create, &context(&transport, &polling), &params)
            .await
            .unwrap_err();

        assert!(matches!(classify(&err), Some(NodeError::Validation(_))));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_requires_a_field() {
        let transport = FakeTransport::new();
        let polling = fast_polling();
        let params = Params::from_value(json!({"agentId": 3})).unwrap();

        let err = execute(AgentOperation::Update, &context(&transport, &polling), &params)
            .await
            .unwrap_err();
        assert!(matches!(classify(&err), Some(NodeError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_update_patches_role() {
        let transport = FakeTransport::new();
        transport.on(Method::PATCH, "/api/v1/accounts/1/agents/3", json!({"id": 3, "role": "administrator"}));
        let polling = fast_polling();
        let params = Params::from_value(json!({"agentId": 3, "role": "administrator"})).unwrap();

        execute(AgentOperation::Update, &context(&transport, &polling), &params)
            .await
            .unwrap();
        assert_eq!(transport.calls()[0].body, Some(json!({"role": "administrator"})));
    }

    #[tokio::test]
    async fn test_delete_returns_success() {
        let transport = FakeTransport::new();
        transport.on(Method::DELETE, "/api/v1/accounts/1/agents/3", Value::Null);
        let polling = fast_polling();
        let params = Params::from_value(json!({"agentId": "3"})).unwrap();

        let output = execute(AgentOperation::Delete, &context(&transport, &polling), &params)
            .await
            .unwrap();
        assert_eq!(output.records, vec![json!({"success": true})]);
    }
}
