use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{insert_opt, numeric_id, success_record, ExecutionContext, OperationOutput};
use crate::error::NodeError;
use crate::params::Params;
use crate::transport::account_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TeamOperation {
    GetAll,
    Get,
    Create,
    Delete,
    AddAgents,
    GetMembers,
}

pub async fn execute(
    op: TeamOperation,
    ctx: &ExecutionContext<'_>,
    params: &Params,
) -> Result<OperationOutput> {
    let account_id = ctx.account_id(params)?;
    match op {
        TeamOperation::GetAll => {
            let teams = ctx
                .transport
                .get(&account_path(&account_id, "teams"), &[])
                .await
                .context("Failed to list teams")?;
            Ok(OperationOutput::many(teams))
        }
        TeamOperation::Get => {
            let team_id = params.id("teamId")?;
            let team = ctx
                .transport
                .get(&team_path(&account_id, &team_id), &[])
                .await
                .with_context(|| format!("Failed to fetch team {}", team_id))?;
            Ok(OperationOutput::one(team))
        }
        TeamOperation::Create => {
            let mut body = Map::new();
            body.insert("name".to_string(), params.str("name")?.into());
            insert_opt(&mut body, "description", params.opt_str("description"));
            body.insert(
                "allow_auto_assign".to_string(),
                params.bool("allowAutoAssign", true).into(),
            );
            let team = ctx
                .transport
                .post(&account_path(&account_id, "teams"), Value::Object(body))
                .await
                .context("Failed to create team")?;
            Ok(OperationOutput::one(team))
        }
        TeamOperation::Delete => {
            let team_id = params.id("teamId")?;
            ctx.transport
                .delete(&team_path(&account_id, &team_id))
                .await
                .with_context(|| format!("Failed to delete team {}", team_id))?;
            Ok(OperationOutput::one(success_record()))
        }
        TeamOperation::AddAgents => {
            let team_id = params.id("teamId")?;
            let user_ids = params
                .string_list("agentIds")?
                .iter()
                .map(|id| numeric_id("agentIds", id))
                .collect::<Result<Vec<u64>>>()?;
            if user_ids.is_empty() {
                return Err(NodeError::configuration("Parameter 'agentIds' is required").into());
            }
            let members = ctx
                .transport
                .post(
                    &format!("{}/team_members", team_path(&account_id, &team_id)),
                    json!({ "user_ids": user_ids }),
                )
                .await
                .with_context(|| format!("Failed to add agents to team {}", team_id))?;
            Ok(OperationOutput::many(members))
        }
        TeamOperation::GetMembers => {
            let team_id = params.id("teamId")?;
            let members = ctx
                .transport
                .get(&format!("{}/team_members", team_path(&account_id, &team_id)), &[])
                .await
                .with_context(|| format!("Failed to list members of team {}", team_id))?;
            Ok(OperationOutput::many(members))
        }
    }
}

fn team_path(account_id: &str, team_id: &str) -> String {
    account_path(account_id, &format!("teams/{}", team_id))
}
