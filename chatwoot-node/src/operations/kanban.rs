use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{insert_opt, list_items, numeric_id, one_of, success_record};
use super::{ExecutionContext, OperationOutput};
use crate::params::{push_query, Params};
use crate::transport::account_path;

const PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KanbanOperation {
    GetBoards,
    GetSteps,
    GetTasks,
    CreateTask,
    MoveTask,
    DeleteTask,
}

pub async fn execute(
    op: KanbanOperation,
    ctx: &ExecutionContext<'_>,
    params: &Params,
) -> Result<OperationOutput> {
    let account_id = ctx.account_id(params)?;
    match op {
        KanbanOperation::GetBoards => {
            let boards = ctx
                .transport
                .get(&account_path(&account_id, "kanban_boards"), &[])
                .await
                .context("Failed to list kanban boards")?;
            Ok(records(boards))
        }
        KanbanOperation::GetSteps => {
            let board_id = params.id("boardId")?;
            let steps = ctx
                .transport
                .get(
                    &account_path(&account_id, &format!("kanban_boards/{}/kanban_steps", board_id)),
                    &[],
                )
                .await
                .with_context(|| format!("Failed to list steps of kanban board {}", board_id))?;
            Ok(records(steps))
        }
        KanbanOperation::GetTasks => {
            let mut query = vec![("board_id".to_string(), params.id("boardId")?)];
            push_query(&mut query, "step_id", params.opt_id("stepId")?);
            let tasks = ctx
                .transport
                .get(&account_path(&account_id, "kanban_tasks"), &query)
                .await
                .context("Failed to list kanban tasks")?;
            Ok(records(tasks))
        }
        KanbanOperation::CreateTask => {
            let mut body = Map::new();
            body.insert(
                "board_id".to_string(),
                numeric_id("boardId", &params.id("boardId")?)?.into(),
            );
            body.insert(
                "board_step_id".to_string(),
                numeric_id("stepId", &params.id("stepId")?)?.into(),
            );
            body.insert("title".to_string(), params.str("title")?.into());
            insert_opt(&mut body, "description", params.opt_str("description"));
            if let Some(priority) = params.opt_str("priority") {
                body.insert(
                    "priority".to_string(),
                    one_of("priority", priority, PRIORITIES)?.into(),
                );
            }
            let conversation_ids = params
                .string_list("conversationIds")?
                .iter()
                .map(|id| numeric_id("conversationIds", id))
                .collect::<Result<Vec<u64>>>()?;
            if !conversation_ids.is_empty() {
                body.insert("conversation_ids".to_string(), conversation_ids.into());
            }

            let task = ctx
                .transport
                .post(&account_path(&account_id, "kanban_tasks"), Value::Object(body))
                .await
                .context("Failed to create kanban task")?;
            Ok(OperationOutput::one(task))
        }
        KanbanOperation::MoveTask => {
            let task_id = params.id("taskId")?;
            let step_id = numeric_id("stepId", &params.id("stepId")?)?;
            let task = ctx
                .transport
                .post(
                    &account_path(&account_id, &format!("kanban_tasks/{}/move", task_id)),
                    json!({ "board_step_id": step_id }),
                )
                .await
                .with_context(|| format!("Failed to move kanban task {}", task_id))?;
            Ok(OperationOutput::one(task))
        }
        KanbanOperation::DeleteTask => {
            let task_id = params.id("taskId")?;
            ctx.transport
                .delete(&account_path(&account_id, &format!("kanban_tasks/{}", task_id)))
                .await
                .with_context(|| format!("Failed to delete kanban task {}", task_id))?;
            Ok(OperationOutput::one(success_record()))
        }
    }
}

fn records(response: Value) -> OperationOutput {
    OperationOutput {
        records: list_items(response),
        hints: Vec::new(),
    }
}
