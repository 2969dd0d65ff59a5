//! Execution handlers.
//!
//! POST  /workflows/:id/start                              - start (claim) an execution
//! POST  /workflows/:id/executions                         - advance with an action
//! PATCH /workflows/:id/executions                         - return to the last action step
//! GET   /workflows/:id/executions/:execution_id/actions   - legal actions

use std::sync::Arc;

use axum::{extract::Path, Extension, Json};
use docflow_core::engine::{AdvanceResult, ReturnResult};
use docflow_core::rules::AvailableActions;
use docflow_core::types::{ActionKind, ExecutionId, ProcessId, WorkflowExecution};
use docflow_core::WorkflowEngine;
use serde::Deserialize;

use crate::actor::Actor;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub execution_id: ExecutionId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRequest {
    pub execution_id: ExecutionId,
    pub action: String,
    #[serde(default)]
    pub comments: Option<String>,
    /// Free-form client payload; `payload.comments` is read when `comments`
    /// is absent.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

impl AdvanceRequest {
    fn comments(&self) -> Option<String> {
        self.comments.clone().or_else(|| {
            self.payload
                .as_ref()
                .and_then(|p| p.get("comments"))
                .and_then(|c| c.as_str())
                .map(str::to_string)
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    pub execution_id: ExecutionId,
    #[serde(default)]
    pub comments: Option<String>,
}

pub async fn start_execution(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Actor(actor): Actor,
    Path(id): Path<ProcessId>,
    Json(req): Json<StartRequest>,
) -> Result<Json<WorkflowExecution>, AppError> {
    Ok(Json(engine.start_execution(id, req.execution_id, &actor).await?))
}

pub async fn advance(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Actor(actor): Actor,
    Path(id): Path<ProcessId>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<AdvanceResult>, AppError> {
    let action: ActionKind = req
        .action
        .parse()
        .map_err(AppError::BadRequest)?;
    let comments = req.comments();
    Ok(Json(
        engine
            .advance(id, req.execution_id, &actor, action, comments)
            .await?,
    ))
}

pub async fn return_execution(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Actor(actor): Actor,
    Path(id): Path<ProcessId>,
    Json(req): Json<ReturnRequest>,
) -> Result<Json<ReturnResult>, AppError> {
    Ok(Json(
        engine
            .return_execution(id, req.execution_id, &actor, req.comments)
            .await?,
    ))
}

pub async fn available_actions(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Path((id, execution_id)): Path<(ProcessId, ExecutionId)>,
) -> Result<Json<AvailableActions>, AppError> {
    Ok(Json(engine.available_actions(id, execution_id).await?))
}
