//! Process handlers.
//!
//! GET    /workflows?scope=assigned|mine|all  - processes the caller is involved in
//! POST   /workflows                          - instantiate a template for a document
//! DELETE /workflows?id=                      - cancel a live process, remove a closed one
//! GET    /workflows/:id                      - process, executions and the caller's actions
//! POST   /workflows/:id/pause
//! POST   /workflows/:id/resume

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use docflow_core::engine::{DeleteOutcome, InstantiateRequest, ProcessScope, ProcessView};
use docflow_core::rules::{self, AvailableActions};
use docflow_core::types::{ExecutionId, ProcessId, WorkflowProcess};
use docflow_core::WorkflowEngine;
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: ProcessId,
}

#[derive(Debug, Serialize)]
pub struct ProcessDetail {
    #[serde(flatten)]
    pub view: ProcessView,
    /// Rules evaluation for each open execution the caller may act on.
    pub actions: BTreeMap<ExecutionId, AvailableActions>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub id: ProcessId,
    pub outcome: DeleteOutcome,
}

pub async fn list_processes(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Actor(actor): Actor,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<WorkflowProcess>>, AppError> {
    let scope = match q.scope.as_deref() {
        Some(s) => s.parse::<ProcessScope>().map_err(AppError::BadRequest)?,
        None => ProcessScope::default(),
    };
    Ok(Json(engine.list_processes(scope, &actor).await?))
}

pub async fn instantiate(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Actor(actor): Actor,
    Json(req): Json<InstantiateRequest>,
) -> Result<Json<WorkflowProcess>, AppError> {
    Ok(Json(engine.instantiate(req, &actor).await?))
}

pub async fn get_process(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Actor(actor): Actor,
    Path(id): Path<ProcessId>,
) -> Result<Json<ProcessDetail>, AppError> {
    let view = engine.get_process(id).await?;
    let mut actions = BTreeMap::new();
    for e in view.executions.iter().filter(|e| e.is_open()) {
        if engine.may_act(e, &actor).await? {
            actions.insert(e.id, rules::evaluate(&view.process.snapshot, e));
        }
    }
    Ok(Json(ProcessDetail { view, actions }))
}

pub async fn delete_process(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Actor(actor): Actor,
    Query(q): Query<IdQuery>,
) -> Result<Json<DeleteResponse>, AppError> {
    let outcome = engine.delete_process(q.id, &actor).await?;
    Ok(Json(DeleteResponse { id: q.id, outcome }))
}

pub async fn pause_process(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Actor(actor): Actor,
    Path(id): Path<ProcessId>,
) -> Result<Json<WorkflowProcess>, AppError> {
    Ok(Json(engine.pause_process(id, &actor).await?))
}

pub async fn resume_process(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Actor(actor): Actor,
    Path(id): Path<ProcessId>,
) -> Result<Json<WorkflowProcess>, AppError> {
    Ok(Json(engine.resume_process(id, &actor).await?))
}
