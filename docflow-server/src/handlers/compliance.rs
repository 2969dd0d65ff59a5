//! Compliance handlers.
//!
//! GET  /workflows/:id/compliance   - validate one process
//! POST /workflows/:id/compliance   - enforce (idempotent)
//! GET  /compliance                 - summary over active processes
//! POST /compliance/fix             - enforce every non-compliant process

use std::sync::Arc;

use axum::{extract::Path, Extension, Json};
use docflow_core::compliance::{
    ComplianceReport, ComplianceSummary, FixAllReport, RemediationReport,
};
use docflow_core::types::ProcessId;
use docflow_core::WorkflowEngine;

use crate::actor::Actor;
use crate::error::AppError;

pub async fn validate(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Path(id): Path<ProcessId>,
) -> Result<Json<ComplianceReport>, AppError> {
    Ok(Json(engine.compliance().validate(id).await?))
}

pub async fn enforce(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Actor(actor): Actor,
    Path(id): Path<ProcessId>,
) -> Result<Json<RemediationReport>, AppError> {
    let report = engine.compliance().enforce(id).await?;
    tracing::info!(
        process_id = %id,
        actor = %actor,
        corrections = report.corrections.len(),
        "compliance enforced via api"
    );
    Ok(Json(report))
}

pub async fn monitor(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
) -> Result<Json<ComplianceSummary>, AppError> {
    Ok(Json(engine.compliance().monitor().await?))
}

pub async fn fix_all(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Actor(actor): Actor,
) -> Result<Json<FixAllReport>, AppError> {
    let report = engine.compliance().fix_all().await?;
    tracing::info!(actor = %actor, fixed = report.fixed, failed = report.failed, "fix-all via api");
    Ok(Json(report))
}
