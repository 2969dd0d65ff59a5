//! Template handlers.
//!
//! GET    /workflows/templates        - list templates with steps and transitions
//! POST   /workflows/templates        - create, or replace when the body has `id`
//! GET    /workflows/templates/:id    - one template
//! DELETE /workflows/templates?id=    - refused while live processes reference it

use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use docflow_core::engine::SavedTemplate;
use docflow_core::template::TemplateDraft;
use docflow_core::types::{TemplateId, WorkflowTemplate};
use docflow_core::WorkflowEngine;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::actor::Actor;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: TemplateId,
}

pub async fn list_templates(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
) -> Result<Json<Vec<WorkflowTemplate>>, AppError> {
    Ok(Json(engine.list_templates().await?))
}

pub async fn get_template(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Path(id): Path<TemplateId>,
) -> Result<Json<WorkflowTemplate>, AppError> {
    Ok(Json(engine.get_template(id).await?))
}

pub async fn save_template(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Actor(actor): Actor,
    Json(draft): Json<TemplateDraft>,
) -> Result<Json<SavedTemplate>, AppError> {
    let saved = engine.save_template(&draft).await?;
    tracing::debug!(template_id = %saved.template_id, actor = %actor, "template saved via api");
    Ok(Json(saved))
}

pub async fn delete_template(
    Extension(engine): Extension<Arc<WorkflowEngine>>,
    Actor(_actor): Actor,
    Query(q): Query<IdQuery>,
) -> Result<Json<Value>, AppError> {
    engine.delete_template(q.id).await?;
    Ok(Json(json!({ "deleted": q.id })))
}
