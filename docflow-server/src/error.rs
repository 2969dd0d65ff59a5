//! HTTP mapping for engine errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docflow_core::WorkflowError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("missing x-actor-id header")]
    MissingActor,

    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<IssueBody>,
}

#[derive(Debug, Serialize)]
pub struct IssueBody {
    pub rule: String,
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Workflow(e) => {
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            AppError::MissingActor => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Workflow(e) if e.is_internal() => {
                tracing::error!(error = ?e, "request failed");
                ErrorResponse {
                    error: "internal error".to_string(),
                    issues: Vec::new(),
                }
            }
            AppError::Workflow(WorkflowError::Validation(issues)) => ErrorResponse {
                error: self.to_string(),
                issues: issues
                    .iter()
                    .map(|i| IssueBody {
                        rule: i.rule.clone(),
                        message: i.message.clone(),
                    })
                    .collect(),
            },
            _ => ErrorResponse {
                error: self.to_string(),
                issues: Vec::new(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::from(WorkflowError::invalid("T1", "x")), 400),
            (WorkflowError::NotFound("x".into()).into(), 404),
            (WorkflowError::TemplateNotActive("x".into()).into(), 409),
            (WorkflowError::Dependency("x".into()).into(), 400),
            (WorkflowError::InvalidState("x".into()).into(), 409),
            (WorkflowError::Forbidden("x".into()).into(), 403),
            (AppError::MissingActor, 401),
            (AppError::BadRequest("x".into()), 400),
        ];
        for (err, code) in cases {
            assert_eq!(err.into_response().status().as_u16(), code);
        }
    }

    #[tokio::test]
    async fn validation_lists_issues() {
        let err: AppError = WorkflowError::invalid("T5", "User step 'File' has no assignee").into();
        let json = body_json(err.into_response()).await;
        assert_eq!(json["issues"][0]["rule"], "T5");
        assert!(json["error"].as_str().unwrap().contains("'File'"));
    }

    #[tokio::test]
    async fn store_failures_are_masked() {
        let err: AppError = WorkflowError::Store(anyhow::anyhow!("lock poisoned")).into();
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "internal error");
        assert!(json.get("issues").is_none());
    }
}
