use std::fmt;
use thiserror::Error;

/// One problem found while validating a template draft or a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub rule: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(rule: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("validation failed: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("template not active: {0}")]
    TemplateNotActive(String),

    #[error("dependency: {0}")]
    Dependency(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("store: {0}")]
    Store(#[from] anyhow::Error),
}

impl WorkflowError {
    /// Single-issue validation error.
    pub fn invalid(rule: &str, message: impl Into<String>) -> Self {
        Self::Validation(vec![ValidationIssue::new(rule, message)])
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::TemplateNotActive(_) => 409,
            Self::Dependency(_) => 400,
            Self::InvalidState(_) => 409,
            Self::Forbidden(_) => 403,
            Self::Store(_) => 500,
        }
    }

    /// Store failures carry internal detail and must not reach clients.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
