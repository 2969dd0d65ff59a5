//! Workflow template and process-execution engine for document approval and
//! signature flows.
//!
//! - [`template`]: step/transition graph authoring and validation
//! - [`instantiate`]: binding an active template to a document
//! - [`execution`]: per-step lifecycle (advance, return, assignment)
//! - [`rules`]: legal actions for an execution
//! - [`compliance`]: drift detection and idempotent remediation
//! - [`engine`]: the store-backed facade over all of the above

pub mod compliance;
pub mod engine;
pub mod error;
pub mod events;
pub mod execution;
pub mod instantiate;
pub mod ports;
pub mod rules;
pub mod store;
pub mod store_memory;
pub mod template;
pub mod types;

pub use engine::WorkflowEngine;
pub use error::{Result, ValidationIssue, WorkflowError};
