//! REST surface for the docflow workflow engine.

pub mod actor;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
