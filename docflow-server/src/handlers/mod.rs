pub mod compliance;
pub mod executions;
pub mod health;
pub mod processes;
pub mod templates;
