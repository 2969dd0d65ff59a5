use crate::types::*;
use serde::{Deserialize, Serialize};

/// Engine events handed to the notification sink on every step transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    ProcessStarted {
        process_id: ProcessId,
        template_id: TemplateId,
        document_id: DocumentId,
        started_by: UserId,
    },
    /// A step became reachable and an execution was opened for it.
    StepActivated {
        process_id: ProcessId,
        execution_id: ExecutionId,
        step_id: StepId,
        assigned_to: Option<UserId>,
        assigned_department_id: Option<DepartmentId>,
        /// Action-step targets still owed an action.
        notify: Vec<UserId>,
    },
    ExecutionCompleted {
        process_id: ProcessId,
        execution_id: ExecutionId,
        step_id: StepId,
        actor: UserId,
        action: ActionKind,
    },
    /// A `return` moved the process back to an earlier action step.
    ExecutionReturned {
        process_id: ProcessId,
        from_step_id: StepId,
        to_step_id: StepId,
        actor: UserId,
        comments: Option<String>,
    },
    ProcessCompleted {
        process_id: ProcessId,
    },
    ProcessCancelled {
        process_id: ProcessId,
        cancelled_by: UserId,
    },
}

impl WorkflowEvent {
    pub fn process_id(&self) -> ProcessId {
        match self {
            Self::ProcessStarted { process_id, .. }
            | Self::StepActivated { process_id, .. }
            | Self::ExecutionCompleted { process_id, .. }
            | Self::ExecutionReturned { process_id, .. }
            | Self::ProcessCompleted { process_id }
            | Self::ProcessCancelled { process_id, .. } => *process_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ProcessStarted { .. } => "process_started",
            Self::StepActivated { .. } => "step_activated",
            Self::ExecutionCompleted { .. } => "execution_completed",
            Self::ExecutionReturned { .. } => "execution_returned",
            Self::ProcessCompleted { .. } => "process_completed",
            Self::ProcessCancelled { .. } => "process_cancelled",
        }
    }
}
