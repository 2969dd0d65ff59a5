use crate::error::{Result, WorkflowError};
use crate::execution::open_execution;
use crate::template::TemplateGraph;
use crate::types::*;
use uuid::Uuid;

/// A new process and the execution opened for its entry step.
#[derive(Debug, Clone)]
pub struct Instantiation {
    pub process: WorkflowProcess,
    pub first: WorkflowExecution,
}

/// Bind an active template to a document.
///
/// The template's steps and transitions are copied into the process, so
/// later template edits never reach it. The entry step is the lowest-order
/// step with no incoming transition.
pub fn instantiate(
    template: &WorkflowTemplate,
    document_id: DocumentId,
    name: String,
    started_by: UserId,
    now: Timestamp,
) -> Result<Instantiation> {
    if template.status != TemplateStatus::Active {
        return Err(WorkflowError::TemplateNotActive(format!(
            "template '{}' is {:?}",
            template.name, template.status
        )));
    }

    let snapshot = TemplateSnapshot::capture(template);
    let entry = TemplateGraph::from_snapshot(&snapshot)
        .entry_step()
        .and_then(|id| snapshot.step(id))
        .cloned()
        .ok_or_else(|| WorkflowError::invalid("T1", "Template must have at least one step"))?;

    let process_id = Uuid::now_v7();
    let first = open_execution(process_id, &entry, 1, now);
    let process = WorkflowProcess {
        id: process_id,
        template_id: template.id,
        snapshot,
        document_id,
        name,
        status: ProcessStatus::Active,
        current_step_id: Some(entry.id),
        started_by,
        started_at: now,
        completed_at: None,
        revision: 0,
    };
    Ok(Instantiation { process, first })
}
