use crate::types::*;
use anyhow::Result;
use async_trait::async_trait;

/// Writes against one process that land together or not at all.
///
/// Every record carries the `revision` it was loaded at. A commit applies
/// only if the stored process and every stored execution in `updated` are
/// still at those revisions. Those records are then bumped by one.
#[derive(Debug, Clone)]
pub struct ProcessBatch {
    pub process: WorkflowProcess,
    pub updated: Vec<WorkflowExecution>,
    pub inserted: Vec<WorkflowExecution>,
}

impl ProcessBatch {
    pub fn new(process: WorkflowProcess) -> Self {
        Self {
            process,
            updated: Vec::new(),
            inserted: Vec::new(),
        }
    }

    /// Revisions as the store holds them after a successful commit.
    pub fn committed(mut self) -> Self {
        self.process.revision += 1;
        for e in &mut self.updated {
            e.revision += 1;
        }
        self
    }
}

/// Persistence port for templates, processes and executions.
///
/// Each method is one store transaction. The engine does no locking of its
/// own; racing writers are serialized by [`commit`], which also bumps the
/// process revision, so two operations on the same process never both land
/// from the same snapshot.
///
/// [`commit`]: WorkflowStore::commit
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    // ── Templates ──

    /// Insert, or fully replace the steps and transitions of an existing
    /// template. Last write wins.
    async fn save_template(&self, template: &WorkflowTemplate) -> Result<()>;
    async fn load_template(&self, id: TemplateId) -> Result<Option<WorkflowTemplate>>;
    async fn list_templates(&self) -> Result<Vec<WorkflowTemplate>>;
    /// Returns false when nothing was deleted.
    async fn delete_template(&self, id: TemplateId) -> Result<bool>;

    // ── Processes ──

    async fn save_process(&self, process: &WorkflowProcess) -> Result<()>;
    async fn load_process(&self, id: ProcessId) -> Result<Option<WorkflowProcess>>;
    async fn list_processes(&self) -> Result<Vec<WorkflowProcess>>;
    /// Removes the process and its execution log.
    async fn delete_process(&self, id: ProcessId) -> Result<bool>;
    /// Processes referencing `template_id` whose status is not `cancelled`.
    async fn count_live_processes(&self, template_id: TemplateId) -> Result<usize>;

    // ── Executions ──

    /// Unconditional upsert, for seeding new records.
    async fn save_execution(&self, execution: &WorkflowExecution) -> Result<()>;
    async fn load_execution(&self, id: ExecutionId) -> Result<Option<WorkflowExecution>>;
    /// Execution log of one process, ordered by `seq`.
    async fn executions_for_process(&self, process_id: ProcessId)
        -> Result<Vec<WorkflowExecution>>;
    /// Apply `batch` atomically if no guarded record changed since it was
    /// loaded. Returns the batch at its new revisions, or `None` on a miss.
    async fn commit(&self, batch: ProcessBatch) -> Result<Option<ProcessBatch>>;
}
