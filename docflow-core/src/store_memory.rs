use crate::store::{ProcessBatch, WorkflowStore};
use crate::types::*;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Inner {
    templates: HashMap<TemplateId, WorkflowTemplate>,
    processes: HashMap<ProcessId, WorkflowProcess>,
    executions: HashMap<ExecutionId, WorkflowExecution>,
}

/// In-memory WorkflowStore for tests and single-node deployments.
///
/// One lock guards all three tables so every method is atomic.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn save_template(&self, template: &WorkflowTemplate) -> Result<()> {
        let mut inner = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        inner.templates.insert(template.id, template.clone());
        Ok(())
    }

    async fn load_template(&self, id: TemplateId) -> Result<Option<WorkflowTemplate>> {
        let inner = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(inner.templates.get(&id).cloned())
    }

    async fn list_templates(&self) -> Result<Vec<WorkflowTemplate>> {
        let inner = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        let mut templates: Vec<_> = inner.templates.values().cloned().collect();
        templates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(templates)
    }

    async fn delete_template(&self, id: TemplateId) -> Result<bool> {
        let mut inner = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(inner.templates.remove(&id).is_some())
    }

    async fn save_process(&self, process: &WorkflowProcess) -> Result<()> {
        let mut inner = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        inner.processes.insert(process.id, process.clone());
        Ok(())
    }

    async fn load_process(&self, id: ProcessId) -> Result<Option<WorkflowProcess>> {
        let inner = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(inner.processes.get(&id).cloned())
    }

    async fn list_processes(&self) -> Result<Vec<WorkflowProcess>> {
        let inner = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        let mut processes: Vec<_> = inner.processes.values().cloned().collect();
        processes.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        Ok(processes)
    }

    async fn delete_process(&self, id: ProcessId) -> Result<bool> {
        let mut inner = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        let removed = inner.processes.remove(&id).is_some();
        inner.executions.retain(|_, e| e.process_id != id);
        Ok(removed)
    }

    async fn count_live_processes(&self, template_id: TemplateId) -> Result<usize> {
        let inner = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(inner
            .processes
            .values()
            .filter(|p| p.template_id == template_id && p.status != ProcessStatus::Cancelled)
            .count())
    }

    async fn save_execution(&self, execution: &WorkflowExecution) -> Result<()> {
        let mut inner = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        inner.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn load_execution(&self, id: ExecutionId) -> Result<Option<WorkflowExecution>> {
        let inner = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(inner.executions.get(&id).cloned())
    }

    async fn executions_for_process(
        &self,
        process_id: ProcessId,
    ) -> Result<Vec<WorkflowExecution>> {
        let inner = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        let mut log: Vec<_> = inner
            .executions
            .values()
            .filter(|e| e.process_id == process_id)
            .cloned()
            .collect();
        log.sort_by_key(|e| e.seq);
        Ok(log)
    }

    async fn commit(&self, batch: ProcessBatch) -> Result<Option<ProcessBatch>> {
        let mut inner = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        let pid = batch.process.id;
        let process_current = inner
            .processes
            .get(&pid)
            .is_some_and(|p| p.revision == batch.process.revision);
        let executions_current = batch.updated.iter().all(|e| {
            inner
                .executions
                .get(&e.id)
                .is_some_and(|s| s.process_id == pid && s.revision == e.revision)
        });
        let inserts_fresh = batch
            .inserted
            .iter()
            .all(|e| e.process_id == pid && !inner.executions.contains_key(&e.id));
        if !(process_current && executions_current && inserts_fresh) {
            return Ok(None);
        }

        let batch = batch.committed();
        inner.processes.insert(pid, batch.process.clone());
        for e in batch.updated.iter().chain(batch.inserted.iter()) {
            inner.executions.insert(e.id, e.clone());
        }
        Ok(Some(batch))
    }
}
