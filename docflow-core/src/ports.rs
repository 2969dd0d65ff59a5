//! External collaborators the engine consumes: the user/department
//! directory, the document store and the notification sink.

use crate::events::WorkflowEvent;
use crate::types::{DepartmentId, DocumentId, UserId};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

// ── Directory ──

#[async_trait]
pub trait Directory: Send + Sync {
    /// Members of a department, or `None` when the department is unknown.
    async fn department_members(&self, department: &DepartmentId) -> Result<Option<Vec<UserId>>>;

    async fn is_member(&self, department: &DepartmentId, user: &UserId) -> Result<bool> {
        Ok(self
            .department_members(department)
            .await?
            .is_some_and(|members| members.contains(user)))
    }
}

/// Directory backed by a fixed department → members map (from config).
#[derive(Debug, Default)]
pub struct StaticDirectory {
    departments: HashMap<DepartmentId, Vec<UserId>>,
}

impl StaticDirectory {
    pub fn new(departments: HashMap<DepartmentId, Vec<UserId>>) -> Self {
        Self { departments }
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn department_members(&self, department: &DepartmentId) -> Result<Option<Vec<UserId>>> {
        Ok(self.departments.get(department).cloned())
    }
}

// ── Documents ──

/// What the engine knows about a bound document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: DocumentId,
    pub title: String,
    /// Downloadable artifact reference (opaque URL or key).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn document(&self, id: &DocumentId) -> Result<Option<DocumentRef>>;
}

pub struct MemoryDocumentStore {
    inner: RwLock<HashMap<DocumentId, DocumentRef>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, doc: DocumentRef) -> Result<()> {
        let mut docs = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        docs.insert(doc.id.clone(), doc);
        Ok(())
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn document(&self, id: &DocumentId) -> Result<Option<DocumentRef>> {
        let docs = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(docs.get(id).cloned())
    }
}

// ── Notifications ──

/// Receives engine events. Delivery failures are logged by the engine and
/// never fail the operation that fired them.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &WorkflowEvent) -> Result<()>;
}

/// Sink that writes each event to the tracing log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, event: &WorkflowEvent) -> Result<()> {
        tracing::info!(
            event = event.name(),
            process_id = %event.process_id(),
            "workflow event"
        );
        Ok(())
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: RwLock<Vec<WorkflowEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, event: &WorkflowEvent) -> Result<()> {
        let mut events = self.events.write().map_err(|e| anyhow!("Lock: {}", e))?;
        events.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_directory_membership() {
        let dir = StaticDirectory::new(HashMap::from([(
            "legal".to_string(),
            vec!["dana".to_string(), "erin".to_string()],
        )]));
        assert!(dir.is_member(&"legal".into(), &"erin".into()).await.unwrap());
        assert!(!dir.is_member(&"legal".into(), &"frank".into()).await.unwrap());
        assert!(!dir.is_member(&"finance".into(), &"erin".into()).await.unwrap());
        assert!(dir.department_members(&"finance".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_documents_lookup() {
        let docs = MemoryDocumentStore::new();
        docs.insert(DocumentRef {
            id: "doc-1".into(),
            title: "NDA".into(),
            artifact_url: Some("s3://docs/nda.pdf".into()),
        })
        .unwrap();
        assert_eq!(
            docs.document(&"doc-1".into()).await.unwrap().unwrap().title,
            "NDA"
        );
        assert!(docs.document(&"doc-2".into()).await.unwrap().is_none());
    }
}
