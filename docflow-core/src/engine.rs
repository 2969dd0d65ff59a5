use crate::compliance::ComplianceMonitor;
use crate::error::{Result, ValidationIssue, WorkflowError};
use crate::events::WorkflowEvent;
use crate::execution::{self, entitlement, Entitlement, ExecutionLog};
use crate::instantiate::instantiate;
use crate::ports::{Directory, DocumentRef, DocumentStore, NotificationSink};
use crate::rules::{self, AvailableActions};
use crate::store::{ProcessBatch, WorkflowStore};
use crate::template::{build_template, TemplateDraft};
use crate::types::*;
use anyhow::anyhow;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ── Request / response types ──

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTemplate {
    pub template_id: TemplateId,
    pub version: u64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantiateRequest {
    pub template_id: TemplateId,
    pub document_id: DocumentId,
    #[serde(default)]
    pub name: Option<String>,
}

/// Which processes a caller sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessScope {
    /// Processes with an open execution the caller may act on.
    #[default]
    Assigned,
    /// Processes the caller started.
    Mine,
    All,
}

impl FromStr for ProcessScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "assigned" => Ok(Self::Assigned),
            "mine" => Ok(Self::Mine),
            "all" => Ok(Self::All),
            other => Err(format!("unknown scope '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessView {
    pub process: WorkflowProcess,
    pub executions: Vec<WorkflowExecution>,
    pub document: Option<DocumentRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvanceResult {
    pub execution: WorkflowExecution,
    pub opened: Vec<WorkflowExecution>,
    pub skipped: Vec<WorkflowExecution>,
    pub process: WorkflowProcess,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnResult {
    pub execution: WorkflowExecution,
    pub reopened: WorkflowExecution,
    pub cancelled: Vec<WorkflowExecution>,
    pub process: WorkflowProcess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The process was live and has been cancelled.
    Cancelled,
    /// The process was already closed and has been removed.
    Deleted,
}

// ── Engine ──

/// Entry point for every workflow operation. Each method is one
/// request/response unit against the store.
pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    directory: Arc<dyn Directory>,
    documents: Arc<dyn DocumentStore>,
    notifier: Arc<dyn NotificationSink>,
    monitor: Arc<ComplianceMonitor>,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        directory: Arc<dyn Directory>,
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let monitor = Arc::new(ComplianceMonitor::new(store.clone()));
        Self {
            store,
            directory,
            documents,
            notifier,
            monitor,
        }
    }

    pub fn compliance(&self) -> Arc<ComplianceMonitor> {
        self.monitor.clone()
    }

    async fn emit(&self, event: WorkflowEvent) {
        if let Err(e) = self.notifier.notify(&event).await {
            warn!(event = event.name(), error = %e, "notification failed (non-fatal)");
        }
    }

    // ── Templates ──

    /// Create a template, or fully replace one when the draft carries an id.
    pub async fn save_template(&self, draft: &TemplateDraft) -> Result<SavedTemplate> {
        let previous = match draft.id {
            Some(id) => Some(
                self.store
                    .load_template(id)
                    .await?
                    .ok_or_else(|| WorkflowError::NotFound(format!("template {id}")))?,
            ),
            None => None,
        };

        let built = build_template(draft, previous.as_ref(), Utc::now())?;
        let issues = self.unresolvable_departments(&built.template).await?;
        if !issues.is_empty() {
            return Err(WorkflowError::Validation(issues));
        }

        self.store.save_template(&built.template).await?;
        info!(
            template_id = %built.template.id,
            version = built.template.version,
            steps = built.template.steps.len(),
            "template saved"
        );
        Ok(SavedTemplate {
            template_id: built.template.id,
            version: built.template.version,
            warnings: built.warnings,
        })
    }

    async fn unresolvable_departments(&self, tpl: &WorkflowTemplate) -> Result<Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        for step in &tpl.steps {
            if let StepConfig::User {
                assignee: Assignee::Department(dept),
                ..
            } = &step.config
            {
                let members = self.directory.department_members(dept).await?;
                if members.map_or(true, |m| m.is_empty()) {
                    issues.push(ValidationIssue::new(
                        "T5",
                        format!(
                            "Step '{}' is assigned to department '{dept}' which has no members",
                            step.name
                        ),
                    ));
                }
            }
        }
        Ok(issues)
    }

    pub async fn get_template(&self, id: TemplateId) -> Result<WorkflowTemplate> {
        self.store
            .load_template(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("template {id}")))
    }

    pub async fn list_templates(&self) -> Result<Vec<WorkflowTemplate>> {
        Ok(self.store.list_templates().await?)
    }

    /// Refused while any non-cancelled process references the template.
    pub async fn delete_template(&self, id: TemplateId) -> Result<()> {
        let template = self.get_template(id).await?;
        let live = self.store.count_live_processes(id).await?;
        if live > 0 {
            return Err(WorkflowError::Dependency(format!(
                "template '{}' is referenced by {live} process(es)",
                template.name
            )));
        }
        self.store.delete_template(id).await?;
        info!(template_id = %id, "template deleted");
        Ok(())
    }

    // ── Processes ──

    pub async fn instantiate(
        &self,
        req: InstantiateRequest,
        started_by: &UserId,
    ) -> Result<WorkflowProcess> {
        let template = self.get_template(req.template_id).await?;
        if template.status != TemplateStatus::Active {
            return Err(WorkflowError::TemplateNotActive(format!(
                "template '{}' is {:?}",
                template.name, template.status
            )));
        }
        let document = self
            .documents
            .document(&req.document_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("document {}", req.document_id)))?;

        let name = req
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("{}: {}", template.name, document.title));
        let inst = instantiate(
            &template,
            document.id.clone(),
            name,
            started_by.clone(),
            Utc::now(),
        )?;

        // Log first, so a sweep never sees the process without its entry execution.
        self.store.save_execution(&inst.first).await?;
        self.store.save_process(&inst.process).await?;
        info!(
            process_id = %inst.process.id,
            template_id = %template.id,
            document_id = %document.id,
            "process started"
        );

        self.emit(WorkflowEvent::ProcessStarted {
            process_id: inst.process.id,
            template_id: template.id,
            document_id: document.id,
            started_by: started_by.clone(),
        })
        .await;
        self.emit(activated(&inst.first)).await;
        Ok(inst.process)
    }

    async fn load_process(&self, id: ProcessId) -> Result<WorkflowProcess> {
        self.store
            .load_process(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("process {id}")))
    }

    pub async fn get_process(&self, id: ProcessId) -> Result<ProcessView> {
        let process = self.load_process(id).await?;
        let executions = self.store.executions_for_process(id).await?;
        let document = self.documents.document(&process.document_id).await?;
        Ok(ProcessView {
            process,
            executions,
            document,
        })
    }

    pub async fn list_processes(
        &self,
        scope: ProcessScope,
        actor: &UserId,
    ) -> Result<Vec<WorkflowProcess>> {
        let processes = self.store.list_processes().await?;
        match scope {
            ProcessScope::All => Ok(processes),
            ProcessScope::Mine => Ok(processes
                .into_iter()
                .filter(|p| &p.started_by == actor)
                .collect()),
            ProcessScope::Assigned => {
                let mut out = Vec::new();
                for p in processes.into_iter().filter(|p| !p.status.is_terminal()) {
                    let log = self.store.executions_for_process(p.id).await?;
                    for e in ExecutionLog::new(&log).open() {
                        if self.may_act(e, actor).await? {
                            out.push(p);
                            break;
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    /// Whether `actor` may act on `execution` right now, resolving a
    /// department claim against the directory.
    pub async fn may_act(&self, execution: &WorkflowExecution, actor: &UserId) -> Result<bool> {
        Ok(match entitlement(execution, actor) {
            Entitlement::Assignee | Entitlement::Target => true,
            Entitlement::DepartmentClaim(dept) => self.directory.is_member(&dept, actor).await?,
            Entitlement::None => false,
        })
    }

    /// Apply `batch`, or fail with `InvalidState` when the process or one of
    /// the guarded executions moved since it was loaded.
    async fn commit(&self, batch: ProcessBatch) -> Result<ProcessBatch> {
        let id = batch.process.id;
        self.store.commit(batch).await?.ok_or_else(|| {
            WorkflowError::InvalidState(format!("process {id} changed concurrently"))
        })
    }

    /// Load an open execution of an active process and check `actor` may
    /// act on it. Returns the execution with a department claim applied.
    async fn actionable(
        &self,
        process_id: ProcessId,
        execution_id: ExecutionId,
        actor: &UserId,
    ) -> Result<(WorkflowProcess, WorkflowExecution)> {
        let process = self.load_process(process_id).await?;
        let mut execution = self
            .store
            .load_execution(execution_id)
            .await?
            .filter(|e| e.process_id == process_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("execution {execution_id}")))?;

        if process.status != ProcessStatus::Active {
            return Err(WorkflowError::InvalidState(format!(
                "process {} is {:?}",
                process.id, process.status
            )));
        }
        if !execution.is_open() {
            return Err(WorkflowError::InvalidState(format!(
                "execution {} is {:?}",
                execution.id, execution.status
            )));
        }

        match entitlement(&execution, actor) {
            Entitlement::Assignee | Entitlement::Target => {}
            Entitlement::DepartmentClaim(dept) => {
                if !self.directory.is_member(&dept, actor).await? {
                    return Err(WorkflowError::Forbidden(format!(
                        "{actor} is not a member of department '{dept}'"
                    )));
                }
                execution.assigned_to = Some(actor.clone());
            }
            Entitlement::None => {
                return Err(WorkflowError::Forbidden(format!(
                    "{actor} is not assigned to execution {}",
                    execution.id
                )));
            }
        }
        Ok((process, execution))
    }

    /// Open a pending execution. A department member claims it by starting.
    pub async fn start_execution(
        &self,
        process_id: ProcessId,
        execution_id: ExecutionId,
        actor: &UserId,
    ) -> Result<WorkflowExecution> {
        let (process, mut execution) = self.actionable(process_id, execution_id, actor).await?;
        if execution.status == ExecutionStatus::InProgress {
            return Ok(execution);
        }
        execution.status = ExecutionStatus::InProgress;
        let mut batch = ProcessBatch::new(process);
        batch.updated.push(execution);
        let execution = self
            .commit(batch)
            .await?
            .updated
            .pop()
            .ok_or_else(|| dropped("execution"))?;
        debug!(execution_id = %execution_id, actor = %actor, "execution started");
        Ok(execution)
    }

    /// Actions `execution_id` currently allows.
    pub async fn available_actions(
        &self,
        process_id: ProcessId,
        execution_id: ExecutionId,
    ) -> Result<AvailableActions> {
        let process = self.load_process(process_id).await?;
        let execution = self
            .store
            .load_execution(execution_id)
            .await?
            .filter(|e| e.process_id == process_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("execution {execution_id}")))?;
        Ok(rules::evaluate(&process.snapshot, &execution))
    }

    /// Record an action on an execution and move the process forward.
    /// `back` is routed to [`return_execution`](Self::return_execution).
    pub async fn advance(
        &self,
        process_id: ProcessId,
        execution_id: ExecutionId,
        actor: &UserId,
        action: ActionKind,
        comments: Option<String>,
    ) -> Result<AdvanceResult> {
        if action == ActionKind::Back {
            let r = self
                .return_execution(process_id, execution_id, actor, comments)
                .await?;
            return Ok(AdvanceResult {
                execution: r.execution,
                opened: vec![r.reopened],
                skipped: Vec::new(),
                process: r.process,
            });
        }

        let (mut process, execution) = self.actionable(process_id, execution_id, actor).await?;

        let available = rules::evaluate(&process.snapshot, &execution);
        let own = process
            .snapshot
            .step(execution.step_id)
            .and_then(|s| s.config.action_type())
            .map(|t| t.performing_actions())
            .unwrap_or_default();
        if !available.allows(action) && !own.contains(&action) {
            let names: Vec<&str> = available.actions.iter().map(|a| a.as_str()).collect();
            return Err(WorkflowError::invalid(
                "A1",
                format!(
                    "Action '{action}' is not available here; allowed: [{}]",
                    names.join(", ")
                ),
            ));
        }

        let log = self.store.executions_for_process(process_id).await?;
        let now = Utc::now();
        let plan = execution::plan_advance(
            &process.snapshot,
            &log,
            &execution,
            actor,
            action,
            comments,
            now,
        )?;

        process.current_step_id = plan.current_step;
        if plan.process_completed {
            process.status = ProcessStatus::Completed;
            process.completed_at = Some(now);
        }
        let mut batch = ProcessBatch::new(process);
        batch.updated.push(plan.execution);
        batch.inserted.extend(plan.opened.iter().cloned());
        batch.inserted.extend(plan.skipped.iter().cloned());
        let ProcessBatch {
            process,
            mut updated,
            ..
        } = self.commit(batch).await?;
        let execution = updated.pop().ok_or_else(|| dropped("execution"))?;

        info!(
            process_id = %process_id,
            execution_id = %execution_id,
            actor = %actor,
            action = %action,
            completed = plan.completed,
            opened = plan.opened.len(),
            "execution advanced"
        );

        if plan.completed {
            self.emit(WorkflowEvent::ExecutionCompleted {
                process_id,
                execution_id,
                step_id: execution.step_id,
                actor: actor.clone(),
                action,
            })
            .await;
        }
        for e in &plan.opened {
            self.emit(activated(e)).await;
        }
        if plan.process_completed {
            self.emit(WorkflowEvent::ProcessCompleted { process_id }).await;
        }

        Ok(AdvanceResult {
            execution,
            opened: plan.opened,
            skipped: plan.skipped,
            process,
        })
    }

    /// Send the process back to its most recent completed action step.
    pub async fn return_execution(
        &self,
        process_id: ProcessId,
        execution_id: ExecutionId,
        actor: &UserId,
        comments: Option<String>,
    ) -> Result<ReturnResult> {
        let (mut process, execution) = self.actionable(process_id, execution_id, actor).await?;
        let log = self.store.executions_for_process(process_id).await?;
        let plan = execution::plan_return(&process.snapshot, &log, &execution, comments, Utc::now())?;

        process.current_step_id = Some(plan.current_step);
        let mut batch = ProcessBatch::new(process);
        batch.updated.push(plan.execution);
        batch.updated.push(plan.reopened);
        batch.updated.extend(plan.cancelled);
        let ProcessBatch {
            process, updated, ..
        } = self.commit(batch).await?;
        let mut updated = updated.into_iter();
        let execution = updated.next().ok_or_else(|| dropped("execution"))?;
        let reopened = updated.next().ok_or_else(|| dropped("reopened execution"))?;
        let cancelled: Vec<WorkflowExecution> = updated.collect();

        info!(
            process_id = %process_id,
            execution_id = %execution_id,
            returned_to = %plan.current_step,
            cancelled = cancelled.len(),
            "execution returned"
        );
        self.emit(WorkflowEvent::ExecutionReturned {
            process_id,
            from_step_id: execution.step_id,
            to_step_id: plan.current_step,
            actor: actor.clone(),
            comments: execution.comments.clone(),
        })
        .await;
        self.emit(activated(&reopened)).await;

        Ok(ReturnResult {
            execution,
            reopened,
            cancelled,
            process,
        })
    }

    fn ensure_owner(process: &WorkflowProcess, actor: &UserId) -> Result<()> {
        if &process.started_by != actor {
            return Err(WorkflowError::Forbidden(format!(
                "only {} may manage process {}",
                process.started_by, process.id
            )));
        }
        Ok(())
    }

    /// Cancel a live process and every open execution on it.
    pub async fn cancel_process(&self, id: ProcessId, actor: &UserId) -> Result<WorkflowProcess> {
        let mut process = self.load_process(id).await?;
        Self::ensure_owner(&process, actor)?;
        if process.status.is_terminal() {
            return Err(WorkflowError::InvalidState(format!(
                "process {id} is already {:?}",
                process.status
            )));
        }

        let now = Utc::now();
        let log = self.store.executions_for_process(id).await?;
        process.status = ProcessStatus::Cancelled;
        process.completed_at = Some(now);
        process.current_step_id = None;
        let mut batch = ProcessBatch::new(process);
        for e in ExecutionLog::new(&log).open() {
            let mut closed = e.clone();
            closed.status = ExecutionStatus::Cancelled;
            closed.completed_at = Some(now);
            batch.updated.push(closed);
        }
        let process = self.commit(batch).await?.process;

        info!(process_id = %id, actor = %actor, "process cancelled");
        self.emit(WorkflowEvent::ProcessCancelled {
            process_id: id,
            cancelled_by: actor.clone(),
        })
        .await;
        Ok(process)
    }

    pub async fn pause_process(&self, id: ProcessId, actor: &UserId) -> Result<WorkflowProcess> {
        self.set_status(id, actor, ProcessStatus::Active, ProcessStatus::Paused)
            .await
    }

    pub async fn resume_process(&self, id: ProcessId, actor: &UserId) -> Result<WorkflowProcess> {
        self.set_status(id, actor, ProcessStatus::Paused, ProcessStatus::Active)
            .await
    }

    async fn set_status(
        &self,
        id: ProcessId,
        actor: &UserId,
        from: ProcessStatus,
        to: ProcessStatus,
    ) -> Result<WorkflowProcess> {
        let mut process = self.load_process(id).await?;
        Self::ensure_owner(&process, actor)?;
        if process.status != from {
            return Err(WorkflowError::InvalidState(format!(
                "process {id} is {:?}, expected {from:?}",
                process.status
            )));
        }
        process.status = to;
        let process = self.commit(ProcessBatch::new(process)).await?.process;
        info!(process_id = %id, status = ?to, "process status changed");
        Ok(process)
    }

    /// Cancel a live process, or remove one that is already closed.
    pub async fn delete_process(&self, id: ProcessId, actor: &UserId) -> Result<DeleteOutcome> {
        let process = self.load_process(id).await?;
        Self::ensure_owner(&process, actor)?;
        if !process.status.is_terminal() {
            self.cancel_process(id, actor).await?;
            return Ok(DeleteOutcome::Cancelled);
        }
        self.store.delete_process(id).await?;
        info!(process_id = %id, "process deleted");
        Ok(DeleteOutcome::Deleted)
    }
}

fn dropped(what: &str) -> WorkflowError {
    WorkflowError::Store(anyhow!("commit returned no {what}"))
}

fn activated(e: &WorkflowExecution) -> WorkflowEvent {
    WorkflowEvent::StepActivated {
        process_id: e.process_id,
        execution_id: e.id,
        step_id: e.step_id,
        assigned_to: e.assigned_to.clone(),
        assigned_department_id: e.assigned_department_id.clone(),
        notify: e.outstanding_actors().into_iter().cloned().collect(),
    }
}
