//! Drift detection between a process's live state and its template snapshot,
//! plus idempotent remediation.
//!
//! [`inspect`] and [`plan_remediation`] are pure. [`ComplianceMonitor`] loads
//! state from the store, applies plans and aggregates across processes.

pub mod sweep;

use crate::error::{Result, WorkflowError};
use crate::execution::{assign, open_execution, ExecutionLog};
use crate::store::{ProcessBatch, WorkflowStore};
use crate::template::TemplateGraph;
use crate::types::*;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

// ── Report types ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// `current_step_id` names a step with no open execution.
    MissingExecution,
    /// `current_step_id` disagrees with the latest open execution.
    PointerDrift,
    /// Active process with no position and nothing open.
    MissingCurrentStep,
    /// A pointer or open execution refers to a step outside the snapshot.
    UnknownStep,
    DuplicateOpen,
    /// Open executions on steps that lie on the same path.
    UnexpectedParallel,
    AssigneeMismatch,
    OpenOnClosedProcess,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
}

/// Who the current step expects to act, per the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedStep {
    pub step_id: StepId,
    pub name: String,
    pub step_type: String,
    pub assigned_to: Option<UserId>,
    pub department_id: Option<DepartmentId>,
    pub target_users: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub process_id: ProcessId,
    pub is_compliant: bool,
    pub violations: Vec<Violation>,
    pub expected: Option<ExpectedStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionKind {
    CreatedExecution,
    CancelledDuplicate,
    CancelledConflicting,
    CancelledUnknownStep,
    CancelledOnClosedProcess,
    Reassigned,
    PointerReset,
    CompletedProcess,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correction {
    pub kind: CorrectionKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
}

/// Records to write for one remediation.
#[derive(Debug, Clone, Default)]
pub struct Remediation {
    pub corrections: Vec<Correction>,
    pub created: Vec<WorkflowExecution>,
    /// Open executions to overwrite (closed or reassigned), still at the
    /// revision they were loaded at.
    pub updated: Vec<WorkflowExecution>,
    pub process: Option<WorkflowProcess>,
}

impl Remediation {
    pub fn is_empty(&self) -> bool {
        self.corrections.is_empty()
    }
}

fn expected_step(step: &WorkflowStep) -> ExpectedStep {
    let a = assign(step);
    ExpectedStep {
        step_id: step.id,
        name: step.name.clone(),
        step_type: step.config.kind_label().to_string(),
        assigned_to: a.assigned_to,
        department_id: a.assigned_department_id,
        target_users: a.required_actors,
    }
}

/// Open executions that must be closed so the survivors form a valid
/// position: unknown steps, older duplicates per step, and older executions
/// on the same path as a newer one. The most recent execution always wins.
fn conflicting_open<'a>(
    snapshot: &TemplateSnapshot,
    graph: &TemplateGraph<'_>,
    log: &'a [WorkflowExecution],
) -> Vec<(&'a WorkflowExecution, ViolationKind)> {
    let mut open: Vec<&WorkflowExecution> = ExecutionLog::new(log).open().collect();
    open.sort_by(|a, b| b.seq.cmp(&a.seq));

    let mut kept: Vec<&WorkflowExecution> = Vec::new();
    let mut out = Vec::new();
    for e in open {
        if snapshot.step(e.step_id).is_none() {
            out.push((e, ViolationKind::UnknownStep));
        } else if kept.iter().any(|k| k.step_id == e.step_id) {
            out.push((e, ViolationKind::DuplicateOpen));
        } else if kept
            .iter()
            .any(|k| !graph.may_run_concurrently(k.step_id, e.step_id))
        {
            out.push((e, ViolationKind::UnexpectedParallel));
        } else {
            kept.push(e);
        }
    }
    out
}

/// Check one process against its snapshot.
pub fn inspect(process: &WorkflowProcess, log: &[WorkflowExecution]) -> ComplianceReport {
    let snapshot = &process.snapshot;
    let view = ExecutionLog::new(log);
    let mut violations = Vec::new();

    if process.status.is_terminal() {
        for e in view.open() {
            violations.push(Violation {
                kind: ViolationKind::OpenOnClosedProcess,
                message: format!(
                    "Execution {} is still open on a {:?} process",
                    e.id, process.status
                ),
                step_id: Some(e.step_id),
                execution_id: Some(e.id),
            });
        }
        return ComplianceReport {
            process_id: process.id,
            is_compliant: violations.is_empty(),
            violations,
            expected: None,
        };
    }

    let graph = TemplateGraph::from_snapshot(snapshot);
    let conflicts = conflicting_open(snapshot, &graph, log);
    for (e, kind) in &conflicts {
        let message = match kind {
            ViolationKind::UnknownStep => {
                format!("Execution {} is open on unknown step {}", e.id, e.step_id)
            }
            ViolationKind::DuplicateOpen => {
                format!("Step {} has more than one open execution", e.step_id)
            }
            _ => format!(
                "Execution {} is open alongside a later step on the same path",
                e.id
            ),
        };
        violations.push(Violation {
            kind: *kind,
            message,
            step_id: Some(e.step_id),
            execution_id: Some(e.id),
        });
    }

    let closing: HashSet<ExecutionId> = conflicts.iter().map(|(e, _)| e.id).collect();
    for e in view.open().filter(|e| !closing.contains(&e.id)) {
        if let Some(step) = snapshot.step(e.step_id) {
            if !assign(step).matches(e) {
                violations.push(Violation {
                    kind: ViolationKind::AssigneeMismatch,
                    message: format!(
                        "Execution {} is not assigned as step '{}' declares",
                        e.id, step.name
                    ),
                    step_id: Some(step.id),
                    execution_id: Some(e.id),
                });
            }
        }
    }

    let derived = view.current_step();
    match process.current_step_id {
        Some(s) if snapshot.step(s).is_none() => violations.push(Violation {
            kind: ViolationKind::UnknownStep,
            message: format!("Current step {s} is not part of the process template"),
            step_id: Some(s),
            execution_id: None,
        }),
        Some(s) => match derived {
            None => violations.push(Violation {
                kind: ViolationKind::MissingExecution,
                message: format!("Current step {s} has no open execution"),
                step_id: Some(s),
                execution_id: None,
            }),
            Some(d) if d != s => violations.push(Violation {
                kind: ViolationKind::PointerDrift,
                message: format!("Current step {s} differs from the latest open step {d}"),
                step_id: Some(s),
                execution_id: None,
            }),
            Some(_) => {}
        },
        None => match derived {
            Some(d) => violations.push(Violation {
                kind: ViolationKind::PointerDrift,
                message: format!("Current step is unset while step {d} is open"),
                step_id: Some(d),
                execution_id: None,
            }),
            None => violations.push(Violation {
                kind: ViolationKind::MissingCurrentStep,
                message: "Process has no current step and nothing open".to_string(),
                step_id: None,
                execution_id: None,
            }),
        },
    }

    let expected = process
        .current_step_id
        .or(derived)
        .and_then(|id| snapshot.step(id))
        .map(expected_step);

    ComplianceReport {
        process_id: process.id,
        is_compliant: violations.is_empty(),
        violations,
        expected,
    }
}

/// Compute the corrective writes for one process.
///
/// Only open executions are ever closed or reassigned; completed history is
/// left untouched. Applying the result and planning again yields nothing.
pub fn plan_remediation(
    process: &WorkflowProcess,
    log: &[WorkflowExecution],
    now: Timestamp,
) -> Remediation {
    let snapshot = &process.snapshot;
    let mut plan = Remediation::default();
    let close = |e: &WorkflowExecution| {
        let mut e = e.clone();
        e.status = ExecutionStatus::Cancelled;
        e.completed_at = Some(now);
        e
    };

    if process.status.is_terminal() {
        for e in ExecutionLog::new(log).open() {
            plan.updated.push(close(e));
            plan.corrections.push(Correction {
                kind: CorrectionKind::CancelledOnClosedProcess,
                message: format!("Cancelled execution {} on closed process", e.id),
                execution_id: Some(e.id),
            });
        }
        return plan;
    }

    let graph = TemplateGraph::from_snapshot(snapshot);
    let mut work: Vec<WorkflowExecution> = log.to_vec();

    for (e, kind) in conflicting_open(snapshot, &graph, log) {
        let correction = match kind {
            ViolationKind::UnknownStep => CorrectionKind::CancelledUnknownStep,
            ViolationKind::DuplicateOpen => CorrectionKind::CancelledDuplicate,
            _ => CorrectionKind::CancelledConflicting,
        };
        let closed = close(e);
        if let Some(w) = work.iter_mut().find(|w| w.id == e.id) {
            *w = closed.clone();
        }
        plan.updated.push(closed);
        plan.corrections.push(Correction {
            kind: correction,
            message: format!("Cancelled execution {} on step {}", e.id, e.step_id),
            execution_id: Some(e.id),
        });
    }

    for w in work.iter_mut().filter(|w| w.is_open()) {
        let Some(step) = snapshot.step(w.step_id) else {
            continue;
        };
        let expected = assign(step);
        if !expected.matches(w) {
            expected.apply_to(w);
            plan.updated.push(w.clone());
            plan.corrections.push(Correction {
                kind: CorrectionKind::Reassigned,
                message: format!("Reassigned execution {} per step '{}'", w.id, step.name),
                execution_id: Some(w.id),
            });
        }
    }

    let mut process_update = process.clone();
    if ExecutionLog::new(&work).latest_open().is_none() {
        let pointer = process.current_step_id.and_then(|s| snapshot.step(s));
        let targets: Vec<&WorkflowStep> = match pointer {
            Some(step) => vec![step],
            None => rederive_targets(snapshot, &graph, &work),
        };
        if targets.is_empty() {
            process_update.status = ProcessStatus::Completed;
            process_update.completed_at = Some(now);
            plan.corrections.push(Correction {
                kind: CorrectionKind::CompletedProcess,
                message: "No reachable step remains; process completed".to_string(),
                execution_id: None,
            });
        }
        let mut seq = ExecutionLog::new(&work).next_seq();
        for step in targets {
            let e = open_execution(process.id, step, seq, now);
            seq += 1;
            plan.corrections.push(Correction {
                kind: CorrectionKind::CreatedExecution,
                message: format!("Opened execution {} for step '{}'", e.id, step.name),
                execution_id: Some(e.id),
            });
            work.push(e.clone());
            plan.created.push(e);
        }
    }

    let derived = ExecutionLog::new(&work).current_step();
    if derived != process_update.current_step_id {
        if derived.is_some() {
            plan.corrections.push(Correction {
                kind: CorrectionKind::PointerReset,
                message: format!(
                    "Current step reset from {:?} to {:?}",
                    process_update.current_step_id, derived
                ),
                execution_id: None,
            });
        }
        process_update.current_step_id = derived;
    }

    if process_update != *process {
        plan.process = Some(process_update);
    }
    plan
}

/// Where a process with nothing open should be: the eligible successors of
/// the last completed step, or the entry step when nothing completed yet.
/// Eligible targets that lie on one path collapse to the later one.
fn rederive_targets<'s>(
    snapshot: &'s TemplateSnapshot,
    graph: &TemplateGraph<'_>,
    log: &[WorkflowExecution],
) -> Vec<&'s WorkflowStep> {
    let Some(last) = ExecutionLog::new(log).latest_completed() else {
        return graph
            .entry_step()
            .and_then(|id| snapshot.step(id))
            .into_iter()
            .collect();
    };
    let action = last.action_taken.unwrap_or(ActionKind::Advance);
    let mut targets: BTreeMap<(u32, StepId), &WorkflowStep> = BTreeMap::new();
    for t in snapshot.outgoing(last.step_id).filter(|t| t.is_eligible(action)) {
        if let Some(step) = snapshot.step(t.to_step_id) {
            targets.insert((step.order, step.id), step);
        }
    }
    let mut chosen: Vec<&WorkflowStep> = Vec::new();
    for step in targets.into_values().rev() {
        if chosen
            .iter()
            .all(|c| graph.may_run_concurrently(c.id, step.id))
        {
            chosen.push(step);
        }
    }
    chosen.reverse();
    chosen
}

// ── Monitor ──

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceSummary {
    pub total_processes: usize,
    pub compliant_processes: usize,
    pub non_compliant_processes: usize,
    pub compliance_rate: f64,
    pub non_compliant_ids: Vec<ProcessId>,
    pub checked_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationReport {
    pub process_id: ProcessId,
    pub corrections: Vec<Correction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixOutcome {
    pub process_id: ProcessId,
    pub corrections: Vec<Correction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixAllReport {
    pub checked: usize,
    pub fixed: usize,
    pub failed: usize,
    pub outcomes: Vec<FixOutcome>,
}

pub struct ComplianceMonitor {
    store: Arc<dyn WorkflowStore>,
}

impl ComplianceMonitor {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    async fn load(&self, process_id: ProcessId) -> Result<(WorkflowProcess, Vec<WorkflowExecution>)> {
        let process = self
            .store
            .load_process(process_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("process {process_id}")))?;
        let log = self.store.executions_for_process(process_id).await?;
        Ok((process, log))
    }

    pub async fn validate(&self, process_id: ProcessId) -> Result<ComplianceReport> {
        let (process, log) = self.load(process_id).await?;
        Ok(inspect(&process, &log))
    }

    /// Remediate one process. The plan lands as one commit guarded on the
    /// revisions it was computed from; if anything moved in between, nothing
    /// is written and the report is empty. The next sweep re-plans.
    pub async fn enforce(&self, process_id: ProcessId) -> Result<RemediationReport> {
        let (process, log) = self.load(process_id).await?;
        let plan = plan_remediation(&process, &log, Utc::now());
        if plan.is_empty() {
            return Ok(RemediationReport {
                process_id,
                corrections: Vec::new(),
            });
        }

        let mut batch = ProcessBatch::new(plan.process.unwrap_or(process));
        batch.updated = plan.updated;
        batch.inserted = plan.created;
        if self.store.commit(batch).await?.is_none() {
            warn!(
                process_id = %process_id,
                skipped = plan.corrections.len(),
                "process changed concurrently; corrections not applied"
            );
            return Ok(RemediationReport {
                process_id,
                corrections: Vec::new(),
            });
        }

        info!(
            process_id = %process_id,
            corrections = plan.corrections.len(),
            "compliance enforced"
        );
        Ok(RemediationReport {
            process_id,
            corrections: plan.corrections,
        })
    }

    /// Aggregate compliance across all active processes.
    pub async fn monitor(&self) -> Result<ComplianceSummary> {
        let processes = self.store.list_processes().await?;
        let mut total = 0;
        let mut non_compliant_ids = Vec::new();
        for p in processes.iter().filter(|p| p.status == ProcessStatus::Active) {
            total += 1;
            let log = self.store.executions_for_process(p.id).await?;
            if !inspect(p, &log).is_compliant {
                non_compliant_ids.push(p.id);
            }
        }
        let non_compliant = non_compliant_ids.len();
        let compliant = total - non_compliant;
        let rate = if total == 0 {
            1.0
        } else {
            compliant as f64 / total as f64
        };
        debug!(total, compliant, non_compliant, "compliance sweep");
        Ok(ComplianceSummary {
            total_processes: total,
            compliant_processes: compliant,
            non_compliant_processes: non_compliant,
            compliance_rate: rate,
            non_compliant_ids,
            checked_at: Utc::now(),
        })
    }

    /// Enforce every non-compliant process. A failure on one process is
    /// recorded and the batch continues.
    pub async fn fix_all(&self) -> Result<FixAllReport> {
        let processes = self.store.list_processes().await?;
        let mut report = FixAllReport {
            checked: processes.len(),
            fixed: 0,
            failed: 0,
            outcomes: Vec::new(),
        };
        for p in &processes {
            let outcome = match self.fix_one(p).await {
                Ok(None) => continue,
                Ok(Some(r)) => {
                    report.fixed += 1;
                    FixOutcome {
                        process_id: p.id,
                        corrections: r.corrections,
                        error: None,
                    }
                }
                Err(err) => {
                    error!(process_id = %p.id, error = ?err, "compliance remediation failed");
                    report.failed += 1;
                    FixOutcome {
                        process_id: p.id,
                        corrections: Vec::new(),
                        error: Some(if err.is_internal() {
                            "internal error".to_string()
                        } else {
                            err.to_string()
                        }),
                    }
                }
            };
            report.outcomes.push(outcome);
        }
        Ok(report)
    }

    async fn fix_one(&self, process: &WorkflowProcess) -> Result<Option<RemediationReport>> {
        let log = self.store.executions_for_process(process.id).await?;
        if inspect(process, &log).is_compliant {
            return Ok(None);
        }
        self.enforce(process.id).await.map(Some)
    }
}
