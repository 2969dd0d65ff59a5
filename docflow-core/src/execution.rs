//! Per-step execution lifecycle.
//!
//! Everything here is pure: functions take the process snapshot and its
//! execution log and return a plan describing which records to write. The
//! engine applies plans through the store. The process position is always
//! derived from the log (see [`ExecutionLog::current_step`]); the cached
//! `current_step_id` on the process is refreshed from it on every write.

use crate::error::{Result, WorkflowError};
use crate::types::*;
use uuid::Uuid;

// ── Assignment ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub assigned_to: Option<UserId>,
    pub assigned_department_id: Option<DepartmentId>,
    pub required_actors: Vec<UserId>,
    pub requires_all: bool,
}

/// Resolve who must act on a step.
///
/// Department steps stay unassigned until a member claims them. Action steps
/// list their targets; a single target is also the direct assignee.
pub fn assign(step: &WorkflowStep) -> Assignment {
    match &step.config {
        StepConfig::User {
            assignee: Assignee::User(user),
            ..
        } => Assignment {
            assigned_to: Some(user.clone()),
            assigned_department_id: None,
            required_actors: Vec::new(),
            requires_all: false,
        },
        StepConfig::User {
            assignee: Assignee::Department(dept),
            ..
        } => Assignment {
            assigned_to: None,
            assigned_department_id: Some(dept.clone()),
            required_actors: Vec::new(),
            requires_all: false,
        },
        StepConfig::Action {
            target_users,
            requires_all,
            ..
        } => Assignment {
            assigned_to: match target_users.as_slice() {
                [only] => Some(only.clone()),
                _ => None,
            },
            assigned_department_id: None,
            required_actors: target_users.clone(),
            requires_all: *requires_all,
        },
    }
}

impl Assignment {
    /// Whether `execution` carries this assignment. A department claim
    /// (`assigned_to` set on a department execution) still matches.
    pub fn matches(&self, execution: &WorkflowExecution) -> bool {
        let assignee_ok = match &self.assigned_department_id {
            Some(_) => true,
            None => execution.assigned_to == self.assigned_to,
        };
        assignee_ok
            && execution.assigned_department_id == self.assigned_department_id
            && execution.required_actors == self.required_actors
            && execution.requires_all == self.requires_all
    }

    pub fn apply_to(&self, execution: &mut WorkflowExecution) {
        if self.assigned_department_id.is_none()
            || execution.assigned_department_id != self.assigned_department_id
        {
            execution.assigned_to = self.assigned_to.clone();
        }
        execution.assigned_department_id = self.assigned_department_id.clone();
        execution.required_actors = self.required_actors.clone();
        execution.requires_all = self.requires_all;
        execution.acted_by.retain(|u| self.required_actors.contains(u));
    }
}

/// New pending execution for `step`.
pub fn open_execution(
    process_id: ProcessId,
    step: &WorkflowStep,
    seq: u32,
    now: Timestamp,
) -> WorkflowExecution {
    let a = assign(step);
    WorkflowExecution {
        id: Uuid::now_v7(),
        process_id,
        step_id: step.id,
        seq,
        assigned_to: a.assigned_to,
        assigned_department_id: a.assigned_department_id,
        required_actors: a.required_actors,
        requires_all: a.requires_all,
        acted_by: Vec::new(),
        status: ExecutionStatus::Pending,
        started_at: now,
        completed_at: None,
        comments: None,
        action_taken: None,
        revision: 0,
    }
}

fn skipped_execution(
    process_id: ProcessId,
    step: &WorkflowStep,
    seq: u32,
    now: Timestamp,
) -> WorkflowExecution {
    let mut e = open_execution(process_id, step, seq, now);
    e.status = ExecutionStatus::Skipped;
    e.completed_at = Some(now);
    e
}

// ── Entitlement ──

/// Why an actor may act on an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entitlement {
    Assignee,
    /// Listed in `required_actors` and has not acted yet.
    Target,
    /// Must be confirmed against the directory by the caller.
    DepartmentClaim(DepartmentId),
    None,
}

pub fn entitlement(execution: &WorkflowExecution, actor: &UserId) -> Entitlement {
    if !execution.required_actors.is_empty() {
        if execution.required_actors.contains(actor) && !execution.acted_by.contains(actor) {
            return Entitlement::Target;
        }
        return Entitlement::None;
    }
    if execution.assigned_to.as_ref() == Some(actor) {
        return Entitlement::Assignee;
    }
    match (&execution.assigned_department_id, &execution.assigned_to) {
        (Some(dept), None) => Entitlement::DepartmentClaim(dept.clone()),
        _ => Entitlement::None,
    }
}

// ── Log view ──

/// Read-only view over one process's executions, ordered by `seq`.
pub struct ExecutionLog<'a> {
    executions: &'a [WorkflowExecution],
}

impl<'a> ExecutionLog<'a> {
    pub fn new(executions: &'a [WorkflowExecution]) -> Self {
        Self { executions }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a WorkflowExecution> {
        self.executions.iter()
    }

    pub fn open(&self) -> impl Iterator<Item = &'a WorkflowExecution> {
        self.executions.iter().filter(|e| e.is_open())
    }

    /// Most recently created open execution.
    pub fn latest_open(&self) -> Option<&'a WorkflowExecution> {
        self.open().max_by_key(|e| e.seq)
    }

    /// The process position: step of the latest open execution.
    pub fn current_step(&self) -> Option<StepId> {
        self.latest_open().map(|e| e.step_id)
    }

    pub fn open_for_step(&self, step_id: StepId) -> Option<&'a WorkflowExecution> {
        self.open()
            .filter(|e| e.step_id == step_id)
            .max_by_key(|e| e.seq)
    }

    pub fn has_step(&self, step_id: StepId) -> bool {
        self.executions.iter().any(|e| e.step_id == step_id)
    }

    pub fn latest_completed(&self) -> Option<&'a WorkflowExecution> {
        self.executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .max_by_key(|e| e.seq)
    }

    pub fn next_seq(&self) -> u32 {
        self.executions.iter().map(|e| e.seq).max().unwrap_or(0) + 1
    }
}

// ── Advance ──

#[derive(Debug, Clone)]
pub struct AdvancePlan {
    /// The acted-on execution in its new state.
    pub execution: WorkflowExecution,
    /// False when the action was recorded without closing the execution
    /// (a comment, or a partial `requires_all` signature).
    pub completed: bool,
    pub opened: Vec<WorkflowExecution>,
    pub skipped: Vec<WorkflowExecution>,
    pub process_completed: bool,
    pub current_step: Option<StepId>,
}

/// Record `action` by `actor` on `execution` and follow eligible transitions.
pub fn plan_advance(
    snapshot: &TemplateSnapshot,
    log: &[WorkflowExecution],
    execution: &WorkflowExecution,
    actor: &UserId,
    action: ActionKind,
    comments: Option<String>,
    now: Timestamp,
) -> Result<AdvancePlan> {
    if !execution.is_open() {
        return Err(WorkflowError::InvalidState(format!(
            "execution {} is {:?}",
            execution.id, execution.status
        )));
    }
    let step = snapshot.step(execution.step_id).ok_or_else(|| {
        WorkflowError::InvalidState(format!(
            "execution {} points at step {} outside the process template",
            execution.id, execution.step_id
        ))
    })?;

    let mut updated = execution.clone();
    if comments.is_some() {
        updated.comments = comments;
    }

    let unchanged = |updated: WorkflowExecution| AdvancePlan {
        execution: updated,
        completed: false,
        opened: Vec::new(),
        skipped: Vec::new(),
        process_completed: false,
        current_step: ExecutionLog::new(log).current_step(),
    };

    if action == ActionKind::Comment {
        if updated.status == ExecutionStatus::Pending {
            updated.status = ExecutionStatus::InProgress;
        }
        return Ok(unchanged(updated));
    }

    if updated.required_actors.contains(actor) {
        if updated.acted_by.contains(actor) {
            return Err(WorkflowError::InvalidState(format!(
                "{actor} already acted on execution {}",
                execution.id
            )));
        }
        updated.acted_by.push(actor.clone());
    }

    // A rejection closes the step for everyone; approvals and signatures
    // wait for the remaining targets.
    let partial = updated.requires_all
        && action.outcome() == Outcome::Approved
        && !updated.outstanding_actors().is_empty();
    if partial {
        return Ok(unchanged(updated));
    }

    updated.status = ExecutionStatus::Completed;
    updated.completed_at = Some(now);
    updated.action_taken = Some(action);

    let mut after: Vec<WorkflowExecution> = log
        .iter()
        .map(|e| if e.id == updated.id { updated.clone() } else { e.clone() })
        .collect();
    let mut seq = ExecutionLog::new(&after).next_seq();

    let mut eligible: Vec<&WorkflowStep> = Vec::new();
    let mut bypassed: Vec<&WorkflowStep> = Vec::new();
    for t in snapshot.outgoing(step.id) {
        let Some(target) = snapshot.step(t.to_step_id) else {
            continue;
        };
        if t.is_eligible(action) {
            if !eligible.iter().any(|s| s.id == target.id) {
                eligible.push(target);
            }
        } else if !bypassed.iter().any(|s| s.id == target.id) {
            bypassed.push(target);
        }
    }
    eligible.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));
    bypassed.retain(|b| !eligible.iter().any(|e| e.id == b.id));
    bypassed.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));

    let mut opened = Vec::new();
    for target in &eligible {
        if ExecutionLog::new(&after).open_for_step(target.id).is_some() {
            continue;
        }
        let e = open_execution(execution.process_id, target, seq, now);
        seq += 1;
        after.push(e.clone());
        opened.push(e);
    }

    let mut skipped = Vec::new();
    for target in &bypassed {
        if ExecutionLog::new(&after).has_step(target.id) {
            continue;
        }
        let e = skipped_execution(execution.process_id, target, seq, now);
        seq += 1;
        after.push(e.clone());
        skipped.push(e);
    }

    let view = ExecutionLog::new(&after);
    let process_completed = eligible.is_empty() && view.latest_open().is_none();

    Ok(AdvancePlan {
        execution: updated,
        completed: true,
        opened,
        skipped,
        process_completed,
        current_step: view.current_step(),
    })
}

// ── Return ──

#[derive(Debug, Clone)]
pub struct ReturnPlan {
    /// The execution `return` was called on, now cancelled.
    pub execution: WorkflowExecution,
    /// The earlier action-step execution, reset to pending.
    pub reopened: WorkflowExecution,
    /// Other executions created after `reopened`, now cancelled.
    pub cancelled: Vec<WorkflowExecution>,
    pub current_step: StepId,
}

/// Send the process back to its most recent completed action step.
pub fn plan_return(
    snapshot: &TemplateSnapshot,
    log: &[WorkflowExecution],
    execution: &WorkflowExecution,
    comments: Option<String>,
    now: Timestamp,
) -> Result<ReturnPlan> {
    if !execution.is_open() {
        return Err(WorkflowError::InvalidState(format!(
            "execution {} is {:?}",
            execution.id, execution.status
        )));
    }

    let target = log
        .iter()
        .filter(|e| {
            e.seq < execution.seq
                && e.status == ExecutionStatus::Completed
                && snapshot
                    .step(e.step_id)
                    .is_some_and(|s| s.config.is_action())
        })
        .max_by_key(|e| e.seq)
        .ok_or_else(|| {
            WorkflowError::InvalidState(format!(
                "no earlier action step to return to from execution {}",
                execution.id
            ))
        })?;

    let mut current = execution.clone();
    current.status = ExecutionStatus::Cancelled;
    current.completed_at = Some(now);
    current.action_taken = Some(ActionKind::Back);
    if comments.is_some() {
        current.comments = comments;
    }

    let cancelled = log
        .iter()
        .filter(|e| {
            e.seq > target.seq
                && e.id != execution.id
                && matches!(
                    e.status,
                    ExecutionStatus::Pending
                        | ExecutionStatus::InProgress
                        | ExecutionStatus::Completed
                )
        })
        .map(|e| {
            let mut e = e.clone();
            e.status = ExecutionStatus::Cancelled;
            e.completed_at.get_or_insert(now);
            e
        })
        .collect();

    let mut reopened = target.clone();
    reopened.status = ExecutionStatus::Pending;
    reopened.completed_at = None;
    reopened.action_taken = None;
    reopened.acted_by.clear();

    Ok(ReturnPlan {
        execution: current,
        current_step: reopened.step_id,
        reopened,
        cancelled,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::Utc;

    pub fn user(order: u32, user: &str) -> WorkflowStep {
        WorkflowStep {
            id: Uuid::now_v7(),
            order,
            name: format!("user-{order}"),
            config: StepConfig::User {
                assignee: Assignee::User(user.to_string()),
                comments: None,
            },
            ui_position: None,
        }
    }

    pub fn department(order: u32, dept: &str) -> WorkflowStep {
        WorkflowStep {
            id: Uuid::now_v7(),
            order,
            name: format!("dept-{order}"),
            config: StepConfig::User {
                assignee: Assignee::Department(dept.to_string()),
                comments: None,
            },
            ui_position: None,
        }
    }

    pub fn action(order: u32, action_type: ActionType, targets: &[&str], all: bool) -> WorkflowStep {
        WorkflowStep {
            id: Uuid::now_v7(),
            order,
            name: format!("action-{order}"),
            config: StepConfig::Action {
                action_type,
                target_users: targets.iter().map(|s| s.to_string()).collect(),
                requires_all: all,
                comments: None,
            },
            ui_position: None,
        }
    }

    pub fn edge(from: &WorkflowStep, to: &WorkflowStep, condition: TransitionCondition) -> WorkflowTransition {
        WorkflowTransition {
            id: Uuid::now_v7(),
            from_step_id: from.id,
            to_step_id: to.id,
            condition,
            metadata: Default::default(),
        }
    }

    pub fn snapshot(steps: Vec<WorkflowStep>, transitions: Vec<WorkflowTransition>) -> TemplateSnapshot {
        let now = Utc::now();
        TemplateSnapshot::capture(&WorkflowTemplate {
            id: Uuid::now_v7(),
            name: "fixture".into(),
            description: None,
            status: TemplateStatus::Active,
            entity_id: None,
            steps,
            transitions,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// Steps `[user U1, sign by U2, user U3]` chained with `always`.
    pub fn linear() -> TemplateSnapshot {
        let a = user(0, "U1");
        let b = action(1, ActionType::Sign, &["U2"], false);
        let c = user(2, "U3");
        let t = vec![
            edge(&a, &b, TransitionCondition::Always),
            edge(&b, &c, TransitionCondition::Always),
        ];
        snapshot(vec![a, b, c], t)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::Utc;

    fn start(snapshot: &TemplateSnapshot, order: usize) -> (ProcessId, Vec<WorkflowExecution>) {
        let pid = Uuid::now_v7();
        let e = open_execution(pid, &snapshot.steps[order], 1, Utc::now());
        (pid, vec![e])
    }

    fn apply(log: &mut Vec<WorkflowExecution>, plan: &AdvancePlan) {
        for e in log.iter_mut() {
            if e.id == plan.execution.id {
                *e = plan.execution.clone();
            }
        }
        log.extend(plan.opened.iter().cloned());
        log.extend(plan.skipped.iter().cloned());
    }

    #[test]
    fn assign_resolves_each_step_kind() {
        let a = assign(&user(0, "U1"));
        assert_eq!(a.assigned_to.as_deref(), Some("U1"));

        let d = assign(&department(0, "legal"));
        assert_eq!(d.assigned_to, None);
        assert_eq!(d.assigned_department_id.as_deref(), Some("legal"));

        let single = assign(&action(0, ActionType::Sign, &["U2"], false));
        assert_eq!(single.assigned_to.as_deref(), Some("U2"));

        let many = assign(&action(0, ActionType::Approve, &["U2", "U3"], true));
        assert_eq!(many.assigned_to, None);
        assert_eq!(many.required_actors, vec!["U2", "U3"]);
        assert!(many.requires_all);
    }

    #[test]
    fn entitlement_rules() {
        let pid = Uuid::now_v7();
        let now = Utc::now();
        let u = open_execution(pid, &user(0, "U1"), 1, now);
        assert_eq!(entitlement(&u, &"U1".into()), Entitlement::Assignee);
        assert_eq!(entitlement(&u, &"U9".into()), Entitlement::None);

        let mut d = open_execution(pid, &department(0, "legal"), 1, now);
        assert_eq!(
            entitlement(&d, &"U9".into()),
            Entitlement::DepartmentClaim("legal".into())
        );
        d.assigned_to = Some("U5".into());
        assert_eq!(entitlement(&d, &"U5".into()), Entitlement::Assignee);
        assert_eq!(entitlement(&d, &"U9".into()), Entitlement::None);

        let mut a = open_execution(pid, &action(0, ActionType::Sign, &["U2", "U3"], true), 1, now);
        assert_eq!(entitlement(&a, &"U2".into()), Entitlement::Target);
        a.acted_by.push("U2".into());
        assert_eq!(entitlement(&a, &"U2".into()), Entitlement::None);
    }

    #[test]
    fn advance_opens_next_step() {
        let snap = linear();
        let (_, mut log) = start(&snap, 0);
        let plan = plan_advance(&snap, &log, &log[0], &"U1".into(), ActionKind::Approve, None, Utc::now())
            .unwrap();
        assert!(plan.completed);
        assert_eq!(plan.execution.status, ExecutionStatus::Completed);
        assert_eq!(plan.opened.len(), 1);
        assert_eq!(plan.opened[0].step_id, snap.steps[1].id);
        assert_eq!(plan.opened[0].assigned_to.as_deref(), Some("U2"));
        assert_eq!(plan.opened[0].seq, 2);
        assert_eq!(plan.current_step, Some(snap.steps[1].id));
        assert!(!plan.process_completed);
        apply(&mut log, &plan);

        let plan = plan_advance(&snap, &log, &log[1], &"U2".into(), ActionKind::Sign, None, Utc::now())
            .unwrap();
        apply(&mut log, &plan);
        let plan = plan_advance(&snap, &log, &log[2], &"U3".into(), ActionKind::Approve, None, Utc::now())
            .unwrap();
        assert!(plan.opened.is_empty());
        assert!(plan.process_completed);
        assert_eq!(plan.current_step, None);
    }

    #[test]
    fn advance_on_closed_execution_is_invalid_state() {
        let snap = linear();
        let (_, mut log) = start(&snap, 0);
        log[0].status = ExecutionStatus::Completed;
        let err = plan_advance(&snap, &log, &log[0], &"U1".into(), ActionKind::Approve, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidState(_)));
    }

    #[test]
    fn comment_keeps_execution_open() {
        let snap = linear();
        let (_, log) = start(&snap, 0);
        let plan = plan_advance(
            &snap,
            &log,
            &log[0],
            &"U1".into(),
            ActionKind::Comment,
            Some("looks fine".into()),
            Utc::now(),
        )
        .unwrap();
        assert!(!plan.completed);
        assert_eq!(plan.execution.status, ExecutionStatus::InProgress);
        assert_eq!(plan.execution.comments.as_deref(), Some("looks fine"));
        assert!(plan.opened.is_empty());
    }

    #[test]
    fn rejection_skips_approved_branch() {
        let review = action(0, ActionType::Approve, &["U1"], false);
        let publish = user(1, "U2");
        let rework = user(2, "U3");
        let t = vec![
            edge(&review, &publish, TransitionCondition::Approved),
            edge(&review, &rework, TransitionCondition::Rejected),
        ];
        let snap = snapshot(vec![review, publish.clone(), rework.clone()], t);
        let (_, log) = start(&snap, 0);
        let plan = plan_advance(&snap, &log, &log[0], &"U1".into(), ActionKind::Reject, None, Utc::now())
            .unwrap();
        assert_eq!(plan.opened.len(), 1);
        assert_eq!(plan.opened[0].step_id, rework.id);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].step_id, publish.id);
        assert_eq!(plan.skipped[0].status, ExecutionStatus::Skipped);
        assert_eq!(plan.current_step, Some(rework.id));
    }

    #[test]
    fn requires_all_waits_for_every_target() {
        let prep = user(0, "U1");
        let sign = action(1, ActionType::Sign, &["U2", "U3"], true);
        let done = user(2, "U4");
        let t = vec![
            edge(&prep, &sign, TransitionCondition::Always),
            edge(&sign, &done, TransitionCondition::Always),
        ];
        let snap = snapshot(vec![prep, sign, done.clone()], t);
        let (_, log) = start(&snap, 1);

        let first = plan_advance(&snap, &log, &log[0], &"U2".into(), ActionKind::Sign, None, Utc::now())
            .unwrap();
        assert!(!first.completed);
        assert_eq!(first.execution.status, ExecutionStatus::Pending);
        assert_eq!(first.execution.acted_by, vec!["U2"]);

        let again = plan_advance(&snap, &[first.execution.clone()], &first.execution, &"U2".into(), ActionKind::Sign, None, Utc::now());
        assert!(matches!(again, Err(WorkflowError::InvalidState(_))));

        let log = vec![first.execution.clone()];
        let second = plan_advance(&snap, &log, &log[0], &"U3".into(), ActionKind::Sign, None, Utc::now())
            .unwrap();
        assert!(second.completed);
        assert_eq!(second.execution.status, ExecutionStatus::Completed);
        assert_eq!(second.opened[0].step_id, done.id);
    }

    #[test]
    fn advance_does_not_duplicate_open_target() {
        let a = user(0, "U1");
        let b = user(1, "U2");
        let join = user(2, "U3");
        let t = vec![
            edge(&a, &join, TransitionCondition::Always),
            edge(&b, &join, TransitionCondition::Always),
        ];
        let snap = snapshot(vec![a.clone(), b.clone(), join.clone()], t);
        let pid = Uuid::now_v7();
        let now = Utc::now();
        let mut log = vec![
            open_execution(pid, &a, 1, now),
            open_execution(pid, &b, 2, now),
        ];
        let p1 = plan_advance(&snap, &log, &log[0], &"U1".into(), ActionKind::Approve, None, now).unwrap();
        assert_eq!(p1.opened.len(), 1);
        apply(&mut log, &p1);
        let p2 = plan_advance(&snap, &log, &log[1], &"U2".into(), ActionKind::Approve, None, now).unwrap();
        assert!(p2.opened.is_empty());
        assert!(!p2.process_completed);
    }

    #[test]
    fn return_without_prior_action_step_is_invalid_state() {
        let snap = linear();
        let (_, log) = start(&snap, 0);
        let err = plan_return(&snap, &log, &log[0], Some("redo".into()), Utc::now()).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidState(_)));
    }

    #[test]
    fn return_reopens_last_action_step() {
        let snap = linear();
        let (_, mut log) = start(&snap, 0);
        for (i, actor, action) in [(0, "U1", ActionKind::Approve), (1, "U2", ActionKind::Sign)] {
            let plan = plan_advance(&snap, &log, &log[i].clone(), &actor.to_string(), action, None, Utc::now()).unwrap();
            apply(&mut log, &plan);
        }
        assert_eq!(log.len(), 3);

        let plan = plan_return(&snap, &log, &log[2], Some("wrong version signed".into()), Utc::now())
            .unwrap();
        assert_eq!(plan.reopened.id, log[1].id);
        assert_eq!(plan.reopened.status, ExecutionStatus::Pending);
        assert_eq!(plan.reopened.action_taken, None);
        assert_eq!(plan.execution.status, ExecutionStatus::Cancelled);
        assert_eq!(plan.execution.action_taken, Some(ActionKind::Back));
        assert_eq!(plan.execution.comments.as_deref(), Some("wrong version signed"));
        assert!(plan.cancelled.is_empty());
        assert_eq!(plan.current_step, snap.steps[1].id);
        // The first user step keeps its history.
        assert_eq!(log[0].status, ExecutionStatus::Completed);
    }

    #[test]
    fn log_position_is_latest_open_execution() {
        let snap = linear();
        let pid = Uuid::now_v7();
        let now = Utc::now();
        let mut done = open_execution(pid, &snap.steps[0], 1, now);
        done.status = ExecutionStatus::Completed;
        let older = open_execution(pid, &snap.steps[1], 2, now);
        let newer = open_execution(pid, &snap.steps[2], 3, now);
        let log = vec![done, older, newer.clone()];
        let view = ExecutionLog::new(&log);
        assert_eq!(view.current_step(), Some(newer.step_id));
        assert_eq!(view.next_seq(), 4);
        assert_eq!(view.latest_completed().map(|e| e.seq), Some(1));
    }
}
