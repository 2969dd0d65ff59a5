//! Legal-action computation for one execution.
//!
//! Action steps are often interleaved between user steps. For a given
//! execution the engine decides whether the actor is *performing* an action
//! step that precedes them, *requesting* one that follows them, or simply
//! working their own step. The decision uses `order` arithmetic over the
//! process snapshot:
//!
//! | nearest preceding action step `A` vs current step `C`         | branch    |
//! |----------------------------------------------------------------|-----------|
//! | `A.order == C.order - 1`                                       | pending   |
//! | exactly one user step strictly between `A` and `C`             | pending   |
//! | `C` is a user step and no other action step lies between them  | pending   |
//! | otherwise, nearest following action step exists               | request   |
//! | otherwise                                                      | own step  |
//!
//! Evaluation is pure and deterministic.

use crate::types::*;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleBranch {
    /// The actor owes the action of an earlier action step.
    PendingAction {
        step_id: StepId,
        action_type: ActionType,
    },
    /// The actor may request the action of a later action step.
    RequestAction {
        step_id: StepId,
        action_type: ActionType,
    },
    OwnStep,
    /// The execution is closed; nothing can be done.
    Closed,
    /// The execution's step is not in the snapshot.
    UnknownStep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableActions {
    pub actions: Vec<ActionKind>,
    pub branch: RuleBranch,
    pub contextual_message: String,
}

impl AvailableActions {
    pub fn allows(&self, action: ActionKind) -> bool {
        self.actions.contains(&action)
    }

    fn new(actions: Vec<ActionKind>, branch: RuleBranch, msg: String) -> Self {
        Self {
            actions,
            branch,
            contextual_message: msg,
        }
    }
}

fn with_navigation(mut actions: Vec<ActionKind>) -> Vec<ActionKind> {
    actions.push(ActionKind::Advance);
    actions.push(ActionKind::Back);
    actions
}

fn article(noun: &str) -> &'static str {
    if noun.starts_with(['a', 'e', 'i', 'o', 'u']) {
        "an"
    } else {
        "a"
    }
}

/// Compute the actions available on `execution`.
pub fn evaluate(snapshot: &TemplateSnapshot, execution: &WorkflowExecution) -> AvailableActions {
    let ordered = snapshot.ordered_steps();
    let Some(pos) = ordered.iter().position(|s| s.id == execution.step_id) else {
        return AvailableActions::new(
            Vec::new(),
            RuleBranch::UnknownStep,
            format!(
                "Step {} is not part of this process's template",
                execution.step_id
            ),
        );
    };
    let current = ordered[pos];

    if execution.status.is_terminal() {
        return AvailableActions::new(
            Vec::new(),
            RuleBranch::Closed,
            format!("Step '{}' is already closed", current.name),
        );
    }

    if let Some((prev_pos, prev)) = ordered[..pos]
        .iter()
        .enumerate()
        .rev()
        .find(|(_, s)| s.config.is_action())
    {
        let between = pos - prev_pos - 1;
        let adjacent = prev.order + 1 == current.order;
        let one_user_between = between == 1 && ordered[prev_pos + 1].config.is_user();
        // `prev` is the nearest action step, so nothing between is an action.
        let user_after_action = current.config.is_user();

        if adjacent || one_user_between || user_after_action {
            if let Some(action_type) = prev.config.action_type() {
                let noun = action_type.noun();
                return AvailableActions::new(
                    with_navigation(action_type.performing_actions()),
                    RuleBranch::PendingAction {
                        step_id: prev.id,
                        action_type,
                    },
                    format!(
                        "{} {noun} is pending from step '{}' before '{}' can proceed",
                        capitalize(article(noun)),
                        prev.name,
                        current.name
                    ),
                );
            }
        }
    }

    if let Some(next) = ordered[pos + 1..].iter().find(|s| s.config.is_action()) {
        if let Some(action_type) = next.config.action_type() {
            let noun = action_type.noun();
            return AvailableActions::new(
                with_navigation(vec![action_type.requesting_action()]),
                RuleBranch::RequestAction {
                    step_id: next.id,
                    action_type,
                },
                format!(
                    "You can request {} {noun} for step '{}'",
                    article(noun),
                    next.name
                ),
            );
        }
    }

    match &current.config {
        StepConfig::User { .. } => AvailableActions::new(
            vec![ActionKind::Approve, ActionKind::Comment],
            RuleBranch::OwnStep,
            format!("Review step '{}' and approve or comment", current.name),
        ),
        StepConfig::Action { action_type, .. } => AvailableActions::new(
            action_type.performing_actions(),
            RuleBranch::OwnStep,
            format!(
                "Your {} is required on step '{}'",
                action_type.noun(),
                current.name
            ),
        ),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::fixtures::*;
    use crate::execution::open_execution;
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn exec_at(snapshot: &TemplateSnapshot, step_id: StepId) -> WorkflowExecution {
        let step = snapshot.step(step_id).unwrap();
        open_execution(Uuid::now_v7(), step, 1, Utc::now())
    }

    #[test]
    fn user_after_adjacent_sign_step_owes_signature() {
        let snap = linear();
        let u3 = exec_at(&snap, snap.steps[2].id);
        let out = evaluate(&snap, &u3);
        assert_eq!(
            out.actions,
            vec![ActionKind::Sign, ActionKind::Advance, ActionKind::Back]
        );
        assert_eq!(
            out.branch,
            RuleBranch::PendingAction {
                step_id: snap.steps[1].id,
                action_type: ActionType::Sign
            }
        );
        assert!(out.contextual_message.starts_with("A signature is pending"));
    }

    #[test]
    fn user_before_sign_step_requests_signature() {
        let snap = linear();
        let u1 = exec_at(&snap, snap.steps[0].id);
        let out = evaluate(&snap, &u1);
        assert_eq!(
            out.actions,
            vec![
                ActionKind::RequestSignature,
                ActionKind::Advance,
                ActionKind::Back
            ]
        );
        assert!(out.contextual_message.contains("request a signature"));
    }

    #[test]
    fn lone_action_step_performs_its_own_type() {
        let only = action(0, ActionType::Approve, &["U1"], false);
        let snap = snapshot(vec![only.clone()], vec![]);
        let out = evaluate(&snap, &exec_at(&snap, only.id));
        assert_eq!(out.actions, vec![ActionKind::Approve, ActionKind::Reject]);
        assert_eq!(out.branch, RuleBranch::OwnStep);
    }

    #[test]
    fn lone_user_step_approves_or_comments() {
        let only = user(0, "U1");
        let snap = snapshot(vec![only.clone()], vec![]);
        let out = evaluate(&snap, &exec_at(&snap, only.id));
        assert_eq!(out.actions, vec![ActionKind::Approve, ActionKind::Comment]);
    }

    #[test]
    fn one_user_step_between_action_steps_counts_as_pending() {
        // approve(0) user(1) sign(2): the sign step still owes the approval.
        let a = action(0, ActionType::Approve, &["U1"], false);
        let b = user(1, "U2");
        let c = action(2, ActionType::Sign, &["U3"], false);
        let snap = snapshot(vec![a.clone(), b, c.clone()], vec![]);
        let out = evaluate(&snap, &exec_at(&snap, c.id));
        assert_eq!(
            out.actions,
            vec![
                ActionKind::Approve,
                ActionKind::Reject,
                ActionKind::Advance,
                ActionKind::Back
            ]
        );
        assert_eq!(
            out.branch,
            RuleBranch::PendingAction {
                step_id: a.id,
                action_type: ActionType::Approve
            }
        );
    }

    #[test]
    fn distant_action_before_action_step_is_not_pending() {
        // sign(0) user(1) user(2) approve(3): two steps between, and the
        // current step is an action step.
        let a = action(0, ActionType::Sign, &["U1"], false);
        let b = user(1, "U2");
        let c = user(2, "U3");
        let d = action(3, ActionType::Approve, &["U4"], false);
        let snap = snapshot(vec![a, b, c, d.clone()], vec![]);
        let out = evaluate(&snap, &exec_at(&snap, d.id));
        assert_eq!(out.branch, RuleBranch::OwnStep);
        assert_eq!(out.actions, vec![ActionKind::Approve, ActionKind::Reject]);
    }

    #[test]
    fn order_gaps_are_not_adjacent() {
        // sign(0) approve(5): positions touch but orders do not.
        let a = action(0, ActionType::Sign, &["U1"], false);
        let b = action(5, ActionType::Approve, &["U2"], false);
        let snap = snapshot(vec![a, b.clone()], vec![]);
        let out = evaluate(&snap, &exec_at(&snap, b.id));
        assert_eq!(out.branch, RuleBranch::OwnStep);
    }

    #[test]
    fn closed_and_unknown_executions_have_no_actions() {
        let snap = linear();
        let mut done = exec_at(&snap, snap.steps[0].id);
        done.status = ExecutionStatus::Completed;
        let out = evaluate(&snap, &done);
        assert!(out.actions.is_empty());
        assert_eq!(out.branch, RuleBranch::Closed);

        let mut stray = exec_at(&snap, snap.steps[0].id);
        stray.step_id = Uuid::now_v7();
        let out = evaluate(&snap, &stray);
        assert!(out.actions.is_empty());
        assert_eq!(out.branch, RuleBranch::UnknownStep);
        assert!(out.contextual_message.contains("not part of"));
    }

    fn arb_steps() -> impl Strategy<Value = Vec<(bool, u8, bool)>> {
        // (is_action, order gap, sign vs approve)
        prop::collection::vec((any::<bool>(), 1u8..3, any::<bool>()), 1..8)
    }

    fn build(specs: &[(bool, u8, bool)]) -> TemplateSnapshot {
        let mut order = 0u32;
        let steps = specs
            .iter()
            .map(|(is_action, gap, sign)| {
                let s = if *is_action {
                    let t = if *sign { ActionType::Sign } else { ActionType::Approve };
                    action(order, t, &["U1"], false)
                } else {
                    user(order, "U1")
                };
                order += u32::from(*gap);
                s
            })
            .collect();
        snapshot(steps, vec![])
    }

    proptest! {
        /// Same snapshot and execution, same answer.
        #[test]
        fn evaluation_is_deterministic(specs in arb_steps(), pick in any::<prop::sample::Index>()) {
            let snap = build(&specs);
            let step = &snap.steps[pick.index(snap.steps.len())];
            let exec = exec_at(&snap, step.id);
            let first = evaluate(&snap, &exec);
            for _ in 0..3 {
                prop_assert_eq!(&evaluate(&snap, &exec), &first);
            }
        }

        /// A user step preceded anywhere by an action step always owes it.
        #[test]
        fn user_steps_after_an_action_are_pending(specs in arb_steps(), pick in any::<prop::sample::Index>()) {
            let snap = build(&specs);
            let step = &snap.steps[pick.index(snap.steps.len())];
            let exec = exec_at(&snap, step.id);
            let earlier_action = snap.steps.iter().any(|s| s.order < step.order && s.config.is_action());
            let out = evaluate(&snap, &exec);
            if step.config.is_user() && earlier_action {
                let is_pending = matches!(out.branch, RuleBranch::PendingAction { .. });
                prop_assert!(is_pending);
            }
            prop_assert!(!out.actions.is_empty());
        }
    }
}
