use super::draft::{StepDraft, TemplateDraft, TransitionDraft};
use super::graph::TemplateGraph;
use crate::error::{Result, ValidationIssue, WorkflowError};
use crate::types::*;
use std::collections::HashMap;
use uuid::Uuid;

/// Resolves a transition's step reference to a draft step index: by the
/// client id first, then by the declared `order` fallback, then by reading
/// the reference itself as an order number.
struct StepKeys {
    by_id: HashMap<String, usize>,
    by_order: HashMap<i64, usize>,
}

impl StepKeys {
    fn new(steps: &[StepDraft]) -> Self {
        let mut by_id = HashMap::new();
        let mut by_order = HashMap::new();
        for (i, s) in steps.iter().enumerate() {
            if let Some(id) = s.id.as_deref().filter(|id| !id.is_empty()) {
                by_id.entry(id.to_string()).or_insert(i);
            }
            if let Some(order) = s.order {
                by_order.entry(order).or_insert(i);
            }
        }
        Self { by_id, by_order }
    }

    fn resolve(&self, reference: &str, fallback_order: Option<i64>) -> Option<usize> {
        if let Some(&i) = self.by_id.get(reference) {
            return Some(i);
        }
        if let Some(i) = fallback_order.and_then(|o| self.by_order.get(&o)) {
            return Some(*i);
        }
        reference
            .parse::<i64>()
            .ok()
            .and_then(|o| self.by_order.get(&o).copied())
    }
}

fn step_label(step: &StepDraft, index: usize) -> String {
    if step.name.trim().is_empty() {
        format!("#{}", index + 1)
    } else {
        step.name.clone()
    }
}

/// Validate a template draft. Returns every problem found; empty means valid.
///
/// Department membership is not checked here (it needs the directory); the
/// engine checks it before saving.
pub fn validate_draft(draft: &TemplateDraft) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if draft.name.trim().is_empty() {
        issues.push(ValidationIssue::new("T0", "Template name is required"));
    }

    if let Err(e) = draft.status.parse::<TemplateStatus>() {
        issues.push(ValidationIssue::new("T0", e));
    }

    // T1: at least one step
    if draft.steps.is_empty() {
        issues.push(ValidationIssue::new("T1", "Template must have at least one step"));
    }

    // T2 + T3: every step has a non-negative, unique order
    let mut seen_orders: HashMap<i64, &str> = HashMap::new();
    for (i, step) in draft.steps.iter().enumerate() {
        let label = step_label(step, i);
        match step.order {
            None => issues.push(ValidationIssue::new(
                "T2",
                format!("Step '{label}' has no order"),
            )),
            Some(o) if o < 0 || o > i64::from(u32::MAX) => issues.push(ValidationIssue::new(
                "T2",
                format!("Step '{label}' has an invalid order {o}"),
            )),
            Some(o) => {
                if let Some(other) = seen_orders.insert(o, step.name.as_str()) {
                    issues.push(ValidationIssue::new(
                        "T3",
                        format!("Steps '{other}' and '{label}' share order {o}"),
                    ));
                }
            }
        }
    }

    // T4: client step ids, when given, are unique
    let mut seen_ids: HashMap<&str, usize> = HashMap::new();
    for (i, step) in draft.steps.iter().enumerate() {
        if let Some(id) = step.id.as_deref().filter(|id| !id.is_empty()) {
            if seen_ids.insert(id, i).is_some() {
                issues.push(ValidationIssue::new(
                    "T4",
                    format!("Duplicate step id '{id}'"),
                ));
            }
        }
    }

    // T5 + T6: per-type metadata
    for (i, step) in draft.steps.iter().enumerate() {
        if let Err(issue) = step_config(step, i) {
            issues.push(issue);
        }
    }

    // T7 + T8: transitions reference member steps and use a known condition
    let keys = StepKeys::new(&draft.steps);
    for t in &draft.transitions {
        if keys.resolve(&t.from_step_id, t.from_order).is_none() {
            issues.push(ValidationIssue::new(
                "T7",
                format!("Transition references unknown step '{}'", t.from_step_id),
            ));
        }
        if keys.resolve(&t.to_step_id, t.to_order).is_none() {
            issues.push(ValidationIssue::new(
                "T7",
                format!("Transition references unknown step '{}'", t.to_step_id),
            ));
        }
        if let Err(e) = t.condition.parse::<TransitionCondition>() {
            issues.push(ValidationIssue::new("T8", e));
        }
    }

    issues
}

/// Convert the metadata bag of one step into its typed configuration.
fn step_config(step: &StepDraft, index: usize) -> std::result::Result<StepConfig, ValidationIssue> {
    let label = step_label(step, index);
    let md = &step.metadata;
    let non_empty = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    match step.step_type.as_str() {
        "user" => {
            let assignee = match (non_empty(&md.user_id), non_empty(&md.department_id)) {
                (Some(user), _) => Assignee::User(user),
                (None, Some(dept)) => Assignee::Department(dept),
                (None, None) => {
                    return Err(ValidationIssue::new(
                        "T5",
                        format!("User step '{label}' has no assignee"),
                    ))
                }
            };
            Ok(StepConfig::User {
                assignee,
                comments: md.comments.clone(),
            })
        }
        "department" => match non_empty(&md.department_id) {
            Some(dept) => Ok(StepConfig::User {
                assignee: Assignee::Department(dept),
                comments: md.comments.clone(),
            }),
            None => Err(ValidationIssue::new(
                "T5",
                format!("Department step '{label}' has no department"),
            )),
        },
        "action" => {
            let action_type = md
                .action_type
                .as_deref()
                .ok_or_else(|| {
                    ValidationIssue::new("T6", format!("Action step '{label}' has no action type"))
                })?
                .parse::<ActionType>()
                .map_err(|e| ValidationIssue::new("T6", format!("Action step '{label}': {e}")))?;
            let target_users: Vec<UserId> = md
                .target_users
                .iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect();
            if target_users.is_empty() {
                return Err(ValidationIssue::new(
                    "T6",
                    format!("Action step '{label}' has no target users"),
                ));
            }
            Ok(StepConfig::Action {
                action_type,
                target_users,
                requires_all: md.requires_all,
                comments: md.comments.clone(),
            })
        }
        other => Err(ValidationIssue::new(
            "T6",
            format!("Step '{label}' has unknown type '{other}'"),
        )),
    }
}

/// A validated template plus non-fatal lint output.
#[derive(Debug, Clone)]
pub struct BuiltTemplate {
    pub template: WorkflowTemplate,
    pub warnings: Vec<String>,
    /// Client step id → assigned step id.
    pub step_ids: HashMap<String, StepId>,
}

/// Validate a draft and build the stored template from it.
///
/// Every step and transition gets a freshly assigned id; transitions are
/// re-pointed through the remap table. `previous` supplies id, creation time
/// and version when the draft edits an existing template.
pub fn build_template(
    draft: &TemplateDraft,
    previous: Option<&WorkflowTemplate>,
    now: Timestamp,
) -> Result<BuiltTemplate> {
    let issues = validate_draft(draft);
    if !issues.is_empty() {
        return Err(WorkflowError::Validation(issues));
    }

    let status = draft
        .status
        .parse::<TemplateStatus>()
        .map_err(|e| WorkflowError::invalid("T0", e))?;

    let mut steps = Vec::with_capacity(draft.steps.len());
    let mut assigned: Vec<StepId> = Vec::with_capacity(draft.steps.len());
    let mut step_ids = HashMap::new();
    for (i, s) in draft.steps.iter().enumerate() {
        let config = step_config(s, i).map_err(|issue| WorkflowError::Validation(vec![issue]))?;
        let order = s
            .order
            .and_then(|o| u32::try_from(o).ok())
            .ok_or_else(|| WorkflowError::invalid("T2", format!("Step '{}' has no order", s.name)))?;
        let id = Uuid::now_v7();
        if let Some(client_id) = s.id.as_deref().filter(|id| !id.is_empty()) {
            step_ids.insert(client_id.to_string(), id);
        }
        assigned.push(id);
        steps.push(WorkflowStep {
            id,
            order,
            name: s.name.clone(),
            config,
            ui_position: s.ui_position,
        });
    }

    let keys = StepKeys::new(&draft.steps);
    let transitions = draft
        .transitions
        .iter()
        .map(|t| remap_transition(t, &keys, &assigned))
        .collect::<Result<Vec<_>>>()?;

    let graph = TemplateGraph::new(&steps, &transitions);
    let warnings = graph
        .unreachable_steps()
        .into_iter()
        .filter_map(|id| steps.iter().find(|s| s.id == id))
        .map(|s| format!("Step '{}' is not reachable from the entry step", s.name))
        .collect();

    let template = WorkflowTemplate {
        id: previous.map(|p| p.id).or(draft.id).unwrap_or_else(Uuid::now_v7),
        name: draft.name.trim().to_string(),
        description: draft.description.clone(),
        status,
        entity_id: draft.entity_id.clone(),
        steps,
        transitions,
        version: previous.map(|p| p.version + 1).unwrap_or(1),
        created_at: previous.map(|p| p.created_at).unwrap_or(now),
        updated_at: now,
    };

    Ok(BuiltTemplate {
        template,
        warnings,
        step_ids,
    })
}

fn remap_transition(
    t: &TransitionDraft,
    keys: &StepKeys,
    assigned: &[StepId],
) -> Result<WorkflowTransition> {
    let lookup = |reference: &str, order: Option<i64>| {
        keys.resolve(reference, order)
            .and_then(|i| assigned.get(i).copied())
            .ok_or_else(|| {
                WorkflowError::invalid(
                    "T7",
                    format!("Transition references unknown step '{reference}'"),
                )
            })
    };
    Ok(WorkflowTransition {
        id: Uuid::now_v7(),
        from_step_id: lookup(&t.from_step_id, t.from_order)?,
        to_step_id: lookup(&t.to_step_id, t.to_order)?,
        condition: t
            .condition
            .parse()
            .map_err(|e: String| WorkflowError::invalid("T8", e))?,
        metadata: t.metadata.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::draft::StepMetadataDraft;
    use chrono::Utc;
    use proptest::prelude::*;

    fn user_step(id: &str, order: i64, user: &str) -> StepDraft {
        StepDraft {
            id: Some(id.to_string()),
            order: Some(order),
            step_type: "user".to_string(),
            name: format!("User {id}"),
            metadata: StepMetadataDraft {
                user_id: Some(user.to_string()),
                ..Default::default()
            },
            ui_position: None,
        }
    }

    fn sign_step(id: &str, order: i64, targets: &[&str]) -> StepDraft {
        StepDraft {
            id: Some(id.to_string()),
            order: Some(order),
            step_type: "action".to_string(),
            name: format!("Sign {id}"),
            metadata: StepMetadataDraft {
                action_type: Some("sign".to_string()),
                target_users: targets.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
            ui_position: None,
        }
    }

    fn link(from: &str, to: &str) -> TransitionDraft {
        TransitionDraft {
            from_step_id: from.to_string(),
            to_step_id: to.to_string(),
            condition: "always".to_string(),
            ..Default::default()
        }
    }

    fn minimal_valid_draft() -> TemplateDraft {
        TemplateDraft {
            name: "Contract".to_string(),
            status: "active".to_string(),
            steps: vec![
                user_step("a", 0, "u1"),
                sign_step("b", 1, &["u2"]),
                user_step("c", 2, "u3"),
            ],
            transitions: vec![link("a", "b"), link("b", "c")],
            ..Default::default()
        }
    }

    fn rules(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.rule.as_str()).collect()
    }

    #[test]
    fn minimal_draft_is_valid() {
        assert!(validate_draft(&minimal_valid_draft()).is_empty());
    }

    #[test]
    fn empty_template_rejected() {
        let mut draft = minimal_valid_draft();
        draft.steps.clear();
        draft.transitions.clear();
        assert_eq!(rules(&validate_draft(&draft)), vec!["T1"]);
    }

    #[test]
    fn user_step_without_assignee_names_the_step() {
        let mut draft = minimal_valid_draft();
        draft.steps[2].metadata.user_id = None;
        draft.steps[2].name = "Final review".to_string();
        let issues = validate_draft(&draft);
        assert_eq!(rules(&issues), vec!["T5"]);
        assert!(issues[0].message.contains("Final review"));
    }

    #[test]
    fn department_assignee_is_accepted() {
        let mut draft = minimal_valid_draft();
        draft.steps[2].metadata.user_id = None;
        draft.steps[2].metadata.department_id = Some("legal".to_string());
        let built = build_template(&draft, None, Utc::now()).unwrap();
        assert_eq!(
            built.template.steps[2].config,
            StepConfig::User {
                assignee: Assignee::Department("legal".to_string()),
                comments: None
            }
        );
    }

    #[test]
    fn missing_and_duplicate_orders_rejected() {
        let mut draft = minimal_valid_draft();
        draft.steps[0].order = None;
        draft.steps[2].order = Some(1);
        let issues = validate_draft(&draft);
        let r = rules(&issues);
        assert!(r.contains(&"T2"));
        assert!(r.contains(&"T3"));
    }

    #[test]
    fn dangling_transition_rejected() {
        let mut draft = minimal_valid_draft();
        draft.transitions.push(link("c", "ghost"));
        let issues = validate_draft(&draft);
        assert_eq!(rules(&issues), vec!["T7"]);
        assert!(issues[0].message.contains("ghost"));
    }

    #[test]
    fn unknown_condition_rejected() {
        let mut draft = minimal_valid_draft();
        draft.transitions[0].condition = "maybe".to_string();
        assert_eq!(rules(&validate_draft(&draft)), vec!["T8"]);
    }

    #[test]
    fn action_step_needs_type_and_targets() {
        let mut draft = minimal_valid_draft();
        draft.steps[1].metadata.target_users.clear();
        assert_eq!(rules(&validate_draft(&draft)), vec!["T6"]);
        draft.steps[1].metadata.target_users = vec!["u2".to_string()];
        draft.steps[1].metadata.action_type = Some("stamp".to_string());
        assert_eq!(rules(&validate_draft(&draft)), vec!["T6"]);
    }

    #[test]
    fn transitions_are_remapped_to_assigned_ids() {
        let built = build_template(&minimal_valid_draft(), None, Utc::now()).unwrap();
        let tpl = &built.template;
        let a = built.step_ids["a"];
        let b = built.step_ids["b"];
        let c = built.step_ids["c"];
        assert_eq!(tpl.transitions[0].from_step_id, a);
        assert_eq!(tpl.transitions[0].to_step_id, b);
        assert_eq!(tpl.transitions[1].from_step_id, b);
        assert_eq!(tpl.transitions[1].to_step_id, c);
        assert_eq!(tpl.version, 1);
        assert!(built.warnings.is_empty());
    }

    #[test]
    fn unassigned_reference_falls_back_to_order() {
        let mut draft = minimal_valid_draft();
        draft.steps[1].id = None;
        draft.transitions = vec![
            TransitionDraft {
                from_step_id: "a".to_string(),
                to_step_id: "new-step".to_string(),
                to_order: Some(1),
                condition: "approved".to_string(),
                ..Default::default()
            },
            // Bare order number as the reference.
            link("1", "c"),
        ];
        let built = build_template(&draft, None, Utc::now()).unwrap();
        let sign_id = built.template.steps[1].id;
        assert_eq!(built.template.transitions[0].to_step_id, sign_id);
        assert_eq!(
            built.template.transitions[0].condition,
            TransitionCondition::Approved
        );
        assert_eq!(built.template.transitions[1].from_step_id, sign_id);
    }

    #[test]
    fn edit_keeps_template_id_and_bumps_version() {
        let now = Utc::now();
        let first = build_template(&minimal_valid_draft(), None, now).unwrap();
        let mut edit = minimal_valid_draft();
        edit.name = "Contract v2".to_string();
        let second = build_template(&edit, Some(&first.template), now).unwrap();
        assert_eq!(second.template.id, first.template.id);
        assert_eq!(second.template.version, 2);
        assert_eq!(second.template.created_at, first.template.created_at);
        // Full replace: fresh step ids every save.
        assert_ne!(second.template.steps[0].id, first.template.steps[0].id);
    }

    #[test]
    fn unreachable_step_is_a_warning() {
        let mut draft = minimal_valid_draft();
        draft.steps.push(user_step("orphan", 7, "u9"));
        draft.steps[3].name = "Orphan".to_string();
        let built = build_template(&draft, None, Utc::now()).unwrap();
        assert_eq!(built.warnings.len(), 1);
        assert!(built.warnings[0].contains("Orphan"));
    }

    #[test]
    fn stored_template_round_trips_to_draft() {
        let built = build_template(&minimal_valid_draft(), None, Utc::now()).unwrap();
        let draft = TemplateDraft::from(&built.template);
        assert!(validate_draft(&draft).is_empty());
        let rebuilt = build_template(&draft, Some(&built.template), Utc::now()).unwrap();
        assert_eq!(rebuilt.template.steps.len(), 3);
        assert_eq!(rebuilt.template.transitions.len(), 2);
    }

    proptest! {
        /// validate fails iff an order is missing, a user step lacks an
        /// assignee, or a transition points outside the step set.
        #[test]
        fn validity_matches_defects(
            specs in prop::collection::vec((any::<bool>(), any::<bool>()), 1..6),
            dangling in any::<bool>(),
        ) {
            let mut draft = TemplateDraft {
                name: "Generated".to_string(),
                status: "draft".to_string(),
                ..Default::default()
            };
            for (i, (has_order, has_assignee)) in specs.iter().enumerate() {
                let mut s = user_step(&format!("s{i}"), i as i64, "u");
                if !has_order {
                    s.order = None;
                }
                if !has_assignee {
                    s.metadata.user_id = None;
                }
                draft.steps.push(s);
            }
            for i in 1..specs.len() {
                draft.transitions.push(link(&format!("s{}", i - 1), &format!("s{i}")));
            }
            if dangling {
                draft.transitions.push(link("s0", "nowhere"));
            }
            let defective = dangling || specs.iter().any(|(o, a)| !o || !a);
            prop_assert_eq!(!validate_draft(&draft).is_empty(), defective);
        }
    }
}
