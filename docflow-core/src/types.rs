use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ─── Identifiers ──────────────────────────────────────────────

pub type TemplateId = Uuid;
pub type StepId = Uuid;
pub type TransitionId = Uuid;
pub type ProcessId = Uuid;
pub type ExecutionId = Uuid;

/// Opaque user id owned by the external directory.
pub type UserId = String;

/// Opaque department id owned by the external directory.
pub type DepartmentId = String;

/// Opaque document id owned by the external document store.
pub type DocumentId = String;

pub type Timestamp = DateTime<Utc>;

// ─── Template ─────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    Draft,
    Active,
    Inactive,
}

impl FromStr for TemplateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown template status '{other}'")),
        }
    }
}

/// What an action step asks its targets to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Sign,
    Approve,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sign => "sign",
            Self::Approve => "approve",
        }
    }

    /// Noun used in user-facing messages ("a signature", "an approval").
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Sign => "signature",
            Self::Approve => "approval",
        }
    }

    /// Actions that discharge a pending requirement of this type.
    pub fn performing_actions(&self) -> Vec<ActionKind> {
        match self {
            Self::Sign => vec![ActionKind::Sign],
            Self::Approve => vec![ActionKind::Approve, ActionKind::Reject],
        }
    }

    /// Action that asks a later step to perform this type.
    pub fn requesting_action(&self) -> ActionKind {
        match self {
            Self::Sign => ActionKind::RequestSignature,
            Self::Approve => ActionKind::RequestApproval,
        }
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sign" => Ok(Self::Sign),
            "approve" => Ok(Self::Approve),
            other => Err(format!("unknown action type '{other}'")),
        }
    }
}

/// Who a user step is assigned to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assignee {
    User(UserId),
    /// Any member of the department may claim the execution.
    Department(DepartmentId),
}

/// Per-type step configuration. Built from the wire metadata bag by the
/// template validator, so a `StepConfig` is always well formed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepConfig {
    User {
        assignee: Assignee,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comments: Option<String>,
    },
    Action {
        action_type: ActionType,
        target_users: Vec<UserId>,
        requires_all: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comments: Option<String>,
    },
}

impl StepConfig {
    pub fn is_action(&self) -> bool {
        matches!(self, StepConfig::Action { .. })
    }

    /// True for user steps, including department-assigned ones.
    pub fn is_user(&self) -> bool {
        matches!(self, StepConfig::User { .. })
    }

    pub fn action_type(&self) -> Option<ActionType> {
        match self {
            StepConfig::Action { action_type, .. } => Some(*action_type),
            StepConfig::User { .. } => None,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            StepConfig::User {
                assignee: Assignee::User(_),
                ..
            } => "user",
            StepConfig::User {
                assignee: Assignee::Department(_),
                ..
            } => "department",
            StepConfig::Action { .. } => "action",
        }
    }
}

/// Editor canvas position. Layout only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UiPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: StepId,
    pub order: u32,
    pub name: String,
    pub config: StepConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_position: Option<UiPosition>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCondition {
    Always,
    Approved,
    Rejected,
    /// Eligible when `metadata.outcome` names the action just taken.
    Custom,
}

impl FromStr for TransitionCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(Self::Always),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown transition condition '{other}'")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTransition {
    pub id: TransitionId,
    pub from_step_id: StepId,
    pub to_step_id: StepId,
    pub condition: TransitionCondition,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl WorkflowTransition {
    /// Whether this edge may be followed after `action` completed its source step.
    pub fn is_eligible(&self, action: ActionKind) -> bool {
        match self.condition {
            TransitionCondition::Always => true,
            TransitionCondition::Approved => action.outcome() == Outcome::Approved,
            TransitionCondition::Rejected => action.outcome() == Outcome::Rejected,
            TransitionCondition::Custom => self
                .metadata
                .get("outcome")
                .and_then(|v| v.as_str())
                .is_some_and(|outcome| outcome == action.as_str()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub id: TemplateId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TemplateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub steps: Vec<WorkflowStep>,
    pub transitions: Vec<WorkflowTransition>,
    /// Bumped on every save. Reserved as an optimistic concurrency token.
    pub version: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WorkflowTemplate {
    pub fn step(&self, id: StepId) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}

// ─── Snapshot ─────────────────────────────────────────────────

/// Immutable copy of a template's graph taken when a process starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateSnapshot {
    pub template_id: TemplateId,
    pub template_version: u64,
    pub steps: Vec<WorkflowStep>,
    pub transitions: Vec<WorkflowTransition>,
    /// Hex SHA-256 over the serialized steps and transitions.
    pub fingerprint: String,
}

impl TemplateSnapshot {
    pub fn capture(template: &WorkflowTemplate) -> Self {
        let steps = template.steps.clone();
        let transitions = template.transitions.clone();
        let fingerprint = fingerprint(&steps, &transitions);
        Self {
            template_id: template.id,
            template_version: template.version,
            steps,
            transitions,
            fingerprint,
        }
    }

    pub fn step(&self, id: StepId) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Steps sorted by `order`, ties broken by id so the result is stable.
    pub fn ordered_steps(&self) -> Vec<&WorkflowStep> {
        let mut steps: Vec<&WorkflowStep> = self.steps.iter().collect();
        steps.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));
        steps
    }

    pub fn outgoing(&self, step_id: StepId) -> impl Iterator<Item = &WorkflowTransition> {
        self.transitions
            .iter()
            .filter(move |t| t.from_step_id == step_id)
    }
}

pub fn fingerprint(steps: &[WorkflowStep], transitions: &[WorkflowTransition]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(steps).unwrap_or_default());
    hasher.update(serde_json::to_vec(transitions).unwrap_or_default());
    hex::encode(hasher.finalize())
}

// ─── Process ──────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Active,
    Completed,
    Cancelled,
    Paused,
}

impl ProcessStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowProcess {
    pub id: ProcessId,
    pub template_id: TemplateId,
    pub snapshot: TemplateSnapshot,
    pub document_id: DocumentId,
    pub name: String,
    pub status: ProcessStatus,
    /// Cached pointer; the execution log is authoritative.
    pub current_step_id: Option<StepId>,
    pub started_by: UserId,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    /// Bumped by the store on every [`commit`](crate::store::WorkflowStore::commit).
    #[serde(default)]
    pub revision: u64,
}

// ─── Execution ────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped | Self::Cancelled)
    }

    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

/// Result class of an action, matched against transition conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    Rejected,
    Neutral,
}

/// Everything an actor can do to an execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Approve,
    Reject,
    Sign,
    Comment,
    RequestSignature,
    RequestApproval,
    Advance,
    Back,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Sign => "sign",
            Self::Comment => "comment",
            Self::RequestSignature => "request_signature",
            Self::RequestApproval => "request_approval",
            Self::Advance => "advance",
            Self::Back => "back",
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Approve | Self::Sign => Outcome::Approved,
            Self::Reject => Outcome::Rejected,
            _ => Outcome::Neutral,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "sign" => Ok(Self::Sign),
            "comment" => Ok(Self::Comment),
            "request_signature" => Ok(Self::RequestSignature),
            "request_approval" => Ok(Self::RequestApproval),
            "advance" => Ok(Self::Advance),
            "back" => Ok(Self::Back),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: ExecutionId,
    pub process_id: ProcessId,
    pub step_id: StepId,
    /// Creation sequence within the process, starting at 1.
    pub seq: u32,
    pub assigned_to: Option<UserId>,
    pub assigned_department_id: Option<DepartmentId>,
    /// Action-step targets. Empty for user steps.
    #[serde(default)]
    pub required_actors: Vec<UserId>,
    #[serde(default)]
    pub requires_all: bool,
    /// Targets that already acted on a `requires_all` execution.
    #[serde(default)]
    pub acted_by: Vec<UserId>,
    pub status: ExecutionStatus,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub comments: Option<String>,
    pub action_taken: Option<ActionKind>,
    #[serde(default)]
    pub revision: u64,
}

impl WorkflowExecution {
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Targets still owed an action. Only meaningful for action steps.
    pub fn outstanding_actors(&self) -> Vec<&UserId> {
        self.required_actors
            .iter()
            .filter(|u| !self.acted_by.contains(u))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transition(condition: TransitionCondition) -> WorkflowTransition {
        WorkflowTransition {
            id: Uuid::now_v7(),
            from_step_id: Uuid::now_v7(),
            to_step_id: Uuid::now_v7(),
            condition,
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn always_transitions_accept_every_action() {
        let t = transition(TransitionCondition::Always);
        assert!(t.is_eligible(ActionKind::Reject));
        assert!(t.is_eligible(ActionKind::Comment));
    }

    #[test]
    fn approved_and_rejected_follow_outcome() {
        let approved = transition(TransitionCondition::Approved);
        let rejected = transition(TransitionCondition::Rejected);
        assert!(approved.is_eligible(ActionKind::Sign));
        assert!(approved.is_eligible(ActionKind::Approve));
        assert!(!approved.is_eligible(ActionKind::Reject));
        assert!(!approved.is_eligible(ActionKind::Advance));
        assert!(rejected.is_eligible(ActionKind::Reject));
        assert!(!rejected.is_eligible(ActionKind::Approve));
    }

    #[test]
    fn custom_transition_matches_metadata_outcome() {
        let mut t = transition(TransitionCondition::Custom);
        assert!(!t.is_eligible(ActionKind::Comment));
        t.metadata.insert("outcome".into(), json!("comment"));
        assert!(t.is_eligible(ActionKind::Comment));
        assert!(!t.is_eligible(ActionKind::Approve));
    }

    #[test]
    fn step_config_serializes_with_type_tag() {
        let cfg = StepConfig::Action {
            action_type: ActionType::Sign,
            target_users: vec!["u2".into()],
            requires_all: false,
            comments: None,
        };
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(v["type"], "action");
        assert_eq!(v["action_type"], "sign");
        let back: StepConfig = serde_json::from_value(v).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn action_kind_parses_wire_names() {
        assert_eq!(
            "request_signature".parse::<ActionKind>().unwrap(),
            ActionKind::RequestSignature
        );
        assert!("launch".parse::<ActionKind>().is_err());
    }

    #[test]
    fn fingerprint_changes_with_graph() {
        let step = WorkflowStep {
            id: Uuid::now_v7(),
            order: 0,
            name: "Review".into(),
            config: StepConfig::User {
                assignee: Assignee::User("u1".into()),
                comments: None,
            },
            ui_position: None,
        };
        let a = fingerprint(std::slice::from_ref(&step), &[]);
        let mut renamed = step.clone();
        renamed.name = "Final review".into();
        let b = fingerprint(&[renamed], &[]);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(a, fingerprint(&[step], &[]));
    }
}
