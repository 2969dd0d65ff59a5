//! Wire form of a template as submitted by the editor.
//!
//! Step identifiers here are whatever the client sent (often temporary
//! strings); they are remapped to store-assigned ids when the template is
//! built. Step metadata is a free-form bag until validation turns it into a
//! [`StepConfig`](crate::types::StepConfig).

use crate::types::{TemplateId, UiPosition, WorkflowTemplate};
use serde::{Deserialize, Serialize};

fn default_status() -> String {
    "draft".to_string()
}

fn default_condition() -> String {
    "always".to_string()
}

fn is_false(v: &bool) -> bool {
    !v
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDraft {
    /// Present when editing an existing template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TemplateId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Version token the editor last saw. Carried, not yet enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default)]
    pub steps: Vec<StepDraft>,
    #[serde(default)]
    pub transitions: Vec<TransitionDraft>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metadata: StepMetadataDraft,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_position: Option<UiPosition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMetadataDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_users: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub requires_all: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub from_step_id: String,
    pub to_step_id: String,
    /// Fallback key when `from_step_id` matches no step id in the draft.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_order: Option<i64>,
    #[serde(default = "default_condition")]
    pub condition: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl From<&WorkflowTemplate> for TemplateDraft {
    /// Round-trips a stored template back into editor form, using the
    /// current step ids as the draft ids.
    fn from(tpl: &WorkflowTemplate) -> Self {
        use crate::types::{Assignee, StepConfig};

        let steps = tpl
            .steps
            .iter()
            .map(|s| {
                let (step_type, metadata) = match &s.config {
                    StepConfig::User { assignee, comments } => {
                        let mut md = StepMetadataDraft {
                            comments: comments.clone(),
                            ..Default::default()
                        };
                        match assignee {
                            Assignee::User(u) => md.user_id = Some(u.clone()),
                            Assignee::Department(d) => md.department_id = Some(d.clone()),
                        }
                        ("user".to_string(), md)
                    }
                    StepConfig::Action {
                        action_type,
                        target_users,
                        requires_all,
                        comments,
                    } => (
                        "action".to_string(),
                        StepMetadataDraft {
                            action_type: Some(action_type.as_str().to_string()),
                            target_users: target_users.clone(),
                            requires_all: *requires_all,
                            comments: comments.clone(),
                            ..Default::default()
                        },
                    ),
                };
                StepDraft {
                    id: Some(s.id.to_string()),
                    order: Some(i64::from(s.order)),
                    step_type,
                    name: s.name.clone(),
                    metadata,
                    ui_position: s.ui_position,
                }
            })
            .collect();

        let transitions = tpl
            .transitions
            .iter()
            .map(|t| TransitionDraft {
                id: Some(t.id.to_string()),
                from_step_id: t.from_step_id.to_string(),
                to_step_id: t.to_step_id.to_string(),
                from_order: None,
                to_order: None,
                condition: serde_json::to_value(t.condition)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_else(default_condition),
                metadata: t.metadata.clone(),
            })
            .collect();

        TemplateDraft {
            id: Some(tpl.id),
            name: tpl.name.clone(),
            description: tpl.description.clone(),
            status: serde_json::to_value(tpl.status)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(default_status),
            entity_id: tpl.entity_id.clone(),
            version: Some(tpl.version),
            steps,
            transitions,
        }
    }
}
