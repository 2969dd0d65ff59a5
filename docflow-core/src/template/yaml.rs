use super::draft::TemplateDraft;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse a YAML template definition into a draft.
///
/// Validation is NOT performed here; the draft goes through
/// `WorkflowEngine::save_template` like any editor submission.
pub fn parse_template_yaml(yaml_str: &str) -> Result<TemplateDraft> {
    let draft: TemplateDraft = serde_yaml::from_str(yaml_str)?;
    Ok(draft)
}

/// Read every `*.yaml` / `*.yml` file in `dir`, sorted by file name.
pub fn load_template_dir(dir: &Path) -> Result<Vec<TemplateDraft>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("reading template dir {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "yaml" || e == "yml")
        })
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|p| {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("reading {}", p.display()))?;
            parse_template_yaml(&text).with_context(|| format!("parsing {}", p.display()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = r#"
name: Contract signature
status: active
steps:
  - id: draft
    order: 0
    type: user
    name: Prepare contract
    metadata:
      userId: alice
  - id: sign
    order: 1
    type: action
    name: Counterparty signs
    metadata:
      actionType: sign
      targetUsers: [bob, carol]
      requiresAll: true
  - id: file
    order: 2
    type: department
    name: File with legal
    metadata:
      departmentId: legal
transitions:
  - fromStepId: draft
    toStepId: sign
  - fromStepId: sign
    toStepId: file
    condition: approved
"#;

    #[test]
    fn test_basic_yaml_parse() {
        let draft = parse_template_yaml(CONTRACT).unwrap();
        assert_eq!(draft.name, "Contract signature");
        assert_eq!(draft.steps.len(), 3);
        assert_eq!(draft.steps[1].metadata.target_users, vec!["bob", "carol"]);
        assert!(draft.steps[1].metadata.requires_all);
        assert_eq!(draft.transitions[0].condition, "always");
        assert_eq!(draft.transitions[1].condition, "approved");
        assert!(crate::template::validate_draft(&draft).is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        assert!(parse_template_yaml("name: [unterminated").is_err());
    }

    #[test]
    fn test_load_dir_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), CONTRACT).unwrap();
        std::fs::write(dir.path().join("a.yml"), "name: Minimal\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let drafts = load_template_dir(dir.path()).unwrap();

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].name, "Minimal");
        assert_eq!(drafts[1].name, "Contract signature");
    }
}
