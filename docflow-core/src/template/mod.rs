//! Template authoring: editor wire form, validation, graph analysis and YAML
//! loading.

pub mod draft;
pub mod graph;
pub mod validate;
pub mod yaml;

pub use draft::{StepDraft, StepMetadataDraft, TemplateDraft, TransitionDraft};
pub use graph::TemplateGraph;
pub use validate::{build_template, validate_draft, BuiltTemplate};
pub use yaml::{load_template_dir, parse_template_yaml};
