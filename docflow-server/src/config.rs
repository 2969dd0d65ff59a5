//! Server configuration.
//!
//! Loaded from the YAML file named by `DOCFLOW_CONFIG` (all keys optional),
//! then overridden by environment variables:
//!   DOCFLOW_BIND_ADDR                 - listen address (default: 0.0.0.0:4200)
//!   DOCFLOW_COMPLIANCE_INTERVAL_SECS  - sweep period in seconds (default: 30)
//!   DOCFLOW_COMPLIANCE_AUTO_ENFORCE   - remediate drift on each sweep (default: false)
//!   DOCFLOW_TEMPLATES_DIR             - directory of template YAML to seed

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use docflow_core::ports::DocumentRef;
use docflow_core::types::{DepartmentId, UserId};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub compliance: ComplianceConfig,
    pub directory: DirectoryConfig,
    pub documents: Vec<DocumentRef>,
    pub templates_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub auto_enforce: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub departments: HashMap<DepartmentId, Vec<UserId>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4200".to_string(),
            compliance: ComplianceConfig::default(),
            directory: DirectoryConfig::default(),
            documents: Vec::new(),
            templates_dir: None,
        }
    }
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            auto_enforce: false,
        }
    }
}

impl ComplianceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl ServerConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("invalid server config")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// File (if `DOCFLOW_CONFIG` is set) plus environment overrides.
    pub fn load() -> Result<Self> {
        let base = match std::env::var("DOCFLOW_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(addr) = var("DOCFLOW_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(secs) = var("DOCFLOW_COMPLIANCE_INTERVAL_SECS") {
            self.compliance.interval_secs = secs
                .parse()
                .with_context(|| format!("DOCFLOW_COMPLIANCE_INTERVAL_SECS={secs}"))?;
        }
        if let Some(flag) = var("DOCFLOW_COMPLIANCE_AUTO_ENFORCE") {
            self.compliance.auto_enforce = flag
                .parse()
                .with_context(|| format!("DOCFLOW_COMPLIANCE_AUTO_ENFORCE={flag}"))?;
        }
        if let Some(dir) = var("DOCFLOW_TEMPLATES_DIR") {
            self.templates_dir = Some(PathBuf::from(dir));
        }
        Ok(self)
    }
}
