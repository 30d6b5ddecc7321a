//! Configuration for Reshelf

use crate::classifier::{PatternClassifier, PatternRule};
use crate::engine::{ReconcileOptions, UnmappedPolicy};
use crate::error::{ReshelfError, Result};
use crate::rules::{RuleTable, DEFAULT_ROOT};
use crate::types::ClassTag;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for Reshelf
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReshelfConfig {
    /// Path to the rule table JSON
    #[serde(default = "default_rules_path")]
    pub rules: PathBuf,

    /// Directory for class tags without a rule
    #[serde(default = "default_root")]
    pub default_root: String,

    /// Number of worker threads for reconciliation
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-item classification timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_timeout_ms: Option<u64>,

    /// What to do with items whose class has no rule
    #[serde(default)]
    pub unmapped: UnmappedPolicy,

    /// Pattern -> class tag rules for the filesystem classifier
    #[serde(default)]
    pub classify: Vec<PatternRule>,

    /// Class tag for files no pattern matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_tag: Option<String>,
}

fn default_rules_path() -> PathBuf {
    reshelf_logging::reshelf_home().join("rules.json")
}

fn default_root() -> String {
    DEFAULT_ROOT.to_string()
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

impl Default for ReshelfConfig {
    fn default() -> Self {
        Self {
            rules: default_rules_path(),
            default_root: default_root(),
            workers: default_workers(),
            item_timeout_ms: None,
            unmapped: UnmappedPolicy::default(),
            classify: Vec::new(),
            fallback_tag: None,
        }
    }
}

/// Default config file location: ~/.reshelf/config.toml
pub fn default_config_path() -> PathBuf {
    reshelf_logging::reshelf_home().join("config.toml")
}

impl ReshelfConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ReshelfConfig =
            toml::from_str(&content).map_err(|e| ReshelfError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Load from `path`, or the default location; missing files give defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let path = default_config_path();
                if path.is_file() {
                    Self::load(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ReshelfError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load and validate the rule table this config points at.
    pub fn build_rule_table(&self) -> Result<RuleTable> {
        RuleTable::load(&self.rules, &self.default_root)
    }

    /// Classifier built from the `[[classify]]` rules.
    pub fn build_pattern_classifier(&self) -> Result<PatternClassifier> {
        PatternClassifier::new(
            self.classify.clone(),
            self.fallback_tag.as_deref().map(ClassTag::from),
        )
    }

    pub fn reconcile_options(&self, dry_run: bool) -> ReconcileOptions {
        ReconcileOptions {
            workers: self.workers.max(1),
            item_timeout: self.item_timeout_ms.map(Duration::from_millis),
            dry_run,
            unmapped: self.unmapped,
        }
    }
}
