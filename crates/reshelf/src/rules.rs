//! Rule table: class tag -> naming/placement rule
//!
//! Loaded once from JSON and read-only afterwards. Two shapes are accepted:
//!
//! ```json
//! { "StaticMesh": { "prefix": "SM", "path": "/Game/Assets/SM" } }
//! ```
//!
//! and the split form kept by older asset configs:
//!
//! ```json
//! { "prefix_patterns": { "StaticMesh": "SM" },
//!   "path_rules":      { "StaticMesh": "/Game/Assets/SM" } }
//! ```
//!
//! Anything that would make prefix stripping ambiguous is rejected here,
//! before a run starts.

use crate::error::{ReshelfError, Result};
use crate::naming::normalize_path;
use crate::types::{ClassTag, Rule};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Fallback directory for unmapped class tags.
pub const DEFAULT_ROOT: &str = "/Game/Assets";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    prefix: String,
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SplitRules {
    #[serde(default)]
    prefix_patterns: BTreeMap<String, String>,
    #[serde(default)]
    path_rules: BTreeMap<String, String>,
}

/// Immutable class tag -> rule mapping.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: BTreeMap<ClassTag, Rule>,
    /// Distinct non-empty prefixes, longest first
    prefixes: Vec<String>,
    default_root: String,
}

impl RuleTable {
    /// Build and validate a rule table.
    pub fn new(rules: impl IntoIterator<Item = Rule>, default_root: &str) -> Result<Self> {
        let default_root = validate_directory("default root", default_root)?;

        let mut table = BTreeMap::new();
        for rule in rules {
            let rule = validate_rule(rule)?;
            if table.contains_key(&rule.class_tag) {
                return Err(ReshelfError::config(format!(
                    "class tag '{}' is defined more than once",
                    rule.class_tag
                )));
            }
            table.insert(rule.class_tag.clone(), rule);
        }

        // Same prefix, different directory: stripping could not tell them apart.
        let mut owners: HashMap<&str, &Rule> = HashMap::new();
        for rule in table.values().filter(|r| !r.prefix.is_empty()) {
            if let Some(existing) = owners.get(rule.prefix.as_str()) {
                if existing.directory != rule.directory {
                    return Err(ReshelfError::config(format!(
                        "prefix '{}' is shared by '{}' ({}) and '{}' ({})",
                        rule.prefix,
                        existing.class_tag,
                        existing.directory,
                        rule.class_tag,
                        rule.directory
                    )));
                }
            } else {
                owners.insert(rule.prefix.as_str(), rule);
            }
        }

        let mut prefixes: Vec<String> = owners.keys().map(|p| p.to_string()).collect();
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        Ok(Self {
            rules: table,
            prefixes,
            default_root,
        })
    }

    /// Parse a rule table from JSON text.
    pub fn from_json_str(json: &str, default_root: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ReshelfError::config(format!("rule table is not valid JSON: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| ReshelfError::config("rule table must be a JSON object"))?;

        let rules = if object.contains_key("prefix_patterns") || object.contains_key("path_rules") {
            let split: SplitRules = serde_json::from_value(value)
                .map_err(|e| ReshelfError::config(format!("malformed split rule table: {}", e)))?;
            rules_from_split(split, default_root)
        } else {
            let raw: BTreeMap<String, RawRule> = serde_json::from_value(value).map_err(|e| {
                ReshelfError::config(format!(
                    "rule table must map class tags to {{prefix, path}}: {}",
                    e
                ))
            })?;
            raw.into_iter()
                .map(|(tag, rule)| Rule {
                    class_tag: ClassTag::from(tag),
                    prefix: rule.prefix,
                    directory: rule.path,
                })
                .collect()
        };

        Self::new(rules, default_root)
    }

    /// Load a rule table from a JSON file.
    pub fn load(path: &Path, default_root: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReshelfError::config(format!("cannot read rule table {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content, default_root)
    }

    /// Prefix for a class tag, `""` when unmapped.
    pub fn prefix_for(&self, class_tag: &ClassTag) -> &str {
        self.rules
            .get(class_tag)
            .map(|r| r.prefix.as_str())
            .unwrap_or("")
    }

    /// Target directory for a class tag, falling back to the default root.
    /// A sub-category becomes one extra segment beneath it.
    pub fn directory_for(&self, class_tag: &ClassTag, sub_category: Option<&str>) -> String {
        let base = self
            .rules
            .get(class_tag)
            .map(|r| r.directory.as_str())
            .unwrap_or(&self.default_root);

        match sub_category {
            Some(sub) if !sub.trim_matches('/').is_empty() => {
                normalize_path(&format!("{}/{}", base, sub))
            }
            _ => base.to_string(),
        }
    }

    pub fn rule(&self, class_tag: &ClassTag) -> Option<&Rule> {
        self.rules.get(class_tag)
    }

    pub fn is_mapped(&self, class_tag: &ClassTag) -> bool {
        self.rules.contains_key(class_tag)
    }

    /// All rules ordered by class tag.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    /// Distinct configured prefixes, longest first.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn default_root(&self) -> &str {
        &self.default_root
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn rules_from_split(split: SplitRules, default_root: &str) -> Vec<Rule> {
    let mut tags: Vec<&String> = split
        .prefix_patterns
        .keys()
        .chain(split.path_rules.keys())
        .collect();
    tags.sort();
    tags.dedup();

    tags.into_iter()
        .map(|tag| Rule {
            class_tag: ClassTag::from(tag.as_str()),
            prefix: split.prefix_patterns.get(tag).cloned().unwrap_or_default(),
            directory: split
                .path_rules
                .get(tag)
                .cloned()
                .unwrap_or_else(|| default_root.to_string()),
        })
        .collect()
}

fn validate_rule(rule: Rule) -> Result<Rule> {
    let tag = rule.class_tag.as_str().trim();
    if tag.is_empty() {
        return Err(ReshelfError::config("class tag must not be empty"));
    }

    // "SM_" and "SM" mean the same thing
    let prefix = rule.prefix.trim().trim_end_matches('_').to_string();
    if prefix
        .chars()
        .any(|c| c == '/' || c == '.' || c.is_whitespace())
    {
        return Err(ReshelfError::config(format!(
            "prefix '{}' for '{}' may not contain '/', '.' or whitespace",
            rule.prefix, tag
        )));
    }

    let directory = validate_directory(&format!("path for '{}'", tag), &rule.directory)?;

    Ok(Rule {
        class_tag: ClassTag::from(tag),
        prefix,
        directory,
    })
}

fn validate_directory(what: &str, directory: &str) -> Result<String> {
    let trimmed = directory.trim();
    if !trimmed.starts_with('/') {
        return Err(ReshelfError::config(format!(
            "{} must be an absolute namespace path, got '{}'",
            what, directory
        )));
    }
    if trimmed.split('/').any(|s| s == "." || s == "..") {
        return Err(ReshelfError::config(format!(
            "{} may not contain '.' or '..' segments, got '{}'",
            what, directory
        )));
    }
    Ok(normalize_path(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"{
        "StaticMesh":       { "prefix": "SM",  "path": "/Game/Assets/SM/" },
        "MaterialInstance": { "prefix": "MI_", "path": "/Game/Assets/M/MI" },
        "Material":         { "prefix": "M",   "path": "/Game/Assets/M" },
        "AnimSequence":     { "prefix": "AS",  "path": "/Game/Assets/AS" },
        "AnimationSequence":{ "prefix": "AS",  "path": "/Game/Assets/AS/" },
        "DataTable":        { "prefix": "",    "path": "/Game/Data" }
    }"#;

    fn example() -> RuleTable {
        RuleTable::from_json_str(EXAMPLE, DEFAULT_ROOT).unwrap()
    }

    #[test]
    fn test_prefix_lookup() {
        let table = example();
        assert_eq!(table.prefix_for(&ClassTag::from("StaticMesh")), "SM");
        assert_eq!(table.prefix_for(&ClassTag::from("MaterialInstance")), "MI");
        assert_eq!(table.prefix_for(&ClassTag::from("DataTable")), "");
        assert_eq!(table.prefix_for(&ClassTag::from("Sound")), "");
    }

    #[test]
    fn test_directory_lookup_and_fallback() {
        let table = example();
        assert_eq!(
            table.directory_for(&ClassTag::from("StaticMesh"), None),
            "/Game/Assets/SM"
        );
        assert_eq!(table.directory_for(&ClassTag::from("Sound"), None), DEFAULT_ROOT);
        assert_eq!(
            table.directory_for(&ClassTag::from("StaticMesh"), Some("Props")),
            "/Game/Assets/SM/Props"
        );
        assert_eq!(
            table.directory_for(&ClassTag::from("Sound"), Some("Ambience")),
            "/Game/Assets/Ambience"
        );
    }

    #[test]
    fn test_shared_prefix_same_directory_is_allowed() {
        let table = example();
        assert!(table.is_mapped(&ClassTag::from("AnimSequence")));
        assert!(table.is_mapped(&ClassTag::from("AnimationSequence")));
        assert_eq!(table.prefixes().iter().filter(|p| *p == "AS").count(), 1);
    }

    #[test]
    fn test_prefixes_longest_first() {
        let table = example();
        assert_eq!(table.prefixes()[0].len(), 2);
        assert_eq!(table.prefixes().last().map(String::as_str), Some("M"));
    }

    #[test]
    fn test_shared_prefix_different_directory_is_rejected() {
        let json = r#"{
            "ParticleSystem": { "prefix": "NS", "path": "/Game/Assets/NS" },
            "NiagaraSystem":  { "prefix": "NS", "path": "/Game/Assets/FX" }
        }"#;
        let err = RuleTable::from_json_str(json, DEFAULT_ROOT).unwrap_err();
        assert!(matches!(err, ReshelfError::Config(_)));
        assert!(err.to_string().contains("NS"));
    }

    #[test]
    fn test_split_shape() {
        let json = r#"{
            "prefix_patterns": { "StaticMesh": "SM", "Texture": "T" },
            "path_rules": { "StaticMesh": "/Game/Assets/SM", "Sound": "/Game/Assets/Sounds" }
        }"#;
        let table = RuleTable::from_json_str(json, DEFAULT_ROOT).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.directory_for(&ClassTag::from("Texture"), None), DEFAULT_ROOT);
        assert_eq!(table.prefix_for(&ClassTag::from("Sound")), "");
        assert_eq!(
            table.directory_for(&ClassTag::from("Sound"), None),
            "/Game/Assets/Sounds"
        );
    }

    #[test]
    fn test_malformed_tables_are_rejected() {
        let cases = [
            "[]",
            "not json",
            r#"{ "StaticMesh": "SM" }"#,
            r#"{ "StaticMesh": { "prefix": "SM" } }"#,
            r#"{ "StaticMesh": { "prefix": "SM", "path": "Game/SM" } }"#,
            r#"{ "StaticMesh": { "prefix": "S M", "path": "/Game/SM" } }"#,
            r#"{ "StaticMesh": { "prefix": "SM", "path": "/Game/../SM" } }"#,
            r#"{ "StaticMesh": { "prefix": "SM", "path": "/Game/SM", "extra": 1 } }"#,
            r#"{ "": { "prefix": "SM", "path": "/Game/SM" } }"#,
            r#"{ "prefix_patterns": { "StaticMesh": 1 } }"#,
        ];
        for json in cases {
            let err = RuleTable::from_json_str(json, DEFAULT_ROOT).unwrap_err();
            assert!(matches!(err, ReshelfError::Config(_)), "accepted: {json}");
        }
    }

    #[test]
    fn test_bad_default_root_is_rejected() {
        assert!(RuleTable::new(Vec::new(), "Game").is_err());
        assert!(RuleTable::new(Vec::new(), "/Game/Assets/").is_ok());
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = RuleTable::load(Path::new("/definitely/not/here.json"), DEFAULT_ROOT).unwrap_err();
        assert!(matches!(err, ReshelfError::Config(_)));
    }
}
