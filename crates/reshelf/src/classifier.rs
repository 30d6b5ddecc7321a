//! Classifiers: item -> class tag
//!
//! The engine only sees the [`Classifier`] trait. Hosts with their own
//! object system can pass a closure; the CLI uses [`PatternClassifier`] on
//! filesystem namespaces.

use crate::error::{ReshelfError, Result};
use crate::patterns;
use crate::types::{ClassTag, Item};
use globset::GlobMatcher;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resolves the class tag of an item.
///
/// An error means the item could not be read or recognized; the engine
/// records it as unclassifiable and moves on.
pub trait Classifier: Send + Sync {
    fn class_of(&self, item: &Item) -> Result<ClassTag>;
}

impl<F> Classifier for F
where
    F: Fn(&Item) -> Result<ClassTag> + Send + Sync,
{
    fn class_of(&self, item: &Item) -> Result<ClassTag> {
        self(item)
    }
}

fn unclassifiable(item: &Item, reason: impl Into<String>) -> ReshelfError {
    ReshelfError::Classification {
        item: item.location.clone(),
        reason: reason.into(),
    }
}

// ============================================================================
// Map classifier
// ============================================================================

/// Classifier backed by a fixed location -> tag map.
#[derive(Debug, Clone, Default)]
pub struct MapClassifier {
    tags: HashMap<String, ClassTag>,
}

impl MapClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location: &str, tag: impl Into<ClassTag>) {
        self.tags
            .insert(crate::naming::normalize_path(location), tag.into());
    }

    pub fn with(mut self, location: &str, tag: impl Into<ClassTag>) -> Self {
        self.insert(location, tag);
        self
    }
}

impl Classifier for MapClassifier {
    fn class_of(&self, item: &Item) -> Result<ClassTag> {
        self.tags
            .get(&item.location)
            .cloned()
            .ok_or_else(|| unclassifiable(item, "no class recorded for item"))
    }
}

// ============================================================================
// Pattern classifier
// ============================================================================

/// Glob pattern -> class tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    /// Glob matched against the item's path including extension (e.g. "*.fbx")
    pub pattern: String,
    /// Tag assigned to matching items
    pub tag: String,
}

impl PatternRule {
    pub fn new(pattern: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            tag: tag.into(),
        }
    }

    /// Parse `PATTERN=TAG`.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.rsplit_once('=') {
            Some((pattern, tag)) if !pattern.trim().is_empty() && !tag.trim().is_empty() => {
                Ok(Self::new(pattern.trim(), tag.trim()))
            }
            _ => Err(ReshelfError::Pattern(format!(
                "expected PATTERN=TAG, got '{}'",
                raw
            ))),
        }
    }
}

struct CompiledPattern {
    rule: PatternRule,
    matcher: GlobMatcher,
}

/// Classifies items by glob pattern. First matching rule wins.
pub struct PatternClassifier {
    rules: Vec<CompiledPattern>,
    fallback: Option<ClassTag>,
}

impl PatternClassifier {
    /// Compile the given rules (in priority order).
    pub fn new(rules: Vec<PatternRule>, fallback: Option<ClassTag>) -> Result<Self> {
        let compiled: Result<Vec<CompiledPattern>> = rules
            .into_iter()
            .map(|rule| {
                let normalized = patterns::normalize_glob_pattern(&rule.pattern);
                let matcher = patterns::build_matcher(&normalized)
                    .map_err(|e| ReshelfError::Pattern(format!("{}: {}", rule.pattern, e)))?;
                Ok(CompiledPattern { rule, matcher })
            })
            .collect();

        Ok(Self {
            rules: compiled?,
            fallback,
        })
    }

    /// Tag of the first matching rule, if any.
    pub fn tag_for(&self, item: &Item) -> Option<&str> {
        let candidate = item.file_path();
        let candidate = candidate.trim_start_matches('/');
        self.rules
            .iter()
            .find(|cr| cr.matcher.is_match(candidate))
            .map(|cr| cr.rule.tag.as_str())
    }

    pub fn rules(&self) -> impl Iterator<Item = &PatternRule> {
        self.rules.iter().map(|cr| &cr.rule)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.fallback.is_none()
    }
}

impl Classifier for PatternClassifier {
    fn class_of(&self, item: &Item) -> Result<ClassTag> {
        match self.tag_for(item) {
            Some(tag) => Ok(ClassTag::from(tag)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| unclassifiable(item, "no pattern matched")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(location: &str, ext: &str) -> Item {
        Item::new(location).with_extension(ext)
    }

    #[test]
    fn test_map_classifier() {
        let classifier = MapClassifier::new().with("/Game/rock", "StaticMesh");
        assert_eq!(
            classifier.class_of(&Item::new("/Game/rock")).unwrap(),
            ClassTag::from("StaticMesh")
        );
        assert!(matches!(
            classifier.class_of(&Item::new("/Game/other")),
            Err(ReshelfError::Classification { .. })
        ));
    }

    #[test]
    fn test_closure_classifier() {
        let classifier = |item: &Item| -> Result<ClassTag> {
            if item.name.ends_with("_d") {
                Ok(ClassTag::from("Texture2D"))
            } else {
                Err(unclassifiable(item, "unknown"))
            }
        };
        assert_eq!(
            classifier.class_of(&Item::new("/rock_d")).unwrap(),
            ClassTag::from("Texture2D")
        );
        assert!(classifier.class_of(&Item::new("/rock")).is_err());
    }

    #[test]
    fn test_pattern_first_match_wins() {
        let classifier = PatternClassifier::new(
            vec![
                PatternRule::new("Characters/*.fbx", "SkeletalMesh"),
                PatternRule::new("*.fbx", "StaticMesh"),
                PatternRule::new("*.png", "Texture2D"),
            ],
            None,
        )
        .unwrap();

        assert_eq!(
            classifier.class_of(&file("/Characters/hodol", "fbx")).unwrap(),
            ClassTag::from("SkeletalMesh")
        );
        assert_eq!(
            classifier.class_of(&file("/Props/rock", "FBX")).unwrap(),
            ClassTag::from("StaticMesh")
        );
        assert_eq!(
            classifier.class_of(&file("/rock_d", "png")).unwrap(),
            ClassTag::from("Texture2D")
        );
    }

    #[test]
    fn test_pattern_fallback() {
        let strict = PatternClassifier::new(vec![PatternRule::new("*.fbx", "StaticMesh")], None)
            .unwrap();
        assert!(strict.class_of(&file("/notes", "txt")).is_err());

        let lenient = PatternClassifier::new(
            vec![PatternRule::new("*.fbx", "StaticMesh")],
            Some(ClassTag::from("Misc")),
        )
        .unwrap();
        assert_eq!(
            lenient.class_of(&file("/notes", "txt")).unwrap(),
            ClassTag::from("Misc")
        );
    }

    #[test]
    fn test_invalid_pattern() {
        let result = PatternClassifier::new(vec![PatternRule::new("[oops", "X")], None);
        assert!(matches!(result, Err(ReshelfError::Pattern(_))));
    }

    #[test]
    fn test_parse_pattern_rule() {
        assert_eq!(
            PatternRule::parse("*.fbx=StaticMesh").unwrap(),
            PatternRule::new("*.fbx", "StaticMesh")
        );
        assert!(PatternRule::parse("*.fbx").is_err());
        assert!(PatternRule::parse("=StaticMesh").is_err());
    }
}
