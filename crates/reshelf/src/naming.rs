//! Canonical name and path computation
//!
//! Everything here is a pure function of its inputs. The engine calls
//! [`canonical_identity`] once per item per pass; nothing is cached because
//! the rule table may change between runs.
//!
//! Name pipeline:
//! 1. drop `.vNNN` revision markers, turn remaining `.` into `_`
//! 2. strip the longest configured `PREFIX_` already on the name
//! 3. prepend the class prefix
//! 4. keep the first `_` segment, PascalCase the rest (`SM_hero_body` -> `SM_HeroBody`)

use crate::error::{ReshelfError, Result};
use crate::rules::RuleTable;
use crate::types::{CanonicalIdentity, ClassTag};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static REVISION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.v[0-9]+").expect("revision marker regex is valid"));

/// Length of `.v` plus exactly three digits.
const REVISION_MARKER_LEN: usize = 5;

// ============================================================================
// Namespace paths
// ============================================================================

/// Collapse duplicate slashes, force a leading `/` and drop any trailing one.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Last segment of a normalized path (`""` for the root).
pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// Parent of a normalized path. The root is its own parent.
pub fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Whether `path` is `scope` itself or lives beneath it.
pub fn is_within(path: &str, scope: &str) -> bool {
    if scope == "/" {
        return true;
    }
    path == scope
        || (path.starts_with(scope) && path.as_bytes().get(scope.len()) == Some(&b'/'))
}

// ============================================================================
// Name computation
// ============================================================================

/// Remove `.vNNN` revision markers and replace leftover periods.
///
/// Only markers with exactly three digits are removed; `.v0031` is kept and
/// becomes `_v0031`.
pub fn strip_revision_markers(name: &str) -> String {
    let stripped = REVISION_MARKER.replace_all(name, |caps: &Captures| {
        if caps[0].len() == REVISION_MARKER_LEN {
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    stripped.replace('.', "_")
}

/// Strip the longest configured prefix followed by `_`.
///
/// `SMALL_rock` keeps its head unless `SMALL` itself is a configured prefix.
pub fn strip_known_prefix<'a>(name: &'a str, rules: &RuleTable) -> &'a str {
    // prefixes() is ordered longest first
    rules
        .prefixes()
        .iter()
        .find_map(|prefix| {
            name.strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('_'))
        })
        .unwrap_or(name)
}

/// Keep the first `_` segment and PascalCase the remainder.
pub fn normalize_case(name: &str) -> String {
    let mut segments = name.split('_');
    let head = segments.next().unwrap_or("");
    let body: String = segments.map(capitalize).collect();

    if body.is_empty() {
        head.to_string()
    } else {
        format!("{}_{}", head, body)
    }
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Canonical name of an item for a class tag.
pub fn canonical_name(name: &str, class_tag: &ClassTag, rules: &RuleTable) -> Result<String> {
    let cleaned = strip_revision_markers(name.trim());
    let body = strip_known_prefix(&cleaned, rules);

    if body.trim_matches('_').is_empty() {
        return Err(ReshelfError::InvalidName {
            name: name.to_string(),
            reason: "nothing left after removing revision marker and prefix".to_string(),
        });
    }

    let prefix = rules.prefix_for(class_tag);
    let prefixed = if prefix.is_empty() {
        body.to_string()
    } else {
        format!("{}_{}", prefix, body)
    };

    Ok(normalize_case(&prefixed))
}

/// Canonical name and directory for an item.
pub fn canonical_identity(
    name: &str,
    class_tag: &ClassTag,
    rules: &RuleTable,
    sub_category: Option<&str>,
) -> Result<CanonicalIdentity> {
    let sub_category = sub_category.map(validate_sub_category).transpose()?;
    Ok(CanonicalIdentity {
        name: canonical_name(name, class_tag, rules)?,
        directory: rules.directory_for(class_tag, sub_category),
    })
}

/// Canonical path: `directory_for(tag) + "/" + canonical_name`.
pub fn canonical_path(name: &str, class_tag: &ClassTag, rules: &RuleTable) -> Result<String> {
    canonical_identity(name, class_tag, rules, None).map(|identity| identity.path())
}

/// A sub-category must be exactly one path segment.
pub fn validate_sub_category(sub_category: &str) -> Result<&str> {
    let trimmed = sub_category.trim().trim_matches('/');
    if trimmed.is_empty() || trimmed.contains('/') || trimmed == "." || trimmed == ".." {
        return Err(ReshelfError::InvalidName {
            name: sub_category.to_string(),
            reason: "sub-category must be a single path segment".to_string(),
        });
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rule;

    fn rule(tag: &str, prefix: &str, directory: &str) -> Rule {
        Rule {
            class_tag: ClassTag::from(tag),
            prefix: prefix.to_string(),
            directory: directory.to_string(),
        }
    }

    fn example_rules() -> RuleTable {
        RuleTable::new(
            vec![
                rule("StaticMesh", "SM", "/Assets/SM"),
                rule("Texture2D", "T", "/Assets/T"),
                rule("Material", "M", "/Assets/M"),
                rule("MaterialInstance", "MI", "/Assets/M/MI"),
                rule("AnimBlueprint", "ABP", "/Assets/AS/ABP"),
            ],
            "/Assets",
        )
        .unwrap()
    }

    fn name(raw: &str, tag: &str) -> String {
        canonical_name(raw, &ClassTag::from(tag), &example_rules()).unwrap()
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/Game//Assets/"), "/Game/Assets");
        assert_eq!(normalize_path("Game/Assets"), "/Game/Assets");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("///"), "/");
    }

    #[test]
    fn test_parent_and_last_segment() {
        assert_eq!(parent_of("/Game/Assets/rock"), "/Game/Assets");
        assert_eq!(parent_of("/rock"), "/");
        assert_eq!(parent_of("/"), "/");
        assert_eq!(last_segment("/Game/Assets/rock"), "rock");
        assert_eq!(last_segment("/"), "");
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("/Game/Assets/rock", "/Game"));
        assert!(is_within("/Game", "/Game"));
        assert!(is_within("/Anything", "/"));
        assert!(!is_within("/GameExtra/rock", "/Game"));
    }

    #[test]
    fn test_strip_revision_markers() {
        assert_eq!(strip_revision_markers("hero_body.v003"), "hero_body");
        assert_eq!(strip_revision_markers("hero.v001_body.v002"), "hero_body");
        assert_eq!(strip_revision_markers("hero.v0031"), "hero_v0031");
        assert_eq!(strip_revision_markers("hero.v03"), "hero_v03");
        assert_eq!(strip_revision_markers("hodol.lookdev"), "hodol_lookdev");
        // a literal period is required, not any character
        assert_eq!(strip_revision_markers("hero_v003"), "hero_v003");
    }

    #[test]
    fn test_strip_known_prefix_is_whole_token() {
        let rules = example_rules();
        assert_eq!(strip_known_prefix("SM_rock", &rules), "rock");
        assert_eq!(strip_known_prefix("MI_rock", &rules), "rock");
        assert_eq!(strip_known_prefix("SMALL_rock", &rules), "SMALL_rock");
        assert_eq!(strip_known_prefix("TX_rock", &rules), "TX_rock");
        assert_eq!(strip_known_prefix("SMrock", &rules), "SMrock");
    }

    #[test]
    fn test_normalize_case() {
        assert_eq!(normalize_case("SM_hero_body"), "SM_HeroBody");
        assert_eq!(normalize_case("SM_HeroBody"), "SM_HeroBody");
        assert_eq!(normalize_case("SM_a__b"), "SM_AB");
        assert_eq!(normalize_case("rock"), "rock");
        assert_eq!(normalize_case("SM_"), "SM");
        // rest of each segment is left alone
        assert_eq!(normalize_case("T_rockDIFF"), "T_RockDIFF");
    }

    #[test]
    fn test_version_marker_example() {
        let rules = example_rules();
        let path = canonical_path("hero_body.v003", &ClassTag::from("StaticMesh"), &rules).unwrap();
        assert_eq!(path, "/Assets/SM/SM_HeroBody");
    }

    #[test]
    fn test_foreign_prefix_is_replaced() {
        assert_eq!(name("T_rock", "StaticMesh"), "SM_Rock");
        assert_eq!(name("MI_chrome", "Material"), "M_Chrome");
    }

    #[test]
    fn test_no_double_prefixing() {
        let once = name("SM_cat_tower", "StaticMesh");
        assert_eq!(once, "SM_CatTower");
        assert_eq!(once.matches("SM_").count(), 1);
    }

    #[test]
    fn test_round_trip_is_stable() {
        for raw in ["cat_tower", "hero_body.v003", "T_rock_diffuse", "lamp", "a.b.c", "x__y"] {
            for tag in ["StaticMesh", "Texture2D", "MaterialInstance", "Unknown"] {
                let once = name(raw, tag);
                let twice = name(&once, tag);
                assert_eq!(once, twice, "not idempotent for {raw} / {tag}");
            }
        }
    }

    #[test]
    fn test_unmapped_tag_gets_no_prefix() {
        assert_eq!(name("cat_tower", "Unknown"), "cat_Tower");
        assert_eq!(name("SM_cat_tower", "Unknown"), "cat_Tower");
    }

    #[test]
    fn test_degenerate_names_are_rejected() {
        let rules = example_rules();
        let tag = ClassTag::from("StaticMesh");
        for raw in ["SM_", ".v001", "", "__", "SM_.v002"] {
            let err = canonical_name(raw, &tag, &rules).unwrap_err();
            assert!(matches!(err, ReshelfError::InvalidName { .. }), "{raw} should be invalid");
        }
    }

    #[test]
    fn test_identity_with_sub_category() {
        let rules = example_rules();
        let identity =
            canonical_identity("rock", &ClassTag::from("StaticMesh"), &rules, Some("Props"))
                .unwrap();
        assert_eq!(identity.directory, "/Assets/SM/Props");
        assert_eq!(identity.path(), "/Assets/SM/Props/SM_Rock");
    }

    #[test]
    fn test_sub_category_must_be_one_segment() {
        assert_eq!(validate_sub_category("/Props/").unwrap(), "Props");
        assert!(validate_sub_category("a/b").is_err());
        assert!(validate_sub_category("..").is_err());
        assert!(validate_sub_category("  ").is_err());
    }
}
