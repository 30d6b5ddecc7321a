//! Glob pattern normalization and matching for the pattern classifier.

use globset::{GlobBuilder, GlobMatcher};

/// Normalize a glob pattern for matching against namespace-relative paths.
///
/// Rules:
/// - Empty or "*" becomes "**/*" (match all)
/// - Leading slashes are stripped (relative matching)
/// - Patterns without a path separator get "**/" prefix
pub fn normalize_glob_pattern(raw: &str) -> String {
    let mut pattern = raw.trim().trim_start_matches('/').to_string();

    if pattern.is_empty() || pattern == "*" {
        pattern = "**/*".to_string();
    }

    if !pattern.contains('/') && !pattern.starts_with("**/") && pattern != "**/*" {
        pattern = format!("**/{}", pattern);
    }

    pattern
}

/// Build a case-insensitive glob matcher from a normalized pattern.
pub fn build_matcher(glob_pattern: &str) -> Result<GlobMatcher, String> {
    GlobBuilder::new(glob_pattern)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(raw_pattern: &str, path: &str) -> Result<bool, String> {
        let matcher = build_matcher(&normalize_glob_pattern(raw_pattern))?;
        Ok(matcher.is_match(path.trim_start_matches('/')))
    }

    #[test]
    fn normalize_basics() {
        assert_eq!(normalize_glob_pattern(""), "**/*");
        assert_eq!(normalize_glob_pattern("*"), "**/*");
        assert_eq!(normalize_glob_pattern("*.fbx"), "**/*.fbx");
        assert_eq!(normalize_glob_pattern("Textures/*.png"), "Textures/*.png");
        assert_eq!(normalize_glob_pattern("/Textures/*.png"), "Textures/*.png");
    }

    #[test]
    fn matches_namespace_paths() {
        assert!(matches("*.fbx", "/rock.fbx").unwrap());
        assert!(matches("*.FBX", "/Props/Big/rock.fbx").unwrap());
        assert!(matches("Textures/*.png", "/Textures/rock_d.png").unwrap());
        assert!(!matches("Textures/*.png", "/Textures/Sub/rock_d.png").unwrap());
        assert!(matches("**/T_*", "/Incoming/T_rock").unwrap());
        assert!(!matches("*.fbx", "/rock.png").unwrap());
    }

    #[test]
    fn invalid_pattern_is_error() {
        assert!(build_matcher("[invalid").is_err());
    }
}
