//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use reshelf::ReshelfError;
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    /// Create a new helpful error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a suggestion for fixing the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add multiple suggestions
    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions
            .extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Namespace root does not exist
    pub fn path_not_found(path: &Path) -> Self {
        Self::new(format!("Path not found: {}", path.display()))
            .with_context("The namespace root does not exist on the filesystem")
            .with_suggestions([
                format!("TRY: Check that the path exists: ls -la {}", path.display()),
                "TRY: Check for typos in the path".to_string(),
            ])
    }

    /// Namespace root is a file
    pub fn not_a_directory(path: &Path) -> Self {
        Self::new(format!("Not a directory: {}", path.display()))
            .with_context("The namespace root must be a directory")
            .with_suggestion(format!(
                "TRY: Use the parent directory: reshelf reconcile {}",
                path.parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| ".".to_string())
            ))
    }

    /// Rule table is missing or invalid
    pub fn invalid_rules(path: &Path, details: &str) -> Self {
        Self::new(format!("Invalid rule table: {}", path.display()))
            .with_context(details.to_string())
            .with_suggestions([
                "TRY: Each entry must look like {\"StaticMesh\": {\"prefix\": \"SM\", \"path\": \"/Game/Assets/SM\"}}".to_string(),
                "TRY: Two classes may share a prefix only if they share a directory".to_string(),
                format!("TRY: Validate the table: reshelf rules --rules {}", path.display()),
            ])
    }

    /// Config file could not be read
    pub fn invalid_config(path: &Path, details: &str) -> Self {
        Self::new(format!("Invalid config: {}", path.display()))
            .with_context(details.to_string())
            .with_suggestions([
                "TRY: Show resolved paths: reshelf config".to_string(),
                "TRY: Patterns are [[classify]] tables with `pattern` and `tag` keys".to_string(),
            ])
    }

    /// No way to classify files
    pub fn no_classifier() -> Self {
        Self::new("No classification rules configured")
            .with_context("Every file would be unclassifiable")
            .with_suggestions([
                "TRY: Pass patterns on the command line: --classify '*.fbx=StaticMesh'".to_string(),
                "TRY: Add [[classify]] entries to config.toml".to_string(),
                "TRY: Set fallback_tag in config.toml".to_string(),
            ])
    }

    /// Bad `PATTERN=TAG` argument
    pub fn invalid_pattern(raw: &str, details: &str) -> Self {
        Self::new(format!("Invalid classify rule: '{}'", raw))
            .with_context(details.to_string())
            .with_suggestion("TRY: Use PATTERN=TAG, e.g. --classify 'Textures/*.png=Texture2D'")
    }

    /// Scope missing inside the namespace
    pub fn scope_not_found(scope: &str, root: &Path) -> Self {
        Self::new(format!("Scope not found: {}", scope))
            .with_context(format!("Namespace root: {}", root.display()))
            .with_suggestion("TRY: Scopes are relative to the root, e.g. --scope /Incoming")
    }

    /// Item missing inside the namespace
    pub fn item_not_found(item: &str, root: &Path) -> Self {
        Self::new(format!("Item not found: {}", item))
            .with_context(format!("Namespace root: {}", root.display()))
            .with_suggestions([
                "TRY: Items are named without their file extension, e.g. /Props/rock".to_string(),
                "TRY: List candidates: reshelf reconcile ROOT --dry-run".to_string(),
            ])
    }

    /// Translate a library error into a helpful one where we can.
    pub fn from_reshelf(err: ReshelfError, root: &Path, rules: &Path) -> Self {
        match err {
            ReshelfError::ScopeNotFound(scope) => Self::scope_not_found(&scope, root),
            ReshelfError::ItemNotFound(item) => Self::item_not_found(&item, root),
            ReshelfError::Config(details) => Self::invalid_rules(rules, &details),
            ReshelfError::Pattern(details) => Self::invalid_pattern("(config)", &details),
            other => Self::new(other.to_string()),
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Print an error as a JSON object on stdout.
pub fn print_json_error(err: &anyhow::Error) {
    let value = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => serde_json::json!({
            "error": helpful.message,
            "context": helpful.context,
            "suggestions": helpful.suggestions,
        }),
        None => serde_json::json!({
            "error": err.to_string(),
            "context": err.chain().skip(1).map(|e| e.to_string()).collect::<Vec<_>>(),
        }),
    };
    match serde_json::to_string_pretty(&value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{{\"error\": {:?}}}", err.to_string()),
    }
}
