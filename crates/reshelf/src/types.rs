//! Core types for Reshelf
//!
//! An [`Item`] is a content unit living at a `/`-delimited namespace
//! location. A [`ClassTag`] is the opaque type name a classifier reports for
//! it. The engine never creates or deletes items; it only relocates them.

use crate::naming::{last_segment, normalize_path, parent_of};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Class tags
// ============================================================================

/// Opaque type classification of an item (e.g. "StaticMesh", "Texture2D").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassTag(String);

impl ClassTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl From<String> for ClassTag {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

impl AsRef<str> for ClassTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Items
// ============================================================================

/// A content unit identified by its namespace location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Normalized namespace path, e.g. `/Game/Assets/cat_tower`
    pub location: String,
    /// Intrinsic name: the last segment of `location`
    pub name: String,
    /// Storage extension for file-backed namespaces (`fbx`, `uasset`, ...).
    /// Not part of the namespace identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl Item {
    /// Create an item at the given namespace location.
    pub fn new(location: &str) -> Self {
        let location = normalize_path(location);
        let name = last_segment(&location).to_string();
        Self {
            location,
            name,
            extension: None,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.extension = if extension.is_empty() {
            None
        } else {
            Some(extension)
        };
        self
    }

    /// Build an item from a host object path.
    ///
    /// Host listings return `PackageName.ObjectName`
    /// (`/Game/Assets/meat.meat`), and on-disk listings may carry a
    /// `.uasset` suffix. Only the package path is kept. The object suffix is
    /// dropped only when it repeats the package's last segment, so names
    /// such as `hero_body.v003` survive untouched.
    pub fn from_object_path(path: &str) -> Self {
        let trimmed = path.trim();
        let trimmed = trimmed.strip_suffix(".uasset").unwrap_or(trimmed);

        let package = trimmed
            .match_indices('.')
            .map(|(idx, _)| (&trimmed[..idx], &trimmed[idx + 1..]))
            .find(|(package, object)| !object.contains('/') && last_segment(package) == *object)
            .map(|(package, _)| package)
            .unwrap_or(trimmed);

        Self::new(package)
    }

    /// Namespace directory containing this item.
    pub fn directory(&self) -> &str {
        parent_of(&self.location)
    }

    /// Location with the storage extension appended, for display and
    /// pattern matching.
    pub fn file_path(&self) -> String {
        match &self.extension {
            Some(ext) => format!("{}.{}", self.location, ext),
            None => self.location.clone(),
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location)
    }
}

// ============================================================================
// Rules and canonical identity
// ============================================================================

/// Naming and placement rule for one class tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub class_tag: ClassTag,
    /// Name prefix without the `_` separator (may be empty)
    pub prefix: String,
    /// Normalized target directory
    pub directory: String,
}

/// Name and directory an item should have under the current rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalIdentity {
    pub name: String,
    pub directory: String,
}

impl CanonicalIdentity {
    /// Full canonical namespace path.
    pub fn path(&self) -> String {
        normalize_path(&format!("{}/{}", self.directory, self.name))
    }
}
