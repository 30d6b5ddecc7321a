//! Asset directories: the namespace the engine reconciles
//!
//! [`AssetDirectory`] is the only way the engine touches the namespace.
//! Two implementations ship with the crate:
//!
//! - [`MemoryDirectory`]: an in-process namespace for hosts that mirror
//!   their own asset registry, and for tests
//! - [`FsDirectory`]: a real directory tree where `root/Props/rock.fbx`
//!   is the item `/Props/rock`

use crate::error::{ReshelfError, Result};
use crate::naming::{is_within, last_segment, normalize_path, parent_of};
use crate::types::Item;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Namespace operations the engine depends on.
pub trait AssetDirectory: Send + Sync {
    /// Point-in-time listing of every item under `scope` (recursive).
    fn list(&self, scope: &str) -> Result<Vec<Item>>;

    /// Whether any item occupies `path`.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Whether whatever occupies `path` is `item` itself.
    ///
    /// A case-only rename on case-insensitive storage resolves the
    /// destination to the item being renamed; any other occupant is a
    /// collision.
    fn is_same_item(&self, item: &Item, path: &str) -> Result<bool> {
        Ok(normalize_path(path) == item.location)
    }

    /// Create a directory and its parents. Must succeed if it already exists.
    fn ensure_directory(&self, path: &str) -> Result<()>;

    /// Move/rename `item` to `destination` as a single operation.
    ///
    /// `Ok(false)` means the directory refused the move and left the source
    /// untouched.
    fn move_item(&self, item: &Item, destination: &str) -> Result<bool>;

    /// Look up a single item by location.
    fn find(&self, location: &str) -> Result<Option<Item>> {
        let location = normalize_path(location);
        Ok(self
            .list(parent_of(&location))?
            .into_iter()
            .find(|item| item.location == location))
    }
}

// ============================================================================
// In-memory namespace
// ============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    items: BTreeMap<String, Item>,
    directories: BTreeSet<String>,
    moves: usize,
}

impl MemoryState {
    fn add_directory_chain(&mut self, path: &str) {
        let mut current = normalize_path(path);
        loop {
            let parent = parent_of(&current).to_string();
            let is_root = current == "/";
            self.directories.insert(current);
            if is_root {
                break;
            }
            current = parent;
        }
    }
}

/// Thread-safe in-memory namespace.
///
/// Moves require the destination directory to exist, mirroring editors that
/// refuse to rename into a missing folder.
#[derive(Debug)]
pub struct MemoryDirectory {
    state: Mutex<MemoryState>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        state.directories.insert("/".to_string());
        Self {
            state: Mutex::new(state),
        }
    }

    /// Build a namespace holding items at the given locations.
    pub fn with_items<'a>(locations: impl IntoIterator<Item = &'a str>) -> Self {
        let directory = Self::new();
        for location in locations {
            directory.insert(location);
        }
        directory
    }

    /// Build a namespace from a host listing of object paths
    /// (`/Game/Assets/meat.meat`).
    pub fn from_object_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let directory = Self::new();
        for path in paths {
            directory.insert_item(Item::from_object_path(path));
        }
        directory
    }

    /// Add an item (and its parent directories). Returns the stored item.
    pub fn insert(&self, location: &str) -> Item {
        self.insert_item(Item::new(location))
    }

    pub fn insert_item(&self, item: Item) -> Item {
        let mut state = self.lock();
        state.add_directory_chain(item.directory());
        state.items.insert(item.location.clone(), item.clone());
        item
    }

    /// Current item locations, sorted.
    pub fn locations(&self) -> Vec<String> {
        self.lock().items.keys().cloned().collect()
    }

    pub fn contains(&self, location: &str) -> bool {
        self.lock().items.contains_key(&normalize_path(location))
    }

    pub fn has_directory(&self, path: &str) -> bool {
        self.lock().directories.contains(&normalize_path(path))
    }

    /// Number of successful moves performed so far.
    pub fn move_count(&self) -> usize {
        self.lock().moves
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic mid-operation cannot leave a half-applied move: every
        // mutation below is a single map update.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AssetDirectory for MemoryDirectory {
    fn list(&self, scope: &str) -> Result<Vec<Item>> {
        let scope = normalize_path(scope);
        let state = self.lock();
        if !state.directories.contains(&scope) {
            return Err(ReshelfError::ScopeNotFound(scope));
        }
        Ok(state
            .items
            .values()
            .filter(|item| is_within(&item.location, &scope))
            .cloned()
            .collect())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.lock().items.contains_key(&normalize_path(path)))
    }

    fn ensure_directory(&self, path: &str) -> Result<()> {
        self.lock().add_directory_chain(path);
        Ok(())
    }

    fn move_item(&self, item: &Item, destination: &str) -> Result<bool> {
        let destination = normalize_path(destination);
        let mut state = self.lock();

        if !state.items.contains_key(&item.location) {
            warn!(item = %item.location, "Move source does not exist");
            return Ok(false);
        }
        if state.items.contains_key(&destination) {
            return Ok(false);
        }
        if !state.directories.contains(parent_of(&destination)) {
            return Ok(false);
        }

        let Some(mut moved) = state.items.remove(&item.location) else {
            return Ok(false);
        };
        moved.name = last_segment(&destination).to_string();
        moved.location = destination.clone();
        state.items.insert(destination, moved);
        state.moves += 1;
        Ok(true)
    }

    fn find(&self, location: &str) -> Result<Option<Item>> {
        Ok(self.lock().items.get(&normalize_path(location)).cloned())
    }
}

// ============================================================================
// Filesystem namespace
// ============================================================================

/// Namespace backed by a directory tree.
///
/// Each file is one item; its extension is storage detail, so
/// `root/Props/rock.fbx` lives at `/Props/rock`. Moves keep the extension
/// and never overwrite an existing file. Dotfiles and dot-directories are
/// not listed.
#[derive(Debug, Clone)]
pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of a namespace directory.
    pub fn resolve(&self, namespace_path: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in namespace_path.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }

    fn file_for(&self, location: &str, extension: Option<&str>) -> PathBuf {
        let base = self.resolve(location);
        match extension {
            Some(ext) => {
                let mut name = base.file_name().map(|n| n.to_os_string()).unwrap_or_default();
                name.push(".");
                name.push(ext);
                base.with_file_name(name)
            }
            None => base,
        }
    }

    fn item_for(&self, path: &Path) -> Option<Item> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let stem = path.file_stem()?.to_string_lossy().to_string();
        let parent = rel
            .parent()
            .map(normalize_path_to_forward_slashes)
            .unwrap_or_default();
        let location = normalize_path(&format!("{}/{}", parent, stem));
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        Some(Item::new(&location).with_extension(extension))
    }

    fn is_hidden(name: &std::ffi::OsStr) -> bool {
        name.to_string_lossy().starts_with('.')
    }

    /// Files whose stem is exactly the last segment of `location`.
    fn occupants(&self, location: &str) -> Result<Vec<PathBuf>> {
        let location = normalize_path(location);
        let name = last_segment(&location);
        let parent = self.resolve(parent_of(&location));

        let entries = match fs::read_dir(&parent) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.file_stem().map(|s| s.to_string_lossy() == name).unwrap_or(false) {
                found.push(path);
            }
        }
        Ok(found)
    }
}

#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let (a, b) = (fs::metadata(a)?, fs::metadata(b)?);
    Ok(a.dev() == b.dev() && a.ino() == b.ino())
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> Result<bool> {
    Ok(fs::canonicalize(a)? == fs::canonicalize(b)?)
}

/// Join path components with forward slashes regardless of platform.
fn normalize_path_to_forward_slashes(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl AssetDirectory for FsDirectory {
    fn list(&self, scope: &str) -> Result<Vec<Item>> {
        let dir = self.resolve(scope);
        if !dir.is_dir() {
            return Err(ReshelfError::ScopeNotFound(normalize_path(scope)));
        }

        let mut items = Vec::new();
        let walker = WalkDir::new(&dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !Self::is_hidden(e.file_name()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(item) = self.item_for(entry.path()) {
                items.push(item);
            }
        }

        debug!(scope = %scope, items = items.len(), "Listed filesystem namespace");
        Ok(items)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(!self.occupants(path)?.is_empty())
    }

    fn is_same_item(&self, item: &Item, path: &str) -> Result<bool> {
        let src = self.file_for(&item.location, item.extension.as_deref());
        let occupants = self.occupants(path)?;
        if occupants.is_empty() {
            return Ok(false);
        }
        for occupant in &occupants {
            if !same_file(&src, occupant)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn ensure_directory(&self, path: &str) -> Result<()> {
        // create_dir_all tolerates concurrent creators and existing dirs
        fs::create_dir_all(self.resolve(path))?;
        Ok(())
    }

    fn move_item(&self, item: &Item, destination: &str) -> Result<bool> {
        let src = self.file_for(&item.location, item.extension.as_deref());
        let dst = self.file_for(destination, item.extension.as_deref());

        if !src.is_file() {
            warn!(item = %item.location, "Move source does not exist");
            return Ok(false);
        }
        // On case-insensitive storage a case-only rename finds itself here
        if dst.exists() && !same_file(&src, &dst)? {
            return Ok(false);
        }

        fs::rename(&src, &dst).map_err(|e| ReshelfError::Move {
            from: src.display().to_string(),
            to: dst.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_list_scoped() {
        let dir = MemoryDirectory::with_items(["/Game/a", "/Game/Sub/b", "/Other/c"]);
        let items = dir.list("/Game").unwrap();
        let locations: Vec<_> = items.iter().map(|i| i.location.as_str()).collect();
        assert_eq!(locations, vec!["/Game/Sub/b", "/Game/a"]);
        assert_eq!(dir.list("/").unwrap().len(), 3);
        assert!(matches!(dir.list("/Missing"), Err(ReshelfError::ScopeNotFound(_))));
    }

    #[test]
    fn test_memory_from_object_paths() {
        let dir = MemoryDirectory::from_object_paths([
            "/Game/Incoming/meat.meat",
            "/Game/Incoming/hero_body.v003",
            "/Game/Incoming/rock.uasset",
        ]);
        assert_eq!(
            dir.locations(),
            vec![
                "/Game/Incoming/hero_body.v003",
                "/Game/Incoming/meat",
                "/Game/Incoming/rock",
            ]
        );
    }

    #[test]
    fn test_memory_move_requires_directory() {
        let dir = MemoryDirectory::with_items(["/Game/rock"]);
        let item = dir.find("/Game/rock").unwrap().unwrap();

        assert!(!dir.move_item(&item, "/Game/SM/SM_Rock").unwrap());
        assert!(dir.contains("/Game/rock"));

        dir.ensure_directory("/Game/SM").unwrap();
        dir.ensure_directory("/Game/SM").unwrap();
        assert!(dir.move_item(&item, "/Game/SM/SM_Rock").unwrap());
        assert!(!dir.contains("/Game/rock"));
        assert_eq!(dir.find("/Game/SM/SM_Rock").unwrap().unwrap().name, "SM_Rock");
        assert_eq!(dir.move_count(), 1);
    }

    #[test]
    fn test_memory_move_never_overwrites() {
        let dir = MemoryDirectory::with_items(["/Game/rock", "/Game/SM/SM_Rock"]);
        let item = dir.find("/Game/rock").unwrap().unwrap();
        assert!(!dir.move_item(&item, "/Game/SM/SM_Rock").unwrap());
        assert_eq!(dir.locations(), vec!["/Game/SM/SM_Rock", "/Game/rock"]);
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"data").unwrap();
    }

    #[test]
    fn test_fs_list_maps_files_to_items() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "Props/rock.fbx");
        touch(temp.path(), "hero_body.v003.fbx");
        touch(temp.path(), ".hidden/secret.fbx");
        touch(temp.path(), ".DS_Store");

        let dir = FsDirectory::new(temp.path());
        let items = dir.list("/").unwrap();
        let locations: Vec<_> = items.iter().map(|i| i.location.as_str()).collect();
        assert_eq!(locations, vec!["/Props/rock", "/hero_body.v003"]);
        assert_eq!(items[0].extension.as_deref(), Some("fbx"));
        assert_eq!(items[1].name, "hero_body.v003");
    }

    #[test]
    fn test_fs_exists_ignores_extension() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "SM/SM_Rock.fbx");
        let dir = FsDirectory::new(temp.path());
        assert!(dir.exists("/SM/SM_Rock").unwrap());
        assert!(!dir.exists("/SM/SM_Tree").unwrap());
        assert!(!dir.exists("/Nowhere/SM_Rock").unwrap());
    }

    #[test]
    fn test_fs_move_keeps_extension() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "Incoming/rock.fbx");
        let dir = FsDirectory::new(temp.path());
        let item = dir.find("/Incoming/rock").unwrap().unwrap();

        dir.ensure_directory("/SM").unwrap();
        assert!(dir.move_item(&item, "/SM/SM_Rock").unwrap());
        assert!(temp.path().join("SM/SM_Rock.fbx").is_file());
        assert!(!temp.path().join("Incoming/rock.fbx").exists());
    }

    #[test]
    fn test_fs_move_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "rock.fbx");
        touch(temp.path(), "SM/SM_Rock.fbx");
        let dir = FsDirectory::new(temp.path());
        let item = dir.find("/rock").unwrap().unwrap();

        assert!(!dir.move_item(&item, "/SM/SM_Rock").unwrap());
        assert!(temp.path().join("rock.fbx").is_file());
    }

    #[test]
    fn test_fs_case_variants_are_distinct_items() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("SM")).unwrap();
        fs::write(temp.path().join("SM/SM_rock.fbx"), b"lower").unwrap();
        fs::write(temp.path().join("SM/SM_Rock.fbx"), b"upper").unwrap();
        let dir = FsDirectory::new(temp.path());
        if dir.list("/SM").unwrap().len() < 2 {
            // case-insensitive filesystem: only one file could be created
            return;
        }

        let item = dir.find("/SM/SM_rock").unwrap().unwrap();
        assert!(dir.exists("/SM/SM_Rock").unwrap());
        assert!(!dir.is_same_item(&item, "/SM/SM_Rock").unwrap());
        assert!(!dir.move_item(&item, "/SM/SM_Rock").unwrap());
        assert_eq!(fs::read(temp.path().join("SM/SM_Rock.fbx")).unwrap(), b"upper");
        assert_eq!(fs::read(temp.path().join("SM/SM_rock.fbx")).unwrap(), b"lower");
    }

    #[test]
    fn test_fs_item_is_same_as_itself() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "SM/SM_rock.fbx");
        let dir = FsDirectory::new(temp.path());
        let item = dir.find("/SM/SM_rock").unwrap().unwrap();
        assert!(dir.is_same_item(&item, "/SM/SM_rock").unwrap());
        assert!(!dir.is_same_item(&item, "/SM/SM_Tree").unwrap());
    }

    #[test]
    fn test_memory_case_variants_are_distinct_items() {
        let dir = MemoryDirectory::with_items(["/SM/SM_rock", "/SM/SM_Rock"]);
        let item = dir.find("/SM/SM_rock").unwrap().unwrap();
        assert!(dir.exists("/SM/SM_Rock").unwrap());
        assert!(!dir.is_same_item(&item, "/SM/SM_Rock").unwrap());
        assert!(dir.is_same_item(&item, "/SM/SM_rock").unwrap());
    }

    #[test]
    fn test_fs_missing_scope() {
        let temp = TempDir::new().unwrap();
        let dir = FsDirectory::new(temp.path());
        assert!(matches!(dir.list("/Nope"), Err(ReshelfError::ScopeNotFound(_))));
    }
}
