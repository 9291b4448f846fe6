use crate::error::{DispatchError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DISPATCH_DIR: &str = ".dispatch";
pub const LISTS_DIR: &str = ".dispatch/lists";
pub const SNAPSHOTS_DIR: &str = ".dispatch/snapshots";
pub const ARCHIVES_DIR: &str = ".dispatch/archives";

pub const CONFIG_FILE: &str = ".dispatch/config.yaml";
pub const CURRENT_FILE: &str = ".dispatch/current";

pub const META_FILE: &str = "meta.yaml";
pub const MANIFEST_FILE: &str = "manifest.yaml";
pub const LATEST_FILE: &str = "latest";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn dispatch_dir(root: &Path) -> PathBuf {
    root.join(DISPATCH_DIR)
}

pub fn lists_dir(root: &Path) -> PathBuf {
    root.join(LISTS_DIR)
}

pub fn list_dir(root: &Path, list: &str) -> PathBuf {
    root.join(LISTS_DIR).join(list)
}

pub fn list_meta_path(root: &Path, list: &str) -> PathBuf {
    list_dir(root, list).join(META_FILE)
}

pub fn task_path(root: &Path, list: &str, id: &str) -> PathBuf {
    list_dir(root, list).join(format!("{id}.yaml"))
}

pub fn snapshots_dir(root: &Path) -> PathBuf {
    root.join(SNAPSHOTS_DIR)
}

pub fn snapshot_dir(root: &Path, list: &str) -> PathBuf {
    root.join(SNAPSHOTS_DIR).join(list)
}

pub fn snapshot_path(root: &Path, list: &str, name: &str) -> PathBuf {
    snapshot_dir(root, list).join(name)
}

pub fn latest_snapshot_path(root: &Path, list: &str) -> PathBuf {
    snapshot_dir(root, list).join(LATEST_FILE)
}

pub fn archives_dir(root: &Path) -> PathBuf {
    root.join(ARCHIVES_DIR)
}

pub fn archive_dir(root: &Path, name: &str) -> PathBuf {
    root.join(ARCHIVES_DIR).join(name)
}

pub fn archive_manifest_path(root: &Path, name: &str) -> PathBuf {
    archive_dir(root, name).join(MANIFEST_FILE)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn current_list_path(root: &Path) -> PathBuf {
    root.join(CURRENT_FILE)
}

/// Fail with `NotInitialized` unless `dispatch init` has been run under `root`.
pub fn ensure_initialized(root: &Path) -> Result<()> {
    if !dispatch_dir(root).is_dir() {
        return Err(DispatchError::NotInitialized);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// List-ID validation
// ---------------------------------------------------------------------------

static LIST_ID_RE: OnceLock<Regex> = OnceLock::new();

fn list_id_re() -> &'static Regex {
    LIST_ID_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_list_id(list: &str) -> Result<()> {
    if list.is_empty() || list.len() > 64 || !list_id_re().is_match(list) {
        return Err(DispatchError::InvalidListId(list.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
