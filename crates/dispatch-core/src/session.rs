//! Binding a list identifier to a coordinator session.
//!
//! Resolution is explicit: a value handed in by the caller (CLI flag or the
//! `DISPATCH_LIST` environment variable, which clap injects before any
//! consumer code runs) always wins, and only then does the `.dispatch/current`
//! pointer file apply. The pointer file exists purely as the persistence
//! format session launchers already understand. The core never mutates or
//! consults process-global state, which keeps multi-tenant use and tests
//! honest.

use crate::error::{DispatchError, Result};
use crate::io;
use crate::paths;
use crate::store;
use std::path::Path;

/// Environment variable that session launchers set to hand the active list
/// to every worker process they spawn. It cannot be injected into an
/// already-running process; set it before starting consumers.
pub const LIST_ENV: &str = "DISPATCH_LIST";

/// Resolve the active list: explicit value first, then the pointer file.
pub fn resolve(explicit: Option<&str>, root: &Path) -> Result<String> {
    if let Some(list) = explicit {
        paths::validate_list_id(list)?;
        return Ok(list.to_string());
    }
    current(root)?.ok_or(DispatchError::NoCurrentList)
}

/// Read the current-list pointer, if one was ever set.
pub fn current(root: &Path) -> Result<Option<String>> {
    let path = paths::current_list_path(root);
    if !path.exists() {
        return Ok(None);
    }
    let list = std::fs::read_to_string(&path)?.trim().to_string();
    if list.is_empty() {
        return Ok(None);
    }
    Ok(Some(list))
}

/// Point the session at `list`, creating the list if it doesn't exist yet.
pub fn set_current(root: &Path, list: &str) -> Result<()> {
    paths::ensure_initialized(root)?;
    paths::validate_list_id(list)?;
    store::ensure_list(root, list)?;
    io::atomic_write(&paths::current_list_path(root), list.as_bytes())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
