use crate::output::print_json;
use dispatch_core::config::Config;
use dispatch_core::io;
use dispatch_core::paths;
use std::path::Path;

/// Scaffold the `.dispatch/` tree. Idempotent: re-running never clobbers an
/// existing config or any list state.
pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    io::ensure_dir(&paths::lists_dir(root))?;
    io::ensure_dir(&paths::snapshots_dir(root))?;
    io::ensure_dir(&paths::archives_dir(root))?;

    let config = serde_yaml::to_string(&Config::default())?;
    let wrote_config = io::write_if_missing(&paths::config_path(root), config.as_bytes())?;

    // Snapshots are ephemeral working state; lists and archives are durable.
    io::ensure_gitignore_entry(root, ".dispatch/snapshots/")?;

    if json {
        print_json(&serde_json::json!({
            "initialized": true,
            "root": root.display().to_string(),
            "config_written": wrote_config,
        }))?;
    } else {
        println!("Initialized dispatch in {}", paths::dispatch_dir(root).display());
    }
    Ok(())
}
