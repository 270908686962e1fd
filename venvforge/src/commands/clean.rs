//! `venvforge clean`: remove the project's state home.
//!
//! The state home (`<project>/.venvforge` or `$VENVFORGE_STATE_DIR`) holds the
//! virtualenv, the staged creation-tool sources and the fingerprint record.
//! Removing it makes the next `provision` start from scratch.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use venvforge_provision::Layout;

pub fn cmd_clean(project: Option<PathBuf>, dry_run: bool, force: bool) -> Result<()> {
    let project = super::project_dir(project)?;
    let layout = Layout::for_project(&project);

    if !layout.home.exists() {
        eprintln!("Nothing to clean at {}", layout.home.display());
        return Ok(());
    }

    let entries = state_entries(&layout);
    let total_size: u64 = entries.iter().map(|(_, _, size)| size).sum();

    eprintln!("🗂  venvforge state in {}:", layout.home.display());
    eprintln!();
    for (label, path, size) in &entries {
        eprintln!("  • {} {} ({})", label, path.display(), human_size(*size));
    }
    eprintln!();
    eprintln!("Total: {}", human_size(total_size));

    if dry_run {
        eprintln!();
        eprintln!("(Dry run, no files removed. Remove --dry-run to delete.)");
        return Ok(());
    }

    if !force {
        eprint!("\nRemove the virtualenv and all cached state? [y/N] ");
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            eprintln!("Cancelled.");
            return Ok(());
        }
    }

    match fs::remove_dir_all(&layout.home) {
        Ok(()) => {
            tracing::debug!(home = %layout.home.display(), "state home removed");
            eprintln!();
            eprintln!("✓ Removed {}, freed {}", layout.home.display(), human_size(total_size));
        }
        Err(e) => {
            eprintln!("  ✗ Failed to remove {}: {}", layout.home.display(), e);
            return Err(e.into());
        }
    }

    Ok(())
}

/// Existing state components with their on-disk sizes.
fn state_entries(layout: &Layout) -> Vec<(&'static str, PathBuf, u64)> {
    [
        ("virtualenv", &layout.sandbox_dir),
        ("sources   ", &layout.staging_dir),
        ("record    ", &layout.record_path),
    ]
    .into_iter()
    .filter(|(_, path)| fs::symlink_metadata(path).is_ok())
    .map(|(label, path)| (label, path.clone(), disk_usage(path)))
    .collect()
}

/// Bytes held by regular files under `path`. Symlinks are not followed:
/// a virtualenv links its interpreter out to the system and `lib64` back
/// to `lib`.
fn disk_usage(path: &Path) -> u64 {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return 0;
    };
    if meta.is_file() {
        return meta.len();
    }
    if !meta.is_dir() {
        return 0;
    }
    fs::read_dir(path)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| disk_usage(&entry.path()))
                .sum::<u64>()
        })
        .unwrap_or(0)
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    let precision = if unit + 1 == UNITS.len() { 2 } else { 1 };
    format!("{:.*} {}", precision, value, UNITS[unit])
}
