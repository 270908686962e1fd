//! CLI commands.
//!
//!   provision   run the pipeline for a project
//!   status      show the stored record against the current inputs
//!   clean       remove the project's state home
//!   run         spawn a program from inside the sandbox

pub mod clean;
pub mod provision;
pub mod run;
pub mod status;

use anyhow::{Context, Result};
use std::path::PathBuf;

/// `--project` or the current directory, made absolute.
pub(crate) fn project_dir(project: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match project {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    dir.canonicalize()
        .with_context(|| format!("Project directory not found: {}", dir.display()))
}
