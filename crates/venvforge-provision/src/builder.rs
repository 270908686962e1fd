//! Sandbox builder: runs the creation tool against the unpacked sources.
//!
//! The target directory is always replaced wholesale, never patched, so a
//! sandbox created with different flags cannot leak into the new one.

use std::path::Path;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::{ProvisionError, Result};
use crate::fetcher::remove_dir_if_exists;
use crate::pipeline::Stage;
use crate::process::run_streaming;
use crate::sink::{Action, ProgressEvent, ProvisionSink};

/// How to invoke the creation tool: `<interpreter> <entry_point> [flags...] <target>`.
#[derive(Debug, Clone)]
pub struct SandboxBuilder {
    interpreter: String,
    entry_point: String,
}

impl SandboxBuilder {
    pub fn new(interpreter: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            entry_point: entry_point.into(),
        }
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub async fn build(
        &self,
        source_dir: &Path,
        target_dir: &Path,
        flags: &[String],
        sink: &dyn ProvisionSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        sink.on_progress(&ProgressEvent::new(
            Action::Creating,
            target_dir.display().to_string(),
        ));
        if target_dir.exists() {
            sink.on_progress(&ProgressEvent::new(
                Action::Cleaning,
                target_dir.display().to_string(),
            ));
        }
        remove_dir_if_exists(target_dir).map_err(|source| {
            ProvisionError::SandboxCleanupFailed {
                path: target_dir.to_path_buf(),
                source,
            }
        })?;

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&self.entry_point)
            .args(flags)
            .arg(absolute(target_dir))
            .current_dir(source_dir);

        let exit_code = run_streaming(cmd, Stage::Building, sink, cancel).await?;
        if exit_code != 0 {
            return Err(ProvisionError::BuildFailed { exit_code });
        }
        Ok(())
    }
}

/// The tool runs with `cwd = source_dir`, so relative targets must be anchored first.
pub(crate) fn absolute(path: &Path) -> std::path::PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
