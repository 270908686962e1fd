//! `venvforge run <program> [args...]`

use anyhow::{Context, Result};
use std::path::PathBuf;
use venvforge_provision::Layout;

/// Run `program` from the sandbox with the caller's stdio. Returns the exit code.
pub async fn cmd_run(project: Option<PathBuf>, program: &str, args: &[String]) -> Result<i32> {
    let project = super::project_dir(project)?;
    let layout = Layout::for_project(&project);
    if !layout.sandbox_dir.is_dir() {
        anyhow::bail!(
            "No virtualenv at {}. Run `venvforge provision` first.",
            layout.sandbox_dir.display()
        );
    }

    let mut cmd = layout.command(program);
    cmd.args(args).current_dir(&project);
    tracing::debug!(program, ?args, "running in sandbox");

    let status = cmd
        .status()
        .await
        .with_context(|| format!("Failed to run {} from {}", program, layout.sandbox_dir.display()))?;
    Ok(status.code().unwrap_or(venvforge_provision::process::SIGNAL_EXIT_CODE))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[tokio::test]
    async fn test_runs_program_from_sandbox_bin() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::for_project(&tmp.path().canonicalize().unwrap());
        let bin = layout.sandbox_dir.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let tool = bin.join("tool");
        std::fs::write(&tool, "#!/bin/sh\nexit $1\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let code = cmd_run(Some(tmp.path().to_path_buf()), "tool", &["4".to_string()])
            .await
            .unwrap();
        assert_eq!(code, 4);
    }

    #[tokio::test]
    async fn test_missing_sandbox_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = cmd_run(Some(tmp.path().to_path_buf()), "python", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("venvforge provision"));
    }
}
