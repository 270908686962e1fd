//! Dependency installer: runs the sandbox's own `pip`.

use std::path::Path;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use venvforge_core::spec::Dependencies;

use crate::builder::absolute;
use crate::error::{ProvisionError, Result};
use crate::layout;
use crate::pipeline::Stage;
use crate::process::run_streaming;
use crate::sink::{Action, ProgressEvent, ProvisionSink};

pub const INSTALLER: &str = "pip";

#[derive(Debug, Clone, Default)]
pub struct DependencyInstaller;

impl DependencyInstaller {
    pub fn new() -> Self {
        Self
    }

    pub async fn install(
        &self,
        sandbox_dir: &Path,
        dependencies: &Dependencies,
        sink: &dyn ProvisionSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        sink.on_progress(&ProgressEvent::new(
            Action::Installing,
            sandbox_dir.display().to_string(),
        ));

        let args = match install_args(dependencies) {
            Some(args) => args,
            None => {
                tracing::debug!(sandbox = %sandbox_dir.display(), "no dependencies declared");
                return Ok(());
            }
        };

        let sandbox_dir = absolute(sandbox_dir);
        let scripts = layout::scripts_dir(&sandbox_dir);
        let mut cmd = Command::new(layout::executable(&sandbox_dir, INSTALLER));
        cmd.args(&args).current_dir(&scripts);

        let exit_code = run_streaming(cmd, Stage::Installing, sink, cancel).await?;
        if exit_code != 0 {
            return Err(ProvisionError::InstallFailed { exit_code });
        }
        Ok(())
    }
}

/// `None` when there is nothing to install.
fn install_args(dependencies: &Dependencies) -> Option<Vec<String>> {
    match dependencies {
        Dependencies::Manifest(path) => Some(vec![
            "install".to_string(),
            "-r".to_string(),
            absolute(path).to_string_lossy().into_owned(),
        ]),
        Dependencies::Packages(packages) if packages.is_empty() => None,
        Dependencies::Packages(packages) => Some(
            std::iter::once("install".to_string())
                .chain(packages.iter().map(|p| p.specifier()))
                .collect(),
        ),
    }
}
