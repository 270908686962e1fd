//! On-disk layout of a project's provisioned state.
//!
//! ```text
//! <project>/.venvforge/
//!   env/          sandbox (virtualenv)
//!   sources/      staged creation-tool sources, one dir per version
//!   state.json    fingerprint record
//! ```
//!
//! The three live side by side so replacing the sandbox never touches the
//! staged sources or the record.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use venvforge_core::config::StateConfig;

const SANDBOX_DIR: &str = "env";
const STAGING_DIR: &str = "sources";
const RECORD_FILE: &str = "state.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub home: PathBuf,
    pub sandbox_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub record_path: PathBuf,
}

impl Layout {
    /// Layout rooted at `<project_dir>/<state_dir_name>`.
    pub fn new(project_dir: &Path, state_dir_name: &str) -> Self {
        Self::at(project_dir.join(state_dir_name))
    }

    /// Layout rooted at an explicit state home.
    pub fn at(home: PathBuf) -> Self {
        Self {
            sandbox_dir: home.join(SANDBOX_DIR),
            staging_dir: home.join(STAGING_DIR),
            record_path: home.join(RECORD_FILE),
            home,
        }
    }

    pub fn for_project(project_dir: &Path) -> Self {
        Self::new(project_dir, &StateConfig::from_env().dir_name)
    }

    /// Where the sources of `distribution` `version` unpack to.
    pub fn source_dir(&self, distribution: &str, version: &str) -> PathBuf {
        self.staging_dir.join(format!("{}-{}", distribution, version))
    }

    /// Command for an executable installed in the sandbox (`python`, `pip`, console scripts).
    pub fn command(&self, program: &str) -> Command {
        Command::new(executable(&self.sandbox_dir, program))
    }

    pub fn python(&self) -> Command {
        self.command("python")
    }
}

/// `bin/` on Unix, `Scripts/` on Windows (or whichever the sandbox actually has).
pub fn scripts_dir(sandbox_dir: &Path) -> PathBuf {
    let (preferred, other) = if cfg!(windows) {
        ("Scripts", "bin")
    } else {
        ("bin", "Scripts")
    };
    let preferred = sandbox_dir.join(preferred);
    let other = sandbox_dir.join(other);
    if !preferred.exists() && other.exists() {
        other
    } else {
        preferred
    }
}

pub fn executable(sandbox_dir: &Path, program: &str) -> PathBuf {
    let name = if cfg!(windows) && Path::new(program).extension().is_none() {
        format!("{}.exe", program)
    } else {
        program.to_string()
    };
    scripts_dir(sandbox_dir).join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths_are_siblings() {
        let layout = Layout::new(Path::new("/work/app"), ".venvforge");
        assert_eq!(layout.home, PathBuf::from("/work/app/.venvforge"));
        assert_eq!(layout.sandbox_dir, PathBuf::from("/work/app/.venvforge/env"));
        assert_eq!(layout.staging_dir, PathBuf::from("/work/app/.venvforge/sources"));
        assert_eq!(layout.record_path, PathBuf::from("/work/app/.venvforge/state.json"));
        assert_eq!(
            layout.source_dir("virtualenv", "1.2.0"),
            PathBuf::from("/work/app/.venvforge/sources/virtualenv-1.2.0")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_scripts_dir_falls_back_to_existing() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(scripts_dir(tmp.path()), tmp.path().join("bin"));
        std::fs::create_dir_all(tmp.path().join("Scripts")).unwrap();
        assert_eq!(scripts_dir(tmp.path()), tmp.path().join("Scripts"));
        assert_eq!(executable(tmp.path(), "pip"), tmp.path().join("Scripts/pip"));
    }

    #[test]
    fn test_command_targets_sandbox_bin() {
        let layout = Layout::at(PathBuf::from("/nonexistent/state"));
        let cmd = layout.python();
        let program = PathBuf::from(cmd.as_std().get_program());
        assert!(program.starts_with("/nonexistent/state/env"));
    }
}
