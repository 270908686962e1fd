//! Provisioning error taxonomy.
//!
//! Every step failure aborts the run and reaches the caller as one of these
//! variants. The only absorbed failure is a corrupt fingerprint record, which
//! `FingerprintStore::load` treats as "no prior state".

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::index::IndexError;
use crate::pipeline::Stage;

pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Index query failed; `context` says which query.
    #[error("{context}: {source}")]
    IndexUnavailable {
        context: String,
        #[source]
        source: IndexError,
    },

    #[error("{distribution} not found on the package index")]
    NotFound { distribution: String },

    #[error("invalid version constraint {constraint:?}: {source}")]
    InvalidConstraint {
        constraint: String,
        #[source]
        source: semver::Error,
    },

    #[error("{distribution} {constraint} not found")]
    ConstraintUnsatisfiable {
        distribution: String,
        constraint: String,
    },

    #[error("unable to find a tarball for {distribution} {version}")]
    ArtifactNotFound {
        distribution: String,
        version: String,
    },

    #[error("download of {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("failed to extract archive into {}: {source}", path.display())]
    Extraction {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to clean staging directory {}: {source}", path.display())]
    StagingCleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove previous sandbox {}: {source}", path.display())]
    SandboxCleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error while creating virtualenv: exit {exit_code}")]
    BuildFailed { exit_code: i32 },

    #[error("error while installing dependencies in virtualenv: exit {exit_code}")]
    InstallFailed { exit_code: i32 },

    #[error("failed to read dependency manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode provisioning inputs for fingerprinting: {source}")]
    Fingerprint {
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write fingerprint record {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} cancelled")]
    Cancelled { stage: Stage },

    #[error("{stage} timed out after {}s", after.as_secs())]
    TimedOut { stage: Stage, after: Duration },
}

impl ProvisionError {
    pub(crate) fn network(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    /// Whether the error came from the caller aborting the run.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
