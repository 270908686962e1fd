//! Persisted fingerprint record (`state.json`).
//!
//! Read once per run; written once, after every step succeeded. The write
//! goes through a temp file in the same directory and a rename, so a crash
//! mid-save leaves the previous record in place.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tarball_url: Option<String>,
    /// Hash of the creation-tool inputs the sandbox was built with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FingerprintStore {
    path: PathBuf,
}

impl FingerprintStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable records count as "never provisioned".
    pub fn load(&self) -> FingerprintRecord {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return FingerprintRecord::default()
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "fingerprint record unreadable, ignoring");
                return FingerprintRecord::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "fingerprint record corrupt, ignoring");
                FingerprintRecord::default()
            }
        }
    }

    pub fn save(&self, record: &FingerprintRecord) -> Result<()> {
        let persist_err = |source: std::io::Error| ProvisionError::Persist {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(persist_err)?;

        let data = serde_json::to_vec_pretty(record).map_err(|e| persist_err(e.into()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(persist_err)?;
        tmp.write_all(&data).map_err(persist_err)?;
        tmp.as_file().sync_all().map_err(persist_err)?;
        tmp.persist(&self.path).map_err(|e| persist_err(e.error))?;

        tracing::debug!(path = %self.path.display(), "fingerprint record saved");
        Ok(())
    }
}
