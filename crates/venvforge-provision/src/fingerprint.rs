//! Content hash over everything that determines the sandbox contents.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use venvforge_core::spec::{Dependencies, ProvisioningSpec};

use crate::error::{ProvisionError, Result};

/// Bumped with the crate, so a new release invalidates existing sandboxes.
pub const TOOL_ID: &str = concat!("venvforge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash the tool id, every spec field and, for manifest-style
    /// dependencies, the manifest file contents.
    pub fn of(spec: &ProvisioningSpec) -> Result<Self> {
        let mut hasher = PartHasher::new();
        // Field order is fixed by the struct definition.
        let encoded =
            serde_json::to_vec(spec).map_err(|source| ProvisionError::Fingerprint { source })?;
        hasher.part(&encoded);

        if let Dependencies::Manifest(path) = &spec.dependencies {
            let contents = std::fs::read(path).map_err(|source| ProvisionError::Manifest {
                path: path.clone(),
                source,
            })?;
            hasher.part(&contents);
        }

        Ok(hasher.finish())
    }

    /// Hash only what the creation tool sees: distribution, resolved
    /// version, interpreter, entry point and flags. Equal build hashes mean
    /// the existing sandbox can be kept and only dependencies reinstalled.
    pub fn of_build(spec: &ProvisioningSpec, version: &str) -> Self {
        let mut hasher = PartHasher::new();
        hasher.part(spec.distribution.as_bytes());
        hasher.part(version.as_bytes());
        hasher.part(spec.interpreter.as_bytes());
        hasher.part(spec.entry_point.as_bytes());
        hasher.part(&(spec.flags.len() as u64).to_le_bytes());
        for flag in &spec.flags {
            hasher.part(flag.as_bytes());
        }
        hasher.finish()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a stored hash.
    pub fn matches(&self, stored: Option<&str>) -> bool {
        stored == Some(self.0.as_str())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 over length-prefixed parts, seeded with the tool id.
struct PartHasher(Sha256);

impl PartHasher {
    fn new() -> Self {
        let mut hasher = Self(Sha256::new());
        hasher.part(TOOL_ID.as_bytes());
        hasher
    }

    fn part(&mut self, bytes: &[u8]) {
        self.0.update((bytes.len() as u64).to_le_bytes());
        self.0.update(bytes);
    }

    fn finish(self) -> Fingerprint {
        Fingerprint(hex::encode(self.0.finalize()))
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}
