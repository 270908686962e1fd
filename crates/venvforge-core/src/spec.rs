//! Provisioning inputs: what runtime to create and what to install into it.
//!
//! A `ProvisioningSpec` is built once per run (usually from the host
//! project's manifest, see [`crate::manifest`]) and never mutated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_DISTRIBUTION: &str = "virtualenv";
pub const DEFAULT_INTERPRETER: &str = "python";
pub const DEFAULT_ENTRY_POINT: &str = "virtualenv.py";

/// Immutable description of the sandbox a host project wants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningSpec {
    /// Distribution on the package index that ships the creation tool.
    pub distribution: String,
    /// Version constraint for `distribution` (`*`, `1.2.0`, `<2.0.0`, ...).
    pub version: String,
    /// Interpreter that runs the creation tool.
    pub interpreter: String,
    /// Creation tool entry file, relative to the unpacked sources.
    pub entry_point: String,
    /// Passed verbatim to the creation tool, in order.
    pub flags: Vec<String>,
    pub dependencies: Dependencies,
    /// Opaque payload (e.g. a post-install script body). Only fingerprinted.
    pub extra: Option<String>,
}

impl Default for ProvisioningSpec {
    fn default() -> Self {
        Self {
            distribution: DEFAULT_DISTRIBUTION.to_string(),
            version: "*".to_string(),
            interpreter: DEFAULT_INTERPRETER.to_string(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            flags: Vec::new(),
            dependencies: Dependencies::Packages(Vec::new()),
            extra: None,
        }
    }
}

/// The two supported ways of declaring the dependency set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependencies {
    /// Explicit package list.
    Packages(Vec<DependencySpec>),
    /// Path to a requirements file handed to the installer as-is.
    Manifest(PathBuf),
}

/// One package with an optional version constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl DependencySpec {
    pub fn new(name: impl Into<String>, constraint: Option<&str>) -> Self {
        Self {
            name: name.into(),
            constraint: constraint
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from),
        }
    }

    /// Split a requirement string like `requests>=2.31` into name and constraint.
    pub fn parse(requirement: &str) -> Self {
        let requirement = requirement.trim();
        let split = requirement
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '[' | ']')))
            .unwrap_or(requirement.len());
        let (name, rest) = requirement.split_at(split);
        Self::new(name, Some(rest))
    }

    /// Installer-ready specifier. A bare version becomes an exact pin.
    pub fn specifier(&self) -> String {
        match self.constraint.as_deref() {
            None => self.name.clone(),
            Some(c) if c.starts_with(|ch: char| ch.is_ascii_digit()) => {
                format!("{}=={}", self.name, c)
            }
            Some(c) => format!("{}{}", self.name, c),
        }
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.specifier())
    }
}
