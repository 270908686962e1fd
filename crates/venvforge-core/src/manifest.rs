//! Host project manifest → `ProvisioningSpec`.
//!
//! The host declares its sandbox in the `virtualenv` section of `package.json`:
//!
//! ```json
//! {
//!   "virtualenv": {
//!     "version": "<20.0.0",
//!     "flags": ["--no-download"],
//!     "python": "python3",
//!     "dependencies": ["requests>=2.31", { "name": "six", "version": "1.16.0" }]
//!   },
//!   "scripts": { "postinstall": "venvforge provision" }
//! }
//! ```
//!
//! Without an inline `dependencies` list, `requirements.txt` next to the
//! manifest is mandatory and handed to the installer as a manifest file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::spec::{
    Dependencies, DependencySpec, ProvisioningSpec, DEFAULT_DISTRIBUTION, DEFAULT_ENTRY_POINT,
    DEFAULT_INTERPRETER,
};

pub const MANIFEST_FILE: &str = "package.json";
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing {REQUIREMENTS_FILE} in {}", dir.display())]
    MissingRequirements { dir: PathBuf },
}

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    #[serde(default)]
    virtualenv: VirtualenvSection,
    #[serde(default)]
    scripts: Option<Scripts>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VirtualenvSection {
    version: Option<String>,
    #[serde(default)]
    flags: Vec<String>,
    python: Option<String>,
    distribution: Option<String>,
    entry_point: Option<String>,
    dependencies: Option<Vec<DependencyEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DependencyEntry {
    Requirement(String),
    Table { name: String, version: Option<String> },
}

impl From<DependencyEntry> for DependencySpec {
    fn from(entry: DependencyEntry) -> Self {
        match entry {
            DependencyEntry::Requirement(req) => DependencySpec::parse(&req),
            DependencyEntry::Table { name, version } => {
                DependencySpec::new(name, version.as_deref())
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Scripts {
    postinstall: Option<String>,
}

/// Load the spec from `<project_dir>/package.json`.
pub fn load_from_dir(project_dir: &Path) -> Result<ProvisioningSpec, ManifestError> {
    load(&project_dir.join(MANIFEST_FILE))
}

/// Load the spec from an explicit manifest path.
pub fn load(manifest_path: &Path) -> Result<ProvisioningSpec, ManifestError> {
    let content = std::fs::read_to_string(manifest_path).map_err(|source| ManifestError::Read {
        path: manifest_path.to_path_buf(),
        source,
    })?;
    let package: PackageJson =
        serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
            path: manifest_path.to_path_buf(),
            source,
        })?;
    let project_dir = manifest_path.parent().unwrap_or(Path::new("."));
    into_spec(package, project_dir)
}

fn into_spec(package: PackageJson, project_dir: &Path) -> Result<ProvisioningSpec, ManifestError> {
    let section = package.virtualenv;
    let dependencies = match section.dependencies {
        Some(entries) => Dependencies::Packages(entries.into_iter().map(Into::into).collect()),
        None => {
            let requirements = project_dir.join(REQUIREMENTS_FILE);
            if !requirements.is_file() {
                return Err(ManifestError::MissingRequirements {
                    dir: project_dir.to_path_buf(),
                });
            }
            Dependencies::Manifest(requirements)
        }
    };

    Ok(ProvisioningSpec {
        distribution: section
            .distribution
            .unwrap_or_else(|| DEFAULT_DISTRIBUTION.to_string()),
        version: section.version.unwrap_or_else(|| "*".to_string()),
        interpreter: section
            .python
            .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string()),
        entry_point: section
            .entry_point
            .unwrap_or_else(|| DEFAULT_ENTRY_POINT.to_string()),
        flags: section.flags,
        dependencies,
        extra: package.scripts.and_then(|s| s.postinstall),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_load_with_requirements_file() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            MANIFEST_FILE,
            r#"{"virtualenv": {"version": "<2.0.0", "flags": ["--clear"], "python": "python3"},
                "scripts": {"postinstall": "make setup"}}"#,
        );
        write(tmp.path(), REQUIREMENTS_FILE, "requests\n");

        let spec = load_from_dir(tmp.path()).unwrap();
        assert_eq!(spec.version, "<2.0.0");
        assert_eq!(spec.flags, vec!["--clear".to_string()]);
        assert_eq!(spec.interpreter, "python3");
        assert_eq!(spec.distribution, "virtualenv");
        assert_eq!(spec.extra.as_deref(), Some("make setup"));
        assert_eq!(
            spec.dependencies,
            Dependencies::Manifest(tmp.path().join(REQUIREMENTS_FILE))
        );
    }

    #[test]
    fn test_load_inline_dependencies() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            MANIFEST_FILE,
            r#"{"virtualenv": {"dependencies": ["requests>=2.31", {"name": "six", "version": "1.16.0"}]}}"#,
        );

        let spec = load_from_dir(tmp.path()).unwrap();
        assert_eq!(spec.version, "*");
        assert_eq!(spec.extra, None);
        match spec.dependencies {
            Dependencies::Packages(deps) => {
                let specs: Vec<String> = deps.iter().map(|d| d.specifier()).collect();
                assert_eq!(specs, vec!["requests>=2.31", "six==1.16.0"]);
            }
            other => panic!("unexpected dependencies: {:?}", other),
        }
    }

    #[test]
    fn test_missing_requirements_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), MANIFEST_FILE, "{}");
        let err = load_from_dir(tmp.path()).unwrap_err();
        assert!(matches!(err, ManifestError::MissingRequirements { .. }));
    }

    #[test]
    fn test_malformed_manifest_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), MANIFEST_FILE, "{not json");
        let err = load_from_dir(tmp.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }
}
