//! Version resolution: highest release satisfying a constraint, and its sdist URL.

use semver::{Version, VersionReq};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{ProvisionError, Result};
use crate::index::PackageIndex;
use crate::sink::{Action, ProgressEvent, ProvisionSink};

const TARBALL_SUFFIX: &str = ".tar.gz";

/// Concrete version chosen for this run plus its archive URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version: String,
    pub url: String,
}

/// npm-flavoured version range.
///
/// Accepts `*`, exact pins (`1.2.0`, also partial `1.2`), comparator sets
/// separated by spaces or commas (`>=1.0 <2.0`), inclusive hyphen ranges
/// (`1.0.0 - 2.0.0`) and `||` alternatives. A leading `v` on any version is
/// ignored.
#[derive(Debug, Clone)]
pub struct Constraint {
    alternatives: Vec<VersionReq>,
}

impl Constraint {
    pub fn parse(raw: &str) -> std::result::Result<Self, semver::Error> {
        let alternatives = raw
            .split("||")
            .map(parse_alternative)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { alternatives })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

fn parse_alternative(raw: &str) -> std::result::Result<VersionReq, semver::Error> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "*" || raw.eq_ignore_ascii_case("latest") {
        return Ok(VersionReq::STAR);
    }
    let tokens: Vec<&str> = raw.split([' ', ',']).filter(|t| !t.is_empty()).collect();
    if let [low, "-", high] = tokens.as_slice() {
        return VersionReq::parse(&format!(">={}, <={}", strip_v(low), strip_v(high)));
    }
    if let [single] = tokens.as_slice() {
        let bare = strip_v(single);
        if bare.starts_with(|c: char| c.is_ascii_digit()) {
            // Bare version: exact pin, not semver's implicit caret.
            return VersionReq::parse(&format!("={}", bare));
        }
    }

    // Glue dangling operators to their operand (">= 1.0" -> ">=1.0"),
    // then join comparators with commas.
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for token in tokens {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op.push_str(token);
            continue;
        }
        let op_len = token
            .find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^'))
            .unwrap_or(token.len());
        let (op, version) = token.split_at(op_len);
        pending_op.push_str(op);
        comparators.push(format!("{}{}", std::mem::take(&mut pending_op), strip_v(version)));
    }
    VersionReq::parse(&comparators.join(", "))
}

fn strip_v(version: &str) -> &str {
    version.strip_prefix(['v', 'V']).unwrap_or(version)
}

/// Parse an index release string, tolerating PEP 440 spellings.
///
/// `20.0` → `20.0.0`, `2.0.0b1` → `2.0.0-b1`, `1.0.post1` → `1.0.0+post1`.
/// Returns `None` for anything that cannot be ordered meaningfully.
pub fn parse_release(raw: &str) -> Option<Version> {
    let raw = raw.trim().trim_start_matches('v');
    if let Ok(v) = Version::parse(raw) {
        return Some(v);
    }

    let release_end = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (release, suffix) = raw.split_at(release_end);
    let release = release.trim_end_matches('.');
    let parts: Vec<u64> = release
        .split('.')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut version = Version::new(
        parts[0],
        parts.get(1).copied().unwrap_or(0),
        parts.get(2).copied().unwrap_or(0),
    );

    let suffix = suffix.trim_start_matches(['.', '-', '_']);
    if suffix.is_empty() {
        return Some(version);
    }
    if let Some(post) = suffix.strip_prefix("post") {
        version.build = semver::BuildMetadata::new(&format!("post{}", post)).ok()?;
    } else {
        version.pre = semver::Prerelease::new(suffix).ok()?;
    }
    Some(version)
}

/// Pick the highest release matching `constraint`; ties keep index order.
pub fn select_version<'a>(releases: &'a [String], constraint: &Constraint) -> Option<&'a str> {
    let mut candidates: Vec<(Version, &str)> = releases
        .iter()
        .filter_map(|r| parse_release(r).map(|v| (v, r.as_str())))
        .collect();
    candidates.sort_by(|a, b| precedence(&b.0, &a.0));
    candidates
        .into_iter()
        .find(|(v, _)| constraint.matches(v))
        .map(|(_, raw)| raw)
}

// Build metadata does not take part in ordering.
fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

pub struct VersionResolver {
    index: Arc<dyn PackageIndex>,
    distribution: String,
}

impl VersionResolver {
    pub fn new(index: Arc<dyn PackageIndex>, distribution: impl Into<String>) -> Self {
        Self {
            index,
            distribution: distribution.into(),
        }
    }

    pub async fn resolve(
        &self,
        constraint: &str,
        sink: &dyn ProvisionSink,
    ) -> Result<ResolvedVersion> {
        let dist = &self.distribution;
        sink.on_progress(&ProgressEvent::new(
            Action::Finding,
            format!("{} {}", dist, constraint),
        ));

        let parsed =
            Constraint::parse(constraint).map_err(|source| ProvisionError::InvalidConstraint {
                constraint: constraint.to_string(),
                source,
            })?;

        let releases = self.index.list_releases(dist).await.map_err(|source| {
            ProvisionError::IndexUnavailable {
                context: format!("unable to retrieve version information for {}", dist),
                source,
            }
        })?;
        if releases.is_empty() {
            return Err(ProvisionError::NotFound {
                distribution: dist.clone(),
            });
        }

        let version = select_version(&releases, &parsed)
            .ok_or_else(|| ProvisionError::ConstraintUnsatisfiable {
                distribution: dist.clone(),
                constraint: constraint.to_string(),
            })?
            .to_string();
        tracing::debug!(distribution = %dist, %version, "selected release");

        let artifacts = self
            .index
            .release_artifacts(dist, &version)
            .await
            .map_err(|source| ProvisionError::IndexUnavailable {
                context: format!("unable to retrieve release URLs for {} {}", dist, version),
                source,
            })?;
        let url = artifacts
            .into_iter()
            .map(|a| a.url)
            .find(|url| url.ends_with(TARBALL_SUFFIX))
            .ok_or_else(|| ProvisionError::ArtifactNotFound {
                distribution: dist.clone(),
                version: version.clone(),
            })?;

        Ok(ResolvedVersion { version, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexError, ReleaseArtifact};
    use crate::sink::MemorySink;
    use async_trait::async_trait;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeIndex {
        releases: Option<Vec<String>>,
        artifacts: HashMap<String, Vec<ReleaseArtifact>>,
    }

    impl FakeIndex {
        fn with_releases(releases: &[&str]) -> Self {
            Self {
                releases: Some(releases.iter().map(|s| s.to_string()).collect()),
                artifacts: HashMap::new(),
            }
        }

        fn artifact(mut self, version: &str, url: &str) -> Self {
            self.artifacts
                .entry(version.to_string())
                .or_default()
                .push(ReleaseArtifact::new(url));
            self
        }
    }

    #[async_trait]
    impl PackageIndex for FakeIndex {
        async fn list_releases(&self, _distribution: &str) -> Result<Vec<String>, IndexError> {
            self.releases
                .clone()
                .ok_or_else(|| IndexError::Other("index down".to_string()))
        }

        async fn release_artifacts(
            &self,
            _distribution: &str,
            version: &str,
        ) -> Result<Vec<ReleaseArtifact>, IndexError> {
            self.artifacts
                .get(version)
                .cloned()
                .ok_or_else(|| IndexError::Other("no such release".to_string()))
        }
    }

    fn resolver(index: FakeIndex) -> VersionResolver {
        VersionResolver::new(Arc::new(index), "virtualenv")
    }

    #[test]
    fn test_parse_release_pep440_spellings() {
        assert_eq!(parse_release("20.0"), Some(Version::new(20, 0, 0)));
        assert_eq!(parse_release("1"), Some(Version::new(1, 0, 0)));
        assert_eq!(parse_release("2.0.0-beta").unwrap().pre.as_str(), "beta");
        assert_eq!(parse_release("2.0.0b1").unwrap().pre.as_str(), "b1");
        assert_eq!(parse_release("1.0.post1").unwrap().build.as_str(), "post1");
        assert_eq!(parse_release("1.2.3.4"), None);
        assert_eq!(parse_release("banana"), None);
    }

    #[test]
    fn test_constraint_forms() {
        let v = |s: &str| parse_release(s).unwrap();
        assert!(Constraint::parse("*").unwrap().matches(&v("9.9.9")));
        assert!(Constraint::parse("1.2.0").unwrap().matches(&v("1.2.0")));
        assert!(!Constraint::parse("1.2.0").unwrap().matches(&v("1.3.0")));
        assert!(Constraint::parse(">= 1.0.0 <2.0.0").unwrap().matches(&v("1.5.0")));
        assert!(!Constraint::parse(">=1.0.0, <2.0.0").unwrap().matches(&v("2.0.0")));
        assert!(Constraint::parse("<1.0.0 || >=3.0.0").unwrap().matches(&v("3.1.0")));
        assert!(Constraint::parse("not a range").is_err());
    }

    #[test]
    fn test_hyphen_range_is_inclusive() {
        let v = |s: &str| parse_release(s).unwrap();
        let range = Constraint::parse("1.0.0 - 2.0.0").unwrap();
        assert!(range.matches(&v("1.0.0")));
        assert!(range.matches(&v("1.5.0")));
        assert!(range.matches(&v("2.0.0")));
        assert!(!range.matches(&v("2.0.1")));
        assert!(!range.matches(&v("0.9.9")));

        let either = Constraint::parse("1.0.0 - 1.2.0 || 3.0.0").unwrap();
        assert!(either.matches(&v("1.1.0")));
        assert!(either.matches(&v("3.0.0")));
        assert!(!either.matches(&v("2.0.0")));
    }

    #[test]
    fn test_v_prefix_is_ignored() {
        let v = |s: &str| parse_release(s).unwrap();
        let pin = Constraint::parse("v1.2.0").unwrap();
        assert!(pin.matches(&v("1.2.0")));
        assert!(!pin.matches(&v("1.2.1")));
        assert!(Constraint::parse(">=v1.0 <V2.0").unwrap().matches(&v("1.9.0")));
        assert!(Constraint::parse(">= v1.0").unwrap().matches(&v("1.0.0")));
        assert!(Constraint::parse("v1.0.0 - v2.0.0").unwrap().matches(&v("2.0.0")));
    }

    #[test]
    fn test_select_highest_matching_version() {
        let releases: Vec<String> = ["1.0.0", "1.2.0", "2.0.0-beta"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let constraint = Constraint::parse("<2.0.0").unwrap();
        assert_eq!(select_version(&releases, &constraint), Some("1.2.0"));
    }

    #[test]
    fn test_equal_releases_keep_index_order() {
        let constraint = Constraint::parse("*").unwrap();
        let releases = vec!["1.0".to_string(), "1.0.0".to_string()];
        assert_eq!(select_version(&releases, &constraint), Some("1.0"));
        let releases = vec!["1.0.0".to_string(), "1.0".to_string()];
        assert_eq!(select_version(&releases, &constraint), Some("1.0.0"));
    }

    #[tokio::test]
    async fn test_resolve_selects_version_and_tarball() {
        let index = FakeIndex::with_releases(&["1.0.0", "1.2.0", "2.0.0-beta"])
            .artifact("1.2.0", "https://files.example/virtualenv-1.2.0.zip")
            .artifact("1.2.0", "https://files.example/virtualenv-1.2.0.tar.gz");
        let sink = MemorySink::default();

        let resolved = resolver(index).resolve("<2.0.0", &sink).await.unwrap();
        assert_eq!(resolved.version, "1.2.0");
        assert_eq!(resolved.url, "https://files.example/virtualenv-1.2.0.tar.gz");
        assert_eq!(sink.actions(), vec![Action::Finding]);
    }

    #[tokio::test]
    async fn test_resolve_unsatisfiable_constraint() {
        let index = FakeIndex::with_releases(&["1.0.0"]);
        let err = resolver(index)
            .resolve(">2.0.0", &MemorySink::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::ConstraintUnsatisfiable { .. }));
    }

    #[tokio::test]
    async fn test_resolve_empty_index_is_not_found() {
        let err = resolver(FakeIndex::with_releases(&[]))
            .resolve("*", &MemorySink::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_without_tarball() {
        let index = FakeIndex::with_releases(&["1.0.0"])
            .artifact("1.0.0", "https://files.example/virtualenv-1.0.0-py3-none-any.whl");
        let err = resolver(index)
            .resolve("*", &MemorySink::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::ArtifactNotFound { .. }));
    }

    #[tokio::test]
    async fn test_index_failures_carry_context() {
        let err = resolver(FakeIndex::default())
            .resolve("*", &MemorySink::default())
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("unable to retrieve version information for virtualenv"));

        // Release listed, but artifact lookup fails.
        let err = resolver(FakeIndex::with_releases(&["1.0.0"]))
            .resolve("*", &MemorySink::default())
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("unable to retrieve release URLs for virtualenv 1.0.0"));
    }
}
