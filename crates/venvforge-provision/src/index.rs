//! Package index collaborator.
//!
//! The pipeline only needs two questions answered: which releases of a
//! distribution exist, and where the artifacts of one release live.
//! `PypiIndex` answers them from the PyPI JSON API (or any mirror serving it).

use async_trait::async_trait;
use serde::Deserialize;
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// One downloadable file of a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseArtifact {
    pub url: String,
}

impl ReleaseArtifact {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// Release identifiers of `distribution`, in the index's own order.
    async fn list_releases(&self, distribution: &str) -> Result<Vec<String>, IndexError>;

    /// Artifacts published for one release.
    async fn release_artifacts(
        &self,
        distribution: &str,
        version: &str,
    ) -> Result<Vec<ReleaseArtifact>, IndexError>;
}

/// PyPI JSON API client.
#[derive(Debug, Clone)]
pub struct PypiIndex {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    /// Kept in document order; equal-precedence releases tie-break on it.
    #[serde(default)]
    releases: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    #[serde(default)]
    urls: Vec<ReleaseArtifact>,
}

impl PypiIndex {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(http: reqwest::Client, config: &venvforge_core::config::IndexConfig) -> Self {
        Self::new(http, config.base_url.clone())
    }

    /// GET a JSON document; `Ok(None)` for 404.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
    ) -> Result<Option<T>, IndexError> {
        tracing::debug!(%url, "querying package index");
        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| IndexError::Http {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(IndexError::Status {
                url,
                status: status.as_u16(),
            });
        }
        resp.json::<T>()
            .await
            .map(Some)
            .map_err(|source| IndexError::Decode { url, source })
    }
}

#[async_trait]
impl PackageIndex for PypiIndex {
    async fn list_releases(&self, distribution: &str) -> Result<Vec<String>, IndexError> {
        let url = format!("{}/{}/json", self.base_url, distribution);
        let project: Option<ProjectResponse> = self.get_json(url).await?;
        Ok(project
            .map(|p| p.releases.into_keys().collect())
            .unwrap_or_default())
    }

    async fn release_artifacts(
        &self,
        distribution: &str,
        version: &str,
    ) -> Result<Vec<ReleaseArtifact>, IndexError> {
        let url = format!("{}/{}/{}/json", self.base_url, distribution, version);
        let release: Option<ReleaseResponse> = self.get_json(url).await?;
        Ok(release.map(|r| r.urls).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_list_releases_reads_release_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/virtualenv/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "info": {"name": "virtualenv"},
                "releases": {"1.0.0": [], "1.2.0": [], "2.0.0b1": []}
            })))
            .mount(&server)
            .await;

        let index = PypiIndex::new(reqwest::Client::new(), server.uri());
        let mut releases = index.list_releases("virtualenv").await.unwrap();
        releases.sort();
        assert_eq!(releases, vec!["1.0.0", "1.2.0", "2.0.0b1"]);
    }

    #[tokio::test]
    async fn test_list_releases_keeps_document_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/virtualenv/json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"releases": {"1.0.0": [], "2.0": [], "1.0": []}}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let index = PypiIndex::new(reqwest::Client::new(), server.uri());
        let releases = index.list_releases("virtualenv").await.unwrap();
        assert_eq!(releases, vec!["1.0.0", "2.0", "1.0"]);
    }

    #[tokio::test]
    async fn test_unknown_project_has_no_releases() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nope/json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let index = PypiIndex::new(reqwest::Client::new(), format!("{}/", server.uri()));
        assert!(index.list_releases("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_artifacts_and_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/virtualenv/1.2.0/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "urls": [
                    {"url": "https://files.example/virtualenv-1.2.0-py3-none-any.whl", "packagetype": "bdist_wheel"},
                    {"url": "https://files.example/virtualenv-1.2.0.tar.gz", "packagetype": "sdist"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/virtualenv/9.9.9/json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let index = PypiIndex::new(reqwest::Client::new(), server.uri());
        let artifacts = index.release_artifacts("virtualenv", "1.2.0").await.unwrap();
        assert_eq!(artifacts.len(), 2);
        assert!(artifacts[1].url.ends_with(".tar.gz"));

        let err = index
            .release_artifacts("virtualenv", "9.9.9")
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Status { status: 503, .. }));
    }
}
