//! Provisioning pipeline: fingerprint check, then the minimal subsequence of
//! resolve → fetch → build → install, then one record write.
//!
//! ```text
//!            hash matches + sandbox present
//!   Idle ─────────────────────────────────────────────► Done
//!    │
//!    ▼
//!   Resolving ──┬── same build inputs + sandbox ─────► Installing
//!               ├── sources already staged ──────────► Building
//!               └────────────────────────────────────► Fetching
//!   Fetching ─► Building ─► Installing ─► Persisting ─► Done
//! ```
//!
//! Any step error moves to `Failed` and is returned as-is. The record is only
//! written in `Persisting`, so a failed run leaves the previous record intact
//! and the next run starts over.
//!
//! Each step gets a child cancellation token. On cancel or timeout the token
//! fires and the step is awaited until it winds down, so no download or
//! child process outlives the run.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use venvforge_core::config::{IndexConfig, PipelineConfig};
use venvforge_core::spec::{Dependencies, ProvisioningSpec};

use crate::builder::SandboxBuilder;
use crate::error::{ProvisionError, Result};
use crate::fetcher::ArchiveFetcher;
use crate::fingerprint::{Fingerprint, TOOL_ID};
use crate::index::{PackageIndex, PypiIndex};
use crate::info_log;
use crate::installer::DependencyInstaller;
use crate::layout::Layout;
use crate::resolver::{ResolvedVersion, VersionResolver};
use crate::sink::ProvisionSink;
use crate::store::{FingerprintRecord, FingerprintStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Idle,
    Resolving,
    Fetching,
    Building,
    Installing,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::Resolving => "resolving",
            Stage::Fetching => "fetching",
            Stage::Building => "building",
            Stage::Installing => "installing",
            Stage::Persisting => "persisting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The four external steps. The pipeline only decides which of them run.
#[async_trait]
pub trait ProvisionSteps: Send + Sync {
    async fn resolve(
        &self,
        spec: &ProvisioningSpec,
        sink: &dyn ProvisionSink,
        cancel: &CancellationToken,
    ) -> Result<ResolvedVersion>;

    async fn fetch(
        &self,
        url: &str,
        staging_dir: &Path,
        sink: &dyn ProvisionSink,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn build(
        &self,
        spec: &ProvisioningSpec,
        source_dir: &Path,
        sandbox_dir: &Path,
        sink: &dyn ProvisionSink,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn install(
        &self,
        sandbox_dir: &Path,
        dependencies: &Dependencies,
        sink: &dyn ProvisionSink,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Real steps: package index, HTTP download, creation tool, pip.
pub struct DefaultSteps {
    index: Arc<dyn PackageIndex>,
    fetcher: ArchiveFetcher,
    installer: DependencyInstaller,
}

impl DefaultSteps {
    pub fn new(index: Arc<dyn PackageIndex>, http: reqwest::Client) -> Self {
        Self {
            index,
            fetcher: ArchiveFetcher::new(http),
            installer: DependencyInstaller::new(),
        }
    }

    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(TOOL_ID)
            .build()
            .map_err(|e| ProvisionError::network(&config.base_url, e))?;
        let index = PypiIndex::from_config(http.clone(), config);
        Ok(Self::new(Arc::new(index), http))
    }
}

#[async_trait]
impl ProvisionSteps for DefaultSteps {
    async fn resolve(
        &self,
        spec: &ProvisioningSpec,
        sink: &dyn ProvisionSink,
        cancel: &CancellationToken,
    ) -> Result<ResolvedVersion> {
        let resolver = VersionResolver::new(self.index.clone(), spec.distribution.as_str());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProvisionError::Cancelled { stage: Stage::Resolving }),
            resolved = resolver.resolve(&spec.version, sink) => resolved,
        }
    }

    async fn fetch(
        &self,
        url: &str,
        staging_dir: &Path,
        sink: &dyn ProvisionSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.fetcher.fetch(url, staging_dir, sink, cancel).await
    }

    async fn build(
        &self,
        spec: &ProvisioningSpec,
        source_dir: &Path,
        sandbox_dir: &Path,
        sink: &dyn ProvisionSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        SandboxBuilder::new(spec.interpreter.as_str(), spec.entry_point.as_str())
            .build(source_dir, sandbox_dir, &spec.flags, sink, cancel)
            .await
    }

    async fn install(
        &self,
        sandbox_dir: &Path,
        dependencies: &Dependencies,
        sink: &dyn ProvisionSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.installer
            .install(sandbox_dir, dependencies, sink, cancel)
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Skip fetch/build when the resolved version is already in place.
    /// `false` always redoes every step after a fingerprint mismatch.
    pub partial_skip: bool,
    pub step_timeout: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            partial_skip: true,
            step_timeout: None,
        }
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            partial_skip: config.partial_skip,
            step_timeout: config.step_timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Fingerprint matched; nothing ran.
    Unchanged,
    Provisioned,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub outcome: Outcome,
    pub version: Option<String>,
    pub hash: Fingerprint,
    /// Stages that actually executed, in order.
    pub stages: Vec<Stage>,
}

pub struct ProvisioningPipeline<S = DefaultSteps> {
    steps: S,
    options: PipelineOptions,
}

impl<S: ProvisionSteps> ProvisioningPipeline<S> {
    pub fn new(steps: S, options: PipelineOptions) -> Self {
        Self { steps, options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub async fn run(
        &self,
        spec: &ProvisioningSpec,
        layout: &Layout,
        sink: &dyn ProvisionSink,
        cancel: &CancellationToken,
    ) -> Result<ProvisionReport> {
        let expected = Fingerprint::of(spec)?;
        let store = FingerprintStore::new(&layout.record_path);
        let record = store.load();
        let sandbox_present = layout.sandbox_dir.is_dir();

        if expected.matches(record.current_hash.as_deref()) && sandbox_present {
            info_log!(sandbox = %layout.sandbox_dir.display(), "sandbox up to date, nothing to do");
            return Ok(ProvisionReport {
                outcome: Outcome::Unchanged,
                version: record.current_version,
                hash: expected,
                stages: Vec::new(),
            });
        }

        let mut stages = vec![Stage::Resolving];
        tracing::debug!(stage = %Stage::Resolving, "pipeline transition");
        let step_cancel = cancel.child_token();
        let resolved = self
            .guard(
                Stage::Resolving,
                cancel,
                &step_cancel,
                self.steps.resolve(spec, sink, &step_cancel),
            )
            .await
            .inspect_err(|e| fail(Stage::Resolving, e))?;

        let source_dir = layout.source_dir(&spec.distribution, &resolved.version);
        let build_hash = Fingerprint::of_build(spec, &resolved.version);
        let mut stage = self.after_resolve(
            spec,
            &record,
            &resolved,
            &build_hash,
            &source_dir,
            sandbox_present,
        );

        while stage != Stage::Done {
            stages.push(stage);
            tracing::debug!(%stage, "pipeline transition");
            let step_cancel = cancel.child_token();
            stage = match stage {
                Stage::Fetching => self
                    .guard(
                        stage,
                        cancel,
                        &step_cancel,
                        self.steps
                            .fetch(&resolved.url, &layout.staging_dir, sink, &step_cancel),
                    )
                    .await
                    .map(|_| Stage::Building),
                Stage::Building => self
                    .guard(
                        stage,
                        cancel,
                        &step_cancel,
                        self.steps.build(
                            spec,
                            &source_dir,
                            &layout.sandbox_dir,
                            sink,
                            &step_cancel,
                        ),
                    )
                    .await
                    .map(|_| Stage::Installing),
                Stage::Installing => self
                    .guard(
                        stage,
                        cancel,
                        &step_cancel,
                        self.steps.install(
                            &layout.sandbox_dir,
                            &spec.dependencies,
                            sink,
                            &step_cancel,
                        ),
                    )
                    .await
                    .map(|_| Stage::Persisting),
                Stage::Persisting => store
                    .save(&FingerprintRecord {
                        current_hash: Some(expected.to_string()),
                        current_version: Some(resolved.version.clone()),
                        tarball_url: Some(resolved.url.clone()),
                        build_hash: Some(build_hash.to_string()),
                    })
                    .map(|_| Stage::Done),
                Stage::Idle | Stage::Resolving | Stage::Done | Stage::Failed => Ok(Stage::Done),
            }
            .inspect_err(|e| fail(stage, e))?;
        }

        info_log!(
            version = %resolved.version,
            sandbox = %layout.sandbox_dir.display(),
            stages = ?stages,
            "sandbox provisioned"
        );
        Ok(ProvisionReport {
            outcome: Outcome::Provisioned,
            version: Some(resolved.version),
            hash: expected,
            stages,
        })
    }

    /// First stage after resolution, per the partial-skip rules.
    fn after_resolve(
        &self,
        spec: &ProvisioningSpec,
        record: &FingerprintRecord,
        resolved: &ResolvedVersion,
        build_hash: &Fingerprint,
        source_dir: &Path,
        sandbox_present: bool,
    ) -> Stage {
        if !self.options.partial_skip {
            return Stage::Fetching;
        }
        // Version, interpreter, entry point and flags all unchanged.
        if sandbox_present && build_hash.matches(record.build_hash.as_deref()) {
            info_log!(version = %resolved.version, "build inputs unchanged, reinstalling dependencies only");
            return Stage::Installing;
        }
        if source_dir.join(&spec.entry_point).is_file() {
            info_log!(sources = %source_dir.display(), "sources already staged, skipping download");
            return Stage::Building;
        }
        Stage::Fetching
    }

    /// Race a step against cancellation and the per-step timeout.
    ///
    /// `step_cancel` must be the token handed to `step`. When the run is
    /// cancelled or the step overruns, it is fired and the step is driven to
    /// completion before the error is returned.
    async fn guard<T>(
        &self,
        stage: Stage,
        cancel: &CancellationToken,
        step_cancel: &CancellationToken,
        step: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::pin!(step);
        let deadline = async {
            match self.options.step_timeout {
                Some(after) => {
                    tokio::time::sleep(after).await;
                    after
                }
                None => std::future::pending().await,
            }
        };
        let stopped = tokio::select! {
            biased;
            _ = cancel.cancelled() => ProvisionError::Cancelled { stage },
            after = deadline => ProvisionError::TimedOut { stage, after },
            result = &mut step => return result,
        };

        step_cancel.cancel();
        if let Err(e) = step.await {
            tracing::debug!(%stage, error = %e, "step wound down");
        }
        Err(stopped)
    }
}

fn fail(stage: Stage, err: &ProvisionError) {
    tracing::debug!(%stage, next = %Stage::Failed, error = %err, "pipeline transition");
}
