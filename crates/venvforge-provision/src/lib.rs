//! Virtualenv provisioning pipeline.
//!
//! [`ProvisioningPipeline::run`] compares the fingerprint of a
//! [`ProvisioningSpec`](venvforge_core::spec::ProvisioningSpec) against the
//! stored record and runs only the steps needed to bring the sandbox up to date.

pub mod builder;
pub mod error;
pub mod fetcher;
pub mod fingerprint;
pub mod index;
pub mod installer;
pub mod layout;
pub mod log;
pub mod pipeline;
pub mod process;
pub mod resolver;
pub mod sink;
pub mod store;

pub use error::{ProvisionError, Result};
pub use fingerprint::Fingerprint;
pub use layout::Layout;
pub use pipeline::{
    DefaultSteps, Outcome, PipelineOptions, ProvisionReport, ProvisionSteps, ProvisioningPipeline,
    Stage,
};
pub use sink::{ChannelSink, NullSink, ProgressEvent, ProvisionSink, TerminalSink};
pub use store::{FingerprintRecord, FingerprintStore};
