//! `venvforge provision`

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use venvforge_core::config::{IndexConfig, ObservabilityConfig, PipelineConfig};
use venvforge_core::manifest;
use venvforge_provision::{
    DefaultSteps, Layout, Outcome, PipelineOptions, ProvisionReport, ProvisioningPipeline,
    TerminalSink,
};

pub struct ProvisionArgs {
    pub project: Option<PathBuf>,
    pub coarse: bool,
    pub timeout: Option<u64>,
    pub index_url: Option<String>,
    pub json: bool,
}

pub async fn cmd_provision(args: ProvisionArgs, cancel: CancellationToken) -> Result<()> {
    let project = super::project_dir(args.project)?;
    let spec = manifest::load_from_dir(&project)
        .with_context(|| format!("Failed to load provisioning metadata from {}", project.display()))?;
    let layout = Layout::for_project(&project);

    let mut index = IndexConfig::from_env();
    if let Some(url) = args.index_url {
        index.base_url = url;
    }
    let options = PipelineOptions::from(
        &PipelineConfig::from_env().with_cli_overrides(args.timeout, args.coarse),
    );
    tracing::debug!(
        project = %project.display(),
        index = %index.base_url,
        partial_skip = options.partial_skip,
        timeout = ?options.step_timeout,
        "provisioning"
    );

    let pipeline = ProvisioningPipeline::new(DefaultSteps::from_config(&index)?, options);
    let sink = TerminalSink {
        quiet: args.json || ObservabilityConfig::from_env().quiet,
    };
    let report = pipeline
        .run(&spec, &layout, &sink, &cancel)
        .await
        .with_context(|| format!("Failed to provision {}", layout.sandbox_dir.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        eprintln!("{}", summary(&report, &layout));
    }
    Ok(())
}

fn summary(report: &ProvisionReport, layout: &Layout) -> String {
    let version = report.version.as_deref().unwrap_or("unknown");
    match report.outcome {
        Outcome::Unchanged => format!(
            "✓ {} is up to date (virtualenv {})",
            layout.sandbox_dir.display(),
            version
        ),
        Outcome::Provisioned => {
            let stages: Vec<String> = report.stages.iter().map(|s| s.to_string()).collect();
            format!(
                "✓ Provisioned {} with virtualenv {} ({})",
                layout.sandbox_dir.display(),
                version,
                stages.join(" → ")
            )
        }
    }
}
