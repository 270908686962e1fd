//! `venvforge status`: would `provision` be a no-op?

use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;
use venvforge_core::manifest;
use venvforge_provision::{Fingerprint, FingerprintStore, Layout};

pub fn cmd_status(project: Option<PathBuf>, json_output: bool) -> Result<()> {
    let project = super::project_dir(project)?;
    let spec = manifest::load_from_dir(&project)
        .with_context(|| format!("Failed to load provisioning metadata from {}", project.display()))?;
    let layout = Layout::for_project(&project);
    let expected = Fingerprint::of(&spec).context("Failed to compute fingerprint")?;
    let record = FingerprintStore::new(&layout.record_path).load();
    let sandbox_present = layout.sandbox_dir.is_dir();
    let up_to_date = sandbox_present && expected.matches(record.current_hash.as_deref());

    if json_output {
        let value = json!({
            "sandbox": layout.sandbox_dir,
            "sandboxPresent": sandbox_present,
            "expectedHash": expected,
            "record": record,
            "upToDate": up_to_date,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Sandbox:   {}", layout.sandbox_dir.display());
    println!(
        "Version:   {} (wanted {})",
        record.current_version.as_deref().unwrap_or("-"),
        spec.version
    );
    println!("Tarball:   {}", record.tarball_url.as_deref().unwrap_or("-"));
    println!("Stored:    {}", record.current_hash.as_deref().unwrap_or("-"));
    println!("Expected:  {}", expected);
    if up_to_date {
        println!("Status:    up to date");
    } else if !sandbox_present {
        println!("Status:    not provisioned");
    } else {
        println!("Status:    inputs changed, run `venvforge provision`");
    }
    Ok(())
}
