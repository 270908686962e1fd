mod cli;
mod commands;
mod observability;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Provision {
            project,
            coarse,
            timeout,
            index_url,
            json,
        } => {
            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());
            let args = commands::provision::ProvisionArgs {
                project,
                coarse,
                timeout,
                index_url,
                json,
            };
            commands::provision::cmd_provision(args, cancel).await?;
        }
        Commands::Status { project, json } => {
            commands::status::cmd_status(project, json)?;
        }
        Commands::Clean {
            project,
            dry_run,
            force,
        } => {
            commands::clean::cmd_clean(project, dry_run, force)?;
        }
        Commands::Run {
            project,
            program,
            args,
        } => {
            let code = commands::run::cmd_run(project, &program, &args).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
    }

    Ok(())
}

/// First Ctrl-C cancels the pipeline; in-flight child processes are killed.
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling provisioning");
            cancel.cancel();
        }
    });
}
