use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// venvforge - per-project Python virtualenvs, rebuilt only when their inputs change
#[derive(Parser, Debug)]
#[command(name = "venvforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or update the project's virtualenv from package.json
    Provision {
        /// Project directory containing package.json (default: current directory)
        #[arg(long, value_name = "DIR")]
        project: Option<PathBuf>,

        /// Redo every step after a fingerprint mismatch (disable partial skips)
        #[arg(long, default_value = "false")]
        coarse: bool,

        /// Per-step timeout in seconds (default: from env or none)
        #[arg(long)]
        timeout: Option<u64>,

        /// Package index base URL (default: from env or https://pypi.org/pypi)
        #[arg(long, value_name = "URL")]
        index_url: Option<String>,

        /// Print the provisioning report as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Show the stored fingerprint record and whether provisioning is needed
    Status {
        /// Project directory containing package.json (default: current directory)
        #[arg(long, value_name = "DIR")]
        project: Option<PathBuf>,

        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Remove the project's virtualenv, staged sources and record
    Clean {
        #[arg(long, value_name = "DIR")]
        project: Option<PathBuf>,

        /// Only show what would be removed
        #[arg(long, default_value = "false")]
        dry_run: bool,

        /// Skip confirmation prompt
        #[arg(long, short, default_value = "false")]
        force: bool,
    },

    /// Run a program from the virtualenv's bin directory (e.g. `venvforge run python app.py`)
    Run {
        #[arg(long, value_name = "DIR")]
        project: Option<PathBuf>,

        /// Program inside the virtualenv
        #[arg(value_name = "PROGRAM")]
        program: String,

        /// Arguments passed to the program
        #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}
