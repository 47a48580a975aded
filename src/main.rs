//! # CaseFolio CLI (`casefolio`)
//!
//! Submits documents to the CaseFolio processing service, follows the job
//! until it finishes, and inspects the resulting timeline.
//!
//! ## Usage
//!
//! ```bash
//! casefolio --config ./config/casefolio.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `casefolio health` | Probe the backend and show the auth mode |
//! | `casefolio process <file>` | Submit a document, poll it, print the timeline |
//! | `casefolio status <job_id>` | Show a job's state once |
//! | `casefolio timeline <job_id>` | Print a finished job's timeline |
//! | `casefolio anchor <job_id>` | Jump to the evidence for a fact or event |
//! | `casefolio export <job_id>` | Write the timeline as JSON |
//! | `casefolio resume` | Continue polling the last active job |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `warn`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use casefolio::filter::EventFilter;
use casefolio::progress::ProgressMode;
use casefolio::{client, config, job_cmd};

/// CaseFolio: timeline and contradiction review for case documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file falls back to defaults. See
/// `config/casefolio.example.toml`.
#[derive(Parser)]
#[command(name = "casefolio", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/casefolio.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a TTY, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the backend is reachable.
    Health,

    /// Submit a document and poll it until processing finishes.
    Process {
        /// Text document to submit.
        file: PathBuf,

        /// Case the document belongs to.
        #[arg(long)]
        case_id: Option<String>,

        /// Document name sent to the backend. Defaults to the file name.
        #[arg(long)]
        name: Option<String>,

        /// Timeline filter: `all`, `conflicts`, or `category:<tag>`.
        #[arg(long, default_value = "all")]
        filter: EventFilter,
    },

    /// Show the current state of a job.
    Status { job_id: String },

    /// Print the timeline of a completed job.
    Timeline {
        job_id: String,

        /// Timeline filter: `all`, `conflicts`, or `category:<tag>`.
        #[arg(long, default_value = "all")]
        filter: EventFilter,
    },

    /// Navigate to the source evidence of a fact or event.
    Anchor {
        job_id: String,

        #[arg(long, conflicts_with = "event", required_unless_present = "event")]
        fact: Option<String>,

        #[arg(long)]
        event: Option<String>,
    },

    /// Export a completed job's timeline as JSON.
    Export {
        job_id: String,

        /// Case name recorded in the export. Defaults to the document name.
        #[arg(long)]
        case_name: Option<String>,

        /// Output file. Writes to stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Resume polling the job recorded by the last run.
    Resume {
        #[arg(long, default_value = "all")]
        filter: EventFilter,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Health => {
            client::run_health(&cfg).await?;
        }
        Commands::Process {
            file,
            case_id,
            name,
            filter,
        } => {
            job_cmd::run_process(&cfg, &file, case_id, name, &filter, progress).await?;
        }
        Commands::Status { job_id } => {
            job_cmd::run_status(&cfg, &job_id).await?;
        }
        Commands::Timeline { job_id, filter } => {
            job_cmd::run_timeline(&cfg, &job_id, &filter).await?;
        }
        Commands::Anchor {
            job_id,
            fact,
            event,
        } => {
            job_cmd::run_anchor(&cfg, &job_id, fact, event).await?;
        }
        Commands::Export {
            job_id,
            case_name,
            output,
        } => {
            job_cmd::run_export(&cfg, &job_id, case_name, output.as_deref()).await?;
        }
        Commands::Resume { filter } => {
            job_cmd::run_resume(&cfg, &filter, progress).await?;
        }
    }

    Ok(())
}
