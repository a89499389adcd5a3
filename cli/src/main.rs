//! GreenLight CLI - inspect and drive a GreenLight account from the shell.
//!
//! # Usage
//!
//! ```bash
//! # Check connectivity (no key needed)
//! gl ping
//!
//! # Show who the configured key belongs to
//! gl whoami
//!
//! # Submit and approve a timesheet described in a JSON file
//! gl timesheet week-10.json --ext-id ts-2024-10 --approve
//! ```
//!
//! # Environment Variables
//!
//! Read from the process environment, after loading `.env` if present.
//! See `greenlight_core::config` for the full list.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "gl")]
#[command(author, version, about = "GreenLight API tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum Commands {
    /// Print the deployed API version hash
    Ping,
    /// Print the role and account behind the API key
    Whoami,
    /// List the admin's clients
    Clients,
    /// Fetch one client
    Client {
        /// Service id, or external id when `--scope` is given
        id: String,

        /// Scope the external id belongs to
        #[arg(long)]
        scope: Option<String>,
    },
    /// Delete every client of the admin (never on production)
    DeleteClients {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Create, fill and submit an hours timesheet from a JSON file
    Timesheet {
        /// File holding `{"job_id", "shifts", "expenses"}`
        file: PathBuf,

        /// Your id for the timesheet
        #[arg(long)]
        ext_id: Option<String>,

        /// Approve after submitting
        #[arg(long)]
        approve: bool,
    },
    /// Create, fill and submit an invoice timesheet from a JSON file
    Deliverables {
        /// File holding `{"job_id", "deliverables"}`
        file: PathBuf,

        /// Your id for the timesheet
        #[arg(long)]
        ext_id: Option<String>,

        /// Approve after submitting
        #[arg(long)]
        approve: bool,
    },
    /// Print a job's background-check status
    BackgroundCheck {
        /// Service id, or external id when `--scope` is given
        job_id: String,

        /// Scope the external id belongs to
        #[arg(long)]
        scope: Option<String>,
    },
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Ping => commands::ping(),
        Commands::Whoami => commands::whoami(),
        Commands::Clients => commands::clients(),
        Commands::Client { id, scope } => commands::client(&id, scope.as_deref()),
        Commands::DeleteClients { yes } => commands::delete_clients(yes),
        Commands::Timesheet { file, ext_id, approve } => commands::timesheet(&file, ext_id.as_deref(), approve),
        Commands::Deliverables { file, ext_id, approve } => {
            commands::deliverables(&file, ext_id.as_deref(), approve)
        }
        Commands::BackgroundCheck { job_id, scope } => commands::background_check(&job_id, scope.as_deref()),
    }
}
