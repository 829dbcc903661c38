//! CLI command definitions and dispatch for the `skeeper` binary.
//!
//! Uses clap derive macros for argument parsing. The CLI follows a
//! verb-first pattern (e.g., `skeeper backup`, `skeeper serve`).

pub mod session;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Durable session backup and recovery for messaging clients.
#[derive(Parser)]
#[command(name = "skeeper", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Archive the session directory into the backup store.
    Backup {
        /// Session id to back up (defaults to "default").
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Restore the session directory from the backup store.
    Restore {
        /// Session id to restore (defaults to "default").
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Check whether a usable backup exists for a session.
    Exists {
        /// Session id to check (defaults to "default").
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Purge corrupt backup rows and list the remaining sessions.
    Cleanup,

    /// Start the status API server with periodic backups.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Session id to back up periodically (defaults to "default").
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Probe a running server's status endpoint.
    Health {
        /// Base URL of the server to probe.
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        url: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
