//! Command-line interface, built on clap.
//!
//! Defines [`Cli`] with the [`Command`] subcommands (run, poll) and
//! global flags (--config, --verbose).

use clap::{Parser, Subcommand};

/// runbook — batch workload runner and job status poller.
#[derive(Debug, Parser)]
#[command(name = "runbook", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "runbook.toml")]
    pub config: String,

    /// Enable verbose output.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute a workload; on failure a report is written to the
    /// artifact path and the process exits non-zero.
    Run {
        /// Input location (local path or remote object URI). Falls
        /// back to RUNBOOK_INPUT, or to the workflow table via
        /// --workflow.
        input: Option<String>,

        /// Workflow name, resolved against the [workflows] table.
        #[arg(long)]
        workflow: Option<String>,

        /// Output artifact location. Falls back to RUNBOOK_OUTPUT.
        #[arg(long)]
        output: Option<String>,

        /// Parameter mapping as inline JSON. Falls back to
        /// RUNBOOK_PARAMS.
        #[arg(long)]
        params: Option<String>,
    },

    /// Query the registry for a job's status.
    Poll {
        /// Job identifier to look up.
        job_id: String,

        /// Use the recent-window list scan instead of a direct lookup.
        #[arg(long, default_value_t = false)]
        scan: bool,
    },
}
