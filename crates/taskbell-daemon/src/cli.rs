use clap::{Parser, Subcommand};

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TASKBELL_GIT_SHA"), ")");

/// Taskbell: sends a reminder one hour before each task falls due.
#[derive(Parser, Debug)]
#[command(name = "taskbell", version, long_version = LONG_VERSION, about)]
pub struct Cli {
    /// Path to taskbell.toml (defaults to ~/.taskbell/taskbell.toml).
    #[arg(long, global = true, env = "TASKBELL_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Restore reminders, run the periodic sweep, and wait for Ctrl-C.
    Run,
    /// Run the reminder job once and print the report. Without job data
    /// this sweeps every task due within the hour.
    Sweep {
        /// JSON job data, e.g. '{"taskId": 42}', to run for one task.
        #[arg(long)]
        job_data: Option<String>,
    },
    /// List open tasks past their due date, most urgent first.
    Overdue,
    /// Print the rule assessment for one task.
    Inspect {
        /// Task id.
        task_id: i64,
    },
}
