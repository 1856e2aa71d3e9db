use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Personal day planner with conflict checks, schedule suggestions and
/// background automation.
/// Data lives in ~/.dayplan or the directory passed via --data-dir.
#[derive(Parser)]
#[command(name = "dayplan", version, about = "Daily task planning CLI")]
pub struct Cli {
    /// Directory holding the task, settings and snapshot records.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log filter when RUST_LOG is not set.
    pub fn default_log_filter(&self) -> &'static str {
        match self.command {
            Commands::Run => "dayplan=info",
            _ => "warn",
        }
    }
}
