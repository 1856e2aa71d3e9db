//! # dayplan - Personal Day Planner CLI
//!
//! A command-line planner for one person's working day. Tasks carry a category,
//! a priority, a start time and a duration; the planner lays them into a fixed
//! daily template, flags overlaps and keeps routine bookkeeping automatic.
//!
//! ## Key Features
//!
//! - **Daily Template**: Academy, Company, Support, Project and Freelance periods
//!   with per-period budgets and recommendations when a day is overbooked
//! - **Conflict Detection**: Overlapping tasks on the same date are reported on add,
//!   update and reschedule
//! - **Priority Scoring**: Priority, urgency and category weight rank open work
//! - **Automation**: Past-day and end-of-task auto-completion, follow-up creation
//!   and monthly renewal of recurring tasks
//! - **Reminders**: Ten-minute warnings, overdue alerts and a morning summary
//!   while `dayplan run` is active
//! - **Local Storage**: Plain JSON records with import/export and rolling snapshots
//!
//! ## Quick Start
//!
//! ```bash
//! # Add a teaching task for tomorrow morning
//! dayplan add "Lecture prep" --category academy --due tomorrow --time 07:00
//!
//! # See today's recommended schedule
//! dayplan schedule
//!
//! # Keep automation and reminders running
//! dayplan run
//! ```
//!
//! ## Key Commands
//!
//! - `dayplan add <title>` - Create a task
//! - `dayplan list` - View open tasks with filters and sorting
//! - `dayplan schedule` - Today's template with conflicts and recommendations
//! - `dayplan slots` - Free capacity per working range
//! - `dayplan run` - Foreground automation loop
//! - `dayplan export` / `dayplan import` - JSON transfer
//! - `dayplan backup` - Snapshot management
//!
//! Data is stored locally in `~/.dayplan/` as one JSON file per record.
//! Set `RUST_LOG` to change log verbosity (logs go to stderr).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub mod analytics;
pub mod automation;
pub mod backend;
pub mod backup;
pub mod calendar;
pub mod cli;
pub mod clock;
pub mod cmd;
pub mod db;
pub mod error;
pub mod fields;
pub mod notify;
pub mod runner;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod task;
pub mod time_math;
pub mod transfer;

use automation::AutomationEngine;
use backend::FileBackend;
use cli::Cli;
use clock::{Clock, SystemClock};
use cmd::*;
use notify::{ConsoleNotifier, Notifier};
use scheduler::Scheduler;
use store::TaskStore;

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Completions need no data directory
    if let Commands::Completions { shell } = &cli.command {
        cmd_completions(*shell);
        return;
    }

    let data_dir = cli.data_dir.clone().unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".dayplan")
    });
    let backend = match FileBackend::open(&data_dir) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Failed to open data directory {}: {}", data_dir.display(), e);
            std::process::exit(1);
        }
    };

    debug!(dir = %backend.dir().display(), "data directory opened");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = TaskStore::open(Box::new(backend), Arc::clone(&clock)).into_shared();
    let scheduler = Arc::new(Scheduler::new(store.clone(), Arc::clone(&clock)));
    let notifications = store.lock().get_settings().notifications;
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier::new(notifications));
    let engine = Arc::new(AutomationEngine::new(store.clone(), Arc::clone(&clock), Arc::clone(&notifier)));

    let ctx = Context { store, clock, scheduler, engine, notifier };

    match cli.command {
        Commands::Completions { .. } => unreachable!("completions handled above"),

        Commands::Add {
            title, desc, category, priority, due, time, suggest_time, duration,
            recurring, auto_complete, follow_up, follow_up_days,
        } => cmd_add(&ctx, title, desc, category, priority, due, time, suggest_time,
                     duration, recurring, auto_complete, follow_up, follow_up_days),

        Commands::List { all, category, status, date, sort, limit } =>
            cmd_list(&ctx, all, category, status, date, sort, limit),

        Commands::View { id } => cmd_view(&ctx, id),

        Commands::Update {
            id, title, desc, category, priority, due, time, duration, status,
            recurring, auto_complete, follow_up, follow_up_days,
        } => cmd_update(&ctx, id, title, desc, category, priority, due, time, duration,
                        status, recurring, auto_complete, follow_up, follow_up_days),

        Commands::Done { id } => cmd_done(&ctx, id),

        Commands::Reschedule { id, date, time } => cmd_reschedule(&ctx, id, date, time),

        Commands::Delete { id } => cmd_delete(&ctx, id),

        Commands::Schedule { date, json } => cmd_schedule(&ctx, date, json),

        Commands::Conflicts { date } => cmd_conflicts(&ctx, date),

        Commands::Slots { date } => cmd_slots(&ctx, date),

        Commands::Next => cmd_next(&ctx),

        Commands::Rank { limit } => cmd_rank(&ctx, limit),

        Commands::Suggest { category } => cmd_suggest(&ctx, category),

        Commands::Automate => cmd_automate(&ctx),

        Commands::Run => cmd_run(&ctx),

        Commands::Settings { action } => cmd_settings(&ctx, action),

        Commands::Import { input, no_backup } => cmd_import(&ctx, input, no_backup),

        Commands::Export { output } => cmd_export(&ctx, output),

        Commands::Backup { list, show, prune } => cmd_backup(&ctx, list, show, prune),

        Commands::Stats => cmd_stats(&ctx),

        Commands::Calendar { days, month, week } => cmd_calendar(&ctx, days, month, week),
    }
}
