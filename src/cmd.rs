//! Command implementations for the CLI interface.
//!
//! Each handler reads and writes through the shared task store and reports
//! what happened through the notifier. A failing command prints an error and
//! exits with status 1.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate};
use clap::Subcommand;
use clap_complete::{generate, Shell};
use tracing::{debug, error};

use crate::analytics::{analytics, time_allocation};
use crate::automation::{AutomationEngine, RuleOutcome, Trigger};
use crate::backup::{list_snapshots, load_snapshot, prune_snapshots, snapshot, SNAPSHOT_RETENTION_DAYS};
use crate::calendar::{month_days, month_overview, upcoming_days, week_days, DayCount};
use crate::clock::Clock;
use crate::db::*;
use crate::fields::*;
use crate::notify::Notifier;
use crate::runner::AutomationRunner;
use crate::scheduler::{optimize_schedule, priority_score, suggest_task_timing, EventKind, RecommendationKind, Scheduler};
use crate::settings::{AutomationSettings, SettingsPatch};
use crate::store::{SharedStore, TaskFilter};
use crate::task::{parse_time, Task, TaskDraft, TaskPatch};
use crate::time_math::{find_conflicts, time_to_minutes};
use crate::transfer::{export_json, import_json};

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new task.
    Add {
        /// Short title for the task.
        title: String,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        /// Category: academy | freelance | support | project | company | other.
        #[arg(long, value_enum)]
        category: Option<Category>,
        /// Priority: low | medium | high.
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", "friday", or "in Nd".
        #[arg(long)]
        due: Option<String>,
        /// Start time, HH:MM (24h).
        #[arg(long)]
        time: Option<String>,
        /// Use the category's suggested start time when --time is not given.
        #[arg(long)]
        suggest_time: bool,
        /// Duration in hours.
        #[arg(long)]
        duration: Option<f64>,
        /// Renew this task every month.
        #[arg(long)]
        recurring: bool,
        /// Complete this task automatically once it ends.
        #[arg(long)]
        auto_complete: bool,
        /// Create a follow-up task when this one is auto-completed.
        #[arg(long)]
        follow_up: bool,
        /// Days between this task and its follow-up.
        #[arg(long)]
        follow_up_days: Option<i64>,
    },

    /// List tasks with optional filters.
    List {
        /// Include completed tasks.
        #[arg(long)]
        all: bool,
        #[arg(long, value_enum)]
        category: Option<Category>,
        #[arg(long, value_enum)]
        status: Option<Status>,
        /// Only tasks due on this date.
        #[arg(long)]
        date: Option<String>,
        /// Sort key.
        #[arg(long, value_enum, default_value_t = SortKey::Due)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// View a single task.
    View {
        id: String,
    },

    /// Update fields on a task.
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum)]
        category: Option<Category>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        duration: Option<f64>,
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long)]
        recurring: Option<bool>,
        #[arg(long)]
        auto_complete: Option<bool>,
        #[arg(long)]
        follow_up: Option<bool>,
        #[arg(long)]
        follow_up_days: Option<i64>,
    },

    /// Mark a task completed.
    Done {
        id: String,
    },

    /// Move a task to another date and optionally another start time.
    Reschedule {
        id: String,
        /// New date, same formats as `add --due`.
        date: String,
        #[arg(long)]
        time: Option<String>,
    },

    /// Delete a task.
    Delete {
        id: String,
    },

    /// Today's recommended schedule with conflicts and recommendations.
    Schedule {
        /// Show another day's tasks in priority order instead of the template.
        #[arg(long)]
        date: Option<String>,
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show overlapping tasks on a date (default today).
    Conflicts {
        #[arg(long)]
        date: Option<String>,
    },

    /// Free capacity of each working range on a date (default today).
    Slots {
        #[arg(long)]
        date: Option<String>,
    },

    /// Next task today and the most important open items.
    Next,

    /// Open tasks ranked by priority score.
    Rank {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Suggested start time for a category.
    Suggest {
        #[arg(value_enum)]
        category: Category,
    },

    /// Run every automation rule once and report what changed.
    Automate,

    /// Run automation, reminders and auto-save in the foreground until Ctrl-C.
    Run,

    /// Show or change settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Import tasks from a JSON export or a JSON array of tasks.
    Import {
        /// Input JSON file path.
        input: String,
        /// Skip the snapshot taken before importing.
        #[arg(long)]
        no_backup: bool,
    },

    /// Export all tasks and metadata as JSON.
    Export {
        /// Output file path (default stdout).
        #[arg(long, short)]
        output: Option<String>,
    },

    /// Take a snapshot, list snapshots, show one, or remove old ones.
    Backup {
        #[arg(long)]
        list: bool,
        /// Summarise the snapshot with this key.
        #[arg(long)]
        show: Option<String>,
        /// Remove snapshots older than the retention window.
        #[arg(long)]
        prune: bool,
    },

    /// Task totals, completion rate and today's time per category.
    Stats,

    /// Upcoming busy days, a month overview or the current week.
    Calendar {
        /// Number of days ahead to scan.
        #[arg(long, default_value_t = 7)]
        days: u32,
        /// Month overview, YYYY-MM.
        #[arg(long)]
        month: Option<String>,
        /// Monday to Sunday counts for the current week.
        #[arg(long)]
        week: bool,
    },

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print current settings as JSON.
    Show,
    /// Change one or more settings.
    Set {
        #[arg(long)]
        theme: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        notifications: Option<bool>,
        #[arg(long)]
        auto_complete_past_days: Option<bool>,
        #[arg(long)]
        auto_complete_on_end: Option<bool>,
        #[arg(long)]
        auto_create_follow_up: Option<bool>,
        #[arg(long)]
        follow_up_days: Option<u32>,
    },
}

/// Everything a command handler needs.
pub struct Context {
    pub store: SharedStore,
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<Scheduler>,
    pub engine: Arc<AutomationEngine>,
    pub notifier: Arc<dyn Notifier>,
}

impl Context {
    fn fail(&self, message: &str) -> ! {
        self.notifier.error(message);
        std::process::exit(1);
    }

    fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    fn parse_day(&self, input: &str) -> NaiveDate {
        parse_due_input(input, self.today()).unwrap_or_else(|| {
            self.fail(&format!(
                "Invalid date '{input}'. Use YYYY-MM-DD, today, tomorrow, a weekday or 'in Nd'."
            ))
        })
    }

    fn day_or_today(&self, input: Option<&str>) -> NaiveDate {
        input.map(|d| self.parse_day(d)).unwrap_or_else(|| self.today())
    }

    fn check_time(&self, time: &str) {
        if parse_time(time).is_none() {
            self.fail(&format!("Invalid time '{time}'. Use HH:MM (24h)."));
        }
    }

    fn require(&self, id: &str) -> Task {
        self.store
            .lock()
            .get_task(id)
            .unwrap_or_else(|| self.fail(&format!("Task {id} not found.")))
    }

    /// Warn about every conflict on the task's date that involves it.
    fn warn_conflicts(&self, task: &Task) {
        let Some(date) = task.date() else {
            return;
        };
        let same_day = self.store.lock().query_tasks(&TaskFilter::default().on(date));
        for conflict in find_conflicts(&same_day) {
            if conflict.task1 == task.id || conflict.task2 == task.id {
                self.notifier.warning(&conflict.message);
            }
        }
    }
}

fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn yes_default(flag: Option<bool>) -> &'static str {
    match flag {
        Some(true) => "yes",
        Some(false) => "no",
        None => "default",
    }
}

fn task_line(task: &Task) -> String {
    format!(
        "{:<5} [{}] {} ({}, {}) {}",
        task.due_time,
        format_priority(task.priority),
        task.title,
        format_category(task.category),
        format_hours(task.duration),
        task.id
    )
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    ctx: &Context,
    title: String,
    desc: Option<String>,
    category: Option<Category>,
    priority: Option<Priority>,
    due: Option<String>,
    time: Option<String>,
    suggest_time: bool,
    duration: Option<f64>,
    recurring: bool,
    auto_complete: bool,
    follow_up: bool,
    follow_up_days: Option<i64>,
) {
    let due_date = due.map(|d| date_string(ctx.parse_day(&d)));
    let explicit_time = time.is_some();
    let due_time = time.or_else(|| {
        if suggest_time {
            category.and_then(suggest_task_timing).map(|s| s.time.to_string())
        } else {
            None
        }
    });

    let draft = TaskDraft {
        description: desc,
        category,
        priority,
        due_date,
        due_time,
        duration,
        recurring,
        auto_complete_on_end: auto_complete.then_some(true),
        auto_create_next: follow_up.then_some(true),
        follow_up_offset_days: follow_up_days,
        ..TaskDraft::new(title)
    };
    if let Err(e) = draft.validate() {
        ctx.fail(&format!("Cannot add task: {e}"));
    }

    let Some(task) = ctx.store.lock().add_task(draft) else {
        ctx.fail("Task could not be saved.");
    };
    ctx.notifier.success(&format!("Added task {}: {}", task.id, task.title));
    ctx.warn_conflicts(&task);

    if !explicit_time && !suggest_time {
        if let Some(tip) = suggest_task_timing(task.category) {
            if tip.time != task.due_time {
                println!("Tip: {} tasks fit best at {} ({}).", format_category(task.category), tip.time, tip.reason);
            }
        }
    }
}

pub fn cmd_list(
    ctx: &Context,
    all: bool,
    category: Option<Category>,
    status: Option<Status>,
    date: Option<String>,
    sort: SortKey,
    limit: Option<usize>,
) {
    let today = ctx.today();
    let filter = TaskFilter {
        category,
        status,
        due_date: date.as_deref().map(|d| ctx.parse_day(d)),
        ..TaskFilter::default()
    };
    let mut tasks: Vec<Task> = if all || status.is_some() {
        ctx.store.lock().query_tasks(&filter)
    } else {
        ctx.store
            .lock()
            .incomplete_tasks()
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect()
    };

    let due_key = |t: &Task| {
        (
            t.date().unwrap_or(NaiveDate::MAX),
            time_to_minutes(&t.due_time).unwrap_or(u32::MAX),
        )
    };
    match sort {
        SortKey::Due => tasks.sort_by_key(due_key),
        SortKey::Priority => {
            tasks.sort_by_key(due_key);
            tasks = optimize_schedule(tasks);
        }
        SortKey::Score => {
            let now = ctx.clock.now();
            tasks.sort_by_key(|t| std::cmp::Reverse(priority_score(t, now)));
        }
    }
    if let Some(n) = limit {
        tasks.truncate(n);
    }

    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }
    print_table(&tasks, today);
}

pub fn cmd_view(ctx: &Context, id: String) {
    let task = ctx.require(&id);
    let today = ctx.today();
    println!("ID:           {}", task.id);
    println!("Title:        {}", task.title);
    println!("Category:     {}", format_category(task.category));
    println!("Priority:     {}", format_priority(task.priority));
    println!("Status:       {}", format_status(task.status));
    println!(
        "Due:          {} {} ({})",
        task.due_date,
        task.due_time,
        format_due_relative(task.date(), today)
    );
    println!("Duration:     {}", format_hours(task.duration));
    println!("Recurring:    {}", if task.recurring { "monthly" } else { "no" });
    println!("Auto-finish:  {}", yes_default(task.auto_complete_on_end));
    println!(
        "Follow-up:    {}{}",
        yes_default(task.auto_create_next),
        task.follow_up_offset_days.map(|d| format!(" after {d}d")).unwrap_or_default()
    );
    println!("Score:        {}", ctx.scheduler.calculate_priority_score(&task));
    println!("Created:      {}", task.created_at.format("%Y-%m-%d %H:%M"));
    println!("Updated:      {}", task.updated_at.format("%Y-%m-%d %H:%M"));
    if let Some(done) = task.completed_at {
        println!("Completed:    {}", done.format("%Y-%m-%d %H:%M"));
    }
    println!(
        "Description:\n{}\n",
        if task.description.is_empty() { "-" } else { task.description.as_str() }
    );
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_update(
    ctx: &Context,
    id: String,
    title: Option<String>,
    desc: Option<String>,
    category: Option<Category>,
    priority: Option<Priority>,
    due: Option<String>,
    time: Option<String>,
    duration: Option<f64>,
    status: Option<Status>,
    recurring: Option<bool>,
    auto_complete: Option<bool>,
    follow_up: Option<bool>,
    follow_up_days: Option<i64>,
) {
    if let Some(t) = &time {
        ctx.check_time(t);
    }
    if let Some(d) = duration {
        if !(d.is_finite() && d > 0.0) {
            ctx.fail(&format!("Invalid duration {d}. Use a positive number of hours."));
        }
    }
    if title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        ctx.fail("Title cannot be empty.");
    }

    let moves = due.is_some() || time.is_some() || duration.is_some();
    let completed_at = (status == Some(Status::Completed)).then(|| ctx.clock.now());
    let patch = TaskPatch {
        title,
        description: desc,
        category,
        priority,
        due_date: due.map(|d| date_string(ctx.parse_day(&d))),
        due_time: time,
        duration,
        status,
        recurring,
        completed_at,
        auto_complete_on_end: auto_complete,
        auto_create_next: follow_up,
        follow_up_offset_days: follow_up_days,
    };
    if patch.is_empty() {
        ctx.fail("Nothing to update.");
    }

    let Some(task) = ctx.store.lock().update_task(&id, patch) else {
        ctx.fail(&format!("Task {id} not found."));
    };
    ctx.notifier.success(&format!("Updated task {}: {}", task.id, task.title));
    if moves {
        ctx.warn_conflicts(&task);
    }
}

pub fn cmd_done(ctx: &Context, id: String) {
    let task = ctx.require(&id);
    if task.status == Status::Completed {
        ctx.notifier.info(&format!("\"{}\" is already completed.", task.title));
        return;
    }
    match ctx.store.lock().update_task(&id, TaskPatch::complete(ctx.clock.now())) {
        Some(t) => ctx.notifier.success(&format!("Completed: {}", t.title)),
        None => ctx.fail(&format!("Task {id} could not be updated.")),
    }
}

pub fn cmd_reschedule(ctx: &Context, id: String, date: String, time: Option<String>) {
    let task = ctx.require(&id);
    let new_date = date_string(ctx.parse_day(&date));
    let new_time = time.unwrap_or(task.due_time);
    ctx.check_time(&new_time);

    let Some(moved) = ctx
        .store
        .lock()
        .update_task(&id, TaskPatch::reschedule(new_date, new_time))
    else {
        ctx.fail(&format!("Task {id} could not be updated."));
    };
    ctx.notifier.success(&format!(
        "Rescheduled \"{}\" to {} {}",
        moved.title, moved.due_date, moved.due_time
    ));
    ctx.warn_conflicts(&moved);
}

pub fn cmd_delete(ctx: &Context, id: String) {
    let Some(task) = ctx.store.lock().get_task(&id) else {
        ctx.notifier.info(&format!("Task {id} not found; nothing deleted."));
        return;
    };
    if ctx.store.lock().delete_task(&id) {
        ctx.notifier.success(&format!("Deleted task {}: {}", task.id, task.title));
    } else {
        ctx.fail(&format!("Task {id} could not be deleted."));
    }
}

fn print_day_plan(ctx: &Context, day: NaiveDate, json: bool) {
    let tasks = ctx.scheduler.optimized_schedule(day);
    if json {
        match serde_json::to_string_pretty(&tasks) {
            Ok(s) => println!("{s}"),
            Err(e) => ctx.fail(&format!("Failed to serialize schedule: {e}")),
        }
        return;
    }
    if tasks.is_empty() {
        println!("Nothing scheduled on {day}.");
        return;
    }
    println!("Plan for {day}:");
    for task in &tasks {
        println!("  {}", task_line(task));
    }
    for c in ctx.scheduler.conflicts_on(day) {
        println!("  ! {}", c.message);
    }
}

pub fn cmd_schedule(ctx: &Context, date: Option<String>, json: bool) {
    if let Some(d) = date {
        print_day_plan(ctx, ctx.parse_day(&d), json);
        return;
    }
    let schedule = ctx.scheduler.recommended_schedule();
    if json {
        match serde_json::to_string_pretty(&schedule) {
            Ok(s) => println!("{s}"),
            Err(e) => ctx.fail(&format!("Failed to serialize schedule: {e}")),
        }
        return;
    }

    println!("Schedule for {}", schedule.date);
    for period in &schedule.periods {
        let budget = match (period.duration_hours, period.max_tasks) {
            (Some(h), _) => format_hours(h),
            (None, Some(n)) => format!("flexible, max {n}"),
            (None, None) => "flexible".into(),
        };
        println!("\n{}-{}  {} ({})", period.start_time, period.end_time, period.name, budget);
        if period.tasks.is_empty() {
            println!("  -");
        }
        for task in &period.tasks {
            println!("  {}", task_line(task));
        }
    }

    if !schedule.conflicts.is_empty() {
        println!("\nConflicts:");
        for c in &schedule.conflicts {
            println!("  {}", c.message);
        }
    }
    if !schedule.recommendations.is_empty() {
        println!("\nRecommendations:");
        for r in &schedule.recommendations {
            let tag = match r.kind {
                RecommendationKind::Error => "error",
                RecommendationKind::Warning => "warn",
                RecommendationKind::Info => "info",
            };
            println!("  [{tag}] {}\n      -> {}", r.message, r.action);
        }
    }
}

pub fn cmd_conflicts(ctx: &Context, date: Option<String>) {
    let day = ctx.day_or_today(date.as_deref());
    let conflicts = ctx.scheduler.conflicts_on(day);
    if conflicts.is_empty() {
        println!("No conflicts on {day}.");
        return;
    }
    println!("{} conflict(s) on {day}:", conflicts.len());
    for c in conflicts {
        println!("  {}", c.message);
    }
}

pub fn cmd_slots(ctx: &Context, date: Option<String>) {
    let day = ctx.day_or_today(date.as_deref());
    println!("Free time on {day}:");
    for slot in ctx.scheduler.available_slots(day) {
        println!(
            "  {:<16} {:02}:00-{:02}:00  {:>6} free ({}%)",
            slot.name,
            slot.start_hour,
            slot.end_hour,
            format_hours(slot.available_hours()),
            slot.percentage
        );
    }
}

pub fn cmd_next(ctx: &Context) {
    match ctx.scheduler.next_task() {
        Some(task) => println!("Next: {}", task_line(&task)),
        None => println!("Nothing else scheduled today."),
    }
    if let Some(event) = ctx.scheduler.next_important_event() {
        let heading = match event.kind {
            EventKind::TodayHighPriority => "high-priority task(s) today",
            EventKind::Overdue => "overdue task(s)",
        };
        println!("\n{} {heading}:", event.count());
        for task in &event.tasks {
            println!("  {} {}", task.due_date, task_line(task));
        }
    }
}

pub fn cmd_rank(ctx: &Context, limit: usize) {
    let ranked = ctx.scheduler.ranked_tasks();
    if ranked.is_empty() {
        println!("No open tasks.");
        return;
    }
    println!("{:<6} {:<10} {}", "Score", "Due", "Task");
    for (score, task) in ranked.into_iter().take(limit) {
        println!("{:<6} {:<10} {}", score, task.due_date, task_line(&task));
    }
}

pub fn cmd_suggest(ctx: &Context, category: Category) {
    match suggest_task_timing(category) {
        Some(s) => println!("{}: start at {} ({})", format_category(category), s.time, s.reason),
        None => {
            println!("{}: no fixed time. Free ranges today:", format_category(category));
            for slot in ctx.scheduler.available_slots(ctx.today()) {
                if slot.available_minutes > 0.0 {
                    println!("  {:<16} {} free", slot.name, format_hours(slot.available_hours()));
                }
            }
        }
    }
}

fn describe_outcome(outcome: RuleOutcome) -> String {
    match outcome {
        RuleOutcome::Disabled => "disabled".into(),
        RuleOutcome::AlreadyRan => "already ran this period".into(),
        RuleOutcome::Ran(s) => format!(
            "{} completed, {} created, {} skipped",
            s.completed, s.created, s.skipped
        ),
    }
}

pub fn cmd_automate(ctx: &Context) {
    let mut outcomes = ctx.engine.run_startup();
    outcomes.push(("end-of-task auto-complete", ctx.engine.auto_complete_on_end()));
    outcomes.push(("past-day auto-complete (daily)", ctx.engine.auto_complete_past_days(Trigger::Timer)));
    for (rule, outcome) in outcomes {
        println!("{rule:<32} {}", describe_outcome(outcome));
    }
}

pub fn cmd_run(ctx: &Context) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => ctx.fail(&format!("Failed to start runtime: {e}")),
    };
    ctx.store
        .lock()
        .on_change(Box::new(|| debug!("task store changed")));

    runtime.block_on(async {
        let runner = AutomationRunner::new(
            Arc::clone(&ctx.engine),
            Arc::clone(&ctx.scheduler),
            Arc::clone(&ctx.notifier),
        );
        let handle = runner.start();
        ctx.notifier.info("Automation running. Press Ctrl-C to stop.");
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
        }
        handle.stop().await;
    });
}

pub fn cmd_settings(ctx: &Context, action: SettingsAction) {
    match action {
        SettingsAction::Show => {
            let settings = ctx.store.lock().get_settings();
            match serde_json::to_string_pretty(&settings) {
                Ok(s) => println!("{s}"),
                Err(e) => ctx.fail(&format!("Failed to serialize settings: {e}")),
            }
        }
        SettingsAction::Set {
            theme,
            language,
            notifications,
            auto_complete_past_days,
            auto_complete_on_end,
            auto_create_follow_up,
            follow_up_days,
        } => {
            let current = ctx.store.lock().get_settings().automation;
            let automation = AutomationSettings {
                auto_complete_past_days: auto_complete_past_days.unwrap_or(current.auto_complete_past_days),
                auto_complete_on_end_enabled: auto_complete_on_end.unwrap_or(current.auto_complete_on_end_enabled),
                auto_create_follow_up_enabled: auto_create_follow_up
                    .unwrap_or(current.auto_create_follow_up_enabled),
                follow_up_default_offset_days: follow_up_days.unwrap_or(current.follow_up_default_offset_days),
            };
            let patch = SettingsPatch {
                theme,
                language,
                notifications,
                working_hours: None,
                automation: (automation != current).then_some(automation),
            };
            if patch.theme.is_none()
                && patch.language.is_none()
                && patch.notifications.is_none()
                && patch.automation.is_none()
            {
                ctx.fail("Nothing to change.");
            }
            match ctx.store.lock().update_settings(patch) {
                Some(_) => ctx.notifier.success("Settings saved."),
                None => ctx.fail("Settings could not be saved."),
            }
        }
    }
}

pub fn cmd_import(ctx: &Context, input: String, no_backup: bool) {
    let json = match fs::read_to_string(&input) {
        Ok(s) => s,
        Err(e) => ctx.fail(&format!("Failed to read {input}: {e}")),
    };

    let mut store = ctx.store.lock();
    if !no_backup {
        match snapshot(&mut store) {
            Ok(key) => println!("Created backup: {key}"),
            Err(e) => {
                drop(store);
                ctx.fail(&format!("Failed to create backup: {e} (use --no-backup to skip)"));
            }
        }
    }

    let report = match import_json(&mut store, &json) {
        Ok(r) => r,
        Err(e) => {
            drop(store);
            ctx.fail(&format!("Import failed: {e}"));
        }
    };
    drop(store);

    for (result, reason) in report.skipped() {
        println!(
            "  skipped #{} {}: {reason}",
            result.index,
            result.title.as_deref().unwrap_or("(untitled)")
        );
    }
    if report.imported_count > 0 {
        ctx.notifier.success(&format!(
            "Imported {} of {} task(s) from {input}",
            report.imported_count, report.total_count
        ));
    }
    if report.skipped_count > 0 {
        ctx.notifier.warning(&format!("{} record(s) were skipped", report.skipped_count));
    } else if report.total_count == 0 {
        ctx.notifier.info("No tasks in the input.");
    }
}

pub fn cmd_export(ctx: &Context, output: Option<String>) {
    let store = ctx.store.lock();
    let json = match export_json(&store) {
        Ok(s) => s,
        Err(e) => {
            drop(store);
            ctx.fail(&format!("Export failed: {e}"));
        }
    };
    let count = store.all_tasks().len();
    drop(store);

    match output {
        Some(path) => {
            if let Err(e) = fs::write(Path::new(&path), json) {
                ctx.fail(&format!("Failed to write {path}: {e}"));
            }
            ctx.notifier.success(&format!("Exported {count} task(s) to {path}"));
        }
        None => println!("{json}"),
    }
}

pub fn cmd_backup(ctx: &Context, list: bool, show: Option<String>, prune: bool) {
    let mut store = ctx.store.lock();
    if let Some(key) = show {
        let loaded = load_snapshot(&store, &key);
        drop(store);
        match loaded {
            Ok(Some(snap)) => {
                let completed = snap.tasks.iter().filter(|t| t.status == Status::Completed).count();
                println!("Snapshot:   {key}");
                println!("Taken:      {}", snap.timestamp.format("%Y-%m-%d %H:%M:%S"));
                println!("Tasks:      {} ({} completed)", snap.tasks.len(), completed);
                println!("Theme:      {}", snap.settings.theme);
            }
            Ok(None) => ctx.fail(&format!("Snapshot {key} not found.")),
            Err(e) => ctx.fail(&format!("Failed to read snapshot {key}: {e}")),
        }
        return;
    }
    if list {
        match list_snapshots(&store) {
            Ok(snapshots) if snapshots.is_empty() => println!("No snapshots."),
            Ok(snapshots) => {
                for (millis, key) in snapshots {
                    let taken = DateTime::from_timestamp_millis(millis)
                        .map(|d| d.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "?".into());
                    println!("{taken}  {key}");
                }
            }
            Err(e) => {
                drop(store);
                ctx.fail(&format!("Failed to list snapshots: {e}"));
            }
        }
        return;
    }

    if prune {
        let removed = prune_snapshots(&mut store, chrono::Duration::days(SNAPSHOT_RETENTION_DAYS));
        drop(store);
        match removed {
            Ok(n) => ctx.notifier.success(&format!("Removed {n} snapshot(s) older than {SNAPSHOT_RETENTION_DAYS} days")),
            Err(e) => ctx.fail(&format!("Failed to prune snapshots: {e}")),
        }
        return;
    }

    let taken = snapshot(&mut store);
    drop(store);
    match taken {
        Ok(key) => ctx.notifier.success(&format!("Backup created: {key}")),
        Err(e) => ctx.fail(&format!("Failed to create backup: {e}")),
    }
}

pub fn cmd_stats(ctx: &Context) {
    let today = ctx.today();
    let tasks = ctx.store.lock().all_tasks();
    let stats = analytics(&tasks, today);

    println!("Total:       {}", stats.total_tasks);
    println!("Completed:   {} ({}%)", stats.completed_tasks, stats.completion_rate);
    println!("Pending:     {}", stats.pending_tasks);
    println!("Today:       {}", stats.today_tasks);
    println!("\nBy category:");
    for c in &stats.by_category {
        println!("  {:<10} {:>3} total {:>3} done", format_category(c.category), c.total, c.completed);
    }

    let allocation = time_allocation(&tasks, today);
    if !allocation.is_empty() {
        println!("\nToday's time:");
        for (category, hours) in allocation {
            println!("  {:<10} {}", format_category(category), format_hours(hours));
        }
    }
}

fn print_day_counts(days: &[(NaiveDate, DayCount)], skip_empty: bool) {
    for (date, count) in days {
        if skip_empty && count.total == 0 {
            continue;
        }
        println!(
            "  {} {}  {} task(s), {} done, {} pending",
            date.format("%a"),
            date,
            count.total,
            count.completed,
            count.pending
        );
    }
}

pub fn cmd_calendar(ctx: &Context, days: u32, month: Option<String>, week: bool) {
    let tasks = ctx.store.lock().all_tasks();
    let today = ctx.today();

    if let Some(m) = month {
        let Ok(first) = NaiveDate::parse_from_str(&format!("{m}-01"), "%Y-%m-%d") else {
            ctx.fail(&format!("Invalid month '{m}'. Use YYYY-MM."));
        };
        let Some(overview) = month_overview(&tasks, first.year(), first.month()) else {
            ctx.fail(&format!("Invalid month '{m}'. Use YYYY-MM."));
        };
        println!(
            "{} {}: {} task(s), {} completed ({}%)",
            overview.month_name,
            overview.year,
            overview.total_tasks,
            overview.completed_tasks,
            overview.completion_rate
        );
        print_day_counts(&month_days(&tasks, overview.year, overview.month), true);
        return;
    }

    if week {
        println!("Week of {today}:");
        print_day_counts(&week_days(&tasks, today), false);
        return;
    }

    let upcoming = upcoming_days(&tasks, today, days);
    if upcoming.is_empty() {
        println!("Nothing scheduled in the next {days} day(s).");
        return;
    }
    for day in upcoming {
        let marker = if day.has_high_priority { " !" } else { "" };
        println!("{} {}{}", day.date.format("%a"), day.date, marker);
        for task in &day.tasks {
            println!("  {}", task_line(task));
        }
    }
}

pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}
