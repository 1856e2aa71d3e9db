//! Automation rules: past-day completion, end-of-task completion with
//! follow-ups, monthly renewal and the periodic refresh.
//!
//! Every rule is a synchronous method that takes the store lock once and keeps
//! it for its whole scan-and-mutate pass. The timers that call these rules live
//! in [`crate::runner`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{month_key, Clock};
use crate::db::add_days;
use crate::fields::*;
use crate::notify::Notifier;
use crate::store::{SharedStore, TaskStore};
use crate::task::{Task, TaskDraft, TaskPatch};

pub const DAY_CHECK_MARKER: &str = "last_day_complete_check";
pub const MONTH_CHECK_MARKER: &str = "last_month_check";
pub const FOLLOW_UP_PREFIX: &str = "Follow-up: ";

/// What caused a rule to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Timer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub completed: usize,
    pub created: usize,
    /// Tasks passed over because of malformed dates or failed writes.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The rule's setting is off.
    Disabled,
    /// The rule's marker shows it already ran this period.
    AlreadyRan,
    Ran(RunSummary),
}

impl RuleOutcome {
    pub fn summary(&self) -> Option<RunSummary> {
        match self {
            RuleOutcome::Ran(s) => Some(*s),
            _ => None,
        }
    }

    pub fn changed(&self) -> bool {
        self.summary().is_some_and(|s| s.completed > 0 || s.created > 0)
    }
}

/// Draft for the follow-up of `task`: same details, `offset_days` after its
/// start date. Negative offsets count as zero.
pub fn follow_up_draft(task: &Task, offset_days: i64) -> Option<TaskDraft> {
    let date = add_days(task.date()?, offset_days.max(0))?;
    Some(TaskDraft {
        description: Some(task.description.clone()),
        category: Some(task.category),
        priority: Some(task.priority),
        due_date: Some(date.format("%Y-%m-%d").to_string()),
        due_time: Some(task.due_time.clone()),
        duration: Some(task.duration),
        status: Some(Status::Pending),
        recurring: false,
        ..TaskDraft::new(format!("{FOLLOW_UP_PREFIX}{}", task.title))
    })
}

pub struct AutomationEngine {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl AutomationEngine {
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, clock, notifier }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Rules that run once when the engine starts.
    pub fn run_startup(&self) -> Vec<(&'static str, RuleOutcome)> {
        vec![
            ("past-day auto-complete", self.auto_complete_past_days(Trigger::Startup)),
            ("monthly renewal", self.renew_monthly(Trigger::Startup)),
        ]
    }

    /// Complete every non-completed task dated before today.
    ///
    /// At startup this always scans; on the timer it scans at most once per day,
    /// tracked by the daily check marker.
    pub fn auto_complete_past_days(&self, trigger: Trigger) -> RuleOutcome {
        let now = self.clock.now();
        let today = now.date();
        let today_key = today.format("%Y-%m-%d").to_string();

        let mut store = self.store.lock();
        if !store.get_settings().automation.auto_complete_past_days {
            return RuleOutcome::Disabled;
        }
        if trigger == Trigger::Timer && store.marker(DAY_CHECK_MARKER).as_deref() == Some(today_key.as_str()) {
            return RuleOutcome::AlreadyRan;
        }

        let mut summary = RunSummary::default();
        for task in store.all_tasks() {
            if task.status == Status::Completed {
                continue;
            }
            let Some(date) = task.date() else {
                debug!(id = %task.id, due_date = %task.due_date, "past-day check: invalid date, skipped");
                summary.skipped += 1;
                continue;
            };
            if date >= today {
                continue;
            }
            match store.update_task(&task.id, TaskPatch::complete(now)) {
                Some(_) => summary.completed += 1,
                None => summary.skipped += 1,
            }
        }
        if trigger == Trigger::Timer {
            store.set_marker(DAY_CHECK_MARKER, &today_key);
        }
        drop(store);

        if summary.completed > 0 {
            info!(completed = summary.completed, "auto-completed tasks from previous days");
            self.notifier
                .success(&format!("Auto-completed {} task(s) from previous days", summary.completed));
        }
        RuleOutcome::Ran(summary)
    }

    /// Complete open tasks whose end has passed, creating follow-ups.
    ///
    /// Completion applies when the global setting is on or the task opts in;
    /// follow-ups are created when the global follow-up setting is on or the
    /// task asks for one.
    pub fn auto_complete_on_end(&self) -> RuleOutcome {
        let now = self.clock.now();
        let mut store = self.store.lock();
        let automation = store.get_settings().automation;
        let tasks = store.all_tasks();

        let any_opted_in = tasks.iter().any(|t| t.auto_complete_on_end == Some(true));
        if !automation.auto_complete_on_end_enabled && !any_opted_in {
            return RuleOutcome::Disabled;
        }

        let mut summary = RunSummary::default();
        for task in tasks {
            if !task.status.is_open() {
                continue;
            }
            let Some(end) = task.end() else {
                debug!(id = %task.id, "end-of-task check: invalid start, skipped");
                summary.skipped += 1;
                continue;
            };
            if end > now {
                continue;
            }
            if !(automation.auto_complete_on_end_enabled || task.auto_complete_on_end == Some(true)) {
                continue;
            }
            if store.update_task(&task.id, TaskPatch::complete(now)).is_none() {
                summary.skipped += 1;
                continue;
            }
            summary.completed += 1;
            info!(id = %task.id, title = %task.title, "task auto-completed at end");

            if automation.auto_create_follow_up_enabled || task.auto_create_next == Some(true) {
                // The global default never schedules on the same day.
                let offset = task
                    .follow_up_offset_days
                    .unwrap_or_else(|| i64::from(automation.follow_up_default_offset_days).max(1));
                summary.created += create_follow_up(&mut store, &task, offset);
            }
        }
        drop(store);

        if summary.completed > 0 {
            let message = if summary.created > 0 {
                format!(
                    "Auto-completed {} finished task(s), added {} follow-up(s)",
                    summary.completed, summary.created
                )
            } else {
                format!("Auto-completed {} finished task(s)", summary.completed)
            };
            self.notifier.success(&message);
        }
        RuleOutcome::Ran(summary)
    }

    /// Monthly renewal. At startup it always asks the store to renew; on the
    /// timer it renews only when the month check marker shows a new month.
    pub fn renew_monthly(&self, trigger: Trigger) -> RuleOutcome {
        let current_month = month_key(self.clock.today());
        let mut store = self.store.lock();

        if trigger == Trigger::Timer {
            if store.marker(MONTH_CHECK_MARKER).as_deref() == Some(current_month.as_str()) {
                return RuleOutcome::AlreadyRan;
            }
            info!(month = %current_month, "new month detected");
        }
        let created = store.renew_monthly_recurring();
        if trigger == Trigger::Timer {
            store.set_marker(MONTH_CHECK_MARKER, &current_month);
        }
        drop(store);

        if created > 0 {
            self.notifier.success(&format!("Renewed {created} monthly task(s)"));
        }
        RuleOutcome::Ran(RunSummary { created, ..RunSummary::default() })
    }

    /// Tell change listeners to re-read. Mutates nothing.
    pub fn refresh(&self) -> RuleOutcome {
        self.store.lock().notify();
        RuleOutcome::Ran(RunSummary::default())
    }
}

fn create_follow_up(store: &mut TaskStore, task: &Task, offset_days: i64) -> usize {
    let Some(draft) = follow_up_draft(task, offset_days) else {
        warn!(id = %task.id, "cannot date follow-up, skipped");
        return 0;
    };
    match store.add_task(draft) {
        Some(follow_up) => {
            info!(id = %follow_up.id, due_date = %follow_up.due_date, "follow-up created");
            1
        }
        None => 0,
    }
}
