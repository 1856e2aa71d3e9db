//! User-facing notifications.
//!
//! The engine and the CLI report outcomes through a [`Notifier`]. The console
//! sink prints one line per notification; the recording sink collects them
//! for tests. [`ReminderTracker`] decides which task reminders are due.

use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::fields::*;
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Severity::Info => "info",
            Severity::Success => "ok",
            Severity::Warning => "warn",
            Severity::Error => "error",
        };
        f.write_str(tag)
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);

    fn info(&self, message: &str) {
        self.notify(message, Severity::Info);
    }

    fn success(&self, message: &str) {
        self.notify(message, Severity::Success);
    }

    fn warning(&self, message: &str) {
        self.notify(message, Severity::Warning);
    }

    fn error(&self, message: &str) {
        self.notify(message, Severity::Error);
    }
}

/// Prints `[severity] message` lines. Errors go to stderr and are shown even
/// when notifications are turned off.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleNotifier {
    enabled: bool,
}

impl ConsoleNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        if !self.enabled && severity != Severity::Error {
            debug!(%severity, message, "notification suppressed");
            return;
        }
        match severity {
            Severity::Error => eprintln!("[{severity}] {message}"),
            _ => println!("[{severity}] {message}"),
        }
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<(Severity, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        self.entries.lock().push((severity, message.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reminder {
    /// Task starts in about ten minutes.
    Upcoming(Task),
    /// Task start has passed and it is not completed.
    Overdue(Task),
}

impl Reminder {
    pub fn severity(&self) -> Severity {
        match self {
            Reminder::Upcoming(_) => Severity::Warning,
            Reminder::Overdue(_) => Severity::Error,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Reminder::Upcoming(t) => format!(
                "Reminder: \"{}\" starts in 10 minutes ({} at {})",
                t.title,
                crate::db::format_category(t.category),
                t.due_time
            ),
            Reminder::Overdue(t) => {
                format!("Overdue: \"{}\" was due at {}", t.title, t.due_time)
            }
        }
    }
}

/// Remembers which reminders were already sent so each fires once per task.
/// On the first check of a new day, entries for tasks no longer due today are dropped.
#[derive(Debug, Default)]
pub struct ReminderTracker {
    sent: HashSet<String>,
    last_check: Option<NaiveDate>,
    last_summary: Option<NaiveDate>,
}

impl ReminderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reminders due now for today's tasks. Tasks with a malformed start are skipped.
    pub fn check(&mut self, today_tasks: &[Task], now: NaiveDateTime) -> Vec<Reminder> {
        if self.last_check != Some(now.date()) {
            self.prune(today_tasks);
            self.last_check = Some(now.date());
        }
        let mut due = Vec::new();
        for task in today_tasks {
            let Some(start) = task.start() else {
                debug!(id = %task.id, "reminder check: skipping task with invalid start");
                continue;
            };
            let minutes_until = (start - now).num_milliseconds() as f64 / 60_000.0;
            if minutes_until > 9.0 && minutes_until < 11.0 && self.sent.insert(task.id.clone()) {
                due.push(Reminder::Upcoming(task.clone()));
            }
            if start < now
                && task.status != Status::Completed
                && self.sent.insert(format!("overdue-{}", task.id))
            {
                due.push(Reminder::Overdue(task.clone()));
            }
        }
        due
    }

    fn prune(&mut self, today_tasks: &[Task]) {
        let ids: HashSet<&str> = today_tasks.iter().map(|t| t.id.as_str()).collect();
        let before = self.sent.len();
        self.sent
            .retain(|key| ids.contains(key.strip_prefix("overdue-").unwrap_or(key.as_str())));
        if self.sent.len() != before {
            debug!(dropped = before - self.sent.len(), "reminder history pruned");
        }
    }

    /// Whether the morning summary should go out: once per day, during the 08:00 hour.
    pub fn summary_due(&mut self, now: NaiveDateTime) -> bool {
        let today = now.date();
        if now.hour() != 8 || self.last_summary == Some(today) {
            return false;
        }
        self.last_summary = Some(today);
        true
    }
}

pub fn morning_summary(scheduled: usize) -> String {
    format!("Good morning! You have {scheduled} task(s) scheduled today")
}
