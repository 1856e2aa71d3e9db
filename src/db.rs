//! The persisted task record and display/parsing helpers.
//!
//! This module provides the `Database` struct that is stored under the task
//! record key, along with utility functions for date input parsing and for
//! formatting tasks as a table.

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use crate::fields::*;
use crate::task::{lenient_timestamp, Task};

pub const DB_VERSION: u32 = 1;

/// The task collection as persisted: `{tasks, version, createdAt}`.
///
/// Entries are read one at a time. An entry that is not a valid task lands in
/// `unreadable` and is written back untouched after the readable ones.
#[derive(Debug, Clone)]
pub struct Database {
    pub tasks: Vec<Task>,
    pub unreadable: Vec<Value>,
    pub version: u32,
    pub created_at: NaiveDateTime,
}

fn default_version() -> u32 {
    DB_VERSION
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDatabase {
    #[serde(default)]
    tasks: Vec<Value>,
    #[serde(default = "default_version", alias = "versions")]
    version: u32,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: NaiveDateTime,
}

impl<'de> Deserialize<'de> for Database {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawDatabase::deserialize(deserializer)?;
        let mut db = Database {
            tasks: Vec::with_capacity(raw.tasks.len()),
            unreadable: Vec::new(),
            version: raw.version,
            created_at: raw.created_at,
        };
        for (index, entry) in raw.tasks.into_iter().enumerate() {
            match Task::deserialize(&entry) {
                Ok(task) => db.tasks.push(task),
                Err(e) => {
                    let id = entry.get("id").map(|v| v.to_string()).unwrap_or_default();
                    warn!(index, %id, "task entry unreadable, kept as-is: {e}");
                    db.unreadable.push(entry);
                }
            }
        }
        Ok(db)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseOut<'a> {
    tasks: TaskEntries<'a>,
    version: u32,
    created_at: NaiveDateTime,
}

struct TaskEntries<'a>(&'a Database);

impl Serialize for TaskEntries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let db = self.0;
        let mut seq = serializer.serialize_seq(Some(db.entry_count()))?;
        for task in &db.tasks {
            seq.serialize_element(task)?;
        }
        for entry in &db.unreadable {
            seq.serialize_element(entry)?;
        }
        seq.end()
    }
}

impl Serialize for Database {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        DatabaseOut {
            tasks: TaskEntries(self),
            version: self.version,
            created_at: self.created_at,
        }
        .serialize(serializer)
    }
}

impl Database {
    pub fn new(created_at: NaiveDateTime) -> Self {
        Self { tasks: Vec::new(), unreadable: Vec::new(), version: DB_VERSION, created_at }
    }

    /// Get a task by ID.
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Get a mutable reference to a task by ID.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// True when a readable task or an unreadable entry carries `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
            || self.unreadable.iter().any(|entry| match entry.get("id") {
                Some(Value::String(s)) => s == id,
                Some(Value::Number(n)) => n.to_string() == id,
                _ => false,
            })
    }

    /// Readable tasks plus unreadable entries.
    pub fn entry_count(&self) -> usize {
        self.tasks.len() + self.unreadable.len()
    }
}

/// Parse human-readable due date input.
///
/// Supports:
/// - "today", "tomorrow", "yesterday"
/// - "monday", "next friday", "this sat"
/// - "end of month"
/// - "in 3d", "in 2w", "in 1m"
/// - "YYYY-MM-DD" format
pub fn parse_due_input(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return add_days(today, 1),
        "yesterday" => return add_days(today, -1),
        "end of month" | "eom" => {
            let first_of_next = today.with_day(1)?.checked_add_months(Months::new(1))?;
            return first_of_next.pred_opt();
        }
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(nd) = rest.strip_suffix('d') {
            if let Ok(days) = nd.trim().parse::<i64>() {
                return add_days(today, days);
            }
        }
        if let Some(nw) = rest.strip_suffix('w') {
            if let Ok(weeks) = nw.trim().parse::<i64>() {
                return add_days(today, weeks.checked_mul(7)?);
            }
        }
        if let Some(nm) = rest.strip_suffix('m') {
            if let Ok(months) = nm.trim().parse::<u32>() {
                return today.checked_add_months(Months::new(months));
            }
        }
    }

    let weekdays = [
        ("monday", 0), ("tuesday", 1), ("wednesday", 2), ("thursday", 3),
        ("friday", 4), ("saturday", 5), ("sunday", 6),
        ("mon", 0), ("tue", 1), ("wed", 2), ("thu", 3),
        ("fri", 4), ("sat", 5), ("sun", 6),
    ];

    let current_day = today.weekday().num_days_from_monday() as i64;
    for (day_name, target_day) in weekdays {
        let days_ahead = (target_day + 7 - current_day) % 7;
        if s == day_name || s == format!("this {}", day_name) {
            return add_days(today, days_ahead);
        }
        if s == format!("next {}", day_name) {
            let days_to_add = if days_ahead == 0 { 7 } else { days_ahead + 7 };
            return add_days(today, days_to_add);
        }
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// `date` moved by `days`, `None` when the result leaves chrono's range.
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(TimeDelta::try_days(days)?)
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<NaiveDate>, today: NaiveDate) -> String {
    match due {
        None => "invalid".into(),
        Some(d) => {
            let delta = (d - today).num_days();
            if delta == 0 {
                "today".into()
            } else if delta == 1 {
                "tomorrow".into()
            } else if delta > 1 {
                format!("in {}d", delta)
            } else {
                format!("{}d late", -delta)
            }
        }
    }
}

pub fn format_category(c: Category) -> &'static str {
    match c {
        Category::Academy => "Academy",
        Category::Freelance => "Freelance",
        Category::Support => "Support",
        Category::Project => "Project",
        Category::Company => "Company",
        Category::Other => "Other",
    }
}

pub fn format_priority(p: Priority) -> &'static str {
    match p {
        Priority::High => "High",
        Priority::Medium => "Medium",
        Priority::Low => "Low",
    }
}

pub fn format_status(s: Status) -> &'static str {
    match s {
        Status::Pending => "Pending",
        Status::InProgress => "InProgress",
        Status::Completed => "Completed",
        Status::Cancelled => "Cancelled",
    }
}

/// Format a duration in hours without trailing zeros ("1h", "1.5h").
pub fn format_hours(hours: f64) -> String {
    let rounded = (hours * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}h", rounded as i64)
    } else {
        format!("{}h", rounded)
    }
}

/// Print tasks in a formatted table.
pub fn print_table(tasks: &[Task], today: NaiveDate) {
    println!(
        "{:<16} {:<10} {:<11} {:<7} {:<10} {:<6} {:<6} {}",
        "ID", "Category", "Status", "Pri", "Due", "Time", "Dur", "Title"
    );
    for t in tasks {
        let recurring = if t.recurring { " (monthly)" } else { "" };
        println!(
            "{:<16} {:<10} {:<11} {:<7} {:<10} {:<6} {:<6} {}{}",
            truncate(&t.id, 16),
            format_category(t.category),
            format_status(t.status),
            format_priority(t.priority),
            format_due_relative(t.date(), today),
            truncate(&t.due_time, 6),
            format_hours(t.duration),
            t.title,
            recurring
        );
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}
