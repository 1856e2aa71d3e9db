//! Task data structure and related functionality.
//!
//! This module defines the core `Task` struct that represents a single time-boxed
//! unit of work, the `TaskDraft` used to create one and the `TaskPatch` used to
//! change one. Dates and times are kept as the text the user or an import supplied
//! and parsed on use, so a malformed value only disables the task for time math.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::fields::*;

pub const DEFAULT_DUE_TIME: &str = "09:00";
pub const DEFAULT_DURATION_HOURS: f64 = 1.0;

/// A schedulable unit of work.
///
/// Reading is lenient: a missing priority, status, time or duration takes the
/// creation default, and timestamps may be naive local or RFC 3339.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: Category,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: String,
    #[serde(default = "default_due_time")]
    pub due_time: String,
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default = "default_status")]
    pub status: Status,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_pattern: Option<RecurringPattern>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: NaiveDateTime,
    #[serde(default, deserialize_with = "lenient_opt_timestamp")]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_complete_on_end: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_create_next: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_offset_days: Option<i64>,
}

fn default_category() -> Category {
    Category::Freelance
}

fn default_priority() -> Priority {
    Priority::Medium
}

fn default_due_time() -> String {
    DEFAULT_DUE_TIME.to_string()
}

fn default_duration() -> f64 {
    DEFAULT_DURATION_HOURS
}

fn default_status() -> Status {
    Status::Pending
}

/// User-supplied values for a new task. Unset fields take the defaults of
/// [`Task::from_draft`].
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    /// Requested id. Kept only when no stored task already uses it.
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
    pub due_time: Option<String>,
    pub duration: Option<f64>,
    pub status: Option<Status>,
    pub recurring: bool,
    pub recurring_pattern: Option<RecurringPattern>,
    pub auto_complete_on_end: Option<bool>,
    pub auto_create_next: Option<bool>,
    pub follow_up_offset_days: Option<i64>,
    /// Carried over by import; `None` means "now".
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Self::default() }
    }

    /// Check the fields a caller supplied before the draft reaches the store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if let Some(date) = &self.due_date {
            if parse_date(date).is_none() {
                return Err(ValidationError::InvalidValue { field: "dueDate", value: date.clone() });
            }
        }
        if let Some(time) = &self.due_time {
            if parse_time(time).is_none() {
                return Err(ValidationError::InvalidValue { field: "dueTime", value: time.clone() });
            }
        }
        if let Some(duration) = self.duration {
            if !(duration.is_finite() && duration > 0.0) {
                return Err(ValidationError::InvalidValue {
                    field: "duration",
                    value: duration.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Field-level changes for an existing task. Set fields win; unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
    pub due_time: Option<String>,
    pub duration: Option<f64>,
    pub status: Option<Status>,
    pub recurring: Option<bool>,
    pub completed_at: Option<NaiveDateTime>,
    pub auto_complete_on_end: Option<bool>,
    pub auto_create_next: Option<bool>,
    pub follow_up_offset_days: Option<i64>,
}

impl TaskPatch {
    /// Patch that marks a task completed at `at`.
    pub fn complete(at: NaiveDateTime) -> Self {
        Self {
            status: Some(Status::Completed),
            completed_at: Some(at),
            ..Self::default()
        }
    }

    /// Patch that moves a task to a new date and time.
    pub fn reschedule(due_date: String, due_time: String) -> Self {
        Self {
            due_date: Some(due_date),
            due_time: Some(due_time),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.due_time.is_none()
            && self.duration.is_none()
            && self.status.is_none()
            && self.recurring.is_none()
            && self.completed_at.is_none()
            && self.auto_complete_on_end.is_none()
            && self.auto_create_next.is_none()
            && self.follow_up_offset_days.is_none()
    }
}

impl Task {
    /// The single default-task constructor: applies defaults, then the draft's values.
    pub fn from_draft(id: String, draft: TaskDraft, now: NaiveDateTime) -> Task {
        let recurring_pattern = draft
            .recurring_pattern
            .or(if draft.recurring { Some(RecurringPattern::Monthly) } else { None });
        Task {
            id,
            title: draft.title.trim().to_string(),
            description: draft.description.unwrap_or_default(),
            category: draft.category.unwrap_or(Category::Freelance),
            priority: draft.priority.unwrap_or(Priority::Medium),
            due_date: draft.due_date.unwrap_or_else(|| now.date().format("%Y-%m-%d").to_string()),
            due_time: draft.due_time.unwrap_or_else(|| DEFAULT_DUE_TIME.to_string()),
            duration: draft.duration.unwrap_or(DEFAULT_DURATION_HOURS),
            status: draft.status.unwrap_or(Status::Pending),
            recurring: draft.recurring,
            recurring_pattern,
            created_at: draft.created_at.unwrap_or(now),
            updated_at: draft.updated_at.or(draft.created_at).unwrap_or(now),
            completed_at: draft.completed_at,
            auto_complete_on_end: draft.auto_complete_on_end,
            auto_create_next: draft.auto_create_next,
            follow_up_offset_days: draft.follow_up_offset_days,
        }
    }

    /// Merge a patch into this task and re-stamp `updated_at`. Moving the
    /// status away from completed clears `completed_at`.
    pub fn apply(&mut self, patch: TaskPatch, now: NaiveDateTime) {
        if let Some(v) = patch.title {
            self.title = v;
        }
        if let Some(v) = patch.description {
            self.description = v;
        }
        if let Some(v) = patch.category {
            self.category = v;
        }
        if let Some(v) = patch.priority {
            self.priority = v;
        }
        if let Some(v) = patch.due_date {
            self.due_date = v;
        }
        if let Some(v) = patch.due_time {
            self.due_time = v;
        }
        if let Some(v) = patch.duration {
            self.duration = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
            if v != Status::Completed {
                self.completed_at = None;
            }
        }
        if let Some(v) = patch.recurring {
            self.recurring = v;
            if v && self.recurring_pattern.is_none() {
                self.recurring_pattern = Some(RecurringPattern::Monthly);
            }
        }
        if let Some(v) = patch.completed_at {
            self.completed_at = Some(v);
        }
        if let Some(v) = patch.auto_complete_on_end {
            self.auto_complete_on_end = Some(v);
        }
        if let Some(v) = patch.auto_create_next {
            self.auto_create_next = Some(v);
        }
        if let Some(v) = patch.follow_up_offset_days {
            self.follow_up_offset_days = Some(v);
        }
        self.updated_at = now;
    }

    pub fn date(&self) -> Option<NaiveDate> {
        parse_date(&self.due_date)
    }

    pub fn time(&self) -> Option<NaiveTime> {
        parse_time(&self.due_time)
    }

    /// Start instant, `None` when the date or time is malformed.
    pub fn start(&self) -> Option<NaiveDateTime> {
        Some(self.date()?.and_time(self.time()?))
    }

    /// Duration used by end-of-task math. Non-positive durations count as one hour.
    pub fn effective_duration(&self) -> f64 {
        if self.duration.is_finite() && self.duration > 0.0 {
            self.duration
        } else {
            DEFAULT_DURATION_HOURS
        }
    }

    /// End instant: start plus duration hours.
    pub fn end(&self) -> Option<NaiveDateTime> {
        let millis = (self.effective_duration() * 3_600_000.0).round() as i64;
        self.start()?.checked_add_signed(Duration::milliseconds(millis))
    }

    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.date() == Some(date)
    }
}

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Parse a 24h `HH:MM` time (seconds tolerated).
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

/// Parse a stored timestamp: naive local (`2026-10-16T08:00:00[.fff]`) or
/// RFC 3339 with an offset, which is converted to local time.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
}

pub fn timestamp_from_value(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?)
            .map(|dt| dt.with_timezone(&Local).naive_local()),
        _ => None,
    }
}

/// Serde reader for required timestamps. Anything unparseable becomes the epoch.
pub fn lenient_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(timestamp_from_value(&value).unwrap_or_default())
}

/// Serde reader for optional timestamps. Anything unparseable becomes `None`.
pub fn lenient_opt_timestamp<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<NaiveDateTime>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(timestamp_from_value(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap().and_hms_opt(8, 0, 0).unwrap()
    }

    #[test]
    fn draft_defaults_are_applied_once() {
        let task = Task::from_draft("1".into(), TaskDraft::new("  Write report "), now());
        assert_eq!(task.title, "Write report");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, Status::Pending);
        assert_eq!(task.duration, 1.0);
        assert_eq!(task.due_time, "09:00");
        assert_eq!(task.due_date, "2026-03-10");
        assert_eq!(task.category, Category::Freelance);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn recurring_draft_gets_monthly_pattern() {
        let mut draft = TaskDraft::new("Invoice");
        draft.recurring = true;
        let task = Task::from_draft("1".into(), draft, now());
        assert_eq!(task.recurring_pattern, Some(RecurringPattern::Monthly));
    }

    #[test]
    fn patch_wins_and_unset_fields_stay() {
        let mut task = Task::from_draft("1".into(), TaskDraft::new("Call"), now());
        let later = now() + Duration::hours(1);
        task.apply(
            TaskPatch { priority: Some(Priority::High), ..TaskPatch::default() },
            later,
        );
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.title, "Call");
        assert_eq!(task.updated_at, later);
        assert_eq!(task.created_at, now());
    }

    #[test]
    fn reopening_clears_completion_stamp() {
        let mut task = Task::from_draft("1".into(), TaskDraft::new("Call"), now());
        task.apply(TaskPatch::complete(now()), now());
        assert_eq!(task.completed_at, Some(now()));

        task.apply(TaskPatch { status: Some(Status::Pending), ..TaskPatch::default() }, now());
        assert_eq!(task.status, Status::Pending);
        assert!(task.completed_at.is_none());

        // A patch without a status leaves the stamp alone.
        task.apply(TaskPatch::complete(now()), now());
        task.apply(TaskPatch { priority: Some(Priority::Low), ..TaskPatch::default() }, now());
        assert_eq!(task.completed_at, Some(now()));
    }

    #[test]
    fn sparse_records_take_creation_defaults() {
        let task: Task = serde_json::from_str(
            r#"{"id":"7","title":"Sparse","dueDate":"2026-03-10",
                "createdAt":"2026-03-01T09:30:00.000Z","completedAt":null}"#,
        )
        .unwrap();
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, Status::Pending);
        assert_eq!(task.category, Category::Freelance);
        assert_eq!(task.due_time, DEFAULT_DUE_TIME);
        assert_eq!(task.duration, DEFAULT_DURATION_HOURS);
        assert!(task.completed_at.is_none());
        assert_ne!(task.created_at, NaiveDateTime::default());
        assert_eq!(task.updated_at, NaiveDateTime::default());
    }

    #[test]
    fn timestamps_accept_naive_and_offset_forms() {
        assert_eq!(parse_timestamp("2026-03-10T08:00:00"), Some(now()));
        assert_eq!(parse_timestamp("2026-03-10T08:00:00.250").map(|t| t.date()), Some(now().date()));
        assert!(parse_timestamp("2026-03-10T08:00:00.000Z").is_some());
        assert!(parse_timestamp("2026-03-10T08:00:00+02:00").is_some());
        assert!(parse_timestamp("last tuesday").is_none());
    }

    #[test]
    fn end_adds_fractional_hours() {
        let mut task = Task::from_draft("1".into(), TaskDraft::new("Sync"), now());
        task.due_time = "10:15".into();
        task.duration = 1.5;
        assert_eq!(
            task.end(),
            Some(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap().and_hms_opt(11, 45, 0).unwrap())
        );
    }

    #[test]
    fn malformed_values_yield_no_instant() {
        let mut task = Task::from_draft("1".into(), TaskDraft::new("Broken"), now());
        task.due_time = "25:99".into();
        assert!(task.start().is_none());
        assert!(task.end().is_none());
        task.due_time = "10:00".into();
        task.due_date = "not-a-date".into();
        assert!(task.start().is_none());
    }

    #[test]
    fn validation_reports_the_offending_field() {
        assert_eq!(TaskDraft::new("  ").validate(), Err(ValidationError::MissingField("title")));
        let mut draft = TaskDraft::new("Ok");
        draft.due_time = Some("7pm".into());
        assert!(matches!(
            draft.validate(),
            Err(ValidationError::InvalidValue { field: "dueTime", .. })
        ));
        draft.due_time = Some("19:00".into());
        draft.duration = Some(0.0);
        assert!(draft.validate().is_err());
    }
}
