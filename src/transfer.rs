//! Bulk JSON import and export.
//!
//! Import accepts `{tasks: [...]}` (optionally carrying `exportDate` and
//! `taskCount`) or a bare task array. Records are checked one at a time so a
//! bad record is reported and skipped without stopping the batch. Supplied ids
//! are kept, which makes a repeated import skip every record as a duplicate.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::db::Database;
use crate::error::{TransferError, ValidationError};
use crate::fields::*;
use crate::store::TaskStore;
use crate::task::{timestamp_from_value, TaskDraft};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDocument {
    pub tasks: Vec<Value>,
    #[serde(default)]
    pub export_date: Option<String>,
    #[serde(default)]
    pub task_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportInput {
    Document(ImportDocument),
    List(Vec<Value>),
}

/// One task as found in an import file. Everything is optional until checked.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    pub id: Option<Value>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub due_time: Option<String>,
    pub duration: Option<f64>,
    pub status: Option<String>,
    pub recurring: Option<bool>,
    pub recurring_pattern: Option<Value>,
    pub created_at: Option<Value>,
    pub updated_at: Option<Value>,
    pub completed_at: Option<Value>,
    pub auto_complete_on_end: Option<bool>,
    pub auto_create_next: Option<bool>,
    pub follow_up_offset_days: Option<i64>,
}

/// Optional timestamp field. `null` is absent; anything else must parse.
fn import_timestamp(
    field: &'static str,
    value: Option<Value>,
) -> Result<Option<NaiveDateTime>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => timestamp_from_value(&v)
            .map(Some)
            .ok_or_else(|| ValidationError::InvalidValue { field, value: v.to_string() }),
    }
}

impl ImportRecord {
    /// The supplied id as text. Numeric ids are accepted.
    pub fn id(&self) -> Option<String> {
        match &self.id {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn into_draft(self) -> Result<TaskDraft, ValidationError> {
        let id = self.id();
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or(ValidationError::MissingField("title"))?;
        let due_date = self
            .due_date
            .filter(|d| !d.trim().is_empty())
            .ok_or(ValidationError::MissingField("dueDate"))?;
        let category_text = self.category.ok_or(ValidationError::MissingField("category"))?;
        let category = Category::parse(&category_text).ok_or(ValidationError::InvalidValue {
            field: "category",
            value: category_text.clone(),
        })?;
        let priority = match self.priority {
            Some(p) => Some(
                Priority::parse(&p).ok_or(ValidationError::InvalidValue { field: "priority", value: p })?,
            ),
            None => None,
        };
        let status = match self.status {
            Some(s) => {
                Some(Status::parse(&s).ok_or(ValidationError::InvalidValue { field: "status", value: s })?)
            }
            None => None,
        };
        let created_at = import_timestamp("createdAt", self.created_at)?;
        let updated_at = import_timestamp("updatedAt", self.updated_at)?;
        let completed_at = import_timestamp("completedAt", self.completed_at)?;
        let recurring_pattern = match self.recurring_pattern {
            Some(Value::String(p)) if p.eq_ignore_ascii_case("monthly") => Some(RecurringPattern::Monthly),
            _ => None,
        };

        let draft = TaskDraft {
            id,
            description: self.description,
            category: Some(category),
            priority,
            due_date: Some(due_date),
            due_time: self.due_time,
            duration: self.duration,
            status,
            recurring: self.recurring.unwrap_or(false),
            recurring_pattern,
            auto_complete_on_end: self.auto_complete_on_end,
            auto_create_next: self.auto_create_next,
            follow_up_offset_days: self.follow_up_offset_days,
            created_at,
            updated_at,
            completed_at,
            ..TaskDraft::new(title)
        };
        draft.validate()?;
        Ok(draft)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// A task with this id already exists.
    Duplicate(String),
    Invalid(ValidationError),
    /// The record was valid but could not be stored.
    NotStored,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Duplicate(id) => write!(f, "duplicate id {id}"),
            SkipReason::Invalid(e) => write!(f, "invalid: {e}"),
            SkipReason::NotStored => f.write_str("could not be stored"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    pub index: usize,
    pub title: Option<String>,
    /// Stored task id, or why the record was skipped.
    pub outcome: Result<String, SkipReason>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub imported_count: usize,
    pub skipped_count: usize,
    pub total_count: usize,
    pub results: Vec<ImportResult>,
}

impl ImportReport {
    pub fn skipped(&self) -> impl Iterator<Item = (&ImportResult, &SkipReason)> {
        self.results.iter().filter_map(|r| r.outcome.as_ref().err().map(|e| (r, e)))
    }

    fn push_skip(&mut self, index: usize, title: Option<String>, reason: SkipReason) {
        self.skipped_count += 1;
        self.results.push(ImportResult { index, title, outcome: Err(reason) });
    }
}

/// Import raw records into the store.
pub fn import_tasks(store: &mut TaskStore, records: Vec<Value>) -> ImportReport {
    let mut existing: HashSet<String> = store.all_tasks().into_iter().map(|t| t.id).collect();
    let mut report = ImportReport { total_count: records.len(), ..ImportReport::default() };

    for (index, raw) in records.into_iter().enumerate() {
        let record: ImportRecord = match serde_json::from_value(raw) {
            Ok(r) => r,
            Err(e) => {
                debug!(index, "import record has wrong field types: {e}");
                let reason = SkipReason::Invalid(ValidationError::InvalidValue {
                    field: "record",
                    value: e.to_string(),
                });
                report.push_skip(index, None, reason);
                continue;
            }
        };
        let title = record.title.clone();

        if let Some(id) = record.id() {
            if existing.contains(&id) {
                report.push_skip(index, title, SkipReason::Duplicate(id));
                continue;
            }
        }
        let draft = match record.into_draft() {
            Ok(d) => d,
            Err(e) => {
                warn!(index, "skipping invalid import record: {e}");
                report.push_skip(index, title, SkipReason::Invalid(e));
                continue;
            }
        };
        match store.add_task(draft) {
            Some(task) => {
                existing.insert(task.id.clone());
                report.imported_count += 1;
                report.results.push(ImportResult { index, title: Some(task.title), outcome: Ok(task.id) });
            }
            None => report.push_skip(index, title, SkipReason::NotStored),
        }
    }
    report
}

/// Parse an import document and import its tasks.
pub fn import_json(store: &mut TaskStore, json: &str) -> Result<ImportReport, TransferError> {
    store.load_database().map_err(|_| TransferError::StoreUnreadable)?;
    let records = match serde_json::from_str::<ImportInput>(json)? {
        ImportInput::Document(doc) => {
            if let Some(expected) = doc.task_count {
                if expected != doc.tasks.len() {
                    warn!(expected, found = doc.tasks.len(), "import taskCount does not match");
                }
            }
            doc.tasks
        }
        ImportInput::List(tasks) => tasks,
    };
    Ok(import_tasks(store, records))
}

/// Export document: the persisted task record plus export metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub export_date: NaiveDateTime,
    pub task_count: usize,
    #[serde(flatten)]
    pub database: Database,
}

/// Pretty-printed export of every task.
pub fn export_json(store: &TaskStore) -> Result<String, TransferError> {
    let database = store.load_database().map_err(|_| TransferError::StoreUnreadable)?;
    let doc = ExportDocument {
        export_date: store.clock().now(),
        task_count: database.entry_count(),
        database,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}
