//! The task store: single owner of tasks, settings and run markers.
//!
//! Every operation reads the persisted record from the backend, applies its
//! change and writes it back. Read or parse failures never reach the caller:
//! queries degrade to an empty result and writes become no-ops, with the cause
//! logged. A store that cannot parse its task record refuses to write so the
//! unreadable data is never overwritten.

use std::sync::Arc;

use chrono::{Months, NaiveDate};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::backend::{KvBackend, MemoryBackend, WriteGuard};
use crate::clock::{month_key, Clock};
use crate::db::Database;
use crate::error::StoreError;
use crate::fields::*;
use crate::settings::{Settings, SettingsPatch};
use crate::task::{Task, TaskDraft, TaskPatch};

pub const TASKS_KEY: &str = "tasks_db";
pub const SETTINGS_KEY: &str = "settings";
pub const RENEWAL_MARKER: &str = "last_monthly_renewal";

/// Callback fired after every successful mutation.
pub type ChangeListener = Box<dyn Fn() + Send + Sync>;

/// The store as shared between the CLI, the scheduler and the automation timers.
/// Each rule holds the lock for its whole read-then-write sequence.
pub type SharedStore = Arc<Mutex<TaskStore>>;

/// Optional-field task filter. Every supplied field must match.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub category: Option<Category>,
    pub status: Option<Status>,
    pub due_date: Option<NaiveDate>,
    /// Order matches high > medium > low (stable).
    pub sort_by_priority: bool,
}

impl TaskFilter {
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn by_priority(mut self) -> Self {
        self.sort_by_priority = true;
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(c) = self.category {
            if task.category != c {
                return false;
            }
        }
        if let Some(s) = self.status {
            if task.status != s {
                return false;
            }
        }
        if let Some(d) = self.due_date {
            if !task.is_due_on(d) {
                return false;
            }
        }
        true
    }
}

pub struct TaskStore {
    backend: Box<dyn KvBackend>,
    clock: Arc<dyn Clock>,
    last_id: i64,
    listeners: Vec<ChangeListener>,
}

impl TaskStore {
    /// Open a store over `backend`, writing default records on first run.
    pub fn open(backend: Box<dyn KvBackend>, clock: Arc<dyn Clock>) -> Self {
        let mut store = Self {
            backend,
            clock,
            last_id: 0,
            listeners: Vec::new(),
        };
        store.initialize();
        store
    }

    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::open(Box::new(MemoryBackend::new()), clock)
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    fn initialize(&mut self) {
        match self.backend.get(TASKS_KEY) {
            Ok(Some(_)) => {}
            Ok(None) => {
                let db = Database::new(self.clock.now());
                if let Err(e) = self.write_db(&db) {
                    error!("cannot initialise task record: {e}");
                }
            }
            Err(e) => error!("cannot read task record: {e}"),
        }
        match self.backend.get(SETTINGS_KEY) {
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Err(e) = self.write_settings(&Settings::default()) {
                    error!("cannot initialise settings: {e}");
                }
            }
            Err(e) => error!("cannot read settings: {e}"),
        }
    }

    /// Load the persisted task record. A missing record is an empty database.
    pub fn load_database(&self) -> Result<Database, StoreError> {
        match self.backend.get(TASKS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Database::new(self.clock.now())),
        }
    }

    fn write_db(&mut self, db: &Database) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(db)?;
        self.backend.set(TASKS_KEY, &data)
    }

    fn write_settings(&mut self, settings: &Settings) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(settings)?;
        self.backend.set(SETTINGS_KEY, &data)
    }

    /// Take the backend's write lock and load for a write. Logs and returns
    /// `None` when the lock is busy or the record is unreadable. The write
    /// must happen before the returned guard drops.
    fn load_for_write(&self, op: &str) -> Option<(WriteGuard, Database)> {
        let guard = match self.backend.write_guard() {
            Ok(guard) => guard,
            Err(e) => {
                error!("{op}: write skipped: {e}");
                return None;
            }
        };
        match self.load_database() {
            Ok(db) => Some((guard, db)),
            Err(e) => {
                error!("{op}: task record unreadable, write skipped: {e}");
                None
            }
        }
    }

    /// Time-based id, bumped past the last issued id and any stored id.
    fn next_id(&mut self, db: &Database) -> String {
        let mut candidate = self.clock.now().and_utc().timestamp_millis().max(self.last_id + 1);
        while db.contains(&candidate.to_string()) {
            candidate += 1;
        }
        self.last_id = candidate;
        candidate.to_string()
    }

    /// All tasks, in insertion order.
    pub fn all_tasks(&self) -> Vec<Task> {
        match self.load_database() {
            Ok(db) => db.tasks,
            Err(e) => {
                error!("error reading tasks: {e}");
                Vec::new()
            }
        }
    }

    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.all_tasks().into_iter().find(|t| t.id == id)
    }

    /// Create a task from `draft`. Returns the stored task, or `None` when
    /// nothing was stored.
    pub fn add_task(&mut self, draft: TaskDraft) -> Option<Task> {
        if draft.title.trim().is_empty() {
            warn!("add_task: refusing task with a blank title");
            return None;
        }
        let (_guard, mut db) = self.load_for_write("add_task")?;
        let id = match draft.id.as_deref() {
            Some(requested) if !requested.is_empty() && !db.contains(requested) => {
                requested.to_string()
            }
            _ => self.next_id(&db),
        };
        let task = Task::from_draft(id, draft, self.clock.now());
        db.tasks.push(task.clone());
        if let Err(e) = self.write_db(&db) {
            error!("error adding task: {e}");
            return None;
        }
        debug!(id = %task.id, title = %task.title, "task added");
        self.notify();
        Some(task)
    }

    /// Merge `patch` into task `id`. Returns the updated task, or `None` when
    /// the id is unknown or the write failed.
    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> Option<Task> {
        let (_guard, mut db) = self.load_for_write("update_task")?;
        let now = self.clock.now();
        let updated = {
            let task = db.get_mut(id)?;
            task.apply(patch, now);
            task.clone()
        };
        if let Err(e) = self.write_db(&db) {
            error!("error updating task {id}: {e}");
            return None;
        }
        debug!(id, "task updated");
        self.notify();
        Some(updated)
    }

    /// Remove task `id`. Deleting a missing id succeeds without changing anything.
    pub fn delete_task(&mut self, id: &str) -> bool {
        let Some((_guard, mut db)) = self.load_for_write("delete_task") else {
            return false;
        };
        let before = db.tasks.len();
        db.tasks.retain(|t| t.id != id);
        if db.tasks.len() == before {
            debug!(id, "delete_task: no such task");
            return true;
        }
        if let Err(e) = self.write_db(&db) {
            error!("error deleting task {id}: {e}");
            return false;
        }
        self.notify();
        true
    }

    /// Tasks matching every supplied filter field, as a fresh vector.
    pub fn query_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        let mut tasks: Vec<Task> =
            self.all_tasks().into_iter().filter(|t| filter.matches(t)).collect();
        if filter.sort_by_priority {
            tasks.sort_by(|a, b| b.priority.rank().cmp(&a.priority.rank()));
        }
        tasks
    }

    /// Tasks that are not completed.
    pub fn incomplete_tasks(&self) -> Vec<Task> {
        self.all_tasks()
            .into_iter()
            .filter(|t| t.status != Status::Completed)
            .collect()
    }

    /// Current settings; defaults when the record is missing or unreadable.
    pub fn get_settings(&self) -> Settings {
        match self.backend.get(SETTINGS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    error!("error parsing settings, using defaults: {e}");
                    Settings::default()
                }
            },
            Ok(None) => Settings::default(),
            Err(e) => {
                error!("error reading settings, using defaults: {e}");
                Settings::default()
            }
        }
    }

    /// Shallow-merge `patch` into the settings and persist them.
    pub fn update_settings(&mut self, patch: SettingsPatch) -> Option<Settings> {
        let _guard = match self.backend.write_guard() {
            Ok(guard) => guard,
            Err(e) => {
                error!("update_settings: write skipped: {e}");
                return None;
            }
        };
        let mut settings = self.get_settings();
        settings.merge(patch);
        if let Err(e) = self.write_settings(&settings) {
            error!("error updating settings: {e}");
            return None;
        }
        self.notify();
        Some(settings)
    }

    /// Copy every recurring task one calendar month ahead, at most once per
    /// calendar month. Returns the number of tasks created.
    pub fn renew_monthly_recurring(&mut self) -> usize {
        let now = self.clock.now();
        let current_month = month_key(now.date());
        let Some((_guard, mut db)) = self.load_for_write("renew_monthly_recurring") else {
            return 0;
        };
        if self.marker(RENEWAL_MARKER).as_deref() == Some(current_month.as_str()) {
            debug!(month = %current_month, "monthly renewal already done");
            return 0;
        }

        let recurring: Vec<Task> = db.tasks.iter().filter(|t| t.recurring).cloned().collect();
        let mut created = 0usize;
        for source in recurring {
            let Some(next_date) = source.date().and_then(|d| d.checked_add_months(Months::new(1)))
            else {
                warn!(id = %source.id, due_date = %source.due_date, "skipping recurring task with invalid date");
                continue;
            };
            let mut renewed = source.clone();
            renewed.id = self.next_id(&db);
            renewed.due_date = next_date.format("%Y-%m-%d").to_string();
            renewed.status = Status::Pending;
            renewed.completed_at = None;
            renewed.created_at = now;
            renewed.updated_at = now;
            db.tasks.push(renewed);
            created += 1;
        }

        if created > 0 {
            if let Err(e) = self.write_db(&db) {
                error!("error auto-renewing monthly tasks: {e}");
                return 0;
            }
        }
        if !self.set_marker(RENEWAL_MARKER, &current_month) {
            warn!("monthly renewal marker not saved; renewal may repeat");
        }
        info!(created, month = %current_month, "monthly recurring tasks renewed");
        if created > 0 {
            self.notify();
        }
        created
    }

    /// Read a run marker.
    pub fn marker(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value.map(|v| v.trim().trim_matches('"').to_string()),
            Err(e) => {
                error!("cannot read marker {key}: {e}");
                None
            }
        }
    }

    /// Persist a run marker. Returns `false` on write failure.
    pub fn set_marker(&mut self, key: &str, value: &str) -> bool {
        let encoded = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                error!("cannot encode marker {key}: {e}");
                return false;
            }
        };
        match self.backend.set(key, &encoded) {
            Ok(()) => true,
            Err(e) => {
                error!("cannot write marker {key}: {e}");
                false
            }
        }
    }

    /// Raw record access for backup snapshots.
    pub fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.backend.get(key)
    }

    pub fn put_raw(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.backend.set(key, value)
    }

    pub fn remove_raw(&mut self, key: &str) -> Result<(), StoreError> {
        self.backend.remove(key)
    }

    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.backend.keys()
    }

    /// Subscribe to change notifications. Listeners run while the store is
    /// borrowed, so they must not call back into it.
    pub fn on_change(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    /// Tell every listener that state may have changed.
    pub fn notify(&self) {
        for listener in &self.listeners {
            listener();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FileBackend;
    use crate::clock::FixedClock;
    use chrono::NaiveDateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    fn make_store() -> (TaskStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(at(2026, 10, 16, 8, 0)));
        (TaskStore::in_memory(clock.clone()), clock)
    }

    fn draft(title: &str, category: Category, priority: Priority, date: &str) -> TaskDraft {
        TaskDraft {
            category: Some(category),
            priority: Some(priority),
            due_date: Some(date.into()),
            ..TaskDraft::new(title)
        }
    }

    /// Backend whose writes always fail after construction.
    struct BrokenBackend {
        inner: MemoryBackend,
        fail_writes: bool,
    }

    impl KvBackend for BrokenBackend {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }
        fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::Unavailable("disk full".into()));
            }
            self.inner.set(key, value)
        }
        fn remove(&mut self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
        fn keys(&self) -> Result<Vec<String>, StoreError> {
            self.inner.keys()
        }
    }

    #[test]
    fn add_task_fills_defaults_and_assigns_unique_ids() {
        let (mut store, _) = make_store();
        let a = store.add_task(TaskDraft::new("First")).unwrap();
        let b = store.add_task(TaskDraft::new("Second")).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.due_date, "2026-10-16");
        assert_eq!(a.due_time, "09:00");
        assert_eq!(a.priority, Priority::Medium);
        assert_eq!(a.created_at, at(2026, 10, 16, 8, 0));
        assert_eq!(store.all_tasks().len(), 2);
    }

    #[test]
    fn requested_id_is_kept_only_when_free() {
        let (mut store, _) = make_store();
        let first = store.add_task(TaskDraft { id: Some("feb-1".into()), ..TaskDraft::new("A") });
        assert_eq!(first.unwrap().id, "feb-1");
        let second = store
            .add_task(TaskDraft { id: Some("feb-1".into()), ..TaskDraft::new("B") })
            .unwrap();
        assert_ne!(second.id, "feb-1");
    }

    #[test]
    fn blank_title_is_not_stored() {
        let (mut store, _) = make_store();
        assert!(store.add_task(TaskDraft::new("   ")).is_none());
        assert!(store.all_tasks().is_empty());
    }

    #[test]
    fn update_merges_patch_and_reports_missing_ids() {
        let (mut store, clock) = make_store();
        let task = store.add_task(TaskDraft::new("Review")).unwrap();
        clock.advance(chrono::Duration::minutes(5));
        let updated = store
            .update_task(&task.id, TaskPatch { status: Some(Status::InProgress), ..TaskPatch::default() })
            .unwrap();
        assert_eq!(updated.status, Status::InProgress);
        assert_eq!(updated.title, "Review");
        assert_eq!(updated.updated_at, at(2026, 10, 16, 8, 5));
        assert_eq!(store.get_task(&task.id).unwrap().status, Status::InProgress);
        assert!(store.update_task("missing", TaskPatch::default()).is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let (mut store, _) = make_store();
        let task = store.add_task(TaskDraft::new("Temp")).unwrap();
        assert!(store.delete_task(&task.id));
        assert!(store.delete_task(&task.id));
        assert!(store.all_tasks().is_empty());
    }

    #[test]
    fn query_uses_and_semantics_and_priority_sort() {
        let (mut store, _) = make_store();
        store.add_task(draft("low", Category::Support, Priority::Low, "2026-10-16"));
        store.add_task(draft("high", Category::Support, Priority::High, "2026-10-16"));
        store.add_task(draft("other-day", Category::Support, Priority::High, "2026-10-17"));
        store.add_task(draft("other-cat", Category::Academy, Priority::High, "2026-10-16"));
        store.add_task(draft("medium", Category::Support, Priority::Medium, "2026-10-16"));

        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let filter = TaskFilter::default().category(Category::Support).on(today).by_priority();
        let titles: Vec<String> = store.query_tasks(&filter).into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["high", "medium", "low"]);

        let pending = store.query_tasks(&TaskFilter::default().status(Status::Completed));
        assert!(pending.is_empty());
    }

    #[test]
    fn settings_are_created_and_shallow_merged() {
        let (mut store, _) = make_store();
        assert_eq!(store.get_settings(), Settings::default());
        let updated = store
            .update_settings(SettingsPatch { theme: Some("light".into()), ..SettingsPatch::default() })
            .unwrap();
        assert_eq!(updated.theme, "light");
        assert_eq!(store.get_settings().theme, "light");
        assert!(store.get_settings().automation.auto_complete_past_days);
    }

    #[test]
    fn monthly_renewal_runs_once_per_month() {
        let (mut store, clock) = make_store();
        store.add_task(TaskDraft { recurring: true, due_date: Some("2026-10-05".into()), ..TaskDraft::new("Rent") });
        store.add_task(TaskDraft::new("One-off"));

        assert_eq!(store.renew_monthly_recurring(), 1);
        assert_eq!(store.renew_monthly_recurring(), 0);
        let tasks = store.all_tasks();
        assert_eq!(tasks.len(), 3);
        let renewed = &tasks[2];
        assert_eq!(renewed.due_date, "2026-11-05");
        assert_eq!(renewed.status, Status::Pending);
        assert!(renewed.completed_at.is_none());
        assert_eq!(store.marker(RENEWAL_MARKER).as_deref(), Some("2026-10"));

        clock.set(at(2026, 11, 1, 7, 0));
        let recurring_before = store.all_tasks().iter().filter(|t| t.recurring).count();
        assert_eq!(store.renew_monthly_recurring(), recurring_before);
        assert_eq!(store.all_tasks().len(), 3 + recurring_before);
    }

    #[test]
    fn renewal_resets_completed_copies_and_clamps_month_end() {
        let (mut store, _) = make_store();
        let task = store
            .add_task(TaskDraft { recurring: true, due_date: Some("2026-01-31".into()), ..TaskDraft::new("Report") })
            .unwrap();
        store.update_task(&task.id, TaskPatch::complete(at(2026, 1, 31, 10, 0)));
        store.renew_monthly_recurring();
        let renewed = store.all_tasks().pop().unwrap();
        assert_eq!(renewed.due_date, "2026-02-28");
        assert_eq!(renewed.status, Status::Pending);
        assert!(renewed.completed_at.is_none());
        assert!(renewed.recurring);
    }

    #[test]
    fn corrupt_record_degrades_and_is_never_overwritten() {
        let clock = Arc::new(FixedClock::new(at(2026, 10, 16, 8, 0)));
        let mut backend = MemoryBackend::new();
        backend.set(TASKS_KEY, "{not json").unwrap();
        let mut store = TaskStore::open(Box::new(backend), clock);

        assert!(store.all_tasks().is_empty());
        assert!(store.add_task(TaskDraft::new("Lost")).is_none());
        assert!(!store.delete_task("x"));
        assert_eq!(store.get_raw(TASKS_KEY).unwrap().as_deref(), Some("{not json"));
    }

    /// One readable overdue task, one with an unknown category and one that
    /// only has the bare minimum of fields.
    const MIXED_RECORD: &str = r#"{"tasks":[
        {"id":"100","title":"Overdue report","category":"company","priority":"high",
         "dueDate":"2026-10-14","dueTime":"10:00","duration":2,"status":"pending",
         "createdAt":"2026-10-01T08:00:00.000Z","updatedAt":"2026-10-01T08:00:00.000Z"},
        {"id":"200","title":"Weeding","category":"gardening","priority":"low",
         "dueDate":"2026-10-14","dueTime":"07:00","duration":1,"status":"pending"},
        {"id":"300","title":"Bare","category":"support","dueDate":"2026-10-14","status":"pending"}
    ],"version":1,"createdAt":"2026-01-01T00:00:00.000Z"}"#;

    #[test]
    fn one_bad_entry_does_not_hide_the_others() {
        let clock = Arc::new(FixedClock::new(at(2026, 10, 16, 8, 0)));
        let mut backend = MemoryBackend::new();
        backend.set(TASKS_KEY, MIXED_RECORD).unwrap();
        let mut store = TaskStore::open(Box::new(backend), clock);

        let tasks = store.all_tasks();
        assert_eq!(tasks.len(), 2);
        let bare = store.get_task("300").unwrap();
        assert_eq!(bare.priority, Priority::Medium);
        assert_eq!(bare.due_time, "09:00");
        assert_eq!(bare.duration, 1.0);

        // Writes still go through and carry the unreadable entry along.
        let added = store.add_task(TaskDraft::new("After")).unwrap();
        assert_ne!(added.id, "200");
        assert!(store.update_task("100", TaskPatch::complete(at(2026, 10, 16, 8, 0))).is_some());

        let raw: serde_json::Value =
            serde_json::from_str(&store.get_raw(TASKS_KEY).unwrap().unwrap()).unwrap();
        let entries = raw["tasks"].as_array().unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries
            .iter()
            .any(|e| e["id"] == "200" && e["category"] == "gardening" && e.get("createdAt").is_none()));
        assert_eq!(store.all_tasks().len(), 3);
    }

    #[test]
    fn failed_write_leaves_state_unchanged() {
        let clock = Arc::new(FixedClock::new(at(2026, 10, 16, 8, 0)));
        let backend = BrokenBackend { inner: MemoryBackend::new(), fail_writes: false };
        let mut store = TaskStore::open(Box::new(backend), clock.clone());
        let kept = store.add_task(TaskDraft::new("Kept")).unwrap();

        // Swap in a failing backend carrying the same data.
        let raw = store.get_raw(TASKS_KEY).unwrap().unwrap();
        let mut inner = MemoryBackend::new();
        inner.set(TASKS_KEY, &raw).unwrap();
        let mut store = TaskStore::open(Box::new(BrokenBackend { inner, fail_writes: true }), clock);

        assert!(store.add_task(TaskDraft::new("Dropped")).is_none());
        assert!(store.update_task(&kept.id, TaskPatch::complete(at(2026, 10, 16, 9, 0))).is_none());
        let tasks = store.all_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, Status::Pending);
    }

    #[test]
    fn listeners_fire_once_per_successful_mutation() {
        let (mut store, _) = make_store();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        store.on_change(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let task = store.add_task(TaskDraft::new("Ping")).unwrap();
        store.update_task(&task.id, TaskPatch::default());
        store.update_task("missing", TaskPatch::default());
        store.delete_task("missing");
        store.delete_task(&task.id);
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock::new(at(2026, 10, 16, 8, 0)));
        let id = {
            let mut store = TaskStore::open(Box::new(FileBackend::open(dir.path()).unwrap()), clock.clone());
            store.add_task(TaskDraft::new("Durable")).unwrap().id
        };
        let store = TaskStore::open(Box::new(FileBackend::open(dir.path()).unwrap()), clock);
        assert_eq!(store.get_task(&id).unwrap().title, "Durable");
    }

    #[test]
    fn stores_sharing_a_directory_take_turns() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock::new(at(2026, 10, 16, 8, 0)));
        let open = || {
            let backend = FileBackend::open(dir.path())
                .unwrap()
                .with_lock_timeout(std::time::Duration::from_millis(30));
            TaskStore::open(Box::new(backend), clock.clone())
        };
        let mut runner = open();
        let mut cli = open();

        let held = FileBackend::open(dir.path()).unwrap().write_guard().unwrap();
        assert!(cli.add_task(TaskDraft::new("Blocked")).is_none());
        assert!(cli.update_settings(SettingsPatch::default()).is_none());
        drop(held);

        let a = runner.add_task(TaskDraft::new("From run")).unwrap();
        let b = cli.add_task(TaskDraft::new("From cli")).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(runner.all_tasks().len(), 2);
        assert!(runner.update_task(&b.id, TaskPatch::complete(at(2026, 10, 16, 9, 0))).is_some());
        assert_eq!(cli.get_task(&b.id).unwrap().status, Status::Completed);
    }
}
