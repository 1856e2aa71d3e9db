//! Timestamped snapshots of the tasks and settings.
//!
//! Snapshots live beside the other records as `auto_backup_<millis>` keys.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::settings::Settings;
use crate::store::TaskStore;
use crate::task::Task;

pub const SNAPSHOT_PREFIX: &str = "auto_backup_";
pub const SNAPSHOT_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub settings: Settings,
    pub timestamp: NaiveDateTime,
}

/// Millisecond stamp encoded in a snapshot key.
pub fn snapshot_millis(key: &str) -> Option<i64> {
    key.strip_prefix(SNAPSHOT_PREFIX)?.parse().ok()
}

/// Write a snapshot of the current tasks and settings. Returns its key.
///
/// An unreadable task record is reported instead of snapshotting empty data.
pub fn snapshot(store: &mut TaskStore) -> Result<String, StoreError> {
    let db = store.load_database()?;
    let now = store.clock().now();
    let data = Snapshot {
        tasks: db.tasks,
        settings: store.get_settings(),
        timestamp: now,
    };
    let mut millis = now.and_utc().timestamp_millis();
    while store.get_raw(&format!("{SNAPSHOT_PREFIX}{millis}"))?.is_some() {
        millis += 1;
    }
    let key = format!("{SNAPSHOT_PREFIX}{millis}");
    store.put_raw(&key, &serde_json::to_string(&data)?)?;
    debug!(%key, tasks = data.tasks.len(), "snapshot written");
    Ok(key)
}

/// Snapshot keys with their stamps, oldest first.
pub fn list_snapshots(store: &TaskStore) -> Result<Vec<(i64, String)>, StoreError> {
    let mut snapshots: Vec<(i64, String)> = store
        .keys()?
        .into_iter()
        .filter_map(|key| snapshot_millis(&key).map(|millis| (millis, key)))
        .collect();
    snapshots.sort();
    Ok(snapshots)
}

pub fn load_snapshot(store: &TaskStore, key: &str) -> Result<Option<Snapshot>, StoreError> {
    match store.get_raw(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Remove snapshots older than `max_age`. Returns how many were removed.
pub fn prune_snapshots(store: &mut TaskStore, max_age: Duration) -> Result<usize, StoreError> {
    let cutoff = store.clock().now().and_utc().timestamp_millis() - max_age.num_milliseconds();
    let mut removed = 0;
    for (millis, key) in list_snapshots(store)? {
        if millis >= cutoff {
            continue;
        }
        match store.remove_raw(&key) {
            Ok(()) => removed += 1,
            Err(e) => warn!(%key, "cannot remove old snapshot: {e}"),
        }
    }
    if removed > 0 {
        info!(removed, "old snapshots pruned");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::TASKS_KEY;
    use crate::task::TaskDraft;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn snapshot_captures_tasks_and_settings() {
        let clock = Arc::new(FixedClock::new(at(16, 9)));
        let mut store = TaskStore::in_memory(clock);
        store.add_task(TaskDraft::new("Back me up"));

        let key = snapshot(&mut store).unwrap();
        assert_eq!(snapshot_millis(&key), Some(at(16, 9).and_utc().timestamp_millis()));
        let snap = load_snapshot(&store, &key).unwrap().unwrap();
        assert_eq!(snap.tasks.len(), 1);
        assert_eq!(snap.settings, Settings::default());

        let second = snapshot(&mut store).unwrap();
        assert_ne!(key, second);
    }

    #[test]
    fn prune_removes_only_expired_snapshots() {
        let clock = Arc::new(FixedClock::new(at(1, 9)));
        let mut store = TaskStore::in_memory(clock.clone());
        snapshot(&mut store).unwrap();
        clock.set(at(10, 9));
        let recent = snapshot(&mut store).unwrap();

        let removed = prune_snapshots(&mut store, Duration::days(SNAPSHOT_RETENTION_DAYS)).unwrap();
        assert_eq!(removed, 1);
        let left: Vec<String> = list_snapshots(&store).unwrap().into_iter().map(|(_, k)| k).collect();
        assert_eq!(left, vec![recent]);
        assert!(store.get_raw(TASKS_KEY).unwrap().is_some());
    }

    #[test]
    fn unreadable_store_is_not_snapshotted() {
        let clock = Arc::new(FixedClock::new(at(16, 9)));
        let mut store = TaskStore::in_memory(clock);
        store.put_raw(TASKS_KEY, "garbage").unwrap();
        assert!(snapshot(&mut store).is_err());
        assert!(list_snapshots(&store).unwrap().is_empty());
    }
}
