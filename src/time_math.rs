//! Time-of-day arithmetic and conflict detection.
//!
//! Tasks occupy half-open minute intervals `[start, start + duration * 60)` on
//! their day, so two tasks that merely touch do not conflict. A task whose time
//! cannot be parsed never overlaps anything.

use chrono::Timelike;
use serde::Serialize;

use crate::task::{parse_time, Task};

/// Two tasks whose time windows overlap.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub task1: String,
    pub task2: String,
    pub message: String,
}

/// Minutes since midnight for an `HH:MM` time.
pub fn time_to_minutes(time: &str) -> Option<u32> {
    let t = parse_time(time)?;
    Some(t.hour() * 60 + t.minute())
}

/// The task's minute window on its day, `None` when its time is malformed.
pub fn minute_window(task: &Task) -> Option<(f64, f64)> {
    let start = f64::from(time_to_minutes(&task.due_time)?);
    let duration = if task.duration.is_finite() { task.duration.max(0.0) } else { 0.0 };
    Some((start, start + duration * 60.0))
}

/// Minutes of `[start, end)` covered by `[range_start, range_end)`.
pub fn overlap_minutes(window: (f64, f64), range: (f64, f64)) -> f64 {
    let lo = window.0.max(range.0);
    let hi = window.1.min(range.1);
    if lo < hi {
        hi - lo
    } else {
        0.0
    }
}

/// Whether the two tasks' windows share a non-zero stretch of time.
pub fn tasks_overlap(a: &Task, b: &Task) -> bool {
    match (minute_window(a), minute_window(b)) {
        (Some(wa), Some(wb)) => wa.0 < wb.1 && wa.1 > wb.0,
        _ => false,
    }
}

/// Every overlapping pair, ordered by first index then second.
pub fn find_conflicts(tasks: &[Task]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for (i, a) in tasks.iter().enumerate() {
        for b in &tasks[i + 1..] {
            if tasks_overlap(a, b) {
                conflicts.push(Conflict {
                    task1: a.id.clone(),
                    task2: b.id.clone(),
                    message: format!("Conflict: {} and {}", a.title, b.title),
                });
            }
        }
    }
    conflicts
}
