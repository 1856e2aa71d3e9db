//! Date-range views over tasks: upcoming busy days, per-day counts and a
//! month overview.

use std::collections::BTreeMap;

use chrono::{Datelike, Month, Months, NaiveDate};
use serde::Serialize;

use crate::analytics::completion_rate;
use crate::db::add_days;
use crate::fields::*;
use crate::task::Task;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub total: usize,
    pub completed: usize,
    /// Tasks not yet completed.
    pub pending: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingDay {
    pub date: NaiveDate,
    pub tasks: Vec<Task>,
    pub has_high_priority: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthOverview {
    pub year: i32,
    pub month: u32,
    pub month_name: &'static str,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completion_rate: u32,
}

pub fn day_count(tasks: &[Task], date: NaiveDate) -> DayCount {
    tasks.iter().filter(|t| t.is_due_on(date)).fold(DayCount::default(), |mut count, t| {
        count.total += 1;
        if t.status == Status::Completed {
            count.completed += 1;
        } else {
            count.pending += 1;
        }
        count
    })
}

/// The next `days` days starting today that have at least one task. A range
/// running past the last representable date is open-ended.
pub fn upcoming_days(tasks: &[Task], today: NaiveDate, days: u32) -> Vec<UpcomingDay> {
    let end = add_days(today, i64::from(days));
    let mut by_day: BTreeMap<NaiveDate, Vec<Task>> = BTreeMap::new();
    for task in tasks {
        let Some(date) = task.date() else { continue };
        if date >= today && end.map_or(true, |end| date < end) {
            by_day.entry(date).or_default().push(task.clone());
        }
    }
    by_day
        .into_iter()
        .map(|(date, on_day)| {
            let has_high_priority = on_day.iter().any(|t| t.priority == Priority::High);
            UpcomingDay { date, tasks: on_day, has_high_priority }
        })
        .collect()
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Every day of the month with its counts.
pub fn month_days(tasks: &[Task], year: i32, month: u32) -> Vec<(NaiveDate, DayCount)> {
    let Some(first) = first_of_month(year, month) else {
        return Vec::new();
    };
    let Some(next) = first.checked_add_months(Months::new(1)) else {
        return Vec::new();
    };
    first
        .iter_days()
        .take_while(|d| *d < next)
        .map(|d| (d, day_count(tasks, d)))
        .collect()
}

/// Monday-to-Sunday week containing `date`.
pub fn week_days(tasks: &[Task], date: NaiveDate) -> Vec<(NaiveDate, DayCount)> {
    let Some(monday) = add_days(date, -i64::from(date.weekday().num_days_from_monday())) else {
        return Vec::new();
    };
    (0..7)
        .filter_map(|i| add_days(monday, i))
        .map(|d| (d, day_count(tasks, d)))
        .collect()
}

pub fn month_overview(tasks: &[Task], year: i32, month: u32) -> Option<MonthOverview> {
    let month_name = Month::try_from(u8::try_from(month).ok()?).ok()?.name();
    first_of_month(year, month)?;
    let (total, completed) = month_days(tasks, year, month)
        .iter()
        .fold((0, 0), |(t, c), (_, count)| (t + count.total, c + count.completed));
    Some(MonthOverview {
        year,
        month,
        month_name,
        total_tasks: total,
        completed_tasks: completed,
        completion_rate: completion_rate(completed, total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDraft;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(date: &str, priority: Priority, status: Status) -> Task {
        let draft = TaskDraft {
            due_date: Some(date.into()),
            priority: Some(priority),
            status: Some(status),
            ..TaskDraft::new("t")
        };
        Task::from_draft(date.into(), draft, day(2026, 10, 16).and_hms_opt(8, 0, 0).unwrap())
    }

    #[test]
    fn upcoming_days_only_lists_busy_days() {
        let tasks = vec![
            task("2026-10-16", Priority::Low, Status::Pending),
            task("2026-10-18", Priority::High, Status::Pending),
            task("2026-10-30", Priority::High, Status::Pending),
        ];
        let upcoming = upcoming_days(&tasks, day(2026, 10, 16), 7);
        assert_eq!(upcoming.len(), 2);
        assert!(!upcoming[0].has_high_priority);
        assert_eq!(upcoming[1].date, day(2026, 10, 18));
        assert!(upcoming[1].has_high_priority);
    }

    #[test]
    fn huge_ranges_do_not_overflow() {
        let tasks = vec![
            task("2026-10-30", Priority::High, Status::Pending),
            task("2026-10-16", Priority::Low, Status::Pending),
            task("2026-10-01", Priority::Low, Status::Pending),
        ];
        let upcoming = upcoming_days(&tasks, day(2026, 10, 16), u32::MAX);
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].date, day(2026, 10, 16));
        assert_eq!(upcoming[1].date, day(2026, 10, 30));

        let near_end = upcoming_days(&tasks, NaiveDate::MAX, u32::MAX);
        assert!(near_end.is_empty());
        assert!(upcoming_days(&tasks, day(2026, 10, 16), 0).is_empty());
        let last_week = week_days(&tasks, NaiveDate::MAX);
        assert!((1..=7).contains(&last_week.len()));
        assert_eq!(last_week.last().unwrap().0, NaiveDate::MAX);
    }

    #[test]
    fn month_overview_counts_only_that_month() {
        let tasks = vec![
            task("2026-02-01", Priority::Low, Status::Completed),
            task("2026-02-28", Priority::Low, Status::Pending),
            task("2026-03-01", Priority::Low, Status::Completed),
        ];
        let overview = month_overview(&tasks, 2026, 2).unwrap();
        assert_eq!(overview.month_name, "February");
        assert_eq!(overview.total_tasks, 2);
        assert_eq!(overview.completed_tasks, 1);
        assert_eq!(overview.completion_rate, 50);
        assert_eq!(month_days(&tasks, 2026, 2).len(), 28);
        assert!(month_overview(&tasks, 2026, 13).is_none());
    }

    #[test]
    fn week_starts_on_monday() {
        let week = week_days(&[], day(2026, 10, 16));
        assert_eq!(week[0].0, day(2026, 10, 12));
        assert_eq!(week[6].0, day(2026, 10, 18));
    }
}
