//! Task counts and time allocation.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::fields::*;
use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: Category,
    pub total: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// Tasks still in `pending`.
    pub pending_tasks: usize,
    pub today_tasks: usize,
    pub by_category: Vec<CategoryCount>,
    /// Rounded percentage, 0 when there are no tasks.
    pub completion_rate: u32,
}

pub fn completion_rate(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u32
}

pub fn analytics(tasks: &[Task], today: NaiveDate) -> Analytics {
    let completed = tasks.iter().filter(|t| t.status == Status::Completed).count();
    let by_category = Category::ALL
        .iter()
        .map(|&category| {
            let in_category = tasks.iter().filter(|t| t.category == category);
            let (total, completed) = in_category.fold((0, 0), |(n, c), t| {
                (n + 1, c + usize::from(t.status == Status::Completed))
            });
            CategoryCount { category, total, completed }
        })
        .collect();

    Analytics {
        total_tasks: tasks.len(),
        completed_tasks: completed,
        pending_tasks: tasks.iter().filter(|t| t.status == Status::Pending).count(),
        today_tasks: tasks.iter().filter(|t| t.is_due_on(today)).count(),
        by_category,
        completion_rate: completion_rate(completed, tasks.len()),
    }
}

/// Hours booked per category on `date`. Every category is present.
pub fn time_allocation(tasks: &[Task], date: NaiveDate) -> BTreeMap<Category, f64> {
    let mut allocation: BTreeMap<Category, f64> = Category::ALL.iter().map(|&c| (c, 0.0)).collect();
    for task in tasks.iter().filter(|t| t.is_due_on(date)) {
        if let Some(hours) = allocation.get_mut(&task.category) {
            *hours += task.duration;
        }
    }
    allocation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDraft;

    fn task(category: Category, date: &str, status: Status, duration: f64) -> Task {
        let now = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let draft = TaskDraft {
            category: Some(category),
            due_date: Some(date.into()),
            status: Some(status),
            duration: Some(duration),
            ..TaskDraft::new("t")
        };
        Task::from_draft(format!("{category:?}-{date}"), draft, now)
    }

    #[test]
    fn counts_and_rate() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let tasks = vec![
            task(Category::Academy, "2026-10-16", Status::Completed, 1.0),
            task(Category::Academy, "2026-10-15", Status::Pending, 1.0),
            task(Category::Support, "2026-10-16", Status::InProgress, 1.0),
        ];
        let stats = analytics(&tasks, today);
        assert_eq!(stats.total_tasks, 3);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.pending_tasks, 1);
        assert_eq!(stats.today_tasks, 2);
        assert_eq!(stats.completion_rate, 33);
        let academy = stats.by_category.iter().find(|c| c.category == Category::Academy).unwrap();
        assert_eq!((academy.total, academy.completed), (2, 1));
    }

    #[test]
    fn empty_rate_is_zero() {
        assert_eq!(completion_rate(0, 0), 0);
        assert_eq!(completion_rate(2, 3), 67);
    }

    #[test]
    fn allocation_sums_todays_hours() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let tasks = vec![
            task(Category::Freelance, "2026-10-16", Status::Pending, 2.5),
            task(Category::Freelance, "2026-10-16", Status::Completed, 1.0),
            task(Category::Project, "2026-10-17", Status::Pending, 4.0),
        ];
        let allocation = time_allocation(&tasks, today);
        assert_eq!(allocation[&Category::Freelance], 3.5);
        assert_eq!(allocation[&Category::Project], 0.0);
        assert_eq!(allocation.len(), Category::ALL.len());
    }
}
