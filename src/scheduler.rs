//! Smart scheduling over the task store.
//!
//! The scheduler never mutates the store. It builds today's recommended
//! schedule from a fixed template of category periods, raises advisory
//! recommendations, ranks tasks by a weighted priority score and reports how
//! much of each working range is still free.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::clock::Clock;
use crate::db::format_hours;
use crate::fields::*;
use crate::store::{SharedStore, TaskFilter};
use crate::task::Task;
use crate::time_math::{find_conflicts, minute_window, overlap_minutes, time_to_minutes, Conflict};

/// Evening hours available for freelance work.
pub const FREELANCE_CAPACITY_HOURS: f64 = 5.0;

/// One slot of the daily template. Tasks are assigned by category alone.
#[derive(Debug, Clone, Copy)]
pub struct PeriodTemplate {
    pub name: &'static str,
    pub category: Category,
    pub start_time: &'static str,
    pub end_time: &'static str,
    /// `None` for flexible periods.
    pub duration_hours: Option<f64>,
    pub max_tasks: Option<usize>,
}

pub const DAILY_TEMPLATE: [PeriodTemplate; 5] = [
    PeriodTemplate {
        name: "Company work",
        category: Category::Company,
        start_time: "09:00",
        end_time: "14:00",
        duration_hours: Some(5.0),
        max_tasks: None,
    },
    PeriodTemplate {
        name: "Academy",
        category: Category::Academy,
        start_time: "06:00",
        end_time: "09:00",
        duration_hours: Some(3.0),
        max_tasks: None,
    },
    PeriodTemplate {
        name: "Customer support",
        category: Category::Support,
        start_time: "15:00",
        end_time: "16:00",
        duration_hours: None,
        max_tasks: Some(2),
    },
    PeriodTemplate {
        name: "Side projects",
        category: Category::Project,
        start_time: "17:00",
        end_time: "18:30",
        duration_hours: None,
        max_tasks: Some(2),
    },
    PeriodTemplate {
        name: "Freelance",
        category: Category::Freelance,
        start_time: "20:00",
        end_time: "23:00",
        duration_hours: Some(FREELANCE_CAPACITY_HOURS),
        max_tasks: None,
    },
];

/// Working ranges measured by [`Scheduler::available_slots`]: (start hour, end hour, name).
pub const SLOT_RANGES: [(u32, u32, &str); 4] = [
    (9, 13, "Teaching (9-1)"),
    (15, 17, "Afternoon"),
    (17, 20, "Projects"),
    (20, 23, "Freelance"),
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub name: String,
    pub category: Category,
    pub start_time: String,
    pub end_time: String,
    pub duration_hours: Option<f64>,
    pub max_tasks: Option<usize>,
    pub tasks: Vec<Task>,
}

impl Period {
    pub fn total_hours(&self) -> f64 {
        self.tasks.iter().map(|t| t.duration).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Warning,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendedSchedule {
    pub date: NaiveDate,
    pub periods: Vec<Period>,
    pub conflicts: Vec<Conflict>,
    pub recommendations: Vec<Recommendation>,
}

impl RecommendedSchedule {
    pub fn period(&self, category: Category) -> Option<&Period> {
        self.periods.iter().find(|p| p.category == category)
    }

    pub fn task_count(&self) -> usize {
        self.periods.iter().map(|p| p.tasks.len()).sum()
    }
}

/// Remaining capacity of one working range.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub name: String,
    pub start_hour: u32,
    pub end_hour: u32,
    pub occupied_minutes: f64,
    pub available_minutes: f64,
    pub percentage: u32,
}

impl Slot {
    pub fn available_hours(&self) -> f64 {
        self.available_minutes / 60.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TodayHighPriority,
    Overdue,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportantEvent {
    pub kind: EventKind,
    pub tasks: Vec<Task>,
}

impl ImportantEvent {
    pub fn count(&self) -> usize {
        self.tasks.len()
    }
}

/// Suggested start time for a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingSuggestion {
    pub time: &'static str,
    pub reason: &'static str,
}

/// Stable sort: priority descending, then time of day ascending.
/// Tasks with a malformed time sort after well-formed ones of the same priority.
pub fn optimize_schedule(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| {
        b.priority.rank().cmp(&a.priority.rank()).then_with(|| {
            let ta = time_to_minutes(&a.due_time).unwrap_or(u32::MAX);
            let tb = time_to_minutes(&b.due_time).unwrap_or(u32::MAX);
            ta.cmp(&tb)
        })
    });
    tasks
}

/// Advisory rules, evaluated in fixed order, at most one entry per rule.
pub fn generate_recommendations(schedule: &RecommendedSchedule) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    let freelance_hours = schedule.period(Category::Freelance).map(Period::total_hours).unwrap_or(0.0);
    if freelance_hours > FREELANCE_CAPACITY_HOURS {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Warning,
            message: format!(
                "Freelance tasks need {} but only {} are available ({} over)",
                format_hours(freelance_hours),
                format_hours(FREELANCE_CAPACITY_HOURS),
                format_hours(freelance_hours - FREELANCE_CAPACITY_HOURS)
            ),
            action: "Split the freelance tasks across several days".into(),
        });
    }

    if !schedule.conflicts.is_empty() {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Error,
            message: format!("There are {} conflict(s) in the schedule", schedule.conflicts.len()),
            action: "Reschedule the conflicting tasks".into(),
        });
    }

    let academy_empty = schedule
        .period(Category::Academy)
        .map(|p| p.tasks.is_empty())
        .unwrap_or(true);
    if academy_empty {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Info,
            message: "No academy tasks are booked before company hours".into(),
            action: "Add academy preparation tasks if needed".into(),
        });
    }

    recommendations
}

/// Bonus for tasks due soon. Past-due tasks count as due within the hour.
pub fn urgency_bonus(hours_until_due: Option<f64>) -> u32 {
    match hours_until_due {
        Some(h) if h < 1.0 => 50,
        Some(h) if h < 4.0 => 30,
        Some(h) if h < 12.0 => 15,
        _ => 0,
    }
}

/// Priority base + urgency bonus + category weight. Used for ranking only.
pub fn priority_score(task: &Task, now: NaiveDateTime) -> u32 {
    let hours_until_due = task
        .start()
        .map(|start| (start - now).num_milliseconds() as f64 / 3_600_000.0);
    task.priority.score_weight() + urgency_bonus(hours_until_due) + task.category.score_weight()
}

/// Fixed suggested start for tasks of a category.
pub fn suggest_task_timing(category: Category) -> Option<TimingSuggestion> {
    match category {
        Category::Academy => Some(TimingSuggestion { time: "09:00", reason: "Core teaching hours (9-1)" }),
        Category::Project => Some(TimingSuggestion { time: "17:00", reason: "Afternoon side-project block" }),
        Category::Support => Some(TimingSuggestion { time: "15:00", reason: "Customer support after teaching" }),
        Category::Freelance => Some(TimingSuggestion { time: "20:00", reason: "Evening freelance block (5 hours)" }),
        Category::Company | Category::Other => None,
    }
}

pub struct Scheduler {
    store: SharedStore,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// All tasks of `date`, optimised.
    pub fn optimized_schedule(&self, date: NaiveDate) -> Vec<Task> {
        let tasks = self.store.lock().query_tasks(&TaskFilter::default().on(date));
        optimize_schedule(tasks)
    }

    /// Today's pending tasks laid into the fixed period template, with today's
    /// conflicts and the resulting recommendations.
    pub fn recommended_schedule(&self) -> RecommendedSchedule {
        let today = self.clock.today();
        let store = self.store.lock();

        let periods = DAILY_TEMPLATE
            .iter()
            .map(|tpl| {
                let filter = TaskFilter::default()
                    .category(tpl.category)
                    .on(today)
                    .status(Status::Pending);
                let mut tasks = store.query_tasks(&filter);
                if let Some(max) = tpl.max_tasks {
                    tasks.truncate(max);
                }
                Period {
                    name: tpl.name.to_string(),
                    category: tpl.category,
                    start_time: tpl.start_time.to_string(),
                    end_time: tpl.end_time.to_string(),
                    duration_hours: tpl.duration_hours,
                    max_tasks: tpl.max_tasks,
                    tasks,
                }
            })
            .collect();
        let conflicts = find_conflicts(&store.query_tasks(&TaskFilter::default().on(today)));
        drop(store);

        let mut schedule = RecommendedSchedule {
            date: today,
            periods,
            conflicts,
            recommendations: Vec::new(),
        };
        schedule.recommendations = generate_recommendations(&schedule);
        schedule
    }

    /// Conflicts among the tasks of `date`.
    pub fn conflicts_on(&self, date: NaiveDate) -> Vec<Conflict> {
        find_conflicts(&self.store.lock().query_tasks(&TaskFilter::default().on(date)))
    }

    pub fn calculate_priority_score(&self, task: &Task) -> u32 {
        priority_score(task, self.clock.now())
    }

    /// Open tasks ordered by priority score, highest first.
    pub fn ranked_tasks(&self) -> Vec<(u32, Task)> {
        let now = self.clock.now();
        let mut ranked: Vec<(u32, Task)> = self
            .store
            .lock()
            .all_tasks()
            .into_iter()
            .filter(|t| t.status.is_open())
            .map(|t| (priority_score(&t, now), t))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked
    }

    /// Free capacity of each working range on `date`.
    pub fn available_slots(&self, date: NaiveDate) -> Vec<Slot> {
        let tasks = self.store.lock().query_tasks(&TaskFilter::default().on(date));
        let windows: Vec<(f64, f64)> = tasks.iter().filter_map(minute_window).collect();

        SLOT_RANGES
            .iter()
            .map(|&(start, end, name)| {
                let range = (f64::from(start * 60), f64::from(end * 60));
                let total = range.1 - range.0;
                let occupied: f64 = windows.iter().map(|w| overlap_minutes(*w, range)).sum();
                let available = (total - occupied).max(0.0);
                Slot {
                    name: name.to_string(),
                    start_hour: start,
                    end_hour: end,
                    occupied_minutes: occupied,
                    available_minutes: available,
                    percentage: ((available / total) * 100.0).round() as u32,
                }
            })
            .collect()
    }

    /// Today's open high-priority tasks, else every overdue open task, else nothing.
    pub fn next_important_event(&self) -> Option<ImportantEvent> {
        let now = self.clock.now();
        let today = now.date();
        let tasks = self.store.lock().all_tasks();

        let high_today: Vec<Task> = tasks
            .iter()
            .filter(|t| t.is_due_on(today) && t.priority == Priority::High && t.status.is_open())
            .cloned()
            .collect();
        if !high_today.is_empty() {
            return Some(ImportantEvent { kind: EventKind::TodayHighPriority, tasks: high_today });
        }

        let overdue: Vec<Task> = tasks
            .into_iter()
            .filter(|t| t.status.is_open() && t.start().is_some_and(|s| s < now))
            .collect();
        if !overdue.is_empty() {
            return Some(ImportantEvent { kind: EventKind::Overdue, tasks: overdue });
        }
        None
    }

    /// First of today's pending tasks that starts now or later.
    pub fn next_task(&self) -> Option<Task> {
        let now = self.clock.now();
        let filter = TaskFilter::default().on(now.date()).status(Status::Pending);
        let mut tasks = self.store.lock().query_tasks(&filter);
        tasks.sort_by_key(|t| time_to_minutes(&t.due_time).unwrap_or(u32::MAX));
        tasks.into_iter().find(|t| t.time().is_some_and(|time| time >= now.time()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::TaskStore;
    use crate::task::{TaskDraft, TaskPatch};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    fn setup() -> (Scheduler, SharedStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(at(2026, 10, 16, 8, 0)));
        let store = TaskStore::in_memory(clock.clone()).into_shared();
        (Scheduler::new(store.clone(), clock.clone()), store, clock)
    }

    fn add(
        store: &SharedStore,
        title: &str,
        category: Category,
        priority: Priority,
        date: &str,
        time: &str,
        duration: f64,
    ) -> Task {
        store
            .lock()
            .add_task(TaskDraft {
                category: Some(category),
                priority: Some(priority),
                due_date: Some(date.into()),
                due_time: Some(time.into()),
                duration: Some(duration),
                ..TaskDraft::new(title)
            })
            .unwrap()
    }

    fn bare(priority: Priority, time: &str) -> Task {
        Task::from_draft(
            format!("{priority:?}-{time}"),
            TaskDraft { priority: Some(priority), due_time: Some(time.into()), ..TaskDraft::new("t") },
            at(2026, 10, 16, 8, 0),
        )
    }

    #[test]
    fn optimize_orders_by_priority_then_time() {
        let tasks = vec![
            bare(Priority::Low, "08:00"),
            bare(Priority::High, "15:00"),
            bare(Priority::Medium, "07:00"),
            bare(Priority::High, "09:00"),
        ];
        let ids: Vec<String> = optimize_schedule(tasks).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["High-09:00", "High-15:00", "Medium-07:00", "Low-08:00"]);
    }

    #[test]
    fn optimize_is_idempotent() {
        let tasks = vec![
            bare(Priority::Medium, "10:00"),
            bare(Priority::High, "12:00"),
            bare(Priority::Medium, "bogus"),
            bare(Priority::Medium, "09:00"),
        ];
        let once = optimize_schedule(tasks);
        let twice = optimize_schedule(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.last().unwrap().due_time, "bogus");
    }

    #[test]
    fn recommended_schedule_fills_fixed_periods() {
        let (scheduler, store, _) = setup();
        for i in 0..3 {
            add(&store, &format!("ticket {i}"), Category::Support, Priority::Medium, "2026-10-16", "15:00", 0.5);
        }
        add(&store, "standup", Category::Company, Priority::High, "2026-10-16", "09:00", 1.0);
        add(&store, "tomorrow", Category::Company, Priority::High, "2026-10-17", "09:00", 1.0);
        let done = add(&store, "done", Category::Company, Priority::Low, "2026-10-16", "12:00", 1.0);
        store.lock().update_task(&done.id, TaskPatch::complete(at(2026, 10, 16, 8, 0)));

        let schedule = scheduler.recommended_schedule();
        assert_eq!(schedule.periods.len(), 5);
        let categories: Vec<Category> = schedule.periods.iter().map(|p| p.category).collect();
        assert_eq!(
            categories,
            vec![Category::Company, Category::Academy, Category::Support, Category::Project, Category::Freelance]
        );
        assert_eq!(schedule.period(Category::Support).unwrap().tasks.len(), 2);
        let company = schedule.period(Category::Company).unwrap();
        assert_eq!(company.tasks.len(), 1);
        assert_eq!(company.tasks[0].title, "standup");
        // Three overlapping support tickets: (0,1), (0,2), (1,2).
        assert_eq!(schedule.conflicts.len(), 3);
    }

    #[test]
    fn recommendations_follow_rule_order() {
        let (scheduler, store, _) = setup();
        add(&store, "site", Category::Freelance, Priority::High, "2026-10-16", "20:00", 4.0);
        add(&store, "logo", Category::Freelance, Priority::Low, "2026-10-16", "21:00", 2.5);

        let schedule = scheduler.recommended_schedule();
        let kinds: Vec<RecommendationKind> = schedule.recommendations.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![RecommendationKind::Warning, RecommendationKind::Error, RecommendationKind::Info]
        );
        assert!(schedule.recommendations[0].message.contains("6.5h"));
        assert!(schedule.recommendations[0].message.contains("1.5h over"));
        assert!(schedule.recommendations[1].message.contains('1'));
    }

    #[test]
    fn academy_tasks_silence_the_info_rule() {
        let (scheduler, store, _) = setup();
        add(&store, "prep", Category::Academy, Priority::Medium, "2026-10-16", "06:30", 1.0);
        assert!(scheduler.recommended_schedule().recommendations.is_empty());
    }

    #[test]
    fn priority_score_matches_weight_table() {
        let now = at(2026, 10, 16, 8, 0);
        let urgent = Task::from_draft(
            "u".into(),
            TaskDraft {
                priority: Some(Priority::High),
                category: Some(Category::Support),
                due_date: Some("2026-10-16".into()),
                due_time: Some("08:30".into()),
                ..TaskDraft::new("urgent")
            },
            now,
        );
        let relaxed = Task::from_draft(
            "r".into(),
            TaskDraft {
                priority: Some(Priority::Low),
                category: Some(Category::Freelance),
                due_date: Some("2026-10-18".into()),
                due_time: Some("08:00".into()),
                ..TaskDraft::new("relaxed")
            },
            now,
        );
        assert_eq!(priority_score(&urgent, now), 110);
        assert_eq!(priority_score(&relaxed, now), 20);
        assert_eq!(priority_score(&urgent, now) - priority_score(&relaxed, now), 90);
    }

    #[test]
    fn urgency_bands() {
        assert_eq!(urgency_bonus(Some(-3.0)), 50);
        assert_eq!(urgency_bonus(Some(3.9)), 30);
        assert_eq!(urgency_bonus(Some(11.0)), 15);
        assert_eq!(urgency_bonus(Some(12.0)), 0);
        assert_eq!(urgency_bonus(None), 0);
    }

    #[test]
    fn available_slots_subtract_overlapping_minutes() {
        let (scheduler, store, _) = setup();
        add(&store, "class", Category::Academy, Priority::Medium, "2026-10-16", "08:00", 2.0);
        add(&store, "gig", Category::Freelance, Priority::Medium, "2026-10-16", "19:30", 1.0);
        add(&store, "broken", Category::Freelance, Priority::Medium, "2026-10-16", "xx", 1.0);

        let slots = scheduler.available_slots(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0].occupied_minutes, 60.0);
        assert_eq!(slots[0].available_minutes, 180.0);
        assert_eq!(slots[0].percentage, 75);
        assert_eq!(slots[1].percentage, 100);
        assert_eq!(slots[2].available_minutes, 150.0);
        assert_eq!(slots[3].available_minutes, 150.0);
        assert_eq!(slots[3].percentage, 83);
        assert_eq!(slots[3].available_hours(), 2.5);
    }

    #[test]
    fn next_event_prefers_today_high_priority() {
        let (scheduler, store, _) = setup();
        add(&store, "late", Category::Other, Priority::Low, "2026-10-15", "10:00", 1.0);
        assert_eq!(scheduler.next_important_event().unwrap().kind, EventKind::Overdue);

        add(&store, "big", Category::Company, Priority::High, "2026-10-16", "11:00", 1.0);
        let event = scheduler.next_important_event().unwrap();
        assert_eq!(event.kind, EventKind::TodayHighPriority);
        assert_eq!(event.count(), 1);
    }

    #[test]
    fn next_event_is_none_when_nothing_is_pressing() {
        let (scheduler, store, _) = setup();
        add(&store, "later", Category::Other, Priority::Medium, "2026-10-20", "10:00", 1.0);
        assert!(scheduler.next_important_event().is_none());
    }

    #[test]
    fn next_task_skips_earlier_starts() {
        let (scheduler, store, clock) = setup();
        add(&store, "early", Category::Other, Priority::Medium, "2026-10-16", "07:00", 1.0);
        add(&store, "late", Category::Other, Priority::Medium, "2026-10-16", "18:00", 1.0);
        add(&store, "soon", Category::Other, Priority::Medium, "2026-10-16", "09:00", 1.0);
        assert_eq!(scheduler.next_task().unwrap().title, "soon");
        clock.set(at(2026, 10, 16, 19, 0));
        assert!(scheduler.next_task().is_none());
    }

    #[test]
    fn ranked_tasks_put_highest_score_first() {
        let (scheduler, store, _) = setup();
        add(&store, "low", Category::Freelance, Priority::Low, "2026-10-20", "10:00", 1.0);
        add(&store, "hot", Category::Support, Priority::High, "2026-10-16", "08:30", 1.0);
        let ranked = scheduler.ranked_tasks();
        assert_eq!(ranked[0].1.title, "hot");
        assert_eq!(ranked[0].0, 110);
    }

    #[test]
    fn timing_suggestions_per_category() {
        assert_eq!(suggest_task_timing(Category::Freelance).unwrap().time, "20:00");
        assert!(suggest_task_timing(Category::Company).is_none());
    }
}
