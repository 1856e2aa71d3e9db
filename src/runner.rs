//! Background timers for `dayplan run`.
//!
//! Each rule gets its own tokio task driven by an interval. All loops share
//! one cancellation token. A rule body that panics is logged and the loop
//! keeps ticking.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::automation::{AutomationEngine, RuleOutcome, Trigger};
use crate::backup::{prune_snapshots, snapshot, SNAPSHOT_RETENTION_DAYS};
use crate::notify::{morning_summary, Notifier, ReminderTracker};
use crate::scheduler::Scheduler;
use crate::store::TaskFilter;

/// Tick periods for every background loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutomationIntervals {
    pub past_days: Duration,
    pub on_end: Duration,
    pub month_check: Duration,
    pub refresh: Duration,
    pub backup: Duration,
    pub prune: Duration,
    pub reminders: Duration,
}

impl Default for AutomationIntervals {
    fn default() -> Self {
        Self {
            past_days: Duration::from_secs(60),
            on_end: Duration::from_secs(60),
            month_check: Duration::from_secs(86_400),
            refresh: Duration::from_secs(60),
            backup: Duration::from_secs(300),
            prune: Duration::from_secs(3_600),
            reminders: Duration::from_secs(60),
        }
    }
}

impl AutomationIntervals {
    /// Same period for every loop.
    pub fn uniform(period: Duration) -> Self {
        Self {
            past_days: period,
            on_end: period,
            month_check: period,
            refresh: period,
            backup: period,
            prune: period,
            reminders: period,
        }
    }
}

/// Running loops. Dropping the handle leaves them running; call [`stop`](Self::stop).
pub struct AutomationHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl AutomationHandle {
    pub fn loop_count(&self) -> usize {
        self.tasks.len()
    }

    /// Cancel every loop and wait for them to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("automation loop ended abnormally: {e}");
            }
        }
        info!("automation stopped");
    }
}

pub struct AutomationRunner {
    engine: Arc<AutomationEngine>,
    scheduler: Arc<Scheduler>,
    notifier: Arc<dyn Notifier>,
    intervals: AutomationIntervals,
}

impl AutomationRunner {
    pub fn new(engine: Arc<AutomationEngine>, scheduler: Arc<Scheduler>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            engine,
            scheduler,
            notifier,
            intervals: AutomationIntervals::default(),
        }
    }

    pub fn with_intervals(mut self, intervals: AutomationIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    /// Run the startup rules, then spawn every loop. Must be called inside a
    /// tokio runtime.
    pub fn start(&self) -> AutomationHandle {
        let startup_engine = Arc::clone(&self.engine);
        run_guarded("startup", &mut || {
            for (name, outcome) in startup_engine.run_startup() {
                log_outcome(name, outcome);
            }
        });

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        let engine = Arc::clone(&self.engine);
        tasks.push(spawn_loop("past-day auto-complete", self.intervals.past_days, cancel.clone(), move || {
            log_outcome("past-day auto-complete", engine.auto_complete_past_days(Trigger::Timer));
        }));

        let engine = Arc::clone(&self.engine);
        tasks.push(spawn_loop("end-of-task auto-complete", self.intervals.on_end, cancel.clone(), move || {
            log_outcome("end-of-task auto-complete", engine.auto_complete_on_end());
        }));

        let engine = Arc::clone(&self.engine);
        tasks.push(spawn_loop("monthly renewal", self.intervals.month_check, cancel.clone(), move || {
            log_outcome("monthly renewal", engine.renew_monthly(Trigger::Timer));
        }));

        let engine = Arc::clone(&self.engine);
        tasks.push(spawn_loop("refresh", self.intervals.refresh, cancel.clone(), move || {
            engine.refresh();
        }));

        let store = self.engine.store().clone();
        tasks.push(spawn_loop("backup", self.intervals.backup, cancel.clone(), move || {
            match snapshot(&mut store.lock()) {
                Ok(key) => debug!(%key, "auto-save snapshot written"),
                Err(e) => error!("auto-save snapshot failed: {e}"),
            }
        }));

        let store = self.engine.store().clone();
        tasks.push(spawn_loop("snapshot cleanup", self.intervals.prune, cancel.clone(), move || {
            let max_age = chrono::Duration::days(SNAPSHOT_RETENTION_DAYS);
            if let Err(e) = prune_snapshots(&mut store.lock(), max_age) {
                error!("snapshot cleanup failed: {e}");
            }
        }));

        let store = self.engine.store().clone();
        let clock = self.engine.clock();
        let scheduler = Arc::clone(&self.scheduler);
        let notifier = Arc::clone(&self.notifier);
        let mut tracker = ReminderTracker::new();
        tasks.push(spawn_loop("reminders", self.intervals.reminders, cancel.clone(), move || {
            let now = clock.now();
            let today = store.lock().query_tasks(&TaskFilter::default().on(now.date()));
            for reminder in tracker.check(&today, now) {
                notifier.notify(&reminder.message(), reminder.severity());
            }
            if tracker.summary_due(now) {
                let scheduled = scheduler.recommended_schedule().task_count();
                notifier.info(&morning_summary(scheduled));
            }
        }));

        info!(loops = tasks.len(), "automation started");
        AutomationHandle { cancel, tasks }
    }
}

fn log_outcome(rule: &str, outcome: RuleOutcome) {
    match outcome {
        RuleOutcome::Disabled => debug!(rule, "rule disabled"),
        RuleOutcome::AlreadyRan => debug!(rule, "rule already ran this period"),
        RuleOutcome::Ran(summary) => {
            if outcome.changed() || summary.skipped > 0 {
                info!(
                    rule,
                    completed = summary.completed,
                    created = summary.created,
                    skipped = summary.skipped,
                    "rule ran"
                );
            } else {
                debug!(rule, "rule ran, nothing to do");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one rule body, logging a panic instead of propagating it.
/// Returns `false` when the body panicked.
pub fn run_guarded<F: FnMut()>(rule: &str, body: &mut F) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(()) => true,
        Err(payload) => {
            error!(rule, "rule panicked: {}", panic_message(payload.as_ref()));
            false
        }
    }
}

/// Spawn a loop that runs `body` every `period` until `cancel` fires.
/// The first run happens one period after the spawn.
pub fn spawn_loop<F>(rule: &'static str, period: Duration, cancel: CancellationToken, mut body: F) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        debug!(rule, ?period, "automation loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(rule, "automation loop stopped");
                    break;
                }
                _ = interval.tick() => {
                    run_guarded(rule, &mut body);
                }
            }
        }
    })
}
