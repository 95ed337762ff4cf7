//! Cron-driven scheduler for the named sync tasks.
//!
//! The host process constructs exactly one [`Scheduler`] and owns it
//! through an `Arc` — there is no hidden global instance. Registered
//! tasks start in a dormant `scheduled` state; [`Scheduler::start`]
//! activates the tick loop and the hourly health reporter, and
//! [`Scheduler::stop`] winds both down while keeping the registrations
//! for a later restart.
//!
//! A triggered run's failure is caught and logged here; it never tears
//! down the tick loop or affects the other tasks.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::storage::Storage;
use crate::sync::{DatasetKind, SyncRunner};

/// How often the tick loop re-evaluates cron expressions.
const TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Interval of the scheduler health report.
const HEALTH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Delay before the dev-mode immediate run fires after `start`.
const DEV_RUN_DELAY: Duration = Duration::from_secs(5);

/// A named sync task registration.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Unique task name, e.g. `"pools-sync"`.
    pub name: String,
    /// Dataset the task synchronizes.
    pub kind: DatasetKind,
    /// Six-field cron expression (`sec min hour dom mon dow`).
    pub cron_expr: String,
}

/// A validated, registered task.
#[derive(Debug)]
struct RegisteredTask {
    name: String,
    kind: DatasetKind,
    schedule: Schedule,
}

/// Mutable run state guarded by one lock.
#[derive(Debug, Default)]
struct RunState {
    running: bool,
    shutdown: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

/// Status snapshot exposed by the read-only scheduler endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    /// Whether the tick loop is active.
    pub is_running: bool,
    /// Number of registered tasks.
    pub job_count: usize,
    /// Registered task names.
    pub jobs: Vec<TaskName>,
}

/// A named task entry in [`SchedulerStatus`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskName {
    /// Task name as registered.
    pub name: String,
}

/// Recurring-execution owner for the named sync tasks.
#[derive(Debug)]
pub struct Scheduler<R, S> {
    runner: Arc<R>,
    storage: Arc<S>,
    timezone: Tz,
    dev_immediate_run: bool,
    dev_run_delay: Duration,
    tasks: RwLock<Vec<RegisteredTask>>,
    last_triggered: RwLock<HashMap<String, DateTime<Utc>>>,
    state: Mutex<RunState>,
}

impl<R, S> Scheduler<R, S>
where
    R: SyncRunner + 'static,
    S: Storage + 'static,
{
    /// Creates a scheduler with no registered tasks.
    #[must_use]
    pub fn new(runner: Arc<R>, storage: Arc<S>, config: &SyncConfig) -> Self {
        Self {
            runner,
            storage,
            timezone: config.scheduler_timezone,
            dev_immediate_run: config.dev_immediate_run,
            dev_run_delay: DEV_RUN_DELAY,
            tasks: RwLock::new(Vec::new()),
            last_triggered: RwLock::new(HashMap::new()),
            state: Mutex::new(RunState::default()),
        }
    }

    /// Registers a task without starting it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] when the cron expression does
    /// not parse, or when a task with the same name already exists.
    pub async fn register(&self, spec: TaskSpec) -> Result<(), SyncError> {
        let schedule = Schedule::from_str(&spec.cron_expr).map_err(|e| {
            SyncError::InvalidConfig(format!(
                "invalid cron expression {:?} for task {}: {e}",
                spec.cron_expr, spec.name
            ))
        })?;

        let mut tasks = self.tasks.write().await;
        if tasks.iter().any(|t| t.name == spec.name) {
            return Err(SyncError::InvalidConfig(format!(
                "task {:?} is already registered",
                spec.name
            )));
        }
        tracing::info!(task = %spec.name, cron = %spec.cron_expr, "task registered");
        tasks.push(RegisteredTask {
            name: spec.name,
            kind: spec.kind,
            schedule,
        });
        Ok(())
    }

    /// Activates all registered tasks and the hourly health reporter.
    /// Idempotent: calling `start` while running is a no-op.
    pub async fn start(self: Arc<Self>) {
        let mut state = self.state.lock().await;
        if state.running {
            return;
        }

        // Baseline the trigger times so nothing fires for a cron slot
        // that passed before activation.
        {
            let tasks = self.tasks.read().await;
            let mut last = self.last_triggered.write().await;
            let now = Utc::now();
            for task in tasks.iter() {
                last.insert(task.name.clone(), now);
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::new();

        handles.push(tokio::spawn(
            Arc::clone(&self).tick_loop(shutdown_rx.clone()),
        ));
        handles.push(tokio::spawn(
            Arc::clone(&self).health_loop(shutdown_rx.clone()),
        ));
        if self.dev_immediate_run {
            handles.push(tokio::spawn(Arc::clone(&self).dev_run(shutdown_rx)));
        }

        state.shutdown = Some(shutdown_tx);
        state.handles = handles;
        state.running = true;
        tracing::info!(dev_immediate_run = self.dev_immediate_run, "scheduler started");
    }

    /// Deactivates all timers. An in-flight sync run is not aborted;
    /// `stop` waits for the current loop iteration to finish, so no
    /// pending timers remain afterwards. Registered tasks are kept.
    pub async fn stop(&self) {
        let (shutdown, handles) = {
            let mut state = self.state.lock().await;
            if !state.running {
                return;
            }
            state.running = false;
            (state.shutdown.take(), std::mem::take(&mut state.handles))
        };

        if let Some(tx) = shutdown {
            let _ = tx.send(true);
        }
        for handle in handles {
            let _ = handle.await;
        }
        tracing::info!("scheduler stopped");
    }

    /// Returns the current status snapshot.
    pub async fn status(&self) -> SchedulerStatus {
        let tasks = self.tasks.read().await;
        let state = self.state.lock().await;
        SchedulerStatus {
            is_running: state.running,
            job_count: tasks.len(),
            jobs: tasks
                .iter()
                .map(|t| TaskName {
                    name: t.name.clone(),
                })
                .collect(),
        }
    }

    /// Recurring evaluation loop: every tick, fire the tasks whose cron
    /// schedule has a slot between their last trigger and now.
    async fn tick_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_due_tasks().await;
                }
                _ = shutdown.changed() => {
                    tracing::debug!("tick loop shutting down");
                    return;
                }
            }
        }
    }

    /// Fires every due task sequentially. Sequential execution is what
    /// guarantees a task never overlaps itself.
    async fn run_due_tasks(&self) {
        let due: Vec<(String, DatasetKind)> = {
            let tasks = self.tasks.read().await;
            let last = self.last_triggered.read().await;
            let now = Utc::now();
            tasks
                .iter()
                .filter(|t| {
                    let since = last.get(&t.name).copied().unwrap_or(now);
                    is_due(&t.schedule, &self.timezone, since, now)
                })
                .map(|t| (t.name.clone(), t.kind))
                .collect()
        };

        for (name, kind) in due {
            self.fire(&name, kind).await;
        }
    }

    /// Runs one task now, recording the trigger time and containing any
    /// failure at this boundary.
    async fn fire(&self, name: &str, kind: DatasetKind) {
        tracing::info!(task = name, "task due, triggering sync");
        match self.runner.run_sync(kind).await {
            Ok(outcome) if outcome.is_success() => {
                tracing::info!(
                    task = name,
                    job_id = %outcome.job_id,
                    records = outcome.records_processed,
                    "scheduled sync completed"
                );
            }
            Ok(outcome) => {
                tracing::error!(
                    task = name,
                    job_id = %outcome.job_id,
                    records = outcome.records_processed,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "scheduled sync failed"
                );
            }
            Err(e) => {
                tracing::error!(task = name, error = %e, "scheduled sync could not start");
            }
        }
        self.last_triggered
            .write()
            .await
            .insert(name.to_string(), Utc::now());
    }

    /// Hourly health report: active schedule count and job rows created
    /// in the last 24 hours. Read failures are logged and skipped.
    async fn health_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(HEALTH_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let active = self.tasks.read().await.len();
                    let since = Utc::now() - chrono::Duration::hours(24);
                    match self.storage.count_jobs_since(since).await {
                        Ok(jobs_24h) => {
                            tracing::info!(active_schedules = active, jobs_24h, "scheduler health");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "health report read failed, skipping");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::debug!("health loop shutting down");
                    return;
                }
            }
        }
    }

    /// Dev-mode one-shot: run every registered task once after a short
    /// fixed delay, independent of the recurring schedule.
    async fn dev_run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tokio::select! {
            () = tokio::time::sleep(self.dev_run_delay) => {}
            _ = shutdown.changed() => return,
        }

        let specs: Vec<(String, DatasetKind)> = {
            let tasks = self.tasks.read().await;
            tasks.iter().map(|t| (t.name.clone(), t.kind)).collect()
        };
        for (name, kind) in specs {
            tracing::info!(task = %name, "dev immediate run");
            self.fire(&name, kind).await;
        }
    }
}

/// Whether `schedule` has a fire time after `since` and at or before
/// `now`, evaluated in `tz`.
fn is_due(schedule: &Schedule, tz: &Tz, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let since_tz = since.with_timezone(tz);
    let now_tz = now.with_timezone(tz);
    schedule.after(&since_tz).take(1).any(|next| next <= now_tz)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::storage::mock::MockStorage;
    use crate::sync::SyncOutcome;

    /// Runner double counting invocations.
    #[derive(Debug, Default)]
    struct MockRunner {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl SyncRunner for MockRunner {
        async fn run_sync(&self, _kind: DatasetKind) -> Result<SyncOutcome, SyncError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(SyncOutcome {
                job_id: Uuid::new_v4(),
                total_source_records: 0,
                records_processed: 0,
                error: None,
            })
        }
    }

    fn utc() -> Tz {
        Tz::from_str("UTC").unwrap()
    }

    fn test_scheduler(dev_immediate_run: bool) -> Arc<Scheduler<MockRunner, MockStorage>> {
        let mut config = crate::config::SyncConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            database_url: String::new(),
            database_max_connections: 1,
            database_connect_timeout_secs: 1,
            yields_api_url: String::new(),
            llama_api_url: String::new(),
            source_timeout_secs: 1,
            min_tvl_usd: 0.0,
            pools_chunk_size: 100,
            protocols_chunk_size: 50,
            pools_sync_cron: "0 0 * * * *".to_string(),
            protocols_sync_cron: "0 30 * * * *".to_string(),
            scheduler_timezone: utc(),
            scheduler_enabled: true,
            dev_immediate_run: false,
        };
        config.dev_immediate_run = dev_immediate_run;

        let mut scheduler = Scheduler::new(
            Arc::new(MockRunner::default()),
            Arc::new(MockStorage::new()),
            &config,
        );
        scheduler.dev_run_delay = Duration::from_millis(10);
        Arc::new(scheduler)
    }

    fn pools_task() -> TaskSpec {
        TaskSpec {
            name: "pools-sync".to_string(),
            kind: DatasetKind::Pools,
            cron_expr: "0 0 * * * *".to_string(),
        }
    }

    #[tokio::test]
    async fn register_validates_cron_and_rejects_duplicates() {
        let scheduler = test_scheduler(false);
        assert!(scheduler.register(pools_task()).await.is_ok());
        assert!(scheduler.register(pools_task()).await.is_err());

        let bad = TaskSpec {
            name: "bad".to_string(),
            kind: DatasetKind::Pools,
            cron_expr: "not a cron".to_string(),
        };
        assert!(matches!(
            scheduler.register(bad).await,
            Err(SyncError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn registered_tasks_are_scheduled_not_running() {
        let scheduler = test_scheduler(false);
        scheduler.register(pools_task()).await.unwrap();

        let status = scheduler.status().await;
        assert!(!status.is_running);
        assert_eq!(status.job_count, 1);
        assert_eq!(status.jobs.first().map(|j| j.name.as_str()), Some("pools-sync"));
    }

    #[tokio::test]
    async fn stop_then_start_resumes_with_same_tasks() {
        let scheduler = test_scheduler(false);
        scheduler.register(pools_task()).await.unwrap();

        Arc::clone(&scheduler).start().await;
        assert!(scheduler.status().await.is_running);

        scheduler.stop().await;
        let status = scheduler.status().await;
        assert!(!status.is_running);
        assert_eq!(status.job_count, 1);
        assert!(scheduler.state.lock().await.handles.is_empty());

        Arc::clone(&scheduler).start().await;
        assert!(scheduler.status().await.is_running);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let scheduler = test_scheduler(false);
        Arc::clone(&scheduler).start().await;
        Arc::clone(&scheduler).start().await;
        assert!(scheduler.status().await.is_running);
        scheduler.stop().await;
        scheduler.stop().await;
        assert!(!scheduler.status().await.is_running);
    }

    #[tokio::test]
    async fn dev_immediate_run_fires_each_task_once() {
        let scheduler = test_scheduler(true);
        scheduler.register(pools_task()).await.unwrap();
        scheduler
            .register(TaskSpec {
                name: "protocols-sync".to_string(),
                kind: DatasetKind::Protocols,
                cron_expr: "0 30 * * * *".to_string(),
            })
            .await
            .unwrap();

        Arc::clone(&scheduler).start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.stop().await;

        assert_eq!(scheduler.runner.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn runner_failure_is_contained_at_the_boundary() {
        /// Runner double that always fails.
        #[derive(Debug)]
        struct FailingRunner;

        #[async_trait]
        impl SyncRunner for FailingRunner {
            async fn run_sync(&self, _kind: DatasetKind) -> Result<SyncOutcome, SyncError> {
                Err(SyncError::StorageWrite("no job row".to_string()))
            }
        }

        let scheduler = Arc::new(Scheduler {
            runner: Arc::new(FailingRunner),
            storage: Arc::new(MockStorage::new()),
            timezone: utc(),
            dev_immediate_run: false,
            dev_run_delay: Duration::from_millis(10),
            tasks: RwLock::new(Vec::new()),
            last_triggered: RwLock::new(HashMap::new()),
            state: Mutex::new(RunState::default()),
        });
        scheduler.register(pools_task()).await.unwrap();

        // Firing directly must not panic or poison anything.
        scheduler.fire("pools-sync", DatasetKind::Pools).await;
        assert!(scheduler.last_triggered.read().await.contains_key("pools-sync"));
    }

    #[test]
    fn is_due_respects_last_trigger() {
        let schedule = Schedule::from_str("0 * * * * *").unwrap();
        let tz = utc();
        let now = Utc::now();

        // Last triggered right now: the next slot is in the future.
        assert!(!is_due(&schedule, &tz, now, now));

        // Last triggered two minutes ago: a whole-minute slot passed.
        let since = now - chrono::Duration::minutes(2);
        assert!(is_due(&schedule, &tz, since, now));
    }
}
