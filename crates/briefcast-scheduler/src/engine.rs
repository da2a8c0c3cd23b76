//! Scheduler engine — one timer per enabled + approved task.
//!
//! Constructed once at process start and passed by reference to whatever
//! triggers manual execution (gateway, CLI); there is no global instance.
//! Scheduled fires and manual triggers go through the same `execute_task`
//! entry point, so both share identical semantics.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use briefcast_core::error::{BriefcastError, Result};
use briefcast_core::traits::TaskRepository;
use briefcast_core::types::{ExecutionRecord, Task};
use briefcast_executor::Executor;
use chrono::Utc;
use tokio::task::JoinHandle;

use crate::cron;

/// The scheduler — owns the in-memory timer handle for every registered task.
/// The authoritative task data lives in the repository.
pub struct Scheduler {
    repo: Arc<dyn TaskRepository>,
    executor: Arc<Executor>,
    timers: tokio::sync::Mutex<HashMap<String, JoinHandle<()>>>,
    /// Task ids with an execution currently in flight. One run per id.
    in_flight: Mutex<HashSet<String>>,
}

impl Scheduler {
    pub fn new(repo: Arc<dyn TaskRepository>, executor: Arc<Executor>) -> Arc<Self> {
        Arc::new(Self {
            repo,
            executor,
            timers: tokio::sync::Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// Register every enabled + approved task. Tasks not meeting both
    /// conditions are never scheduled, regardless of history.
    pub async fn bootstrap(self: &Arc<Self>) -> Result<usize> {
        let tasks = self.repo.list_enabled_approved()?;
        let mut registered = 0;
        for task in &tasks {
            match self.register_task(&task.id).await {
                Ok(()) => registered += 1,
                Err(e) => {
                    tracing::warn!("⚠️ Skipping task '{}' at bootstrap: {}", task.name, e)
                }
            }
        }
        tracing::info!("⏰ Scheduler started: {} task(s) registered", registered);
        Ok(registered)
    }

    /// Start (or restart) the timer for a task. Idempotent: re-registration
    /// replaces any existing timer, leaving exactly one active.
    pub async fn register_task(self: &Arc<Self>, id: &str) -> Result<()> {
        let task = self.repo.load(id)?;
        if !task.is_schedulable() {
            return Err(BriefcastError::Validation(format!(
                "task '{id}' is not schedulable (status {}, enabled {})",
                task.status.as_str(),
                task.enabled
            )));
        }

        // Re-checked defensively: translation validated the cron, but a task
        // edited out-of-band must not wedge the timer loop.
        cron::validate_expression(&task.cron)?;
        cron::validate_timezone(&task.timezone)?;

        let next = cron::next_run(&task.cron, &task.timezone, Utc::now())
            .ok_or_else(|| BriefcastError::InvalidCron(task.cron.clone()))?;
        self.repo.set_next_run(id, Some(next))?;

        let handle = tokio::spawn(Arc::clone(self).timer_loop(
            id.to_string(),
            task.cron.clone(),
            task.timezone.clone(),
        ));

        let mut timers = self.timers.lock().await;
        if let Some(old) = timers.insert(id.to_string(), handle) {
            old.abort();
        }
        tracing::info!(
            "📅 Task '{}' registered ({} {}), next run {}",
            task.name,
            task.cron,
            task.timezone,
            next.to_rfc3339()
        );
        Ok(())
    }

    /// Stop and discard the task's timer. Idempotent if none exists. An
    /// execution already in flight runs to completion under its own timeouts.
    pub async fn unregister_task(&self, id: &str) {
        if let Some(handle) = self.timers.lock().await.remove(id) {
            handle.abort();
            tracing::info!("🗑️ Task '{}' unregistered", id);
        }
    }

    /// Whether a timer is currently held for the task.
    pub async fn is_registered(&self, id: &str) -> bool {
        self.timers.lock().await.contains_key(id)
    }

    pub async fn registered_count(&self) -> usize {
        self.timers.lock().await.len()
    }

    /// Execute a task now. Shared entry point for timer fires and manual
    /// triggers. Enforces one run per task id in flight; a concurrent
    /// trigger is refused. Updates last-run and recomputes next-run after
    /// every execution, success or failure.
    pub async fn execute_task(&self, id: &str) -> Result<ExecutionRecord> {
        let task = self.repo.load(id)?;

        {
            let mut guard = self.in_flight.lock().unwrap();
            if !guard.insert(id.to_string()) {
                return Err(BriefcastError::RunInFlight(id.to_string()));
            }
        }

        tracing::info!("🔔 Executing task '{}' ({})", task.name, task.id);
        let record = self.run_and_persist(&task).await;
        self.in_flight.lock().unwrap().remove(id);

        let next = cron::next_run(&task.cron, &task.timezone, Utc::now());
        if let Err(e) = self.repo.record_run(id, Utc::now(), next) {
            tracing::warn!("⚠️ Failed to persist run metadata for '{}': {}", id, e);
        }

        record
    }

    async fn run_and_persist(&self, task: &Task) -> Result<ExecutionRecord> {
        let mut record = ExecutionRecord::start(&task.id);
        self.repo.insert_execution(&record)?;
        self.executor.run(task, &mut record).await;
        if let Err(e) = self.repo.finalize_execution(&record) {
            tracing::warn!("⚠️ Failed to finalize execution {}: {}", record.id, e);
        }
        tracing::info!(
            "🏁 Task '{}' finished: {} ({} step(s), {}ms)",
            task.name,
            record.status.as_str(),
            record.steps.len(),
            record.duration_ms.unwrap_or(0)
        );
        Ok(record)
    }

    /// Sleeps until the next cron match, executes, repeats. Aborted by
    /// unregister_task; overlap within one task is impossible because the
    /// loop awaits its own execution before sleeping again.
    async fn timer_loop(self: Arc<Self>, id: String, cron_expr: String, timezone: String) {
        loop {
            let Some(next) = cron::next_run(&cron_expr, &timezone, Utc::now()) else {
                tracing::error!(
                    "Timer for task '{}' stopped: no future occurrence for '{}'",
                    id,
                    cron_expr
                );
                return;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            match self.execute_task(&id).await {
                Ok(record) => {
                    tracing::debug!("Task '{}' run {} -> {}", id, record.id, record.status.as_str())
                }
                Err(e) => tracing::warn!("⚠️ Scheduled run of '{}' failed: {}", id, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use briefcast_core::traits::Connector;
    use briefcast_core::types::{
        ExecutionStatus, Step, StepKind, Task, TaskStatus,
    };
    use briefcast_executor::{ConnectorSet, Executor};
    use chrono::{DateTime, Utc};
    use serde_json::{Map, Value};
    use std::time::Duration;

    /// Minimal in-memory repository for engine tests.
    #[derive(Default)]
    struct MemRepo {
        tasks: Mutex<HashMap<String, Task>>,
        executions: Mutex<Vec<ExecutionRecord>>,
    }

    impl TaskRepository for MemRepo {
        fn insert(&self, task: &Task) -> Result<()> {
            self.tasks
                .lock()
                .unwrap()
                .insert(task.id.clone(), task.clone());
            Ok(())
        }

        fn load(&self, id: &str) -> Result<Task> {
            self.tasks
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| BriefcastError::TaskNotFound(id.to_string()))
        }

        fn list(&self) -> Result<Vec<Task>> {
            Ok(self.tasks.lock().unwrap().values().cloned().collect())
        }

        fn list_enabled_approved(&self) -> Result<Vec<Task>> {
            Ok(self
                .tasks
                .lock()
                .unwrap()
                .values()
                .filter(|t| t.is_schedulable())
                .cloned()
                .collect())
        }

        fn update_status(&self, id: &str, status: TaskStatus) -> Result<()> {
            if let Some(t) = self.tasks.lock().unwrap().get_mut(id) {
                t.status = status;
            }
            Ok(())
        }

        fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
            if let Some(t) = self.tasks.lock().unwrap().get_mut(id) {
                t.enabled = enabled;
            }
            Ok(())
        }

        fn delete(&self, id: &str) -> Result<()> {
            self.tasks.lock().unwrap().remove(id);
            Ok(())
        }

        fn record_run(
            &self,
            id: &str,
            last_run: DateTime<Utc>,
            next_run: Option<DateTime<Utc>>,
        ) -> Result<()> {
            if let Some(t) = self.tasks.lock().unwrap().get_mut(id) {
                t.last_run = Some(last_run);
                t.next_run = next_run;
            }
            Ok(())
        }

        fn set_next_run(&self, id: &str, next_run: Option<DateTime<Utc>>) -> Result<()> {
            if let Some(t) = self.tasks.lock().unwrap().get_mut(id) {
                t.next_run = next_run;
            }
            Ok(())
        }

        fn insert_execution(&self, record: &ExecutionRecord) -> Result<()> {
            self.executions.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn finalize_execution(&self, record: &ExecutionRecord) -> Result<()> {
            let mut executions = self.executions.lock().unwrap();
            if let Some(slot) = executions.iter_mut().find(|r| r.id == record.id) {
                *slot = record.clone();
            }
            Ok(())
        }

        fn list_executions(&self, task_id: &str, limit: usize) -> Result<Vec<ExecutionRecord>> {
            Ok(self
                .executions
                .lock()
                .unwrap()
                .iter()
                .rev()
                .filter(|r| r.task_id == task_id)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    struct SleepyConnector(Duration);

    #[async_trait]
    impl Connector for SleepyConnector {
        fn service(&self) -> &str {
            "gmail"
        }

        async fn call(&self, _op: &str, _params: &Map<String, Value>) -> Result<Value> {
            tokio::time::sleep(self.0).await;
            Ok(serde_json::json!({"sent": true}))
        }
    }

    fn approved_task() -> Task {
        let mut task = Task::new(
            "me@example.com",
            "brief",
            "0 8 * * *",
            "America/Los_Angeles",
            vec![Step {
                kind: StepKind::Delivery,
                service: "gmail".into(),
                operation: "send".into(),
                parameters: Map::new(),
                output_binding: None,
            }],
        );
        task.status = TaskStatus::Approved;
        task
    }

    fn scheduler_with(repo: Arc<MemRepo>, step_delay: Duration) -> Arc<Scheduler> {
        let executor = Arc::new(Executor::new(
            ConnectorSet::new(vec![Box::new(SleepyConnector(step_delay))]),
            Duration::from_secs(5),
        ));
        Scheduler::new(repo, executor)
    }

    #[tokio::test]
    async fn test_register_twice_keeps_one_timer() {
        let repo = Arc::new(MemRepo::default());
        let task = approved_task();
        repo.insert(&task).unwrap();

        let sched = scheduler_with(repo, Duration::ZERO);
        sched.register_task(&task.id).await.unwrap();
        sched.register_task(&task.id).await.unwrap();
        assert_eq!(sched.registered_count().await, 1);
        assert!(sched.is_registered(&task.id).await);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let repo = Arc::new(MemRepo::default());
        let task = approved_task();
        repo.insert(&task).unwrap();

        let sched = scheduler_with(repo, Duration::ZERO);
        sched.register_task(&task.id).await.unwrap();
        sched.unregister_task(&task.id).await;
        sched.unregister_task(&task.id).await;
        assert_eq!(sched.registered_count().await, 0);
    }

    #[tokio::test]
    async fn test_register_sets_next_run() {
        let repo = Arc::new(MemRepo::default());
        let task = approved_task();
        repo.insert(&task).unwrap();

        let sched = scheduler_with(repo.clone(), Duration::ZERO);
        sched.register_task(&task.id).await.unwrap();
        let stored = repo.load(&task.id).unwrap();
        assert!(stored.next_run.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_register_refuses_unapproved() {
        let repo = Arc::new(MemRepo::default());
        let mut task = approved_task();
        task.status = TaskStatus::PendingApproval;
        repo.insert(&task).unwrap();

        let sched = scheduler_with(repo, Duration::ZERO);
        assert!(sched.register_task(&task.id).await.is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_registers_only_eligible() {
        let repo = Arc::new(MemRepo::default());
        let approved = approved_task();
        repo.insert(&approved).unwrap();

        let mut pending = approved_task();
        pending.status = TaskStatus::PendingApproval;
        repo.insert(&pending).unwrap();

        let mut disabled = approved_task();
        disabled.enabled = false;
        repo.insert(&disabled).unwrap();

        let sched = scheduler_with(repo, Duration::ZERO);
        let registered = sched.bootstrap().await.unwrap();
        assert_eq!(registered, 1);
        assert!(sched.is_registered(&approved.id).await);
    }

    #[tokio::test]
    async fn test_execute_task_persists_run_metadata() {
        let repo = Arc::new(MemRepo::default());
        let task = approved_task();
        repo.insert(&task).unwrap();

        let sched = scheduler_with(repo.clone(), Duration::ZERO);
        let record = sched.execute_task(&task.id).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Completed);

        let stored = repo.load(&task.id).unwrap();
        assert!(stored.last_run.is_some());
        assert!(stored.next_run.is_some());
        assert_eq!(repo.list_executions(&task.id, 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_unknown_task() {
        let repo = Arc::new(MemRepo::default());
        let sched = scheduler_with(repo, Duration::ZERO);
        assert!(matches!(
            sched.execute_task("ghost").await,
            Err(BriefcastError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_second_trigger_refused_while_in_flight() {
        let repo = Arc::new(MemRepo::default());
        let task = approved_task();
        repo.insert(&task).unwrap();

        let sched = scheduler_with(repo, Duration::from_millis(200));
        let first = {
            let sched = sched.clone();
            let id = task.id.clone();
            tokio::spawn(async move { sched.execute_task(&id).await })
        };
        // Give the first run time to take the in-flight guard.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = sched.execute_task(&task.id).await;
        assert!(matches!(second, Err(BriefcastError::RunInFlight(_))));

        let first = first.await.unwrap().unwrap();
        assert_eq!(first.status, ExecutionStatus::Completed);
    }
}
