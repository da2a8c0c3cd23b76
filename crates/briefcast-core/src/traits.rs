//! Seam traits — the engine's view of its external collaborators.
//!
//! Concrete implementations live in their own crates (briefcast-providers,
//! briefcast-connectors, briefcast-store) and are injected at wiring time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{ExecutionRecord, Task, TaskStatus};

/// An opaque language-model text generator: prompt in, text out. May fail or
/// time out; the caller decides what that means.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Generate a completion for `prompt` under `system` instructions.
    async fn generate(&self, system: &str, prompt: &str, temperature: f32) -> Result<String>;
}

/// A per-service collaborator behind the uniform
/// `(operation, parameters) -> result` contract.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Service name this connector answers for ("calendar", "gmail", ...).
    fn service(&self) -> &str;

    /// Execute one operation with already-resolved parameters.
    async fn call(
        &self,
        operation: &str,
        params: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value>;
}

/// The persisted representation of tasks and their run history.
///
/// All methods are attributable to a single task id; no cross-task
/// coordination is required of an implementation.
pub trait TaskRepository: Send + Sync {
    fn insert(&self, task: &Task) -> Result<()>;
    fn load(&self, id: &str) -> Result<Task>;
    fn list(&self) -> Result<Vec<Task>>;
    /// Tasks eligible for scheduling: status approved AND enabled.
    fn list_enabled_approved(&self) -> Result<Vec<Task>>;
    fn update_status(&self, id: &str, status: TaskStatus) -> Result<()>;
    fn set_enabled(&self, id: &str, enabled: bool) -> Result<()>;
    /// Removes the task and all of its execution history.
    fn delete(&self, id: &str) -> Result<()>;
    /// Update run metadata after an execution (success or failure).
    fn record_run(
        &self,
        id: &str,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<()>;
    /// Update only the derived next-run timestamp (registration, edits).
    fn set_next_run(&self, id: &str, next_run: Option<DateTime<Utc>>) -> Result<()>;
    /// Insert a freshly opened (running) execution record.
    fn insert_execution(&self, record: &ExecutionRecord) -> Result<()>;
    /// Persist the finalized state of an execution record.
    fn finalize_execution(&self, record: &ExecutionRecord) -> Result<()>;
    /// Most recent executions for a task, newest first.
    fn list_executions(&self, task_id: &str, limit: usize) -> Result<Vec<ExecutionRecord>>;
}
