//! Task definitions — the core data model for scheduled briefing jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A user-owned recurring job: a schedule plus an ordered plan of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID.
    pub id: String,
    /// Owner identity (email or user id — opaque to the engine).
    pub owner: String,
    /// Human-readable name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 5-field cron expression: minute hour day-of-month month weekday.
    pub cron: String,
    /// IANA timezone name, e.g. "America/Los_Angeles".
    pub timezone: String,
    /// Ordered plan. Executed strictly in declared order.
    pub steps: Vec<Step>,
    #[serde(default)]
    pub personalization: Personalization,
    /// Whether the scheduler should fire this task.
    pub enabled: bool,
    /// Lifecycle status. Only approved + enabled tasks are ever scheduled.
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    /// Last triggered timestamp.
    pub last_run: Option<DateTime<Utc>>,
    /// Next scheduled run. Recomputed after every run or edit.
    pub next_run: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new task in `pending_approval` status, enabled by default.
    pub fn new(
        owner: &str,
        name: &str,
        cron: &str,
        timezone: &str,
        steps: Vec<Step>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
            description: String::new(),
            cron: cron.to_string(),
            timezone: timezone.to_string(),
            steps,
            personalization: Personalization::default(),
            enabled: true,
            status: TaskStatus::PendingApproval,
            created_at: Utc::now(),
            last_run: None,
            next_run: None,
        }
    }

    /// Count of delivery steps. Every valid plan has at least one.
    pub fn delivery_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.kind == StepKind::Delivery)
            .count()
    }

    /// True when the scheduler should hold a timer for this task.
    pub fn is_schedulable(&self) -> bool {
        self.enabled && self.status == TaskStatus::Approved
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    PendingApproval,
    Approved,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::PendingApproval => "pending_approval",
            TaskStatus::Approved => "approved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(TaskStatus::Created),
            "pending_approval" => Some(TaskStatus::PendingApproval),
            "approved" => Some(TaskStatus::Approved),
            _ => None,
        }
    }
}

/// One ordered unit of work inside a task's plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub kind: StepKind,
    /// Service name, e.g. "calendar", "gmail", "search", "youtube", "llm".
    pub service: String,
    /// Operation name within the service, e.g. "list_events", "send".
    pub operation: String,
    /// Parameter map. String values may contain `{{name}}` placeholders.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    /// Key under which a successful result is stored in the run context.
    #[serde(default)]
    pub output_binding: Option<String>,
}

impl Step {
    /// "service.operation" label used in logs and execution records.
    pub fn label(&self) -> String {
        format!("{}.{}", self.service, self.operation)
    }
}

/// What a step contributes to the run. Failure policy keys off this:
/// delivery failures abort the run, everything else degrades gracefully.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    DataCollection,
    Processing,
    Delivery,
}

/// User preferences the translator tags onto a plan.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Personalization {
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

/// Voice for LLM-composed content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Professional,
    #[default]
    Friendly,
    Casual,
    Concise,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Friendly => "friendly",
            Tone::Casual => "casual",
            Tone::Concise => "concise",
        }
    }
}

/// One historical run of a task. Created at run start, finalized at run end,
/// immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub task_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub duration_ms: Option<u64>,
    /// Every attempted step, in order, with its individual outcome.
    pub steps: Vec<StepResult>,
    /// Top-level error message when the run failed.
    pub error: Option<String>,
}

impl ExecutionRecord {
    /// Open a new record in `running` status.
    pub fn start(task_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            started_at: Utc::now(),
            completed_at: None,
            status: ExecutionStatus::Running,
            duration_ms: None,
            steps: Vec::new(),
            error: None,
        }
    }

    /// Finalize the record. Stamps completion time and elapsed duration.
    pub fn finish(&mut self, status: ExecutionStatus, error: Option<String>) {
        let now = Utc::now();
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
        self.completed_at = Some(now);
        self.status = status;
        self.error = error;
    }
}

/// Overall run status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(ExecutionStatus::Running),
            "completed" => Some(ExecutionStatus::Completed),
            "failed" => Some(ExecutionStatus::Failed),
            _ => None,
        }
    }
}

/// Per-step outcome inside an execution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// "service.operation" label.
    pub step: String,
    pub status: StepStatus,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StepResult {
    pub fn succeeded(step: &str, data: Option<serde_json::Value>) -> Self {
        Self {
            step: step.to_string(),
            status: StepStatus::Succeeded,
            data,
            error: None,
        }
    }

    pub fn failed(step: &str, error: &str) -> Self {
        Self {
            step: step.to_string(),
            status: StepStatus::Failed,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery_step() -> Step {
        Step {
            kind: StepKind::Delivery,
            service: "gmail".into(),
            operation: "send".into(),
            parameters: serde_json::Map::new(),
            output_binding: None,
        }
    }

    #[test]
    fn test_new_task_pending_approval() {
        let task = Task::new("me@example.com", "Morning brief", "0 7 * * *", "UTC", vec![
            delivery_step(),
        ]);
        assert_eq!(task.status, TaskStatus::PendingApproval);
        assert!(task.enabled);
        assert!(!task.is_schedulable());
        assert_eq!(task.delivery_steps(), 1);
    }

    #[test]
    fn test_schedulable_requires_both() {
        let mut task = Task::new("me", "t", "0 7 * * *", "UTC", vec![delivery_step()]);
        task.status = TaskStatus::Approved;
        assert!(task.is_schedulable());
        task.enabled = false;
        assert!(!task.is_schedulable());
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            TaskStatus::Created,
            TaskStatus::PendingApproval,
            TaskStatus::Approved,
        ] {
            assert_eq!(TaskStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(TaskStatus::parse("bogus"), None);
    }

    #[test]
    fn test_execution_record_finish() {
        let mut record = ExecutionRecord::start("task-1");
        assert_eq!(record.status, ExecutionStatus::Running);
        record.finish(ExecutionStatus::Completed, None);
        assert!(record.completed_at.is_some());
        assert!(record.duration_ms.is_some());
    }

    #[test]
    fn test_step_kind_serde_names() {
        let kind: StepKind = serde_json::from_str("\"data_collection\"").unwrap();
        assert_eq!(kind, StepKind::DataCollection);
        assert_eq!(
            serde_json::to_string(&StepKind::Delivery).unwrap(),
            "\"delivery\""
        );
    }
}
