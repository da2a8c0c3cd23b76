//! The executor — walks a task's steps in order and applies the
//! partial-failure policy.
//!
//! A failed delivery step aborts the run (a briefing that never sends is a
//! contract violation). A failed data-collection or processing step is
//! recorded and the run continues — downstream steps may still produce a
//! degraded but useful result.

use briefcast_core::error::{BriefcastError, Result};
use briefcast_core::traits::Connector;
use briefcast_core::types::{
    ExecutionRecord, ExecutionStatus, Step, StepKind, StepResult, Task,
};
use chrono::Utc;
use chrono_tz::Tz;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::context::{self, RunContext};

/// The executor's service → connector table, resolved once at wiring time so
/// the hot path never does string-keyed service discovery beyond one map hit.
pub struct ConnectorSet {
    connectors: HashMap<String, Box<dyn Connector>>,
}

impl ConnectorSet {
    pub fn new(connectors: Vec<Box<dyn Connector>>) -> Self {
        let connectors = connectors
            .into_iter()
            .map(|c| (c.service().to_string(), c))
            .collect();
        Self { connectors }
    }

    pub fn get(&self, service: &str) -> Option<&dyn Connector> {
        self.connectors.get(service).map(|c| c.as_ref())
    }

    pub fn services(&self) -> Vec<&str> {
        self.connectors.keys().map(|s| s.as_str()).collect()
    }
}

/// Runs one task at a time, strictly sequentially step by step.
pub struct Executor {
    connectors: ConnectorSet,
    step_timeout: Duration,
}

impl Executor {
    pub fn new(connectors: ConnectorSet, step_timeout: Duration) -> Self {
        Self {
            connectors,
            step_timeout,
        }
    }

    /// Run a task to completion and return its finalized execution record.
    pub async fn execute(&self, task: &Task) -> ExecutionRecord {
        let mut record = ExecutionRecord::start(&task.id);
        self.run(task, &mut record).await;
        record
    }

    /// Run a task's steps into an already-opened execution record. The record
    /// is finalized (status, completion time, duration) before returning.
    pub async fn run(&self, task: &Task, record: &mut ExecutionRecord) {
        let tz: Tz = task.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(
                "Task '{}' has unknown timezone '{}', using UTC",
                task.id,
                task.timezone
            );
            chrono_tz::UTC
        });
        let mut ctx = RunContext::seeded(&tz, Utc::now());
        let mut failed_bindings: HashSet<String> = HashSet::new();

        for step in &task.steps {
            let label = step.label();
            let params = ctx.resolve(&step.parameters);

            let outcome = match self.starved_binding(step, &params, &failed_bindings) {
                Some(name) => Err(BriefcastError::Connector(format!(
                    "upstream step failed: '{{{{{name}}}}}' was never produced"
                ))),
                None => self.dispatch(step, &params).await,
            };

            match outcome {
                Ok(value) => {
                    tracing::debug!("✅ Step {} succeeded", label);
                    if let Some(binding) = &step.output_binding {
                        ctx.bind(binding, value.clone());
                    }
                    record.steps.push(StepResult::succeeded(&label, Some(value)));
                }
                Err(e) => {
                    let msg = e.to_string();
                    record.steps.push(StepResult::failed(&label, &msg));

                    if step.kind == StepKind::Delivery {
                        tracing::warn!("📭 Delivery step {} failed, aborting run: {}", label, msg);
                        record.finish(
                            ExecutionStatus::Failed,
                            Some(format!("delivery step {label} failed: {msg}")),
                        );
                        return;
                    }

                    if let Some(binding) = &step.output_binding {
                        failed_bindings.insert(binding.clone());
                    }
                    tracing::warn!("⚠️ Step {} failed, continuing: {}", label, msg);
                }
            }
        }

        record.finish(ExecutionStatus::Completed, None);
    }

    /// Hand one step to its service connector under the bounded timeout.
    async fn dispatch(&self, step: &Step, params: &Map<String, Value>) -> Result<Value> {
        let Some(connector) = self.connectors.get(&step.service) else {
            return Err(BriefcastError::Connector(format!(
                "unknown service '{}'",
                step.service
            )));
        };

        match tokio::time::timeout(self.step_timeout, connector.call(&step.operation, params))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(BriefcastError::Timeout(self.step_timeout.as_secs())),
        }
    }

    /// A delivery step about to send content from a failed upstream step is
    /// refused rather than delivering garbage: any placeholder left
    /// unresolved in its parameters that names a failed step's binding.
    fn starved_binding(
        &self,
        step: &Step,
        params: &Map<String, Value>,
        failed_bindings: &HashSet<String>,
    ) -> Option<String> {
        if step.kind != StepKind::Delivery || failed_bindings.is_empty() {
            return None;
        }
        let mut leftover = Vec::new();
        collect_unresolved(&Value::Object(params.clone()), &mut leftover);
        leftover.into_iter().find(|name| failed_bindings.contains(name))
    }
}

fn collect_unresolved(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.extend(context::unresolved_placeholders(s)),
        Value::Array(items) => items.iter().for_each(|v| collect_unresolved(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_unresolved(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use briefcast_core::types::StepStatus;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Returns a fixed payload; records the params it was called with.
    struct StubConnector {
        name: &'static str,
        payload: Value,
        fail: bool,
        calls: Arc<Mutex<Vec<Map<String, Value>>>>,
    }

    impl StubConnector {
        fn ok(name: &'static str, payload: Value) -> Self {
            Self {
                name,
                payload,
                fail: false,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                name,
                payload: Value::Null,
                fail: true,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl Connector for StubConnector {
        fn service(&self) -> &str {
            self.name
        }

        async fn call(&self, _operation: &str, params: &Map<String, Value>) -> Result<Value> {
            self.calls.lock().unwrap().push(params.clone());
            if self.fail {
                Err(BriefcastError::Connector("stub failure".into()))
            } else {
                Ok(self.payload.clone())
            }
        }
    }

    struct SlowConnector;

    #[async_trait]
    impl Connector for SlowConnector {
        fn service(&self) -> &str {
            "slow"
        }

        async fn call(&self, _operation: &str, _params: &Map<String, Value>) -> Result<Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Value::Null)
        }
    }

    fn step(kind: StepKind, service: &str, binding: Option<&str>) -> Step {
        Step {
            kind,
            service: service.into(),
            operation: "op".into(),
            parameters: Map::new(),
            output_binding: binding.map(String::from),
        }
    }

    fn task(steps: Vec<Step>) -> Task {
        Task::new("me@example.com", "test", "0 8 * * *", "UTC", steps)
    }

    fn executor(connectors: Vec<Box<dyn Connector>>) -> Executor {
        Executor::new(ConnectorSet::new(connectors), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_delivery_failure_aborts_run() {
        let exec = executor(vec![
            Box::new(StubConnector::failing("gmail")),
            Box::new(StubConnector::ok("search", json!([]))),
        ]);
        let t = task(vec![
            step(StepKind::Delivery, "gmail", None),
            step(StepKind::DataCollection, "search", None),
        ]);
        let record = exec.execute(&t).await;

        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.error.as_ref().unwrap().contains("delivery step"));
        // The step after the failed delivery was never attempted.
        assert_eq!(record.steps.len(), 1);
        assert_eq!(record.steps[0].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_collection_failure_degrades_gracefully() {
        let exec = executor(vec![
            Box::new(StubConnector::failing("search")),
            Box::new(StubConnector::ok("gmail", json!({"sent": true}))),
        ]);
        let t = task(vec![
            step(StepKind::DataCollection, "search", None),
            step(StepKind::Delivery, "gmail", None),
        ]);
        let record = exec.execute(&t).await;

        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.steps.len(), 2);
        assert_eq!(record.steps[0].status, StepStatus::Failed);
        assert!(record.steps[0].error.is_some());
        assert_eq!(record.steps[1].status, StepStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_context_binding_flows_to_later_step() {
        let gmail = StubConnector::ok("gmail", json!({"sent": true}));
        let gmail_calls = gmail.calls.clone();
        let exec = executor(vec![
            Box::new(StubConnector::ok(
                "calendar",
                json!([{"summary": "standup"}]),
            )),
            Box::new(gmail),
        ]);

        let mut collect = step(StepKind::DataCollection, "calendar", Some("calendar_events"));
        collect.operation = "list_events".into();
        let mut deliver = step(StepKind::Delivery, "gmail", None);
        deliver.operation = "send".into();
        deliver
            .parameters
            .insert("body".into(), json!("Today: {{calendar_events}}"));

        let t = task(vec![collect, deliver]);
        let record = exec.execute(&t).await;
        assert_eq!(record.status, ExecutionStatus::Completed);

        // Resolved body reaches the connector with the bound data inlined.
        let calls = gmail_calls.lock().unwrap();
        assert_eq!(
            calls[0]["body"],
            json!(r#"Today: [{"summary":"standup"}]"#)
        );
    }

    #[tokio::test]
    async fn test_starved_delivery_is_refused() {
        let exec = executor(vec![
            Box::new(StubConnector::failing("search")),
            Box::new(StubConnector::ok("gmail", json!({"sent": true}))),
        ]);

        let collect = step(StepKind::DataCollection, "search", Some("news"));
        let mut deliver = step(StepKind::Delivery, "gmail", None);
        deliver
            .parameters
            .insert("body".into(), json!("News: {{news}}"));

        let t = task(vec![collect, deliver]);
        let record = exec.execute(&t).await;

        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.steps[1]
            .error
            .as_ref()
            .unwrap()
            .contains("upstream step failed"));
    }

    #[tokio::test]
    async fn test_unresolved_but_unowned_placeholder_is_not_starvation() {
        // A typo'd placeholder no step owns stays fail-soft: delivery runs.
        let exec = executor(vec![Box::new(StubConnector::ok(
            "gmail",
            json!({"sent": true}),
        ))]);
        let mut deliver = step(StepKind::Delivery, "gmail", None);
        deliver
            .parameters
            .insert("body".into(), json!("Hello {{typo_key}}"));
        let record = exec.execute(&task(vec![deliver])).await;
        assert_eq!(record.status, ExecutionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_timeout_is_step_failure() {
        let exec = executor(vec![Box::new(SlowConnector)]);
        let t = task(vec![step(StepKind::DataCollection, "slow", None)]);
        let record = exec.execute(&t).await;

        assert_eq!(record.status, ExecutionStatus::Completed);
        assert!(record.steps[0].error.as_ref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_unknown_service_is_hard_step_failure() {
        let exec = executor(vec![]);
        let t = task(vec![step(StepKind::DataCollection, "nope", None)]);
        let record = exec.execute(&t).await;
        assert!(record.steps[0]
            .error
            .as_ref()
            .unwrap()
            .contains("unknown service"));
    }

    #[tokio::test]
    async fn test_every_attempted_step_is_recorded() {
        let exec = executor(vec![
            Box::new(StubConnector::failing("search")),
            Box::new(StubConnector::ok("llm", json!({"content": "summary"}))),
            Box::new(StubConnector::ok("gmail", json!({"sent": true}))),
        ]);
        let t = task(vec![
            step(StepKind::DataCollection, "search", None),
            step(StepKind::Processing, "llm", Some("summary")),
            step(StepKind::Delivery, "gmail", None),
        ]);
        let record = exec.execute(&t).await;
        assert_eq!(record.steps.len(), 3);
        assert_eq!(record.status, ExecutionStatus::Completed);
    }
}
