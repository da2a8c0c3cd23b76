//! Route handlers. All responses are `{"ok": bool, ...}` JSON envelopes.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use briefcast_core::error::BriefcastError;
use briefcast_core::traits::TaskRepository;
use briefcast_core::types::TaskStatus;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use super::server::AppState;

fn err_json(e: &BriefcastError) -> Json<Value> {
    Json(json!({ "ok": false, "error": e.to_string() }))
}

/// GET /api/v1/tasks
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.repo.list() {
        Ok(tasks) => {
            let tasks: Vec<Value> = tasks
                .iter()
                .map(|t| {
                    json!({
                        "id": t.id,
                        "name": t.name,
                        "owner": t.owner,
                        "cron": t.cron,
                        "timezone": t.timezone,
                        "status": t.status.as_str(),
                        "enabled": t.enabled,
                        "steps": t.steps.len(),
                        "last_run": t.last_run.map(|d| d.to_rfc3339()),
                        "next_run": t.next_run.map(|d| d.to_rfc3339()),
                    })
                })
                .collect();
            Json(json!({ "ok": true, "tasks": tasks }))
        }
        Err(e) => err_json(&e),
    }
}

/// POST /api/v1/tasks/{id}/execute — synchronous acceptance, asynchronous
/// completion. The run outcome lands in execution history.
pub async fn execute_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Value> {
    // Reject obviously-bad requests before accepting.
    if let Err(e) = state.repo.load(&id) {
        return err_json(&e);
    }

    let scheduler = state.scheduler.clone();
    let task_id = id.clone();
    tokio::spawn(async move {
        if let Err(e) = scheduler.execute_task(&task_id).await {
            tracing::warn!("⚠️ Manual run of '{}' failed: {}", task_id, e);
        }
    });

    Json(json!({ "ok": true, "accepted": id }))
}

/// POST /api/v1/tasks/{id}/approve — pending_approval → approved, and
/// register the timer if the task is enabled.
pub async fn approve_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Value> {
    let task = match state.repo.load(&id) {
        Ok(t) => t,
        Err(e) => return err_json(&e),
    };
    if task.status != TaskStatus::PendingApproval {
        return err_json(&BriefcastError::Validation(format!(
            "task is '{}', only pending_approval tasks can be approved",
            task.status.as_str()
        )));
    }
    if let Err(e) = state.repo.update_status(&id, TaskStatus::Approved) {
        return err_json(&e);
    }
    if task.enabled
        && let Err(e) = state.scheduler.register_task(&id).await
    {
        return err_json(&e);
    }
    Json(json!({ "ok": true, "id": id, "status": "approved" }))
}

/// POST /api/v1/tasks/{id}/enable
pub async fn enable_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Value> {
    if let Err(e) = state.repo.set_enabled(&id, true) {
        return err_json(&e);
    }
    // Only approved tasks get a timer; enabling a pending task just flips
    // the flag.
    match state.repo.load(&id) {
        Ok(task) if task.is_schedulable() => {
            if let Err(e) = state.scheduler.register_task(&id).await {
                return err_json(&e);
            }
        }
        Ok(_) => {}
        Err(e) => return err_json(&e),
    }
    Json(json!({ "ok": true, "id": id, "enabled": true }))
}

/// POST /api/v1/tasks/{id}/disable — future fires stop; an in-flight run
/// finishes under its own timeouts.
pub async fn disable_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Value> {
    if let Err(e) = state.repo.set_enabled(&id, false) {
        return err_json(&e);
    }
    state.scheduler.unregister_task(&id).await;
    if let Err(e) = state.repo.set_next_run(&id, None) {
        return err_json(&e);
    }
    Json(json!({ "ok": true, "id": id, "enabled": false }))
}

/// GET /api/v1/tasks/{id}/executions?limit=N
pub async fn list_executions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let limit = query
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(20);
    match state.repo.list_executions(&id, limit) {
        Ok(records) => {
            let runs: Vec<Value> = records
                .iter()
                .map(|r| {
                    json!({
                        "id": r.id,
                        "status": r.status.as_str(),
                        "started_at": r.started_at.to_rfc3339(),
                        "completed_at": r.completed_at.map(|d| d.to_rfc3339()),
                        "duration_ms": r.duration_ms,
                        "steps": r.steps,
                        "error": r.error,
                    })
                })
                .collect();
            Json(json!({ "ok": true, "executions": runs }))
        }
        Err(e) => err_json(&e),
    }
}
