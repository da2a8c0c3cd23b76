//! SQLite implementation of the task repository.

use std::path::Path;
use std::sync::Mutex;

use briefcast_core::error::{BriefcastError, Result};
use briefcast_core::traits::TaskRepository;
use briefcast_core::types::{
    ExecutionRecord, ExecutionStatus, Personalization, Step, Task, TaskStatus,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

/// SQLite-backed store for all task and execution data.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| BriefcastError::Store(format!("DB open: {e}")))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| BriefcastError::Store(format!("DB open: {e}")))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                cron TEXT NOT NULL,
                timezone TEXT NOT NULL,
                steps TEXT NOT NULL,                -- JSON array of steps
                personalization TEXT NOT NULL,      -- JSON object
                enabled INTEGER NOT NULL DEFAULT 1,
                status TEXT NOT NULL DEFAULT 'pending_approval',
                created_at TEXT NOT NULL,
                last_run TEXT,
                next_run TEXT
            );

            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                status TEXT NOT NULL DEFAULT 'running',
                duration_ms INTEGER,
                steps TEXT NOT NULL DEFAULT '[]',   -- JSON array of step results
                error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_executions_task
                ON executions(task_id, started_at);
         ",
            )
            .map_err(|e| BriefcastError::Store(format!("Migration: {e}")))
    }

    fn query_tasks(
        &self,
        where_clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Task>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT id, owner, name, description, cron, timezone, steps, personalization,
                    enabled, status, created_at, last_run, next_run
             FROM tasks {where_clause} ORDER BY created_at"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| BriefcastError::Store(format!("Prepare: {e}")))?;
        let rows = stmt
            .query_map(params, row_to_task_parts)
            .map_err(|e| BriefcastError::Store(format!("Query: {e}")))?;

        let mut tasks = Vec::new();
        for row in rows {
            let parts = row.map_err(|e| BriefcastError::Store(format!("Row: {e}")))?;
            tasks.push(parts_to_task(parts)?);
        }
        Ok(tasks)
    }
}

/// Raw column tuple for a task row, converted to a Task after the statement
/// is done so JSON/date parse errors stay in our error type.
type TaskParts = (
    String,         // id
    String,         // owner
    String,         // name
    String,         // description
    String,         // cron
    String,         // timezone
    String,         // steps JSON
    String,         // personalization JSON
    bool,           // enabled
    String,         // status
    String,         // created_at
    Option<String>, // last_run
    Option<String>, // next_run
);

fn row_to_task_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
    ))
}

fn parts_to_task(parts: TaskParts) -> Result<Task> {
    let (
        id,
        owner,
        name,
        description,
        cron,
        timezone,
        steps_json,
        personalization_json,
        enabled,
        status,
        created_at,
        last_run,
        next_run,
    ) = parts;

    let steps: Vec<Step> = serde_json::from_str(&steps_json)
        .map_err(|e| BriefcastError::Store(format!("Bad steps JSON for task {id}: {e}")))?;
    let personalization: Personalization = serde_json::from_str(&personalization_json)
        .map_err(|e| BriefcastError::Store(format!("Bad personalization for task {id}: {e}")))?;
    let status = TaskStatus::parse(&status)
        .ok_or_else(|| BriefcastError::Store(format!("Bad status '{status}' for task {id}")))?;

    Ok(Task {
        id,
        owner,
        name,
        description,
        cron,
        timezone,
        steps,
        personalization,
        enabled,
        status,
        created_at: parse_ts(&created_at)?,
        last_run: last_run.as_deref().map(parse_ts).transpose()?,
        next_run: next_run.as_deref().map(parse_ts).transpose()?,
    })
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| BriefcastError::Store(format!("Bad timestamp '{s}': {e}")))
}

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

impl TaskRepository for SqliteTaskStore {
    fn insert(&self, task: &Task) -> Result<()> {
        let steps = serde_json::to_string(&task.steps)
            .map_err(|e| BriefcastError::Store(format!("Serialize steps: {e}")))?;
        let personalization = serde_json::to_string(&task.personalization)
            .map_err(|e| BriefcastError::Store(format!("Serialize personalization: {e}")))?;

        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO tasks (id, owner, name, description, cron, timezone, steps,
                                    personalization, enabled, status, created_at, last_run, next_run)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    task.id,
                    task.owner,
                    task.name,
                    task.description,
                    task.cron,
                    task.timezone,
                    steps,
                    personalization,
                    task.enabled,
                    task.status.as_str(),
                    ts(&task.created_at),
                    task.last_run.as_ref().map(ts),
                    task.next_run.as_ref().map(ts),
                ],
            )
            .map_err(|e| BriefcastError::Store(format!("Insert task: {e}")))?;
        tracing::debug!("💾 Task '{}' saved", task.id);
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Task> {
        let tasks = self.query_tasks("WHERE id = ?1", &[&id])?;
        tasks
            .into_iter()
            .next()
            .ok_or_else(|| BriefcastError::TaskNotFound(id.to_string()))
    }

    fn list(&self) -> Result<Vec<Task>> {
        self.query_tasks("", &[])
    }

    fn list_enabled_approved(&self) -> Result<Vec<Task>> {
        self.query_tasks("WHERE enabled = 1 AND status = 'approved'", &[])
    }

    fn update_status(&self, id: &str, status: TaskStatus) -> Result<()> {
        let changed = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE tasks SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )
            .map_err(|e| BriefcastError::Store(format!("Update status: {e}")))?;
        if changed == 0 {
            return Err(BriefcastError::TaskNotFound(id.to_string()));
        }
        Ok(())
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let changed = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE tasks SET enabled = ?1 WHERE id = ?2",
                params![enabled, id],
            )
            .map_err(|e| BriefcastError::Store(format!("Set enabled: {e}")))?;
        if changed == 0 {
            return Err(BriefcastError::TaskNotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM executions WHERE task_id = ?1", params![id])
            .map_err(|e| BriefcastError::Store(format!("Delete history: {e}")))?;
        conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])
            .map_err(|e| BriefcastError::Store(format!("Delete task: {e}")))?;
        tracing::debug!("🗑️ Task '{}' and its history deleted", id);
        Ok(())
    }

    fn record_run(
        &self,
        id: &str,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE tasks SET last_run = ?1, next_run = ?2 WHERE id = ?3",
                params![ts(&last_run), next_run.as_ref().map(ts), id],
            )
            .map_err(|e| BriefcastError::Store(format!("Record run: {e}")))?;
        Ok(())
    }

    fn set_next_run(&self, id: &str, next_run: Option<DateTime<Utc>>) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE tasks SET next_run = ?1 WHERE id = ?2",
                params![next_run.as_ref().map(ts), id],
            )
            .map_err(|e| BriefcastError::Store(format!("Set next run: {e}")))?;
        Ok(())
    }

    fn insert_execution(&self, record: &ExecutionRecord) -> Result<()> {
        let steps = serde_json::to_string(&record.steps)
            .map_err(|e| BriefcastError::Store(format!("Serialize step results: {e}")))?;
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO executions (id, task_id, started_at, completed_at, status,
                                         duration_ms, steps, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.task_id,
                    ts(&record.started_at),
                    record.completed_at.as_ref().map(ts),
                    record.status.as_str(),
                    record.duration_ms,
                    steps,
                    record.error,
                ],
            )
            .map_err(|e| BriefcastError::Store(format!("Insert execution: {e}")))?;
        Ok(())
    }

    fn finalize_execution(&self, record: &ExecutionRecord) -> Result<()> {
        let steps = serde_json::to_string(&record.steps)
            .map_err(|e| BriefcastError::Store(format!("Serialize step results: {e}")))?;
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE executions SET completed_at = ?1, status = ?2, duration_ms = ?3,
                                       steps = ?4, error = ?5
                 WHERE id = ?6",
                params![
                    record.completed_at.as_ref().map(ts),
                    record.status.as_str(),
                    record.duration_ms,
                    steps,
                    record.error,
                    record.id,
                ],
            )
            .map_err(|e| BriefcastError::Store(format!("Finalize execution: {e}")))?;
        Ok(())
    }

    fn list_executions(&self, task_id: &str, limit: usize) -> Result<Vec<ExecutionRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, task_id, started_at, completed_at, status, duration_ms, steps, error
                 FROM executions WHERE task_id = ?1
                 ORDER BY started_at DESC LIMIT ?2",
            )
            .map_err(|e| BriefcastError::Store(format!("Prepare: {e}")))?;

        let rows = stmt
            .query_map(params![task_id, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })
            .map_err(|e| BriefcastError::Store(format!("Query: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            let (id, task_id, started_at, completed_at, status, duration_ms, steps, error) =
                row.map_err(|e| BriefcastError::Store(format!("Row: {e}")))?;
            let status = ExecutionStatus::parse(&status).ok_or_else(|| {
                BriefcastError::Store(format!("Bad execution status '{status}'"))
            })?;
            records.push(ExecutionRecord {
                id,
                task_id,
                started_at: parse_ts(&started_at)?,
                completed_at: completed_at.as_deref().map(parse_ts).transpose()?,
                status,
                duration_ms: duration_ms.map(|d| d as u64),
                steps: serde_json::from_str(&steps)
                    .map_err(|e| BriefcastError::Store(format!("Bad step results: {e}")))?,
                error,
            });
        }
        Ok(records)
    }
}
