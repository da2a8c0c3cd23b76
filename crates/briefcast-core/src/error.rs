//! Briefcast error type.

use thiserror::Error;

/// All errors surfaced by Briefcast crates.
#[derive(Error, Debug)]
pub enum BriefcastError {
    /// Configuration load/parse failure.
    #[error("Config error: {0}")]
    Config(String),

    /// The language model returned nothing usable, or the provider call
    /// itself failed. Callers cannot distinguish outage from schema mismatch.
    #[error("Translation failed: {0}")]
    Translation(String),

    /// A cron expression that does not parse to five well-formed fields.
    #[error("Invalid cron expression '{0}'")]
    InvalidCron(String),

    /// A structured plan that violates the registry or task invariants.
    #[error("Plan validation failed: {0}")]
    Validation(String),

    /// Lookup of a task id that is not in the store.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// A second trigger arrived while the task was still executing.
    #[error("Task '{0}' already has a run in flight")]
    RunInFlight(String),

    /// A connector call failed (network, service, unknown operation).
    #[error("Connector error: {0}")]
    Connector(String),

    /// LLM provider call failed.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Persistence failure.
    #[error("Store error: {0}")]
    Store(String),

    /// A step dispatch exceeded its bounded timeout.
    #[error("Step timed out after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BriefcastError>;
