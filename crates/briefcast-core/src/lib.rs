//! # Briefcast Core
//!
//! Shared foundation for the Briefcast workspace: configuration, the error
//! type, the task/step/execution data model, and the traits that connect the
//! orchestration engine to its external collaborators (LLM provider, service
//! connectors, task repository).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::BriefcastConfig;
pub use error::{BriefcastError, Result};
pub use traits::{Connector, LlmProvider, TaskRepository};
pub use types::{
    ExecutionRecord, ExecutionStatus, Personalization, Step, StepKind, StepResult, StepStatus,
    Task, TaskStatus, Tone,
};
