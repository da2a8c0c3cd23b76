//! # Briefcast Connectors
//!
//! The per-service collaborators the executor dispatches steps to, all
//! behind the uniform `(operation, parameters) -> result` contract. Data
//! connectors speak REST via reqwest; delivery goes out over SMTP; `llm`
//! operations wrap the shared provider with deterministic low-temperature
//! prompts.

pub mod calendar;
pub mod gmail;
pub mod llm;
pub mod search;
pub mod youtube;

pub use calendar::CalendarConnector;
pub use gmail::GmailConnector;
pub use llm::LlmOpsConnector;
pub use search::SearchConnector;
pub use youtube::YoutubeConnector;

use briefcast_core::config::BriefcastConfig;
use briefcast_core::error::{BriefcastError, Result};
use briefcast_core::traits::{Connector, LlmProvider};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Build the full connector set from configuration.
pub fn default_set(
    config: &BriefcastConfig,
    provider: Arc<dyn LlmProvider>,
) -> Vec<Box<dyn Connector>> {
    vec![
        Box::new(CalendarConnector::new(&config.calendar)),
        Box::new(GmailConnector::new(&config.smtp)),
        Box::new(SearchConnector::new(&config.search)),
        Box::new(YoutubeConnector::new(&config.youtube)),
        Box::new(LlmOpsConnector::new(provider)),
    ]
}

/// A required string parameter, as a connector error if absent. The registry
/// already validated required parameters at plan time; this is the runtime
/// backstop for hand-built or edited tasks.
pub(crate) fn required_str<'a>(
    params: &'a Map<String, Value>,
    key: &str,
    operation: &str,
) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            BriefcastError::Connector(format!("{operation}: missing string parameter '{key}'"))
        })
}

pub(crate) fn opt_str<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Optional numeric parameter; accepts numbers or numeric strings (the
/// translator emits both).
pub(crate) fn opt_u64(params: &Map<String, Value>, key: &str) -> Option<u64> {
    match params.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub(crate) fn unknown_operation(service: &str, operation: &str) -> BriefcastError {
    BriefcastError::Connector(format!("service '{service}' has no operation '{operation}'"))
}
