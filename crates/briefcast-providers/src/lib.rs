//! # Briefcast Providers
//!
//! The language-model side of the engine: a single OpenAI-compatible chat
//! completions client. Any endpoint speaking that wire shape (OpenAI, Groq,
//! DeepSeek, Ollama, llama.cpp, OpenRouter) works by pointing
//! `[llm] endpoint` at it.

mod openai_compatible;

pub use openai_compatible::OpenAiCompatibleProvider;

use briefcast_core::config::BriefcastConfig;
use briefcast_core::error::Result;
use briefcast_core::traits::LlmProvider;
use std::sync::Arc;

/// Create the configured provider.
pub fn create_provider(config: &BriefcastConfig) -> Result<Arc<dyn LlmProvider>> {
    Ok(Arc::new(OpenAiCompatibleProvider::from_config(config)?))
}
