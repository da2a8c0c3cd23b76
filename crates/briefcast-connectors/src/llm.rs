//! LLM processing operations — summarize, format, compose, filter, quote.
//!
//! Each operation wraps the shared provider with a deterministic,
//! low-temperature prompt. Results come back wrapped as `{"content": ...}`
//! so template resolution substitutes the text, not the envelope.

use async_trait::async_trait;
use briefcast_core::error::Result;
use briefcast_core::traits::{Connector, LlmProvider};
use serde_json::{Map, Value, json};
use std::sync::Arc;

use crate::{opt_str, opt_u64, unknown_operation};

/// Processing steps want reproducible output, not creative drift.
const OP_TEMPERATURE: f32 = 0.2;

pub struct LlmOpsConnector {
    provider: Arc<dyn LlmProvider>,
}

impl LlmOpsConnector {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    async fn generate(&self, system: String, user: String) -> Result<Value> {
        let content = self
            .provider
            .generate(&system, &user, OP_TEMPERATURE)
            .await?;
        Ok(json!({ "content": content }))
    }
}

/// The step's main payload as text: strings pass through, structures are
/// pretty-printed JSON so the model can read them.
fn content_text(params: &Map<String, Value>) -> String {
    match params.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => serde_json::to_string_pretty(other).unwrap_or_default(),
        None => String::new(),
    }
}

fn tone_clause(params: &Map<String, Value>) -> String {
    opt_str(params, "tone")
        .map(|t| format!(" Use a {t} tone."))
        .unwrap_or_default()
}

fn keywords_clause(params: &Map<String, Value>) -> String {
    match params.get("keywords") {
        Some(Value::Array(items)) if !items.is_empty() => {
            let words: Vec<&str> = items.iter().filter_map(|v| v.as_str()).collect();
            format!(" The user cares about: {}.", words.join(", "))
        }
        Some(Value::String(s)) if !s.is_empty() => format!(" The user cares about: {s}."),
        _ => String::new(),
    }
}

fn instructions_text(params: &Map<String, Value>) -> String {
    opt_str(params, "instructions").unwrap_or_default().to_string()
}

#[async_trait]
impl Connector for LlmOpsConnector {
    fn service(&self) -> &str {
        "llm"
    }

    async fn call(&self, operation: &str, params: &Map<String, Value>) -> Result<Value> {
        let content = content_text(params);
        let tone = tone_clause(params);
        let keywords = keywords_clause(params);
        let instructions = instructions_text(params);

        match operation {
            "summarize" => {
                self.generate(
                    format!(
                        "Summarize the provided content concisely. Keep concrete facts, \
                         drop filler.{tone} {instructions}"
                    ),
                    content,
                )
                .await
            }
            "format" => {
                self.generate(
                    format!(
                        "Reformat the provided content as clean, readable plain text with \
                         short sections and bullet points where they help. Do not invent \
                         information.{tone} {instructions}"
                    ),
                    content,
                )
                .await
            }
            "compose" => {
                self.generate(
                    format!("Write the requested text.{tone}{keywords}"),
                    format!("{instructions}\n\nSource material:\n{content}"),
                )
                .await
            }
            "compose_email" => {
                self.generate(
                    format!(
                        "Compose a personal briefing email body from the provided material. \
                         Plain text, greeting first, grouped sections, no subject line, no \
                         signature placeholders. If a section's material is missing, say so \
                         in one line rather than inventing it.{tone}{keywords} {instructions}"
                    ),
                    content,
                )
                .await
            }
            "filter_and_rank" => {
                let count = opt_u64(params, "count").unwrap_or(10);
                self.generate(
                    format!(
                        "From the provided items, keep those most relevant to the user's \
                         interests and rank them, best first. Return at most {count} items \
                         as a plain numbered list with one line each.{keywords}"
                    ),
                    content,
                )
                .await
            }
            "filter_and_summarize" => {
                self.generate(
                    format!(
                        "From the provided items, keep those most relevant to the user's \
                         interests, then summarize the survivors in a few sentences \
                         each.{tone}{keywords} {instructions}"
                    ),
                    content,
                )
                .await
            }
            "generate_quote" => {
                let topic = opt_str(params, "topic").unwrap_or("motivation");
                self.generate(
                    format!(
                        "Write one original, short inspirational quote. No attribution, no \
                         quotation marks.{tone}"
                    ),
                    format!("Topic: {topic}"),
                )
                .await
            }
            other => Err(unknown_operation("llm", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use briefcast_core::error::BriefcastError;
    use std::sync::Mutex;

    struct EchoProvider {
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl EchoProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, system: &str, prompt: &str, _t: f32) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), prompt.to_string()));
            Ok("generated text".into())
        }
    }

    #[tokio::test]
    async fn test_result_is_content_wrapped() {
        let provider = EchoProvider::new();
        let connector = LlmOpsConnector::new(provider);
        let mut params = Map::new();
        params.insert("content".into(), json!("three headlines"));

        let result = connector.call("summarize", &params).await.unwrap();
        assert_eq!(result, json!({"content": "generated text"}));
    }

    #[tokio::test]
    async fn test_structured_content_rendered_for_model() {
        let provider = EchoProvider::new();
        let connector = LlmOpsConnector::new(provider.clone());
        let mut params = Map::new();
        params.insert("content".into(), json!([{"title": "story one"}]));

        connector.call("summarize", &params).await.unwrap();
        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].1.contains("story one"));
    }

    #[tokio::test]
    async fn test_tone_and_keywords_reach_prompt() {
        let provider = EchoProvider::new();
        let connector = LlmOpsConnector::new(provider.clone());
        let mut params = Map::new();
        params.insert("content".into(), json!("items"));
        params.insert("tone".into(), json!("concise"));
        params.insert("keywords".into(), json!(["ai", "rust"]));

        connector.call("compose_email", &params).await.unwrap();
        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].0.contains("concise tone"));
        assert!(prompts[0].0.contains("ai, rust"));
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let connector = LlmOpsConnector::new(EchoProvider::new());
        let err = connector.call("hallucinate", &Map::new()).await.unwrap_err();
        assert!(matches!(err, BriefcastError::Connector(_)));
    }
}
