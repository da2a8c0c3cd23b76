//! # Briefcast Translator
//!
//! Converts a plain-language request ("every morning at 7am, email me my
//! calendar and trending AI news") into a structured, validated task. The
//! language model proposes; deterministic validation against the operation
//! registry disposes. Nothing is persisted here — a rejected plan never
//! reaches the store, and the caller decides whether to resubmit.

use std::collections::HashMap;
use std::sync::Arc;

use briefcast_core::error::{BriefcastError, Result};
use briefcast_core::traits::LlmProvider;
use briefcast_core::types::{Personalization, Step, StepKind, Task, Tone};
use briefcast_executor::context;
use briefcast_scheduler::cron;
use serde::Deserialize;

/// Temperature for plan generation. Low: we want schema discipline, not
/// creativity.
const PLAN_TEMPERATURE: f32 = 0.1;

/// The model's structured answer, before validation.
#[derive(Debug, Deserialize)]
struct PlanDraft {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(alias = "cron_expression", alias = "schedule")]
    cron: String,
    timezone: String,
    steps: Vec<Step>,
    #[serde(default)]
    personalization: PersonalizationDraft,
}

#[derive(Debug, Default, Deserialize)]
struct PersonalizationDraft {
    #[serde(default)]
    tone: Option<Tone>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    filters: HashMap<String, String>,
}

/// Natural-language → task translator.
pub struct PlanTranslator {
    provider: Arc<dyn LlmProvider>,
}

impl PlanTranslator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Translate a request into a task in `pending_approval` status, or a
    /// structured failure. Does not retry and does not persist.
    pub async fn translate(&self, request: &str, owner: &str) -> Result<Task> {
        let raw = self
            .provider
            .generate(&system_prompt(), request, PLAN_TEMPERATURE)
            .await
            .map_err(|e| BriefcastError::Translation(e.to_string()))?;

        let draft = parse_plan(&raw)?;
        validate_plan(&draft)?;

        let mut task = Task::new(owner, &draft.name, &draft.cron, &draft.timezone, draft.steps);
        task.description = draft.description;
        task.personalization = Personalization {
            tone: draft.personalization.tone.unwrap_or_default(),
            keywords: draft.personalization.keywords,
            filters: draft.personalization.filters,
        };
        tracing::info!(
            "🧭 Translated request into plan '{}' ({} step(s), {} {})",
            task.name,
            task.steps.len(),
            task.cron,
            task.timezone
        );
        Ok(task)
    }
}

/// Parse the model output into a draft, tolerating markdown code fences and
/// prose around the JSON object.
fn parse_plan(raw: &str) -> Result<PlanDraft> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &raw[s..=e],
        _ => {
            return Err(BriefcastError::Translation(
                "model returned no JSON object".into(),
            ));
        }
    };
    serde_json::from_str(json)
        .map_err(|e| BriefcastError::Translation(format!("malformed plan: {e}")))
}

/// Deterministic validation: cron syntax, timezone, at least one delivery
/// step, every step in the registry, no reserved-key binding collisions.
/// The first actionable error wins.
fn validate_plan(draft: &PlanDraft) -> Result<()> {
    cron::validate_expression(&draft.cron)?;
    cron::validate_timezone(&draft.timezone)?;

    if draft.steps.is_empty() {
        return Err(BriefcastError::Validation("plan has no steps".into()));
    }
    if !draft.steps.iter().any(|s| s.kind == StepKind::Delivery) {
        return Err(BriefcastError::Validation(
            "plan has no delivery step — nothing would ever reach the user".into(),
        ));
    }

    for step in &draft.steps {
        let report = briefcast_registry::validate(step);
        if !report.valid {
            return Err(BriefcastError::Validation(report.errors[0].clone()));
        }
        if let Some(binding) = &step.output_binding
            && context::is_reserved(binding)
        {
            return Err(BriefcastError::Validation(format!(
                "output binding '{binding}' collides with a built-in context key"
            )));
        }
    }
    Ok(())
}

/// System prompt: the registry vocabulary plus the plan schema and rules.
fn system_prompt() -> String {
    format!(
        "You convert a user's recurring-briefing request into a JSON plan.\n\
         \n\
         Respond with ONLY a JSON object, no prose, shaped like:\n\
         {{\n\
           \"name\": \"short task name\",\n\
           \"description\": \"one sentence\",\n\
           \"cron\": \"MIN HOUR * * DOW\",\n\
           \"timezone\": \"IANA zone, e.g. America/Los_Angeles\",\n\
           \"steps\": [\n\
             {{\"kind\": \"data_collection\", \"service\": \"...\", \"operation\": \"...\",\n\
               \"parameters\": {{}}, \"output_binding\": \"snake_case_name\"}}\n\
           ],\n\
           \"personalization\": {{\"tone\": \"friendly\", \"keywords\": [], \"filters\": {{}}}}\n\
         }}\n\
         \n\
         Rules:\n\
         - Derive the 5-field cron expression and IANA timezone from the schedule\n\
           phrasing. Use UTC when no timezone is implied. Fields may only contain\n\
           digits, '*', '-', '/', ','. Weekdays: 0=Sunday.\n\
         - Use ONLY these operations (service.operation):\n\
         {vocabulary}\
         - Order steps: data_collection first, then processing, delivery last.\n\
           Every plan MUST end with at least one delivery step.\n\
         - Chain steps: give a producing step an \"output_binding\" and reference\n\
           it later as {{{{binding_name}}}} inside string parameters.\n\
         - These placeholders are always available and must not be used as\n\
           output bindings: {reserved}.\n\
         - Tag tone (professional|friendly|casual|concise) and topic keywords\n\
           from the request under \"personalization\".\n",
        vocabulary = indent(&briefcast_registry::vocabulary_text()),
        reserved = context::RESERVED_KEYS.join(", "),
    )
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {line}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CannedProvider {
        response: Result<String>,
    }

    impl CannedProvider {
        fn ok(response: &str) -> Self {
            Self {
                response: Ok(response.to_string()),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err(BriefcastError::Provider("503 from upstream".into())),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, _system: &str, _prompt: &str, _t: f32) -> Result<String> {
            match &self.response {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(BriefcastError::Provider("503 from upstream".into())),
            }
        }
    }

    const CALENDAR_EMAIL_PLAN: &str = r#"{
        "name": "Weekday calendar email",
        "description": "Email today's calendar every weekday morning",
        "cron": "0 8 * * 1-5",
        "timezone": "America/Los_Angeles",
        "steps": [
            {"kind": "data_collection", "service": "calendar", "operation": "list_events",
             "parameters": {}, "output_binding": "calendar_events"},
            {"kind": "delivery", "service": "gmail", "operation": "send",
             "parameters": {"to": "me@example.com", "subject": "Your day",
                            "body": "{{calendar_events}}"}}
        ],
        "personalization": {"tone": "friendly", "keywords": ["calendar"]}
    }"#;

    fn translator(provider: CannedProvider) -> PlanTranslator {
        PlanTranslator::new(Arc::new(provider))
    }

    #[tokio::test]
    async fn test_weekday_calendar_email_plan() {
        let t = translator(CannedProvider::ok(CALENDAR_EMAIL_PLAN));
        let task = t.translate("every weekday at 8am Pacific, email me today's calendar", "me")
            .await
            .unwrap();

        assert_eq!(task.cron, "0 8 * * 1-5");
        assert_eq!(task.timezone, "America/Los_Angeles");
        assert_eq!(task.status, briefcast_core::types::TaskStatus::PendingApproval);
        assert_eq!(task.steps.len(), 2);
        assert_eq!(task.steps[0].label(), "calendar.list_events");
        assert_eq!(
            task.steps[0].output_binding.as_deref(),
            Some("calendar_events")
        );
        assert_eq!(task.steps[1].label(), "gmail.send");
        assert!(
            task.steps[1].parameters["body"]
                .as_str()
                .unwrap()
                .contains("{{calendar_events}}")
        );
    }

    #[tokio::test]
    async fn test_code_fenced_output_accepted() {
        let fenced = format!("Here is the plan:\n```json\n{CALENDAR_EMAIL_PLAN}\n```\n");
        let t = translator(CannedProvider::ok(&fenced));
        assert!(t.translate("calendar email", "me").await.is_ok());
    }

    #[tokio::test]
    async fn test_provider_outage_is_translation_error() {
        let t = translator(CannedProvider::failing());
        let err = t.translate("anything", "me").await.unwrap_err();
        assert!(matches!(err, BriefcastError::Translation(_)));
    }

    #[tokio::test]
    async fn test_free_text_is_translation_error() {
        let t = translator(CannedProvider::ok("Sorry, I cannot help with that."));
        let err = t.translate("anything", "me").await.unwrap_err();
        assert!(matches!(err, BriefcastError::Translation(_)));
    }

    #[tokio::test]
    async fn test_unknown_operation_rejected() {
        let plan = CALENDAR_EMAIL_PLAN.replace("list_events", "list_meetings");
        let t = translator(CannedProvider::ok(&plan));
        let err = t.translate("calendar email", "me").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unknown operation"));
        // The rejection names valid operations for the offending service.
        assert!(msg.contains("list_events"));
    }

    #[tokio::test]
    async fn test_missing_delivery_step_rejected() {
        let plan = r#"{
            "name": "No delivery",
            "cron": "0 8 * * *",
            "timezone": "UTC",
            "steps": [
                {"kind": "data_collection", "service": "search", "operation": "trending",
                 "parameters": {}}
            ]
        }"#;
        let t = translator(CannedProvider::ok(plan));
        let err = t.translate("trends", "me").await.unwrap_err();
        assert!(err.to_string().contains("no delivery step"));
    }

    #[tokio::test]
    async fn test_invalid_cron_rejected() {
        let plan = CALENDAR_EMAIL_PLAN.replace("0 8 * * 1-5", "every morning");
        let t = translator(CannedProvider::ok(&plan));
        let err = t.translate("calendar email", "me").await.unwrap_err();
        assert!(matches!(err, BriefcastError::InvalidCron(_)));
    }

    #[tokio::test]
    async fn test_reserved_binding_rejected() {
        let plan = CALENDAR_EMAIL_PLAN.replace("calendar_events", "date");
        let t = translator(CannedProvider::ok(&plan));
        let err = t.translate("calendar email", "me").await.unwrap_err();
        assert!(err.to_string().contains("built-in context key"));
    }

    #[tokio::test]
    async fn test_missing_required_param_rejected() {
        let plan = r#"{
            "name": "Broken send",
            "cron": "0 8 * * *",
            "timezone": "UTC",
            "steps": [
                {"kind": "delivery", "service": "gmail", "operation": "send",
                 "parameters": {"to": "me@example.com"}}
            ]
        }"#;
        let t = translator(CannedProvider::ok(plan));
        let err = t.translate("email me", "me").await.unwrap_err();
        assert!(err.to_string().contains("missing required parameter"));
    }

    #[test]
    fn test_system_prompt_carries_vocabulary() {
        let prompt = system_prompt();
        assert!(prompt.contains("calendar.list_events"));
        assert!(prompt.contains("llm.compose_email"));
        assert!(prompt.contains("output_binding"));
    }
}
