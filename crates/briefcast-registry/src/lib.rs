//! Operation registry — the closed vocabulary of executable steps.
//!
//! Pure lookup and validation over a static catalog. The translator feeds the
//! catalog to the language model and validates the returned plan against it;
//! the executor never sees a step this module has not approved.

use briefcast_core::types::Step;

/// One catalog entry: an operation a connector knows how to execute.
#[derive(Debug, Clone, Copy)]
pub struct OperationSpec {
    pub service: &'static str,
    pub operation: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
    pub description: &'static str,
}

/// The full catalog. Adding a connector operation means adding a row here.
pub const OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        service: "calendar",
        operation: "list_events",
        required: &[],
        optional: &["time_min", "time_max", "max_results"],
        description: "List calendar events in a time window (defaults to today)",
    },
    OperationSpec {
        service: "calendar",
        operation: "get_today",
        required: &[],
        optional: &["timezone"],
        description: "List today's calendar events",
    },
    OperationSpec {
        service: "gmail",
        operation: "send",
        required: &["to", "subject", "body"],
        optional: &[],
        description: "Send an email",
    },
    OperationSpec {
        service: "search",
        operation: "search",
        required: &["query"],
        optional: &["count"],
        description: "Web search for a query",
    },
    OperationSpec {
        service: "search",
        operation: "trending",
        required: &[],
        optional: &["topic", "count"],
        description: "Trending news, optionally filtered by topic",
    },
    OperationSpec {
        service: "search",
        operation: "quotes",
        required: &[],
        optional: &["topic"],
        description: "An inspirational quote, optionally on a topic",
    },
    OperationSpec {
        service: "search",
        operation: "hacker_news_top",
        required: &[],
        optional: &["count"],
        description: "Top Hacker News front-page stories",
    },
    OperationSpec {
        service: "search",
        operation: "fetch_content",
        required: &["url"],
        optional: &[],
        description: "Fetch and extract readable text from a URL",
    },
    OperationSpec {
        service: "youtube",
        operation: "search",
        required: &["query"],
        optional: &["max_results"],
        description: "Search YouTube videos",
    },
    OperationSpec {
        service: "youtube",
        operation: "trending",
        required: &[],
        optional: &["max_results", "region"],
        description: "Most popular YouTube videos",
    },
    OperationSpec {
        service: "youtube",
        operation: "create_playlist",
        required: &["title"],
        optional: &["video_ids", "description"],
        description: "Create a playlist, optionally seeded with videos",
    },
    OperationSpec {
        service: "youtube",
        operation: "search_and_create_playlist",
        required: &["query"],
        optional: &["title", "max_results"],
        description: "Search videos and collect them into a new playlist",
    },
    OperationSpec {
        service: "llm",
        operation: "summarize",
        required: &["content"],
        optional: &["instructions", "tone"],
        description: "Summarize content",
    },
    OperationSpec {
        service: "llm",
        operation: "format",
        required: &["content"],
        optional: &["instructions", "tone"],
        description: "Reformat content (markdown, sections, bullets)",
    },
    OperationSpec {
        service: "llm",
        operation: "compose",
        required: &["instructions"],
        optional: &["content", "tone", "keywords"],
        description: "Compose free-form text from instructions and content",
    },
    OperationSpec {
        service: "llm",
        operation: "compose_email",
        required: &["content"],
        optional: &["instructions", "tone", "keywords"],
        description: "Compose an email body from gathered content",
    },
    OperationSpec {
        service: "llm",
        operation: "filter_and_rank",
        required: &["content"],
        optional: &["keywords", "count"],
        description: "Filter a list by relevance and rank it",
    },
    OperationSpec {
        service: "llm",
        operation: "filter_and_summarize",
        required: &["content"],
        optional: &["keywords", "instructions", "tone"],
        description: "Filter a list by relevance, then summarize the survivors",
    },
    OperationSpec {
        service: "llm",
        operation: "generate_quote",
        required: &[],
        optional: &["topic", "tone"],
        description: "Generate an original motivational quote",
    },
];

/// Look up a catalog entry.
pub fn find(service: &str, operation: &str) -> Option<&'static OperationSpec> {
    OPERATIONS
        .iter()
        .find(|op| op.service == service && op.operation == operation)
}

/// Whether the pair is in the catalog.
pub fn is_supported(service: &str, operation: &str) -> bool {
    find(service, operation).is_some()
}

/// Required parameter names for a pair. Empty for unknown pairs.
pub fn required_params(service: &str, operation: &str) -> &'static [&'static str] {
    find(service, operation).map(|op| op.required).unwrap_or(&[])
}

/// All operation names a service supports.
pub fn operations_for(service: &str) -> Vec<&'static str> {
    OPERATIONS
        .iter()
        .filter(|op| op.service == service)
        .map(|op| op.operation)
        .collect()
}

/// All known service names, deduplicated, catalog order.
pub fn services() -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for op in OPERATIONS {
        if !out.contains(&op.service) {
            out.push(op.service);
        }
    }
    out
}

/// Outcome of validating one step against the catalog.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validate a step: the pair must exist and every required parameter must be
/// present. Unknown pairs get a did-you-mean pointing at the closest valid
/// operation for that service instead of a bare failure.
pub fn validate(step: &Step) -> ValidationReport {
    let mut errors = Vec::new();

    match find(&step.service, &step.operation) {
        Some(spec) => {
            for param in spec.required {
                if !step.parameters.contains_key(*param) {
                    errors.push(format!(
                        "{}.{}: missing required parameter '{param}'",
                        step.service, step.operation
                    ));
                }
            }
        }
        None => {
            let ops = operations_for(&step.service);
            if ops.is_empty() {
                errors.push(format!(
                    "unknown service '{}' (known services: {})",
                    step.service,
                    services().join(", ")
                ));
            } else {
                let closest = closest_operation(&step.service, &step.operation)
                    .unwrap_or(ops[0]);
                errors.push(format!(
                    "unknown operation '{}.{}' — did you mean '{}.{}'? (valid: {})",
                    step.service,
                    step.operation,
                    step.service,
                    closest,
                    ops.join(", ")
                ));
            }
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// The closest valid operation name for a service, by edit distance.
pub fn closest_operation(service: &str, operation: &str) -> Option<&'static str> {
    operations_for(service)
        .into_iter()
        .min_by_key(|candidate| edit_distance(candidate, operation))
}

/// Plain-text vocabulary for the translator's system prompt.
pub fn vocabulary_text() -> String {
    let mut out = String::new();
    for op in OPERATIONS {
        out.push_str(&format!(
            "- {}.{} — {}",
            op.service, op.operation, op.description
        ));
        if !op.required.is_empty() {
            out.push_str(&format!(" (required: {})", op.required.join(", ")));
        }
        if !op.optional.is_empty() {
            out.push_str(&format!(" (optional: {})", op.optional.join(", ")));
        }
        out.push('\n');
    }
    out
}

/// Levenshtein distance, small inputs only.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use briefcast_core::types::StepKind;

    fn step(service: &str, operation: &str, params: &[(&str, &str)]) -> Step {
        let mut parameters = serde_json::Map::new();
        for (k, v) in params {
            parameters.insert(k.to_string(), serde_json::Value::String(v.to_string()));
        }
        Step {
            kind: StepKind::DataCollection,
            service: service.into(),
            operation: operation.into(),
            parameters,
            output_binding: None,
        }
    }

    #[test]
    fn test_supported_pairs() {
        assert!(is_supported("calendar", "list_events"));
        assert!(is_supported("gmail", "send"));
        assert!(is_supported("llm", "compose_email"));
        assert!(!is_supported("gmail", "read"));
        assert!(!is_supported("slack", "post"));
    }

    #[test]
    fn test_required_params() {
        assert_eq!(required_params("gmail", "send"), &["to", "subject", "body"]);
        assert!(required_params("calendar", "get_today").is_empty());
        assert!(required_params("nope", "nope").is_empty());
    }

    #[test]
    fn test_validate_missing_param() {
        let report = validate(&step("gmail", "send", &[("to", "a@b.c")]));
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].contains("subject"));
    }

    #[test]
    fn test_validate_ok() {
        let report = validate(&step(
            "gmail",
            "send",
            &[("to", "a@b.c"), ("subject", "hi"), ("body", "text")],
        ));
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_unknown_operation_suggests_closest() {
        let report = validate(&step("youtube", "serch", &[]));
        assert!(!report.valid);
        assert!(report.errors[0].contains("did you mean 'youtube.search'"));
    }

    #[test]
    fn test_unknown_service_lists_services() {
        let report = validate(&step("slack", "post", &[]));
        assert!(!report.valid);
        assert!(report.errors[0].contains("unknown service"));
        assert!(report.errors[0].contains("calendar"));
    }

    #[test]
    fn test_vocabulary_text_mentions_every_pair() {
        let text = vocabulary_text();
        for op in OPERATIONS {
            assert!(text.contains(&format!("{}.{}", op.service, op.operation)));
        }
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("search", "search"), 0);
        assert_eq!(edit_distance("search", "serch"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
    }
}
