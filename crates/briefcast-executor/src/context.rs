//! Run-scoped template context and `{{name}}` resolution.
//!
//! Every run starts with a set of reserved date/time keys computed once in
//! the task's timezone; steps with an output binding add to the map as they
//! succeed. Resolution fails soft: a placeholder with no matching key is
//! left in place so later steps and auditors can see what went unresolved.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Built-in keys available to every run. Output bindings must not collide
/// with these.
pub const RESERVED_KEYS: &[&str] = &[
    "date",
    "date_short",
    "time",
    "weekday",
    "month",
    "year",
    "yesterday",
    "yesterday_short",
    "yesterday_weekday",
];

/// Whether a binding name collides with a reserved context key.
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// The run-scoped key → value map.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    values: HashMap<String, Value>,
}

impl RunContext {
    /// An empty context with no built-ins.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context seeded with the reserved date/time keys, computed once in
    /// the given timezone.
    pub fn seeded(tz: &Tz, now: DateTime<Utc>) -> Self {
        let local = now.with_timezone(tz);
        let yesterday = local - Duration::days(1);

        let mut ctx = Self::new();
        ctx.bind("date", local.format("%A, %B %-d, %Y").to_string().into());
        ctx.bind("date_short", local.format("%Y-%m-%d").to_string().into());
        ctx.bind("time", local.format("%H:%M").to_string().into());
        ctx.bind("weekday", local.format("%A").to_string().into());
        ctx.bind("month", local.format("%B").to_string().into());
        ctx.bind("year", local.format("%Y").to_string().into());
        ctx.bind(
            "yesterday",
            yesterday.format("%A, %B %-d, %Y").to_string().into(),
        );
        ctx.bind(
            "yesterday_short",
            yesterday.format("%Y-%m-%d").to_string().into(),
        );
        ctx.bind(
            "yesterday_weekday",
            yesterday.format("%A").to_string().into(),
        );
        ctx
    }

    pub fn bind(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Resolve every parameter value against the context.
    pub fn resolve(&self, parameters: &Map<String, Value>) -> Map<String, Value> {
        parameters
            .iter()
            .map(|(k, v)| (k.clone(), self.resolve_value(v)))
            .collect()
    }

    fn resolve_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.resolve_string(s)),
            // Arrays may reference bound keys by bare name; those expand in
            // place. Other elements resolve recursively.
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) if self.values.contains_key(s.as_str()) => {
                            self.values[s.as_str()].clone()
                        }
                        other => self.resolve_value(other),
                    })
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Replace each `{{name}}` with the stringified bound value. Unknown
    /// names stay as-is.
    pub fn resolve_string(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after_open = &rest[open + 2..];
            match after_open.find("}}") {
                Some(close) => {
                    let name = after_open[..close].trim();
                    match self.values.get(name) {
                        Some(value) => out.push_str(&stringify(value)),
                        None => {
                            out.push_str("{{");
                            out.push_str(&after_open[..close]);
                            out.push_str("}}");
                        }
                    }
                    rest = &after_open[close + 2..];
                }
                None => {
                    // Unterminated opener; emit verbatim.
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Stringify a bound value for template substitution. LLM steps wrap free
/// text in a `content` field; substitute that field's value when present.
fn stringify(value: &Value) -> String {
    if let Value::Object(map) = value
        && let Some(content) = map.get("content")
    {
        return stringify(content);
    }
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Names of `{{...}}` placeholders still present in a resolved string.
pub fn unresolved_placeholders(input: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = input;
    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                names.push(after_open[..close].trim().to_string());
                rest = &after_open[close + 2..];
            }
            None => break,
        }
    }
    names
}
