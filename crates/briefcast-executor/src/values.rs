//! Smart value parsing — relative date expressions and result shape
//! normalization. Pure functions, no state.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

/// Field names connectors use to wrap their item lists.
const LIST_FIELDS: &[&str] = &[
    "videos", "events", "results", "items", "data", "emails", "messages",
];

/// Semantic type of a normalized list, for downstream formatting. Heuristic
/// and best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Video,
    Event,
    Email,
    SearchResult,
    Generic,
    Unknown,
}

/// Interpret a relative date expression against a timezone and base instant.
///
/// Recognizes `now`, `today`, `yesterday`, `tomorrow`, `last week`,
/// `last month`, and `N days/weeks/months ago` (case-insensitive), falling
/// back to strict ISO-8601. Everything except `now` resolves to 00:00 local
/// of the target day. Unrecognized input is `None`, never an error — callers
/// apply their own default.
pub fn parse_relative_date(input: &str, tz: &Tz, base: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = input.trim().to_lowercase();
    let base_date = base.with_timezone(tz).date_naive();

    match text.as_str() {
        "now" => return Some(base),
        "today" => return local_midnight(base_date, tz),
        "yesterday" => return local_midnight(base_date - Duration::days(1), tz),
        "tomorrow" => return local_midnight(base_date + Duration::days(1), tz),
        "last week" => return local_midnight(base_date - Duration::days(7), tz),
        "last month" => {
            return local_midnight(base_date.checked_sub_months(Months::new(1))?, tz);
        }
        _ => {}
    }

    // "N days ago" / "N weeks ago" / "N months ago"
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() == 3
        && words[2] == "ago"
        && let Ok(n) = words[0].parse::<u32>()
    {
        let target = match words[1].trim_end_matches('s') {
            "day" => Some(base_date - Duration::days(n as i64)),
            "week" => Some(base_date - Duration::days(7 * n as i64)),
            "month" => base_date.checked_sub_months(Months::new(n)),
            _ => None,
        };
        if let Some(date) = target {
            return local_midnight(date, tz);
        }
    }

    // Strict ISO-8601 fallbacks: full timestamp, then bare date.
    if let Ok(dt) = DateTime::parse_from_rfc3339(input.trim()) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d") {
        return local_midnight(date, tz);
    }

    None
}

/// 00:00 local on the given date, as a UTC instant. DST gaps at midnight
/// resolve to the earliest valid local time.
fn local_midnight(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&midnight).latest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Flatten a heterogeneous connector result into a uniform item list.
///
/// Checks, in order: already a list; a known list field (`videos`, `events`,
/// `results`, `items`, `data`, `emails`, `messages`); a `content` field that
/// is itself a structure (one level of recursion). No match = empty list.
pub fn normalize_list(value: &Value) -> Vec<Value> {
    normalize_inner(value, true)
}

fn normalize_inner(value: &Value, allow_content_recursion: bool) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Object(map) => {
            for field in LIST_FIELDS {
                if let Some(Value::Array(items)) = map.get(*field) {
                    return items.clone();
                }
            }
            if allow_content_recursion
                && let Some(content) = map.get("content")
                && (content.is_object() || content.is_array())
            {
                return normalize_inner(content, false);
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Tag a normalized list with its semantic type by sniffing the first
/// element's field names. Empty input is `Unknown`.
pub fn classify(items: &[Value]) -> ListKind {
    let Some(first) = items.first() else {
        return ListKind::Unknown;
    };
    let Value::Object(map) = first else {
        return ListKind::Generic;
    };

    let has = |key: &str| map.contains_key(key);
    let id_has_video = map
        .get("id")
        .and_then(|id| id.as_object())
        .is_some_and(|id| id.contains_key("videoId"));

    if has("videoId") || has("video_id") || has("channelTitle") || id_has_video {
        ListKind::Video
    } else if has("attendees") || (has("start") && (has("end") || has("summary"))) {
        ListKind::Event
    } else if has("subject") && (has("from") || has("to") || has("sender")) {
        ListKind::Email
    } else if (has("url") || has("link")) && (has("title") || has("snippet")) {
        ListKind::SearchResult
    } else {
        ListKind::Generic
    }
}
