//! Lightweight cron expression parser with timezone-aware next-run search.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Field syntax: *, */N, N, N-M, and comma lists of those.
//! Day-of-month and month are accepted but treated as unconstrained — the
//! translator only emits the common daily/weekday shapes.
//!
//! No cron crate dependency; next-run is a wall-clock minute walk in the
//! task's IANA timezone, so DST gaps and overlaps fall out of the offset at
//! each candidate instant.

use briefcast_core::error::{BriefcastError, Result};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use chrono_tz::Tz;

/// Search horizon in minutes. A weekday-constrained expression matches at
/// most 7 days out; 9 days leaves slack for DST transitions.
const SEARCH_HORIZON_MINUTES: i64 = 9 * 24 * 60;

const FIELD_CHARSET: &str = "0123456789*-/,";

/// Parsed cron fields. Only the fields the next-run search constrains.
#[derive(Debug, Clone, PartialEq)]
pub struct CronFields {
    pub minutes: Vec<u32>,
    pub hours: Vec<u32>,
    /// None = unconstrained (`*`). Values 0-6, 0 = Sunday.
    pub weekdays: Option<Vec<u32>>,
}

/// Check an expression is syntactically valid without computing anything.
pub fn validate_expression(expression: &str) -> Result<()> {
    parse(expression).map(|_| ())
}

/// Check a timezone name resolves to a real IANA zone.
pub fn validate_timezone(timezone: &str) -> Result<Tz> {
    timezone
        .parse::<Tz>()
        .map_err(|_| BriefcastError::Validation(format!("unknown timezone '{timezone}'")))
}

/// Parse a 5-field expression into its constrained fields.
pub fn parse(expression: &str) -> Result<CronFields> {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    if parts.len() != 5 {
        return Err(BriefcastError::InvalidCron(expression.to_string()));
    }
    for part in &parts {
        if !part.chars().all(|c| FIELD_CHARSET.contains(c)) {
            return Err(BriefcastError::InvalidCron(expression.to_string()));
        }
    }

    let minutes = parse_field(parts[0], 0, 59)
        .ok_or_else(|| BriefcastError::InvalidCron(expression.to_string()))?;
    let hours = parse_field(parts[1], 0, 23)
        .ok_or_else(|| BriefcastError::InvalidCron(expression.to_string()))?;
    // parts[2] (day of month) and parts[3] (month): charset-checked, unconstrained.
    let weekdays = if parts[4] == "*" {
        None
    } else {
        Some(
            parse_field(parts[4], 0, 6)
                .ok_or_else(|| BriefcastError::InvalidCron(expression.to_string()))?,
        )
    };

    Ok(CronFields {
        minutes,
        hours,
        weekdays,
    })
}

/// Compute the earliest instant strictly after `after` whose wall clock in
/// `timezone` matches the expression. Returns None for malformed expressions
/// or zones, or when nothing matches within the horizon.
pub fn next_run(expression: &str, timezone: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let fields = match parse(expression) {
        Ok(f) => f,
        Err(_) => {
            tracing::warn!("Invalid cron expression: '{}'", expression);
            return None;
        }
    };
    let tz: Tz = match timezone.parse() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!("Invalid timezone: '{}'", timezone);
            return None;
        }
    };

    // Walk forward minute by minute in the target zone. Advancing a
    // DateTime<Tz> by a Duration moves absolute time, so local wall-clock
    // fields skip or repeat across DST edges exactly as real clocks do.
    let mut candidate = (after + Duration::minutes(1)).with_timezone(&tz);
    candidate = candidate.with_second(0).unwrap_or(candidate);
    candidate = candidate.with_nanosecond(0).unwrap_or(candidate);

    for _ in 0..SEARCH_HORIZON_MINUTES {
        let weekday_ok = fields
            .weekdays
            .as_ref()
            .is_none_or(|days| days.contains(&candidate.weekday().num_days_from_sunday()));

        if weekday_ok
            && fields.minutes.contains(&candidate.minute())
            && fields.hours.contains(&candidate.hour())
        {
            return Some(candidate.with_timezone(&Utc));
        }
        candidate += Duration::minutes(1);
    }

    None
}

/// Parse a cron field into a sorted list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    if field == "*" {
        return Some((min..=max).collect());
    }

    // */N — every N
    if let Some(step) = field.strip_prefix("*/") {
        let n: u32 = step.parse().ok()?;
        if n == 0 {
            return None;
        }
        return Some((min..=max).step_by(n as usize).collect());
    }

    // Comma list; each item a single value or an inclusive range "a-b".
    let mut values = Vec::new();
    for item in field.split(',') {
        let item = item.trim();
        if let Some((lo, hi)) = item.split_once('-') {
            let lo: u32 = lo.parse().ok()?;
            let hi: u32 = hi.parse().ok()?;
            if lo > hi || lo < min || hi > max {
                return None;
            }
            values.extend(lo..=hi);
        } else {
            let n: u32 = item.parse().ok()?;
            if n < min || n > max {
                return None;
            }
            values.push(n);
        }
    }
    values.sort_unstable();
    values.dedup();
    if values.is_empty() { None } else { Some(values) }
}
