//! Lenient field parsers. Empty input means "not reported"; malformed input is
//! logged and dropped. None of these can fail the surrounding record.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use crate::core::provider::snapshot::Scalar;

pub fn parse_int(event_id: &str, field: &str, raw: Option<&Scalar>) -> Option<i64> {
    match raw? {
        Scalar::Int(v) => Some(*v),
        Scalar::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
        Scalar::Float(v) => {
            warn!(event_id, field, "Non-integral numeric value {}; leaving unset", v);
            None
        }
        Scalar::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<i64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(event_id, field, "Malformed numeric value {:?}; leaving unset", trimmed);
                    None
                }
            }
        }
    }
}

pub fn parse_id(raw: Option<&Scalar>) -> Option<String> {
    let text = raw?.to_text();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn parse_text(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn parse_timestamp(event_id: &str, field: &str, raw: Option<&str>) -> Option<DateTime<Utc>> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc));
    }
    // Some feeds omit the offset; those timestamps are UTC.
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    warn!(event_id, field, "Malformed timestamp {:?}; leaving unset", trimmed);
    None
}

/// Normalize a game clock to `M:SS`. Accepts ISO-8601 durations
/// (`PT05M12.00S`), `M:SS`, and bare seconds (`45.2`).
pub fn parse_clock(event_id: &str, raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = if let Some(rest) = trimmed.strip_prefix("PT") {
        parse_iso_clock(rest)
    } else if let Some((minutes, seconds)) = trimmed.split_once(':') {
        match (minutes.parse::<u32>(), seconds.parse::<f64>()) {
            (Ok(m), Ok(s)) if (0.0..60.0).contains(&s) => Some((m, s)),
            _ => None,
        }
    } else {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|s| (0.0..60.0).contains(s))
            .map(|s| (0, s))
    };

    match parsed {
        Some((minutes, seconds)) => Some(format!("{}:{:02}", minutes, seconds.floor() as u32)),
        None => {
            warn!(event_id, field = "clock", "Malformed clock {:?}; leaving unset", trimmed);
            None
        }
    }
}

fn parse_iso_clock(rest: &str) -> Option<(u32, f64)> {
    let body = rest.strip_suffix('S')?;
    let (minutes, seconds) = match body.split_once('M') {
        Some((m, s)) => (m.parse::<u32>().ok()?, s),
        None => (0, body),
    };
    let seconds = if seconds.is_empty() {
        0.0
    } else {
        seconds.parse::<f64>().ok()?
    };
    (0.0..60.0).contains(&seconds).then_some((minutes, seconds))
}
