use tracing::warn;

use crate::core::model::EventStatus;
use crate::core::provider::snapshot::Scalar;

/// `statusNum` values of the legacy feed.
const LEGACY_STATUS_CODES: &[(&str, EventStatus)] = &[
    ("1", EventStatus::Scheduled),
    ("2", EventStatus::InProgress),
    ("3", EventStatus::Completed),
];

/// `gameStatus` values of the current feed and the day listing.
const CURRENT_STATUS_CODES: &[(i64, EventStatus)] = &[
    (1, EventStatus::Scheduled),
    (2, EventStatus::InProgress),
    (3, EventStatus::Completed),
];

/// Unknown codes yield `None` ("no change") and are logged.
pub fn legacy_status(event_id: &str, raw: Option<&Scalar>) -> Option<EventStatus> {
    let code = raw?.to_text();
    let code = code.trim();
    if code.is_empty() {
        return None;
    }
    let found = LEGACY_STATUS_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, status)| *status);
    if found.is_none() {
        warn!(event_id, variant = "legacy", "Unknown status code {:?}", code);
    }
    found
}

pub fn current_status(event_id: &str, raw: Option<&Scalar>) -> Option<EventStatus> {
    let text = raw?.to_text();
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let found = text.parse::<i64>().ok().and_then(|code| {
        CURRENT_STATUS_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, status)| *status)
    });
    if found.is_none() {
        warn!(event_id, variant = "current", "Unknown status code {:?}", text);
    }
    found
}
