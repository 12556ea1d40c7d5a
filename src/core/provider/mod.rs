//! Upstream provider access.
//!
//! - [http]: reqwest transport with timeouts, bounded retry and token-bucket pacing
//! - [snapshot]: wire shapes of the two per-event feeds and the day listing
//! - [fetcher]: concurrent, semaphore-bounded fetch of both feeds per event

mod fetcher;
mod http;
pub mod snapshot;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

pub use fetcher::SnapshotFetcher;
pub use http::HttpUpstream;
pub use snapshot::{Composite, CurrentSnapshot, LegacySnapshot, Snapshot};

/// The two per-event feed shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceVariant {
    Legacy,
    Current,
}

impl SourceVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceVariant::Legacy => "legacy",
            SourceVariant::Current => "current",
        }
    }

    pub fn endpoint_class(self) -> EndpointClass {
        match self {
            SourceVariant::Legacy => EndpointClass::Legacy,
            SourceVariant::Current => EndpointClass::Current,
        }
    }
}

impl std::fmt::Display for SourceVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider endpoint families; rate limits are configured per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
    Schedule,
    Legacy,
    Current,
}

impl EndpointClass {
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointClass::Schedule => "schedule",
            EndpointClass::Legacy => "legacy",
            EndpointClass::Current => "current",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub class: EndpointClass,
    pub date: NaiveDate,
    pub event_id: Option<String>,
}

impl UpstreamRequest {
    pub fn schedule(date: NaiveDate) -> Self {
        Self {
            class: EndpointClass::Schedule,
            date,
            event_id: None,
        }
    }

    pub fn snapshot(variant: SourceVariant, event_id: &str, date: NaiveDate) -> Self {
        Self {
            class: variant.endpoint_class(),
            date,
            event_id: Some(event_id.to_string()),
        }
    }
}

/// One entry of the day's event listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub external_id: String,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed {variant} payload: {message}")]
    Decode {
        variant: &'static str,
        message: String,
    },

    #[error("all sources failed for event {event_id}")]
    AllSourcesFailed { event_id: String },

    #[error("request limiter closed")]
    Closed,
}

impl FetchError {
    /// Whether the transport should try the same request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Transport(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Raw access to the provider. Implementations own retry and pacing;
/// callers see one result per logical request.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch(&self, request: &UpstreamRequest) -> Result<Bytes, FetchError>;
}
