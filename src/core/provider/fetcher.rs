use bytes::Bytes;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::snapshot::decode_listing;
use super::{
    Composite, FetchError, ScheduledEvent, Snapshot, SourceVariant, Upstream, UpstreamRequest,
};
use crate::core::archive::{SnapshotArchive, snapshot_key};

/// Fetches both feeds for an event concurrently. A single semaphore caps
/// outbound requests across every caller sharing this fetcher.
#[derive(Clone)]
pub struct SnapshotFetcher {
    upstream: Arc<dyn Upstream>,
    permits: Arc<Semaphore>,
    archive: Arc<dyn SnapshotArchive>,
}

impl SnapshotFetcher {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        max_in_flight: usize,
        archive: Arc<dyn SnapshotArchive>,
    ) -> Self {
        Self {
            upstream,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            archive,
        }
    }

    async fn request(&self, request: &UpstreamRequest) -> Result<Bytes, FetchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::Closed)?;
        self.upstream.fetch(request).await
    }

    /// Today's listing of events with their scheduled start.
    pub async fn fetch_schedule(&self, date: NaiveDate) -> Result<Vec<ScheduledEvent>, FetchError> {
        let body = self.request(&UpstreamRequest::schedule(date)).await?;
        decode_listing(&body)
    }

    /// Fetch both feeds. Fails only if neither slot produced a snapshot.
    pub async fn fetch(&self, event_id: &str, date: NaiveDate) -> Result<Composite, FetchError> {
        let (legacy, current) = tokio::join!(
            self.fetch_slot(SourceVariant::Legacy, event_id, date),
            self.fetch_slot(SourceVariant::Current, event_id, date),
        );

        let mut composite = Composite::default();
        for snapshot in [legacy, current].into_iter().flatten() {
            composite.insert(snapshot);
        }
        if composite.is_empty() {
            return Err(FetchError::AllSourcesFailed {
                event_id: event_id.to_string(),
            });
        }
        debug!(
            event_id,
            sources = ?composite.present_variants(),
            "Fetched composite snapshot"
        );
        Ok(composite)
    }

    async fn fetch_slot(
        &self,
        variant: SourceVariant,
        event_id: &str,
        date: NaiveDate,
    ) -> Option<Snapshot> {
        let request = UpstreamRequest::snapshot(variant, event_id, date);
        let body = match self.request(&request).await {
            Ok(body) => body,
            Err(e) => {
                warn!(event_id, variant = %variant, step = "fetch", "Source failed: {}", e);
                return None;
            }
        };

        let key = snapshot_key(date, event_id, variant);
        if let Err(e) = self.archive.put(&key, body.clone()).await {
            warn!(event_id, variant = %variant, step = "archive", "Archive write failed: {}", e);
        }

        match Snapshot::decode(variant, &body) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(event_id, variant = %variant, step = "decode", "Discarding payload: {}", e);
                None
            }
        }
    }
}
