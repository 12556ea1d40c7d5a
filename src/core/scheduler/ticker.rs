use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

use super::registry::{TickExecutor, TickOutcome};
use crate::core::clock::Clock;
use crate::core::provider::SnapshotFetcher;
use crate::core::reconcile::reconcile;
use crate::core::store::UpsertGateway;

/// Fetch both feeds, reconcile, and commit. Any failure is logged and
/// reported as [`TickOutcome::Failed`] so the job retries next interval.
pub struct EventTicker {
    fetcher: SnapshotFetcher,
    gateway: Arc<dyn UpsertGateway>,
    clock: Arc<dyn Clock>,
}

impl EventTicker {
    pub fn new(
        fetcher: SnapshotFetcher,
        gateway: Arc<dyn UpsertGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fetcher,
            gateway,
            clock,
        }
    }
}

#[async_trait]
impl TickExecutor for EventTicker {
    async fn tick(&self, event_id: &str, date: NaiveDate) -> TickOutcome {
        let composite = match self.fetcher.fetch(event_id, date).await {
            Ok(composite) => composite,
            Err(e) => {
                warn!(event_id, step = "fetch", "Tick failed: {}", e);
                return TickOutcome::Failed;
            }
        };

        let update = reconcile(event_id, &composite, self.clock.now());

        match self.gateway.upsert(&update).await {
            Ok(event) => {
                debug!(
                    event_id,
                    status = %event.status,
                    home_score = ?event.home_score,
                    away_score = ?event.away_score,
                    "Tick committed"
                );
                TickOutcome::Committed(event.status)
            }
            Err(e) => {
                warn!(event_id, step = "commit", "Tick failed: {}", e);
                TickOutcome::Failed
            }
        }
    }
}
