use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::registry::RegistryHandle;
use crate::core::clock::Clock;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::model::CanonicalUpdate;
use crate::core::provider::{ScheduledEvent, SnapshotFetcher};
use crate::core::store::UpsertGateway;

/// Summary of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub listed: usize,
    pub already_completed: usize,
    pub seeded: bool,
    pub scheduled: usize,
}

/// Outcome of reading one day's listing against storage.
#[derive(Debug, Clone, Default)]
pub struct Survey {
    /// Listed events not yet completed in storage.
    pub live: Vec<ScheduledEvent>,
    /// Listed events storage already holds as completed.
    pub completed: Vec<String>,
    pub report: DiscoveryReport,
}

/// Turns today's listing into registry jobs.
#[derive(Clone)]
pub struct Discovery {
    fetcher: SnapshotFetcher,
    gateway: Arc<dyn UpsertGateway>,
    clock: Arc<dyn Clock>,
}

impl Discovery {
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

    /// Fetch the listing for `date`, seed storage with any new rows, and return the
    /// events still worth polling. Only a failed listing fetch is an error.
    pub async fn survey(&self, date: NaiveDate) -> Result<Survey> {
        let listed = self
            .fetcher
            .fetch_schedule(date)
            .await
            .with_context(|| format!("failed to fetch event listing for {}", date))?;

        let ids: Vec<String> = listed.iter().map(|e| e.external_id.clone()).collect();
        let completed = match self.gateway.completed_among(&ids).await {
            Ok(completed) => completed,
            Err(e) => {
                warn!(step = "discovery", "Could not read completed events: {}", e);
                HashSet::new()
            }
        };

        let live: Vec<ScheduledEvent> = listed
            .into_iter()
            .filter(|e| !completed.contains(&e.external_id))
            .collect();

        let mut report = DiscoveryReport {
            listed: ids.len(),
            already_completed: completed.len(),
            ..Default::default()
        };
        report.seeded = self.seed(&live).await;
        Ok(Survey {
            live,
            completed: completed.into_iter().collect(),
            report,
        })
    }

    /// One atomic batch of bare rows so listed events exist in storage before
    /// their first tick. Existing rows only gain a start time.
    async fn seed(&self, events: &[ScheduledEvent]) -> bool {
        if events.is_empty() {
            return true;
        }
        let now = self.clock.now();
        let batch: Vec<CanonicalUpdate> = events
            .iter()
            .map(|e| {
                let mut update = CanonicalUpdate::empty(e.external_id.clone(), now);
                update.start_time = Some(e.start_time);
                update
            })
            .collect();
        match self.gateway.upsert_batch(&batch).await {
            Ok(stored) => {
                info!(rows = stored.len(), "Seeded listed events");
                true
            }
            Err(e) => {
                warn!(step = "seed", "Seeding listed events failed: {}", e);
                false
            }
        }
    }

    /// A full pass: survey, then hand every live event to the registry.
    pub async fn run_pass(&self, registry: &RegistryHandle) -> Result<DiscoveryReport> {
        let date = self.clock.today();
        let Survey {
            live,
            completed,
            mut report,
        } = self.survey(date).await?;
        for event_id in &completed {
            if let Err(e) = registry.remove(event_id).await {
                warn!(event_id = %event_id, step = "remove", "Could not remove job: {}", e);
            }
        }
        for event in &live {
            registry
                .schedule(&event.external_id, event.start_time, date)
                .await
                .context("job registry unavailable")?;
            report.scheduled += 1;
        }
        let tracked = registry.jobs().await.map(|j| j.len()).unwrap_or_default();
        info!(
            listed = report.listed,
            skipped = report.already_completed,
            scheduled = report.scheduled,
            tracked,
            "Discovery pass finished"
        );
        Ok(report)
    }
}

/// Runs the first discovery pass at startup; later passes come from the
/// repeating job on the lifecycle scheduler.
pub struct DiscoveryComponent {
    discovery: Discovery,
    registry: RegistryHandle,
}

impl DiscoveryComponent {
    pub fn new(discovery: Discovery, registry: RegistryHandle) -> Self {
        Self {
            discovery,
            registry,
        }
    }
}

#[async_trait::async_trait]
impl LifecycleComponent for DiscoveryComponent {
    async fn on_start(&mut self) -> Result<()> {
        if let Err(e) = self.discovery.run_pass(&self.registry).await {
            warn!("Initial discovery pass failed: {:#}", e);
        }
        Ok(())
    }
}
