use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::archive::{ArchiveError, FsArchive, NullArchive, SnapshotArchive, snapshot_key};
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::PollerConfig;
use crate::core::lifecycle::LifecycleManager;
use crate::core::model::{Event, EventStatus};
use crate::core::provider::{Composite, HttpUpstream, Snapshot, SnapshotFetcher, SourceVariant, Upstream};
use crate::core::reconcile::reconcile;
use crate::core::scheduler::{
    Discovery, DiscoveryComponent, DiscoveryReport, EventTicker, JobRegistry, RegistryComponent,
    RegistrySettings, Survey, TickExecutor, TickOutcome,
};
use crate::core::store::{SqliteGateway, UpsertGateway};
use crate::platform::{NativePlatform, Platform};

/// Result of a single `once` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnceSummary {
    pub discovery: DiscoveryReport,
    pub committed: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Everything the poller needs, wired from one config.
pub struct PollingService {
    config: PollerConfig,
    gateway: Arc<SqliteGateway>,
    fetcher: SnapshotFetcher,
    archive: Arc<dyn SnapshotArchive>,
    clock: Arc<dyn Clock>,
}

impl PollingService {
    pub async fn boot(data_dir: &Path, config: PollerConfig) -> Result<Self> {
        if !data_dir.exists() {
            tokio::fs::create_dir_all(data_dir).await?;
        }
        NativePlatform::restrict_dir_permissions(data_dir);

        let gateway = SqliteGateway::new(config.database_path(data_dir))
            .await
            .context("failed to open event store")?;
        let archive: Arc<dyn SnapshotArchive> = if config.archive.enabled {
            Arc::new(FsArchive::new(config.archive_dir(data_dir)))
        } else {
            Arc::new(NullArchive)
        };
        let upstream = HttpUpstream::new(&config)?;

        Ok(Self::from_parts(
            config,
            Arc::new(gateway),
            Arc::new(upstream),
            archive,
            Arc::new(SystemClock),
        ))
    }

    pub fn from_parts(
        config: PollerConfig,
        gateway: Arc<SqliteGateway>,
        upstream: Arc<dyn Upstream>,
        archive: Arc<dyn SnapshotArchive>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let fetcher = SnapshotFetcher::new(upstream, config.polling.max_in_flight, archive.clone());
        Self {
            config,
            gateway,
            fetcher,
            archive,
            clock,
        }
    }

    pub fn gateway(&self) -> &Arc<SqliteGateway> {
        &self.gateway
    }

    fn discovery(&self) -> Discovery {
        Discovery::new(
            self.fetcher.clone(),
            self.gateway.clone(),
            self.clock.clone(),
        )
    }

    fn ticker(&self) -> Arc<EventTicker> {
        Arc::new(EventTicker::new(
            self.fetcher.clone(),
            self.gateway.clone(),
            self.clock.clone(),
        ))
    }

    /// Poll until `shutdown` fires, then stop discovery and drain the registry.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let (registry, registry_task) = JobRegistry::spawn(
            self.ticker(),
            self.clock.clone(),
            RegistrySettings::from_config(&self.config),
        );
        let discovery = self.discovery();

        let mut lifecycle = LifecycleManager::new().await?;
        lifecycle.attach(Arc::new(Mutex::new(DiscoveryComponent::new(
            discovery.clone(),
            registry.clone(),
        ))));
        lifecycle.attach(Arc::new(Mutex::new(RegistryComponent::new(
            registry.clone(),
            registry_task,
        ))));

        lifecycle
            .add_repeating("discovery", self.config.discovery_interval(), move || {
                let discovery = discovery.clone();
                let registry = registry.clone();
                async move {
                    if let Err(e) = discovery.run_pass(&registry).await {
                        warn!("Discovery pass failed: {:#}", e);
                    }
                }
            })
            .await?;

        lifecycle.start().await?;
        info!(
            poll_secs = self.config.poll_interval().as_secs(),
            discovery_secs = self.config.discovery_interval().as_secs(),
            "Polling service running"
        );

        shutdown.cancelled().await;
        info!("Shutting down polling service...");
        lifecycle.shutdown().await
    }

    /// One discovery pass and one tick per live event, then return.
    pub async fn run_once(&self) -> Result<OnceSummary> {
        let date = self.clock.today();
        let Survey { live, report, .. } = self.discovery().survey(date).await?;
        let ticker = self.ticker();

        let mut ticks = JoinSet::new();
        for event in live {
            let ticker = ticker.clone();
            ticks.spawn(async move { ticker.tick(&event.external_id, date).await });
        }

        let mut summary = OnceSummary {
            discovery: report,
            ..Default::default()
        };
        while let Some(joined) = ticks.join_next().await {
            match joined {
                Ok(TickOutcome::Committed(status)) => {
                    summary.committed += 1;
                    if status == EventStatus::Completed {
                        summary.completed += 1;
                    }
                }
                Ok(TickOutcome::Failed) => summary.failed += 1,
                Err(e) => {
                    warn!("Tick task failed to join: {}", e);
                    summary.failed += 1;
                }
            }
        }
        info!(
            committed = summary.committed,
            completed = summary.completed,
            failed = summary.failed,
            "Single pass finished"
        );
        Ok(summary)
    }

    /// Rebuild an update from archived payloads and commit it.
    pub async fn replay(&self, event_id: &str, date: NaiveDate) -> Result<Event> {
        let mut composite = Composite::default();
        for variant in [SourceVariant::Legacy, SourceVariant::Current] {
            let key = snapshot_key(date, event_id, variant);
            let body = match self.archive.get(&key).await {
                Ok(body) => body,
                Err(ArchiveError::NotFound(_)) => continue,
                Err(e) => {
                    warn!(event_id, variant = %variant, step = "replay", "Archive read failed: {}", e);
                    continue;
                }
            };
            match Snapshot::decode(variant, &body) {
                Ok(snapshot) => composite.insert(snapshot),
                Err(e) => {
                    warn!(event_id, variant = %variant, step = "replay", "Discarding payload: {}", e)
                }
            }
        }
        if composite.is_empty() {
            bail!("no archived payloads for {} on {}", event_id, date);
        }

        let update = reconcile(event_id, &composite, self.clock.now());
        let event = self.gateway.upsert(&update).await?;
        info!(event_id, status = %event.status, "Replayed archived payloads");
        Ok(event)
    }
}
