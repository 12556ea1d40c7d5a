use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use std::collections::HashSet;
use std::sync::Arc;

use super::{ScriptedExecutor, TokioClock, date, start};
use crate::core::archive::NullArchive;
use crate::core::model::{CanonicalUpdate, Event, EventStatus};
use crate::core::provider::{
    EndpointClass, FetchError, SnapshotFetcher, Upstream, UpstreamRequest,
};
use crate::core::scheduler::{Discovery, JobRegistry, JobState, RegistrySettings};
use crate::core::store::{SqliteGateway, StoreError, UpsertGateway};

const LISTING: &str = r#"{"events":[
    {"gameId":"E1","gameTimeUTC":"2026-10-19T23:30:00Z","gameStatus":1},
    {"gameId":"E2","gameTimeUTC":"2026-10-20T00:30:00Z","gameStatus":1},
    {"gameId":"E3","gameTimeUTC":"2026-10-19T17:00:00Z","gameStatus":3},
    {"gameId":"","gameTimeUTC":"2026-10-19T17:00:00Z"}
]}"#;

struct ListingUpstream {
    listing: Option<&'static str>,
}

#[async_trait]
impl Upstream for ListingUpstream {
    async fn fetch(&self, request: &UpstreamRequest) -> Result<Bytes, FetchError> {
        assert_eq!(request.class, EndpointClass::Schedule);
        assert_eq!(request.date, date());
        match self.listing {
            Some(body) => Ok(Bytes::from_static(body.as_bytes())),
            None => Err(FetchError::Status {
                status: 502,
                body: String::new(),
            }),
        }
    }
}

fn fetcher(listing: Option<&'static str>) -> SnapshotFetcher {
    SnapshotFetcher::new(
        Arc::new(ListingUpstream { listing }),
        2,
        Arc::new(NullArchive),
    )
}

fn settings() -> RegistrySettings {
    RegistrySettings {
        poll_interval: Duration::seconds(30),
        lead_time: Duration::zero(),
    }
}

async fn store_with_completed_e3() -> Arc<SqliteGateway> {
    let store = Arc::new(SqliteGateway::open_in_memory().unwrap());
    let mut done = CanonicalUpdate::empty("E3", start() - Duration::hours(4));
    done.status = Some(EventStatus::Completed);
    store.upsert(&done).await.unwrap();
    store
}

#[tokio::test(start_paused = true)]
async fn pass_schedules_listed_events_and_skips_completed() {
    let store = store_with_completed_e3().await;
    let clock = TokioClock::starting_at(start() - Duration::minutes(5));
    let executor = Arc::new(ScriptedExecutor::default());
    let (registry, _task) = JobRegistry::spawn(executor.clone(), clock.clone(), settings());
    let discovery = Discovery::new(fetcher(Some(LISTING)), store.clone(), clock);

    let report = discovery.run_pass(&registry).await.unwrap();
    assert_eq!(report.listed, 3);
    assert_eq!(report.already_completed, 1);
    assert_eq!(report.scheduled, 2);
    assert!(report.seeded);

    let jobs = registry.jobs().await.unwrap();
    let ids: Vec<_> = jobs.iter().map(|j| j.event_id.as_str()).collect();
    assert_eq!(ids, ["E1", "E2"]);
    assert!(jobs.iter().all(|j| j.state == JobState::Pending));

    let seeded = store.find_event("E2").await.unwrap().unwrap();
    assert_eq!(seeded.status, EventStatus::Scheduled);
    assert_eq!(seeded.start_time, Some(start() + Duration::hours(1)));
    let completed = store.find_event("E3").await.unwrap().unwrap();
    assert_eq!(completed.status, EventStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn repeated_passes_do_not_duplicate_jobs() {
    let store = store_with_completed_e3().await;
    let clock = TokioClock::starting_at(start() - Duration::minutes(5));
    let executor = Arc::new(ScriptedExecutor::default());
    let (registry, _task) = JobRegistry::spawn(executor.clone(), clock.clone(), settings());
    let discovery = Discovery::new(fetcher(Some(LISTING)), store, clock);

    discovery.run_pass(&registry).await.unwrap();
    discovery.run_pass(&registry).await.unwrap();
    assert_eq!(registry.jobs().await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn listing_failure_is_an_error_and_schedules_nothing() {
    let store = Arc::new(SqliteGateway::open_in_memory().unwrap());
    let clock = TokioClock::starting_at(start());
    let executor = Arc::new(ScriptedExecutor::default());
    let (registry, _task) = JobRegistry::spawn(executor.clone(), clock.clone(), settings());
    let discovery = Discovery::new(fetcher(None), store, clock);

    assert!(discovery.run_pass(&registry).await.is_err());
    assert!(registry.jobs().await.unwrap().is_empty());
}

/// Store whose batch writes always fail.
struct ReadOnlyStore;

#[async_trait]
impl UpsertGateway for ReadOnlyStore {
    async fn upsert_batch(&self, _updates: &[CanonicalUpdate]) -> Result<Vec<Event>, StoreError> {
        Err(StoreError::Missing("read-only".into()))
    }

    async fn find_event(&self, _external_id: &str) -> Result<Option<Event>, StoreError> {
        Ok(None)
    }

    async fn completed_among(
        &self,
        _external_ids: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        Ok(HashSet::new())
    }
}

#[tokio::test(start_paused = true)]
async fn seed_failure_still_schedules_jobs() {
    let clock = TokioClock::starting_at(start() - Duration::minutes(5));
    let executor = Arc::new(ScriptedExecutor::default());
    let (registry, _task) = JobRegistry::spawn(executor.clone(), clock.clone(), settings());
    let discovery = Discovery::new(fetcher(Some(LISTING)), Arc::new(ReadOnlyStore), clock);

    let report = discovery.run_pass(&registry).await.unwrap();
    assert!(!report.seeded);
    assert_eq!(report.scheduled, 3);
}

#[tokio::test(start_paused = true)]
async fn pass_removes_jobs_completed_in_storage() {
    let store = Arc::new(SqliteGateway::open_in_memory().unwrap());
    let clock = TokioClock::starting_at(start() - Duration::minutes(5));
    let executor = Arc::new(ScriptedExecutor::default());
    let (registry, _task) = JobRegistry::spawn(executor.clone(), clock.clone(), settings());
    let discovery = Discovery::new(fetcher(Some(LISTING)), store.clone(), clock);

    discovery.run_pass(&registry).await.unwrap();
    assert_eq!(registry.jobs().await.unwrap().len(), 3);

    // Another writer finished E2 before its first tick.
    let mut done = CanonicalUpdate::empty("E2", start());
    done.status = Some(EventStatus::Completed);
    store.upsert(&done).await.unwrap();

    let report = discovery.run_pass(&registry).await.unwrap();
    assert_eq!(report.already_completed, 1);
    let jobs = registry.jobs().await.unwrap();
    let ids: Vec<_> = jobs.iter().map(|j| j.event_id.as_str()).collect();
    assert_eq!(ids, ["E1", "E3"]);
}
