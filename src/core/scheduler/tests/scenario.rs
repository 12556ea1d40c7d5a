//! Discovery through completion against an in-memory store.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::{TokioClock, start};
use crate::core::archive::NullArchive;
use crate::core::model::EventStatus;
use crate::core::provider::{
    EndpointClass, FetchError, SnapshotFetcher, Upstream, UpstreamRequest,
};
use crate::core::scheduler::{
    Discovery, EventTicker, JobRegistry, JobState, RegistrySettings,
};
use crate::core::store::{SqliteGateway, UpsertGateway};

type Reply = Result<&'static str, u16>;

/// Serves queued replies per endpoint class; the last reply repeats.
#[derive(Default)]
struct PhasedUpstream {
    replies: Mutex<HashMap<EndpointClass, VecDeque<Reply>>>,
    requests: Mutex<HashMap<EndpointClass, usize>>,
}

impl PhasedUpstream {
    fn queue(&self, class: EndpointClass, replies: &[Reply]) {
        self.replies
            .lock()
            .unwrap()
            .entry(class)
            .or_default()
            .extend(replies.iter().copied());
    }

    fn requests(&self, class: EndpointClass) -> usize {
        self.requests
            .lock()
            .unwrap()
            .get(&class)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Upstream for PhasedUpstream {
    async fn fetch(&self, request: &UpstreamRequest) -> Result<Bytes, FetchError> {
        *self
            .requests
            .lock()
            .unwrap()
            .entry(request.class)
            .or_default() += 1;
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            let queue = replies.entry(request.class).or_default();
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().copied()
            }
        };
        match reply {
            Some(Ok(body)) => Ok(Bytes::from_static(body.as_bytes())),
            Some(Err(status)) => Err(FetchError::Status {
                status,
                body: String::new(),
            }),
            None => Err(FetchError::Status {
                status: 404,
                body: String::new(),
            }),
        }
    }
}

async fn advance(secs: u64) {
    tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn event_is_tracked_from_listing_to_completion() {
    let upstream = Arc::new(PhasedUpstream::default());
    upstream.queue(
        EndpointClass::Schedule,
        &[Ok(
            r#"{"events":[{"gameId":"E1","gameTimeUTC":"2026-10-19T23:30:00Z","gameStatus":1}]}"#,
        )],
    );
    upstream.queue(
        EndpointClass::Legacy,
        &[
            Ok(r#"{"basicGameData":{"gameId":"E1","statusNum":"2","hTeam":{"score":"2"},"vTeam":{"score":"0"}}}"#),
            Ok(r#"{"basicGameData":{"gameId":"E1","statusNum":"2","hTeam":{"score":"101"},"vTeam":{"score":"99"}}}"#),
        ],
    );
    upstream.queue(
        EndpointClass::Current,
        &[
            Err(404),
            Ok(r#"{"game":{"gameId":"E1","gameStatus":3,"gameEndTimeUTC":"2026-10-20T01:40:00Z","period":4,"gameClock":"PT00M00.00S","homeTeam":{"score":102}}}"#),
        ],
    );

    let clock = TokioClock::starting_at(start() - Duration::minutes(5));
    let store = Arc::new(SqliteGateway::open_in_memory().unwrap());
    let fetcher = SnapshotFetcher::new(upstream.clone(), 4, Arc::new(NullArchive));
    let ticker = EventTicker::new(fetcher.clone(), store.clone(), clock.clone());
    let (registry, _task) = JobRegistry::spawn(
        Arc::new(ticker),
        clock.clone(),
        RegistrySettings {
            poll_interval: Duration::seconds(30),
            lead_time: Duration::zero(),
        },
    );
    let discovery = Discovery::new(fetcher, store.clone(), clock);

    // T-5m: discovery creates a pending job and a bare row.
    discovery.run_pass(&registry).await.unwrap();
    assert_eq!(registry.jobs().await.unwrap()[0].state, JobState::Pending);
    let event = store.find_event("E1").await.unwrap().unwrap();
    assert_eq!(event.status, EventStatus::Scheduled);

    // T: legacy reports in progress, current is missing.
    advance(5 * 60 + 1).await;
    let event = store.find_event("E1").await.unwrap().unwrap();
    assert_eq!(event.status, EventStatus::InProgress);
    assert_eq!(event.home_score, Some(2));
    assert_eq!(registry.jobs().await.unwrap()[0].state, JobState::Active);

    // T+30s: current reports completion with an end time.
    advance(30).await;
    let event = store.find_event("E1").await.unwrap().unwrap();
    assert_eq!(event.status, EventStatus::Completed);
    assert_eq!(event.end_time, Some(start() + Duration::minutes(130)));
    assert_eq!(event.home_score, Some(102));
    assert_eq!(event.away_score, Some(99));
    assert!(registry.jobs().await.unwrap()[0].terminal_observed);

    // T+60s: the next due run removes the job without fetching.
    advance(30).await;
    assert!(registry.jobs().await.unwrap().is_empty());
    assert_eq!(upstream.requests(EndpointClass::Legacy), 2);
    assert_eq!(upstream.requests(EndpointClass::Current), 2);
}
