mod discovery;
mod scenario;
mod state_machine;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{TickExecutor, TickOutcome};
use crate::core::clock::Clock;
use crate::core::model::EventStatus;

/// Wall clock that follows tokio's (pausable) time from a fixed origin.
pub(super) struct TokioClock {
    base: DateTime<Utc>,
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub(super) fn starting_at(base: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            base,
            origin: tokio::time::Instant::now(),
        })
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed()).unwrap_or_default();
        self.base + elapsed
    }
}

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 23, 30, 0).unwrap()
}

pub(super) fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

/// Executor with per-event scripted outcomes. Unscripted ticks commit
/// InProgress.
#[derive(Default)]
pub(super) struct ScriptedExecutor {
    script: Mutex<HashMap<String, VecDeque<TickOutcome>>>,
    calls: Mutex<Vec<String>>,
    delay: Duration,
    running: Mutex<HashMap<String, usize>>,
    overlaps: Mutex<usize>,
}

impl ScriptedExecutor {
    pub(super) fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub(super) fn script(&self, event_id: &str, outcomes: &[TickOutcome]) {
        self.script
            .lock()
            .unwrap()
            .entry(event_id.to_string())
            .or_default()
            .extend(outcomes.iter().copied());
    }

    pub(super) fn calls_for(&self, event_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == event_id)
            .count()
    }

    pub(super) fn overlaps(&self) -> usize {
        *self.overlaps.lock().unwrap()
    }
}

#[async_trait]
impl TickExecutor for ScriptedExecutor {
    async fn tick(&self, event_id: &str, _date: NaiveDate) -> TickOutcome {
        self.calls.lock().unwrap().push(event_id.to_string());
        {
            let mut running = self.running.lock().unwrap();
            let n = running.entry(event_id.to_string()).or_default();
            *n += 1;
            if *n > 1 {
                *self.overlaps.lock().unwrap() += 1;
            }
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        *self
            .running
            .lock()
            .unwrap()
            .entry(event_id.to_string())
            .or_default() -= 1;
        self.script
            .lock()
            .unwrap()
            .get_mut(event_id)
            .and_then(|q| q.pop_front())
            .unwrap_or(TickOutcome::Committed(EventStatus::InProgress))
    }
}
