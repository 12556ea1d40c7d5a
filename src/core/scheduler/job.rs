use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Active,
    Removed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Active => "active",
            JobState::Removed => "removed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn can_transition(from: JobState, to: JobState) -> bool {
    if from == to {
        return true;
    }
    match from {
        JobState::Pending => matches!(to, JobState::Active | JobState::Removed),
        JobState::Active => matches!(to, JobState::Removed),
        JobState::Removed => false,
    }
}

/// Polling state for one event. Owned by the registry actor; everything
/// outside it only ever sees clones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventJob {
    pub event_id: String,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub next_run: DateTime<Utc>,
    pub state: JobState,
    /// Stored status came back Completed; the next due run removes the job.
    pub terminal_observed: bool,
    pub in_flight: bool,
    pub ticks: u64,
    pub consecutive_failures: u32,
    pub last_committed_at: Option<DateTime<Utc>>,
}

impl EventJob {
    pub fn new(
        event_id: impl Into<String>,
        start_time: DateTime<Utc>,
        date: NaiveDate,
        lead_time: Duration,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            date,
            start_time,
            next_run: start_time - lead_time,
            state: JobState::Pending,
            terminal_observed: false,
            in_flight: false,
            ticks: 0,
            consecutive_failures: 0,
            last_committed_at: None,
        }
    }

    /// Returns false (and leaves the state alone) for illegal moves.
    pub fn transition(&mut self, to: JobState) -> bool {
        if !can_transition(self.state, to) {
            return false;
        }
        self.state = to;
        true
    }
}
