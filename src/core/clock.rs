use chrono::{DateTime, NaiveDate, Utc};

/// Source of "now". All scheduling decisions are made in UTC.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Convert a UTC deadline into a tokio instant relative to `now`.
/// Deadlines in the past map to "immediately".
pub fn instant_for(deadline: DateTime<Utc>, now: DateTime<Utc>) -> tokio::time::Instant {
    let wait = (deadline - now).to_std().unwrap_or_default();
    tokio::time::Instant::now() + wait
}
