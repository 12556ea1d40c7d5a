//! Live-event polling.
//!
//! [`discovery`] turns the day's listing into jobs, [`registry`] owns the job
//! table and dispatches ticks off a [`queue::RunQueue`], and [`ticker`] runs
//! one Fetch → Reconcile → Upsert pass per tick.

pub mod discovery;
pub mod job;
pub mod queue;
pub mod registry;
pub mod ticker;

pub use discovery::{Discovery, DiscoveryComponent, DiscoveryReport, Survey};
pub use job::{EventJob, JobState, can_transition};
pub use registry::{
    JobRegistry, RegistryComponent, RegistryError, RegistryHandle, RegistrySettings,
    TickExecutor, TickOutcome,
};
pub use ticker::EventTicker;

#[cfg(test)]
mod tests;
