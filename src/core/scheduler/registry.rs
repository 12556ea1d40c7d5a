use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::job::{EventJob, JobState};
use super::queue::RunQueue;
use crate::core::clock::{Clock, instant_for};
use crate::core::config::PollerConfig;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::model::EventStatus;

/// How long the actor sleeps when nothing is queued.
const IDLE_WAKE: std::time::Duration = std::time::Duration::from_secs(3600);
const COMMAND_BUFFER: usize = 256;

/// Result of one Fetch → Reconcile → Upsert pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The update committed; carries the stored status after the write.
    Committed(EventStatus),
    Failed,
}

/// One tick for one event. Implementations log their own failures.
#[async_trait]
pub trait TickExecutor: Send + Sync {
    async fn tick(&self, event_id: &str, date: NaiveDate) -> TickOutcome;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("job registry is not running")]
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct RegistrySettings {
    pub poll_interval: Duration,
    pub lead_time: Duration,
}

impl RegistrySettings {
    pub fn from_config(config: &PollerConfig) -> Self {
        Self {
            poll_interval: Duration::seconds(config.polling.poll_interval_secs as i64),
            lead_time: Duration::seconds(config.polling.lead_time_secs as i64),
        }
    }
}

enum Command {
    Schedule {
        event_id: String,
        start_time: DateTime<Utc>,
        date: NaiveDate,
    },
    Remove {
        event_id: String,
    },
    Jobs(oneshot::Sender<Vec<EventJob>>),
    Shutdown(oneshot::Sender<()>),
}

struct TickDone {
    event_id: String,
    outcome: TickOutcome,
}

/// Cheap, cloneable access to the registry actor.
#[derive(Clone)]
pub struct RegistryHandle {
    commands: mpsc::Sender<Command>,
}

impl RegistryHandle {
    /// Create a Pending job, or update the start time of the existing one.
    pub async fn schedule(
        &self,
        event_id: &str,
        start_time: DateTime<Utc>,
        date: NaiveDate,
    ) -> Result<(), RegistryError> {
        self.send(Command::Schedule {
            event_id: event_id.to_string(),
            start_time,
            date,
        })
        .await
    }

    pub async fn remove(&self, event_id: &str) -> Result<(), RegistryError> {
        self.send(Command::Remove {
            event_id: event_id.to_string(),
        })
        .await
    }

    /// Current jobs ordered by event id.
    pub async fn jobs(&self) -> Result<Vec<EventJob>, RegistryError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Jobs(tx)).await?;
        rx.await.map_err(|_| RegistryError::Closed)
    }

    /// Stop dispatching and wait for in-flight ticks to finish.
    pub async fn shutdown(&self) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown(tx)).await?;
        rx.await.map_err(|_| RegistryError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), RegistryError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RegistryError::Closed)
    }
}

/// Single owner of the job table. Discovery and callers talk to it through
/// [`RegistryHandle`]; ticks report back through the join set.
pub struct JobRegistry {
    jobs: HashMap<String, EventJob>,
    queue: RunQueue,
    ticks: JoinSet<TickDone>,
    commands: mpsc::Receiver<Command>,
    executor: Arc<dyn TickExecutor>,
    clock: Arc<dyn Clock>,
    settings: RegistrySettings,
}

impl JobRegistry {
    pub fn spawn(
        executor: Arc<dyn TickExecutor>,
        clock: Arc<dyn Clock>,
        settings: RegistrySettings,
    ) -> (RegistryHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let registry = JobRegistry {
            jobs: HashMap::new(),
            queue: RunQueue::new(),
            ticks: JoinSet::new(),
            commands: rx,
            executor,
            clock,
            settings,
        };
        let task = tokio::spawn(registry.run());
        (RegistryHandle { commands: tx }, task)
    }

    async fn run(mut self) {
        info!("Job registry started");
        let ack = loop {
            let now = self.clock.now();
            self.dispatch_due(now);

            let wake = match self.queue.next_deadline() {
                Some(deadline) => instant_for(deadline, now),
                None => tokio::time::Instant::now() + IDLE_WAKE,
            };

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown(ack)) => break Some(ack),
                    Some(command) => self.handle(command),
                    None => break None,
                },
                Some(joined) = self.ticks.join_next(), if !self.ticks.is_empty() => match joined {
                    Ok(done) => self.finish(done),
                    Err(e) => error!("Tick task failed to join: {}", e),
                },
                _ = tokio::time::sleep_until(wake) => {}
            }
        };

        self.drain().await;
        info!("Job registry stopped");
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Schedule {
                event_id,
                start_time,
                date,
            } => self.schedule(event_id, start_time, date),
            Command::Remove { event_id } => self.remove(&event_id),
            Command::Jobs(reply) => {
                let mut jobs: Vec<EventJob> = self.jobs.values().cloned().collect();
                jobs.sort_by(|a, b| a.event_id.cmp(&b.event_id));
                let _ = reply.send(jobs);
            }
            Command::Shutdown(_) => {}
        }
    }

    fn schedule(&mut self, event_id: String, start_time: DateTime<Utc>, date: NaiveDate) {
        let lead_time = self.settings.lead_time;
        match self.jobs.get_mut(&event_id) {
            None => {
                let job = EventJob::new(event_id.clone(), start_time, date, lead_time);
                self.queue.schedule(&event_id, job.next_run);
                info!(
                    event_id = %event_id,
                    start_time = %start_time,
                    next_run = %job.next_run,
                    queued = self.queue.len(),
                    "Job created"
                );
                self.jobs.insert(event_id, job);
            }
            Some(job) => match job.state {
                JobState::Pending => {
                    if job.start_time == start_time && job.date == date {
                        return;
                    }
                    job.start_time = start_time;
                    job.date = date;
                    job.next_run = start_time - lead_time;
                    self.queue.schedule(&event_id, job.next_run);
                    info!(event_id = %event_id, start_time = %start_time, "Job start time updated");
                }
                // Already polling; the new start only matters for display.
                JobState::Active => {
                    job.start_time = start_time;
                    job.date = date;
                }
                JobState::Removed => {
                    debug!(event_id = %event_id, "Schedule ignored; removal still draining");
                }
            },
        }
    }

    fn remove(&mut self, event_id: &str) {
        let Some(job) = self.jobs.get_mut(event_id) else {
            debug!(event_id, "Remove requested for unknown job");
            return;
        };
        self.queue.remove(event_id);
        if job.in_flight {
            // The running tick is allowed to commit; its result is discarded.
            job.transition(JobState::Removed);
            info!(event_id, "Job removed; waiting for in-flight tick");
        } else {
            self.jobs.remove(event_id);
            info!(event_id, "Job removed");
        }
    }

    fn dispatch_due(&mut self, now: DateTime<Utc>) {
        while let Some((event_id, _)) = self.queue.pop_due(now) {
            let Some(job) = self.jobs.get_mut(&event_id) else {
                continue;
            };
            if job.in_flight {
                continue;
            }
            if job.terminal_observed {
                let ticks = job.ticks;
                self.jobs.remove(&event_id);
                info!(event_id = %event_id, ticks, "Event completed; job removed");
                continue;
            }
            if job.state == JobState::Pending && job.transition(JobState::Active) {
                info!(event_id = %event_id, "Job active");
            }

            job.in_flight = true;
            let date = job.date;
            let executor = Arc::clone(&self.executor);
            self.ticks.spawn(async move {
                let tick_id = event_id.clone();
                let outcome =
                    match tokio::spawn(async move { executor.tick(&tick_id, date).await }).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(event_id = %event_id, step = "tick", "Tick panicked: {}", e);
                            TickOutcome::Failed
                        }
                    };
                TickDone { event_id, outcome }
            });
        }
    }

    fn finish(&mut self, done: TickDone) {
        let TickDone { event_id, outcome } = done;
        let Some(job) = self.jobs.get_mut(&event_id) else {
            return;
        };
        if job.state == JobState::Removed {
            self.jobs.remove(&event_id);
            debug!(event_id = %event_id, "Discarded tick result for removed job");
            return;
        }

        let now = self.clock.now();
        job.in_flight = false;
        match outcome {
            TickOutcome::Committed(status) => {
                job.ticks += 1;
                job.consecutive_failures = 0;
                job.last_committed_at = Some(now);
                if status.is_terminal() && !job.terminal_observed {
                    job.terminal_observed = true;
                    info!(event_id = %event_id, "Completed status stored; removing on next tick");
                }
            }
            TickOutcome::Failed => {
                job.consecutive_failures += 1;
                warn!(
                    event_id = %event_id,
                    failures = job.consecutive_failures,
                    "Tick failed; retrying next interval"
                );
            }
        }
        job.next_run = now + self.settings.poll_interval;
        self.queue.schedule(&event_id, job.next_run);
    }

    async fn drain(&mut self) {
        if !self.ticks.is_empty() {
            info!(in_flight = self.ticks.len(), "Waiting for in-flight ticks");
        }
        while let Some(joined) = self.ticks.join_next().await {
            match joined {
                Ok(done) => self.finish(done),
                Err(e) => error!("Tick task failed to join: {}", e),
            }
        }
    }
}

/// Stops the registry on shutdown and waits for its task to exit.
pub struct RegistryComponent {
    handle: RegistryHandle,
    task: Option<JoinHandle<()>>,
}

impl RegistryComponent {
    pub fn new(handle: RegistryHandle, task: JoinHandle<()>) -> Self {
        Self {
            handle,
            task: Some(task),
        }
    }
}

#[async_trait]
impl LifecycleComponent for RegistryComponent {
    async fn on_shutdown(&mut self) -> anyhow::Result<()> {
        if let Err(e) = self.handle.shutdown().await {
            warn!("Registry shutdown request failed: {}", e);
        }
        if let Some(task) = self.task.take() {
            task.await?;
        }
        Ok(())
    }
}
