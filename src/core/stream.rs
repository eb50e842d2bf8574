//! Per-job event broadcasting and bounded status streams.
//!
//! Every submitted job gets its own broadcast channel; the orchestrator
//! publishes progress/error events into it and subscribers receive them
//! in emission order, from the point of subscription onward. A
//! subscription is bounded in time: if no terminal event arrives within
//! the ceiling, it yields a synthetic timeout error and closes without
//! touching the job's real status.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{timeout_at, Instant};
use tracing::debug;
use uuid::Uuid;

use crate::domain::JobEvent;

/// Default subscription ceiling. Matches the two-minute cap the status
/// poller enforced before streams were push-based.
pub const DEFAULT_STREAM_CEILING: Duration = Duration::from_secs(120);

/// Events buffered per job channel. The pipeline emits a handful of
/// events per job, so slow subscribers have ample slack before lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Registry of per-job broadcast channels
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<JobEvent>>>>,
    ceiling: Duration,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_CEILING)
    }
}

impl EventBus {
    pub fn new(ceiling: Duration) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            ceiling,
        }
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Open a channel for a job. Called once, at submission.
    pub fn register(&self, job_id: Uuid) {
        let mut channels = self.channels.write().expect("event bus lock poisoned");
        channels
            .entry(job_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
    }

    /// Publish an event to the job's subscribers.
    ///
    /// Delivery is best-effort: with no live subscribers the event is
    /// simply dropped, and the job record still carries the outcome.
    pub fn publish(&self, event: JobEvent) {
        let channels = self.channels.read().expect("event bus lock poisoned");
        if let Some(sender) = channels.get(&event.job_id()) {
            let delivered = sender.send(event.clone()).unwrap_or(0);
            debug!(job_id = %event.job_id(), delivered, "event published");
        }
    }

    /// Drop a job's channel. Called after the terminal event has been
    /// published; receivers already attached still drain the buffer.
    pub fn remove(&self, job_id: Uuid) {
        let mut channels = self.channels.write().expect("event bus lock poisoned");
        channels.remove(&job_id);
    }

    /// Attach a receiver to a job's channel, if it still exists.
    pub(crate) fn attach(&self, job_id: Uuid) -> Option<broadcast::Receiver<JobEvent>> {
        let channels = self.channels.read().expect("event bus lock poisoned");
        channels.get(&job_id).map(|sender| sender.subscribe())
    }

    #[cfg(test)]
    pub(crate) fn has_channel(&self, job_id: Uuid) -> bool {
        self.channels
            .read()
            .expect("event bus lock poisoned")
            .contains_key(&job_id)
    }
}

/// A single consumer's view of one job's event stream.
///
/// Yields, in order: a connection acknowledgement, then each event as
/// the orchestrator emits it, then `None` after the terminal event. For
/// a job that is already terminal at subscribe time, yields the ack and
/// the terminal event, then closes.
#[derive(Debug)]
pub struct JobSubscription {
    job_id: Uuid,
    /// Events synthesized at subscribe time (ack, terminal snapshot)
    ready: VecDeque<JobEvent>,
    /// Live receiver; `None` when the outcome was already known
    rx: Option<broadcast::Receiver<JobEvent>>,
    deadline: Instant,
    closed: bool,
}

impl JobSubscription {
    pub(crate) fn new(
        job_id: Uuid,
        ready: VecDeque<JobEvent>,
        rx: Option<broadcast::Receiver<JobEvent>>,
        ceiling: Duration,
    ) -> Self {
        Self {
            job_id,
            ready,
            rx,
            deadline: Instant::now() + ceiling,
            closed: false,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Next event on the stream, or `None` once it has closed.
    pub async fn next(&mut self) -> Option<JobEvent> {
        if self.closed {
            return None;
        }

        if let Some(event) = self.ready.pop_front() {
            self.closed = event.is_terminal();
            return Some(event);
        }

        let rx = match self.rx.as_mut() {
            Some(rx) => rx,
            None => {
                self.closed = true;
                return None;
            }
        };

        loop {
            match timeout_at(self.deadline, rx.recv()).await {
                Ok(Ok(event)) => {
                    self.closed = event.is_terminal();
                    return Some(event);
                }
                // Lagged: skipped events are gone, but the terminal
                // event is always newer than the lag point. Keep going.
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    debug!(job_id = %self.job_id, skipped, "subscriber lagged");
                    continue;
                }
                // Channel dropped without a terminal event reaching us;
                // nothing more will arrive.
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    self.closed = true;
                    return None;
                }
                Err(_elapsed) => {
                    self.closed = true;
                    return Some(JobEvent::stream_timeout(self.job_id));
                }
            }
        }
    }

    /// Drain the stream to completion, collecting every event.
    pub async fn collect(mut self) -> Vec<JobEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}
