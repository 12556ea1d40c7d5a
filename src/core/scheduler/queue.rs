use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

type Slot = Reverse<(DateTime<Utc>, u64, String)>;

/// Min-heap of run times with at most one live entry per event id.
///
/// Re-scheduling an id bumps its generation; the superseded heap entry stays
/// in place and is dropped when it reaches the top.
#[derive(Debug, Default)]
pub struct RunQueue {
    heap: BinaryHeap<Slot>,
    live: HashMap<String, u64>,
    generation: u64,
}

impl RunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the run time for `event_id`. Returns true if the id was not queued.
    pub fn schedule(&mut self, event_id: &str, at: DateTime<Utc>) -> bool {
        self.generation += 1;
        let fresh = self
            .live
            .insert(event_id.to_string(), self.generation)
            .is_none();
        self.heap
            .push(Reverse((at, self.generation, event_id.to_string())));
        fresh
    }

    pub fn remove(&mut self, event_id: &str) -> bool {
        self.live.remove(event_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn next_deadline(&mut self) -> Option<DateTime<Utc>> {
        self.prune();
        self.heap.peek().map(|Reverse((at, _, _))| *at)
    }

    /// Pop the earliest entry if it is due at `now`; the id leaves the queue.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<(String, DateTime<Utc>)> {
        self.prune();
        let due = matches!(self.heap.peek(), Some(Reverse((at, _, _))) if *at <= now);
        if !due {
            return None;
        }
        let Reverse((at, _, event_id)) = self.heap.pop()?;
        self.live.remove(&event_id);
        Some((event_id, at))
    }

    fn prune(&mut self) {
        while let Some(Reverse((_, generation, event_id))) = self.heap.peek() {
            if self.live.get(event_id) == Some(generation) {
                break;
            }
            self.heap.pop();
        }
    }
}
