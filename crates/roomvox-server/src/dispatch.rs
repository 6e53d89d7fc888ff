//! Per-room agent dispatch bookkeeping for the token API.
//!
//! The first token request for a room dispatches the agent; later requests
//! for the same room find the record and skip dispatching. Records expire
//! after a TTL and are cleared early once the room's agent has left.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchState {
    /// A dispatch is in flight.
    Pending,
    /// The worker accepted the job with this id.
    Dispatched(String),
}

#[derive(Debug)]
struct Entry {
    state: DispatchState,
    recorded_at: Instant,
}

#[derive(Debug)]
pub struct DispatchRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl DispatchRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("dispatch registry lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.duration_since(entry.recorded_at) >= self.ttl
    }

    /// Marks `room` as pending. Returns `false` if the room already has a
    /// live record, in which case the caller must not dispatch.
    pub fn try_begin(&self, room: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.lock();
        if let Some(entry) = entries.get(room) {
            if !self.is_expired(entry, now) {
                return false;
            }
        }
        entries.insert(
            room.to_string(),
            Entry {
                state: DispatchState::Pending,
                recorded_at: now,
            },
        );
        true
    }

    /// Records the accepted job for `room`.
    pub fn complete(&self, room: &str, job_id: &str) {
        self.lock().insert(
            room.to_string(),
            Entry {
                state: DispatchState::Dispatched(job_id.to_string()),
                recorded_at: Instant::now(),
            },
        );
    }

    /// Drops the record for `room` so the next request dispatches again.
    pub fn fail(&self, room: &str) {
        self.lock().remove(room);
    }

    /// Drops a `Dispatched` record whose agent is no longer in the room.
    /// Pending records are left alone. Returns `true` if a record was removed.
    pub fn clear_if_inactive(&self, room: &str, agent_active: bool) -> bool {
        if agent_active {
            return false;
        }
        let mut entries = self.lock();
        match entries.get(room) {
            Some(Entry {
                state: DispatchState::Dispatched(_),
                ..
            }) => {
                entries.remove(room);
                true
            }
            _ => false,
        }
    }

    /// Current record for `room`, ignoring expired ones.
    pub fn state(&self, room: &str) -> Option<DispatchState> {
        let now = Instant::now();
        self.lock()
            .get(room)
            .filter(|entry| !self.is_expired(entry, now))
            .map(|entry| entry.state.clone())
    }

    /// Removes expired records and returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.recorded_at) < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Periodically prunes expired dispatch records. Runs until the task is
/// dropped.
pub async fn start_pruning_task(registry: std::sync::Arc<DispatchRegistry>) {
    let interval = (registry.ttl() / 2).clamp(Duration::from_secs(1), Duration::from_secs(60));
    tracing::info!(
        ttl_seconds = registry.ttl().as_secs(),
        interval_seconds = interval.as_secs(),
        "starting dispatch pruning task"
    );
    loop {
        tokio::time::sleep(interval).await;
        let pruned = registry.prune_expired();
        if pruned > 0 {
            tracing::debug!(count = pruned, "pruned expired dispatch records");
        }
    }
}
