//! Room admission guard.
//!
//! Tracks which rooms already have an agent session in this process so that a
//! second job request for the same room is rejected. The set is process-local:
//! it de-duplicates within one worker process only, never across a cluster.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The room was free and is now reserved.
    Accepted,
    /// The room already has an agent; nothing changed.
    Rejected,
}

/// Process-wide set of occupied room names.
///
/// Cloning is cheap and every clone shares the same set.
#[derive(Clone, Debug, Default)]
pub struct RoomAdmission {
    rooms: Arc<Mutex<HashSet<String>>>,
}

impl RoomAdmission {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        match self.rooms.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // A panicking holder cannot leave the set half-updated: every
                // critical section is a single insert/remove.
                tracing::error!("room admission lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Reserves `room` if it is free.
    ///
    /// The membership check and the insert happen under one lock, so two
    /// concurrent requests for the same room cannot both be accepted.
    pub fn try_admit(&self, room: &str) -> Admission {
        if self.lock().insert(room.to_string()) {
            Admission::Accepted
        } else {
            Admission::Rejected
        }
    }

    /// Removes `room` from the set. Returns `true` if it was present.
    pub fn release(&self, room: &str) -> bool {
        self.lock().remove(room)
    }

    /// Returns a guard that releases `room` when dropped.
    ///
    /// The guard fires on every exit path of its owner: normal return, `?`
    /// propagation, panic unwinding, and cancellation of the owning future.
    pub fn release_on_drop(&self, room: impl Into<String>) -> AdmissionGuard {
        AdmissionGuard {
            admission: self.clone(),
            room: room.into(),
        }
    }

    pub fn contains(&self, room: &str) -> bool {
        self.lock().contains(room)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sorted snapshot of the occupied rooms.
    pub fn rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.lock().iter().cloned().collect();
        rooms.sort();
        rooms
    }
}

/// Releases a room reservation when dropped.
#[derive(Debug)]
pub struct AdmissionGuard {
    admission: RoomAdmission,
    room: String,
}

impl AdmissionGuard {
    pub fn room(&self) -> &str {
        &self.room
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        if !self.admission.release(&self.room) {
            tracing::debug!(room = %self.room, "room was not reserved at release");
        }
    }
}
