//! Process-scoped storage shared between prewarm and every job of a worker.

use crate::error::WorkerError;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// String-keyed, typed storage. Values are stored behind `Arc` and cloned out
/// on read, so a handle loaded once in prewarm can be handed to many jobs.
#[derive(Default)]
pub struct Userdata {
    entries: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl Userdata {
    pub fn insert<T>(&self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.into(), Arc::new(value));
    }

    /// Returns a clone of the value stored under `key`.
    ///
    /// # Errors
    ///
    /// `MissingUserdata` if nothing is stored under `key`; `UserdataType` if
    /// the stored value is not a `T`.
    pub fn get<T>(&self, key: &str) -> Result<T, WorkerError>
    where
        T: Any + Clone + Send + Sync,
    {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let value = entries
            .get(key)
            .ok_or_else(|| WorkerError::MissingUserdata(key.to_string()))?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| WorkerError::UserdataType(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }
}

impl std::fmt::Debug for Userdata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort();
        f.debug_struct("Userdata").field("keys", &keys).finish()
    }
}

/// The worker process as seen by the hooks.
#[derive(Debug)]
pub struct JobProcess {
    id: String,
    userdata: Userdata,
}

impl JobProcess {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            userdata: Userdata::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn userdata(&self) -> &Userdata {
        &self.userdata
    }
}

impl Default for JobProcess {
    fn default() -> Self {
        Self::new()
    }
}
