use crate::types::ViewEvent;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type ResourceLog = Arc<RwLock<Vec<ViewEvent>>>;

/// Append-only in-memory view log, one log per resource.
///
/// The outer map lock is only held long enough to find or create a
/// resource's log; appends then serialize on that log's own lock, so writes
/// to different resources never wait on each other.
#[derive(Default)]
pub struct EventStore {
    logs: RwLock<HashMap<i64, ResourceLog>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a view. Resource existence is the caller's concern.
    pub fn append(&self, resource_id: i64, client_identity: &str, now: DateTime<Utc>) {
        let log = self.log_for(resource_id);
        let event = ViewEvent {
            resource_id,
            client_identity: client_identity.to_string(),
            timestamp: now,
        };
        log.write().unwrap_or_else(|e| e.into_inner()).push(event);
    }

    /// Snapshot of a resource's events in arrival order. Empty if none were
    /// ever recorded.
    pub fn read_all(&self, resource_id: i64) -> Vec<ViewEvent> {
        let log = {
            let logs = self.logs.read().unwrap_or_else(|e| e.into_inner());
            match logs.get(&resource_id) {
                Some(log) => log.clone(),
                None => return Vec::new(),
            }
        };
        let events = log.read().unwrap_or_else(|e| e.into_inner());
        events.clone()
    }

    pub fn len(&self, resource_id: i64) -> usize {
        let logs = self.logs.read().unwrap_or_else(|e| e.into_inner());
        logs.get(&resource_id)
            .map(|log| log.read().unwrap_or_else(|e| e.into_inner()).len())
            .unwrap_or(0)
    }

    fn log_for(&self, resource_id: i64) -> ResourceLog {
        if let Some(log) = self
            .logs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&resource_id)
        {
            return log.clone();
        }
        self.logs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(resource_id)
            .or_default()
            .clone()
    }
}
