//! Process-wide cancellation state.
//!
//! Two registries cooperate to stop a job:
//!
//! - [`CancelRegistry`] records that somebody asked a process to stop.
//!   Dispatch workers consume the request at their checkpoints; a request
//!   for a process that has not been dequeued yet is also honoured.
//! - [`InterruptRegistry`] maps a *running* process's execution key to the
//!   [`CancellationToken`] its processor strategy is watching, so a cancel
//!   call can forcefully interrupt blocked remote I/O.
//!
//! Both are plain shared maps behind async locks. They are injected
//! `Arc` instances created at process start; entries are always removed
//! by the owning worker when the process finishes, so neither registry
//! outlives the jobs it references.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::types::{DbId, Timestamp};

/// Pending cancel requests, keyed by process ID.
#[derive(Debug, Default)]
pub struct CancelRegistry {
    requests: RwLock<HashMap<DbId, Timestamp>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cancel request for `process_id`.
    ///
    /// Idempotent: a second request keeps the original timestamp, so the
    /// observable effect of cancelling twice equals cancelling once.
    pub async fn request(&self, process_id: DbId) {
        self.requests
            .write()
            .await
            .entry(process_id)
            .or_insert_with(chrono::Utc::now);
    }

    /// Whether a cancel request is pending for `process_id`.
    pub async fn has_request(&self, process_id: DbId) -> bool {
        self.requests.read().await.contains_key(&process_id)
    }

    /// Remove and report a pending request.
    ///
    /// Returns `true` if a request was present. At most one caller
    /// observes `true` per request.
    pub async fn consume(&self, process_id: DbId) -> bool {
        self.requests.write().await.remove(&process_id).is_some()
    }
}

/// Cancellable handles for processes currently executing, keyed by
/// execution key (`"SCAN:42"`).
///
/// An entry exists only between pipeline step 4 entry and exit; the
/// worker that registered it always removes it, whether execution
/// returned, failed, or was interrupted.
#[derive(Debug, Default)]
pub struct InterruptRegistry {
    handles: RwLock<HashMap<String, CancellationToken>>,
}

impl InterruptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token under `key` and return it.
    ///
    /// The worker passes the token into the processor strategy, which
    /// watches it at its own suspension points.
    pub async fn register(&self, key: String) -> CancellationToken {
        let token = CancellationToken::new();
        self.handles.write().await.insert(key, token.clone());
        token
    }

    /// Remove the handle for `key`, if any.
    pub async fn remove(&self, key: &str) {
        self.handles.write().await.remove(key);
    }

    /// Signal the process registered under `key` to stop.
    ///
    /// Returns `true` if a handle was found (the process was executing
    /// and its token has been cancelled), `false` otherwise. The entry
    /// stays in the map; the owning worker removes it when step 4 exits.
    pub async fn interrupt(&self, key: &str) -> bool {
        match self.handles.read().await.get(key) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of live handles. Exposed for observability and tests.
    pub async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handles.read().await.is_empty()
    }
}
