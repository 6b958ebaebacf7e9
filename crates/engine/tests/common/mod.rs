//! Shared test fixtures: an in-memory process store and scripted
//! processor strategies.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use stevedore_core::codes::{InventoryKind, ProcessResultCode, ProcessType};
use stevedore_core::item::QueueItem;
use stevedore_core::types::DbId;
use stevedore_db::models::process::InventoryProcess;
use stevedore_db::store::{ProcessStore, StoreError};
use stevedore_engine::cancel::CancelService;
use stevedore_engine::processor::{ProcessOutcome, Processor, ProcessorError};
use stevedore_engine::submit::InventoryRef;

// ---------------------------------------------------------------------------
// In-memory process store
// ---------------------------------------------------------------------------

/// A `ProcessStore` holding rows in a map, with the same guarded
/// transition semantics as the Postgres implementation.
#[derive(Default)]
pub struct InMemoryStore {
    rows: Mutex<HashMap<DbId, InventoryProcess>>,
    next_id: AtomicI64,
    next_group_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: flip the soft-delete flag directly, bypassing the
    /// terminal-state guard, to fabricate a stale queue item.
    pub async fn force_delete(&self, id: DbId) {
        if let Some(row) = self.rows.lock().await.get_mut(&id) {
            row.deleted = true;
        }
    }

    /// Test hook: insert a row in an arbitrary state, as if left behind
    /// by a previous run.
    pub async fn seed_row(
        &self,
        inventory_id: DbId,
        kind: InventoryKind,
        family: ProcessType,
        state: ProcessResultCode,
    ) -> DbId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = chrono::Utc::now();
        let row = InventoryProcess {
            id,
            inventory_id,
            inventory_kind: kind.id(),
            inventory_name: format!("inventory-{inventory_id}"),
            process_type: family.id(),
            result_code: state.id(),
            group_id: None,
            started_at: None,
            ended_at: None,
            result: None,
            error_message: None,
            deleted: false,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().await.insert(id, row);
        id
    }

    pub async fn row(&self, id: DbId) -> Option<InventoryProcess> {
        self.rows.lock().await.get(&id).cloned()
    }

    /// Count of rows for an inventory/family pair in non-terminal state.
    pub async fn active_count(&self, inventory_id: DbId, family: ProcessType) -> usize {
        self.rows
            .lock()
            .await
            .values()
            .filter(|row| {
                row.inventory_id == inventory_id
                    && row.process_type == family.id()
                    && !row.is_terminal()
            })
            .count()
    }
}

#[async_trait]
impl ProcessStore for InMemoryStore {
    async fn create(
        &self,
        inventory_id: DbId,
        inventory_kind: InventoryKind,
        inventory_name: &str,
        process_type: ProcessType,
        group_id: Option<DbId>,
        created_by: Option<DbId>,
    ) -> Result<InventoryProcess, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = chrono::Utc::now();
        let row = InventoryProcess {
            id,
            inventory_id,
            inventory_kind: inventory_kind.id(),
            inventory_name: inventory_name.to_string(),
            process_type: process_type.id(),
            result_code: ProcessResultCode::Requested.id(),
            group_id,
            started_at: None,
            ended_at: None,
            result: None,
            error_message: None,
            deleted: false,
            created_by,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().await.insert(id, row.clone());
        Ok(row)
    }

    async fn create_group(&self, _created_by: Option<DbId>) -> Result<DbId, StoreError> {
        Ok(self.next_group_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn get(&self, id: DbId) -> Result<Option<InventoryProcess>, StoreError> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn latest(
        &self,
        inventory_id: DbId,
        process_type: ProcessType,
    ) -> Result<Option<InventoryProcess>, StoreError> {
        Ok(self
            .rows
            .lock()
            .await
            .values()
            .filter(|row| {
                row.inventory_id == inventory_id
                    && row.process_type == process_type.id()
                    && !row.deleted
            })
            .max_by_key(|row| row.id)
            .cloned())
    }

    async fn mark_running(&self, id: DbId) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().await;
        match rows.get_mut(&id) {
            Some(row) if row.result_code == ProcessResultCode::Requested.id() => {
                row.result_code = ProcessResultCode::Running.id();
                row.started_at = Some(chrono::Utc::now());
                row.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finish(
        &self,
        id: DbId,
        state: ProcessResultCode,
        result: Option<serde_json::Value>,
        message: Option<String>,
    ) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().await;
        match rows.get_mut(&id) {
            Some(row) if !row.is_terminal() => {
                row.result_code = state.id();
                if result.is_some() {
                    row.result = result;
                }
                if message.is_some() {
                    row.error_message = message;
                }
                row.ended_at = Some(chrono::Utc::now());
                row.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel(&self, id: DbId) -> Result<bool, StoreError> {
        self.finish(id, ProcessResultCode::Cancelled, None, None)
            .await
    }

    async fn reconcile_running_to_failed(&self, message: &str) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().await;
        let mut count = 0;
        for row in rows.values_mut() {
            if row.result_code == ProcessResultCode::Running.id() {
                row.result_code = ProcessResultCode::Failed.id();
                row.error_message = Some(message.to_string());
                row.ended_at = Some(chrono::Utc::now());
                count += 1;
            }
        }
        Ok(count)
    }

    async fn list_requested(
        &self,
        process_type: ProcessType,
    ) -> Result<Vec<InventoryProcess>, StoreError> {
        let rows = self.rows.lock().await;
        let mut requested: Vec<_> = rows
            .values()
            .filter(|row| {
                row.process_type == process_type.id()
                    && row.result_code == ProcessResultCode::Requested.id()
                    && !row.deleted
            })
            .cloned()
            .collect();
        requested.sort_by_key(|row| row.id);
        Ok(requested)
    }

    async fn soft_delete(&self, id: DbId) -> Result<bool, StoreError> {
        let deletable = [
            ProcessResultCode::Cancelled,
            ProcessResultCode::Failed,
            ProcessResultCode::NotSupported,
        ];
        let mut rows = self.rows.lock().await;
        match rows.get_mut(&id) {
            Some(row)
                if !row.deleted
                    && row.state().is_some_and(|s| deletable.contains(&s)) =>
            {
                row.deleted = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Cancel-on-finish store
// ---------------------------------------------------------------------------

/// Delegates to an [`InMemoryStore`], but the first terminal write first
/// issues a cancel request for the same process through the armed
/// [`CancelService`]. This pins the interleaving where a cancel lands
/// after the worker's final checkpoint but before the row goes terminal.
pub struct CancelOnFinishStore {
    inner: Arc<InMemoryStore>,
    service: std::sync::Mutex<Option<Arc<CancelService>>>,
    fired: AtomicBool,
}

impl CancelOnFinishStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            service: std::sync::Mutex::new(None),
            fired: AtomicBool::new(false),
        }
    }

    pub fn arm(&self, service: Arc<CancelService>) {
        *self.service.lock().unwrap() = Some(service);
    }
}

#[async_trait]
impl ProcessStore for CancelOnFinishStore {
    async fn create(
        &self,
        inventory_id: DbId,
        inventory_kind: InventoryKind,
        inventory_name: &str,
        process_type: ProcessType,
        group_id: Option<DbId>,
        created_by: Option<DbId>,
    ) -> Result<InventoryProcess, StoreError> {
        self.inner
            .create(
                inventory_id,
                inventory_kind,
                inventory_name,
                process_type,
                group_id,
                created_by,
            )
            .await
    }

    async fn create_group(&self, created_by: Option<DbId>) -> Result<DbId, StoreError> {
        self.inner.create_group(created_by).await
    }

    async fn get(&self, id: DbId) -> Result<Option<InventoryProcess>, StoreError> {
        self.inner.get(id).await
    }

    async fn latest(
        &self,
        inventory_id: DbId,
        process_type: ProcessType,
    ) -> Result<Option<InventoryProcess>, StoreError> {
        self.inner.latest(inventory_id, process_type).await
    }

    async fn mark_running(&self, id: DbId) -> Result<bool, StoreError> {
        self.inner.mark_running(id).await
    }

    async fn finish(
        &self,
        id: DbId,
        state: ProcessResultCode,
        result: Option<serde_json::Value>,
        message: Option<String>,
    ) -> Result<bool, StoreError> {
        let service = self.service.lock().unwrap().clone();
        if let Some(service) = service {
            if !self.fired.swap(true, Ordering::SeqCst) {
                // The row is still `Running` here, so the request is
                // accepted; no interrupt token exists any more.
                service
                    .request_cancel(id)
                    .await
                    .expect("cancel during finalization must be accepted");
            }
        }
        self.inner.finish(id, state, result, message).await
    }

    async fn cancel(&self, id: DbId) -> Result<bool, StoreError> {
        self.inner.cancel(id).await
    }

    async fn reconcile_running_to_failed(&self, message: &str) -> Result<u64, StoreError> {
        self.inner.reconcile_running_to_failed(message).await
    }

    async fn list_requested(
        &self,
        process_type: ProcessType,
    ) -> Result<Vec<InventoryProcess>, StoreError> {
        self.inner.list_requested(process_type).await
    }

    async fn soft_delete(&self, id: DbId) -> Result<bool, StoreError> {
        self.inner.soft_delete(id).await
    }
}

// ---------------------------------------------------------------------------
// Scripted processors
// ---------------------------------------------------------------------------

/// Returns a fixed outcome immediately, counting invocations.
pub struct InstantProcessor {
    outcome: ProcessOutcome,
    pub executions: AtomicUsize,
}

impl InstantProcessor {
    pub fn new(outcome: ProcessOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            executions: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Processor for InstantProcessor {
    async fn execute(
        &self,
        _item: &QueueItem,
        _cancel: &CancellationToken,
    ) -> Result<ProcessOutcome, ProcessorError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(self.outcome.clone())
    }
}

/// Fails every execution with a fixed message.
pub struct FailingProcessor(pub String);

#[async_trait]
impl Processor for FailingProcessor {
    async fn execute(
        &self,
        _item: &QueueItem,
        _cancel: &CancellationToken,
    ) -> Result<ProcessOutcome, ProcessorError> {
        Err(ProcessorError::Failed(self.0.clone()))
    }
}

/// Simulates blocking remote I/O: notifies the test it has started, then
/// waits until its cancellation token fires.
pub struct BlockingProcessor {
    pub started: Arc<Notify>,
}

impl BlockingProcessor {
    pub fn new() -> (Arc<Self>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        (
            Arc::new(Self {
                started: Arc::clone(&started),
            }),
            started,
        )
    }
}

#[async_trait]
impl Processor for BlockingProcessor {
    async fn execute(
        &self,
        _item: &QueueItem,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutcome, ProcessorError> {
        self.started.notify_one();
        cancel.cancelled().await;
        Err(ProcessorError::Cancelled)
    }
}

/// Notifies the test it has started, then waits for permission to finish
/// and returns `Completed` regardless of its token (a strategy that
/// never checks for interruption).
pub struct StubbornProcessor {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl StubbornProcessor {
    pub fn new() -> (Arc<Self>, Arc<Notify>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        (
            Arc::new(Self {
                started: Arc::clone(&started),
                release: Arc::clone(&release),
            }),
            started,
            release,
        )
    }
}

#[async_trait]
impl Processor for StubbornProcessor {
    async fn execute(
        &self,
        _item: &QueueItem,
        _cancel: &CancellationToken,
    ) -> Result<ProcessOutcome, ProcessorError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(ProcessOutcome::completed(serde_json::json!({"ok": true})))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn inventory(id: DbId, kind: InventoryKind) -> InventoryRef {
    InventoryRef {
        inventory_id: id,
        kind,
        name: format!("inventory-{id}"),
    }
}

/// Poll the store until the row reaches `state` or the timeout expires.
pub async fn wait_for_state(
    store: &InMemoryStore,
    id: DbId,
    state: ProcessResultCode,
) -> InventoryProcess {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(row) = store.row(id).await {
            if row.result_code == state.id() {
                return row;
            }
        }
        if tokio::time::Instant::now() > deadline {
            panic!("process {id} never reached {state:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
