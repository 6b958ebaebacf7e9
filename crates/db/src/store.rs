//! The process record store seam consumed by the execution engine.
//!
//! The engine never talks to sqlx directly; it drives everything through
//! [`ProcessStore`]. Production wires in [`PgProcessStore`]; tests use an
//! in-memory implementation.

use async_trait::async_trait;
use stevedore_core::codes::{InventoryKind, ProcessResultCode, ProcessType};
use stevedore_core::types::DbId;

use crate::models::process::InventoryProcess;
use crate::repositories::{GroupRepo, ProcessRepo};
use crate::DbPool;

/// Errors surfaced by a process store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store error: {0}")]
    Internal(String),
}

/// Durable storage for inventory process records.
///
/// Transition methods return `bool`: `true` when the guarded write
/// applied, `false` when the row was no longer in the expected state.
/// Callers treat `false` as "somebody else got there first", never as an
/// error.
#[async_trait]
pub trait ProcessStore: Send + Sync {
    /// Insert a new process in `Requested` state.
    async fn create(
        &self,
        inventory_id: DbId,
        inventory_kind: InventoryKind,
        inventory_name: &str,
        process_type: ProcessType,
        group_id: Option<DbId>,
        created_by: Option<DbId>,
    ) -> Result<InventoryProcess, StoreError>;

    /// Create a process group and return its ID.
    async fn create_group(&self, created_by: Option<DbId>) -> Result<DbId, StoreError>;

    /// Fetch a process by ID.
    async fn get(&self, id: DbId) -> Result<Option<InventoryProcess>, StoreError>;

    /// Most recent non-deleted process for `(inventory_id, process_type)`.
    async fn latest(
        &self,
        inventory_id: DbId,
        process_type: ProcessType,
    ) -> Result<Option<InventoryProcess>, StoreError>;

    /// Guarded `Requested` → `Running` transition.
    async fn mark_running(&self, id: DbId) -> Result<bool, StoreError>;

    /// Guarded write of a terminal state with payload and message.
    async fn finish(
        &self,
        id: DbId,
        state: ProcessResultCode,
        result: Option<serde_json::Value>,
        message: Option<String>,
    ) -> Result<bool, StoreError>;

    /// Guarded non-terminal → `Cancelled` transition.
    async fn cancel(&self, id: DbId) -> Result<bool, StoreError>;

    /// Flip orphaned `Running` rows to `Failed`; returns how many.
    async fn reconcile_running_to_failed(&self, message: &str) -> Result<u64, StoreError>;

    /// Non-deleted `Requested` rows in one family, oldest first.
    async fn list_requested(
        &self,
        process_type: ProcessType,
    ) -> Result<Vec<InventoryProcess>, StoreError>;

    /// Soft-delete terminal history (cancelled / failed / not supported).
    async fn soft_delete(&self, id: DbId) -> Result<bool, StoreError>;
}

/// [`ProcessStore`] backed by Postgres through the repositories.
#[derive(Clone)]
pub struct PgProcessStore {
    pool: DbPool,
}

impl PgProcessStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessStore for PgProcessStore {
    async fn create(
        &self,
        inventory_id: DbId,
        inventory_kind: InventoryKind,
        inventory_name: &str,
        process_type: ProcessType,
        group_id: Option<DbId>,
        created_by: Option<DbId>,
    ) -> Result<InventoryProcess, StoreError> {
        Ok(ProcessRepo::create(
            &self.pool,
            inventory_id,
            inventory_kind,
            inventory_name,
            process_type,
            group_id,
            created_by,
        )
        .await?)
    }

    async fn create_group(&self, created_by: Option<DbId>) -> Result<DbId, StoreError> {
        Ok(GroupRepo::create(&self.pool, created_by).await?.id)
    }

    async fn get(&self, id: DbId) -> Result<Option<InventoryProcess>, StoreError> {
        Ok(ProcessRepo::find_by_id(&self.pool, id).await?)
    }

    async fn latest(
        &self,
        inventory_id: DbId,
        process_type: ProcessType,
    ) -> Result<Option<InventoryProcess>, StoreError> {
        Ok(ProcessRepo::latest(&self.pool, inventory_id, process_type).await?)
    }

    async fn mark_running(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(ProcessRepo::mark_running(&self.pool, id).await?)
    }

    async fn finish(
        &self,
        id: DbId,
        state: ProcessResultCode,
        result: Option<serde_json::Value>,
        message: Option<String>,
    ) -> Result<bool, StoreError> {
        Ok(ProcessRepo::finish(&self.pool, id, state, result.as_ref(), message.as_deref())
            .await?)
    }

    async fn cancel(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(ProcessRepo::cancel(&self.pool, id).await?)
    }

    async fn reconcile_running_to_failed(&self, message: &str) -> Result<u64, StoreError> {
        Ok(ProcessRepo::reconcile_running_to_failed(&self.pool, message).await?)
    }

    async fn list_requested(
        &self,
        process_type: ProcessType,
    ) -> Result<Vec<InventoryProcess>, StoreError> {
        Ok(ProcessRepo::list_requested(&self.pool, process_type).await?)
    }

    async fn soft_delete(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(ProcessRepo::soft_delete(&self.pool, id).await?)
    }
}
