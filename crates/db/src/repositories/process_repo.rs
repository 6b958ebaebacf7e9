//! Repository for the `inventory_process` table.
//!
//! Every state transition is a single guarded UPDATE ("only if the row is
//! still in the expected state"), so concurrent writers resolve to exactly
//! one winner and a terminal state is never overwritten.

use sqlx::PgPool;
use stevedore_core::codes::{InventoryKind, ProcessResultCode, ProcessType};
use stevedore_core::types::DbId;

use crate::models::process::InventoryProcess;

/// Column list for `inventory_process` queries.
const COLUMNS: &str = "\
    id, inventory_id, inventory_kind, inventory_name, process_type, \
    result_code, group_id, started_at, ended_at, result, error_message, \
    deleted, created_by, created_at, updated_at";

/// Provides CRUD operations for inventory processes.
pub struct ProcessRepo;

impl ProcessRepo {
    /// Insert a new process in `Requested` state and return the row.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &PgPool,
        inventory_id: DbId,
        inventory_kind: InventoryKind,
        inventory_name: &str,
        process_type: ProcessType,
        group_id: Option<DbId>,
        created_by: Option<DbId>,
    ) -> Result<InventoryProcess, sqlx::Error> {
        let query = format!(
            "INSERT INTO inventory_process \
                 (inventory_id, inventory_kind, inventory_name, process_type, \
                  result_code, group_id, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, InventoryProcess>(&query)
            .bind(inventory_id)
            .bind(inventory_kind.id())
            .bind(inventory_name)
            .bind(process_type.id())
            .bind(ProcessResultCode::Requested.id())
            .bind(group_id)
            .bind(created_by)
            .fetch_one(pool)
            .await
    }

    /// Find a process by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<InventoryProcess>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM inventory_process WHERE id = $1");
        sqlx::query_as::<_, InventoryProcess>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recent non-deleted process for an inventory within a family.
    ///
    /// The submission gate's one-active-process check reads this row.
    pub async fn latest(
        pool: &PgPool,
        inventory_id: DbId,
        process_type: ProcessType,
    ) -> Result<Option<InventoryProcess>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM inventory_process \
             WHERE inventory_id = $1 AND process_type = $2 AND deleted = FALSE \
             ORDER BY id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, InventoryProcess>(&query)
            .bind(inventory_id)
            .bind(process_type.id())
            .fetch_optional(pool)
            .await
    }

    /// Transition `Requested` → `Running`, recording `started_at`.
    ///
    /// Returns `false` if the row was no longer in `Requested` (for
    /// example cancelled between enqueue and dequeue).
    pub async fn mark_running(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE inventory_process \
             SET result_code = $2, started_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND result_code = $3",
        )
        .bind(id)
        .bind(ProcessResultCode::Running.id())
        .bind(ProcessResultCode::Requested.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Write a terminal state with its result payload and message.
    ///
    /// No-op (returns `false`) if the row already reached a terminal
    /// state; whichever of the cooperative checkpoint and the forceful
    /// cancel path writes first wins.
    pub async fn finish(
        pool: &PgPool,
        id: DbId,
        state: ProcessResultCode,
        result: Option<&serde_json::Value>,
        message: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        debug_assert!(state.is_terminal());
        let updated = sqlx::query(
            "UPDATE inventory_process \
             SET result_code = $2, result = COALESCE($3, result), \
                 error_message = COALESCE($4, error_message), \
                 ended_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND NOT (result_code = ANY($5))",
        )
        .bind(id)
        .bind(state.id())
        .bind(result)
        .bind(message)
        .bind(&ProcessResultCode::TERMINAL_IDS[..])
        .execute(pool)
        .await?;
        Ok(updated.rows_affected() > 0)
    }

    /// Cancel a process if it is not already terminal.
    pub async fn cancel(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        Self::finish(pool, id, ProcessResultCode::Cancelled, None, None).await
    }

    /// Flip every `Running` row to `Failed` with the given message.
    ///
    /// Run once at startup: a row still in `Running` after a restart lost
    /// its worker and can never finish on its own.
    pub async fn reconcile_running_to_failed(
        pool: &PgPool,
        message: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE inventory_process \
             SET result_code = $1, error_message = $2, \
                 ended_at = NOW(), updated_at = NOW() \
             WHERE result_code = $3",
        )
        .bind(ProcessResultCode::Failed.id())
        .bind(message)
        .bind(ProcessResultCode::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Non-deleted rows still in `Requested` within one family, oldest
    /// first. Re-enqueued at startup to recover items the in-memory
    /// queues lost on restart.
    pub async fn list_requested(
        pool: &PgPool,
        process_type: ProcessType,
    ) -> Result<Vec<InventoryProcess>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM inventory_process \
             WHERE process_type = $1 AND result_code = $2 AND deleted = FALSE \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, InventoryProcess>(&query)
            .bind(process_type.id())
            .bind(ProcessResultCode::Requested.id())
            .fetch_all(pool)
            .await
    }

    /// Soft-delete a process row.
    ///
    /// Only cancelled, failed, or not-supported history may be removed;
    /// returns `false` for any other state.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let deletable = [
            ProcessResultCode::Cancelled.id(),
            ProcessResultCode::Failed.id(),
            ProcessResultCode::NotSupported.id(),
        ];
        let result = sqlx::query(
            "UPDATE inventory_process \
             SET deleted = TRUE, updated_at = NOW() \
             WHERE id = $1 AND deleted = FALSE AND result_code = ANY($2)",
        )
        .bind(id)
        .bind(&deletable[..])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
