//! Repository for the `inventory_process_group` table.

use sqlx::PgPool;
use stevedore_core::types::DbId;

use crate::models::process_group::InventoryProcessGroup;

pub struct GroupRepo;

impl GroupRepo {
    /// Create a new process group and return the row.
    pub async fn create(
        pool: &PgPool,
        created_by: Option<DbId>,
    ) -> Result<InventoryProcessGroup, sqlx::Error> {
        sqlx::query_as::<_, InventoryProcessGroup>(
            "INSERT INTO inventory_process_group (created_by) \
             VALUES ($1) \
             RETURNING id, created_by, created_at",
        )
        .bind(created_by)
        .fetch_one(pool)
        .await
    }
}
