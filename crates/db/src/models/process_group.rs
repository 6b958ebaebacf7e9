//! Process group entity model.

use serde::Serialize;
use sqlx::FromRow;
use stevedore_core::types::{DbId, Timestamp};

/// A row from the `inventory_process_group` table.
///
/// Groups link processes created by one user action (for example
/// "assess every inventory in this service"). A group is created once,
/// never mutated, and never transitions state itself.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InventoryProcessGroup {
    pub id: DbId,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
}
