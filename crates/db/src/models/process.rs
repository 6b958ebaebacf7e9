//! Inventory process entity model.

use serde::Serialize;
use sqlx::FromRow;
use stevedore_core::codes::{CodeId, InventoryKind, ProcessResultCode, ProcessType};
use stevedore_core::item::QueueItem;
use stevedore_core::types::{DbId, Timestamp};

/// A row from the `inventory_process` table.
///
/// `process_type` and `result_code` are stored as raw code IDs; use
/// [`InventoryProcess::state`] to interpret the result code.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InventoryProcess {
    pub id: DbId,
    pub inventory_id: DbId,
    pub inventory_kind: CodeId,
    pub inventory_name: String,
    pub process_type: CodeId,
    pub result_code: CodeId,
    pub group_id: Option<DbId>,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub deleted: bool,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl InventoryProcess {
    /// Decode the stored result code, if it is a known state.
    pub fn state(&self) -> Option<ProcessResultCode> {
        ProcessResultCode::from_id(self.result_code)
    }

    /// Whether the process has reached a terminal state.
    ///
    /// An unknown code is treated as terminal so a corrupt row can never
    /// satisfy the one-active-process check forever.
    pub fn is_terminal(&self) -> bool {
        self.state().map_or(true, ProcessResultCode::is_terminal)
    }

    /// Rebuild the queue item this row was (or will be) dispatched as.
    ///
    /// `None` if the stored type or kind code is unknown.
    pub fn queue_item(&self) -> Option<QueueItem> {
        Some(QueueItem {
            process_id: self.id,
            inventory_id: self.inventory_id,
            process_type: ProcessType::from_id(self.process_type)?,
            inventory_kind: InventoryKind::from_id(self.inventory_kind)?,
            inventory_name: self.inventory_name.clone(),
        })
    }
}
