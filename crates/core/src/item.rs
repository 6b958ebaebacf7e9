//! The in-memory handle a dispatch worker consumes from a job queue.

use serde::{Deserialize, Serialize};

use crate::codes::{InventoryKind, ProcessType};
use crate::types::DbId;

/// One enqueued unit of work.
///
/// Produced by the submission gate, consumed exactly once by a dispatch
/// worker. Never persisted: after a restart the engine rebuilds queue
/// items from process rows still in `Requested`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// ID of the `inventory_process` row this item drives.
    pub process_id: DbId,
    /// Target inventory resource.
    pub inventory_id: DbId,
    /// Process family; decides which queue the item travels on.
    pub process_type: ProcessType,
    /// Resource kind; decides which processor strategy runs the work.
    pub inventory_kind: InventoryKind,
    /// Human-readable resource name, carried for log lines only.
    pub inventory_name: String,
}

impl QueueItem {
    /// Key identifying this item's running process in the interrupt
    /// registry.
    pub fn execution_key(&self) -> String {
        self.process_type.execution_key(self.process_id)
    }
}
