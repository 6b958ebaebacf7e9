//! The submission gate.
//!
//! All process creation funnels through here. The gate enforces the
//! one-active-process-per-inventory invariant with a coarse mutex around
//! the whole check-then-insert window: the latest-row lookup and the new
//! `Requested` insert must not interleave with another submission for the
//! same inventory.

use std::sync::Arc;

use tokio::sync::Mutex;

use stevedore_core::codes::{InventoryKind, ProcessType};
use stevedore_core::item::QueueItem;
use stevedore_core::types::DbId;
use stevedore_db::store::ProcessStore;

use crate::error::EngineError;
use crate::queue::JobQueues;

/// An inventory resource named in a submission.
#[derive(Debug, Clone)]
pub struct InventoryRef {
    pub inventory_id: DbId,
    pub kind: InventoryKind,
    pub name: String,
}

/// Per-inventory result of a submission.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub inventory_id: DbId,
    pub result: SubmissionResult,
}

#[derive(Debug, Clone)]
pub enum SubmissionResult {
    /// A new process row was created and enqueued.
    Accepted { process_id: DbId },
    /// The submission was refused; no row was created.
    Rejected { message: String },
}

impl SubmissionResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Validates submissions and turns them into queued `Requested` rows.
pub struct SubmissionGate {
    store: Arc<dyn ProcessStore>,
    queues: Arc<JobQueues>,
    /// Serializes every check-then-insert window.
    gate: Mutex<()>,
}

impl SubmissionGate {
    pub fn new(store: Arc<dyn ProcessStore>, queues: Arc<JobQueues>) -> Self {
        Self {
            store,
            queues,
            gate: Mutex::new(()),
        }
    }

    /// Submit one process for one inventory.
    ///
    /// When `group_id` is `None` a fresh group is created for the
    /// submission.
    pub async fn submit(
        &self,
        family: ProcessType,
        inventory: InventoryRef,
        group_id: Option<DbId>,
        requested_by: Option<DbId>,
    ) -> Result<SubmissionOutcome, EngineError> {
        let _guard = self.gate.lock().await;

        if let Some(message) = self.refusal_reason(family, &inventory).await? {
            return Ok(SubmissionOutcome {
                inventory_id: inventory.inventory_id,
                result: SubmissionResult::Rejected { message },
            });
        }

        let group_id = match group_id {
            Some(id) => id,
            None => self.store.create_group(requested_by).await?,
        };
        self.accept(family, inventory, group_id, requested_by).await
    }

    /// Submit one process for each inventory in a batch (for example
    /// "assess every resource mapped to this service").
    ///
    /// Inventory IDs repeated within the batch are claimed once; later
    /// occurrences are skipped silently, matching their de-duplication at
    /// resolve time. A refused inventory never aborts the rest of the
    /// batch. All accepted processes share one group.
    pub async fn submit_batch(
        &self,
        family: ProcessType,
        inventories: Vec<InventoryRef>,
        requested_by: Option<DbId>,
    ) -> Result<Vec<SubmissionOutcome>, EngineError> {
        let _guard = self.gate.lock().await;

        let mut outcomes = Vec::with_capacity(inventories.len());
        let mut claimed: Vec<DbId> = Vec::new();
        let mut group_id: Option<DbId> = None;

        for inventory in inventories {
            if claimed.contains(&inventory.inventory_id) {
                continue;
            }
            claimed.push(inventory.inventory_id);

            if let Some(message) = self.refusal_reason(family, &inventory).await? {
                outcomes.push(SubmissionOutcome {
                    inventory_id: inventory.inventory_id,
                    result: SubmissionResult::Rejected { message },
                });
                continue;
            }

            let group = match group_id {
                Some(id) => id,
                None => {
                    let id = self.store.create_group(requested_by).await?;
                    group_id = Some(id);
                    id
                }
            };
            outcomes.push(self.accept(family, inventory, group, requested_by).await?);
        }

        Ok(outcomes)
    }

    /// Why a submission must be refused, or `None` if it may proceed.
    ///
    /// A new process is allowed only when the inventory has no previous
    /// process in this family, or the most recent one is terminal.
    async fn refusal_reason(
        &self,
        family: ProcessType,
        inventory: &InventoryRef,
    ) -> Result<Option<String>, EngineError> {
        let latest = self
            .store
            .latest(inventory.inventory_id, family)
            .await?;

        match latest {
            Some(previous) if !previous.is_terminal() => Ok(Some(format!(
                "duplicated request: {} process {} for inventory {} is still active",
                family, previous.id, inventory.inventory_id,
            ))),
            _ => Ok(None),
        }
    }

    async fn accept(
        &self,
        family: ProcessType,
        inventory: InventoryRef,
        group_id: DbId,
        requested_by: Option<DbId>,
    ) -> Result<SubmissionOutcome, EngineError> {
        let row = self
            .store
            .create(
                inventory.inventory_id,
                inventory.kind,
                &inventory.name,
                family,
                Some(group_id),
                requested_by,
            )
            .await?;

        self.queues.enqueue(QueueItem {
            process_id: row.id,
            inventory_id: inventory.inventory_id,
            process_type: family,
            inventory_kind: inventory.kind,
            inventory_name: inventory.name,
        })?;

        tracing::info!(
            process_id = row.id,
            inventory_id = inventory.inventory_id,
            family = %family,
            "Process submitted",
        );

        Ok(SubmissionOutcome {
            inventory_id: inventory.inventory_id,
            result: SubmissionResult::Accepted { process_id: row.id },
        })
    }
}
