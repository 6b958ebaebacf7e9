//! The externally triggered half of the cancellation protocol.
//!
//! A cancel request always lands in the [`CancelRegistry`], so a process
//! that has not been dequeued yet is covered by the worker's checkpoints.
//! If the process is already running, the service additionally tries a
//! forceful interrupt through the [`InterruptRegistry`]; on success it
//! persists `Cancelled` immediately rather than waiting for the worker's
//! cooperative checkpoint. Whichever write lands first wins — both sides
//! go through the store's guarded terminal write, so the loser is a
//! no-op.

use std::sync::Arc;

use stevedore_core::cancel::{CancelRegistry, InterruptRegistry};
use stevedore_core::codes::{ProcessResultCode, ProcessType};
use stevedore_core::types::DbId;
use stevedore_db::store::ProcessStore;

use crate::error::EngineError;

pub struct CancelService {
    store: Arc<dyn ProcessStore>,
    cancels: Arc<CancelRegistry>,
    interrupts: Arc<InterruptRegistry>,
}

impl CancelService {
    pub fn new(
        store: Arc<dyn ProcessStore>,
        cancels: Arc<CancelRegistry>,
        interrupts: Arc<InterruptRegistry>,
    ) -> Self {
        Self {
            store,
            cancels,
            interrupts,
        }
    }

    /// Request cancellation of a process.
    ///
    /// Fails with [`EngineError::InvalidCancelStatus`] when the process
    /// is already terminal. Otherwise idempotent: repeating the call has
    /// no further observable effect.
    pub async fn request_cancel(&self, process_id: DbId) -> Result<(), EngineError> {
        let process = self
            .store
            .get(process_id)
            .await?
            .ok_or(EngineError::ProcessNotFound(process_id))?;

        let state = process
            .state()
            .unwrap_or(ProcessResultCode::Failed);
        if state.is_terminal() {
            return Err(EngineError::InvalidCancelStatus {
                id: process_id,
                state,
            });
        }

        // Cover the not-yet-dequeued case and the worker's checkpoints.
        self.cancels.request(process_id).await;

        if state == ProcessResultCode::Running {
            let key = match ProcessType::from_id(process.process_type) {
                Some(family) => family.execution_key(process_id),
                None => {
                    return Err(EngineError::ProcessNotFound(process_id));
                }
            };
            let interrupted = self.interrupts.interrupt(&key).await;
            tracing::info!(
                process_id,
                execution_key = %key,
                interrupted,
                "Cancel requested for running process",
            );
            if interrupted {
                // Fast path: don't wait for the worker to reach its next
                // checkpoint. The pending cancel request stays registered
                // as a backstop; the guarded write resolves the race.
                self.store.cancel(process_id).await?;
            } else {
                // No handle means the worker is outside the execution
                // window. If the row went terminal in the meantime, no
                // checkpoint is left to consume the request; take it
                // back.
                match self.store.get(process_id).await? {
                    Some(row) if row.is_terminal() => {
                        self.cancels.consume(process_id).await;
                    }
                    _ => {}
                }
            }
        } else {
            // Still `Requested`: terminalize now; the dequeue-side
            // predispatch check will drop the stale item.
            self.store.cancel(process_id).await?;
            tracing::info!(process_id, "Cancelled process before dispatch");
        }

        Ok(())
    }

    /// Whether a cancel request is pending for `process_id`.
    pub async fn has_cancel_request(&self, process_id: DbId) -> bool {
        self.cancels.has_request(process_id).await
    }

    /// Remove a pending cancel request, reporting whether one existed.
    pub async fn consume_cancel_request(&self, process_id: DbId) -> bool {
        self.cancels.consume(process_id).await
    }
}
