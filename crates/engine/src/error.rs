use stevedore_core::codes::{ProcessResultCode, ProcessType};
use stevedore_core::types::DbId;
use stevedore_db::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("process not found: {0}")]
    ProcessNotFound(DbId),

    #[error("invalid status for cancel: process {id} is already {state:?}")]
    InvalidCancelStatus { id: DbId, state: ProcessResultCode },

    #[error("queue for {0} is closed")]
    QueueClosed(ProcessType),

    #[error(transparent)]
    Store(#[from] StoreError),
}
