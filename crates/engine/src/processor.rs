//! The pluggable strategy seam: one [`Processor`] per (family, resource
//! kind) pair does the actual scan / migration / prerequisite / monitoring
//! work against the remote host.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use stevedore_core::codes::{InventoryKind, ProcessResultCode, ProcessType};
use stevedore_core::item::QueueItem;

/// Errors a processor strategy may surface.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// The strategy observed its cancellation token and stopped.
    /// Mapped to the `Cancelled` terminal state, never reported as a
    /// failure.
    #[error("process cancelled")]
    Cancelled,

    /// Any other failure. The message is persisted verbatim on the
    /// process row.
    #[error("{0}")]
    Failed(String),
}

/// The terminal result a strategy achieved, with an optional payload.
///
/// Constructors restrict the state to `Completed`, `PartialCompleted`,
/// or `NotSupported` — a strategy signals cancellation through
/// [`ProcessorError::Cancelled`], never by returning `Cancelled`.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    state: ProcessResultCode,
    result: Option<serde_json::Value>,
    message: Option<String>,
}

impl ProcessOutcome {
    pub fn completed(result: serde_json::Value) -> Self {
        Self {
            state: ProcessResultCode::Completed,
            result: Some(result),
            message: None,
        }
    }

    pub fn partial_completed(result: serde_json::Value, message: impl Into<String>) -> Self {
        Self {
            state: ProcessResultCode::PartialCompleted,
            result: Some(result),
            message: Some(message.into()),
        }
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self {
            state: ProcessResultCode::NotSupported,
            result: None,
            message: Some(message.into()),
        }
    }

    pub fn state(&self) -> ProcessResultCode {
        self.state
    }

    /// Destructure into `(state, result, message)` for persistence.
    pub fn into_parts(self) -> (ProcessResultCode, Option<serde_json::Value>, Option<String>) {
        (self.state, self.result, self.message)
    }
}

/// One inventory type/vendor's implementation of the actual work.
///
/// Implementations must be re-entrant-safe per process and should watch
/// `cancel` at their natural suspension points (between remote calls),
/// returning [`ProcessorError::Cancelled`] once it fires. A strategy that
/// never checks the token and never returns cannot be stopped by the
/// engine alone.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn execute(
        &self,
        item: &QueueItem,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutcome, ProcessorError>;
}

/// Startup-built map from `(family, resource kind)` to a processor.
///
/// Immutable after construction; share it as an `Arc`. A missing key is
/// a defined failure path (the process ends `Failed` with a "no handler"
/// message), never a panic in the worker.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<(ProcessType, InventoryKind), Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `processor` for one `(family, kind)` pair, replacing any
    /// previous registration.
    pub fn register(
        &mut self,
        family: ProcessType,
        kind: InventoryKind,
        processor: Arc<dyn Processor>,
    ) -> &mut Self {
        self.processors.insert((family, kind), processor);
        self
    }

    pub fn get(&self, family: ProcessType, kind: InventoryKind) -> Option<Arc<dyn Processor>> {
        self.processors.get(&(family, kind)).cloned()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}
