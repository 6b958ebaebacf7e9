//! Typed in-memory job queues, one per process family.
//!
//! Each family owns an unbounded FIFO channel. Producers (the submission
//! gate and startup requeue) push through [`JobQueues::enqueue`];
//! dispatch workers share the receiving half behind a mutex, so a worker
//! blocks on `take` exactly like a blocking queue consumer, and every
//! item is delivered to exactly one worker.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use stevedore_core::codes::ProcessType;
use stevedore_core::item::QueueItem;

use crate::error::EngineError;

/// Shared receiving half of one family's queue.
pub type QueueReceiver = Arc<Mutex<UnboundedReceiver<QueueItem>>>;

const FAMILIES: [ProcessType; 4] = [
    ProcessType::Scan,
    ProcessType::Migration,
    ProcessType::Prerequisite,
    ProcessType::Monitoring,
];

/// The four family queues.
pub struct JobQueues {
    senders: HashMap<ProcessType, UnboundedSender<QueueItem>>,
    receivers: HashMap<ProcessType, QueueReceiver>,
}

impl JobQueues {
    pub fn new() -> Self {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for family in FAMILIES {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.insert(family, tx);
            receivers.insert(family, Arc::new(Mutex::new(rx)));
        }
        Self { senders, receivers }
    }

    /// Enqueue an item on its family's queue. Non-blocking.
    pub fn enqueue(&self, item: QueueItem) -> Result<(), EngineError> {
        let family = item.process_type;
        tracing::debug!(
            process_id = item.process_id,
            family = %family,
            "Enqueued queue item",
        );
        self.senders
            .get(&family)
            .expect("every family has a queue")
            .send(item)
            .map_err(|_| EngineError::QueueClosed(family))
    }

    /// The shared receiver workers of `family` consume from.
    pub fn receiver(&self, family: ProcessType) -> QueueReceiver {
        Arc::clone(
            self.receivers
                .get(&family)
                .expect("every family has a queue"),
        )
    }
}

impl Default for JobQueues {
    fn default() -> Self {
        Self::new()
    }
}
