//! Engine assembly and lifecycle.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use stevedore_core::cancel::{CancelRegistry, InterruptRegistry};
use stevedore_core::codes::ProcessType;
use stevedore_db::store::ProcessStore;

use crate::cancel::CancelService;
use crate::config::EngineConfig;
use crate::dispatch::{spawn_pool, WorkerContext};
use crate::error::EngineError;
use crate::processor::ProcessorRegistry;
use crate::queue::JobQueues;
use crate::submit::SubmissionGate;

/// Message written onto rows orphaned in `Running` by a restart.
const RESTART_RECONCILE_MESSAGE: &str = "process interrupted by server restart";

const FAMILIES: [ProcessType; 4] = [
    ProcessType::Scan,
    ProcessType::Migration,
    ProcessType::Prerequisite,
    ProcessType::Monitoring,
];

/// The assembled execution engine.
///
/// Created once at process start; the registries it owns are the
/// process-wide cancellation state. Call [`Engine::start`] to reconcile
/// persisted state and launch the worker pools, [`Engine::shutdown`] to
/// stop the workers.
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn ProcessStore>,
    queues: Arc<JobQueues>,
    gate: Arc<SubmissionGate>,
    cancel_service: Arc<CancelService>,
    cancels: Arc<CancelRegistry>,
    interrupts: Arc<InterruptRegistry>,
    processors: Arc<ProcessorRegistry>,
    shutdown: CancellationToken,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn ProcessStore>,
        processors: ProcessorRegistry,
    ) -> Self {
        let queues = Arc::new(JobQueues::new());
        let cancels = Arc::new(CancelRegistry::new());
        let interrupts = Arc::new(InterruptRegistry::new());
        let gate = Arc::new(SubmissionGate::new(Arc::clone(&store), Arc::clone(&queues)));
        let cancel_service = Arc::new(CancelService::new(
            Arc::clone(&store),
            Arc::clone(&cancels),
            Arc::clone(&interrupts),
        ));

        Self {
            config,
            store,
            queues,
            gate,
            cancel_service,
            cancels,
            interrupts,
            processors: Arc::new(processors),
            shutdown: CancellationToken::new(),
        }
    }

    /// The submission gate; the only way work enters the engine.
    pub fn gate(&self) -> Arc<SubmissionGate> {
        Arc::clone(&self.gate)
    }

    /// The cancellation control surface.
    pub fn cancel_service(&self) -> Arc<CancelService> {
        Arc::clone(&self.cancel_service)
    }

    /// Reconcile persisted state and launch the worker pools.
    ///
    /// Recovery runs before any worker starts:
    ///
    /// 1. Rows orphaned in `Running` by a crash are flipped to `Failed` —
    ///    their workers are gone and they could never finish otherwise.
    /// 2. Rows still in `Requested` are re-enqueued, rebuilding the
    ///    in-memory queue items lost with the previous process.
    pub async fn start(&self) -> Result<Vec<JoinHandle<()>>, EngineError> {
        let reconciled = self
            .store
            .reconcile_running_to_failed(RESTART_RECONCILE_MESSAGE)
            .await?;
        if reconciled > 0 {
            tracing::warn!(count = reconciled, "Failed processes orphaned in Running");
        }

        let mut handles = Vec::new();
        for family in FAMILIES {
            let pool = self.config.pool(family);
            if !pool.enabled {
                tracing::info!(family = %family, "Family disabled; queue not drained");
                continue;
            }

            let requeued = self.requeue_requested(family).await?;
            if requeued > 0 {
                tracing::info!(family = %family, count = requeued, "Re-enqueued pending processes");
            }

            handles.extend(spawn_pool(
                family,
                pool.workers,
                self.queues.receiver(family),
                WorkerContext {
                    store: Arc::clone(&self.store),
                    processors: Arc::clone(&self.processors),
                    cancels: Arc::clone(&self.cancels),
                    interrupts: Arc::clone(&self.interrupts),
                },
                self.shutdown.clone(),
            ));
            tracing::info!(family = %family, workers = pool.workers, "Worker pool started");
        }

        Ok(handles)
    }

    /// Signal every worker to stop once its current item completes.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn requeue_requested(&self, family: ProcessType) -> Result<usize, EngineError> {
        let rows = self.store.list_requested(family).await?;
        let mut count = 0;
        for row in rows {
            match row.queue_item() {
                Some(item) => {
                    self.queues.enqueue(item)?;
                    count += 1;
                }
                None => {
                    tracing::error!(
                        process_id = row.id,
                        process_type = row.process_type,
                        inventory_kind = row.inventory_kind,
                        "Skipping requeue of row with unknown codes",
                    );
                }
            }
        }
        Ok(count)
    }
}
