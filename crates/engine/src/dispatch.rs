//! Dispatch worker pools and the five-step item pipeline.
//!
//! Each family runs a fixed-size pool of long-lived workers. A worker
//! blocks on its family queue, drives one item through the pipeline, and
//! loops. Nothing a processor strategy does can kill the loop: every
//! path through the pipeline ends in either a guarded terminal write or
//! a silent drop, and the worker moves on to the next item.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use stevedore_core::cancel::{CancelRegistry, InterruptRegistry};
use stevedore_core::codes::{ProcessResultCode, ProcessType};
use stevedore_core::item::QueueItem;
use stevedore_core::types::DbId;
use stevedore_db::store::ProcessStore;

use crate::error::EngineError;
use crate::processor::{ProcessOutcome, ProcessorError, ProcessorRegistry};
use crate::queue::QueueReceiver;

/// Everything a worker needs, shared across all pools.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub store: Arc<dyn ProcessStore>,
    pub processors: Arc<ProcessorRegistry>,
    pub cancels: Arc<CancelRegistry>,
    pub interrupts: Arc<InterruptRegistry>,
}

/// Spawn `size` workers for one family.
pub(crate) fn spawn_pool(
    family: ProcessType,
    size: usize,
    receiver: QueueReceiver,
    ctx: WorkerContext,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..size)
        .map(|worker_id| {
            let receiver = Arc::clone(&receiver);
            let ctx = ctx.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                worker_loop(family, worker_id, receiver, ctx, shutdown).await;
            })
        })
        .collect()
}

async fn worker_loop(
    family: ProcessType,
    worker_id: usize,
    receiver: QueueReceiver,
    ctx: WorkerContext,
    shutdown: CancellationToken,
) {
    tracing::info!(family = %family, worker_id, "Dispatch worker started");

    loop {
        // Holding the receiver lock while waiting gives blocking-take
        // semantics: idle workers queue up behind the mutex and each item
        // goes to exactly one of them.
        let item = {
            let mut rx = receiver.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => None,
                item = rx.recv() => item,
            }
        };

        let Some(item) = item else {
            break;
        };

        tracing::debug!(
            process_id = item.process_id,
            family = %family,
            worker_id,
            "Dequeued item",
        );

        if let Err(error) = process_item(&ctx, &item).await {
            tracing::error!(
                process_id = item.process_id,
                family = %family,
                error = %error,
                "Pipeline aborted by store error",
            );
        }
    }

    tracing::info!(family = %family, worker_id, "Dispatch worker stopped");
}

/// Drive one queue item through the five pipeline steps.
async fn process_item(ctx: &WorkerContext, item: &QueueItem) -> Result<(), EngineError> {
    let process_id = item.process_id;

    // Step 1: predispatch validation. The row may have been deleted or
    // cancelled between enqueue and dequeue; a stale item is dropped
    // without touching any state.
    let eligible = match ctx.store.get(process_id).await? {
        Some(row) if !row.deleted && row.state() == Some(ProcessResultCode::Requested) => true,
        Some(row) => {
            tracing::debug!(
                process_id,
                result_code = row.result_code,
                deleted = row.deleted,
                "Dropping stale queue item",
            );
            false
        }
        None => {
            tracing::debug!(process_id, "Dropping queue item for missing process");
            false
        }
    };
    if !eligible {
        // A cancel that already terminalized the row may have left its
        // request behind; clear it with the item.
        ctx.cancels.consume(process_id).await;
        return Ok(());
    }

    // Step 2: mark running. The guard loses to a concurrent cancel, in
    // which case the item is stale after all.
    if !ctx.store.mark_running(process_id).await? {
        tracing::debug!(process_id, "Process left Requested before dispatch; dropping");
        ctx.cancels.consume(process_id).await;
        return Ok(());
    }
    tracing::info!(
        process_id,
        inventory_id = item.inventory_id,
        inventory_name = %item.inventory_name,
        family = %item.process_type,
        "Process running",
    );

    // Step 3: cancellation checkpoint A. A request that arrived before
    // execution started short-circuits past the strategy entirely.
    if ctx.cancels.consume(process_id).await {
        finish(ctx, process_id, ProcessResultCode::Cancelled, None, None).await?;
        return Ok(());
    }

    // Step 4: execute the strategy, reachable by forceful interrupt for
    // the whole duration through the registered token.
    let executed = execute(ctx, item).await;

    // Step 5: cancellation checkpoint B and finalize. A cancel observed
    // now overrides whatever the strategy achieved.
    let cancelled_during_execution = ctx.cancels.consume(process_id).await;
    match executed {
        Ok(outcome) if !cancelled_during_execution => {
            let (state, result, message) = outcome.into_parts();
            finish(ctx, process_id, state, result, message).await?;
        }
        Ok(_) | Err(ProcessorError::Cancelled) => {
            finish(ctx, process_id, ProcessResultCode::Cancelled, None, None).await?;
        }
        Err(ProcessorError::Failed(message)) => {
            let state = if cancelled_during_execution {
                ProcessResultCode::Cancelled
            } else {
                ProcessResultCode::Failed
            };
            finish(ctx, process_id, state, None, Some(message)).await?;
        }
    }

    Ok(())
}

/// Step 4: strategy lookup and execution under an interrupt handle.
async fn execute(
    ctx: &WorkerContext,
    item: &QueueItem,
) -> Result<ProcessOutcome, ProcessorError> {
    let Some(processor) = ctx
        .processors
        .get(item.process_type, item.inventory_kind)
    else {
        tracing::error!(
            process_id = item.process_id,
            family = %item.process_type,
            kind = %item.inventory_kind,
            "No processor registered",
        );
        return Err(ProcessorError::Failed(format!(
            "no handler for {} {}",
            item.process_type, item.inventory_kind,
        )));
    };

    let key = item.execution_key();
    let token = ctx.interrupts.register(key.clone()).await;
    let result = processor.execute(item, &token).await;
    ctx.interrupts.remove(&key).await;

    // A forceful interrupt may have fired while the strategy was between
    // token checks; treat the token state as authoritative.
    if token.is_cancelled() && !matches!(result, Err(ProcessorError::Cancelled)) {
        return Err(ProcessorError::Cancelled);
    }
    result
}

/// Guarded terminal write; a `false` from the store means the forceful
/// cancel path got there first.
async fn finish(
    ctx: &WorkerContext,
    process_id: DbId,
    state: ProcessResultCode,
    result: Option<serde_json::Value>,
    message: Option<String>,
) -> Result<(), EngineError> {
    let wrote = ctx
        .store
        .finish(process_id, state, result, message)
        .await?;
    // A cancel request can land between checkpoint B and the write
    // above; the row is terminal now, so nothing else will ever consume
    // it.
    ctx.cancels.consume(process_id).await;
    if wrote {
        tracing::info!(process_id, state = ?state, "Process finished");
    } else {
        tracing::debug!(
            process_id,
            state = ?state,
            "Terminal state already written elsewhere; keeping it",
        );
    }
    Ok(())
}
