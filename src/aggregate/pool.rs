// src/aggregate/pool.rs
//! Bounded work queue and a fixed-size pool of long-lived fetch workers.
//!
//! The pool is built per request. A feeder task is the single producer: it
//! enqueues validated sources in list order and drops its sender when done,
//! which is the only way the queue closes. Workers share the receiving end and
//! exit once the queue is closed and drained, or as soon as the token fires.
//! Outcomes travel back over two mpsc channels and nothing points back at the pool.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::fetch::{fetch_source, FetchOutcome};
use super::types::{SourceFailure, SourceResult, SourceTransport};

/// Multi-consumer side of the work queue.
#[derive(Clone)]
pub struct WorkQueue {
    rx: Arc<Mutex<mpsc::Receiver<Url>>>,
}

impl WorkQueue {
    /// Next source, or `None` once the producer has closed the queue and it is empty.
    pub async fn next(&self) -> Option<Url> {
        self.rx.lock().await.recv().await
    }
}

/// Create a bounded queue. Dropping the returned sender closes it.
pub fn work_queue(capacity: usize) -> (mpsc::Sender<Url>, WorkQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        tx,
        WorkQueue {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Where workers report terminal outcomes.
#[derive(Clone)]
pub struct WorkerOutputs {
    pub results: mpsc::Sender<SourceResult>,
    pub failures: mpsc::Sender<SourceFailure>,
}

/// Receiving halves handed to the collector.
pub struct OutcomeReceivers {
    pub results: mpsc::Receiver<SourceResult>,
    pub failures: mpsc::Receiver<SourceFailure>,
}

/// Output channels with room for one in-flight outcome per worker, so a
/// worker is not stalled while the collector is busy absorbing a big result.
pub fn outcome_channels(workers: usize) -> (WorkerOutputs, OutcomeReceivers) {
    let cap = workers.max(1);
    let (results_tx, results_rx) = mpsc::channel(cap);
    let (failures_tx, failures_rx) = mpsc::channel(cap);
    (
        WorkerOutputs {
            results: results_tx,
            failures: failures_tx,
        },
        OutcomeReceivers {
            results: results_rx,
            failures: failures_rx,
        },
    )
}

/// Running pool. Dropping it aborts any task still alive.
pub struct WorkerPool {
    _tasks: JoinSet<()>,
}

impl WorkerPool {
    /// Spawn `size` workers plus the feeder for `sources`.
    pub fn start(
        size: usize,
        sources: Vec<Url>,
        transport: Arc<dyn SourceTransport>,
        outputs: WorkerOutputs,
        token: CancellationToken,
    ) -> Self {
        let size = size.max(1);
        let (queue_tx, queue) = work_queue(size);
        let mut tasks = JoinSet::new();

        for id in 0..size {
            tasks.spawn(run_worker(
                id,
                queue.clone(),
                Arc::clone(&transport),
                outputs.clone(),
                token.clone(),
            ));
        }
        // Workers hold the only output senders from here on.
        drop(outputs);

        tasks.spawn(feed(sources, queue_tx, token));

        Self { _tasks: tasks }
    }
}

async fn feed(sources: Vec<Url>, queue: mpsc::Sender<Url>, token: CancellationToken) {
    for source in sources {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            sent = queue.send(source) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

async fn run_worker(
    id: usize,
    queue: WorkQueue,
    transport: Arc<dyn SourceTransport>,
    outputs: WorkerOutputs,
    token: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            next = queue.next() => next,
        };
        let Some(source) = next else { break };

        let delivered = match fetch_source(transport.as_ref(), source, &token).await {
            FetchOutcome::Fetched(result) => report(&outputs.results, result, &token).await,
            FetchOutcome::Failed(failure) => report(&outputs.failures, failure, &token).await,
            FetchOutcome::Cancelled => false,
        };
        if !delivered {
            break;
        }
    }
    tracing::trace!(target: "aggregate", worker = id, "worker exited");
}

/// Send unless the token fires first. `false` means stop working.
async fn report<T>(tx: &mpsc::Sender<T>, item: T, token: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}
