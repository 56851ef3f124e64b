// src/aggregate/mod.rs
//! Deadline-bounded fan-out/fan-in over remote integer sources.
//!
//! ```text
//! sources ─► validate ─► WorkerPool (W workers, bounded queue) ─► collect ─► sort once
//!                             ▲                                      ▲
//!                             └──────────── Deadline token ──────────┘
//! ```

pub mod collector;
pub mod deadline;
pub mod fetch;
pub mod pool;
pub mod types;
pub mod validate;

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use self::collector::{collect, StopReason};
use self::deadline::{Deadline, Expiry};
use self::pool::{outcome_channels, WorkerPool};
use self::types::SourceTransport;

pub use self::collector::ResultAccumulator;
pub use self::fetch::HttpTransport;
pub use self::types::{FetchError, NumbersPayload, SourceFailure, SourceResult};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    use metrics::{describe_counter, describe_histogram};
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("numbers_requests_total", "Aggregation requests handled.");
        describe_counter!(
            "numbers_sources_rejected_total",
            "Source references dropped by validation."
        );
        describe_counter!(
            "numbers_source_successes_total",
            "Sources that answered with a decodable payload."
        );
        describe_counter!(
            "numbers_source_failures_total",
            "Sources that failed, labelled by reason."
        );
        describe_counter!(
            "numbers_deadline_exceeded_total",
            "Requests cut off by the deadline."
        );
        describe_histogram!("numbers_aggregate_ms", "Aggregation wall time in milliseconds.");
    });
}

/// Fixed process-wide knobs for the fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutSettings {
    pub deadline: Duration,
    pub workers: usize,
}

impl Default for FanOutSettings {
    fn default() -> Self {
        Self {
            deadline: Duration::from_millis(450),
            workers: 200,
        }
    }
}

/// Outcome of one aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// Distinct values, ascending.
    pub numbers: Vec<i64>,
    pub requested: usize,
    pub rejected: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub deadline_exceeded: bool,
    pub caller_gone: bool,
}

impl Aggregation {
    fn empty(requested: usize, rejected: usize) -> Self {
        Self {
            numbers: Vec::new(),
            requested,
            rejected,
            succeeded: 0,
            failed: 0,
            deadline_exceeded: false,
            caller_gone: false,
        }
    }

    /// Sources that were asked for but contributed nothing for a known reason.
    pub fn unusable_sources(&self) -> usize {
        self.rejected + self.failed
    }
}

/// Long-lived handle: the transport is shared read-only, while the pool,
/// queue, accumulator and deadline are built fresh for every call.
#[derive(Clone)]
pub struct NumbersService {
    transport: Arc<dyn SourceTransport>,
    settings: FanOutSettings,
}

impl NumbersService {
    pub fn new(transport: Arc<dyn SourceTransport>, settings: FanOutSettings) -> Self {
        ensure_metrics_described();
        Self {
            transport,
            settings,
        }
    }

    /// Fetch every valid source concurrently and merge what arrives before the
    /// deadline (derived from `caller`) into a sorted, duplicate-free list.
    pub async fn aggregate<S: AsRef<str>>(
        &self,
        sources: &[S],
        caller: &CancellationToken,
    ) -> Aggregation {
        counter!("numbers_requests_total").increment(1);
        if sources.is_empty() {
            return Aggregation::empty(0, 0);
        }

        let t0 = Instant::now();
        let deadline = Deadline::start(caller, self.settings.deadline);

        let (valid, rejected) = validate::partition_sources(sources);
        let expected = valid.len();
        if expected == 0 {
            return Aggregation::empty(sources.len(), rejected);
        }

        let (outputs, receivers) = outcome_channels(self.settings.workers);
        let pool = WorkerPool::start(
            self.settings.workers,
            valid,
            Arc::clone(&self.transport),
            outputs,
            deadline.token().clone(),
        );

        let collected = collect(expected, receivers, deadline.token()).await;
        let expiry = deadline.expiry();
        // Cancels stragglers and aborts the pool; nobody waits on them.
        drop(deadline);
        drop(pool);

        let deadline_exceeded = collected.stop == StopReason::Deadline;
        if deadline_exceeded {
            counter!("numbers_deadline_exceeded_total").increment(1);
        }
        let caller_gone = deadline_exceeded && expiry == Expiry::CallerGone;
        if caller_gone {
            tracing::debug!(target: "aggregate", "caller went away; result will be discarded");
        }

        let succeeded = collected.succeeded;
        let failed = collected.failed;
        let numbers = collected.accumulator.finalize();
        histogram!("numbers_aggregate_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        tracing::info!(
            target: "aggregate",
            requested = sources.len(),
            expected,
            succeeded,
            failed,
            distinct = numbers.len(),
            transport = self.transport.name(),
            deadline_exceeded,
            "aggregation finished"
        );

        Aggregation {
            numbers,
            requested: sources.len(),
            rejected,
            succeeded,
            failed,
            deadline_exceeded,
            caller_gone,
        }
    }
}
