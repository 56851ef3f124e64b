// src/aggregate/collector.rs
//! Single consumer of worker outcomes: incremental dedup, cutoff, one final sort.

use std::collections::HashSet;

use metrics::counter;
use tokio_util::sync::CancellationToken;

use super::pool::OutcomeReceivers;
use super::types::SourceResult;

/// Distinct values seen so far. Only the collector writes to it, and the
/// membership set and the output vector are always updated together.
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    seen: HashSet<i64>,
    values: Vec<i64>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one result, dropping values already present. Returns how many
    /// new distinct values were added.
    pub fn absorb(&mut self, numbers: &[i64]) -> usize {
        let before = self.values.len();
        for &n in numbers {
            if self.seen.insert(n) {
                self.values.push(n);
            }
        }
        self.values.len() - before
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sort once and hand the values out. Consuming `self` rules out any
    /// further mutation after collection stops.
    pub fn finalize(self) -> Vec<i64> {
        let mut values = self.values;
        values.sort_unstable();
        values
    }
}

/// How collection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every validated source produced a terminal outcome.
    AllSettled,
    /// The deadline token fired first.
    Deadline,
    /// All workers exited without settling every source.
    Drained,
}

#[derive(Debug)]
pub struct Collected {
    pub accumulator: ResultAccumulator,
    pub succeeded: usize,
    pub failed: usize,
    pub stop: StopReason,
}

/// Drain outcomes until `expected` sources settled or `token` fires.
pub async fn collect(
    expected: usize,
    mut rx: OutcomeReceivers,
    token: &CancellationToken,
) -> Collected {
    let mut acc = ResultAccumulator::new();
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let mut results_open = true;
    let mut failures_open = true;

    let stop = loop {
        if succeeded + failed >= expected {
            break StopReason::AllSettled;
        }
        if !results_open && !failures_open {
            break StopReason::Drained;
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => break StopReason::Deadline,
            received = rx.results.recv(), if results_open => match received {
                Some(result) => {
                    absorb_result(&mut acc, &result);
                    succeeded += 1;
                }
                None => results_open = false,
            },
            received = rx.failures.recv(), if failures_open => match received {
                Some(failure) => {
                    tracing::warn!(
                        target: "aggregate",
                        source = %failure.source,
                        reason = %failure.reason,
                        kind = failure.reason.kind(),
                        "source failed"
                    );
                    counter!("numbers_source_failures_total", "reason" => failure.reason.kind())
                        .increment(1);
                    failed += 1;
                }
                None => failures_open = false,
            },
        }
    };

    match stop {
        StopReason::Deadline => tracing::info!(
            target: "aggregate",
            settled = succeeded + failed,
            expected,
            distinct = acc.len(),
            "stopped collecting at deadline"
        ),
        StopReason::Drained => tracing::warn!(
            target: "aggregate",
            settled = succeeded + failed,
            expected,
            "workers exited before every source settled"
        ),
        StopReason::AllSettled => {}
    }

    Collected {
        accumulator: acc,
        succeeded,
        failed,
        stop,
    }
}

fn absorb_result(acc: &mut ResultAccumulator, result: &SourceResult) {
    let added = acc.absorb(&result.numbers);
    counter!("numbers_source_successes_total").increment(1);
    tracing::debug!(
        target: "aggregate",
        source = %result.source,
        received = result.numbers.len(),
        added,
        "source answered"
    );
}
