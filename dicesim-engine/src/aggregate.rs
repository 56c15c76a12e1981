//! Trial aggregation into frequency tables.
//!
//! Sequential runs draw from an injected random source. Parallel runs split
//! the trial count into per-worker shares, give each worker its own stream
//! derived from the run seed, and merge the partial tables by summation, so
//! the result depends only on the seed and the worker count.
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::numbers::split_evenly;
use crate::pool::PoolSnapshot;
use crate::rng::{CountingRng, worker_stream_seed};
use crate::roll::trial;
use crate::simulator::SimulationError;

/// Occurrence count per outcome scalar, in ascending outcome order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrequencyTable {
    counts: BTreeMap<u64, u64>,
}

impl FrequencyTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: u64) {
        *self.counts.entry(outcome).or_insert(0) += 1;
    }

    /// Add every count of `other` into this table.
    pub fn merge(&mut self, other: &Self) {
        for (outcome, count) in &other.counts {
            *self.counts.entry(*outcome).or_insert(0) += count;
        }
    }

    #[must_use]
    pub fn get(&self, outcome: u64) -> u64 {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    /// Sum of all counts; equals the number of trials that produced the table.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    #[must_use]
    pub fn max_count(&self) -> Option<u64> {
        self.counts.values().copied().max()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.counts.iter().map(|(outcome, count)| (*outcome, *count))
    }
}

impl FromIterator<(u64, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (u64, u64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (outcome, count) in iter {
            *table.counts.entry(outcome).or_insert(0) += count;
        }
        table
    }
}

/// Frequency table plus the number of random draws it consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRun {
    pub table: FrequencyTable,
    pub draws: u64,
}

/// Cooperative cancellation flag shared with in-flight parallel runs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Shape of a parallel run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelPlan {
    pub seed: u64,
    pub workers: usize,
    pub batch_size: u64,
}

/// Run `num_trials` independent trials drawing from `rng`.
pub fn run<R: Rng + ?Sized>(snapshot: &PoolSnapshot, num_trials: u64, rng: &mut R) -> FrequencyTable {
    let mut table = FrequencyTable::new();
    for _ in 0..num_trials {
        table.record(trial(snapshot, rng));
    }
    table
}

/// Sequential run with a stream seeded from `seed`.
#[must_use]
pub fn run_seeded(snapshot: &PoolSnapshot, num_trials: u64, seed: u64) -> AggregateRun {
    let mut rng = CountingRng::seeded(seed);
    let table = run(snapshot, num_trials, &mut rng);
    AggregateRun {
        table,
        draws: rng.draws(),
    }
}

/// Sequential run with a freshly entropy-seeded stream.
#[must_use]
pub fn run_with_entropy(snapshot: &PoolSnapshot, num_trials: u64) -> AggregateRun {
    let mut rng = CountingRng::from_entropy();
    let table = run(snapshot, num_trials, &mut rng);
    AggregateRun {
        table,
        draws: rng.draws(),
    }
}

/// Run trials across `plan.workers` derived streams on the rayon pool.
///
/// # Errors
///
/// Returns [`SimulationError::Cancelled`] if `cancel` is raised before every
/// worker finished its share.
pub fn run_parallel(
    snapshot: &PoolSnapshot,
    num_trials: u64,
    plan: ParallelPlan,
    cancel: &CancelToken,
) -> Result<AggregateRun, SimulationError> {
    let batch_size = plan.batch_size.max(1);
    // Never more workers than trials.
    let max_workers = usize::try_from(num_trials).unwrap_or(usize::MAX).max(1);
    let shares = split_evenly(num_trials, plan.workers.clamp(1, max_workers));
    log::debug!(
        "parallel run: {num_trials} trials across {} workers",
        shares.len()
    );

    let partials: Vec<Option<AggregateRun>> = shares
        .into_par_iter()
        .enumerate()
        .map(|(index, share)| {
            let mut rng = CountingRng::seeded(worker_stream_seed(plan.seed, index));
            let mut table = FrequencyTable::new();
            let mut remaining = share;
            while remaining > 0 {
                if cancel.is_cancelled() {
                    log::trace!("worker {index} stopping with {remaining} trials left");
                    return None;
                }
                let batch = remaining.min(batch_size);
                for _ in 0..batch {
                    table.record(trial(snapshot, &mut rng));
                }
                remaining -= batch;
            }
            Some(AggregateRun {
                table,
                draws: rng.draws(),
            })
        })
        .collect();

    let mut merged = AggregateRun {
        table: FrequencyTable::new(),
        draws: 0,
    };
    for partial in partials {
        let partial = partial.ok_or(SimulationError::Cancelled)?;
        merged.table.merge(&partial.table);
        merged.draws = merged.draws.saturating_add(partial.draws);
    }
    Ok(merged)
}
