//! Owned simulation context tying the pipeline together.
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::aggregate::{self, AggregateRun, CancelToken, FrequencyTable, ParallelPlan};
use crate::config::{EngineConfig, EngineConfigError};
use crate::moe::{ConfidenceLevel, format_margin, margin_of_error};
use crate::pool::{DicePool, PoolSnapshot};
use crate::rng::CountingRng;
use crate::sanitize::{Distribution, sanitize};
use crate::stats::{self, Statistics};

/// Errors raised when a simulation cannot run or produce results.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("no dice in pool; simulation aborted")]
    EmptyPool,
    #[error("non-positive number of trials; simulation aborted")]
    ZeroTrials,
    #[error("no outcomes to summarize")]
    NoData,
    #[error("simulation cancelled before all trials completed")]
    Cancelled,
    #[error(transparent)]
    Config(#[from] EngineConfigError),
}

/// How a run sources randomness and splits work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Fixed seed for reproducible runs; `None` reseeds from entropy.
    pub seed: Option<u64>,
    /// Worker streams; values above one run on the rayon pool.
    pub workers: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            seed: None,
            workers: 1,
        }
    }
}

impl RunOptions {
    #[must_use]
    pub const fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            workers: 1,
        }
    }

    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Everything the reporting layer reads from one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub title: String,
    pub description: String,
    pub num_trials: u64,
    pub confidence_level: ConfidenceLevel,
    pub margin_of_error: f64,
    pub margin_label: String,
    pub counts: FrequencyTable,
    pub distribution: Distribution,
    pub statistics: Statistics,
    /// Percentage spacing of the quartile thresholds behind `statistics`.
    pub quartile_step: f64,
    pub draws: u64,
    pub seed: Option<u64>,
}

/// Dice pool, engine configuration and the most recent report.
#[derive(Debug, Clone)]
pub struct Simulator {
    pool: DicePool,
    config: EngineConfig,
    last_report: Option<SimulationReport>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self {
            pool: DicePool::new(),
            config: EngineConfig::default(),
            last_report: None,
        }
    }
}

impl Simulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn with_config(config: EngineConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    #[must_use]
    pub const fn pool(&self) -> &DicePool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut DicePool {
        &mut self.pool
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn last_report(&self) -> Option<&SimulationReport> {
        self.last_report.as_ref()
    }

    /// Margin of error for the pool's current trial count and confidence level.
    #[must_use]
    pub fn margin_of_error(&self) -> f64 {
        margin_of_error(self.pool.num_trials(), self.pool.confidence_level())
    }

    /// # Errors
    ///
    /// Returns an error if the pool is empty or has no trials configured.
    pub fn ensure_runnable(&self) -> Result<(), SimulationError> {
        check_runnable(&self.pool.snapshot())
    }

    /// Run the full pipeline on a snapshot of the current pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is not runnable or a parallel run is
    /// cancelled.
    pub fn run(
        &mut self,
        options: RunOptions,
        cancel: &CancelToken,
    ) -> Result<&SimulationReport, SimulationError> {
        let snapshot = self.pool.snapshot();
        check_runnable(&snapshot)?;
        log::debug!("starting run: {}", snapshot.title());

        let num_trials = snapshot.num_trials();
        let (aggregate, seed) = if options.workers > 1 {
            let seed = options.seed.unwrap_or_else(rand::random);
            let plan = ParallelPlan {
                seed,
                workers: options.workers,
                batch_size: self.config.batch_size,
            };
            let run = aggregate::run_parallel(&snapshot, num_trials, plan, cancel)?;
            (run, Some(seed))
        } else if let Some(seed) = options.seed {
            (aggregate::run_seeded(&snapshot, num_trials, seed), Some(seed))
        } else {
            (aggregate::run_with_entropy(&snapshot, num_trials), None)
        };

        self.finish(&snapshot, aggregate, seed)
    }

    /// Run the pipeline drawing every trial from a caller-supplied source.
    ///
    /// `seed` is only recorded in the report, for sources the caller built
    /// from a known seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is not runnable.
    pub fn run_with_rng<R: Rng>(
        &mut self,
        rng: &mut R,
        seed: Option<u64>,
    ) -> Result<&SimulationReport, SimulationError> {
        let snapshot = self.pool.snapshot();
        check_runnable(&snapshot)?;
        let mut counted = CountingRng::wrap(rng);
        let table = aggregate::run(&snapshot, snapshot.num_trials(), &mut counted);
        let aggregate = AggregateRun {
            table,
            draws: counted.draws(),
        };
        self.finish(&snapshot, aggregate, seed)
    }

    fn finish(
        &mut self,
        snapshot: &PoolSnapshot,
        aggregate: AggregateRun,
        seed: Option<u64>,
    ) -> Result<&SimulationReport, SimulationError> {
        let report = build_report(snapshot, &self.config, aggregate, seed)?;
        log::debug!(
            "run finished: {} outcomes, mean {}, {} draws",
            report.distribution.len(),
            report.statistics.mean,
            report.draws
        );
        Ok(&*self.last_report.insert(report))
    }
}

fn check_runnable(snapshot: &PoolSnapshot) -> Result<(), SimulationError> {
    if snapshot.is_empty() {
        return Err(SimulationError::EmptyPool);
    }
    if snapshot.num_trials() == 0 {
        return Err(SimulationError::ZeroTrials);
    }
    Ok(())
}

/// Sanitize a finished aggregation and derive its statistics.
///
/// # Errors
///
/// Returns [`SimulationError::NoData`] if the table is empty.
pub fn build_report(
    snapshot: &PoolSnapshot,
    config: &EngineConfig,
    aggregate: AggregateRun,
    seed: Option<u64>,
) -> Result<SimulationReport, SimulationError> {
    let num_trials = snapshot.num_trials();
    let distribution = sanitize(
        &aggregate.table,
        num_trials,
        config.cutoff_sensitivity,
        config.rounding_precision,
    )?;
    let statistics = stats::compute(
        &distribution,
        config.quartile_step,
        config.rounding_precision,
    )?;
    let margin = margin_of_error(num_trials, snapshot.confidence_level());
    Ok(SimulationReport {
        title: snapshot.title(),
        description: snapshot.describe(),
        num_trials,
        confidence_level: snapshot.confidence_level(),
        margin_of_error: margin,
        margin_label: format_margin(margin),
        counts: aggregate.table,
        distribution,
        statistics,
        quartile_step: config.quartile_step,
        draws: aggregate.draws,
        seed,
    })
}
