//! Summary statistics over a sanitized distribution.
//!
//! Mean and standard deviation weight each retained outcome by its share of
//! all trials, so pruned tail mass is simply absent rather than redistributed.
use serde::Serialize;
use smallvec::SmallVec;

use crate::numbers::{round_to, u64_to_f64};
use crate::sanitize::Distribution;
use crate::simulator::SimulationError;

/// Outcome values at which cumulative probability first exceeds each step.
pub type QuartileMarkers = SmallVec<[u64; 3]>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub mean: f64,
    pub std_dev: f64,
    pub quartiles: QuartileMarkers,
}

/// Weighted mean `Σ x·p`, rounded to `precision` places.
#[must_use]
pub fn mean(dist: &Distribution, precision: u32) -> f64 {
    let weighted: f64 = dist
        .iter()
        .map(|(outcome, percent)| u64_to_f64(outcome) * percent / 100.0)
        .sum();
    round_to(weighted, precision)
}

/// Standard deviation via `Σ x²·p − mean²`, rounded to `precision` places.
///
/// A slightly negative variance caused by rounding `mean` is treated as zero.
#[must_use]
pub fn std_dev(dist: &Distribution, mean: f64, precision: u32) -> f64 {
    let weighted_sq: f64 = dist
        .iter()
        .map(|(outcome, percent)| {
            let x = u64_to_f64(outcome);
            x * x * percent / 100.0
        })
        .sum();
    let variance = (weighted_sq - mean * mean).max(0.0);
    round_to(variance.sqrt(), precision)
}

/// Quartile markers for thresholds `step, 2·step, …` below 100.
///
/// Outcomes are visited in ascending order while accumulating percentage
/// mass. Each visited outcome can satisfy at most one threshold: when its
/// cumulative mass is strictly greater than the current threshold it is
/// recorded and the threshold advances. Heavy outcomes or pruned tails may
/// therefore leave fewer markers than thresholds.
#[must_use]
pub fn quartiles(dist: &Distribution, step: f64, precision: u32) -> QuartileMarkers {
    let mut markers = QuartileMarkers::new();
    let mut threshold = step;
    let mut cumulative = 0.0;
    for (outcome, percent) in dist.iter() {
        if threshold >= 100.0 {
            break;
        }
        cumulative = round_to(cumulative + percent, precision);
        if cumulative > threshold {
            markers.push(outcome);
            threshold += step;
        }
    }
    markers
}

/// Mean, standard deviation and quartile markers of `dist`.
///
/// # Errors
///
/// Returns [`SimulationError::NoData`] if the distribution is empty.
pub fn compute(
    dist: &Distribution,
    quartile_step: f64,
    precision: u32,
) -> Result<Statistics, SimulationError> {
    if dist.is_empty() {
        return Err(SimulationError::NoData);
    }
    let mean = mean(dist, precision);
    Ok(Statistics {
        mean,
        std_dev: std_dev(dist, mean, precision),
        quartiles: quartiles(dist, quartile_step, precision),
    })
}
