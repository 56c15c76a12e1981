//! Tail pruning and percentage conversion.
use serde::Serialize;
use std::collections::BTreeMap;

use crate::aggregate::FrequencyTable;
use crate::numbers::{round_to, u64_to_f64};
use crate::simulator::SimulationError;

/// Sanitized outcome table: outcome → percentage of all trials.
///
/// Percentages are relative to the full trial count, so the retained mass
/// may sum to less than 100 when tail outcomes were pruned.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Distribution {
    percentages: BTreeMap<u64, f64>,
    pruned: usize,
}

impl Distribution {
    #[must_use]
    pub fn get(&self, outcome: u64) -> Option<f64> {
        self.percentages.get(&outcome).copied()
    }

    /// Outcomes and percentages in ascending outcome order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.percentages
            .iter()
            .map(|(outcome, percent)| (*outcome, *percent))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.percentages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.percentages.is_empty()
    }

    /// Number of outcomes removed by the cutoff.
    #[must_use]
    pub const fn pruned(&self) -> usize {
        self.pruned
    }

    #[must_use]
    pub fn total_percent(&self) -> f64 {
        self.percentages.values().sum()
    }

    #[must_use]
    pub fn min_outcome(&self) -> Option<u64> {
        self.percentages.keys().next().copied()
    }

    #[must_use]
    pub fn max_outcome(&self) -> Option<u64> {
        self.percentages.keys().next_back().copied()
    }
}

impl FromIterator<(u64, f64)> for Distribution {
    fn from_iter<I: IntoIterator<Item = (u64, f64)>>(iter: I) -> Self {
        Self {
            percentages: iter.into_iter().collect(),
            pruned: 0,
        }
    }
}

/// Prune rare outcomes and convert the remaining counts to percentages.
///
/// The cutoff is `max_count / cutoff_sensitivity`; counts strictly below it
/// are removed while counts equal to it are kept. Pruning happens on raw
/// counts before any rounding.
///
/// # Errors
///
/// Returns [`SimulationError::NoData`] for an empty table and
/// [`SimulationError::ZeroTrials`] when `num_trials` is zero.
pub fn sanitize(
    table: &FrequencyTable,
    num_trials: u64,
    cutoff_sensitivity: f64,
    precision: u32,
) -> Result<Distribution, SimulationError> {
    let max_count = table.max_count().ok_or(SimulationError::NoData)?;
    if num_trials == 0 {
        return Err(SimulationError::ZeroTrials);
    }

    let cutoff = u64_to_f64(max_count) / cutoff_sensitivity;
    let trials = u64_to_f64(num_trials);
    let mut pruned = 0;
    let mut percentages = BTreeMap::new();
    for (outcome, count) in table.iter() {
        let count = u64_to_f64(count);
        if count < cutoff {
            pruned += 1;
            continue;
        }
        percentages.insert(outcome, round_to(count / trials * 100.0, precision));
    }

    log::debug!(
        "sanitized {} outcomes, pruned {pruned} below cutoff {cutoff:.3}",
        percentages.len()
    );
    Ok(Distribution {
        percentages,
        pruned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prunes_below_cutoff_and_keeps_ties() {
        // max 240 with sensitivity 120 puts the cutoff at exactly 2.
        let table: FrequencyTable = [(1, 1), (2, 2), (3, 240), (4, 57)].into_iter().collect();
        let dist = sanitize(&table, 300, 120.0, 6).unwrap();
        assert_eq!(dist.get(1), None);
        assert_eq!(dist.pruned(), 1);
        assert!((dist.get(2).unwrap() - 0.666_667).abs() < 1e-9);
        assert!((dist.get(3).unwrap() - 80.0).abs() < 1e-9);
        assert!((dist.get(4).unwrap() - 19.0).abs() < 1e-9);
    }

    #[test]
    fn retained_mass_never_exceeds_one_hundred() {
        let table: FrequencyTable = (1..=40).map(|outcome| (outcome, outcome * 3)).collect();
        let trials = table.total();
        let dist = sanitize(&table, trials, 10.0, 6).unwrap();
        assert!(dist.total_percent() <= 100.0 + 1e-9);
        let max = table.max_count().unwrap();
        for (outcome, _) in dist.iter() {
            assert!(u64_to_f64(table.get(outcome)) >= u64_to_f64(max) / 10.0);
        }
        assert_eq!(dist.min_outcome(), Some(4));
        assert_eq!(dist.max_outcome(), Some(40));
    }

    #[test]
    fn empty_table_is_rejected_as_no_data() {
        let result = sanitize(&FrequencyTable::new(), 10, 120.0, 6);
        assert!(matches!(result, Err(SimulationError::NoData)));
    }

    #[test]
    fn zero_trials_are_rejected() {
        let table: FrequencyTable = [(3, 1)].into_iter().collect();
        assert!(matches!(
            sanitize(&table, 0, 120.0, 6),
            Err(SimulationError::ZeroTrials)
        ));
    }
}
