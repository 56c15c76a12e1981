//! Single-trial roll generation: sampling, rerolls, drops and reduction.
use rand::Rng;
use smallvec::SmallVec;

use crate::pool::{DropMode, PoolSnapshot, RollMode};

/// Per-die results of one trial, in pool order.
pub type TrialOutcome = SmallVec<[u32; 16]>;

/// Draw one die of `face` sides, redrawing any value at or below `reroll_threshold`.
///
/// The caller guarantees `reroll_threshold < face`; otherwise this never returns.
pub fn sample_die<R: Rng + ?Sized>(face: u32, reroll_threshold: u32, rng: &mut R) -> u32 {
    loop {
        let value = rng.gen_range(1..=face);
        if value > reroll_threshold {
            return value;
        }
    }
}

/// Roll every die in the pool, before any drop is applied.
pub fn roll_raw<R: Rng + ?Sized>(snapshot: &PoolSnapshot, rng: &mut R) -> TrialOutcome {
    let reroll_threshold = snapshot.reroll_threshold();
    let mut values = TrialOutcome::new();
    for group in snapshot.dice() {
        for _ in 0..group.count {
            values.push(sample_die(group.face, reroll_threshold, rng));
        }
    }
    values
}

/// Remove `drop_count` of the lowest or highest values.
///
/// Extremes are removed one at a time so the survivors keep their relative
/// order. Ties are broken towards the earliest position.
#[must_use]
pub fn apply_drop(mut values: TrialOutcome, drop_mode: DropMode, drop_count: u32) -> TrialOutcome {
    let drops = usize::try_from(drop_count).unwrap_or(usize::MAX);
    for _ in 0..drops {
        let extreme = match drop_mode {
            DropMode::None => return values,
            DropMode::DropLowest => values
                .iter()
                .enumerate()
                .min_by_key(|(_, value)| **value)
                .map(|(idx, _)| idx),
            // `max_by_key` keeps the last maximum; reverse to keep the first.
            DropMode::DropHighest => values
                .iter()
                .enumerate()
                .rev()
                .max_by_key(|(_, value)| **value)
                .map(|(idx, _)| idx),
        };
        let Some(idx) = extreme else {
            break;
        };
        values.remove(idx);
    }
    values
}

/// Roll the pool once and apply the configured drop.
pub fn roll_once<R: Rng + ?Sized>(snapshot: &PoolSnapshot, rng: &mut R) -> TrialOutcome {
    apply_drop(
        roll_raw(snapshot, rng),
        snapshot.drop_mode(),
        snapshot.drop_count(),
    )
}

/// Reduce surviving dice to the outcome scalar.
#[must_use]
pub fn reduce(values: &[u32], mode: RollMode, success_threshold: u32) -> u64 {
    match mode {
        RollMode::Sum => values.iter().map(|value| u64::from(*value)).sum(),
        RollMode::Successes => values
            .iter()
            .filter(|value| **value >= success_threshold)
            .fold(0, |acc, _| acc + 1),
    }
}

/// One full trial: roll, drop and reduce.
pub fn trial<R: Rng + ?Sized>(snapshot: &PoolSnapshot, rng: &mut R) -> u64 {
    let values = roll_once(snapshot, rng);
    reduce(&values, snapshot.mode(), snapshot.success_threshold())
}
