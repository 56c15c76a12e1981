//! Dice pool configuration.
//!
//! The pool is the single mutable source of truth for a simulation. Every
//! mutation leaves it in a runnable state: empty groups are pruned and the
//! thresholds that depend on the pool's contents are reconciled against it.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::constants::{DEFAULT_NUM_TRIALS, MIN_FACE_SIZE, MIN_SUCCESS_THRESHOLD};
use crate::moe::ConfidenceLevel;
use crate::notation::{NotationError, parse_notation};

/// How a trial's surviving dice are reduced to one outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollMode {
    #[default]
    Sum,
    Successes,
}

impl fmt::Display for RollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sum => f.write_str("Sum"),
            Self::Successes => f.write_str("Successes"),
        }
    }
}

/// Which extreme dice are discarded before reduction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropMode {
    #[default]
    None,
    DropLowest,
    DropHighest,
}

impl fmt::Display for DropMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("Do not drop"),
            Self::DropLowest => f.write_str("Drop lowest"),
            Self::DropHighest => f.write_str("Drop highest"),
        }
    }
}

/// Count mutation applied to one face of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiceOp {
    Add,
    Subtract,
    SetExact,
}

/// Whether parsed notation replaces the pool or is merged into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotationMode {
    Replace,
    Append,
}

/// A run of identical dice within the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieGroup {
    pub face: u32,
    pub count: u32,
}

/// Errors raised when a pool mutation is rejected.
///
/// A rejected mutation never changes the pool.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolConfigError {
    #[error("dice need at least {min} faces (got {face})")]
    InvalidFace { face: u32, min: u32 },
    #[error("success threshold must be between 1 and {max} (got {value})")]
    SuccessThresholdOutOfRange { value: u32, max: u32 },
    #[error("drop count must be below the {total} dice in the pool (got {value})")]
    DropCountOutOfRange { value: u32, total: u32 },
    #[error("drop count {value} requires a drop mode")]
    DropCountWithoutMode { value: u32 },
    #[error("reroll threshold must be below the smallest face {smallest} (got {value})")]
    RerollThresholdOutOfRange { value: u32, smallest: u32 },
    #[error("number of trials must be positive")]
    ZeroTrials,
    #[error("unsupported confidence level {value}%")]
    UnsupportedConfidence { value: u32 },
    #[error(transparent)]
    Notation(#[from] NotationError),
}

/// Mutable dice pool plus the scalar settings of a simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct DicePool {
    dice: Vec<DieGroup>,
    mode: RollMode,
    success_threshold: u32,
    drop_mode: DropMode,
    drop_count: u32,
    reroll_threshold: u32,
    num_trials: u64,
    confidence_level: ConfidenceLevel,
}

impl Default for DicePool {
    fn default() -> Self {
        Self {
            dice: Vec::new(),
            mode: RollMode::Sum,
            success_threshold: MIN_SUCCESS_THRESHOLD,
            drop_mode: DropMode::None,
            drop_count: 0,
            reroll_threshold: 0,
            num_trials: DEFAULT_NUM_TRIALS,
            confidence_level: ConfidenceLevel::default(),
        }
    }
}

impl DicePool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `op` with amount `n` to the dice of `face` sides.
    ///
    /// Subtracting from an absent face is a no-op; any group whose count
    /// falls below one is pruned. Dependent thresholds are reconciled after
    /// the change.
    ///
    /// # Errors
    ///
    /// Returns an error if `face` is below the minimum face size.
    pub fn modify(&mut self, face: u32, op: DiceOp, n: i64) -> Result<(), PoolConfigError> {
        if face < MIN_FACE_SIZE {
            return Err(PoolConfigError::InvalidFace {
                face,
                min: MIN_FACE_SIZE,
            });
        }

        let position = self.dice.iter().position(|group| group.face == face);
        let current = position.map(|idx| i64::from(self.dice[idx].count));
        let next = match (op, current) {
            (DiceOp::Add, Some(count)) => Some(count.saturating_add(n)),
            (DiceOp::Add | DiceOp::SetExact, None) | (DiceOp::SetExact, Some(_)) => Some(n),
            (DiceOp::Subtract, Some(count)) => Some(count.saturating_sub(n)),
            (DiceOp::Subtract, None) => None,
        };

        if let Some(next) = next {
            let count = u32::try_from(next.max(0)).unwrap_or(u32::MAX);
            match position {
                Some(idx) => self.dice[idx].count = count,
                None => self.dice.push(DieGroup { face, count }),
            }
        }

        self.dice.retain(|group| group.count >= 1);
        self.reconcile();
        Ok(())
    }

    /// Empty the pool and reset drop, reroll and success settings.
    ///
    /// Mode, drop mode, trial count and confidence level are kept.
    pub fn clear(&mut self) {
        self.dice.clear();
        self.success_threshold = MIN_SUCCESS_THRESHOLD;
        self.drop_count = 0;
        self.reroll_threshold = 0;
    }

    /// Parse dice notation and replace or extend the pool with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the notation cannot be parsed; the pool is left
    /// untouched in that case.
    pub fn apply_notation(
        &mut self,
        notation: &str,
        mode: NotationMode,
    ) -> Result<(), PoolConfigError> {
        let parsed = parse_notation(notation)?;
        if mode == NotationMode::Replace {
            self.clear();
        }
        for (face, count) in parsed {
            self.modify(face, DiceOp::Add, i64::from(count))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn dice(&self) -> &[DieGroup] {
        &self.dice
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dice.is_empty()
    }

    /// Total number of dice across every group.
    #[must_use]
    pub fn total_dice(&self) -> u32 {
        self.dice
            .iter()
            .fold(0_u32, |acc, group| acc.saturating_add(group.count))
    }

    #[must_use]
    pub fn largest_face(&self) -> Option<u32> {
        self.dice.iter().map(|group| group.face).max()
    }

    #[must_use]
    pub fn smallest_face(&self) -> Option<u32> {
        self.dice.iter().map(|group| group.face).min()
    }

    /// Pool in `2d6+1d4` form, following the pool's insertion order.
    #[must_use]
    pub fn describe(&self) -> String {
        describe_groups(&self.dice)
    }

    /// Human-readable run title, e.g. `Sum of 4d6, Drop lowest 1, 60000 Trials`.
    #[must_use]
    pub fn title(&self) -> String {
        self.snapshot().title()
    }

    #[must_use]
    pub const fn mode(&self) -> RollMode {
        self.mode
    }

    #[must_use]
    pub const fn success_threshold(&self) -> u32 {
        self.success_threshold
    }

    #[must_use]
    pub const fn drop_mode(&self) -> DropMode {
        self.drop_mode
    }

    #[must_use]
    pub const fn drop_count(&self) -> u32 {
        self.drop_count
    }

    #[must_use]
    pub const fn reroll_threshold(&self) -> u32 {
        self.reroll_threshold
    }

    #[must_use]
    pub const fn num_trials(&self) -> u64 {
        self.num_trials
    }

    #[must_use]
    pub const fn confidence_level(&self) -> ConfidenceLevel {
        self.confidence_level
    }

    /// Switch reduction mode; returning to `Sum` resets the success threshold.
    pub fn set_mode(&mut self, mode: RollMode) {
        self.mode = mode;
        if mode == RollMode::Sum {
            self.success_threshold = MIN_SUCCESS_THRESHOLD;
        }
    }

    /// # Errors
    ///
    /// Returns an error if the threshold is zero or exceeds the largest face.
    pub fn set_success_threshold(&mut self, value: u32) -> Result<(), PoolConfigError> {
        let max = self.largest_face().unwrap_or(MIN_SUCCESS_THRESHOLD);
        if value < MIN_SUCCESS_THRESHOLD || value > max {
            return Err(PoolConfigError::SuccessThresholdOutOfRange { value, max });
        }
        self.success_threshold = value;
        Ok(())
    }

    /// Switch drop mode; disabling drops resets the drop count.
    pub fn set_drop_mode(&mut self, mode: DropMode) {
        self.drop_mode = mode;
        if mode == DropMode::None {
            self.drop_count = 0;
        }
    }

    /// # Errors
    ///
    /// Returns an error if no drop mode is selected or the count would drop
    /// every die in the pool.
    pub fn set_drop_count(&mut self, value: u32) -> Result<(), PoolConfigError> {
        if value == 0 {
            self.drop_count = 0;
            return Ok(());
        }
        if self.drop_mode == DropMode::None {
            return Err(PoolConfigError::DropCountWithoutMode { value });
        }
        let total = self.total_dice();
        if value >= total {
            return Err(PoolConfigError::DropCountOutOfRange { value, total });
        }
        self.drop_count = value;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the threshold would reroll every value of the
    /// smallest die in the pool.
    pub fn set_reroll_threshold(&mut self, value: u32) -> Result<(), PoolConfigError> {
        if value == 0 {
            self.reroll_threshold = 0;
            return Ok(());
        }
        let smallest = self.smallest_face().unwrap_or(1);
        if value >= smallest {
            return Err(PoolConfigError::RerollThresholdOutOfRange { value, smallest });
        }
        self.reroll_threshold = value;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if `value` is zero.
    pub fn set_num_trials(&mut self, value: u64) -> Result<(), PoolConfigError> {
        if value == 0 {
            return Err(PoolConfigError::ZeroTrials);
        }
        self.num_trials = value;
        Ok(())
    }

    pub fn set_confidence_level(&mut self, level: ConfidenceLevel) {
        self.confidence_level = level;
    }

    /// # Errors
    ///
    /// Returns an error if `percent` is not one of the supported levels.
    pub fn set_confidence_percent(&mut self, percent: u32) -> Result<(), PoolConfigError> {
        self.confidence_level = ConfidenceLevel::try_from(percent)?;
        Ok(())
    }

    /// Immutable copy of the configuration for a single run.
    #[must_use]
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            dice: self.dice.clone(),
            mode: self.mode,
            success_threshold: self.success_threshold,
            drop_mode: self.drop_mode,
            drop_count: self.drop_count,
            reroll_threshold: self.reroll_threshold,
            num_trials: self.num_trials,
            confidence_level: self.confidence_level,
        }
    }

    fn reconcile(&mut self) {
        let largest = self.largest_face().unwrap_or(MIN_SUCCESS_THRESHOLD);
        if self.success_threshold > largest {
            log::debug!(
                "success threshold {} clamped to largest face {largest}",
                self.success_threshold
            );
            self.success_threshold = largest;
        }

        let max_drops = self.total_dice().saturating_sub(1);
        if self.drop_count > max_drops {
            log::debug!("drop count {} clamped to {max_drops}", self.drop_count);
            self.drop_count = max_drops;
        }

        let max_reroll = self.smallest_face().map_or(0, |face| face - 1);
        if self.reroll_threshold > max_reroll {
            log::debug!(
                "reroll threshold {} clamped to {max_reroll}",
                self.reroll_threshold
            );
            self.reroll_threshold = max_reroll;
        }
    }
}

/// Configuration captured at the start of a run.
///
/// Snapshots are only produced by [`DicePool::snapshot`], so they always
/// satisfy the pool's invariants: the drop count is below the die count and
/// the reroll threshold is below every face.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolSnapshot {
    dice: Vec<DieGroup>,
    mode: RollMode,
    success_threshold: u32,
    drop_mode: DropMode,
    drop_count: u32,
    reroll_threshold: u32,
    num_trials: u64,
    confidence_level: ConfidenceLevel,
}

impl PoolSnapshot {
    #[must_use]
    pub fn dice(&self) -> &[DieGroup] {
        &self.dice
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dice.is_empty()
    }

    #[must_use]
    pub fn total_dice(&self) -> u32 {
        self.dice
            .iter()
            .fold(0_u32, |acc, group| acc.saturating_add(group.count))
    }

    #[must_use]
    pub const fn mode(&self) -> RollMode {
        self.mode
    }

    #[must_use]
    pub const fn success_threshold(&self) -> u32 {
        self.success_threshold
    }

    #[must_use]
    pub const fn drop_mode(&self) -> DropMode {
        self.drop_mode
    }

    #[must_use]
    pub const fn drop_count(&self) -> u32 {
        self.drop_count
    }

    #[must_use]
    pub const fn reroll_threshold(&self) -> u32 {
        self.reroll_threshold
    }

    #[must_use]
    pub const fn num_trials(&self) -> u64 {
        self.num_trials
    }

    #[must_use]
    pub const fn confidence_level(&self) -> ConfidenceLevel {
        self.confidence_level
    }

    #[must_use]
    pub fn describe(&self) -> String {
        describe_groups(&self.dice)
    }

    #[must_use]
    pub fn title(&self) -> String {
        let mut title = self.mode.to_string();
        // Thresholds of 1 are automatic successes and 0 never rerolls.
        if self.mode == RollMode::Successes && self.success_threshold > MIN_SUCCESS_THRESHOLD {
            title.push_str(&format!(" (>= {})", self.success_threshold));
        }
        title.push_str(" of ");
        title.push_str(&self.describe());
        if self.reroll_threshold > 0 {
            title.push_str(&format!(", Reroll <= {}", self.reroll_threshold));
        }
        if self.drop_count > 0 {
            title.push_str(&format!(", {} {}", self.drop_mode, self.drop_count));
        }
        title.push_str(&format!(", {} Trials", self.num_trials));
        title
    }
}

fn describe_groups(dice: &[DieGroup]) -> String {
    dice.iter()
        .map(|group| format!("{}d{}", group.count, group.face))
        .collect::<Vec<_>>()
        .join("+")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(notation: &str) -> DicePool {
        let mut pool = DicePool::new();
        pool.apply_notation(notation, NotationMode::Replace).unwrap();
        pool
    }

    #[test]
    fn modify_adds_subtracts_and_prunes() {
        let mut pool = DicePool::new();
        pool.modify(6, DiceOp::Add, 1).unwrap();
        pool.modify(6, DiceOp::Add, 1).unwrap();
        pool.modify(4, DiceOp::Add, 1).unwrap();
        assert_eq!(pool.describe(), "2d6+1d4");
        assert_eq!(pool.total_dice(), 3);

        pool.modify(6, DiceOp::Subtract, 5).unwrap();
        assert_eq!(pool.describe(), "1d4");

        pool.modify(8, DiceOp::Subtract, 1).unwrap();
        assert_eq!(pool.describe(), "1d4");

        pool.modify(4, DiceOp::SetExact, 3).unwrap();
        pool.modify(10, DiceOp::SetExact, 0).unwrap();
        assert_eq!(pool.dice(), &[DieGroup { face: 4, count: 3 }]);

        pool.modify(4, DiceOp::SetExact, -2).unwrap();
        assert!(pool.is_empty());
        assert_eq!(pool.describe(), "");
    }

    #[test]
    fn modify_rejects_single_faced_dice() {
        let mut pool = pool_of("2d6");
        let err = pool.modify(1, DiceOp::Add, 1).unwrap_err();
        assert_eq!(err, PoolConfigError::InvalidFace { face: 1, min: 2 });
        assert_eq!(pool.describe(), "2d6");
    }

    #[test]
    fn clear_resets_dependent_settings_only() {
        let mut pool = pool_of("4d6");
        pool.set_mode(RollMode::Successes);
        pool.set_success_threshold(5).unwrap();
        pool.set_drop_mode(DropMode::DropLowest);
        pool.set_drop_count(2).unwrap();
        pool.set_reroll_threshold(1).unwrap();
        pool.set_num_trials(500).unwrap();
        pool.set_confidence_level(ConfidenceLevel::P99);

        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.success_threshold(), 1);
        assert_eq!(pool.drop_count(), 0);
        assert_eq!(pool.reroll_threshold(), 0);
        assert_eq!(pool.mode(), RollMode::Successes);
        assert_eq!(pool.drop_mode(), DropMode::DropLowest);
        assert_eq!(pool.num_trials(), 500);
        assert_eq!(pool.confidence_level(), ConfidenceLevel::P99);
    }

    #[test]
    fn removing_dice_reconciles_thresholds() {
        let mut pool = pool_of("3d8+1d12");
        pool.set_mode(RollMode::Successes);
        pool.set_success_threshold(11).unwrap();
        pool.set_drop_mode(DropMode::DropHighest);
        pool.set_drop_count(3).unwrap();
        pool.set_reroll_threshold(7).unwrap();

        pool.modify(12, DiceOp::Subtract, 1).unwrap();
        assert_eq!(pool.success_threshold(), 8);
        assert_eq!(pool.drop_count(), 2);
        assert_eq!(pool.reroll_threshold(), 7);

        pool.modify(4, DiceOp::Add, 1).unwrap();
        assert_eq!(pool.reroll_threshold(), 3);
    }

    #[test]
    fn setters_reject_out_of_range_values_without_side_effects() {
        let mut pool = pool_of("2d6");
        pool.set_mode(RollMode::Successes);
        assert_eq!(
            pool.set_success_threshold(7),
            Err(PoolConfigError::SuccessThresholdOutOfRange { value: 7, max: 6 })
        );
        assert!(pool.set_success_threshold(0).is_err());
        assert_eq!(pool.success_threshold(), 1);

        assert_eq!(
            pool.set_drop_count(1),
            Err(PoolConfigError::DropCountWithoutMode { value: 1 })
        );
        pool.set_drop_mode(DropMode::DropLowest);
        assert_eq!(
            pool.set_drop_count(2),
            Err(PoolConfigError::DropCountOutOfRange { value: 2, total: 2 })
        );
        pool.set_drop_count(1).unwrap();

        assert_eq!(
            pool.set_reroll_threshold(6),
            Err(PoolConfigError::RerollThresholdOutOfRange {
                value: 6,
                smallest: 6
            })
        );
        assert_eq!(pool.set_num_trials(0), Err(PoolConfigError::ZeroTrials));
        assert_eq!(pool.num_trials(), DEFAULT_NUM_TRIALS);
        assert!(pool.set_confidence_percent(50).is_err());
        assert_eq!(pool.confidence_level(), ConfidenceLevel::P90);
    }

    #[test]
    fn mode_and_drop_mode_switches_reset_their_settings() {
        let mut pool = pool_of("3d6");
        pool.set_mode(RollMode::Successes);
        pool.set_success_threshold(4).unwrap();
        pool.set_mode(RollMode::Sum);
        assert_eq!(pool.success_threshold(), 1);

        pool.set_drop_mode(DropMode::DropHighest);
        pool.set_drop_count(2).unwrap();
        pool.set_drop_mode(DropMode::None);
        assert_eq!(pool.drop_count(), 0);
    }

    #[test]
    fn notation_append_merges_and_invalid_input_is_rejected() {
        let mut pool = pool_of("2d6");
        pool.apply_notation("1d6+1d4", NotationMode::Append).unwrap();
        assert_eq!(pool.describe(), "3d6+1d4");

        let err = pool
            .apply_notation("2d6+oops", NotationMode::Replace)
            .unwrap_err();
        assert!(matches!(err, PoolConfigError::Notation(_)));
        assert_eq!(pool.describe(), "3d6+1d4");
    }

    #[test]
    fn title_mentions_only_active_settings() {
        let mut pool = pool_of("4d6");
        pool.set_num_trials(1_000).unwrap();
        assert_eq!(pool.title(), "Sum of 4d6, 1000 Trials");

        pool.set_mode(RollMode::Successes);
        pool.set_success_threshold(4).unwrap();
        pool.set_reroll_threshold(1).unwrap();
        pool.set_drop_mode(DropMode::DropLowest);
        pool.set_drop_count(1).unwrap();
        assert_eq!(
            pool.title(),
            "Successes (>= 4) of 4d6, Reroll <= 1, Drop lowest 1, 1000 Trials"
        );
    }

    #[test]
    fn sum_title_omits_success_threshold() {
        let mut pool = pool_of("2d6");
        pool.set_success_threshold(4).unwrap();
        assert_eq!(pool.title(), "Sum of 2d6, 60000 Trials");
        pool.set_mode(RollMode::Successes);
        pool.set_success_threshold(4).unwrap();
        assert_eq!(pool.title(), "Successes (>= 4) of 2d6, 60000 Trials");
    }

    #[test]
    fn snapshot_is_detached_from_later_edits() {
        let mut pool = pool_of("2d6");
        let snapshot = pool.snapshot();
        pool.modify(20, DiceOp::Add, 1).unwrap();
        assert_eq!(snapshot.describe(), "2d6");
        assert_eq!(snapshot.total_dice(), 2);
        assert_eq!(pool.describe(), "2d6+1d20");
    }
}
