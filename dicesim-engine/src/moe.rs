//! Margin-of-error estimation for simulated outcome percentages.
//!
//! The estimate is the conservative binomial half-width (p = 0.5) applied
//! uniformly to every bar of the distribution. It depends only on the trial
//! count and the chosen confidence level.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::MARGIN_PRECISION;
use crate::numbers::{round_to, u64_to_f64};
use crate::pool::PoolConfigError;

/// Supported confidence levels for margin-of-error reporting.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub enum ConfidenceLevel {
    P70,
    P80,
    #[default]
    P90,
    P95,
    P97,
    P99,
}

impl ConfidenceLevel {
    /// Every supported level in ascending order.
    pub const ALL: [Self; 6] = [
        Self::P70,
        Self::P80,
        Self::P90,
        Self::P95,
        Self::P97,
        Self::P99,
    ];

    /// Level expressed in percent.
    #[must_use]
    pub const fn percent(self) -> u32 {
        match self {
            Self::P70 => 70,
            Self::P80 => 80,
            Self::P90 => 90,
            Self::P95 => 95,
            Self::P97 => 97,
            Self::P99 => 99,
        }
    }

    /// Critical value z* for the two-sided interval at this level.
    #[must_use]
    pub const fn z_star(self) -> f64 {
        match self {
            Self::P70 => 1.036,
            Self::P80 => 1.281,
            Self::P90 => 1.645,
            Self::P95 => 1.96,
            Self::P97 => 2.17,
            Self::P99 => 2.576,
        }
    }
}

impl TryFrom<u32> for ConfidenceLevel {
    type Error = PoolConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|level| level.percent() == value)
            .ok_or(PoolConfigError::UnsupportedConfidence { value })
    }
}

impl From<ConfidenceLevel> for u32 {
    fn from(level: ConfidenceLevel) -> Self {
        level.percent()
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

/// Margin of error in percentage points, rounded to one decimal place.
///
/// Returns 0.0 when `num_trials` is zero; callers refuse such runs earlier.
#[must_use]
pub fn margin_of_error(num_trials: u64, level: ConfidenceLevel) -> f64 {
    if num_trials == 0 {
        return 0.0;
    }
    let moe = (0.5 * 0.5 / u64_to_f64(num_trials)).sqrt() * 100.0 * level.z_star();
    round_to(moe, MARGIN_PRECISION)
}

/// Render a margin of error the way reports display it, e.g. `0.3%`.
#[must_use]
pub fn format_margin(margin: f64) -> String {
    format!("{margin:.1}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_trials_at_ninety_percent() {
        let moe = margin_of_error(60_000, ConfidenceLevel::P90);
        assert!((moe - 0.3).abs() < 1e-9);
        assert_eq!(format_margin(moe), "0.3%");
    }

    #[test]
    fn more_trials_shrink_the_margin() {
        let levels = ConfidenceLevel::ALL;
        for level in levels {
            let coarse = margin_of_error(100, level);
            let finer = margin_of_error(1_000, level);
            let finest = margin_of_error(10_000, level);
            assert!(coarse > finer, "{level}: {coarse} <= {finer}");
            assert!(finer > finest, "{level}: {finer} <= {finest}");
        }
    }

    #[test]
    fn higher_confidence_widens_the_margin() {
        let margins: Vec<f64> = ConfidenceLevel::ALL
            .iter()
            .map(|level| margin_of_error(100, *level))
            .collect();
        for pair in margins.windows(2) {
            assert!(pair[0] < pair[1], "margins not increasing: {margins:?}");
        }
    }

    #[test]
    fn zero_trials_yield_zero_margin() {
        assert!((margin_of_error(0, ConfidenceLevel::P99) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn confidence_parses_only_enumerated_levels() {
        assert_eq!(ConfidenceLevel::try_from(95), Ok(ConfidenceLevel::P95));
        assert_eq!(
            ConfidenceLevel::try_from(85),
            Err(PoolConfigError::UnsupportedConfidence { value: 85 })
        );
        let json = serde_json::to_string(&ConfidenceLevel::P97).unwrap();
        assert_eq!(json, "97");
        let parsed: ConfidenceLevel = serde_json::from_str("70").unwrap();
        assert_eq!(parsed, ConfidenceLevel::P70);
        assert!(serde_json::from_str::<ConfidenceLevel>("75").is_err());
    }
}
