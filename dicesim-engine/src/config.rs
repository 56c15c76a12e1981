//! Engine tuning configuration.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{CUTOFF_SENSITIVITY, QUARTILE_STEP, ROUNDING_PRECISION, TRIAL_BATCH_SIZE};

const DEFAULT_ENGINE_DATA: &str = include_str!("../data/engine.json");

/// Largest rounding precision accepted; f64 carries roughly 15 significant digits.
const MAX_ROUNDING_PRECISION: u32 = 12;

/// Errors raised when engine configuration invariants are violated.
#[derive(Debug, Error)]
pub enum EngineConfigError {
    #[error("cutoff sensitivity must be a finite value of at least 1 (got {value})")]
    CutoffSensitivity { value: f64 },
    #[error("rounding precision must be at most {max} places (got {value})")]
    RoundingPrecision { value: u32, max: u32 },
    #[error("quartile step must lie strictly between 0 and 100 (got {value})")]
    QuartileStep { value: f64 },
    #[error("batch size must be positive")]
    BatchSize,
    #[error("engine configuration is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tuning knobs for sanitization, statistics and parallel execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Outcomes rarer than `max_count / cutoff_sensitivity` are pruned.
    #[serde(default = "EngineConfig::default_cutoff_sensitivity")]
    pub cutoff_sensitivity: f64,
    #[serde(default = "EngineConfig::default_rounding_precision")]
    pub rounding_precision: u32,
    #[serde(default = "EngineConfig::default_quartile_step")]
    pub quartile_step: f64,
    /// Trials per batch between cancellation checks.
    #[serde(default = "EngineConfig::default_batch_size")]
    pub batch_size: u64,
}

impl EngineConfig {
    const fn default_cutoff_sensitivity() -> f64 {
        CUTOFF_SENSITIVITY
    }

    const fn default_rounding_precision() -> u32 {
        ROUNDING_PRECISION
    }

    const fn default_quartile_step() -> f64 {
        QUARTILE_STEP
    }

    const fn default_batch_size() -> u64 {
        TRIAL_BATCH_SIZE
    }

    /// Configuration bundled with the engine.
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_ENGINE_DATA).unwrap_or_else(|_| Self::builtin())
    }

    /// Parse and validate a JSON configuration; missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json(raw: &str) -> Result<Self, EngineConfigError> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    ///
    /// Returns an error describing the first invariant that does not hold.
    pub fn validate(&self) -> Result<(), EngineConfigError> {
        if !self.cutoff_sensitivity.is_finite() || self.cutoff_sensitivity < 1.0 {
            return Err(EngineConfigError::CutoffSensitivity {
                value: self.cutoff_sensitivity,
            });
        }
        if self.rounding_precision > MAX_ROUNDING_PRECISION {
            return Err(EngineConfigError::RoundingPrecision {
                value: self.rounding_precision,
                max: MAX_ROUNDING_PRECISION,
            });
        }
        if !(self.quartile_step > 0.0 && self.quartile_step < 100.0) {
            return Err(EngineConfigError::QuartileStep {
                value: self.quartile_step,
            });
        }
        if self.batch_size == 0 {
            return Err(EngineConfigError::BatchSize);
        }
        Ok(())
    }

    const fn builtin() -> Self {
        Self {
            cutoff_sensitivity: CUTOFF_SENSITIVITY,
            rounding_precision: ROUNDING_PRECISION,
            quartile_step: QUARTILE_STEP,
            batch_size: TRIAL_BATCH_SIZE,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::load_from_static()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_config_matches_builtin_defaults() {
        assert_eq!(EngineConfig::load_from_static(), EngineConfig::builtin());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let cfg = EngineConfig::from_json(r#"{"cutoff_sensitivity": 50.0}"#).unwrap();
        assert!((cfg.cutoff_sensitivity - 50.0).abs() < f64::EPSILON);
        assert_eq!(cfg.rounding_precision, ROUNDING_PRECISION);
        assert_eq!(cfg.batch_size, TRIAL_BATCH_SIZE);
        let empty: EngineConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(empty, EngineConfig::builtin());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"cutoff_sensitivity": 0.5}"#),
            Err(EngineConfigError::CutoffSensitivity { .. })
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"rounding_precision": 20}"#),
            Err(EngineConfigError::RoundingPrecision { value: 20, .. })
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"quartile_step": 100.0}"#),
            Err(EngineConfigError::QuartileStep { .. })
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"batch_size": 0}"#),
            Err(EngineConfigError::BatchSize)
        ));
        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(EngineConfigError::Parse(_))
        ));
    }
}
