//! Default values shared across the engine.

/// Trials run when no explicit count is configured.
pub const DEFAULT_NUM_TRIALS: u64 = 60_000;

/// Confidence level (percent) used for margin-of-error reporting by default.
pub const DEFAULT_CONFIDENCE_LEVEL: u32 = 90;

/// An outcome at least this many times rarer than the modal outcome is pruned.
pub const CUTOFF_SENSITIVITY: f64 = 120.0;

/// Decimal places kept when converting counts to percentages and statistics.
pub const ROUNDING_PRECISION: u32 = 6;

/// Cumulative-probability step used to place quartile markers.
pub const QUARTILE_STEP: f64 = 25.0;

/// Decimal places used for the reported margin of error.
pub const MARGIN_PRECISION: u32 = 1;

/// Trials executed between cancellation checks in parallel runs.
pub const TRIAL_BATCH_SIZE: u64 = 4_096;

/// Smallest die face accepted by the pool.
pub const MIN_FACE_SIZE: u32 = 2;

/// Smallest meaningful success threshold.
pub const MIN_SUCCESS_THRESHOLD: u32 = 1;
