//! Dicesim Engine
//!
//! Monte Carlo estimation of dice-pool outcome distributions. A pool of
//! mixed dice is rolled many times under optional reroll and drop rules, the
//! results are tallied, rare tails are pruned and summary statistics are
//! reported together with a sampling margin of error.

pub mod aggregate;
pub mod config;
pub mod constants;
pub mod moe;
pub mod notation;
pub mod numbers;
pub mod pool;
pub mod rng;
pub mod roll;
pub mod sanitize;
pub mod simulator;
pub mod stats;

// Re-export commonly used types
pub use aggregate::{AggregateRun, CancelToken, FrequencyTable, ParallelPlan};
pub use config::{EngineConfig, EngineConfigError};
pub use moe::{ConfidenceLevel, format_margin, margin_of_error};
pub use notation::{NotationError, parse_notation};
pub use pool::{
    DiceOp, DicePool, DieGroup, DropMode, NotationMode, PoolConfigError, PoolSnapshot, RollMode,
};
pub use rng::CountingRng;
pub use roll::{TrialOutcome, apply_drop, reduce, roll_once, roll_raw, sample_die, trial};
pub use sanitize::{Distribution, sanitize};
pub use simulator::{RunOptions, SimulationError, SimulationReport, Simulator, build_report};
pub use stats::{QuartileMarkers, Statistics};
