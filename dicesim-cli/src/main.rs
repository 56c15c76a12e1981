mod reports;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};

use dicesim_engine::constants::{DEFAULT_CONFIDENCE_LEVEL, DEFAULT_NUM_TRIALS};
use dicesim_engine::{
    CancelToken, DicePool, DropMode, EngineConfig, NotationMode, RollMode, RunOptions,
    SimulationReport, Simulator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Add up every surviving die
    Sum,
    /// Count surviving dice at or above the success threshold
    Successes,
}

impl From<ModeArg> for RollMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Sum => Self::Sum,
            ModeArg::Successes => Self::Successes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DropArg {
    /// Keep every die
    None,
    /// Discard the lowest dice
    Lowest,
    /// Discard the highest dice
    Highest,
}

impl From<DropArg> for DropMode {
    fn from(drop: DropArg) -> Self {
        match drop {
            DropArg::None => Self::None,
            DropArg::Lowest => Self::DropLowest,
            DropArg::Highest => Self::DropHighest,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "dicesim", version = "0.1.0")]
#[command(about = "Monte Carlo dice pool simulator - outcome distribution, statistics and margin of error")]
struct Args {
    /// Dice pool in notation form, e.g. 3d6+2d4
    #[arg(long)]
    dice: String,

    /// How surviving dice are reduced to one outcome
    #[arg(long, value_enum, default_value_t = ModeArg::Sum)]
    mode: ModeArg,

    /// Minimum face value that counts as a success (successes mode only)
    #[arg(long)]
    success_threshold: Option<u32>,

    /// Which extreme dice to discard before reduction
    #[arg(long, value_enum, default_value_t = DropArg::None)]
    drop: DropArg,

    /// Number of dice to discard
    #[arg(long, default_value_t = 0)]
    drop_count: u32,

    /// Reroll any die showing this value or lower (0 disables)
    #[arg(long, default_value_t = 0)]
    reroll: u32,

    /// Number of trials to run
    #[arg(long, default_value_t = DEFAULT_NUM_TRIALS)]
    trials: u64,

    /// Confidence level for the margin of error (70, 80, 90, 95, 97 or 99)
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE_LEVEL)]
    confidence: u32,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Worker streams; more than one runs trials in parallel
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// JSON file overriding engine tuning (cutoff sensitivity, precision, ...)
    #[arg(long)]
    engine_config: Option<PathBuf>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["console", "json", "markdown", "csv"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut simulator = build_simulator(&args)?;
    let report = run_simulation(&args, &mut simulator)?;
    write_report(&args, report)?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    EngineConfig::from_json(&raw)
        .with_context(|| format!("invalid engine config {}", path.display()))
}

fn configure_pool(args: &Args, pool: &mut DicePool) -> Result<()> {
    pool.apply_notation(&args.dice, NotationMode::Replace)
        .with_context(|| format!("invalid dice pool '{}'", args.dice))?;

    pool.set_mode(args.mode.into());
    if let Some(threshold) = args.success_threshold {
        if args.mode == ModeArg::Successes {
            pool.set_success_threshold(threshold)
                .context("invalid --success-threshold")?;
        } else {
            log::warn!("--success-threshold {threshold} ignored in sum mode");
        }
    }

    pool.set_drop_mode(args.drop.into());
    pool.set_drop_count(args.drop_count)
        .context("invalid --drop-count")?;
    pool.set_reroll_threshold(args.reroll)
        .context("invalid --reroll")?;
    pool.set_num_trials(args.trials)
        .context("invalid --trials")?;
    pool.set_confidence_percent(args.confidence)
        .context("invalid --confidence")?;
    Ok(())
}

fn build_simulator(args: &Args) -> Result<Simulator> {
    let config = load_engine_config(args.engine_config.as_deref())?;
    let mut simulator = Simulator::with_config(config)?;
    configure_pool(args, simulator.pool_mut())?;
    log::debug!("configured pool: {}", simulator.pool().title());
    Ok(simulator)
}

fn run_simulation<'a>(args: &Args, simulator: &'a mut Simulator) -> Result<&'a SimulationReport> {
    let workers = args.workers.max(1);
    let report = match args.seed {
        Some(seed) if workers == 1 => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            simulator.run_with_rng(&mut rng, Some(seed))
        }
        seed => simulator.run(RunOptions { seed, workers }, &CancelToken::new()),
    };
    report.context("simulation failed")
}

fn write_report(args: &Args, report: &SimulationReport) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => reports::generate_json_report(&mut output_target, report)?,
        "markdown" => reports::generate_markdown_report(&mut output_target, report)?,
        "csv" => reports::generate_csv_report(&mut output_target, report)?,
        _ => reports::generate_console_report(&mut output_target, report)?,
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicesim_engine::{ConfidenceLevel, PoolConfigError};

    fn base_args() -> Args {
        Args {
            dice: "2d6".to_string(),
            mode: ModeArg::Sum,
            success_threshold: None,
            drop: DropArg::None,
            drop_count: 0,
            reroll: 0,
            trials: 2_000,
            confidence: 90,
            seed: Some(1337),
            workers: 1,
            engine_config: None,
            report: "json".to_string(),
            output: None,
            verbose: false,
        }
    }

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dicesim-main-{label}-{}", std::process::id()))
    }

    #[test]
    fn args_parse_with_defaults() {
        let args = Args::try_parse_from(["dicesim", "--dice", "3d6"]).unwrap();
        assert_eq!(args.mode, ModeArg::Sum);
        assert_eq!(args.drop, DropArg::None);
        assert_eq!(args.trials, DEFAULT_NUM_TRIALS);
        assert_eq!(args.confidence, 90);
        assert_eq!(args.report, "console");
        assert!(Args::try_parse_from(["dicesim"]).is_err());
        assert!(Args::try_parse_from(["dicesim", "--dice", "1d6", "--report", "xml"]).is_err());
    }

    #[test]
    fn configure_pool_applies_every_flag() {
        let args = Args {
            dice: "4d6".to_string(),
            mode: ModeArg::Successes,
            success_threshold: Some(5),
            drop: DropArg::Lowest,
            drop_count: 1,
            reroll: 1,
            confidence: 95,
            ..base_args()
        };
        let mut pool = DicePool::new();
        configure_pool(&args, &mut pool).unwrap();
        assert_eq!(pool.mode(), RollMode::Successes);
        assert_eq!(pool.success_threshold(), 5);
        assert_eq!(pool.drop_mode(), DropMode::DropLowest);
        assert_eq!(pool.drop_count(), 1);
        assert_eq!(pool.reroll_threshold(), 1);
        assert_eq!(pool.num_trials(), 2_000);
        assert_eq!(pool.confidence_level(), ConfidenceLevel::P95);
    }

    #[test]
    fn configure_pool_ignores_threshold_in_sum_mode() {
        let args = Args {
            success_threshold: Some(4),
            ..base_args()
        };
        let mut pool = DicePool::new();
        configure_pool(&args, &mut pool).unwrap();
        assert_eq!(pool.success_threshold(), 1);
    }

    #[test]
    fn configure_pool_reports_invalid_settings() {
        let mut pool = DicePool::new();
        let err = configure_pool(
            &Args {
                drop_count: 1,
                ..base_args()
            },
            &mut pool,
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PoolConfigError>(),
            Some(&PoolConfigError::DropCountWithoutMode { value: 1 })
        );

        let err = configure_pool(
            &Args {
                dice: "2x6".to_string(),
                ..base_args()
            },
            &mut pool,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("invalid dice pool '2x6'"));

        assert!(
            configure_pool(
                &Args {
                    confidence: 50,
                    ..base_args()
                },
                &mut pool
            )
            .is_err()
        );
    }

    #[test]
    fn seeded_runs_are_reproducible_across_invocations() {
        let args = base_args();
        let mut first = build_simulator(&args).unwrap();
        let mut second = build_simulator(&args).unwrap();
        let a = run_simulation(&args, &mut first).unwrap().clone();
        let b = run_simulation(&args, &mut second).unwrap();
        assert_eq!(&a, b);
        assert_eq!(a.seed, Some(1337));
        assert_eq!(a.counts.total(), 2_000);
    }

    #[test]
    fn parallel_runs_use_the_seed_as_run_seed() {
        let args = Args {
            workers: 3,
            ..base_args()
        };
        let mut simulator = build_simulator(&args).unwrap();
        let report = run_simulation(&args, &mut simulator).unwrap();
        assert_eq!(report.seed, Some(1337));
        assert_eq!(report.counts.total(), 2_000);
    }

    #[test]
    fn engine_config_file_overrides_defaults() {
        let path = temp_path("engine.json");
        std::fs::write(&path, r#"{"cutoff_sensitivity": 2.0}"#).unwrap();
        let args = Args {
            engine_config: Some(path.clone()),
            ..base_args()
        };
        let simulator = build_simulator(&args).unwrap();
        assert!((simulator.config().cutoff_sensitivity - 2.0).abs() < f64::EPSILON);

        std::fs::write(&path, r#"{"quartile_step": 0.0}"#).unwrap();
        assert!(build_simulator(&args).is_err());

        let missing = Args {
            engine_config: Some(temp_path("missing.json")),
            ..base_args()
        };
        let err = build_simulator(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read"));
    }

    #[test]
    fn write_report_emits_json_output() {
        let path = temp_path("report.json");
        let args = Args {
            output: Some(path.clone()),
            ..base_args()
        };
        let mut simulator = build_simulator(&args).unwrap();
        let report = run_simulation(&args, &mut simulator).unwrap().clone();
        write_report(&args, &report).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("\"title\": \"Sum of 2d6, 2000 Trials\""));
    }

    #[test]
    fn write_report_emits_csv_output() {
        let path = temp_path("report.csv");
        let args = Args {
            report: "csv".to_string(),
            output: Some(path.clone()),
            ..base_args()
        };
        let mut simulator = build_simulator(&args).unwrap();
        let report = run_simulation(&args, &mut simulator).unwrap().clone();
        write_report(&args, &report).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("outcome,count,percent"));
        assert!(content.lines().any(|line| line.starts_with("7,")));
    }

    #[test]
    fn output_target_stdout_writes() {
        let mut target = OutputTarget::new(None).unwrap();
        writeln!(target, "dicesim").unwrap();
        target.flush_inner().unwrap();
    }
}
