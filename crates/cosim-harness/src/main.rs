//! Scenario runner binary.
//!
//! # Usage
//!
//! ```bash
//! # Ten steps of seeded inputs
//! cosim-run --stop 1.0 --step-size 0.1 --seed 7
//!
//! # Constant input, checkpoint at step 3 and replay
//! cosim-run --input 5.0 --checkpoint-at 3 --log-level debug
//! ```

use std::io::{self, Write as _};

use clap::Parser;
use cosim_core::PhasePolicy;
use cosim_harness::{InputSchedule, InvariantRegistry, Scenario, ScenarioConfig, ScenarioError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Identity block scenario runner
#[derive(Parser, Debug)]
#[command(name = "cosim-run")]
#[command(about = "Drive the identity block through a co-simulation and check the trace")]
#[command(version)]
struct Args {
    /// Experiment start time
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    start: f64,

    /// Experiment stop time
    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    stop: f64,

    /// Communication step size
    #[arg(long, default_value_t = 0.1)]
    step_size: f64,

    /// Constant input; seeded random inputs when omitted
    #[arg(long, allow_hyphen_values = true)]
    input: Option<f64>,

    /// Seed for random inputs
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Value for test_param set during initialization
    #[arg(long, allow_hyphen_values = true)]
    test_param: Option<f64>,

    /// Accept out-of-phase calls
    #[arg(long)]
    permissive: bool,

    /// Snapshot before this step, then roll back and replay after the run
    #[arg(long)]
    checkpoint_at: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = ScenarioConfig {
        start_time: args.start,
        stop_time: args.stop,
        step_size: args.step_size,
        inputs: args.input.map_or(InputSchedule::Seeded(args.seed), InputSchedule::Constant),
        test_param: args.test_param,
        phase_policy: if args.permissive { PhasePolicy::Permissive } else { PhasePolicy::Strict },
        checkpoint_at: args.checkpoint_at,
        logging_on: tracing::enabled!(tracing::Level::DEBUG),
    };

    let scenario = Scenario::new(config)?;
    tracing::info!(steps = scenario.steps(), "running scenario");

    let trace = scenario.run()?;
    write!(io::stdout().lock(), "{}", trace.to_table())?;

    let registry = InvariantRegistry::standard();
    registry.check_all(&trace).map_err(ScenarioError::Violations)?;
    tracing::info!(invariants = registry.len(), "all invariants hold");

    Ok(())
}
