//! Scripted orchestrator runs.
//!
//! A [`Scenario`] drives one slave instance through a complete co-simulation:
//! setup, initialization, a fixed-step loop over `[start_time, stop_time)`,
//! an optional checkpoint with rollback replay, and termination. Every step
//! is recorded in a [`Trace`] for the invariant checks.
//!
//! Inputs are either constant or drawn from a ChaCha8 stream seeded by the
//! scenario, so the same configuration always produces the same trace.

use std::fmt::Write as _;

use cosim_core::{
    Experiment, IdentityBlock, Instance, InstanceConfig, InstanceInfo, LogSink, Phase, PhasePolicy,
    SlaveError, TracingSink,
    identity::{VR_INPUT_VALUE, VR_OUTPUT_VALUE, VR_TEST_PARAM},
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::invariants::Violation;

/// Range of seeded inputs.
pub const SEEDED_INPUT_RANGE: std::ops::Range<f64> = -100.0..100.0;

/// Upper bound on communication steps per run.
pub const MAX_STEPS: usize = 1_000_000;

/// Errors from building or running a scenario.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScenarioError {
    /// Slave rejected a call
    #[error("slave error: {0}")]
    Slave(#[from] SlaveError),

    /// Step size is not a positive finite number
    #[error("invalid step size {step_size}")]
    InvalidStepSize {
        /// Rejected value
        step_size: f64,
    },

    /// Time interval is empty or not finite
    #[error("invalid interval [{start_time}, {stop_time})")]
    InvalidInterval {
        /// Start of the interval
        start_time: f64,
        /// End of the interval
        stop_time: f64,
    },

    /// Interval holds more steps than a run may take
    #[error("run needs more than {max_steps} steps")]
    TooManySteps {
        /// Upper bound on steps per run
        max_steps: usize,
    },

    /// Checkpoint index past the last step
    #[error("checkpoint at step {checkpoint} but only {steps} steps")]
    CheckpointOutOfRange {
        /// Requested step index
        checkpoint: usize,
        /// Steps in the run
        steps: usize,
    },

    /// The trace broke at least one invariant
    #[error(
        "{} invariant violation(s), first: {}",
        .0.len(),
        .0.first().map(ToString::to_string).unwrap_or_default()
    )]
    Violations(Vec<Violation>),
}

/// Where inputs come from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputSchedule {
    /// Same input on every step
    Constant(f64),
    /// Uniform in [`SEEDED_INPUT_RANGE`], from a ChaCha8 stream
    Seeded(u64),
}

impl InputSchedule {
    /// Inputs for `steps` steps.
    #[must_use]
    pub fn inputs(&self, steps: usize) -> Vec<f64> {
        match *self {
            Self::Constant(value) => vec![value; steps],
            Self::Seeded(seed) => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                (0..steps).map(|_| rng.gen_range(SEEDED_INPUT_RANGE)).collect()
            },
        }
    }
}

/// Scenario parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    /// Experiment start
    pub start_time: f64,
    /// Experiment stop (exclusive for step starts)
    pub stop_time: f64,
    /// Communication step size
    pub step_size: f64,
    /// Input values
    pub inputs: InputSchedule,
    /// Parameter value set during initialization; default kept if `None`
    pub test_param: Option<f64>,
    /// Lifecycle enforcement of the instance
    pub phase_policy: PhasePolicy,
    /// Step index at which to snapshot, then roll back and replay after the
    /// run
    pub checkpoint_at: Option<usize>,
    /// Debug logging of the instance
    pub logging_on: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            stop_time: 1.0,
            step_size: 0.1,
            inputs: InputSchedule::Seeded(0),
            test_param: None,
            phase_policy: PhasePolicy::Strict,
            checkpoint_at: None,
            logging_on: false,
        }
    }
}

/// One communication step as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceStep {
    /// Step index from 0
    pub index: usize,
    /// Communication point at the start of the step
    pub time: f64,
    /// Input set before the step
    pub input: f64,
    /// Output read after the step
    pub output: f64,
    /// Parameter read after the step
    pub test_param: f64,
    /// Serialized state size after the step
    pub state_size: usize,
}

/// Steps repeated after restoring the checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Replay {
    /// Index of the checkpointed step
    pub from: usize,
    /// Replayed steps, indices `from..`
    pub steps: Vec<TraceStep>,
}

/// Record of one scenario run.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    /// Configured step size
    pub step_size: f64,
    /// Every step of the run, in order
    pub steps: Vec<TraceStep>,
    /// Replay after rollback, if a checkpoint was requested
    pub replay: Option<Replay>,
    /// Phase after the run
    pub final_phase: Phase,
}

impl Trace {
    /// Fixed-width table of the run, one line per step.
    #[must_use]
    pub fn to_table(&self) -> String {
        let mut table = String::from("step       time      input     output\n");
        for step in &self.steps {
            // Writing to a String cannot fail
            let _ = writeln!(
                table,
                "{:>4} {:>10.4} {:>10.4} {:>10.4}",
                step.index, step.time, step.input, step.output
            );
        }
        table
    }
}

/// Scenario runner.
#[derive(Debug, Clone)]
pub struct Scenario {
    config: ScenarioConfig,
    steps: usize,
}

impl Scenario {
    /// Validate `config`.
    ///
    /// # Errors
    ///
    /// - `ScenarioError::InvalidStepSize` unless the step size is finite
    ///   and positive
    /// - `ScenarioError::InvalidInterval` unless `start < stop`, both finite
    /// - `ScenarioError::TooManySteps` if the interval holds more than
    ///   [`MAX_STEPS`] steps
    /// - `ScenarioError::CheckpointOutOfRange` if the checkpoint is past the
    ///   last step
    pub fn new(config: ScenarioConfig) -> Result<Self, ScenarioError> {
        if !(config.step_size.is_finite() && config.step_size > 0.0) {
            return Err(ScenarioError::InvalidStepSize { step_size: config.step_size });
        }
        let interval_valid = config.start_time.is_finite()
            && config.stop_time.is_finite()
            && config.start_time < config.stop_time;
        if !interval_valid {
            return Err(ScenarioError::InvalidInterval {
                start_time: config.start_time,
                stop_time: config.stop_time,
            });
        }

        let steps = step_count(config.start_time, config.stop_time, config.step_size)
            .ok_or(ScenarioError::TooManySteps { max_steps: MAX_STEPS })?;
        if let Some(checkpoint) = config.checkpoint_at {
            if checkpoint >= steps {
                return Err(ScenarioError::CheckpointOutOfRange { checkpoint, steps });
            }
        }

        Ok(Self { config, steps })
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Number of communication steps in the run.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Run with the slave logging through `tracing`.
    pub fn run(&self) -> Result<Trace, ScenarioError> {
        self.run_with(TracingSink)
    }

    /// Run with the slave logging through `sink`.
    pub fn run_with<S: LogSink>(&self, sink: S) -> Result<Trace, ScenarioError> {
        let config = &self.config;
        let info = InstanceInfo::co_simulation("cosim-run").with_logging(config.logging_on);
        let mut slave = Instance::new(
            info,
            InstanceConfig::with_phase_policy(config.phase_policy),
            IdentityBlock,
            sink,
        )?;

        slave.setup_experiment(Experiment {
            tolerance: None,
            start_time: config.start_time,
            stop_time: Some(config.stop_time),
        })?;
        slave.enter_initialization_mode()?;
        if let Some(test_param) = config.test_param {
            slave.set_real(&[VR_TEST_PARAM], &[test_param])?;
        }
        slave.exit_initialization_mode()?;

        let inputs = config.inputs.inputs(self.steps);
        let mut steps = Vec::with_capacity(self.steps);
        let mut checkpoint = None;

        for (index, &input) in inputs.iter().enumerate() {
            if config.checkpoint_at == Some(index) {
                checkpoint = Some(slave.get_state()?);
                tracing::debug!(index, "checkpoint taken");
            }
            steps.push(self.step(&mut slave, index, input)?);
        }

        let replay = match (checkpoint, config.checkpoint_at) {
            (Some(snapshot), Some(from)) => {
                slave.set_state(&snapshot)?;
                tracing::debug!(from, "rolled back to checkpoint");

                let replayed = inputs
                    .iter()
                    .enumerate()
                    .skip(from)
                    .map(|(index, &input)| self.step(&mut slave, index, input))
                    .collect::<Result<Vec<_>, _>>()?;
                Some(Replay { from, steps: replayed })
            },
            _ => None,
        };

        slave.terminate()?;
        tracing::info!(steps = steps.len(), replayed = replay.is_some(), "scenario complete");

        Ok(Trace { step_size: config.step_size, steps, replay, final_phase: slave.phase() })
    }

    fn step<S: LogSink>(
        &self,
        slave: &mut Instance<IdentityBlock, S>,
        index: usize,
        input: f64,
    ) -> Result<TraceStep, ScenarioError> {
        let time = step_time(self.config.start_time, self.config.step_size, index);

        slave.set_real(&[VR_INPUT_VALUE], &[input])?;
        slave.do_step(time, self.config.step_size, false)?;

        let mut values = [0.0; 2];
        slave.get_real(&[VR_OUTPUT_VALUE, VR_TEST_PARAM], &mut values)?;
        let [output, test_param] = values;

        let mut buf = [0u8; 64];
        let state_size = slave.serialize_into(&mut buf)?;

        Ok(TraceStep { index, time, input, output, test_param, state_size })
    }
}

/// Communication point of step `index`. Computed from the start time so
/// rounding does not accumulate.
#[allow(clippy::cast_precision_loss)]
fn step_time(start_time: f64, step_size: f64, index: usize) -> f64 {
    start_time + index as f64 * step_size
}

/// Steps whose communication point lies in `[start, stop)`, with a relative
/// tolerance so `stop` itself is not stepped from due to rounding.
///
/// `None` if there are more than [`MAX_STEPS`].
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn step_count(start_time: f64, stop_time: f64, step_size: f64) -> Option<usize> {
    let end = stop_time - step_size * 1e-9;
    let span = (end - start_time) / step_size;
    if span.is_nan() || span > MAX_STEPS as f64 {
        return None;
    }

    // The division may round either way; settle on the exact boundary.
    let mut steps = span.max(0.0).ceil() as usize;
    while steps > 0 && step_time(start_time, step_size, steps - 1) >= end {
        steps -= 1;
    }
    while step_time(start_time, step_size, steps) < end {
        steps += 1;
    }

    (steps <= MAX_STEPS).then_some(steps)
}
