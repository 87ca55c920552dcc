//! Invariant checking for scenario traces.
//!
//! Invariants are properties every run must satisfy, whatever its inputs,
//! step size or checkpoint. A [`Trace`] is checked against every registered
//! [`Invariant`] and all violations are reported together.
//!
//! # Usage
//!
//! ```ignore
//! let trace = Scenario::new(config)?.run()?;
//! InvariantRegistry::standard().check_all(&trace)?;
//! ```

use cosim_core::{Phase, serialized_size};

use crate::scenario::Trace;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property checked against a whole trace.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against `trace`.
    fn check(&self, trace: &Trace) -> InvariantResult;
}

/// Output equals the input of the same step, bit for bit.
pub struct OutputTracksInput;

impl Invariant for OutputTracksInput {
    fn name(&self) -> &'static str {
        "output_tracks_input"
    }

    fn check(&self, trace: &Trace) -> InvariantResult {
        let replayed = trace.replay.iter().flat_map(|replay| &replay.steps);
        for step in trace.steps.iter().chain(replayed) {
            if step.output.to_bits() != step.input.to_bits() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "step {}: input {} but output {}",
                        step.index, step.input, step.output
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Communication points advance by exactly one step size.
pub struct TimeAdvancesByStep;

impl Invariant for TimeAdvancesByStep {
    fn name(&self) -> &'static str {
        "time_advances_by_step"
    }

    fn check(&self, trace: &Trace) -> InvariantResult {
        let tolerance = trace.step_size * 1e-9;
        for window in trace.steps.windows(2) {
            let delta = window[1].time - window[0].time;
            if (delta - trace.step_size).abs() > tolerance {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "step {} → {}: advanced {delta}, expected {}",
                        window[0].index, window[1].index, trace.step_size
                    ),
                });
            }
        }
        Ok(())
    }
}

/// The parameter never changes during stepping.
pub struct ParameterStable;

impl Invariant for ParameterStable {
    fn name(&self) -> &'static str {
        "parameter_stable"
    }

    fn check(&self, trace: &Trace) -> InvariantResult {
        let Some(first) = trace.steps.first() else {
            return Ok(());
        };
        for step in &trace.steps {
            if step.test_param.to_bits() != first.test_param.to_bits() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "step {}: test_param {} differs from initial {}",
                        step.index, step.test_param, first.test_param
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Serialized state always has the fixed size for three variables.
pub struct StateSizeFixed;

impl Invariant for StateSizeFixed {
    fn name(&self) -> &'static str {
        "state_size_fixed"
    }

    fn check(&self, trace: &Trace) -> InvariantResult {
        let expected = serialized_size(3);
        match trace.steps.iter().find(|step| step.state_size != expected) {
            Some(step) => Err(Violation {
                invariant: self.name(),
                message: format!(
                    "step {}: state size {}, expected {expected}",
                    step.index, step.state_size
                ),
            }),
            None => Ok(()),
        }
    }
}

/// Replaying after rollback reproduces the original steps exactly.
pub struct ReplayMatchesOriginal;

impl Invariant for ReplayMatchesOriginal {
    fn name(&self) -> &'static str {
        "replay_matches_original"
    }

    fn check(&self, trace: &Trace) -> InvariantResult {
        let Some(replay) = &trace.replay else {
            return Ok(());
        };

        let original = trace.steps.get(replay.from..).unwrap_or_default();
        if original.len() != replay.steps.len() {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "replayed {} steps from {}, original has {}",
                    replay.steps.len(),
                    replay.from,
                    original.len()
                ),
            });
        }

        for (expected, actual) in original.iter().zip(&replay.steps) {
            if expected.output.to_bits() != actual.output.to_bits()
                || expected.time.to_bits() != actual.time.to_bits()
            {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "step {}: original output {} at t = {}, replay {} at t = {}",
                        expected.index, expected.output, expected.time, actual.output, actual.time
                    ),
                });
            }
        }
        Ok(())
    }
}

/// The run ends terminated.
pub struct EndsTerminated;

impl Invariant for EndsTerminated {
    fn name(&self) -> &'static str {
        "ends_terminated"
    }

    fn check(&self, trace: &Trace) -> InvariantResult {
        if trace.final_phase == Phase::Terminated {
            Ok(())
        } else {
            Err(Violation {
                invariant: self.name(),
                message: format!("final phase {}", trace.final_phase),
            })
        }
    }
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Every invariant in this module.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(OutputTracksInput);
        registry.add(TimeAdvancesByStep);
        registry.add(ParameterStable);
        registry.add(StateSizeFixed);
        registry.add(ReplayMatchesOriginal);
        registry.add(EndsTerminated);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against `trace`.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, trace: &Trace) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(trace).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Number of registered invariants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
