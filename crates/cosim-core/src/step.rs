//! Pluggable per-step computation.
//!
//! The lifecycle, variable access, state codec and logging are the same for
//! every slave; only the [`StepFunction`] differs. It owns the variable table,
//! advances the store by one communication step and reports its analytic
//! Jacobian for directional derivatives.

use crate::{
    error::SlaveError,
    variables::{ValueReference, VariableSpec, VariableStore},
};

/// Arguments of one communication step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    /// Communication point at the start of the step
    pub current_time: f64,
    /// Length of the step
    pub step_size: f64,
    /// Orchestrator promises not to roll back before `current_time`
    pub no_set_prior_state: bool,
}

impl StepContext {
    /// Check the step arguments.
    ///
    /// # Errors
    ///
    /// - `SlaveError::InvalidStep` if the time is not finite or the step size
    ///   is negative or not finite
    pub fn validate(&self) -> Result<(), SlaveError> {
        let valid = self.current_time.is_finite()
            && self.step_size.is_finite()
            && self.step_size >= 0.0;

        if valid {
            Ok(())
        } else {
            Err(SlaveError::InvalidStep {
                current_time: self.current_time,
                step_size: self.step_size,
            })
        }
    }
}

/// Computation performed by a slave on every `do_step`.
///
/// # Contract
///
/// - `step` reads parameters and inputs from the store and writes outputs
///   through [`VariableStore::assign`]. It must be a pure function of the
///   store contents and the context, so restoring a snapshot and stepping
///   again reproduces the same outputs.
/// - `partial_derivative` is the analytic Jacobian of `step`. It must be
///   re-derived whenever `step` changes.
pub trait StepFunction {
    /// Variable table, in state-codec order.
    fn variables(&self) -> &'static [VariableSpec];

    /// Advance the store by one communication step.
    fn step(&self, store: &mut VariableStore, context: &StepContext) -> Result<(), SlaveError>;

    /// ∂unknown/∂known at the current operating point.
    ///
    /// Both references are known to be in the table.
    fn partial_derivative(
        &self,
        store: &VariableStore,
        unknown: ValueReference,
        known: ValueReference,
    ) -> f64;
}
