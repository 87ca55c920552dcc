//! Slave instance: lifecycle + variable store + step function + log sink.
//!
//! [`Instance`] is the Rust form of one `fmi2Component`. Every method maps to
//! one FMI call, checks the lifecycle first and reports failures through the
//! injected [`LogSink`] before returning them.

use crate::{
    codec::{StateSnapshot, serialized_size},
    config::{Experiment, InstanceConfig, InstanceInfo, InterfaceKind},
    error::{ReferenceFault, SlaveError},
    identity::IdentityBlock,
    lifecycle::{Lifecycle, Operation, Phase},
    log::{CATEGORY_LOG, LogSink, TracingSink},
    status::{Status, StatusKind},
    step::{StepContext, StepFunction},
    variables::{ValueReference, VariableKind, VariableStore},
};

/// One co-simulation slave instance.
///
/// # Invariants
///
/// - The store layout always matches `model.variables()`.
/// - A failed call leaves the phase unchanged, and a failed batch leaves
///   the store unchanged.
pub struct Instance<F: StepFunction = IdentityBlock, S: LogSink = TracingSink> {
    info: InstanceInfo,
    logging_on: bool,
    categories: Vec<String>,
    lifecycle: Lifecycle,
    experiment: Option<Experiment>,
    store: VariableStore,
    model: F,
    sink: S,
}

impl<S: LogSink> Instance<IdentityBlock, S> {
    /// Identity block instance.
    pub fn identity(
        info: InstanceInfo,
        config: InstanceConfig,
        sink: S,
    ) -> Result<Self, SlaveError> {
        Self::new(info, config, IdentityBlock, sink)
    }
}

impl<F: StepFunction, S: LogSink> Instance<F, S> {
    /// Instantiate a slave in [`Phase::Instantiated`] with every variable at
    /// its default.
    ///
    /// # Errors
    ///
    /// - `SlaveError::UnsupportedInterface` unless `info.kind` is
    ///   [`InterfaceKind::CoSimulation`]
    pub fn new(
        info: InstanceInfo,
        config: InstanceConfig,
        model: F,
        sink: S,
    ) -> Result<Self, SlaveError> {
        if info.kind != InterfaceKind::CoSimulation {
            let err = SlaveError::UnsupportedInterface { kind: info.kind as i32 };
            sink.log(&info.name, err.status(), err.category(), &err.to_string());
            return Err(err);
        }

        let mut store = VariableStore::new(model.variables());
        store.reset();

        let instance = Self {
            logging_on: info.logging_on,
            info,
            categories: Vec::new(),
            lifecycle: Lifecycle::new(config.phase_policy),
            experiment: None,
            store,
            model,
            sink,
        };
        tracing::debug!(
            name = %instance.info.name,
            guid = %instance.info.guid,
            resource_location = ?instance.info.resource_location,
            visible = instance.info.visible,
            "instantiated"
        );
        instance.trace("fmi2Instantiate called.");

        Ok(instance)
    }

    /// Instance name given at instantiation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Instantiation arguments.
    #[must_use]
    pub fn info(&self) -> &InstanceInfo {
        &self.info
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    /// Whether debug logging is on.
    #[must_use]
    pub fn is_logging(&self) -> bool {
        self.logging_on
    }

    /// Categories passed to the last `set_debug_logging`. Stored, not used
    /// for filtering.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Experiment recorded by `setup_experiment`. `None` before setup and
    /// after reset.
    #[must_use]
    pub fn experiment(&self) -> Option<&Experiment> {
        self.experiment.as_ref()
    }

    /// Variable store.
    #[must_use]
    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    /// Step function.
    #[must_use]
    pub fn model(&self) -> &F {
        &self.model
    }

    /// Log sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Switch debug logging and record the requested categories.
    pub fn set_debug_logging(
        &mut self,
        logging_on: bool,
        categories: Vec<String>,
    ) -> Result<(), SlaveError> {
        self.check(self.lifecycle.guard(Operation::SetDebugLogging))?;

        self.logging_on = logging_on;
        self.categories = categories;
        self.trace("fmi2SetDebugLogging called.");

        Ok(())
    }

    /// Record tolerance and time interval of the experiment.
    pub fn setup_experiment(&mut self, experiment: Experiment) -> Result<(), SlaveError> {
        self.check(self.lifecycle.guard(Operation::SetupExperiment))?;
        self.check(experiment.validate())?;

        self.experiment = Some(experiment);
        self.trace("fmi2SetupExperiment called.");

        Ok(())
    }

    /// Instantiated -> Initializing.
    pub fn enter_initialization_mode(&mut self) -> Result<(), SlaveError> {
        let result = self.lifecycle.enter_initialization();
        self.check(result)?;
        self.trace("fmi2EnterInitializationMode called.");
        Ok(())
    }

    /// Initializing -> Runnable.
    pub fn exit_initialization_mode(&mut self) -> Result<(), SlaveError> {
        let result = self.lifecycle.exit_initialization();
        self.check(result)?;
        self.trace("fmi2ExitInitializationMode called.");
        Ok(())
    }

    /// Runnable -> Terminated.
    pub fn terminate(&mut self) -> Result<(), SlaveError> {
        let result = self.lifecycle.terminate();
        self.check(result)?;
        self.trace("fmi2Terminate called.");
        Ok(())
    }

    /// Back to [`Phase::Instantiated`] with every variable at its default and
    /// no experiment recorded.
    pub fn reset(&mut self) -> Result<(), SlaveError> {
        let result = self.lifecycle.reset();
        self.check(result)?;
        self.trace("fmi2Reset called.");

        self.store.reset();
        self.experiment = None;

        Ok(())
    }

    /// Read real variables.
    pub fn get_real(&self, vrs: &[ValueReference], out: &mut [f64]) -> Result<(), SlaveError> {
        self.check(self.lifecycle.guard(Operation::GetVariables))?;
        self.check(self.store.get(vrs, out))
    }

    /// Write real variables. All-or-nothing.
    pub fn set_real(&mut self, vrs: &[ValueReference], values: &[f64]) -> Result<(), SlaveError> {
        self.check(self.lifecycle.guard(Operation::SetVariables))?;
        let result = self.store.set(vrs, values);
        self.check(result)
    }

    /// Integer variables are not supported.
    pub fn get_integer(&self, _vrs: &[ValueReference], _out: &mut [i32]) -> Result<(), SlaveError> {
        self.unsupported(VariableKind::Integer)
    }

    /// Integer variables are not supported.
    pub fn set_integer(
        &mut self,
        _vrs: &[ValueReference],
        _values: &[i32],
    ) -> Result<(), SlaveError> {
        self.unsupported(VariableKind::Integer)
    }

    /// Boolean variables are not supported.
    pub fn get_boolean(
        &self,
        _vrs: &[ValueReference],
        _out: &mut [bool],
    ) -> Result<(), SlaveError> {
        self.unsupported(VariableKind::Boolean)
    }

    /// Boolean variables are not supported.
    pub fn set_boolean(
        &mut self,
        _vrs: &[ValueReference],
        _values: &[bool],
    ) -> Result<(), SlaveError> {
        self.unsupported(VariableKind::Boolean)
    }

    /// String variables are not supported.
    pub fn get_string(
        &self,
        _vrs: &[ValueReference],
        _out: &mut [String],
    ) -> Result<(), SlaveError> {
        self.unsupported(VariableKind::String)
    }

    /// String variables are not supported.
    pub fn set_string(
        &mut self,
        _vrs: &[ValueReference],
        _values: &[&str],
    ) -> Result<(), SlaveError> {
        self.unsupported(VariableKind::String)
    }

    /// Advance by one communication step.
    pub fn do_step(
        &mut self,
        current_time: f64,
        step_size: f64,
        no_set_prior_state: bool,
    ) -> Result<(), SlaveError> {
        self.check(self.lifecycle.guard(Operation::DoStep))?;

        let context = StepContext { current_time, step_size, no_set_prior_state };
        self.check(context.validate())?;

        let result = self.model.step(&mut self.store, &context);
        self.check(result)?;

        if self.logging_on {
            let values = self
                .store
                .table()
                .iter()
                .zip(self.store.values())
                .map(|(spec, value)| format!("{} = {value:.2}", spec.name))
                .collect::<Vec<_>>()
                .join(", ");
            self.trace(&format!("fmi2DoStep at time {current_time:.2}: {values}"));
        }

        Ok(())
    }

    /// Nothing to cancel: steps complete synchronously.
    pub fn cancel_step(&mut self) -> Result<(), SlaveError> {
        self.check(self.lifecycle.guard(Operation::CancelStep))?;
        self.trace("fmi2CancelStep called (stub).");
        Ok(())
    }

    /// Snapshot of every variable.
    pub fn get_state(&self) -> Result<StateSnapshot, SlaveError> {
        self.check(self.lifecycle.guard(Operation::GetState))?;

        let snapshot = StateSnapshot::capture(&self.store);
        self.trace("fmi2GetFMUstate called.");

        Ok(snapshot)
    }

    /// Overwrite every variable from `snapshot`.
    pub fn set_state(&mut self, snapshot: &StateSnapshot) -> Result<(), SlaveError> {
        self.check(self.lifecycle.guard(Operation::SetState))?;

        let result = snapshot.restore_into(&mut self.store);
        self.check(result)?;
        self.trace("fmi2SetFMUstate called.");

        Ok(())
    }

    /// Size of the flat state. Depends on the variable table only.
    pub fn serialized_size(&self) -> usize {
        let size = serialized_size(self.store.len());
        self.trace(&format!("fmi2SerializedFMUstateSize called. Size: {size}"));
        size
    }

    /// Encode the current variables into `buf`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// - `SlaveError::BufferTooSmall` (a [`Status::Discard`]) if `buf` is
    ///   shorter than [`Self::serialized_size`]
    pub fn serialize_into(&self, buf: &mut [u8]) -> Result<usize, SlaveError> {
        self.check(self.lifecycle.guard(Operation::SerializeState))?;

        let written = self.check(StateSnapshot::capture(&self.store).encode_into(buf))?;
        self.trace("fmi2SerializeFMUstate called.");

        Ok(written)
    }

    /// Decode a flat state, apply it to this instance and return it as a
    /// snapshot. Bytes past the fixed layout are ignored.
    pub fn deserialize(&mut self, bytes: &[u8]) -> Result<StateSnapshot, SlaveError> {
        self.check(self.lifecycle.guard(Operation::DeserializeState))?;

        let snapshot = self.check(StateSnapshot::decode(bytes, self.store.len()))?;
        let result = snapshot.restore_into(&mut self.store);
        self.check(result)?;
        self.trace("fmi2DeSerializeFMUstate called.");

        Ok(snapshot)
    }

    /// Directional derivative from the step function's analytic Jacobian.
    ///
    /// `out[i] = Σ_j ∂unknown[i]/∂known[j] · known_deltas[j]`.
    pub fn directional_derivative(
        &self,
        unknown: &[ValueReference],
        known: &[ValueReference],
        known_deltas: &[f64],
        out: &mut [f64],
    ) -> Result<(), SlaveError> {
        self.check(self.lifecycle.guard(Operation::DirectionalDerivative))?;
        self.check(lengths_match(known.len(), known_deltas.len()))?;
        self.check(lengths_match(unknown.len(), out.len()))?;
        for &vr in unknown.iter().chain(known) {
            self.check(self.known_reference(vr))?;
        }

        self.trace("fmi2GetDirectionalDerivative called.");

        for (slot, &u) in out.iter_mut().zip(unknown) {
            *slot = known.iter().zip(known_deltas).fold(0.0, |acc, (&k, &delta)| {
                acc + self.model.partial_derivative(&self.store, u, k) * delta
            });
        }

        Ok(())
    }

    /// Stub: there are no higher-order output derivatives, `out` is zeroed.
    pub fn get_output_derivatives(
        &self,
        vrs: &[ValueReference],
        orders: &[i32],
        out: &mut [f64],
    ) -> Result<(), SlaveError> {
        self.check(self.lifecycle.guard(Operation::OutputDerivatives))?;
        self.check(lengths_match(vrs.len(), orders.len()))?;
        self.check(lengths_match(vrs.len(), out.len()))?;

        self.trace("fmi2GetRealOutputDerivatives called (stub).");
        out.fill(0.0);

        Ok(())
    }

    /// Stub: input derivatives are accepted and ignored.
    pub fn set_input_derivatives(
        &mut self,
        vrs: &[ValueReference],
        orders: &[i32],
        values: &[f64],
    ) -> Result<(), SlaveError> {
        self.check(self.lifecycle.guard(Operation::InputDerivatives))?;
        self.check(lengths_match(vrs.len(), orders.len()))?;
        self.check(lengths_match(vrs.len(), values.len()))?;

        self.trace("fmi2SetRealInputDerivatives called (stub).");

        Ok(())
    }

    /// Step status. Always [`Status::Ok`]: steps never stay pending.
    pub fn get_status(&self, _kind: StatusKind) -> Result<Status, SlaveError> {
        self.check(self.lifecycle.guard(Operation::StatusQuery))?;
        self.trace("fmi2GetStatus called.");
        Ok(Status::Ok)
    }

    /// Real status. Always `0.0`.
    pub fn get_real_status(&self, kind: StatusKind) -> Result<f64, SlaveError> {
        self.check(self.lifecycle.guard(Operation::StatusQuery))?;
        self.trace(&format!("fmi2GetRealStatus called. Kind: {}", kind as i32));
        Ok(0.0)
    }

    /// Integer status. Always `0`.
    pub fn get_integer_status(&self, kind: StatusKind) -> Result<i32, SlaveError> {
        self.check(self.lifecycle.guard(Operation::StatusQuery))?;
        self.trace(&format!("fmi2GetIntegerStatus called. Kind: {}", kind as i32));
        Ok(0)
    }

    /// Boolean status. Always `false`.
    pub fn get_boolean_status(&self, kind: StatusKind) -> Result<bool, SlaveError> {
        self.check(self.lifecycle.guard(Operation::StatusQuery))?;
        self.trace(&format!("fmi2GetBooleanStatus called. Kind: {}", kind as i32));
        Ok(false)
    }

    /// String status. Always empty.
    pub fn get_string_status(&self, kind: StatusKind) -> Result<&'static str, SlaveError> {
        self.check(self.lifecycle.guard(Operation::StatusQuery))?;
        self.trace(&format!("fmi2GetStringStatus called. Kind: {}", kind as i32));
        Ok("")
    }

    /// Log a per-call message when debug logging is on.
    pub fn trace(&self, message: &str) {
        if self.logging_on {
            self.sink.log(&self.info.name, Status::Ok, CATEGORY_LOG, message);
        }
    }

    /// Pass `result` through, logging the error if there is one.
    ///
    /// Errors are reported regardless of the debug logging flag.
    fn check<T>(&self, result: Result<T, SlaveError>) -> Result<T, SlaveError> {
        if let Err(err) = &result {
            tracing::debug!(instance = %self.info.name, error = %err, "slave call failed");
            self.sink.log(&self.info.name, err.status(), err.category(), &err.to_string());
        }
        result
    }

    fn unsupported<T>(&self, kind: VariableKind) -> Result<T, SlaveError> {
        self.check(Err(SlaveError::NotSupported { kind }))
    }

    fn known_reference(&self, vr: ValueReference) -> Result<(), SlaveError> {
        match self.store.spec(vr) {
            Some(_) => Ok(()),
            None => Err(SlaveError::InvalidReference { vr, fault: ReferenceFault::Unknown }),
        }
    }
}

impl<F: StepFunction, S: LogSink> Drop for Instance<F, S> {
    fn drop(&mut self) {
        self.trace("fmi2FreeInstance called.");
    }
}

impl<F: StepFunction, S: LogSink> std::fmt::Debug for Instance<F, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("info", &self.info)
            .field("phase", &self.lifecycle.phase())
            .field("logging_on", &self.logging_on)
            .field("values", &self.store.values())
            .finish_non_exhaustive()
    }
}

fn lengths_match(expected: usize, actual: usize) -> Result<(), SlaveError> {
    if expected == actual { Ok(()) } else { Err(SlaveError::LengthMismatch { expected, actual }) }
}
