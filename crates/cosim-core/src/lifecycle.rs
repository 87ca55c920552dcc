//! Slave lifecycle state machine.
//!
//! Tracks which phase an instance is in and decides which operations are
//! legal there. The machine owns no variable data; [`crate::Instance`]
//! consults it before touching the store.
//!
//! # State Machine
//!
//! ```text
//!  instantiate  ┌──────────────┐  enter_initialization  ┌──────────────┐
//! ────────────> │ Instantiated │───────────────────────>│ Initializing │
//!               └──────────────┘                        └──────────────┘
//!                   ^      ^                                    │
//!                   │      │ reset                              │ exit_initialization
//!                   │      │                                    ↓
//!                   │  ┌────────────┐       terminate       ┌──────────┐
//!                   │  │ Terminated │<──────────────────────│ Runnable │
//!                   │  └────────────┘                       └──────────┘
//!                   │         reset                              │
//!                   └────────────────────────────────────────────┘
//! ```
//!
//! Freeing is legal from every phase and is modelled by dropping the
//! instance, so there is no explicit "freed" phase.

use std::fmt;

use crate::error::SlaveError;

/// Lifecycle phase of a live instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Created, experiment may be configured
    Instantiated,
    /// Between enter and exit of initialization mode
    Initializing,
    /// Stepping is allowed
    Runnable,
    /// Terminated, only reset or free remain
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Instantiated => "instantiated",
            Self::Initializing => "initializing",
            Self::Runnable => "runnable",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Operations whose legality depends on the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `setup_experiment`
    SetupExperiment,
    /// `set_debug_logging`
    SetDebugLogging,
    /// Any typed `get_*` variable access
    GetVariables,
    /// Any typed `set_*` variable access
    SetVariables,
    /// `enter_initialization_mode`
    EnterInitialization,
    /// `exit_initialization_mode`
    ExitInitialization,
    /// `do_step`
    DoStep,
    /// `cancel_step`
    CancelStep,
    /// `get_state`
    GetState,
    /// `set_state`
    SetState,
    /// `serialized_size` and `serialize_into`
    SerializeState,
    /// `deserialize`
    DeserializeState,
    /// `directional_derivative`
    DirectionalDerivative,
    /// `get_output_derivatives`
    OutputDerivatives,
    /// `set_input_derivatives`
    InputDerivatives,
    /// `get_status` and the typed status queries
    StatusQuery,
    /// `reset`
    Reset,
    /// `terminate`
    Terminate,
}

impl Operation {
    /// FMI function name, used in errors and log lines.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetupExperiment => "fmi2SetupExperiment",
            Self::SetDebugLogging => "fmi2SetDebugLogging",
            Self::GetVariables => "fmi2GetXXX",
            Self::SetVariables => "fmi2SetXXX",
            Self::EnterInitialization => "fmi2EnterInitializationMode",
            Self::ExitInitialization => "fmi2ExitInitializationMode",
            Self::DoStep => "fmi2DoStep",
            Self::CancelStep => "fmi2CancelStep",
            Self::GetState => "fmi2GetFMUstate",
            Self::SetState => "fmi2SetFMUstate",
            Self::SerializeState => "fmi2SerializeFMUstate",
            Self::DeserializeState => "fmi2DeSerializeFMUstate",
            Self::DirectionalDerivative => "fmi2GetDirectionalDerivative",
            Self::OutputDerivatives => "fmi2GetRealOutputDerivatives",
            Self::InputDerivatives => "fmi2SetRealInputDerivatives",
            Self::StatusQuery => "fmi2GetXXXStatus",
            Self::Reset => "fmi2Reset",
            Self::Terminate => "fmi2Terminate",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Phase {
    /// Whether `operation` may be called in this phase.
    ///
    /// State snapshots (`get_state`, `set_state`, serialize, deserialize) are
    /// only permitted in [`Phase::Runnable`]. An orchestrator that checkpoints
    /// before initialization or after termination is refused under
    /// [`PhasePolicy::Strict`] and needs [`PhasePolicy::Permissive`], which
    /// takes a snapshot at any point after creation.
    #[must_use]
    pub fn permits(self, operation: Operation) -> bool {
        use Operation as Op;

        if operation == Op::SetDebugLogging {
            return true;
        }

        match self {
            Self::Instantiated => matches!(
                operation,
                Op::SetupExperiment | Op::GetVariables | Op::SetVariables | Op::EnterInitialization
            ),
            Self::Initializing => matches!(
                operation,
                Op::GetVariables
                    | Op::SetVariables
                    | Op::DirectionalDerivative
                    | Op::ExitInitialization
            ),
            Self::Runnable => !matches!(
                operation,
                Op::SetupExperiment | Op::EnterInitialization | Op::ExitInitialization
            ),
            Self::Terminated => operation == Op::Reset,
        }
    }
}

/// How strictly the lifecycle is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhasePolicy {
    /// Out-of-phase calls fail with [`SlaveError::InvalidPhase`]
    #[default]
    Strict,
    /// Every call is accepted in every phase; transitions still move the
    /// phase. Matches slaves that never validated call order.
    Permissive,
}

impl PhasePolicy {
    /// Parse `strict` or `permissive` (case-insensitive).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("strict") {
            Some(Self::Strict)
        } else if value.eq_ignore_ascii_case("permissive") {
            Some(Self::Permissive)
        } else {
            None
        }
    }
}

/// Lifecycle state machine for one instance.
///
/// Pure bookkeeping: no I/O and no variable access. Transition methods check
/// legality first and leave the phase unchanged on error.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    phase: Phase,
    policy: PhasePolicy,
}

impl Lifecycle {
    /// Create a machine in [`Phase::Instantiated`].
    pub fn new(policy: PhasePolicy) -> Self {
        Self { phase: Phase::Instantiated, policy }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Enforcement policy.
    #[must_use]
    pub fn policy(&self) -> PhasePolicy {
        self.policy
    }

    /// Check that `operation` is legal now.
    ///
    /// # Errors
    ///
    /// - `SlaveError::InvalidPhase` under [`PhasePolicy::Strict`] when the
    ///   current phase does not permit `operation`
    pub fn guard(&self, operation: Operation) -> Result<(), SlaveError> {
        if self.policy == PhasePolicy::Permissive || self.phase.permits(operation) {
            Ok(())
        } else {
            Err(SlaveError::InvalidPhase { phase: self.phase, operation })
        }
    }

    /// Instantiated -> Initializing.
    pub fn enter_initialization(&mut self) -> Result<(), SlaveError> {
        self.transition(Operation::EnterInitialization, Phase::Initializing)
    }

    /// Initializing -> Runnable.
    pub fn exit_initialization(&mut self) -> Result<(), SlaveError> {
        self.transition(Operation::ExitInitialization, Phase::Runnable)
    }

    /// Runnable -> Terminated.
    pub fn terminate(&mut self) -> Result<(), SlaveError> {
        self.transition(Operation::Terminate, Phase::Terminated)
    }

    /// Runnable or Terminated -> Instantiated.
    pub fn reset(&mut self) -> Result<(), SlaveError> {
        self.transition(Operation::Reset, Phase::Instantiated)
    }

    fn transition(&mut self, operation: Operation, next: Phase) -> Result<(), SlaveError> {
        self.guard(operation)?;

        tracing::debug!(from = %self.phase, to = %next, %operation, "lifecycle transition");
        self.phase = next;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle_in_order() {
        let mut lifecycle = Lifecycle::new(PhasePolicy::Strict);
        assert_eq!(lifecycle.policy(), PhasePolicy::Strict);
        assert_eq!(lifecycle.phase(), Phase::Instantiated);

        lifecycle.enter_initialization().unwrap();
        assert_eq!(lifecycle.phase(), Phase::Initializing);

        lifecycle.exit_initialization().unwrap();
        assert_eq!(lifecycle.phase(), Phase::Runnable);

        lifecycle.terminate().unwrap();
        assert_eq!(lifecycle.phase(), Phase::Terminated);

        lifecycle.reset().unwrap();
        assert_eq!(lifecycle.phase(), Phase::Instantiated);
    }

    #[test]
    fn strict_rejects_skipping_initialization() {
        let mut lifecycle = Lifecycle::new(PhasePolicy::Strict);

        let result = lifecycle.exit_initialization();
        assert_eq!(
            result,
            Err(SlaveError::InvalidPhase {
                phase: Phase::Instantiated,
                operation: Operation::ExitInitialization,
            })
        );
        assert_eq!(lifecycle.phase(), Phase::Instantiated);

        assert!(lifecycle.guard(Operation::DoStep).is_err());
        assert!(lifecycle.terminate().is_err());
    }

    #[test]
    fn strict_rejects_reentering_initialization() {
        let mut lifecycle = Lifecycle::new(PhasePolicy::Strict);
        lifecycle.enter_initialization().unwrap();

        assert!(lifecycle.enter_initialization().is_err());
        assert_eq!(lifecycle.phase(), Phase::Initializing);
    }

    #[test]
    fn permissive_accepts_any_order() {
        let mut lifecycle = Lifecycle::new(PhasePolicy::Permissive);
        assert_eq!(lifecycle.policy(), PhasePolicy::Permissive);

        lifecycle.guard(Operation::DoStep).unwrap();
        lifecycle.terminate().unwrap();
        assert_eq!(lifecycle.phase(), Phase::Terminated);

        lifecycle.exit_initialization().unwrap();
        assert_eq!(lifecycle.phase(), Phase::Runnable);
    }

    #[test]
    fn terminated_permits_only_reset_and_logging() {
        let phase = Phase::Terminated;

        assert!(phase.permits(Operation::Reset));
        assert!(phase.permits(Operation::SetDebugLogging));
        assert!(!phase.permits(Operation::GetVariables));
        assert!(!phase.permits(Operation::DoStep));
        assert!(!phase.permits(Operation::GetState));
    }

    #[test]
    fn runnable_permits_state_operations() {
        let phase = Phase::Runnable;

        for op in [
            Operation::GetState,
            Operation::SetState,
            Operation::SerializeState,
            Operation::DeserializeState,
            Operation::DoStep,
            Operation::CancelStep,
            Operation::Reset,
            Operation::Terminate,
        ] {
            assert!(phase.permits(op), "{op} should be legal while runnable");
        }

        assert!(!phase.permits(Operation::SetupExperiment));
        assert!(!phase.permits(Operation::EnterInitialization));
    }

    #[test]
    fn policy_parses_case_insensitive() {
        assert_eq!(PhasePolicy::parse("Strict"), Some(PhasePolicy::Strict));
        assert_eq!(PhasePolicy::parse("PERMISSIVE"), Some(PhasePolicy::Permissive));
        assert_eq!(PhasePolicy::parse("lenient"), None);
    }
}
