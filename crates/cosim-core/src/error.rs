//! Error types for slave operations.
//!
//! Every fallible operation returns [`SlaveError`]. The C surface never sees
//! these directly: it collapses them onto the [`Status`] scale through
//! [`SlaveError::status`].

use thiserror::Error;

use crate::{
    lifecycle::{Operation, Phase},
    status::Status,
    variables::{ValueReference, VariableKind},
};

/// Why a value reference was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceFault {
    /// Not part of the variable table
    Unknown,
    /// Computed by the step function, cannot be set from outside
    NotSettable,
}

/// Errors that can occur while driving a slave instance.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlaveError {
    /// Value reference is unknown or may not be written
    #[error("invalid value reference {vr}: {fault:?}")]
    InvalidReference {
        /// Offending value reference
        vr: ValueReference,
        /// Reason for rejection
        fault: ReferenceFault,
    },

    /// Variable kind has no storage in this slave
    #[error("{kind} variables are not supported")]
    NotSupported {
        /// Requested variable kind
        kind: VariableKind,
    },

    /// Parallel argument arrays differ in length
    #[error("length mismatch: expected {expected} values, got {actual}")]
    LengthMismatch {
        /// Length implied by the reference array
        expected: usize,
        /// Length actually supplied
        actual: usize,
    },

    /// Serialized state is shorter than the fixed layout
    #[error("state truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Required size in bytes
        expected: usize,
        /// Supplied size in bytes
        actual: usize,
    },

    /// Caller buffer cannot hold the serialized state
    #[error("buffer too small: {required} bytes required, capacity {capacity}")]
    BufferTooSmall {
        /// Required size in bytes
        required: usize,
        /// Capacity of the supplied buffer
        capacity: usize,
    },

    /// Operation is not legal in the current lifecycle phase
    #[error("invalid phase: cannot call {operation} while {phase}")]
    InvalidPhase {
        /// Phase when the call was made
        phase: Phase,
        /// Operation that was attempted
        operation: Operation,
    },

    /// Communication point or step size is not usable
    #[error("invalid step: t = {current_time}, h = {step_size}")]
    InvalidStep {
        /// Requested communication point
        current_time: f64,
        /// Requested step size
        step_size: f64,
    },

    /// Experiment stop time precedes its start time
    #[error("invalid experiment: stop time {stop_time} before start time {start_time}")]
    InvalidExperiment {
        /// Experiment start time
        start_time: f64,
        /// Experiment stop time
        stop_time: f64,
    },

    /// Requested interface type is not implemented
    #[error("unsupported interface type: {kind}")]
    UnsupportedInterface {
        /// Raw `fmi2Type` requested by the orchestrator
        kind: i32,
    },
}

impl SlaveError {
    /// Status reported to the orchestrator for this error.
    ///
    /// Only an undersized serialization buffer is a [`Status::Discard`]; the
    /// instance stays usable and the caller can retry with more space.
    /// Everything else is [`Status::Error`]. No error is fatal.
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::BufferTooSmall { .. } => Status::Discard,
            Self::InvalidReference { .. }
            | Self::NotSupported { .. }
            | Self::LengthMismatch { .. }
            | Self::Truncated { .. }
            | Self::InvalidPhase { .. }
            | Self::InvalidStep { .. }
            | Self::InvalidExperiment { .. }
            | Self::UnsupportedInterface { .. } => Status::Error,
        }
    }

    /// FMI log category matching [`SlaveError::status`].
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self.status() {
            Status::Discard => "logStatusDiscard",
            _ => "logStatusError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undersized_buffer_is_discard() {
        let err = SlaveError::BufferTooSmall { required: 24, capacity: 8 };
        assert_eq!(err.status(), Status::Discard);
        assert_eq!(err.category(), "logStatusDiscard");
    }

    #[test]
    fn everything_else_is_error() {
        let errors = [
            SlaveError::InvalidReference { vr: 7, fault: ReferenceFault::Unknown },
            SlaveError::NotSupported { kind: VariableKind::Integer },
            SlaveError::LengthMismatch { expected: 2, actual: 1 },
            SlaveError::Truncated { expected: 24, actual: 16 },
            SlaveError::InvalidPhase { phase: Phase::Instantiated, operation: Operation::DoStep },
            SlaveError::InvalidStep { current_time: 0.0, step_size: -1.0 },
            SlaveError::InvalidExperiment { start_time: 1.0, stop_time: 0.0 },
            SlaveError::UnsupportedInterface { kind: 0 },
        ];

        for err in errors {
            assert_eq!(err.status(), Status::Error, "{err}");
            assert_eq!(err.category(), "logStatusError");
        }
    }

    #[test]
    fn messages_name_the_offender() {
        let err =
            SlaveError::InvalidPhase { phase: Phase::Terminated, operation: Operation::DoStep };
        assert_eq!(err.to_string(), "invalid phase: cannot call fmi2DoStep while terminated");

        let err = SlaveError::InvalidReference { vr: 2, fault: ReferenceFault::NotSettable };
        assert_eq!(err.to_string(), "invalid value reference 2: NotSettable");
    }
}
