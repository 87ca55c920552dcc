//! Errors of the C surface.

use cosim_core::{SlaveError, Status};
use thiserror::Error;

/// Failure of one exported call.
///
/// Wraps [`SlaveError`] and adds what can only go wrong at the pointer level.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    /// Rejected by the instance (already logged by it)
    #[error(transparent)]
    Slave(#[from] SlaveError),

    /// Required pointer argument was null
    #[error("null pointer argument: {argument}")]
    NullArgument {
        /// Parameter name in the FMI signature
        argument: &'static str,
    },

    /// `fmi2FMUstate` handle not issued by this library or already freed
    #[error("unknown FMU state handle")]
    UnknownState,

    /// Raw `fmi2StatusKind` outside the defined range
    #[error("unknown status kind: {kind}")]
    UnknownStatusKind {
        /// Raw value received
        kind: i32,
    },
}

impl CallError {
    /// Status returned to the orchestrator.
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::Slave(err) => err.status(),
            Self::NullArgument { .. } | Self::UnknownState | Self::UnknownStatusKind { .. } => {
                Status::Error
            },
        }
    }

    /// Whether the instance has not seen this error yet and it still needs
    /// logging.
    #[must_use]
    pub fn needs_logging(&self) -> bool {
        !matches!(self, Self::Slave(_))
    }
}
