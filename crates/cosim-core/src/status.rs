//! Status scale shared by every slave operation.
//!
//! The numeric values are the FMI 2.0 `fmi2Status` encoding and are what the
//! C surface returns. Variants are ordered by severity, so `status >=
//! Status::Warning` selects everything that belongs on the error stream.

use std::fmt;

/// Outcome severity of a slave operation.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    /// Operation succeeded
    Ok = 0,
    /// Operation succeeded with a caveat
    Warning = 1,
    /// Request could not be honored, instance is intact
    Discard = 2,
    /// Request failed, instance may need to be restored from a snapshot
    Error = 3,
    /// Instance is unusable and must be freed
    Fatal = 4,
    /// Asynchronous operation still running
    Pending = 5,
}

impl Status {
    /// Raw FMI status code.
    #[must_use]
    pub fn to_i32(self) -> i32 {
        self as i32
    }

    /// Parse a raw FMI status code. `None` if out of range.
    #[must_use]
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::Warning),
            2 => Some(Self::Discard),
            3 => Some(Self::Error),
            4 => Some(Self::Fatal),
            5 => Some(Self::Pending),
            _ => None,
        }
    }

    /// Messages at this severity go to the error stream.
    #[must_use]
    pub fn is_problem(self) -> bool {
        self >= Self::Warning
    }

    /// Name used in log lines (`fmi2OK`, `fmi2Warning`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "fmi2OK",
            Self::Warning => "fmi2Warning",
            Self::Discard => "fmi2Discard",
            Self::Error => "fmi2Error",
            Self::Fatal => "fmi2Fatal",
            Self::Pending => "fmi2Pending",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind selector for the status queries.
///
/// Raw values follow `fmi2StatusKind`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// Status of the last `do_step`
    DoStepStatus = 0,
    /// Progress message of a pending step
    PendingStatus = 1,
    /// Communication point of the last completed step
    LastSuccessfulTime = 2,
    /// Whether the slave wants to terminate
    Terminated = 3,
}

impl StatusKind {
    /// Parse a raw `fmi2StatusKind`. `None` if out of range.
    #[must_use]
    pub fn from_i32(kind: i32) -> Option<Self> {
        match kind {
            0 => Some(Self::DoStepStatus),
            1 => Some(Self::PendingStatus),
            2 => Some(Self::LastSuccessfulTime),
            3 => Some(Self::Terminated),
            _ => None,
        }
    }
}
