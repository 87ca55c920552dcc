//! FMI 2.0 C type aliases and callback structures.
//!
//! Layouts follow `fmi2TypesPlatform.h` and `fmi2FunctionTypes.h` for the
//! default platform.

use std::ffi::{c_char, c_int, c_void};

/// `fmi2Component`: opaque instance handle.
pub type Fmi2Component = *mut c_void;

/// `fmi2ComponentEnvironment`: orchestrator pointer echoed to callbacks.
pub type Fmi2ComponentEnvironment = *mut c_void;

/// `fmi2FMUstate`: opaque snapshot handle.
pub type Fmi2FmuState = *mut c_void;

/// `fmi2ValueReference`
pub type Fmi2ValueReference = u32;

/// `fmi2Real`
pub type Fmi2Real = f64;

/// `fmi2Integer`
pub type Fmi2Integer = c_int;

/// `fmi2Boolean` (`0` is false, anything else true)
pub type Fmi2Boolean = c_int;

/// `fmi2String`: NUL-terminated, may be null.
pub type Fmi2String = *const c_char;

/// `fmi2Byte`
pub type Fmi2Byte = u8;

/// `fmi2Status`
pub type Fmi2Status = c_int;

/// `fmi2Type`
pub type Fmi2Type = c_int;

/// `fmi2StatusKind`
pub type Fmi2StatusKind = c_int;

/// `fmi2True`
pub const FMI2_TRUE: Fmi2Boolean = 1;

/// `fmi2False`
pub const FMI2_FALSE: Fmi2Boolean = 0;

/// `fmi2CallbackLogger`. The message is a printf format string followed by
/// its arguments.
pub type CallbackLogger = unsafe extern "C" fn(
    environment: Fmi2ComponentEnvironment,
    instance_name: Fmi2String,
    status: Fmi2Status,
    category: Fmi2String,
    message: Fmi2String,
    ...
);

/// `fmi2CallbackAllocateMemory`
pub type CallbackAllocateMemory = unsafe extern "C" fn(count: usize, size: usize) -> *mut c_void;

/// `fmi2CallbackFreeMemory`
pub type CallbackFreeMemory = unsafe extern "C" fn(object: *mut c_void);

/// `fmi2StepFinished`
pub type StepFinished =
    unsafe extern "C" fn(environment: Fmi2ComponentEnvironment, status: Fmi2Status);

/// `fmi2CallbackFunctions`.
///
/// Every pointer may be null. Only the logger is used; memory is managed by
/// Rust and steps finish synchronously.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CallbackFunctions {
    /// Log message sink
    pub logger: Option<CallbackLogger>,
    /// Allocator (unused)
    pub allocate_memory: Option<CallbackAllocateMemory>,
    /// Deallocator (unused)
    pub free_memory: Option<CallbackFreeMemory>,
    /// Asynchronous step completion (unused)
    pub step_finished: Option<StepFinished>,
    /// Passed back as the first logger argument
    pub component_environment: Fmi2ComponentEnvironment,
}

impl CallbackFunctions {
    /// No callbacks at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            logger: None,
            allocate_memory: None,
            free_memory: None,
            step_finished: None,
            component_environment: std::ptr::null_mut(),
        }
    }
}

/// Whether a raw `fmi2Boolean` is true.
#[must_use]
pub fn is_true(value: Fmi2Boolean) -> bool {
    value != FMI2_FALSE
}
