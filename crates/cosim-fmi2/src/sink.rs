//! Log sink over the orchestrator's `fmi2CallbackLogger`.

use std::ffi::CString;

use cosim_core::{LogSink, Status};

use crate::abi::{CallbackLogger, Fmi2ComponentEnvironment};

/// Forwards every message to the orchestrator's logger callback.
///
/// Messages go through a `"%s"` format so that `%` in user text is never
/// interpreted by the callee.
pub struct CallbackSink {
    logger: CallbackLogger,
    environment: Fmi2ComponentEnvironment,
}

impl CallbackSink {
    /// Wrap a logger. `environment` is passed back on every call.
    pub fn new(logger: CallbackLogger, environment: Fmi2ComponentEnvironment) -> Self {
        Self { logger, environment }
    }
}

impl LogSink for CallbackSink {
    fn log(&self, instance_name: &str, status: Status, category: &str, message: &str) {
        let instance_name = c_string(instance_name);
        let category = c_string(category);
        let message = c_string(message);

        // SAFETY: the orchestrator keeps the logger and environment valid
        // until the instance is freed, and every string argument outlives
        // the call.
        unsafe {
            (self.logger)(
                self.environment,
                instance_name.as_ptr(),
                status.to_i32(),
                category.as_ptr(),
                c"%s".as_ptr(),
                message.as_ptr(),
            );
        }
    }
}

/// Convert to a C string, dropping interior NUL bytes.
pub(crate) fn c_string(text: &str) -> CString {
    CString::new(text).unwrap_or_else(|err| {
        let mut bytes = err.into_vec();
        bytes.retain(|&b| b != 0);
        CString::new(bytes).unwrap_or_default()
    })
}
