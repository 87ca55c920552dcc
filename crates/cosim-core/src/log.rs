//! Orchestrator-visible logging.
//!
//! Instances do not write log output themselves. They hand every message to
//! a [`LogSink`] injected at creation. The C surface wraps the orchestrator's
//! logger callback in a sink; Rust callers usually pick [`TracingSink`].

use std::io::{self, Write};

use crate::status::Status;

/// Category used for per-call trace messages.
pub const CATEGORY_LOG: &str = "log";

/// Destination for instance log messages.
pub trait LogSink {
    /// Emit one message on behalf of `instance_name`.
    fn log(&self, instance_name: &str, status: Status, category: &str, message: &str);
}

impl<S: LogSink + ?Sized> LogSink for Box<S> {
    fn log(&self, instance_name: &str, status: Status, category: &str, message: &str) {
        (**self).log(instance_name, status, category, message);
    }
}

impl<S: LogSink + ?Sized> LogSink for &S {
    fn log(&self, instance_name: &str, status: Status, category: &str, message: &str) {
        (**self).log(instance_name, status, category, message);
    }
}

/// Forwards messages to `tracing`.
///
/// `Ok` maps to info, `Warning` to warn and everything more severe to error.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, instance_name: &str, status: Status, category: &str, message: &str) {
        match status {
            Status::Ok | Status::Pending => {
                tracing::info!(instance = instance_name, category, "{}", message);
            },
            Status::Warning => {
                tracing::warn!(instance = instance_name, category, "{}", message);
            },
            Status::Discard | Status::Error | Status::Fatal => {
                tracing::error!(instance = instance_name, category, %status, "{}", message);
            },
        }
    }
}

/// Writes to the process streams.
///
/// Warnings and worse go to stderr, everything else to stdout. Used when the
/// orchestrator supplies no logger callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn log(&self, instance_name: &str, status: Status, category: &str, message: &str) {
        let line = console_line(instance_name, status, category, message);
        // Logging must never fail the operation that produced the message
        let _ = if status.is_problem() {
            writeln!(io::stderr().lock(), "{line}")
        } else {
            writeln!(io::stdout().lock(), "{line}")
        };
    }
}

/// Console rendering of one message. Problem statuses carry their code.
fn console_line(instance_name: &str, status: Status, category: &str, message: &str) -> String {
    if status.is_problem() {
        format!("[FMI Log] {instance_name} ({category}) [{}]: {message}", status.to_i32())
    } else {
        format!("[FMI Log] {instance_name} ({category}): {message}")
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _instance_name: &str, _status: Status, _category: &str, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        lines: RefCell<Vec<(String, Status, String, String)>>,
    }

    impl LogSink for Recorder {
        fn log(&self, instance_name: &str, status: Status, category: &str, message: &str) {
            self.lines.borrow_mut().push((
                instance_name.to_string(),
                status,
                category.to_string(),
                message.to_string(),
            ));
        }
    }

    #[test]
    fn boxed_and_borrowed_sinks_forward() {
        let recorder = Recorder::default();

        (&recorder).log("a", Status::Ok, CATEGORY_LOG, "borrowed");
        let boxed: Box<dyn LogSink + '_> = Box::new(&recorder);
        boxed.log("b", Status::Warning, CATEGORY_LOG, "boxed");

        let lines = recorder.lines.borrow();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, "a");
        assert_eq!(lines[1].1, Status::Warning);
        assert_eq!(lines[1].3, "boxed");
    }

    #[test]
    fn builtin_sinks_accept_every_status() {
        for status in [Status::Ok, Status::Warning, Status::Discard, Status::Error] {
            TracingSink.log("inst", status, CATEGORY_LOG, "message");
            NullSink.log("inst", status, CATEGORY_LOG, "message");
        }
    }

    #[test]
    fn console_lines_tag_problem_statuses() {
        assert_eq!(
            console_line("inst", Status::Ok, CATEGORY_LOG, "step 100% done"),
            "[FMI Log] inst (log): step 100% done"
        );
        assert_eq!(
            console_line("inst", Status::Warning, CATEGORY_LOG, "careful"),
            "[FMI Log] inst (log) [1]: careful"
        );
        assert_eq!(
            console_line("inst", Status::Error, "logStatusError", "bad reference"),
            "[FMI Log] inst (logStatusError) [3]: bad reference"
        );
    }
}
