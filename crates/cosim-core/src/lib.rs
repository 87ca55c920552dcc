//! Core of an FMI 2.0 co-simulation slave.
//!
//! Everything here is plain Rust with no FFI: the lifecycle state machine,
//! the variable store, the flat state codec and the instance facade that
//! ties them together. The C ABI lives in `cosim-fmi2`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Instance<F: StepFunction, S: LogSink>        │
//! │                                              │
//! │  Lifecycle ── guard(op) before every call    │
//! │  VariableStore ── atomic get/set batches     │
//! │  StateSnapshot ── capture / restore / codec  │
//! │  F ── per-step computation + Jacobian        │
//! │  S ── orchestrator-visible log messages      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The identity block ([`IdentityBlock`]) is the only step function shipped.

#![forbid(unsafe_code)]

pub mod codec;
pub mod config;
pub mod error;
pub mod identity;
pub mod instance;
pub mod lifecycle;
pub mod log;
pub mod status;
pub mod step;
pub mod variables;

pub use codec::{ENTRY_SIZE, StateSnapshot, serialized_size};
pub use config::{Experiment, InstanceConfig, InstanceInfo, InterfaceKind, PHASE_POLICY_ENV};
pub use error::{ReferenceFault, SlaveError};
pub use identity::IdentityBlock;
pub use instance::Instance;
pub use lifecycle::{Lifecycle, Operation, Phase, PhasePolicy};
pub use log::{CATEGORY_LOG, ConsoleSink, LogSink, NullSink, TracingSink};
pub use status::{Status, StatusKind};
pub use step::{StepContext, StepFunction};
pub use variables::{Causality, ValueReference, VariableKind, VariableSpec, VariableStore};
