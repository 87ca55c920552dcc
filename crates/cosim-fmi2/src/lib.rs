//! FMI 2.0 co-simulation C ABI for the identity block.
//!
//! Builds the shared library an orchestrator loads from the FMU. All slave
//! behaviour lives in `cosim-core`; this crate only translates between C
//! pointers and Rust types:
//!
//! ```text
//! orchestrator ──fmi2*()──> exports ──> handle registry ──> cosim_core::Instance
//!      ^                                                          │
//!      └──────────── fmi2CallbackLogger <── CallbackSink <────────┘
//! ```
//!
//! This is the only crate in the workspace with `unsafe` code.

#![allow(unsafe_code)]

use std::ffi::CStr;

pub mod abi;
pub mod error;
pub mod exports;
mod handle;
pub mod sink;

pub use error::CallError;

/// Returned by `fmi2GetTypesPlatform`.
pub const TYPES_PLATFORM: &CStr = c"default";

/// Returned by `fmi2GetVersion`.
pub const FMI_VERSION: &CStr = c"2.0";
