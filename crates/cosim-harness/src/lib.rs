//! Deterministic scenario harness for co-simulation slaves.
//!
//! Plays the orchestrator: runs a slave through scripted, seeded scenarios
//! and checks the recorded trace against behavioural invariants.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks WHAT must be true of every run (output
//! tracks input, time advances by one step, rollback replays identically),
//! not specific scenarios. Use [`InvariantRegistry::standard()`] for the full
//! set.

#![forbid(unsafe_code)]

pub mod invariants;
pub mod scenario;

pub use invariants::{
    EndsTerminated, Invariant, InvariantRegistry, InvariantResult, OutputTracksInput,
    ParameterStable, ReplayMatchesOriginal, StateSizeFixed, TimeAdvancesByStep, Violation,
};
pub use scenario::{
    InputSchedule, MAX_STEPS, Replay, SEEDED_INPUT_RANGE, Scenario, ScenarioConfig, ScenarioError,
    Trace, TraceStep,
};
