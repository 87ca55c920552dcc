//! Instance creation parameters and configuration.

use crate::{error::SlaveError, lifecycle::PhasePolicy};

/// Environment variable selecting the [`PhasePolicy`] (`strict` or
/// `permissive`).
pub const PHASE_POLICY_ENV: &str = "COSIM_PHASE_POLICY";

/// FMI interface type requested at instantiation (`fmi2Type`).
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    /// `fmi2ModelExchange`
    ModelExchange = 0,
    /// `fmi2CoSimulation`
    CoSimulation = 1,
}

impl InterfaceKind {
    /// Parse a raw `fmi2Type`.
    ///
    /// # Errors
    ///
    /// - `SlaveError::UnsupportedInterface` if `raw` is not a known type
    pub fn from_i32(raw: i32) -> Result<Self, SlaveError> {
        match raw {
            0 => Ok(Self::ModelExchange),
            1 => Ok(Self::CoSimulation),
            kind => Err(SlaveError::UnsupportedInterface { kind }),
        }
    }
}

/// What the orchestrator passed to instantiate.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceInfo {
    /// Display name used in every log line
    pub name: String,
    /// Requested interface type
    pub kind: InterfaceKind,
    /// GUID from the model description (informational)
    pub guid: String,
    /// URI of the unpacked `resources` directory, if any
    pub resource_location: Option<String>,
    /// Whether the orchestrator allows user interaction
    pub visible: bool,
    /// Initial state of debug logging
    pub logging_on: bool,
}

impl InstanceInfo {
    /// Co-simulation instance with logging off and no resources.
    pub fn co_simulation(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: InterfaceKind::CoSimulation,
            guid: String::new(),
            resource_location: None,
            visible: false,
            logging_on: false,
        }
    }

    /// Same info with logging switched on or off.
    #[must_use]
    pub fn with_logging(mut self, logging_on: bool) -> Self {
        self.logging_on = logging_on;
        self
    }
}

/// Instance configuration not supplied through the FMI arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceConfig {
    /// Lifecycle enforcement
    pub phase_policy: PhasePolicy,
}

impl InstanceConfig {
    /// Read configuration from the process environment.
    ///
    /// Unset or unrecognised values fall back to the defaults.
    pub fn from_env() -> Self {
        let phase_policy = match std::env::var(PHASE_POLICY_ENV) {
            Ok(value) => PhasePolicy::parse(&value).unwrap_or_else(|| {
                tracing::warn!(%value, "unknown {}, using strict", PHASE_POLICY_ENV);
                PhasePolicy::Strict
            }),
            Err(_) => PhasePolicy::default(),
        };

        Self { phase_policy }
    }

    /// Configuration with the given phase policy.
    #[must_use]
    pub fn with_phase_policy(phase_policy: PhasePolicy) -> Self {
        Self { phase_policy }
    }
}

/// Experiment setup recorded by `setup_experiment`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Experiment {
    /// Relative tolerance, if the orchestrator defined one
    pub tolerance: Option<f64>,
    /// Start of the simulated time interval
    pub start_time: f64,
    /// End of the simulated time interval, if defined
    pub stop_time: Option<f64>,
}

impl Experiment {
    /// Check that a defined stop time does not precede the start time.
    ///
    /// # Errors
    ///
    /// - `SlaveError::InvalidExperiment` if `stop_time < start_time`
    pub fn validate(&self) -> Result<(), SlaveError> {
        match self.stop_time {
            Some(stop_time) if stop_time < self.start_time => {
                Err(SlaveError::InvalidExperiment { start_time: self.start_time, stop_time })
            },
            _ => Ok(()),
        }
    }
}

impl Default for Experiment {
    fn default() -> Self {
        Self { tolerance: None, start_time: 0.0, stop_time: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_kind_parses_known_values() {
        assert_eq!(InterfaceKind::from_i32(0), Ok(InterfaceKind::ModelExchange));
        assert_eq!(InterfaceKind::from_i32(1), Ok(InterfaceKind::CoSimulation));
        assert_eq!(InterfaceKind::from_i32(7), Err(SlaveError::UnsupportedInterface { kind: 7 }));
    }

    #[test]
    fn experiment_stop_before_start_rejected() {
        let experiment = Experiment { tolerance: None, start_time: 2.0, stop_time: Some(1.0) };
        assert!(experiment.validate().is_err());

        let open_ended = Experiment { stop_time: None, ..experiment };
        assert!(open_ended.validate().is_ok());

        let zero_length = Experiment { stop_time: Some(2.0), ..experiment };
        assert!(zero_length.validate().is_ok());
    }

    #[test]
    fn default_config_is_strict() {
        assert_eq!(InstanceConfig::default().phase_policy, PhasePolicy::Strict);
    }
}
