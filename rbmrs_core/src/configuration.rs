//! Explicit configuration values for network generation and integration
//!
//! There is no process-wide configuration: each value is built (usually with the
//! derived builders) and handed to the component that needs it.
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Limits applied while expanding rules into a concrete reaction network
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfiguration {
    /// Maximum number of species the generator may discover before giving up
    #[builder(default = "10_000")]
    pub max_species: usize,
    /// Optional ceiling on the number of breadth-first expansion rounds
    #[builder(default = "None")]
    pub max_iterations: Option<usize>,
}

impl Default for NetworkConfiguration {
    fn default() -> Self {
        NetworkConfiguration {
            max_species: 10_000,
            max_iterations: None,
        }
    }
}

impl NetworkConfiguration {
    /// Check that the configured limits are usable
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_species == 0 {
            return Err(ConfigurationError::InvalidValue(
                "max_species must be at least 1".to_string(),
            ));
        }
        if self.max_iterations == Some(0) {
            return Err(ConfigurationError::InvalidValue(
                "max_iterations must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the stiff integrator
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntegratorConfiguration {
    /// Relative local error tolerance
    #[builder(default = "1e-6")]
    pub rtol: f64,
    /// Absolute local error tolerance
    #[builder(default = "1e-9")]
    pub atol: f64,
    /// First trial step, picked from the initial derivative when `None`
    #[builder(default = "None")]
    pub initial_step: Option<f64>,
    /// Largest step the controller may take, unlimited when `None`
    #[builder(default = "None")]
    pub max_step: Option<f64>,
    /// Steps smaller than this are treated as a failure to hold the tolerance
    #[builder(default = "1e-14")]
    pub min_step: f64,
    /// Step budget for a single run (accepted plus rejected steps)
    #[builder(default = "1_000_000")]
    pub max_steps: usize,
    /// Number of accepted steps that may need negative values clamped before
    /// the run is declared unstable
    #[builder(default = "1_000")]
    pub max_clamped_steps: usize,
    /// Wall clock budget for a single run
    #[builder(default = "None")]
    pub max_wall_time: Option<Duration>,
    /// Run batch entries on the rayon thread pool (needs the `parallel` feature)
    #[builder(default = "true")]
    pub parallel: bool,
}

impl Default for IntegratorConfiguration {
    fn default() -> Self {
        IntegratorConfiguration {
            rtol: 1e-6,
            atol: 1e-9,
            initial_step: None,
            max_step: None,
            min_step: 1e-14,
            max_steps: 1_000_000,
            max_clamped_steps: 1_000,
            max_wall_time: None,
            parallel: true,
        }
    }
}

impl IntegratorConfiguration {
    /// Check that tolerances and step limits make sense
    ///
    /// Error control is mandatory, so zero tolerances are refused rather than being
    /// read as a request for fixed steps.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            return Err(ConfigurationError::InvalidValue(format!(
                "rtol must be positive and finite, got {}",
                self.rtol
            )));
        }
        if !(self.atol.is_finite() && self.atol > 0.0) {
            return Err(ConfigurationError::InvalidValue(format!(
                "atol must be positive and finite, got {}",
                self.atol
            )));
        }
        if !(self.min_step.is_finite() && self.min_step > 0.0) {
            return Err(ConfigurationError::InvalidValue(format!(
                "min_step must be positive and finite, got {}",
                self.min_step
            )));
        }
        for (name, step) in [("initial_step", self.initial_step), ("max_step", self.max_step)] {
            if let Some(h) = step {
                if !(h.is_finite() && h > 0.0) {
                    return Err(ConfigurationError::InvalidValue(format!(
                        "{name} must be positive and finite, got {h}"
                    )));
                }
            }
        }
        if self.max_steps == 0 {
            return Err(ConfigurationError::InvalidValue(
                "max_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors raised by configuration validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
