//! Module integrating assembled ODE systems over time grids
use thiserror::Error;

use crate::configuration::ConfigurationError;
use crate::ode::AssemblyError;

pub mod rosenbrock;
pub mod trajectory;

pub use rosenbrock::Integrator;
pub use trajectory::Trajectory;

/// Errors raised by a single integration run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrationError {
    /// The solver could not hold the tolerance or keep the state physical
    #[error("Integration unstable between t={start} and t={end}: {reason}")]
    IntegrationUnstable { start: f64, end: f64, reason: String },
    #[error("Invalid time grid: {0}")]
    InvalidTimeGrid(String),
    #[error("Expected an initial state of length {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Initial amount of species {species} is {value}, amounts must be finite and non-negative")]
    InvalidInitialState { species: usize, value: f64 },
    #[error("Invalid integrator configuration: {0}")]
    InvalidConfiguration(#[from] ConfigurationError),
    #[error("Run exceeded its {budget} budget at t={time}")]
    BudgetExceeded { budget: &'static str, time: f64 },
    #[error("Run cancelled at t={time}")]
    Cancelled { time: f64 },
    #[error("Unable to evaluate the right hand side: {0}")]
    Rate(#[from] AssemblyError),
}
