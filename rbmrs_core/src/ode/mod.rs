//! Module assembling reaction networks into systems of ordinary differential equations
use thiserror::Error;

pub mod assembler;

pub use assembler::{OdeAssembler, OdeSystem, RateSource};

/// Errors raised while assembling or evaluating an ODE system
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyError {
    /// A rate resolved to a negative (or non-finite) value, the rate law is malformed
    #[error("Rate of reaction from rule `{reaction}` resolved to {value}")]
    NegativeRate { reaction: String, value: f64 },
    #[error("`{name}` used by {context} is not defined in the model")]
    UnresolvedReference { name: String, context: String },
    #[error("Expression `{name}` is invalid: {reason}")]
    InvalidExpression { name: String, reason: String },
    #[error("Expected a state of length {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
}
