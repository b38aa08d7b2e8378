//! Module expanding rule-based models into concrete reaction networks
use thiserror::Error;

use crate::configuration::ConfigurationError;
use crate::model::model::ModelDefinitionError;

pub mod canonical;
pub mod generator;
pub mod matcher;
pub mod reaction;
pub mod transform;

pub use generator::NetworkGenerator;
pub use reaction::{Reaction, ReactionNetwork, Species};

/// Errors raised while generating a network
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// The species ceiling was reached, raise it or refine the rules
    #[error("Network exceeds {limit} species (round {round})")]
    NetworkTooLarge { limit: usize, round: usize },
    #[error("Network not closed after {limit} rounds ({species} species so far)")]
    IterationLimit { limit: usize, species: usize },
    /// A seed is not a connected, fully specified complex
    #[error("Invalid seed species {0}")]
    InvalidSpecies(String),
    #[error("Invalid network configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Unable to compile rule: {0}")]
    Model(#[from] ModelDefinitionError),
}
