//! Module turning species trajectories into observable time courses
use thiserror::Error;

pub mod evaluator;

pub use crate::network::matcher::match_count;
pub use evaluator::{weight_matrix, ObservableEvaluator, ObservableTable};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObservableError {
    #[error("Trajectory has {found} species, the network has {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}
