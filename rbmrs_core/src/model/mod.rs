//! Module providing the declaration types of a rule-based model and the frozen Model
pub mod complex;
pub mod expression;
pub mod model;
pub mod molecule;
pub mod observable;
pub mod pattern;
pub mod rule;
