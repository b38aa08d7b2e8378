//! Module for reading models from text or JSON and writing generated networks
pub mod json;
pub mod syntax;
