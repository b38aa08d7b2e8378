//! This module provides the MoleculeType struct, a typed molecule template with named sites
use std::fmt::{Display, Formatter};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// A named attachment point on a molecule
///
/// A site with an empty `states` list is a pure bond site, otherwise it carries one of the
/// enumerated internal states (and may still form a bond).
#[derive(Builder, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Site {
    /// Site name, unique within its molecule type
    #[builder(setter(into))]
    pub name: String,
    /// Enumerated internal states, empty for a pure bond site
    #[builder(default = "Vec::new()")]
    #[serde(default)]
    pub states: Vec<String>,
}

impl Site {
    /// Create a pure bond site
    pub fn new(name: &str) -> Self {
        Site {
            name: name.to_string(),
            states: Vec::new(),
        }
    }

    /// Create a site with an enumerated state domain
    pub fn with_states(name: &str, states: &[&str]) -> Self {
        Site {
            name: name.to_string(),
            states: states.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether this site carries an internal state
    pub fn has_states(&self) -> bool {
        !self.states.is_empty()
    }

    /// Position of `state` in this site's domain
    pub fn state_index(&self, state: &str) -> Option<usize> {
        self.states.iter().position(|s| s == state)
    }
}

impl Display for Site {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for state in &self.states {
            write!(f, "~{}", state)?;
        }
        Ok(())
    }
}

/// Represents a molecule type (a monomer in PySB, a molecule type in BNGL)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoleculeType {
    /// Used to identify the molecule type (must be unique in a model)
    pub name: String,
    /// Ordered sites of the molecule
    #[serde(default)]
    pub sites: Vec<Site>,
}

impl MoleculeType {
    pub fn new(name: &str, sites: Vec<Site>) -> Self {
        MoleculeType {
            name: name.to_string(),
            sites,
        }
    }

    /// Index of the site called `name`
    pub fn site_index(&self, name: &str) -> Option<usize> {
        self.sites.iter().position(|s| s.name == name)
    }
}

impl Display for MoleculeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, site) in self.sites.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", site)?;
        }
        write!(f, ")")
    }
}
