//! Name based pattern declarations
//!
//! These are the patterns as a user writes them (molecule, site and state names plus bond
//! labels). Freezing a model resolves them into index based [`Complex`](super::complex::Complex)
//! graphs.
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::io::syntax::{parse_pattern, SyntaxError};

/// Bond condition on a single site
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BondSpec {
    /// Site is unbound
    Free,
    /// Site is bound to something, partner unspecified (`!+`)
    Bound,
    /// Bond state is not constrained (`!?`)
    Wildcard,
    /// Site is bound to the other site carrying the same label in this complex
    Label(u32),
}

/// Condition on one named site of a molecule pattern
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteSpec {
    pub site: String,
    pub state: Option<String>,
    pub bond: BondSpec,
}

impl SiteSpec {
    /// An unbound site without a state condition
    pub fn free(site: &str) -> Self {
        SiteSpec {
            site: site.to_string(),
            state: None,
            bond: BondSpec::Free,
        }
    }

    /// An unbound site in the given state
    pub fn state(site: &str, state: &str) -> Self {
        SiteSpec {
            site: site.to_string(),
            state: Some(state.to_string()),
            bond: BondSpec::Free,
        }
    }

    /// A site bound through `label`
    pub fn bond(site: &str, label: u32) -> Self {
        SiteSpec {
            site: site.to_string(),
            state: None,
            bond: BondSpec::Label(label),
        }
    }
}

impl Display for SiteSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.site)?;
        if let Some(state) = &self.state {
            write!(f, "~{}", state)?;
        }
        match self.bond {
            BondSpec::Free => Ok(()),
            BondSpec::Bound => write!(f, "!+"),
            BondSpec::Wildcard => write!(f, "!?"),
            BondSpec::Label(label) => write!(f, "!{}", label),
        }
    }
}

/// A molecule with conditions on some of its sites, unmentioned sites are wildcards
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoleculePattern {
    pub molecule: String,
    pub sites: Vec<SiteSpec>,
}

impl MoleculePattern {
    pub fn new(molecule: &str, sites: Vec<SiteSpec>) -> Self {
        MoleculePattern {
            molecule: molecule.to_string(),
            sites,
        }
    }
}

impl Display for MoleculePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.molecule)?;
        for (i, site) in self.sites.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", site)?;
        }
        write!(f, ")")
    }
}

/// One or more molecule patterns that belong to the same complex (joined with `.`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComplexPattern {
    pub molecules: Vec<MoleculePattern>,
}

impl ComplexPattern {
    pub fn new(molecules: Vec<MoleculePattern>) -> Self {
        ComplexPattern { molecules }
    }

    /// Pattern made of a single molecule
    pub fn single(molecule: MoleculePattern) -> Self {
        ComplexPattern {
            molecules: vec![molecule],
        }
    }
}

impl Display for ComplexPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, molecule) in self.molecules.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", molecule)?;
        }
        Ok(())
    }
}

impl FromStr for ComplexPattern {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_pattern(s)
    }
}
