//! Observables: named sums of pattern matches over species
use serde::{Deserialize, Serialize};

use super::complex::Complex;
use super::pattern::ComplexPattern;
use crate::io::syntax::{parse_side, SyntaxError};

/// An observable as declared, the sum of matches of each of its patterns
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observable {
    pub name: String,
    pub patterns: Vec<ComplexPattern>,
}

impl Observable {
    pub fn new(name: &str, patterns: Vec<ComplexPattern>) -> Self {
        Observable {
            name: name.to_string(),
            patterns,
        }
    }

    /// Parse the patterns from text such as `TNFa(tnfr1) + TNFa(tnfr1!1).TNFR1(tnfa!1)`
    pub fn parse(name: &str, text: &str) -> Result<Observable, SyntaxError> {
        Ok(Observable::new(name, parse_side(text)?))
    }
}

/// An observable with resolved patterns
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompiledObservable {
    pub name: String,
    pub patterns: Vec<Complex>,
}
