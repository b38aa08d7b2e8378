//! This module provides the Rule struct, a pattern to pattern transformation with a rate law
use std::fmt::{Display, Formatter};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use super::complex::Complex;
use super::pattern::ComplexPattern;
use crate::io::syntax::{parse_rule, ParseError, SyntaxError};

/// A reaction rule as declared
#[derive(Builder, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Used to identify the rule (must be unique)
    #[builder(setter(into))]
    pub name: String,
    /// Reactant patterns, empty for zero order synthesis
    #[builder(default = "Vec::new()")]
    #[serde(default)]
    pub reactants: Vec<ComplexPattern>,
    /// Product patterns, empty for degradation
    #[builder(default = "Vec::new()")]
    #[serde(default)]
    pub products: Vec<ComplexPattern>,
    /// Forward rate, the name of a parameter, expression or observable
    #[builder(setter(into))]
    pub rate: String,
    /// Reverse rate for reversible rules
    #[builder(default = "None")]
    #[serde(default)]
    pub reverse_rate: Option<String>,
}

impl Rule {
    /// Parse a rule from text such as `A(s) + B(a) <-> A(s!1).B(a!1), kf, kr`
    ///
    /// # Examples
    /// ```rust
    /// use rbmrs_core::model::rule::Rule;
    /// let rule = Rule::parse("degrade", "X() -> 0, kdeg").unwrap();
    /// assert!(rule.products.is_empty());
    /// assert!(!rule.is_reversible());
    /// ```
    pub fn parse(name: &str, text: &str) -> Result<Rule, SyntaxError> {
        let parsed = parse_rule(text)?;
        let expected = if parsed.reversible { 2 } else { 1 };
        if parsed.rates.len() != expected {
            return Err(ParseError::RateCount {
                expected,
                found: parsed.rates.len(),
            }
            .into());
        }
        let mut rates = parsed.rates.into_iter();
        let rate = rates.next().unwrap_or_default();
        Ok(Rule {
            name: name.to_string(),
            reactants: parsed.reactants,
            products: parsed.products,
            rate,
            reverse_rate: rates.next(),
        })
    }

    pub fn is_reversible(&self) -> bool {
        self.reverse_rate.is_some()
    }
}

fn write_side(f: &mut Formatter<'_>, side: &[ComplexPattern]) -> std::fmt::Result {
    if side.is_empty() {
        return write!(f, "0");
    }
    for (i, pattern) in side.iter().enumerate() {
        if i > 0 {
            write!(f, " + ")?;
        }
        write!(f, "{}", pattern)?;
    }
    Ok(())
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_side(f, &self.reactants)?;
        match &self.reverse_rate {
            Some(reverse) => {
                write!(f, " <-> ")?;
                write_side(f, &self.products)?;
                write!(f, ", {}, {}", self.rate, reverse)
            }
            None => {
                write!(f, " -> ")?;
                write_side(f, &self.products)?;
                write!(f, ", {}", self.rate)
            }
        }
    }
}

/// A rule with its patterns resolved against the model's molecule types
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompiledRule {
    pub name: String,
    pub reactants: Vec<Complex>,
    pub products: Vec<Complex>,
    pub rate: String,
    pub reverse_rate: Option<String>,
}
