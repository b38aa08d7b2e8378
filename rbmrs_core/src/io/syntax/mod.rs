//! Module for parsing the textual model syntax (molecule types, patterns, rules and
//! expressions) into model values

use thiserror::Error;

use crate::io::syntax::lexer::LexerError;
use crate::io::syntax::parser::{Parser, RuleText};
use crate::model::expression::Expr;
use crate::model::molecule::MoleculeType;
use crate::model::pattern::ComplexPattern;

pub use crate::io::syntax::parser::ParseError;

mod lexer;
pub mod parser;
mod token;

fn parser_for(input: &str) -> Result<Parser, SyntaxError> {
    let tokens = lexer::Lexer::new(input).lex()?;
    Ok(Parser::new(tokens))
}

/// Parse a single complex pattern such as `IkBa(nfkb!1,loc~c).NFkB(ikba!1)`
///
/// # Examples
/// ```rust
/// use rbmrs_core::io::syntax::parse_pattern;
/// let pattern = parse_pattern("A(s!1,t~p).B(a!1)").unwrap();
/// assert_eq!(pattern.molecules.len(), 2);
/// ```
pub fn parse_pattern(input: &str) -> Result<ComplexPattern, SyntaxError> {
    Ok(parser_for(input)?.parse_pattern()?)
}

/// Parse one side of a rule, complex patterns joined with `+`, or `0`/`None` for an empty side
pub fn parse_side(input: &str) -> Result<Vec<ComplexPattern>, SyntaxError> {
    Ok(parser_for(input)?.parse_side()?)
}

/// Parse a rule such as `A(s) + B(a) <-> A(s!1).B(a!1), kf, kr`
///
/// The number of rates is not checked here, see [`Rule::parse`](crate::model::rule::Rule::parse).
pub fn parse_rule(input: &str) -> Result<RuleText, SyntaxError> {
    Ok(parser_for(input)?.parse_rule()?)
}

/// Parse an arithmetic expression
pub fn parse_expression(input: &str) -> Result<Expr, SyntaxError> {
    Ok(parser_for(input)?.parse_expression()?)
}

/// Parse a molecule type declaration such as `IKK(state~n~a~i~ii)`
pub fn parse_molecule_type(input: &str) -> Result<MoleculeType, SyntaxError> {
    Ok(parser_for(input)?.parse_molecule_type()?)
}

/// Enum representing possible lex and parse errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyntaxError {
    /// Lexing Error
    #[error("Error occurred during lexing: {0}")]
    Lexing(#[from] LexerError),
    /// Parsing Error
    #[error("Error occurred during parsing: {0}")]
    Parsing(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pattern::{BondSpec, SiteSpec};

    #[test]
    fn lexing_errors_surface() {
        match parse_pattern("A(s$)") {
            Err(SyntaxError::Lexing(_)) => {}
            other => panic!("Expected a lexing error, got {:?}", other),
        }
    }

    #[test]
    fn side_forms() {
        assert!(parse_side("None").unwrap().is_empty());
        assert!(parse_side("0").unwrap().is_empty());
        let side = parse_side("TNFa(tnfr1) + TNFa(tnfr1!+)").unwrap();
        assert_eq!(side.len(), 2);
        assert_eq!(side[1].molecules[0].sites[0].bond, BondSpec::Bound);
    }

    #[test]
    fn numeric_states() {
        let pattern = parse_pattern("P(y~0!?)").unwrap();
        assert_eq!(
            pattern.molecules[0].sites[0],
            SiteSpec {
                site: "y".to_string(),
                state: Some("0".to_string()),
                bond: BondSpec::Wildcard
            }
        );
    }

    #[test]
    fn molecule_type_round_trip() {
        let mtype = parse_molecule_type("IkBa(nfkb, phos~u~p, loc~n~c)").unwrap();
        assert_eq!(format!("{}", mtype), "IkBa(nfkb,phos~u~p,loc~n~c)");
    }
}
