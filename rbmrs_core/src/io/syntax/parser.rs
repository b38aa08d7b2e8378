use crate::io::syntax::token::Token;
use crate::model::expression::{BinaryOp, Expr, Function};
use crate::model::molecule::{MoleculeType, Site};
use crate::model::pattern::{BondSpec, ComplexPattern, MoleculePattern, SiteSpec};

use thiserror::Error;
/*
Grammar:
rule       -> side ("->" | "<->") side ("," ? IDENT)+ ;
side       -> "0" | "None" | complex ("+" complex)* ;
complex    -> molecule (("." | "%") molecule)* ;
molecule   -> IDENT ("(" (site ("," site)*)? ")")? ;
site       -> IDENT (("~" state) | ("!" bond))* ;
bond       -> INTEGER | "+" | "?" ;
moltype    -> IDENT ("(" (IDENT ("~" state)*) ("," IDENT ("~" state)*)* ")")? ;

expression -> term (("+" | "-") term)* ;
term       -> unary (("*" | "/") unary)* ;
unary      -> "-" unary | "+" unary | power ;
power      -> primary ("^" unary)? ;
primary    -> NUMBER | IDENT | IDENT "(" expression ("," expression)* ")" | "(" expression ")" ;

e.g. A(s) + B(a) <-> A(s!1).B(a!1), kf, kr
     ka * ka20 / (ka20 + Total_A20)
 */

/// A parsed rule before it is given a name
#[derive(Clone, Debug, PartialEq)]
pub struct RuleText {
    pub reactants: Vec<ComplexPattern>,
    pub products: Vec<ComplexPattern>,
    pub reversible: bool,
    pub rates: Vec<String>,
}

/// Recursive descent parser over a token vector
pub struct Parser {
    /// Vector of tokens from the source string
    tokens: Vec<Token>,
    /// Current token being processed
    current: usize,
}

impl Parser {
    /// Create a new Parser, `tokens` must end with [`Token::Eof`]
    pub fn new(tokens: Vec<Token>) -> Parser {
        Parser { tokens, current: 0 }
    }

    // region Entry Points

    pub fn parse_rule(&mut self) -> Result<RuleText, ParseError> {
        let reactants = self.side()?;
        let reversible = if self.match_token(&[Token::BiArrow]) {
            true
        } else if self.match_token(&[Token::Arrow]) {
            false
        } else {
            return Err(self.unexpected("`->` or `<->`"));
        };
        let products = self.side()?;
        let mut rates = Vec::new();
        while !self.is_at_end() {
            self.match_token(&[Token::Comma]);
            match self.match_identifier() {
                Some(rate) => rates.push(rate),
                None => return Err(self.unexpected("a rate name")),
            }
        }
        Ok(RuleText {
            reactants,
            products,
            reversible,
            rates,
        })
    }

    pub fn parse_side(&mut self) -> Result<Vec<ComplexPattern>, ParseError> {
        let side = self.side()?;
        self.finish()?;
        Ok(side)
    }

    pub fn parse_pattern(&mut self) -> Result<ComplexPattern, ParseError> {
        let pattern = self.complex()?;
        self.finish()?;
        Ok(pattern)
    }

    pub fn parse_molecule_type(&mut self) -> Result<MoleculeType, ParseError> {
        let name = match self.match_identifier() {
            Some(name) => name,
            None => return Err(self.unexpected("a molecule type name")),
        };
        let mut sites = Vec::new();
        if self.match_token(&[Token::LeftParen]) && !self.match_token(&[Token::RightParen]) {
            loop {
                let site_name = match self.match_identifier() {
                    Some(site) => site,
                    None => return Err(self.unexpected("a site name")),
                };
                let mut states = Vec::new();
                while self.match_token(&[Token::Tilde]) {
                    states.push(self.state_name()?);
                }
                sites.push(Site {
                    name: site_name,
                    states,
                });
                if self.match_token(&[Token::RightParen]) {
                    break;
                }
                self.consume(Token::Comma, "Expect ',' or ')' after site.")?;
            }
        }
        self.finish()?;
        Ok(MoleculeType { name, sites })
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let expr = self.expression()?;
        self.finish()?;
        Ok(expr)
    }

    // endregion Entry Points

    // region Pattern Parsing Functions

    fn side(&mut self) -> Result<Vec<ComplexPattern>, ParseError> {
        if self.check(&Token::Number(0.0)) {
            self.advance();
            return Ok(Vec::new());
        }
        if self.check(&Token::Identifier("None".to_string())) {
            self.advance();
            return Ok(Vec::new());
        }
        let mut side = vec![self.complex()?];
        while self.match_token(&[Token::Plus]) {
            side.push(self.complex()?);
        }
        Ok(side)
    }

    fn complex(&mut self) -> Result<ComplexPattern, ParseError> {
        let mut molecules = vec![self.molecule()?];
        while self.match_token(&[Token::Dot]) {
            molecules.push(self.molecule()?);
        }
        Ok(ComplexPattern { molecules })
    }

    fn molecule(&mut self) -> Result<MoleculePattern, ParseError> {
        let name = match self.match_identifier() {
            Some(name) => name,
            None => return Err(self.unexpected("a molecule name")),
        };
        let mut sites = Vec::new();
        if self.match_token(&[Token::LeftParen]) && !self.match_token(&[Token::RightParen]) {
            loop {
                sites.push(self.site()?);
                if self.match_token(&[Token::RightParen]) {
                    break;
                }
                self.consume(Token::Comma, "Expect ',' or ')' after site.")?;
            }
        }
        Ok(MoleculePattern {
            molecule: name,
            sites,
        })
    }

    fn site(&mut self) -> Result<SiteSpec, ParseError> {
        let site = match self.match_identifier() {
            Some(site) => site,
            None => return Err(self.unexpected("a site name")),
        };
        let mut state = None;
        let mut bond = None;
        loop {
            if self.match_token(&[Token::Tilde]) {
                if state.is_some() {
                    return Err(ParseError::RepeatedCondition(site));
                }
                state = Some(self.state_name()?);
            } else if self.match_token(&[Token::Bang]) {
                if bond.is_some() {
                    return Err(ParseError::RepeatedCondition(site));
                }
                bond = Some(self.bond()?);
            } else {
                break;
            }
        }
        Ok(SiteSpec {
            site,
            state,
            bond: bond.unwrap_or(BondSpec::Free),
        })
    }

    fn bond(&mut self) -> Result<BondSpec, ParseError> {
        if self.match_token(&[Token::Plus]) {
            return Ok(BondSpec::Bound);
        }
        if self.match_token(&[Token::Question]) {
            return Ok(BondSpec::Wildcard);
        }
        match self.peek() {
            Token::Number(n) => {
                self.advance();
                if n.fract() != 0.0 || n < 0.0 || n > u32::MAX as f64 {
                    return Err(ParseError::InvalidBondLabel(n.to_string()));
                }
                Ok(BondSpec::Label(n as u32))
            }
            _ => Err(self.unexpected("a bond label, `+` or `?`")),
        }
    }

    /// State names may be identifiers or non-negative integers
    fn state_name(&mut self) -> Result<String, ParseError> {
        if let Some(id) = self.match_identifier() {
            return Ok(id);
        }
        match self.peek() {
            Token::Number(n) if n.fract() == 0.0 && n >= 0.0 => {
                self.advance();
                Ok(format!("{}", n as u64))
            }
            _ => Err(self.unexpected("a state name")),
        }
    }

    // endregion Pattern Parsing Functions

    // region Expression Parsing Functions

    fn expression(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.term()?;
        while self.match_token(&[Token::Plus, Token::Minus]) {
            let op = match self.previous() {
                Token::Plus => BinaryOp::Add,
                _ => BinaryOp::Sub,
            };
            let right = self.term()?;
            expr = Expr::binary(op, expr, right);
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unary()?;
        while self.match_token(&[Token::Star, Token::Slash]) {
            let op = match self.previous() {
                Token::Star => BinaryOp::Mul,
                _ => BinaryOp::Div,
            };
            let right = self.unary()?;
            expr = Expr::binary(op, expr, right);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(&[Token::Minus]) {
            return Ok(Expr::Negate(Box::new(self.unary()?)));
        }
        if self.match_token(&[Token::Plus]) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.primary()?;
        if self.match_token(&[Token::Caret]) {
            let exponent = self.unary()?;
            return Ok(Expr::binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        if let Token::Number(n) = self.peek() {
            self.advance();
            return Ok(Expr::Number(n));
        }

        if let Some(identifier) = self.match_identifier() {
            if self.match_token(&[Token::LeftParen]) {
                let function = Function::from_name(&identifier)
                    .ok_or_else(|| ParseError::UnknownFunction(identifier.clone()))?;
                let mut args = vec![self.expression()?];
                while self.match_token(&[Token::Comma]) {
                    args.push(self.expression()?);
                }
                self.consume(Token::RightParen, "Expect ')' after arguments.")?;
                if args.len() != function.arity() {
                    return Err(ParseError::WrongArity {
                        function: identifier,
                        expected: function.arity(),
                        found: args.len(),
                    });
                }
                return Ok(Expr::Call { function, args });
            }
            return Ok(Expr::Symbol(identifier));
        }

        if self.match_token(&[Token::LeftParen]) {
            let expr = self.expression()?;
            self.consume(Token::RightParen, "Expect ')' after expression.")?;
            return Ok(expr);
        }

        Err(ParseError::ExpectedExpression)
    }

    // endregion Expression Parsing Functions

    // region parsing helper functions

    /// Check whether the token at the current position matches one of the provided `tokens`,
    /// if it does advance [`self.current`] and return true, otherwise return false
    fn match_token(&mut self, tokens: &[Token]) -> bool {
        for t in tokens {
            if self.check(t) {
                self.advance();
                return true;
            }
        }
        false
    }

    /// Similar to [`match_token`], but for matching an identifier token. If the current
    /// token is an identifier return `Some(id)`, otherwise return None
    fn match_identifier(&mut self) -> Option<String> {
        if self.is_at_end() {
            return None;
        }
        if let Token::Identifier(id) = self.peek() {
            self.advance();
            return Some(id);
        }
        None
    }

    /// Check whether the current token matches the provided `token`
    fn check(&self, token: &Token) -> bool {
        if self.is_at_end() {
            return false;
        }
        &self.tokens[self.current] == token
    }

    /// Advance `self.current` one position unless at end of the token Vec, then return the
    /// previous token.
    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    /// Check whether the parser is at the end of the source Vec
    fn is_at_end(&self) -> bool {
        matches!(self.tokens.get(self.current), Some(Token::Eof) | None)
    }

    /// Get a copy of the current token
    fn peek(&self) -> Token {
        self.tokens.get(self.current).cloned().unwrap_or(Token::Eof)
    }

    /// Get a copy of the previous token
    fn previous(&self) -> Token {
        self.current
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i).cloned())
            .unwrap_or(Token::Eof)
    }

    /// Check whether the current token matches an input token, if it matches advance to the
    /// next token, and if it doesn't return an error. Used mainly for matching parenthesis.
    fn consume(&mut self, token: Token, msg: &str) -> Result<Token, ParseError> {
        if self.check(&token) {
            return Ok(self.advance());
        }

        Err(ParseError::MissingToken(msg.to_string()))
    }

    /// Require that all tokens have been used
    fn finish(&self) -> Result<(), ParseError> {
        if !self.is_at_end() {
            return Err(ParseError::EarlyTermination(self.peek().describe()));
        }
        Ok(())
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.peek().describe(),
        }
    }

    // endregion parsing helper functions
}

/// Enum representing possible parse errors
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ParseError {
    /// Missing expected token (e.g. a right parenthesis)
    #[error("Missing expected token: {0}")]
    MissingToken(String),
    /// A different token was found than the grammar allows here
    #[error("Expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
    /// No expression found when one was expected
    #[error("No expression found, check that the expression is not empty")]
    ExpectedExpression,
    /// Input remained after a complete parse
    #[error("Parsing terminated early at {0}")]
    EarlyTermination(String),
    #[error("Bond labels must be non-negative integers, got {0}")]
    InvalidBondLabel(String),
    #[error("Site `{0}` has its state or bond given more than once")]
    RepeatedCondition(String),
    #[error("Unknown function `{0}`")]
    UnknownFunction(String),
    #[error("Function `{function}` takes {expected} argument(s), got {found}")]
    WrongArity {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("Rule needs {expected} rate(s), got {found}")]
    RateCount { expected: usize, found: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::syntax::lexer::Lexer;

    fn parser(text: &str) -> Parser {
        Parser::new(Lexer::new(text).lex().unwrap())
    }

    #[test]
    fn pattern_parse() {
        let pattern = parser("IkBa(nfkb!2,phos~u,loc~c).NFkB(ikba!2,dna,loc~c)")
            .parse_pattern()
            .unwrap();
        assert_eq!(pattern.molecules.len(), 2);
        let ikba = &pattern.molecules[0];
        assert_eq!(ikba.molecule, "IkBa");
        assert_eq!(ikba.sites[0], SiteSpec::bond("nfkb", 2));
        assert_eq!(ikba.sites[1], SiteSpec::state("phos", "u"));
        assert_eq!(pattern.molecules[1].sites[1], SiteSpec::free("dna"));
    }

    #[test]
    fn site_conditions_in_either_order() {
        let a = parser("A(s~p!1).B(a!1)").parse_pattern().unwrap();
        let b = parser("A(s!1~p).B(a!1)").parse_pattern().unwrap();
        assert_eq!(a, b);
        assert_eq!(
            parser("A(s~p~u)").parse_pattern(),
            Err(ParseError::RepeatedCondition("s".to_string()))
        );
    }

    #[test]
    fn rule_parse() {
        let rule = parser("TNFa(tnfr1) + TNFR1(tnfa) <-> TNFa(tnfr1!1) % TNFR1(tnfa!1), kb, kf")
            .parse_rule()
            .unwrap();
        assert!(rule.reversible);
        assert_eq!(rule.reactants.len(), 2);
        assert_eq!(rule.products.len(), 1);
        assert_eq!(rule.rates, vec!["kb".to_string(), "kf".to_string()]);

        let rule = parser("A20_mRNA() -> None, c3").parse_rule().unwrap();
        assert!(!rule.reversible);
        assert!(rule.products.is_empty());

        let rule = parser("0 -> A() k").parse_rule().unwrap();
        assert!(rule.reactants.is_empty());
        assert_eq!(rule.rates, vec!["k".to_string()]);
    }

    #[test]
    fn missing_arrow() {
        match parser("A() B()").parse_rule() {
            Err(ParseError::UnexpectedToken { .. }) => {}
            other => panic!("Incorrect result {:?}", other),
        }
    }

    #[test]
    fn molecule_type_parse() {
        let ikk = parser("IKK(state~n~a~i~ii)").parse_molecule_type().unwrap();
        assert_eq!(ikk, MoleculeType::new("IKK", vec![Site::with_states("state", &["n", "a", "i", "ii"])]));
        let a20 = parser("A20").parse_molecule_type().unwrap();
        assert!(a20.sites.is_empty());
        let dna = parser("DNA(a20t,ikbat)").parse_molecule_type().unwrap();
        assert_eq!(dna.sites.len(), 2);
    }

    #[test]
    fn expression_precedence() {
        let expr = parser("a + b * c").parse_expression().unwrap();
        match expr {
            Expr::Binary { op: BinaryOp::Add, right, .. } => match *right {
                Expr::Binary { op: BinaryOp::Mul, .. } => {}
                _ => panic!("Multiplication should bind tighter"),
            },
            _ => panic!("Incorrect parse"),
        }
    }

    #[test]
    fn invalid_expressions() {
        assert_eq!(
            parser("a +").parse_expression(),
            Err(ParseError::ExpectedExpression)
        );
        assert_eq!(
            parser("foo(1)").parse_expression(),
            Err(ParseError::UnknownFunction("foo".to_string()))
        );
        match parser("(a + b").parse_expression() {
            Err(ParseError::MissingToken(_)) => {}
            other => panic!("Incorrect result {:?}", other),
        }
        match parser("a b").parse_expression() {
            Err(ParseError::EarlyTermination(_)) => {}
            other => panic!("Incorrect result {:?}", other),
        }
    }

    #[test]
    fn invalid_bond_label() {
        assert_eq!(
            parser("A(s!1.5)").parse_pattern(),
            Err(ParseError::InvalidBondLabel("1.5".to_string()))
        );
    }
}
