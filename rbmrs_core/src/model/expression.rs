//! Arithmetic expressions for rate laws that depend on parameters and observables
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::io::syntax::{parse_expression, SyntaxError};

/// Expression syntax tree
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number(f64),
    /// Reference to a parameter, observable or another expression
    Symbol(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn apply(&self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Sub => left - right,
            BinaryOp::Mul => left * right,
            BinaryOp::Div => left / right,
            BinaryOp::Pow => left.powf(right),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }
}

/// Built in functions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Function {
    Exp,
    Ln,
    Sqrt,
    Abs,
    Min,
    Max,
}

impl Function {
    /// Look a function up by the name used in expression text
    pub fn from_name(name: &str) -> Option<Function> {
        match name {
            "exp" => Some(Function::Exp),
            "ln" | "log" => Some(Function::Ln),
            "sqrt" => Some(Function::Sqrt),
            "abs" => Some(Function::Abs),
            "min" => Some(Function::Min),
            "max" => Some(Function::Max),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Exp => "exp",
            Function::Ln => "ln",
            Function::Sqrt => "sqrt",
            Function::Abs => "abs",
            Function::Min => "min",
            Function::Max => "max",
        }
    }

    /// Number of arguments the function takes
    pub fn arity(&self) -> usize {
        match self {
            Function::Min | Function::Max => 2,
            _ => 1,
        }
    }

    pub fn apply(&self, args: &[f64]) -> f64 {
        match self {
            Function::Exp => args[0].exp(),
            Function::Ln => args[0].ln(),
            Function::Sqrt => args[0].sqrt(),
            Function::Abs => args[0].abs(),
            Function::Min => args[0].min(args[1]),
            Function::Max => args[0].max(args[1]),
        }
    }
}

impl Expr {
    pub fn number(value: f64) -> Expr {
        Expr::Number(value)
    }

    pub fn symbol(name: &str) -> Expr {
        Expr::Symbol(name.to_string())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Names referenced by this expression, in order of first appearance
    pub fn symbols(&self) -> Vec<&str> {
        let mut found: Vec<&str> = Vec::new();
        self.collect_symbols(&mut found);
        found
    }

    fn collect_symbols<'a>(&'a self, found: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Symbol(name) => {
                if !found.contains(&name.as_str()) {
                    found.push(name);
                }
            }
            Expr::Negate(inner) => inner.collect_symbols(found),
            Expr::Binary { left, right, .. } => {
                left.collect_symbols(found);
                right.collect_symbols(found);
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.collect_symbols(found)),
        }
    }

    /// Evaluate with symbol values supplied by `lookup`
    pub fn eval<F>(&self, lookup: &F) -> Result<f64, EvalError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Symbol(name) => lookup(name).ok_or_else(|| EvalError::UnknownSymbol(name.clone())),
            Expr::Negate(inner) => Ok(-inner.eval(lookup)?),
            Expr::Binary { op, left, right } => Ok(op.apply(left.eval(lookup)?, right.eval(lookup)?)),
            Expr::Call { function, args } => {
                if args.len() != function.arity() {
                    return Err(EvalError::WrongArity {
                        function: function.name(),
                        expected: function.arity(),
                        found: args.len(),
                    });
                }
                let values = args
                    .iter()
                    .map(|a| a.eval(lookup))
                    .collect::<Result<Vec<f64>, EvalError>>()?;
                Ok(function.apply(&values))
            }
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "{}", value),
            Expr::Symbol(name) => write!(f, "{}", name),
            Expr::Negate(inner) => write!(f, "(-{})", inner),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl FromStr for Expr {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_expression(s)
    }
}

/// Errors from evaluating an expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Symbol `{0}` has no value")]
    UnknownSymbol(String),
    #[error("Function `{function}` takes {expected} argument(s), got {found}")]
    WrongArity {
        function: &'static str,
        expected: usize,
        found: usize,
    },
}
