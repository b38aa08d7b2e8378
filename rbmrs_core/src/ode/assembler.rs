//! Assembly of a reaction network into a mass action ODE right hand side
//!
//! The system keeps the stoichiometry and observable weights as CSR matrices and compiles
//! every expression into an index based tree. Expressions are evaluated from the current
//! state on every call, nothing is carried between evaluations.
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use tracing::info;

use crate::model::expression::{BinaryOp, Expr, Function};
use crate::model::model::{Model, SymbolRef};
use crate::network::reaction::ReactionNetwork;
use crate::observe::evaluator::weight_matrix;
use crate::ode::AssemblyError;

/// Where a reaction's rate value comes from
#[derive(Clone, Debug, PartialEq)]
pub enum RateSource {
    Constant(f64),
    Expression(usize),
    Observable(usize),
}

/// Expression tree with symbols resolved to indices
#[derive(Clone, Debug, PartialEq)]
enum Term {
    Number(f64),
    Parameter(usize),
    Expression(usize),
    Observable(usize),
    Negate(Box<Term>),
    Binary {
        op: BinaryOp,
        left: Box<Term>,
        right: Box<Term>,
    },
    Call {
        function: Function,
        args: Vec<Term>,
    },
}

impl Term {
    fn eval(&self, parameters: &[f64], expressions: &[f64], observables: &[f64]) -> f64 {
        match self {
            Term::Number(value) => *value,
            Term::Parameter(i) => parameters[*i],
            Term::Expression(i) => expressions[*i],
            Term::Observable(i) => observables[*i],
            Term::Negate(inner) => -inner.eval(parameters, expressions, observables),
            Term::Binary { op, left, right } => op.apply(
                left.eval(parameters, expressions, observables),
                right.eval(parameters, expressions, observables),
            ),
            Term::Call { function, args } => {
                let values: Vec<f64> = args
                    .iter()
                    .map(|a| a.eval(parameters, expressions, observables))
                    .collect();
                function.apply(&values)
            }
        }
    }
}

/// Builds [`OdeSystem`] values
pub struct OdeAssembler;

impl OdeAssembler {
    /// Assemble the ODE system of `network`, which must have been generated from `model`
    pub fn assemble(model: &Model, network: &ReactionNetwork) -> Result<OdeSystem, AssemblyError> {
        let types = model.molecule_types();
        for species in &network.species {
            let belongs = species.complex.molecules.iter().all(|m| {
                types
                    .get(m.molecule_type)
                    .map(|t| t.sites.len() == m.sites.len())
                    .unwrap_or(false)
            });
            if !belongs {
                return Err(AssemblyError::UnresolvedReference {
                    name: species.signature.clone(),
                    context: "network species".to_string(),
                });
            }
        }

        let n_species = network.species.len();
        let parameters: Vec<f64> = model.parameters().values().copied().collect();

        let mut expressions = Vec::with_capacity(model.expressions().len());
        for (i, (name, expr)) in model.expressions().iter().enumerate() {
            expressions.push(compile(model, expr, name, i)?);
        }

        let mut stoichiometry = CooMatrix::new(n_species, network.reactions.len());
        let mut orders: Vec<Vec<(usize, i32)>> = Vec::with_capacity(network.reactions.len());
        let mut rates = Vec::with_capacity(network.reactions.len());
        for (j, reaction) in network.reactions.iter().enumerate() {
            if let Some(&bad) = reaction
                .reactants
                .iter()
                .chain(&reaction.products)
                .find(|&&s| s >= n_species)
            {
                return Err(AssemblyError::DimensionMismatch {
                    expected: n_species,
                    found: bad + 1,
                });
            }
            for (species, coefficient) in reaction.stoichiometry() {
                stoichiometry.push(species, j, coefficient);
            }
            orders.push(
                reaction
                    .reactant_orders()
                    .into_iter()
                    .map(|(s, order)| (s, order as i32))
                    .collect(),
            );
            let source = match model.symbol(&reaction.rate) {
                Some(SymbolRef::Parameter(i)) => {
                    let value = parameters[i] * reaction.factor;
                    if !(value >= 0.0) {
                        return Err(AssemblyError::NegativeRate {
                            reaction: reaction.rule.clone(),
                            value,
                        });
                    }
                    RateSource::Constant(parameters[i])
                }
                Some(SymbolRef::Expression(i)) => RateSource::Expression(i),
                Some(SymbolRef::Observable(i)) => RateSource::Observable(i),
                None => {
                    return Err(AssemblyError::UnresolvedReference {
                        name: reaction.rate.clone(),
                        context: format!("reaction from rule {}", reaction.rule),
                    })
                }
            };
            rates.push(source);
        }

        let system = OdeSystem {
            stoichiometry: CsrMatrix::from(&stoichiometry),
            observable_weights: weight_matrix(model.observables(), &network.species),
            observable_names: model.observables().iter().map(|o| o.name.clone()).collect(),
            reaction_names: network.reactions.iter().map(|r| r.rule.clone()).collect(),
            factors: network.reactions.iter().map(|r| r.factor).collect(),
            orders,
            rates,
            parameters,
            expressions,
        };
        info!(
            species = system.species_count(),
            reactions = system.reaction_count(),
            observables = system.observable_names.len(),
            expressions = system.expressions.len(),
            "assembled ODE system"
        );
        Ok(system)
    }
}

fn compile(model: &Model, expr: &Expr, owner: &str, position: usize) -> Result<Term, AssemblyError> {
    Ok(match expr {
        Expr::Number(value) => Term::Number(*value),
        Expr::Symbol(name) => match model.symbol(name) {
            Some(SymbolRef::Parameter(i)) => Term::Parameter(i),
            // Evaluation order puts dependencies first
            Some(SymbolRef::Expression(i)) if i < position => Term::Expression(i),
            Some(SymbolRef::Observable(i)) => Term::Observable(i),
            _ => {
                return Err(AssemblyError::UnresolvedReference {
                    name: name.clone(),
                    context: format!("expression {}", owner),
                })
            }
        },
        Expr::Negate(inner) => Term::Negate(Box::new(compile(model, inner, owner, position)?)),
        Expr::Binary { op, left, right } => Term::Binary {
            op: *op,
            left: Box::new(compile(model, left, owner, position)?),
            right: Box::new(compile(model, right, owner, position)?),
        },
        Expr::Call { function, args } => {
            if args.len() != function.arity() {
                return Err(AssemblyError::InvalidExpression {
                    name: owner.to_string(),
                    reason: format!(
                        "{} takes {} argument(s), got {}",
                        function.name(),
                        function.arity(),
                        args.len()
                    ),
                });
            }
            Term::Call {
                function: *function,
                args: args
                    .iter()
                    .map(|a| compile(model, a, owner, position))
                    .collect::<Result<Vec<Term>, AssemblyError>>()?,
            }
        }
    })
}

/// The assembled right hand side `dx/dt = S v(x)`
///
/// Immutable once built, batch runs share one instance across threads.
#[derive(Clone, Debug)]
pub struct OdeSystem {
    /// Species by reactions
    stoichiometry: CsrMatrix<f64>,
    /// Observables by species
    observable_weights: CsrMatrix<f64>,
    observable_names: Vec<String>,
    reaction_names: Vec<String>,
    factors: Vec<f64>,
    /// Reactant species and their order, per reaction
    orders: Vec<Vec<(usize, i32)>>,
    rates: Vec<RateSource>,
    parameters: Vec<f64>,
    /// In evaluation order
    expressions: Vec<Term>,
}

impl OdeSystem {
    pub fn species_count(&self) -> usize {
        self.stoichiometry.nrows()
    }

    pub fn reaction_count(&self) -> usize {
        self.stoichiometry.ncols()
    }

    pub fn stoichiometry(&self) -> &CsrMatrix<f64> {
        &self.stoichiometry
    }

    pub fn observable_weights(&self) -> &CsrMatrix<f64> {
        &self.observable_weights
    }

    pub fn observable_names(&self) -> &[String] {
        &self.observable_names
    }

    pub fn rate_sources(&self) -> &[RateSource] {
        &self.rates
    }

    fn check_dimension(&self, x: &DVector<f64>) -> Result<(), AssemblyError> {
        if x.len() != self.species_count() {
            return Err(AssemblyError::DimensionMismatch {
                expected: self.species_count(),
                found: x.len(),
            });
        }
        Ok(())
    }

    /// Observable values `W x`
    pub fn observables(&self, x: &DVector<f64>) -> Result<DVector<f64>, AssemblyError> {
        self.check_dimension(x)?;
        Ok(self.weighted(x))
    }

    fn weighted(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.observable_weights.nrows(),
            self.observable_weights.row_iter().map(|row| {
                row.col_indices()
                    .iter()
                    .zip(row.values())
                    .map(|(&s, &w)| w * x[s])
                    .sum()
            }),
        )
    }

    /// Rate value of every reaction at state `x`, including the statistical factor
    pub fn rate_values(&self, x: &DVector<f64>) -> Result<DVector<f64>, AssemblyError> {
        self.check_dimension(x)?;
        let observables = self.weighted(x);
        let mut expressions = Vec::with_capacity(self.expressions.len());
        for term in &self.expressions {
            let value = term.eval(&self.parameters, &expressions, observables.as_slice());
            expressions.push(value);
        }
        let mut rates = DVector::zeros(self.reaction_count());
        for (j, source) in self.rates.iter().enumerate() {
            let k = match source {
                RateSource::Constant(value) => *value,
                RateSource::Expression(i) => expressions[*i],
                RateSource::Observable(i) => observables[*i],
            } * self.factors[j];
            if !(k >= 0.0) || !k.is_finite() {
                return Err(AssemblyError::NegativeRate {
                    reaction: self.reaction_names[j].clone(),
                    value: k,
                });
            }
            rates[j] = k;
        }
        Ok(rates)
    }

    /// Mass action fluxes `v_j = k_j * factor_j * prod x_i^r_ij`
    pub fn fluxes(&self, x: &DVector<f64>) -> Result<DVector<f64>, AssemblyError> {
        let mut flux = self.rate_values(x)?;
        for (j, reactants) in self.orders.iter().enumerate() {
            for &(s, order) in reactants {
                flux[j] *= x[s].powi(order);
            }
        }
        Ok(flux)
    }

    /// Evaluate `dx/dt` at `(t, x)` into `dxdt`
    ///
    /// The system is autonomous, `t` is accepted for the integrator interface.
    pub fn rhs(&self, _t: f64, x: &DVector<f64>, dxdt: &mut DVector<f64>) -> Result<(), AssemblyError> {
        if dxdt.len() != self.species_count() {
            return Err(AssemblyError::DimensionMismatch {
                expected: self.species_count(),
                found: dxdt.len(),
            });
        }
        let flux = self.fluxes(x)?;
        for (i, row) in self.stoichiometry.row_iter().enumerate() {
            dxdt[i] = row
                .col_indices()
                .iter()
                .zip(row.values())
                .map(|(&j, &c)| c * flux[j])
                .sum();
        }
        Ok(())
    }

    /// Jacobian of the right hand side by forward differences
    pub fn jacobian(&self, t: f64, x: &DVector<f64>) -> Result<DMatrix<f64>, AssemblyError> {
        let mut f0 = DVector::zeros(x.len());
        self.rhs(t, x, &mut f0)?;
        self.jacobian_at(t, x, &f0)
    }

    /// Forward difference Jacobian reusing an already computed `f0 = f(t, x)`
    pub fn jacobian_at(
        &self,
        t: f64,
        x: &DVector<f64>,
        f0: &DVector<f64>,
    ) -> Result<DMatrix<f64>, AssemblyError> {
        let n = x.len();
        let mut jacobian = DMatrix::zeros(n, n);
        let mut shifted = x.clone();
        let mut f1 = DVector::zeros(n);
        for j in 0..n {
            let h = f64::EPSILON.sqrt() * x[j].abs().max(1.0);
            shifted[j] = x[j] + h;
            self.rhs(t, &shifted, &mut f1)?;
            let column = (&f1 - f0) / h;
            jacobian.set_column(j, &column);
            shifted[j] = x[j];
        }
        Ok(jacobian)
    }
}
