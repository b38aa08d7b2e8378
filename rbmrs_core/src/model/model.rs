//! This module provides the [`ModelBuilder`] that collects declarations and the frozen
//! [`Model`] it produces
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::complex::{Bond, Complex, Molecule, SiteSlot};
use super::expression::{EvalError, Expr};
use super::molecule::MoleculeType;
use super::observable::{CompiledObservable, Observable};
use super::pattern::{BondSpec, ComplexPattern};
use super::rule::{CompiledRule, Rule};
use crate::io::syntax::{parse_expression, parse_molecule_type, parse_pattern, SyntaxError};
use crate::network::transform::DirectedRule;
use crate::utils::hashing::calculate_hash;

// region Declarations
/// A named immutable scalar
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
}

impl Parameter {
    pub fn new(name: &str, value: f64) -> Self {
        Parameter {
            name: name.to_string(),
            value,
        }
    }
}

/// A named scalar derived from parameters, observables and other expressions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub name: String,
    pub expr: Expr,
}

impl Expression {
    pub fn new(name: &str, expr: Expr) -> Self {
        Expression {
            name: name.to_string(),
            expr,
        }
    }

    /// Parse the expression body from text such as `ka * ka20 / (ka20 + Total_A20)`
    pub fn parse(name: &str, text: &str) -> Result<Expression, SyntaxError> {
        Ok(Expression::new(name, parse_expression(text)?))
    }

    /// Evaluate with the symbol values supplied by `lookup`
    pub fn eval<F>(&self, lookup: &F) -> Result<f64, EvalError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        self.expr.eval(lookup)
    }
}

/// Amount of an initial species, a list of numbers requests one run per entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Value(f64),
    Batch(Vec<f64>),
    /// Name of a parameter
    Parameter(String),
}

impl From<f64> for Quantity {
    fn from(value: f64) -> Self {
        Quantity::Value(value)
    }
}

impl From<Vec<f64>> for Quantity {
    fn from(values: Vec<f64>) -> Self {
        Quantity::Batch(values)
    }
}

impl From<&str> for Quantity {
    fn from(parameter: &str) -> Self {
        Quantity::Parameter(parameter.to_string())
    }
}

/// A fully specified species pattern and its starting amount
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Initial {
    pub pattern: ComplexPattern,
    pub quantity: Quantity,
}

impl Initial {
    pub fn new<Q: Into<Quantity>>(pattern: ComplexPattern, quantity: Q) -> Self {
        Initial {
            pattern,
            quantity: quantity.into(),
        }
    }
}
// endregion Declarations

// region Builder
/// Collects declarations in any order, checked and resolved by [`ModelBuilder::freeze`]
///
/// # Examples
/// ```rust
/// use rbmrs_core::model::model::ModelBuilder;
/// let mut builder = ModelBuilder::new();
/// builder
///     .molecule_type("X()").unwrap()
///     .parameter("kdeg", 0.01)
///     .rule("degrade", "X() -> 0, kdeg").unwrap()
///     .initial("X()", 1000.0).unwrap();
/// let model = builder.freeze().unwrap();
/// assert_eq!(model.rules().len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ModelBuilder {
    molecule_types: Vec<MoleculeType>,
    parameters: Vec<Parameter>,
    expressions: Vec<Expression>,
    rules: Vec<Rule>,
    observables: Vec<Observable>,
    initials: Vec<Initial>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        ModelBuilder::default()
    }

    pub fn add_molecule_type(&mut self, molecule_type: MoleculeType) -> &mut Self {
        self.molecule_types.push(molecule_type);
        self
    }

    pub fn add_parameter(&mut self, parameter: Parameter) -> &mut Self {
        self.parameters.push(parameter);
        self
    }

    pub fn add_expression(&mut self, expression: Expression) -> &mut Self {
        self.expressions.push(expression);
        self
    }

    pub fn add_rule(&mut self, rule: Rule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn add_observable(&mut self, observable: Observable) -> &mut Self {
        self.observables.push(observable);
        self
    }

    pub fn add_initial(&mut self, initial: Initial) -> &mut Self {
        self.initials.push(initial);
        self
    }

    /// Declare a molecule type from text such as `IkBa(nfkb,phos~u~p,loc~n~c)`
    pub fn molecule_type(&mut self, text: &str) -> Result<&mut Self, ModelDefinitionError> {
        let molecule_type = parse_molecule_type(text)?;
        Ok(self.add_molecule_type(molecule_type))
    }

    pub fn parameter(&mut self, name: &str, value: f64) -> &mut Self {
        self.add_parameter(Parameter::new(name, value))
    }

    pub fn expression(&mut self, name: &str, text: &str) -> Result<&mut Self, ModelDefinitionError> {
        let expression = Expression::parse(name, text)?;
        Ok(self.add_expression(expression))
    }

    pub fn rule(&mut self, name: &str, text: &str) -> Result<&mut Self, ModelDefinitionError> {
        let rule = Rule::parse(name, text)?;
        Ok(self.add_rule(rule))
    }

    pub fn observable(&mut self, name: &str, text: &str) -> Result<&mut Self, ModelDefinitionError> {
        let observable = Observable::parse(name, text)?;
        Ok(self.add_observable(observable))
    }

    pub fn initial<Q: Into<Quantity>>(
        &mut self,
        pattern: &str,
        quantity: Q,
    ) -> Result<&mut Self, ModelDefinitionError> {
        let pattern = parse_pattern(pattern)?;
        Ok(self.add_initial(Initial::new(pattern, quantity)))
    }

    /// Check referential integrity and produce the immutable [`Model`]
    ///
    /// The first violation found is returned.
    pub fn freeze(&self) -> Result<Model, ModelDefinitionError> {
        let molecule_types = self.check_molecule_types()?;
        let symbols = self.symbol_table()?;

        let mut parameters = IndexMap::new();
        for parameter in &self.parameters {
            if !parameter.value.is_finite() {
                return Err(ModelDefinitionError::InvalidParameter {
                    name: parameter.name.clone(),
                    value: parameter.value,
                });
            }
            parameters.insert(parameter.name.clone(), parameter.value);
        }

        let observables = self
            .observables
            .iter()
            .map(|observable| {
                let patterns = observable
                    .patterns
                    .iter()
                    .map(|p| resolve_pattern(&molecule_types, p))
                    .collect::<Result<Vec<Complex>, ModelDefinitionError>>()?;
                Ok(CompiledObservable {
                    name: observable.name.clone(),
                    patterns,
                })
            })
            .collect::<Result<Vec<CompiledObservable>, ModelDefinitionError>>()?;

        let order = order_expressions(&self.expressions, &symbols)?;
        let expressions: IndexMap<String, Expr> = order
            .into_iter()
            .map(|i| (self.expressions[i].name.clone(), self.expressions[i].expr.clone()))
            .collect();

        let mut rules = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            rules.push(compile_rule(rule, &molecule_types, &symbols)?);
        }

        let mut initials: Vec<CompiledInitial> = Vec::with_capacity(self.initials.len());
        let mut seen: HashSet<Complex> = HashSet::new();
        let mut batch: Option<(usize, String)> = None;
        for initial in &self.initials {
            let species = resolve_species(&molecule_types, &initial.pattern)?;
            if !seen.insert(species.clone()) {
                return Err(ModelDefinitionError::DuplicateName {
                    kind: "initial",
                    name: initial.pattern.to_string(),
                });
            }
            let values = match &initial.quantity {
                Quantity::Value(value) => vec![*value],
                Quantity::Parameter(name) => match parameters.get(name) {
                    Some(value) => vec![*value],
                    None => {
                        return Err(ModelDefinitionError::UnresolvedReference {
                            name: name.clone(),
                            context: format!("initial {}", initial.pattern),
                        })
                    }
                },
                Quantity::Batch(values) => {
                    if values.is_empty() {
                        return Err(ModelDefinitionError::InvalidInitial {
                            pattern: initial.pattern.to_string(),
                            reason: "batch list is empty".to_string(),
                        });
                    }
                    match &batch {
                        Some((expected, first)) if *expected != values.len() => {
                            return Err(ModelDefinitionError::InconsistentBatch {
                                pattern: initial.pattern.to_string(),
                                expected: *expected,
                                found: values.len(),
                                first: first.clone(),
                            })
                        }
                        Some(_) => {}
                        None => batch = Some((values.len(), initial.pattern.to_string())),
                    }
                    values.clone()
                }
            };
            if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(ModelDefinitionError::InvalidInitial {
                    pattern: initial.pattern.to_string(),
                    reason: format!("amount {} is not a finite non-negative number", bad),
                });
            }
            initials.push(CompiledInitial {
                pattern: initial.pattern.clone(),
                species,
                values,
            });
        }

        debug!(
            molecule_types = molecule_types.len(),
            rules = rules.len(),
            observables = observables.len(),
            expressions = expressions.len(),
            "froze model"
        );
        Ok(Model {
            molecule_types,
            parameters,
            expressions,
            observables,
            rules,
            initials,
            batch_size: batch.map(|(n, _)| n).unwrap_or(1),
        })
    }

    fn check_molecule_types(&self) -> Result<Vec<MoleculeType>, ModelDefinitionError> {
        let mut names = HashSet::new();
        for molecule_type in &self.molecule_types {
            if !names.insert(molecule_type.name.as_str()) {
                return Err(ModelDefinitionError::DuplicateName {
                    kind: "molecule type",
                    name: molecule_type.name.clone(),
                });
            }
            let mut sites = HashSet::new();
            for site in &molecule_type.sites {
                if !sites.insert(site.name.as_str()) {
                    return Err(ModelDefinitionError::DuplicateSite {
                        molecule: molecule_type.name.clone(),
                        site: site.name.clone(),
                    });
                }
                let mut states = HashSet::new();
                for state in &site.states {
                    if !states.insert(state.as_str()) {
                        return Err(ModelDefinitionError::DuplicateState {
                            molecule: molecule_type.name.clone(),
                            site: site.name.clone(),
                            state: state.clone(),
                        });
                    }
                }
            }
        }
        Ok(self.molecule_types.clone())
    }

    /// Parameters, expressions and observables share one namespace
    fn symbol_table(&self) -> Result<HashMap<&str, SymbolKind>, ModelDefinitionError> {
        let mut symbols = HashMap::new();
        let declared = self
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), SymbolKind::Parameter))
            .chain(
                self.expressions
                    .iter()
                    .map(|e| (e.name.as_str(), SymbolKind::Expression)),
            )
            .chain(
                self.observables
                    .iter()
                    .map(|o| (o.name.as_str(), SymbolKind::Observable)),
            );
        for (name, kind) in declared {
            if symbols.insert(name, kind).is_some() {
                return Err(ModelDefinitionError::DuplicateName {
                    kind: kind.describe(),
                    name: name.to_string(),
                });
            }
        }
        let mut rules = HashSet::new();
        for rule in &self.rules {
            if !rules.insert(rule.name.as_str()) {
                return Err(ModelDefinitionError::DuplicateName {
                    kind: "rule",
                    name: rule.name.clone(),
                });
            }
        }
        Ok(symbols)
    }
}
// endregion Builder

// region Resolution
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SymbolKind {
    Parameter,
    Expression,
    Observable,
}

impl SymbolKind {
    fn describe(&self) -> &'static str {
        match self {
            SymbolKind::Parameter => "parameter",
            SymbolKind::Expression => "expression",
            SymbolKind::Observable => "observable",
        }
    }
}

/// Expression indices in an order where every expression follows the expressions it reads
fn order_expressions(
    expressions: &[Expression],
    symbols: &HashMap<&str, SymbolKind>,
) -> Result<Vec<usize>, ModelDefinitionError> {
    let position: HashMap<&str, usize> = expressions
        .iter()
        .enumerate()
        .map(|(i, e)| (e.name.as_str(), i))
        .collect();
    for expression in expressions {
        for symbol in expression.expr.symbols() {
            if !symbols.contains_key(symbol) {
                return Err(ModelDefinitionError::UnresolvedReference {
                    name: symbol.to_string(),
                    context: format!("expression {}", expression.name),
                });
            }
        }
    }

    // 0 unvisited, 1 on the current path, 2 finished
    fn visit(
        i: usize,
        expressions: &[Expression],
        position: &HashMap<&str, usize>,
        marks: &mut [u8],
        order: &mut Vec<usize>,
    ) -> Result<(), ModelDefinitionError> {
        match marks[i] {
            2 => return Ok(()),
            1 => return Err(ModelDefinitionError::CyclicReference(expressions[i].name.clone())),
            _ => {}
        }
        marks[i] = 1;
        for symbol in expressions[i].expr.symbols() {
            if let Some(&dependency) = position.get(symbol) {
                visit(dependency, expressions, position, marks, order)?;
            }
        }
        marks[i] = 2;
        order.push(i);
        Ok(())
    }

    let mut marks = vec![0u8; expressions.len()];
    let mut order = Vec::with_capacity(expressions.len());
    for i in 0..expressions.len() {
        visit(i, expressions, &position, &mut marks, &mut order)?;
    }
    Ok(order)
}

fn compile_rule(
    rule: &Rule,
    molecule_types: &[MoleculeType],
    symbols: &HashMap<&str, SymbolKind>,
) -> Result<CompiledRule, ModelDefinitionError> {
    if rule.reactants.is_empty() && rule.products.is_empty() {
        return Err(ModelDefinitionError::InvalidRule {
            rule: rule.name.clone(),
            reason: "both sides are empty".to_string(),
        });
    }
    for rate in std::iter::once(&rule.rate).chain(rule.reverse_rate.iter()) {
        if !symbols.contains_key(rate.as_str()) {
            return Err(ModelDefinitionError::UnresolvedReference {
                name: rate.clone(),
                context: format!("rule {}", rule.name),
            });
        }
    }
    let reactants = rule
        .reactants
        .iter()
        .map(|p| resolve_pattern(molecule_types, p))
        .collect::<Result<Vec<Complex>, ModelDefinitionError>>()?;
    let products = rule
        .products
        .iter()
        .map(|p| resolve_pattern(molecule_types, p))
        .collect::<Result<Vec<Complex>, ModelDefinitionError>>()?;
    let compiled = CompiledRule {
        name: rule.name.clone(),
        reactants,
        products,
        rate: rule.rate.clone(),
        reverse_rate: rule.reverse_rate.clone(),
    };
    // Both directions must be applicable, this rejects e.g. `!+` on a synthesized molecule
    DirectedRule::compile(0, &compiled, false, molecule_types)?;
    if compiled.reverse_rate.is_some() {
        DirectedRule::compile(0, &compiled, true, molecule_types)?;
    }
    Ok(compiled)
}

/// Resolve a name based pattern into an index based [`Complex`]
///
/// Unmentioned sites become wildcards, bond labels must appear exactly twice.
pub fn resolve_pattern(
    molecule_types: &[MoleculeType],
    pattern: &ComplexPattern,
) -> Result<Complex, ModelDefinitionError> {
    let mut molecules = Vec::with_capacity(pattern.molecules.len());
    let mut labels: IndexMap<u32, Vec<(usize, usize)>> = IndexMap::new();
    for (m, molecule) in pattern.molecules.iter().enumerate() {
        let type_index = molecule_types
            .iter()
            .position(|t| t.name == molecule.molecule)
            .ok_or_else(|| ModelDefinitionError::UnknownMoleculeType(molecule.molecule.clone()))?;
        let molecule_type = &molecule_types[type_index];
        let mut instance = Molecule::wildcard(type_index, molecule_type.sites.len());
        let mut mentioned = vec![false; molecule_type.sites.len()];
        for spec in &molecule.sites {
            let s = molecule_type
                .site_index(&spec.site)
                .ok_or_else(|| ModelDefinitionError::UnknownSite {
                    molecule: molecule.molecule.clone(),
                    site: spec.site.clone(),
                })?;
            if mentioned[s] {
                return Err(ModelDefinitionError::DuplicateSite {
                    molecule: molecule.molecule.clone(),
                    site: spec.site.clone(),
                });
            }
            mentioned[s] = true;
            let state = match &spec.state {
                None => None,
                Some(state) => Some(molecule_type.sites[s].state_index(state).ok_or_else(|| {
                    ModelDefinitionError::InvalidState {
                        molecule: molecule.molecule.clone(),
                        site: spec.site.clone(),
                        state: state.clone(),
                    }
                })?),
            };
            let bond = match spec.bond {
                BondSpec::Free => Bond::Free,
                BondSpec::Bound => Bond::Bound,
                BondSpec::Wildcard => Bond::Wildcard,
                BondSpec::Label(label) => {
                    labels.entry(label).or_default().push((m, s));
                    // Filled in once every label has been collected
                    Bond::Wildcard
                }
            };
            instance.sites[s] = SiteSlot { state, bond };
        }
        molecules.push(instance);
    }
    for (label, ends) in &labels {
        match ends.as_slice() {
            [(m1, s1), (m2, s2)] => {
                molecules[*m1].sites[*s1].bond = Bond::To(*m2, *s2);
                molecules[*m2].sites[*s2].bond = Bond::To(*m1, *s1);
            }
            [_] => {
                return Err(ModelDefinitionError::DanglingBond {
                    label: *label,
                    pattern: pattern.to_string(),
                })
            }
            _ => {
                return Err(ModelDefinitionError::OverusedBond {
                    label: *label,
                    pattern: pattern.to_string(),
                })
            }
        }
    }
    Ok(Complex::new(molecules))
}

/// Resolve a pattern that must name exactly one species, returned in canonical form
pub fn resolve_species(
    molecule_types: &[MoleculeType],
    pattern: &ComplexPattern,
) -> Result<Complex, ModelDefinitionError> {
    let complex = resolve_pattern(molecule_types, pattern)?;
    let reason = if complex.is_empty() {
        Some("pattern is empty")
    } else if !complex.is_fully_specified(molecule_types) {
        Some("every site needs a bond and every stateful site a state")
    } else if !complex.is_connected() {
        Some("molecules do not form one connected complex")
    } else {
        None
    };
    if let Some(reason) = reason {
        return Err(ModelDefinitionError::InvalidInitial {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        });
    }
    Ok(complex.canonicalize())
}
// endregion Resolution

// region Model
/// An initial species with its resolved amounts, one entry broadcasts across a batch
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledInitial {
    pub pattern: ComplexPattern,
    /// Canonical form of the species
    pub species: Complex,
    pub values: Vec<f64>,
}

impl CompiledInitial {
    /// Amount used for entry `run` of a batch
    pub fn value(&self, run: usize) -> f64 {
        if self.values.len() == 1 {
            self.values[0]
        } else {
            self.values[run]
        }
    }
}

/// What a rate or expression symbol refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolRef {
    Parameter(usize),
    Expression(usize),
    Observable(usize),
}

/// A frozen, checked rule-based model
#[derive(Clone, Debug)]
pub struct Model {
    molecule_types: Vec<MoleculeType>,
    parameters: IndexMap<String, f64>,
    /// Stored in evaluation order
    expressions: IndexMap<String, Expr>,
    observables: Vec<CompiledObservable>,
    rules: Vec<CompiledRule>,
    initials: Vec<CompiledInitial>,
    batch_size: usize,
}

impl Model {
    pub fn molecule_types(&self) -> &[MoleculeType] {
        &self.molecule_types
    }

    pub fn parameters(&self) -> &IndexMap<String, f64> {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    /// Expressions in evaluation order
    pub fn expressions(&self) -> &IndexMap<String, Expr> {
        &self.expressions
    }

    pub fn observables(&self) -> &[CompiledObservable] {
        &self.observables
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn initials(&self) -> &[CompiledInitial] {
        &self.initials
    }

    /// Number of runs requested by batched initials (1 when there are none)
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Look up a parameter, expression or observable by name
    pub fn symbol(&self, name: &str) -> Option<SymbolRef> {
        if let Some(i) = self.parameters.get_index_of(name) {
            return Some(SymbolRef::Parameter(i));
        }
        if let Some(i) = self.expressions.get_index_of(name) {
            return Some(SymbolRef::Expression(i));
        }
        self.observables
            .iter()
            .position(|o| o.name == name)
            .map(SymbolRef::Observable)
    }

    /// Resolve pattern text against this model's molecule types
    pub fn pattern(&self, text: &str) -> Result<Complex, ModelDefinitionError> {
        resolve_pattern(&self.molecule_types, &parse_pattern(text)?)
    }

    /// Resolve species text into its canonical form
    pub fn species(&self, text: &str) -> Result<Complex, ModelDefinitionError> {
        resolve_species(&self.molecule_types, &parse_pattern(text)?)
    }

    /// Hash of everything the reaction network depends on
    ///
    /// Parameter values, expressions and observables do not change the network and are left
    /// out, so models that only differ in those share a cached network.
    pub fn network_fingerprint(&self) -> u64 {
        let seeds: Vec<&Complex> = self.initials.iter().map(|i| &i.species).collect();
        calculate_hash(&(&self.molecule_types, &self.rules, seeds))
    }
}

impl Display for Model {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Model with {} molecule types, {} rules, {} observables",
            self.molecule_types.len(),
            self.rules.len(),
            self.observables.len()
        )?;
        for molecule_type in &self.molecule_types {
            writeln!(f, "  {}", molecule_type)?;
        }
        Ok(())
    }
}
// endregion Model

/// Errors raised while freezing a model, each names the violated reference
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelDefinitionError {
    #[error("Duplicate {kind} `{name}`")]
    DuplicateName { kind: &'static str, name: String },
    #[error("Site `{site}` appears more than once on `{molecule}`")]
    DuplicateSite { molecule: String, site: String },
    #[error("State `{state}` is declared more than once on `{molecule}({site})`")]
    DuplicateState {
        molecule: String,
        site: String,
        state: String,
    },
    #[error("Unknown molecule type `{0}`")]
    UnknownMoleculeType(String),
    #[error("Molecule type `{molecule}` has no site `{site}`")]
    UnknownSite { molecule: String, site: String },
    #[error("State `{state}` is not in the domain of `{molecule}({site})`")]
    InvalidState {
        molecule: String,
        site: String,
        state: String,
    },
    #[error("Bond label {label} appears only once in `{pattern}`")]
    DanglingBond { label: u32, pattern: String },
    #[error("Bond label {label} appears more than twice in `{pattern}`")]
    OverusedBond { label: u32, pattern: String },
    #[error("`{name}` referenced by {context} is not a parameter, expression or observable")]
    UnresolvedReference { name: String, context: String },
    #[error("Expression `{0}` depends on itself")]
    CyclicReference(String),
    #[error("Parameter `{name}` has non-finite value {value}")]
    InvalidParameter { name: String, value: f64 },
    #[error("Rule `{rule}` is invalid: {reason}")]
    InvalidRule { rule: String, reason: String },
    #[error("Initial `{pattern}` is invalid: {reason}")]
    InvalidInitial { pattern: String, reason: String },
    #[error("Initial `{pattern}` has {found} batch entries but `{first}` has {expected}")]
    InconsistentBatch {
        pattern: String,
        expected: usize,
        found: usize,
        first: String,
    },
    #[error("Unable to parse declaration: {0}")]
    Syntax(#[from] SyntaxError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding() -> ModelBuilder {
        let mut builder = ModelBuilder::new();
        builder
            .molecule_type("A(b,t~u~p)")
            .unwrap()
            .molecule_type("B(a)")
            .unwrap()
            .parameter("kf", 1.0)
            .parameter("kr", 0.1)
            .rule("bind", "A(b) + B(a) <-> A(b!1).B(a!1), kf, kr")
            .unwrap()
            .observable("Free_A", "A(b)")
            .unwrap()
            .initial("A(b,t~u)", 100.0)
            .unwrap()
            .initial("B(a)", 100.0)
            .unwrap();
        builder
    }

    #[test]
    fn freeze_resolves_declarations() {
        let model = binding().freeze().unwrap();
        assert_eq!(model.molecule_types().len(), 2);
        assert_eq!(model.rules()[0].reactants.len(), 2);
        assert_eq!(model.symbol("kr"), Some(SymbolRef::Parameter(1)));
        assert_eq!(model.symbol("Free_A"), Some(SymbolRef::Observable(0)));
        assert_eq!(model.symbol("nope"), None);
        assert_eq!(model.batch_size(), 1);
        assert_eq!(model.initials()[0].value(0), 100.0);
    }

    #[test]
    fn unknown_site_and_state() {
        let mut builder = binding();
        builder.observable("Bad", "A(c)").unwrap();
        assert_eq!(
            builder.freeze().unwrap_err(),
            ModelDefinitionError::UnknownSite {
                molecule: "A".to_string(),
                site: "c".to_string()
            }
        );

        let mut builder = binding();
        builder.observable("Bad", "A(t~x)").unwrap();
        match builder.freeze() {
            Err(ModelDefinitionError::InvalidState { state, .. }) => assert_eq!(state, "x"),
            other => panic!("Expected an invalid state, got {:?}", other),
        }

        let mut builder = binding();
        builder.observable("Bad", "C()").unwrap();
        assert_eq!(
            builder.freeze().unwrap_err(),
            ModelDefinitionError::UnknownMoleculeType("C".to_string())
        );
    }

    #[test]
    fn bond_labels_must_pair() {
        let mut builder = binding();
        builder.observable("Bad", "A(b!1)").unwrap();
        match builder.freeze() {
            Err(ModelDefinitionError::DanglingBond { label, .. }) => assert_eq!(label, 1),
            other => panic!("Expected a dangling bond, got {:?}", other),
        }
    }

    #[test]
    fn unresolved_rate_and_expression_symbols() {
        let mut builder = binding();
        builder.rule("bad", "A(t~u) -> A(t~p), kmissing").unwrap();
        match builder.freeze() {
            Err(ModelDefinitionError::UnresolvedReference { name, .. }) => {
                assert_eq!(name, "kmissing")
            }
            other => panic!("Expected an unresolved reference, got {:?}", other),
        }

        let mut builder = binding();
        builder.expression("e", "kf * Missing_Obs").unwrap();
        match builder.freeze() {
            Err(ModelDefinitionError::UnresolvedReference { name, .. }) => {
                assert_eq!(name, "Missing_Obs")
            }
            other => panic!("Expected an unresolved reference, got {:?}", other),
        }
    }

    #[test]
    fn expressions_are_ordered_and_cycles_rejected() {
        let mut builder = binding();
        builder
            .expression("late", "early * 2")
            .unwrap()
            .expression("early", "kf + Free_A")
            .unwrap();
        let model = builder.freeze().unwrap();
        let order: Vec<&str> = model.expressions().keys().map(|k| k.as_str()).collect();
        assert_eq!(order, vec!["early", "late"]);

        let mut builder = binding();
        builder
            .expression("x", "y + 1")
            .unwrap()
            .expression("y", "x * kf")
            .unwrap();
        assert_eq!(
            builder.freeze().unwrap_err(),
            ModelDefinitionError::CyclicReference("x".to_string())
        );
    }

    #[test]
    fn duplicate_names() {
        let mut builder = binding();
        builder.parameter("Free_A", 3.0);
        match builder.freeze() {
            Err(ModelDefinitionError::DuplicateName { name, .. }) => assert_eq!(name, "Free_A"),
            other => panic!("Expected a duplicate name, got {:?}", other),
        }

        let mut builder = binding();
        builder.molecule_type("B(x)").unwrap();
        match builder.freeze() {
            Err(ModelDefinitionError::DuplicateName { kind, .. }) => assert_eq!(kind, "molecule type"),
            other => panic!("Expected a duplicate name, got {:?}", other),
        }
    }

    #[test]
    fn initials_must_be_species() {
        let mut builder = binding();
        builder.initial("A(b)", 1.0).unwrap();
        match builder.freeze() {
            Err(ModelDefinitionError::InvalidInitial { pattern, .. }) => assert_eq!(pattern, "A(b)"),
            other => panic!("Expected an invalid initial, got {:?}", other),
        }

        // Same species written with a different site order
        let mut builder = binding();
        builder.initial("A(t~u,b)", 5.0).unwrap();
        match builder.freeze() {
            Err(ModelDefinitionError::DuplicateName { kind, .. }) => assert_eq!(kind, "initial"),
            other => panic!("Expected a duplicate initial, got {:?}", other),
        }
    }

    #[test]
    fn batch_lengths_must_agree() {
        let mut builder = ModelBuilder::new();
        builder
            .molecule_type("X()")
            .unwrap()
            .molecule_type("Y()")
            .unwrap()
            .initial("X()", vec![1.0, 2.0, 3.0])
            .unwrap()
            .initial("Y()", vec![1.0, 2.0])
            .unwrap();
        match builder.freeze() {
            Err(ModelDefinitionError::InconsistentBatch { expected, found, .. }) => {
                assert_eq!((expected, found), (3, 2))
            }
            other => panic!("Expected an inconsistent batch, got {:?}", other),
        }

        builder.initials.pop();
        builder.initial("Y()", "ky").unwrap().parameter("ky", 7.0);
        let model = builder.freeze().unwrap();
        assert_eq!(model.batch_size(), 3);
        assert_eq!(model.initials()[0].value(2), 3.0);
        assert_eq!(model.initials()[1].value(2), 7.0);
    }

    #[test]
    fn bound_condition_on_synthesized_molecule() {
        let mut builder = binding();
        builder.parameter("ks", 1.0).rule("bad", "0 -> B(a!+), ks").unwrap();
        match builder.freeze() {
            Err(ModelDefinitionError::InvalidRule { rule, .. }) => assert_eq!(rule, "bad"),
            other => panic!("Expected an invalid rule, got {:?}", other),
        }
    }

    #[test]
    fn fingerprint_ignores_parameter_values() {
        let a = binding().freeze().unwrap();
        let mut builder = binding();
        builder.parameters[0].value = 2.0;
        let b = builder.freeze().unwrap();
        assert_eq!(a.network_fingerprint(), b.network_fingerprint());

        let mut builder = binding();
        builder.rule("phos", "A(t~u) -> A(t~p), kf").unwrap();
        let c = builder.freeze().unwrap();
        assert_ne!(a.network_fingerprint(), c.network_fingerprint());
    }
}
