//! Pipeline facade: generate, assemble, integrate and evaluate observables in one call
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use nalgebra::DVector;
use thiserror::Error;
use tracing::info;

use crate::configuration::{IntegratorConfiguration, NetworkConfiguration};
use crate::integrate::{IntegrationError, Integrator, Trajectory};
use crate::model::model::{Model, ModelDefinitionError, Quantity};
use crate::network::{NetworkError, NetworkGenerator, ReactionNetwork};
use crate::observe::{ObservableError, ObservableEvaluator, ObservableTable};
use crate::ode::{AssemblyError, OdeAssembler, OdeSystem};

/// `n` evenly spaced points from `start` to `stop`, both included
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let mut points: Vec<f64> = (0..n)
                .map(|i| start + (stop - start) * i as f64 / (n - 1) as f64)
                .collect();
            points[n - 1] = stop;
            points
        }
    }
}

/// Generated networks keyed by [`Model::network_fingerprint`]
///
/// Models that differ only in parameter values, expressions or observables reuse one network.
#[derive(Debug, Default)]
pub struct NetworkCache {
    networks: HashMap<u64, Arc<ReactionNetwork>>,
}

impl NetworkCache {
    pub fn new() -> Self {
        NetworkCache::default()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Cached network for `model`, generated on a miss. Failures are not cached.
    pub fn get_or_generate(
        &mut self,
        model: &Model,
        configuration: &NetworkConfiguration,
    ) -> Result<Arc<ReactionNetwork>, NetworkError> {
        let key = model.network_fingerprint();
        if let Some(network) = self.networks.get(&key) {
            return Ok(Arc::clone(network));
        }
        let network = Arc::new(NetworkGenerator::new(model, configuration.clone()).generate()?);
        self.networks.insert(key, Arc::clone(&network));
        Ok(network)
    }
}

/// Trajectory and observables of one batch entry
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationResult {
    pub trajectory: Trajectory,
    pub observables: ObservableTable,
}

/// A model with its network, ODE system and observable weights ready to integrate
pub struct Simulator {
    model: Model,
    network: Arc<ReactionNetwork>,
    system: OdeSystem,
    evaluator: ObservableEvaluator,
    integrator: Integrator,
}

impl Simulator {
    pub fn new(
        model: Model,
        network_configuration: NetworkConfiguration,
        integrator_configuration: IntegratorConfiguration,
    ) -> Result<Self, SimulationError> {
        let network = Arc::new(NetworkGenerator::new(&model, network_configuration).generate()?);
        Self::from_network(model, network, integrator_configuration)
    }

    /// Like [`Simulator::new`] but takes the network from `cache` when possible
    pub fn with_cache(
        model: Model,
        cache: &mut NetworkCache,
        network_configuration: &NetworkConfiguration,
        integrator_configuration: IntegratorConfiguration,
    ) -> Result<Self, SimulationError> {
        let network = cache.get_or_generate(&model, network_configuration)?;
        Self::from_network(model, network, integrator_configuration)
    }

    fn from_network(
        model: Model,
        network: Arc<ReactionNetwork>,
        integrator_configuration: IntegratorConfiguration,
    ) -> Result<Self, SimulationError> {
        let integrator = Integrator::new(integrator_configuration)?;
        let system = OdeAssembler::assemble(&model, &network)?;
        let evaluator = ObservableEvaluator::new(&model, &network);
        info!(
            species = network.species.len(),
            reactions = network.reactions.len(),
            batch = model.batch_size(),
            "simulator ready"
        );
        Ok(Simulator {
            model,
            network,
            system,
            evaluator,
            integrator,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn network(&self) -> &ReactionNetwork {
        &self.network
    }

    pub fn system(&self) -> &OdeSystem {
        &self.system
    }

    pub fn evaluator(&self) -> &ObservableEvaluator {
        &self.evaluator
    }

    /// Initial state vectors, one per batch entry
    ///
    /// `overrides` replaces (or adds) the amount of the species written as pattern text, e.g.
    /// `TNFa(tnfr1)`. A single value broadcasts across the batch, lists must all share one
    /// length which sets the batch size.
    pub fn initial_conditions(
        &self,
        overrides: &IndexMap<String, Quantity>,
    ) -> Result<Vec<DVector<f64>>, SimulationError> {
        let mut amounts: IndexMap<usize, (String, Vec<f64>)> = IndexMap::new();
        for initial in self.model.initials() {
            let index = self
                .network
                .species_index(&initial.species)
                .ok_or_else(|| SimulationError::UnknownSpecies(initial.pattern.to_string()))?;
            amounts.insert(index, (initial.pattern.to_string(), initial.values.clone()));
        }
        for (text, quantity) in overrides {
            let species = self.model.species(text)?;
            let index = self
                .network
                .species_index(&species)
                .ok_or_else(|| SimulationError::UnknownSpecies(text.clone()))?;
            let values = match quantity {
                Quantity::Value(value) => vec![*value],
                Quantity::Batch(values) => values.clone(),
                Quantity::Parameter(name) => {
                    vec![self.model.parameter(name).ok_or_else(|| {
                        SimulationError::Model(ModelDefinitionError::UnresolvedReference {
                            name: name.clone(),
                            context: format!("initial amount override for {}", text),
                        })
                    })?]
                }
            };
            if values.is_empty() {
                return Err(SimulationError::EmptyBatch(text.clone()));
            }
            amounts.insert(index, (text.clone(), values));
        }

        let mut batch: Option<(&str, usize)> = None;
        for (pattern, values) in amounts.values() {
            if values.len() == 1 {
                continue;
            }
            match batch {
                None => batch = Some((pattern.as_str(), values.len())),
                Some((first, expected)) if expected != values.len() => {
                    return Err(SimulationError::InconsistentBatch {
                        pattern: pattern.clone(),
                        expected,
                        found: values.len(),
                        first: first.to_string(),
                    })
                }
                Some(_) => {}
            }
        }
        let runs = batch.map(|(_, n)| n).unwrap_or(1);

        Ok((0..runs)
            .map(|run| {
                let mut x0 = DVector::zeros(self.system.species_count());
                for (&index, (_, values)) in &amounts {
                    x0[index] = if values.len() == 1 { values[0] } else { values[run] };
                }
                x0
            })
            .collect())
    }

    /// Integrate every batch entry over `grid` and evaluate the observables
    ///
    /// Building the initial states can fail as a whole, after that each entry succeeds or
    /// fails on its own.
    pub fn run(
        &self,
        grid: &[f64],
        overrides: &IndexMap<String, Quantity>,
    ) -> Result<Vec<Result<SimulationResult, SimulationError>>, SimulationError> {
        let initials = self.initial_conditions(overrides)?;
        info!(runs = initials.len(), points = grid.len(), "running batch");
        Ok(self
            .integrator
            .integrate_batch(&self.system, &initials, grid)
            .into_iter()
            .map(|result| {
                let trajectory = result?;
                let observables = self.evaluator.evaluate(&trajectory)?;
                Ok(SimulationResult {
                    trajectory,
                    observables,
                })
            })
            .collect())
    }
}

/// Errors raised by the simulator, wrapping the stage that failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Model error: {0}")]
    Model(#[from] ModelDefinitionError),
    #[error("Network generation failed: {0}")]
    Network(#[from] NetworkError),
    #[error("ODE assembly failed: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("Integration failed: {0}")]
    Integration(#[from] IntegrationError),
    #[error("Observable evaluation failed: {0}")]
    Observable(#[from] ObservableError),
    #[error("Species `{0}` is not part of the generated network")]
    UnknownSpecies(String),
    #[error("Initial amount list for `{0}` is empty")]
    EmptyBatch(String),
    #[error("Initial `{pattern}` has {found} batch entries but `{first}` has {expected}")]
    InconsistentBatch {
        pattern: String,
        expected: usize,
        found: usize,
        first: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::model::ModelBuilder;
    use approx::assert_relative_eq;

    /// Lipniacki et al. (2007) TNFa to NF-kB signalling model
    fn tnfa_model() -> ModelBuilder {
        let mut builder = ModelBuilder::new();
        for molecule_type in [
            "TNFa(tnfr1)",
            "TNFR1(tnfa)",
            "IKKK(state~n~a)",
            "IKK(state~n~a~i~ii)",
            "A20()",
            "IkBa(nfkb,phos~u~p,loc~n~c)",
            "NFkB(ikba,dna,loc~n~c)",
            "DNA(a20t,ikbat)",
            "A20_mRNA()",
            "IkBa_mRNA()",
        ] {
            builder.molecule_type(molecule_type).unwrap();
        }
        for (name, value) in [
            ("TNFa_init", 1.0),
            ("TNFR1_init", 1000.0),
            ("IKKK_init", 10000.0),
            ("IKK_init", 200000.0),
            ("A20_init", 10.0),
            ("IkBa_init", 135000.0),
            ("NFkB_init", 100000.0),
            ("DNA_init", 2.0),
            ("A20_mRNA_init", 1.0),
            ("IkBa_mRNA_init", 1.0),
            ("ka20", 10000.0),
            ("c5", 0.0005),
            ("ka", 0.0001),
            ("ki", 0.01),
            ("k1", 0.000005),
            ("k2", 10000.0),
            ("k3", 0.003),
            ("k4", 0.0005),
            ("a2", 0.0000001),
            ("tp", 0.01),
            ("c5a", 0.0001),
            ("a3", 0.0000005),
            ("c6a", 0.00002),
            ("e2a", 0.05),
            ("e1a", 0.005),
            ("i1a", 0.002),
            ("a1", 0.0000005),
            ("c4", 0.5),
            ("c3", 0.00075),
            ("i1", 0.01),
            ("c1", 0.1),
            ("kf", 0.0006),
            ("kb", 0.000004),
            ("q1", 0.00000015),
            ("q2", 0.000001),
            ("kv", 5.0),
        ] {
            builder.parameter(name, value);
        }
        for (pattern, quantity) in [
            ("TNFa(tnfr1)", "TNFa_init"),
            ("TNFR1(tnfa)", "TNFR1_init"),
            ("IKKK(state~n)", "IKKK_init"),
            ("IKK(state~n)", "IKK_init"),
            ("A20()", "A20_init"),
            ("IkBa(nfkb,phos~u,loc~c)", "IkBa_init"),
            ("NFkB(ikba,dna,loc~c)", "NFkB_init"),
            ("DNA(a20t,ikbat)", "DNA_init"),
            ("A20_mRNA()", "A20_mRNA_init"),
            ("IkBa_mRNA()", "IkBa_mRNA_init"),
        ] {
            builder.initial(pattern, quantity).unwrap();
        }
        for (name, text) in [
            ("Total_TNFa", "TNFa(tnfr1) + TNFa(tnfr1!1).TNFR1(tnfa!1)"),
            ("Unbound_TNFa", "TNFa(tnfr1)"),
            ("Bound_TNFa", "TNFa(tnfr1!1).TNFR1(tnfa!1)"),
            ("Total_IKK", "IKK()"),
            ("Neutral_IKK", "IKK(state~n)"),
            ("Active_IKK", "IKK(state~a)"),
            ("i_IKK", "IKK(state~i)"),
            ("ii_IKK", "IKK(state~ii)"),
            ("Neutral_IKKK", "IKKK(state~n)"),
            ("Active_IKKK", "IKKK(state~a)"),
            ("Total_A20", "A20()"),
            ("Nuclear_IkBa", "IkBa(loc~n)"),
            ("Cytoplasmic_IkBa", "IkBa(loc~c)"),
            ("Nuclear_NFkB", "NFkB(loc~n)"),
            ("Cytoplasmic_NFkB", "NFkB(loc~c)"),
        ] {
            builder.observable(name, text).unwrap();
        }
        for (name, text) in [
            ("IKKKa_activation", "ka * ka20 / (ka20 + Total_A20)"),
            ("IKKa_Inactivation", "k3 * ((k2 + Total_A20) / k2)"),
            ("dna_binding", "q1 * Nuclear_NFkB"),
            ("dna_dissociation", "q2 * Nuclear_IkBa"),
            ("nuclear_a1", "a1 * kv"),
        ] {
            builder.expression(name, text).unwrap();
        }
        for (name, text) in [
            ("TNFa_binds_TNFR1", "TNFa(tnfr1) + TNFR1(tnfa) <-> TNFa(tnfr1!1).TNFR1(tnfa!1), kb, kf"),
            (
                "TNFR1_activates_IKKK",
                "TNFa(tnfr1!1).TNFR1(tnfa!1) + IKKK(state~n) -> IKKK(state~a) + TNFa(tnfr1!1).TNFR1(tnfa!1), IKKKa_activation",
            ),
            ("IKKKa_deactivates", "IKKK(state~a) -> IKKK(state~n), ki"),
            (
                "IKKKa_activates_IKK",
                "IKKK(state~a) + IKK(state~n) -> IKKK(state~a) + IKK(state~a), k1",
            ),
            ("IKKa_deactivates", "IKK(state~a) -> IKK(state~i), IKKa_Inactivation"),
            ("IKKi_to_IKKn", "IKK(state~i) -> IKK(state~n), k4"),
            (
                "IKKa_phos_IkBa",
                "IKK(state~a) + IkBa(nfkb,phos~u,loc~c) -> IKK(state~a) + IkBa(nfkb,phos~p,loc~c), a2",
            ),
            ("NFkB_nuclear_import", "NFkB(ikba,dna,loc~c) -> NFkB(ikba,dna,loc~n), i1"),
            (
                "IkBa_import_export",
                "IkBa(nfkb,phos~u,loc~n) <-> IkBa(nfkb,phos~u,loc~c), e1a, i1a",
            ),
            (
                "IkBaNFkB_formation_c",
                "NFkB(ikba,dna,loc~c) + IkBa(nfkb,phos~u,loc~c) -> IkBa(nfkb!2,phos~u,loc~c).NFkB(ikba!2,dna,loc~c), a1",
            ),
            (
                "IkBaNFkB_formation_n",
                "NFkB(ikba,dna,loc~n) + IkBa(nfkb,phos~u,loc~n) -> IkBa(nfkb!2,phos~u,loc~n).NFkB(ikba!2,dna,loc~n), nuclear_a1",
            ),
            (
                "IkBaNFkB_nuclear_export",
                "IkBa(nfkb!2,phos~u,loc~n).NFkB(ikba!2,dna,loc~n) -> IkBa(nfkb!2,phos~u,loc~c).NFkB(ikba!2,dna,loc~c), e2a",
            ),
            (
                "IkBaNFkB_phosphorylated",
                "IkBa(nfkb!2,phos~u,loc~c).NFkB(ikba!2,dna,loc~c) + IKK(state~a) -> NFkB(ikba!2,dna,loc~c).IkBa(nfkb!2,phos~p,loc~c) + IKK(state~a), a3",
            ),
            (
                "IkBaNFkB_Spontaneous",
                "IkBa(nfkb!2,phos~u,loc~c).NFkB(ikba!2,dna,loc~c) -> NFkB(ikba,dna,loc~c), c6a",
            ),
            (
                "NFkB_DNA_complex_ikbat",
                "NFkB(ikba,dna,loc~n) + DNA(ikbat) <-> NFkB(ikba,dna!5,loc~n).DNA(ikbat!5), q1, q2",
            ),
            (
                "NFkB_DNA_complex_a20t",
                "NFkB(ikba,dna,loc~n) + DNA(a20t) <-> NFkB(ikba,dna!5,loc~n).DNA(a20t!5), q1, q2",
            ),
            (
                "NFkB_induces_A20trans",
                "NFkB(ikba,dna!5,loc~n).DNA(a20t!5) -> NFkB(ikba,dna!5,loc~n).DNA(a20t!5) + A20_mRNA(), c1",
            ),
            (
                "NFkB_induces_IkBatrans",
                "NFkB(ikba,dna!5,loc~n).DNA(ikbat!5) -> NFkB(ikba,dna!5,loc~n).DNA(ikbat!5) + IkBa_mRNA(), c1",
            ),
            ("A20_translation", "A20_mRNA() -> A20_mRNA() + A20(), c4"),
            ("A20_mRNA_degrad", "A20_mRNA() -> 0, c3"),
            (
                "IkBa_translation",
                "IkBa_mRNA() -> IkBa_mRNA() + IkBa(nfkb,phos~u,loc~c), c4",
            ),
            ("IkBa_mRNA_degrad", "IkBa_mRNA() -> 0, c3"),
            ("IkBa_spont_degrad", "IkBa(nfkb,phos~u,loc~c) -> 0, c5a"),
            ("IkBa_degraded", "IkBa(nfkb,phos~p,loc~c) -> 0, tp"),
            (
                "IkBaNFkB_degraded",
                "NFkB(ikba!2,dna,loc~c).IkBa(nfkb!2,phos~p,loc~c) -> NFkB(ikba,dna,loc~c), tp",
            ),
            ("A20_spont_degrad", "A20() -> 0, c5"),
        ] {
            builder.rule(name, text).unwrap();
        }
        builder
    }

    fn binding() -> ModelBuilder {
        let mut builder = ModelBuilder::new();
        builder
            .molecule_type("A(b)")
            .unwrap()
            .molecule_type("B(a)")
            .unwrap()
            .parameter("kf", 1.0)
            .parameter("kr", 0.1)
            .parameter("B0", 100.0)
            .rule("bind", "A(b) + B(a) <-> A(b!1).B(a!1), kf, kr")
            .unwrap()
            .observable("Complexes", "A(b!1).B(a!1)")
            .unwrap()
            .initial("A(b)", vec![10.0, 20.0])
            .unwrap()
            .initial("B(a)", "B0")
            .unwrap();
        builder
    }

    #[test]
    fn linspace_hits_both_ends() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        let grid = linspace(0.0, 5400.0, 100);
        assert_eq!(grid.len(), 100);
        assert_eq!(grid[99], 5400.0);
    }

    #[test]
    fn initial_conditions_broadcast_and_override() {
        let simulator = Simulator::new(
            binding().freeze().unwrap(),
            NetworkConfiguration::default(),
            IntegratorConfiguration::default(),
        )
        .unwrap();
        let initials = simulator.initial_conditions(&IndexMap::new()).unwrap();
        assert_eq!(initials.len(), 2);
        assert_eq!(initials[0].as_slice(), &[10.0, 100.0, 0.0]);
        assert_eq!(initials[1].as_slice(), &[20.0, 100.0, 0.0]);

        let mut overrides = IndexMap::new();
        overrides.insert("B(a)".to_string(), Quantity::Batch(vec![1.0, 2.0]));
        overrides.insert("A(b!1).B(a!1)".to_string(), Quantity::Value(5.0));
        let initials = simulator.initial_conditions(&overrides).unwrap();
        assert_eq!(initials[1].as_slice(), &[20.0, 2.0, 5.0]);

        let mut overrides = IndexMap::new();
        overrides.insert("B(a)".to_string(), Quantity::Batch(vec![1.0, 2.0, 3.0]));
        assert!(matches!(
            simulator.initial_conditions(&overrides),
            Err(SimulationError::InconsistentBatch { expected: 2, found: 3, .. })
        ));

        let mut overrides = IndexMap::new();
        overrides.insert("B(a!1).B(a!1)".to_string(), Quantity::Value(1.0));
        assert_eq!(
            simulator.initial_conditions(&overrides),
            Err(SimulationError::UnknownSpecies("B(a!1).B(a!1)".to_string()))
        );
    }

    #[test]
    fn run_returns_one_result_per_batch_entry() {
        let simulator = Simulator::new(
            binding().freeze().unwrap(),
            NetworkConfiguration::default(),
            IntegratorConfiguration::default(),
        )
        .unwrap();
        let results = simulator.run(&linspace(0.0, 10.0, 21), &IndexMap::new()).unwrap();
        assert_eq!(results.len(), 2);
        for (result, a0) in results.iter().zip([10.0, 20.0]) {
            let result = result.as_ref().unwrap();
            let complexes = result.observables.series("Complexes").unwrap();
            assert_eq!(complexes.len(), 21);
            assert_eq!(complexes[0], 0.0);
            // Nearly all of A ends up bound with B in excess
            assert_relative_eq!(complexes[20], a0, max_relative = 2e-2);
        }
    }

    #[test]
    fn cache_shares_networks_between_parameter_sets() {
        let mut cache = NetworkCache::new();
        let first = Simulator::with_cache(
            binding().freeze().unwrap(),
            &mut cache,
            &NetworkConfiguration::default(),
            IntegratorConfiguration::default(),
        )
        .unwrap();
        let mut faster = binding();
        faster.parameter("unused", 3.0);
        let second = Simulator::with_cache(
            faster.freeze().unwrap(),
            &mut cache,
            &NetworkConfiguration::default(),
            IntegratorConfiguration::default(),
        )
        .unwrap();
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&first.network, &second.network));
    }

    #[test]
    fn tnfa_pathway_dose_response() {
        let model = tnfa_model().freeze().unwrap();
        assert_eq!(model.rules().len(), 26);
        let simulator = Simulator::new(
            model,
            NetworkConfiguration::default(),
            IntegratorConfiguration::default(),
        )
        .unwrap();
        assert!(simulator.network().species.len() > 20);

        let doses = vec![1.0, 10.0, 100.0, 1000.0];
        let mut overrides = IndexMap::new();
        overrides.insert("TNFa(tnfr1)".to_string(), Quantity::Batch(doses.clone()));
        let grid = linspace(0.0, 5400.0, 100);
        let results = simulator.run(&grid, &overrides).unwrap();
        assert_eq!(results.len(), 4);

        let mut bound = Vec::new();
        for (result, dose) in results.iter().zip(&doses) {
            let result = result.as_ref().unwrap();
            assert!(result.trajectory.states.iter().all(|v| *v >= 0.0));
            let table = &result.observables;
            assert_eq!(table.times.len(), 100);
            for t in 0..100 {
                assert_relative_eq!(table.value("Total_TNFa", t).unwrap(), *dose, max_relative = 1e-6);
                let ikk = ["Neutral_IKK", "Active_IKK", "i_IKK", "ii_IKK"]
                    .iter()
                    .map(|name| table.value(name, t).unwrap())
                    .sum::<f64>();
                assert_relative_eq!(ikk, 200000.0, max_relative = 1e-6);
                assert_relative_eq!(table.value("Total_IKK", t).unwrap(), ikk, max_relative = 1e-12);
            }
            bound.push(table.value("Bound_TNFa", 99).unwrap());
        }
        for pair in bound.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
