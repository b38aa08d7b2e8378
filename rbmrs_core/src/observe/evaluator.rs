//! Aggregation of species trajectories into observables
use indexmap::IndexMap;
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::integrate::Trajectory;
use crate::model::model::Model;
use crate::model::observable::CompiledObservable;
use crate::network::matcher::match_count;
use crate::network::reaction::{ReactionNetwork, Species};
use crate::observe::ObservableError;

/// Observables by species matrix, entry `(o, s)` is the summed match count of the patterns of
/// observable `o` in species `s`
pub fn weight_matrix(observables: &[CompiledObservable], species: &[Species]) -> CsrMatrix<f64> {
    let mut weights = CooMatrix::new(observables.len(), species.len());
    for (o, observable) in observables.iter().enumerate() {
        for (s, candidate) in species.iter().enumerate() {
            let count: f64 = observable
                .patterns
                .iter()
                .map(|p| match_count(p, &candidate.complex))
                .sum();
            if count != 0.0 {
                weights.push(o, s, count);
            }
        }
    }
    CsrMatrix::from(&weights)
}

/// Evaluates a model's observables over trajectories of one network
#[derive(Clone, Debug)]
pub struct ObservableEvaluator {
    names: Vec<String>,
    weights: CsrMatrix<f64>,
}

impl ObservableEvaluator {
    pub fn new(model: &Model, network: &ReactionNetwork) -> Self {
        ObservableEvaluator {
            names: model.observables().iter().map(|o| o.name.clone()).collect(),
            weights: weight_matrix(model.observables(), &network.species),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn weights(&self) -> &CsrMatrix<f64> {
        &self.weights
    }

    pub fn evaluate(&self, trajectory: &Trajectory) -> Result<ObservableTable, ObservableError> {
        if trajectory.species_count() != self.weights.ncols() {
            return Err(ObservableError::DimensionMismatch {
                expected: self.weights.ncols(),
                found: trajectory.species_count(),
            });
        }
        let mut values = DMatrix::zeros(trajectory.len(), self.names.len());
        for (o, row) in self.weights.row_iter().enumerate() {
            for (&s, &w) in row.col_indices().iter().zip(row.values()) {
                for t in 0..trajectory.len() {
                    values[(t, o)] += w * trajectory.states[(t, s)];
                }
            }
        }
        Ok(ObservableTable {
            times: trajectory.times.clone(),
            columns: self
                .names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect(),
            values,
        })
    }
}

/// Observable values over time, one row per time point and one column per observable
#[derive(Clone, Debug, PartialEq)]
pub struct ObservableTable {
    pub times: Vec<f64>,
    columns: IndexMap<String, usize>,
    pub values: DMatrix<f64>,
}

impl ObservableTable {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn series(&self, name: &str) -> Option<Vec<f64>> {
        let column = *self.columns.get(name)?;
        Some(self.values.column(column).iter().copied().collect())
    }

    pub fn value(&self, name: &str, time_index: usize) -> Option<f64> {
        let column = *self.columns.get(name)?;
        (time_index < self.times.len()).then(|| self.values[(time_index, column)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::{IntegratorConfiguration, NetworkConfiguration};
    use crate::integrate::Integrator;
    use crate::model::model::ModelBuilder;
    use crate::ode::OdeAssembler;
    use crate::network::NetworkGenerator;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    fn setup() -> (Model, ReactionNetwork) {
        let mut builder = ModelBuilder::new();
        builder
            .molecule_type("X(s,p~u~p)")
            .unwrap()
            .parameter("k", 1.0)
            .rule("dimerize", "X(s) + X(s) -> X(s!1).X(s!1), k")
            .unwrap()
            .observable("Monomers", "X()")
            .unwrap()
            .observable("Dimers", "X(s!1).X(s!1)")
            .unwrap()
            .observable("Bound", "X(s!+)")
            .unwrap()
            .observable("Both", "X(s!1).X(s!1) + X(s!+)")
            .unwrap()
            .initial("X(s,p~u)", 10.0)
            .unwrap();
        let model = builder.freeze().unwrap();
        let network = NetworkGenerator::new(&model, NetworkConfiguration::default())
            .generate()
            .unwrap();
        (model, network)
    }

    #[test]
    fn weights_count_distinct_occurrences() {
        let (model, network) = setup();
        assert_eq!(network.species.len(), 2);
        let weights = weight_matrix(model.observables(), &network.species);
        let dense = DMatrix::from(&weights);
        // Monomers counts molecules, Dimers counts a symmetric pair once
        assert_eq!(dense.row(0).iter().copied().collect::<Vec<f64>>(), vec![1.0, 2.0]);
        assert_eq!(dense.row(1).iter().copied().collect::<Vec<f64>>(), vec![0.0, 1.0]);
        assert_eq!(dense.row(2).iter().copied().collect::<Vec<f64>>(), vec![0.0, 2.0]);
    }

    #[test]
    fn observables_are_additive_over_patterns() {
        let (model, network) = setup();
        let evaluator = ObservableEvaluator::new(&model, &network);
        let rows = vec![
            DVector::from_vec(vec![10.0, 0.0]),
            DVector::from_vec(vec![4.0, 3.0]),
            DVector::from_vec(vec![0.5, 4.75]),
        ];
        let trajectory = Trajectory::from_rows(vec![0.0, 1.0, 2.0], &rows, 2);
        let table = evaluator.evaluate(&trajectory).unwrap();
        let dimers = table.series("Dimers").unwrap();
        let bound = table.series("Bound").unwrap();
        let both = table.series("Both").unwrap();
        for t in 0..3 {
            assert_relative_eq!(both[t], dimers[t] + bound[t]);
        }
        assert_relative_eq!(table.value("Monomers", 1).unwrap(), 10.0);
        assert_eq!(table.value("Monomers", 3), None);
        assert_eq!(table.series("Missing"), None);
        assert_eq!(
            table.names().collect::<Vec<&str>>(),
            vec!["Monomers", "Dimers", "Bound", "Both"]
        );
    }

    #[test]
    fn universal_pattern_equals_its_state_partition() {
        let mut builder = ModelBuilder::new();
        builder
            .molecule_type("K(state~n~a~i)")
            .unwrap()
            .parameter("ka", 0.5)
            .parameter("ki", 0.2)
            .parameter("kr", 0.1)
            .rule("activate", "K(state~n) -> K(state~a), ka")
            .unwrap()
            .rule("inactivate", "K(state~a) -> K(state~i), ki")
            .unwrap()
            .rule("recover", "K(state~i) -> K(state~n), kr")
            .unwrap()
            .observable("Total_K", "K()")
            .unwrap()
            .observable("Neutral_K", "K(state~n)")
            .unwrap()
            .observable("Active_K", "K(state~a)")
            .unwrap()
            .observable("Inactive_K", "K(state~i)")
            .unwrap()
            .initial("K(state~n)", 100.0)
            .unwrap();
        let model = builder.freeze().unwrap();
        let network = NetworkGenerator::new(&model, NetworkConfiguration::default())
            .generate()
            .unwrap();
        assert_eq!(network.species.len(), 3);
        let system = OdeAssembler::assemble(&model, &network).unwrap();
        let x0 = DVector::from_vec(vec![100.0, 0.0, 0.0]);
        let times: Vec<f64> = (0..21).map(|i| i as f64).collect();
        let trajectory = Integrator::new(IntegratorConfiguration::default())
            .unwrap()
            .integrate(&system, &x0, &times)
            .unwrap();
        let table = ObservableEvaluator::new(&model, &network)
            .evaluate(&trajectory)
            .unwrap();
        for t in 0..times.len() {
            let parts = ["Neutral_K", "Active_K", "Inactive_K"]
                .iter()
                .map(|name| table.value(name, t).unwrap())
                .sum::<f64>();
            let total = table.value("Total_K", t).unwrap();
            assert_relative_eq!(total, parts, max_relative = 1e-12);
            assert_relative_eq!(total, 100.0, max_relative = 1e-6);
        }
        assert!(table.value("Inactive_K", 20).unwrap() > 0.0);
    }

    #[test]
    fn wrong_species_count_is_rejected() {
        let (model, network) = setup();
        let evaluator = ObservableEvaluator::new(&model, &network);
        let trajectory = Trajectory::from_rows(vec![0.0], &[DVector::from_vec(vec![1.0])], 1);
        assert_eq!(
            evaluator.evaluate(&trajectory),
            Err(ObservableError::DimensionMismatch {
                expected: 2,
                found: 1
            })
        );
    }
}
