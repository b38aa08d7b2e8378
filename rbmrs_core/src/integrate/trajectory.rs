//! Dense trajectories produced by the integrator
use nalgebra::{DMatrix, DVector};

/// Species amounts at each point of a time grid
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    pub times: Vec<f64>,
    /// One row per time point, one column per species
    pub states: DMatrix<f64>,
    /// Accepted steps that needed negative components clamped to zero
    pub clamp_events: usize,
    /// Accepted steps
    pub steps: usize,
    /// Rejected step attempts
    pub rejected: usize,
}

impl Trajectory {
    pub(crate) fn from_rows(times: Vec<f64>, rows: &[DVector<f64>], species: usize) -> Self {
        Trajectory {
            states: DMatrix::from_fn(times.len(), species, |i, j| rows[i][j]),
            times,
            clamp_events: 0,
            steps: 0,
            rejected: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn species_count(&self) -> usize {
        self.states.ncols()
    }

    /// State vector at time index `index`
    pub fn state(&self, index: usize) -> Option<DVector<f64>> {
        (index < self.len()).then(|| self.states.row(index).transpose())
    }

    /// Final state of the run
    pub fn last_state(&self) -> Option<DVector<f64>> {
        self.len().checked_sub(1).and_then(|i| self.state(i))
    }

    /// Time course of species `index`
    pub fn species(&self, index: usize) -> Option<Vec<f64>> {
        (index < self.species_count()).then(|| self.states.column(index).iter().copied().collect())
    }
}
