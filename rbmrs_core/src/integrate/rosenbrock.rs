//! Adaptive Rosenbrock integrator for stiff mass action systems
//!
//! Implements the L-stable Rosenbrock 2(3) pair of Shampine and Reichelt (the `ode23s`
//! scheme): a second order solution with a third order error estimate, one LU
//! factorization of `I - h d J` per attempted step and a finite difference Jacobian that is
//! reused across rejected attempts. Steps are clipped so every grid point is hit exactly.
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use nalgebra::{DMatrix, DVector};
use tracing::{debug, trace, warn};

use crate::configuration::IntegratorConfiguration;
use crate::integrate::trajectory::Trajectory;
use crate::integrate::IntegrationError;
use crate::ode::OdeSystem;

/// `1 / (2 + sqrt(2))`
const D: f64 = 0.292_893_218_813_452_5;
/// `6 + sqrt(2)`
const E32: f64 = 7.414_213_562_373_095;

const MAX_GROWTH: f64 = 5.0;
const MIN_SHRINK: f64 = 0.2;
const SAFETY: f64 = 0.8;

/// Result of one attempted step
struct Stage {
    x: DVector<f64>,
    f: DVector<f64>,
    /// Weighted max norm of the local error estimate, `<= 1` passes
    error: f64,
}

/// Stiff ODE integrator, one instance can serve any number of runs
#[derive(Clone, Debug)]
pub struct Integrator {
    configuration: IntegratorConfiguration,
}

impl Integrator {
    pub fn new(configuration: IntegratorConfiguration) -> Result<Self, IntegrationError> {
        configuration.validate()?;
        Ok(Integrator { configuration })
    }

    pub fn configuration(&self) -> &IntegratorConfiguration {
        &self.configuration
    }

    /// Integrate `system` from `x0` at `grid[0]` and record the state at every grid point
    pub fn integrate(
        &self,
        system: &OdeSystem,
        x0: &DVector<f64>,
        grid: &[f64],
    ) -> Result<Trajectory, IntegrationError> {
        self.run(system, x0, grid, None)
    }

    /// Same as [`Integrator::integrate`], aborting with `Cancelled` once `cancel` is set
    pub fn integrate_cancellable(
        &self,
        system: &OdeSystem,
        x0: &DVector<f64>,
        grid: &[f64],
        cancel: &AtomicBool,
    ) -> Result<Trajectory, IntegrationError> {
        self.run(system, x0, grid, Some(cancel))
    }

    /// Integrate every initial state independently, results are in input order
    pub fn integrate_batch(
        &self,
        system: &OdeSystem,
        initials: &[DVector<f64>],
        grid: &[f64],
    ) -> Vec<Result<Trajectory, IntegrationError>> {
        self.batch(system, initials, grid, &[])
    }

    /// Batch run where `flags[i]` cancels run `i` only, runs without a flag can't be cancelled
    pub fn integrate_batch_cancellable(
        &self,
        system: &OdeSystem,
        initials: &[DVector<f64>],
        grid: &[f64],
        flags: &[AtomicBool],
    ) -> Vec<Result<Trajectory, IntegrationError>> {
        self.batch(system, initials, grid, flags)
    }

    fn batch(
        &self,
        system: &OdeSystem,
        initials: &[DVector<f64>],
        grid: &[f64],
        flags: &[AtomicBool],
    ) -> Vec<Result<Trajectory, IntegrationError>> {
        let run = |(index, x0): (usize, &DVector<f64>)| {
            debug!(run = index, "starting batch run");
            let result = self.run(system, x0, grid, flags.get(index));
            if let Err(err) = &result {
                warn!(run = index, error = %err, "batch run failed");
            }
            result
        };
        cfg_if::cfg_if! {
            if #[cfg(feature = "parallel")] {
                use rayon::prelude::*;
                if self.configuration.parallel && initials.len() > 1 {
                    return initials.par_iter().enumerate().map(run).collect();
                }
            }
        }
        initials.iter().enumerate().map(run).collect()
    }

    fn run(
        &self,
        system: &OdeSystem,
        x0: &DVector<f64>,
        grid: &[f64],
        cancel: Option<&AtomicBool>,
    ) -> Result<Trajectory, IntegrationError> {
        check_grid(grid)?;
        let n = system.species_count();
        if x0.len() != n {
            return Err(IntegrationError::DimensionMismatch {
                expected: n,
                found: x0.len(),
            });
        }
        if let Some((species, &value)) = x0.iter().enumerate().find(|(_, v)| !(v.is_finite() && **v >= 0.0)) {
            return Err(IntegrationError::InvalidInitialState { species, value });
        }

        let config = &self.configuration;
        let started = Instant::now();
        let span = grid[grid.len() - 1] - grid[0];
        let max_step = config.max_step.unwrap_or(f64::INFINITY);

        let mut t = grid[0];
        let mut x = x0.clone();
        let mut fx = DVector::zeros(n);
        system.rhs(t, &x, &mut fx)?;
        let mut h = config
            .initial_step
            .unwrap_or_else(|| self.initial_step(&x, &fx, span))
            .min(max_step);
        let mut jacobian: Option<DMatrix<f64>> = None;
        let (mut steps, mut rejected, mut clamp_events) = (0usize, 0usize, 0usize);
        let mut rows = Vec::with_capacity(grid.len());
        rows.push(x.clone());

        for &target in &grid[1..] {
            while t < target {
                if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                    return Err(IntegrationError::Cancelled { time: t });
                }
                if steps + rejected >= config.max_steps {
                    return Err(IntegrationError::BudgetExceeded {
                        budget: "step",
                        time: t,
                    });
                }
                if config.max_wall_time.is_some_and(|limit| started.elapsed() > limit) {
                    return Err(IntegrationError::BudgetExceeded {
                        budget: "wall time",
                        time: t,
                    });
                }

                // Stretch to the grid point rather than leave a sliver behind
                let clipped = t + 1.1 * h >= target;
                let step = if clipped { target - t } else { h };
                if jacobian.is_none() {
                    jacobian = Some(system.jacobian_at(t, &x, &fx)?);
                }
                let stage = match &jacobian {
                    Some(j) => self.attempt(system, t, &x, &fx, j, step)?,
                    None => None,
                };

                match stage {
                    Some(stage) if stage.error <= 1.0 => {
                        steps += 1;
                        t = if clipped { target } else { t + step };
                        x = stage.x;
                        fx = stage.f;
                        jacobian = None;
                        if x.iter().any(|v| *v < 0.0) {
                            x.iter_mut().filter(|v| **v < 0.0).for_each(|v| *v = 0.0);
                            clamp_events += 1;
                            if clamp_events == 1 {
                                warn!(time = t, "clamped negative amounts to zero");
                            }
                            if clamp_events > config.max_clamped_steps {
                                return Err(IntegrationError::IntegrationUnstable {
                                    start: t - step,
                                    end: t,
                                    reason: format!(
                                        "negative amounts clamped on more than {} steps",
                                        config.max_clamped_steps
                                    ),
                                });
                            }
                            system.rhs(t, &x, &mut fx)?;
                        }
                        let grown = (step * step_factor(stage.error)).min(max_step);
                        h = if clipped { grown.max(h.min(max_step)) } else { grown };
                    }
                    other => {
                        rejected += 1;
                        let error = other.map(|s| s.error).unwrap_or(f64::INFINITY);
                        h = step * step_factor(error).min(SAFETY);
                        trace!(time = t, step, error, "rejected step");
                        let floor = config.min_step.max(16.0 * f64::EPSILON * t.abs());
                        if h < floor {
                            return Err(IntegrationError::IntegrationUnstable {
                                start: t,
                                end: t + step,
                                reason: format!("step size {h:e} fell below {floor:e}"),
                            });
                        }
                    }
                }
            }
            rows.push(x.clone());
        }

        debug!(steps, rejected, clamp_events, "integration finished");
        let mut trajectory = Trajectory::from_rows(grid.to_vec(), &rows, n);
        trajectory.steps = steps;
        trajectory.rejected = rejected;
        trajectory.clamp_events = clamp_events;
        Ok(trajectory)
    }

    /// One Rosenbrock step of size `h`, `None` when `I - h d J` is singular
    fn attempt(
        &self,
        system: &OdeSystem,
        t: f64,
        x: &DVector<f64>,
        fx: &DVector<f64>,
        jacobian: &DMatrix<f64>,
        h: f64,
    ) -> Result<Option<Stage>, IntegrationError> {
        let n = x.len();
        let lu = (DMatrix::identity(n, n) - jacobian * (h * D)).lu();

        let Some(k1) = lu.solve(fx) else {
            return Ok(None);
        };
        let mut f1 = DVector::zeros(n);
        system.rhs(t + 0.5 * h, &(x + &k1 * (0.5 * h)), &mut f1)?;
        let Some(k2) = lu.solve(&(&f1 - &k1)) else {
            return Ok(None);
        };
        let k2 = k2 + &k1;
        let x_new = x + &k2 * h;
        let mut f2 = DVector::zeros(n);
        system.rhs(t + h, &x_new, &mut f2)?;
        let Some(k3) = lu.solve(&(&f2 - (&k2 - &f1) * E32 - (&k1 - fx) * 2.0)) else {
            return Ok(None);
        };

        let estimate = (&k1 - &k2 * 2.0 + &k3) * (h / 6.0);
        let config = &self.configuration;
        let error = if x_new.iter().chain(estimate.iter()).all(|v| v.is_finite()) {
            estimate
                .iter()
                .zip(x.iter().zip(x_new.iter()))
                .map(|(e, (a, b))| e.abs() / (config.atol + config.rtol * a.abs().max(b.abs())))
                .fold(0.0, f64::max)
        } else {
            f64::INFINITY
        };
        Ok(Some(Stage {
            x: x_new,
            f: f2,
            error,
        }))
    }

    /// First trial step from the size of the initial derivative
    fn initial_step(&self, x: &DVector<f64>, fx: &DVector<f64>, span: f64) -> f64 {
        let config = &self.configuration;
        let threshold = config.atol / config.rtol;
        let rate = fx
            .iter()
            .zip(x.iter())
            .map(|(f, v)| f.abs() / v.abs().max(threshold))
            .fold(0.0, f64::max)
            / (SAFETY * config.rtol.cbrt());
        let mut h = span;
        if h * rate > 1.0 {
            h = 1.0 / rate;
        }
        h.max(config.min_step)
    }
}

/// Step size multiplier for a weighted error norm
fn step_factor(error: f64) -> f64 {
    if error == 0.0 {
        MAX_GROWTH
    } else if !error.is_finite() {
        MIN_SHRINK
    } else {
        (SAFETY * error.powf(-1.0 / 3.0)).clamp(MIN_SHRINK, MAX_GROWTH)
    }
}

fn check_grid(grid: &[f64]) -> Result<(), IntegrationError> {
    if grid.is_empty() {
        return Err(IntegrationError::InvalidTimeGrid("grid is empty".to_string()));
    }
    if let Some(t) = grid.iter().find(|t| !t.is_finite()) {
        return Err(IntegrationError::InvalidTimeGrid(format!("grid contains {t}")));
    }
    if let Some(pair) = grid.windows(2).find(|w| w[1] <= w[0]) {
        return Err(IntegrationError::InvalidTimeGrid(format!(
            "grid is not strictly increasing at {} -> {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}
