use log::{debug, info, warn};
use ndarray::{Array3, Zip};
use std::time::{Duration, Instant};

use crate::config::SolverConfig;
use crate::convergence::{relative_change, ConvergenceTracker};
use crate::error::{Error, Result};
use crate::prox::{nuclear_norm, prox};
use crate::relaxation::Relaxation;
use crate::sampling::SamplingOperator;
use crate::unfold::{fold_tall, fold_wide, tall, wide, CHANNELS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveState {
    Initialized,
    Iterating,
    Converged,
    MaxIterationsReached,
}

impl SolveState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SolveState::Converged | SolveState::MaxIterationsReached)
    }
}

/// Outcome of a solve. Running out of iterations is reported here, not as an error.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Reconstructed image, `prox_{rho f}` of the final iterate
    pub image: Array3<f64>,
    /// Final splitting variable `z`
    pub iterate: Array3<f64>,
    pub iterations: usize,
    pub state: SolveState,
    /// Relative change of `z` per iteration
    pub history: Vec<f64>,
    /// `||T(w_k) - w_k||^2` per iteration
    pub fixed_point_residuals: Vec<f64>,
    pub elapsed: Duration,
}

/// Three-operator splitting for
///
/// ```text
/// min_Z  w_f ||Z_(wide)||_* + w_g ||Z_(tall)||_* + 0.5 ||A(Z) - A(Z_obs)||^2
/// ```
///
/// combined with an (inertial) Krasnoselskii–Mann iteration. One call to
/// [`step`](SplittingEngine::step) performs one iteration; [`solve`](SplittingEngine::solve)
/// runs until convergence or until the iteration budget is spent.
pub struct SplittingEngine<'a> {
    config: SolverConfig,
    relaxation: Relaxation,
    sampling: &'a SamplingOperator,
    observed: Array3<f64>,
    z: Array3<f64>,
    z_previous: Array3<f64>,
    iteration: usize,
    state: SolveState,
    tracker: ConvergenceTracker,
    started: Option<Instant>,
}

impl<'a> SplittingEngine<'a> {
    /// The observed entries of `initial` are taken as the data; its erased
    /// entries only serve as the starting guess.
    pub fn new(
        initial: Array3<f64>,
        sampling: &'a SamplingOperator,
        config: SolverConfig,
    ) -> Result<Self> {
        config.validate()?;
        let channels = initial.dim().2;
        if channels != CHANNELS {
            return Err(Error::ChannelCount { got: channels });
        }
        let observed = sampling.apply(&initial)?;
        if !initial.iter().all(|v| v.is_finite()) {
            return Err(Error::NonFinite { iteration: Some(0) });
        }

        let relaxation = Relaxation::new(config.mode, config.lambda, config.rho);
        Ok(SplittingEngine {
            tracker: ConvergenceTracker::with_capacity(config.max_iterations),
            config,
            relaxation,
            sampling,
            observed,
            z_previous: initial.clone(),
            z: initial,
            iteration: 0,
            state: SolveState::Initialized,
            started: None,
        })
    }

    pub fn state(&self) -> SolveState {
        self.state
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn iterate(&self) -> &Array3<f64> {
        &self.z
    }

    pub fn history(&self) -> &[f64] {
        self.tracker.history()
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// `x = prox_{rho f}(w)` on the wide unfolding.
    fn prox_f(&self, w: &Array3<f64>) -> Result<Array3<f64>> {
        fold_wide(&prox(&wide(w)?, self.config.rho * self.config.weight_f)?)
    }

    /// `y = prox_{rho g}(v)` on the tall unfolding.
    fn prox_g(&self, v: &Array3<f64>) -> Result<Array3<f64>> {
        fold_tall(&prox(&tall(v)?, self.config.rho * self.config.weight_g)?)
    }

    /// `T(w) - w = y - x` for the Davis–Yin operator `T`.
    fn fixed_point_step(&self, w: &Array3<f64>) -> Result<Array3<f64>> {
        let rho = self.config.rho;
        let x = self.prox_f(w)?;
        let gradient = self.sampling.residual(&x, &self.observed)?;
        let reflected = Zip::from(&x)
            .and(w)
            .and(&gradient)
            .map_collect(|&x, &w, &g| 2.0 * x - w - rho * g);
        let y = self.prox_g(&reflected)?;
        Ok(y - x)
    }

    /// Performs one iteration. Returns the terminal state once reached;
    /// further calls are no-ops returning the same state.
    pub fn step(&mut self) -> Result<Option<SolveState>> {
        if self.state.is_terminal() {
            return Ok(Some(self.state));
        }
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        self.state = SolveState::Iterating;

        let k = self.iteration;
        let alpha = self.relaxation.next_alpha(k);
        let beta = self.relaxation.inertia(k);

        let w = if beta == 0.0 {
            self.z.clone()
        } else {
            Zip::from(&self.z)
                .and(&self.z_previous)
                .map_collect(|&z, &z_prev| z + beta * (z - z_prev))
        };
        let step = self.fixed_point_step(&w).map_err(|e| e.at(k + 1))?;
        let z_next = Zip::from(&w)
            .and(&step)
            .map_collect(|&w, &s| w + alpha * s);
        if !z_next.iter().all(|v| v.is_finite()) {
            return Err(Error::NonFinite {
                iteration: Some(k + 1),
            });
        }

        let residual = relative_change(&self.z, &z_next, self.config.epsilon);
        let fixed_point = step.iter().map(|s| s * s).sum::<f64>();
        self.tracker.record(residual);
        self.tracker.record_fixed_point(fixed_point);
        self.z_previous = std::mem::replace(&mut self.z, z_next);
        self.iteration = k + 1;

        debug!(
            "iteration {:>4}: alpha {:.4}, inertia {:.4}, relative change {:.3e}, ||Tw - w||^2 {:.3e}",
            self.iteration, alpha, beta, residual, fixed_point
        );

        if self.relaxation.is_stalled() {
            warn!("relaxation coefficient is zero, the iterate cannot move; giving up");
            self.state = SolveState::MaxIterationsReached;
        } else if self.tracker.should_stop(self.config.tolerance) {
            self.state = SolveState::Converged;
        } else if self.iteration >= self.config.max_iterations {
            self.state = SolveState::MaxIterationsReached;
        }

        Ok(self.state.is_terminal().then_some(self.state))
    }

    /// Runs until convergence or until the iteration budget is exhausted.
    pub fn solve(mut self) -> Result<Solution> {
        while self.step()?.is_none() {}
        self.finish()
    }

    /// Consumes the engine and extracts the reconstruction at the current iterate.
    pub fn finish(self) -> Result<Solution> {
        let image = self.prox_f(&self.z).map_err(|e| e.at(self.iteration))?;
        let elapsed = self.started.map(|t| t.elapsed()).unwrap_or_default();
        info!(
            "{:?} after {} iterations in {} ms (last relative change {:.3e})",
            self.state,
            self.iteration,
            elapsed.as_millis(),
            self.tracker.last().unwrap_or(f64::NAN)
        );
        let (history, fixed_point_residuals) = self.tracker.into_parts();
        Ok(Solution {
            image,
            iterate: self.z,
            iterations: self.iteration,
            state: self.state,
            history,
            fixed_point_residuals,
            elapsed,
        })
    }
}

/// Convenience wrapper: build an engine and run it to completion.
pub fn solve(
    initial: Array3<f64>,
    sampling: &SamplingOperator,
    config: SolverConfig,
) -> Result<Solution> {
    SplittingEngine::new(initial, sampling, config)?.solve()
}

/// Value of the composite objective at `image`.
pub fn objective(
    image: &Array3<f64>,
    observed: &Array3<f64>,
    sampling: &SamplingOperator,
    config: &SolverConfig,
) -> Result<f64> {
    let f = nuclear_norm(&wide(image)?)?;
    let g = nuclear_norm(&tall(image)?)?;
    let h = sampling.data_term(image, observed)?;
    Ok(config.weight_f * f + config.weight_g * g + h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::image::synthetic;
    use crate::initial_guess::zero_fill;
    use crate::mask::random_erasure;
    use crate::relaxation::Mode;
    use ndarray::Array2;

    fn max_abs_diff(a: &Array3<f64>, b: &Array3<f64>) -> f64 {
        (a - b).iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }

    fn corrupted(size: usize, ratio: f64, seed: u64) -> (Array3<f64>, SamplingOperator) {
        let original = synthetic(size, size);
        let sampling = SamplingOperator::from_pixel_mask(&random_erasure(size, size, ratio, seed));
        let initial = zero_fill(&original, &sampling).unwrap();
        (initial, sampling)
    }

    #[test]
    fn fully_observed_image_is_recovered_immediately() {
        let original = synthetic(16, 16);
        let sampling = SamplingOperator::from_pixel_mask(&Array2::from_elem((16, 16), true));
        let config = SolverConfig {
            weight_f: 0.0,
            weight_g: 0.0,
            lambda: 0.5,
            max_iterations: 50,
            ..SolverConfig::default()
        };
        let solution = solve(original.clone(), &sampling, config).unwrap();
        assert_eq!(solution.state, SolveState::Converged);
        assert!(solution.iterations <= 2);
        assert!(max_abs_diff(&solution.image, &original) < 1e-3);
    }

    #[test]
    fn zero_lambda_never_reports_convergence() {
        let (initial, sampling) = corrupted(16, 0.5, 3);
        let config = SolverConfig {
            lambda: 0.0,
            max_iterations: 20,
            ..SolverConfig::default()
        };
        let solution = solve(initial.clone(), &sampling, config).unwrap();
        assert_eq!(solution.state, SolveState::MaxIterationsReached);
        assert_eq!(solution.iterations, 1);
        assert_eq!(solution.iterate, initial);
    }

    #[test]
    fn residuals_trend_downwards() {
        let (initial, sampling) = corrupted(64, 0.5, 2022);
        let config = SolverConfig {
            weight_f: 0.1,
            weight_g: 0.1,
            rho: 1.0,
            lambda: 1.0,
            mode: Mode::Static,
            max_iterations: 100,
            tolerance: 1e-3,
            ..SolverConfig::default()
        };
        let solution = solve(initial, &sampling, config).unwrap();
        assert!(solution.state.is_terminal());
        assert_eq!(solution.history.len(), solution.iterations);
        assert_eq!(solution.fixed_point_residuals.len(), solution.iterations);

        let history = &solution.history;
        let half = history.len() / 2;
        assert!(history[history.len() - 1] <= 1.25 * history[half]);

        // For an averaged operator the fixed-point residual of a KM iteration never grows.
        for pair in solution.fixed_point_residuals.windows(2) {
            assert!(pair[1] <= pair[0] * (1.0 + 1e-6) + 1e-12);
        }
        if solution.state == SolveState::Converged {
            assert!(history[history.len() - 1] < 1e-3);
        }
    }

    #[test]
    fn inertial_needs_no_more_iterations_than_static() {
        let (initial, sampling) = corrupted(48, 0.5, 7);
        let config = SolverConfig {
            weight_f: 0.1,
            weight_g: 0.1,
            rho: 1.0,
            lambda: 0.5,
            max_iterations: 400,
            tolerance: 1e-4,
            ..SolverConfig::default()
        };
        let static_run =
            solve(initial.clone(), &sampling, config.clone().with_mode(Mode::Static)).unwrap();
        let inertial_run = solve(initial, &sampling, config.with_mode(Mode::Inertial)).unwrap();
        assert!(
            inertial_run.iterations <= static_run.iterations,
            "inertial {} vs static {}",
            inertial_run.iterations,
            static_run.iterations
        );
    }

    #[test]
    fn reconstruction_improves_on_corrupted_input() {
        let original = synthetic(32, 32);
        let sampling = SamplingOperator::from_pixel_mask(&random_erasure(32, 32, 0.5, 11));
        let initial = zero_fill(&original, &sampling).unwrap();
        let config = SolverConfig {
            max_iterations: 200,
            tolerance: 1e-4,
            ..SolverConfig::default()
        };
        let solution = solve(initial.clone(), &sampling, config.clone()).unwrap();
        let before = crate::image::relative_error(&initial, &original).unwrap();
        let after = crate::image::relative_error(&solution.image, &original).unwrap();
        assert!(after < before);

        let observed = sampling.apply(&initial).unwrap();
        let start = objective(&initial, &observed, &sampling, &config).unwrap();
        let end = objective(&solution.image, &observed, &sampling, &config).unwrap();
        assert!(end < start);
    }

    #[test]
    fn step_wise_interface_walks_through_states() {
        let (initial, sampling) = corrupted(12, 0.3, 5);
        let config = SolverConfig {
            max_iterations: 3,
            tolerance: 1e-12,
            ..SolverConfig::default()
        };
        let mut engine = SplittingEngine::new(initial, &sampling, config).unwrap();
        assert_eq!(engine.state(), SolveState::Initialized);
        assert_eq!(engine.step().unwrap(), None);
        assert_eq!(engine.state(), SolveState::Iterating);
        assert_eq!(engine.step().unwrap(), None);
        assert_eq!(
            engine.step().unwrap(),
            Some(SolveState::MaxIterationsReached)
        );
        assert_eq!(
            engine.step().unwrap(),
            Some(SolveState::MaxIterationsReached)
        );
        assert_eq!(engine.iteration(), 3);
        assert_eq!(engine.history().len(), 3);
        let solution = engine.finish().unwrap();
        assert_eq!(solution.iterations, 3);
    }

    #[test]
    fn invalid_configuration_fails_before_iterating() {
        let (initial, sampling) = corrupted(8, 0.5, 1);
        let config = SolverConfig {
            rho: 0.0,
            ..SolverConfig::default()
        };
        let err = SplittingEngine::new(initial, &sampling, config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn mismatched_mask_is_a_shape_error() {
        let initial = synthetic(8, 9);
        let sampling = SamplingOperator::from_pixel_mask(&Array2::from_elem((8, 8), true));
        let err = SplittingEngine::new(initial, &sampling, SolverConfig::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Shape);
    }

    #[test]
    fn non_finite_initial_estimate_is_rejected() {
        let (mut initial, sampling) = corrupted(8, 0.5, 1);
        initial[[0, 0, 0]] = f64::NAN;
        let err = SplittingEngine::new(initial, &sampling, SolverConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::NonFinite { iteration: Some(0) }));
    }

    #[test]
    fn overflow_during_first_step_reports_iteration_one() {
        // finite start whose reflection 2x - z overflows
        let mut initial = Array3::<f64>::zeros((6, 6, 3));
        initial[[2, 3, 1]] = 1.5e308;
        let sampling = SamplingOperator::from_pixel_mask(&Array2::from_elem((6, 6), true));
        let config = SolverConfig {
            weight_f: 0.0,
            weight_g: 0.0,
            ..SolverConfig::default()
        };
        let mut engine = SplittingEngine::new(initial, &sampling, config).unwrap();
        let err = engine.step().unwrap_err();
        assert!(matches!(err, Error::NonFinite { iteration: Some(1) }));
        assert_eq!(err.kind(), ErrorKind::Numerical);
        assert_eq!(engine.iteration(), 0);
        assert!(engine.history().is_empty());
    }
}
