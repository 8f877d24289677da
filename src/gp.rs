use argmin::core::{CostFunction, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use finitediff::FiniteDiff;
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};

use crate::error::{FitError, FitResult};

/// Always-on diagonal jitter added on top of the learned noise variance,
/// keeping the kernel matrix decomposable when the noise level collapses.
const JITTER: f64 = 1e-10;

/// Penalty returned by the likelihood objective for hyperparameters where the
/// kernel matrix fails to decompose, steering the line search back into the
/// feasible region without aborting the solver.
const INFEASIBLE_COST: f64 = 1e10;

/// Knobs for marginal-likelihood hyperparameter optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpFitOptions {
    /// Initial signal variance of the RBF kernel.
    pub initial_variance: f64,
    /// Initial lengthscale as a fraction of the input time range.
    pub initial_length_scale_fraction: f64,
    /// Initial observation noise variance.
    pub initial_noise_variance: f64,
    /// Iteration budget for the L-BFGS solver.
    pub max_opt_iters: u64,
}

impl Default for GpFitOptions {
    fn default() -> Self {
        Self {
            initial_variance: 1.0,
            initial_length_scale_fraction: 0.1,
            initial_noise_variance: 1.0,
            max_opt_iters: 100,
        }
    }
}

/// Optimized kernel hyperparameters, stored in natural (not log) scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpHyperparameters {
    pub signal_variance: f64,
    pub length_scale: f64,
    pub noise_variance: f64,
}

impl GpHyperparameters {
    fn from_log(theta: &[f64]) -> Self {
        Self {
            signal_variance: theta[0].exp(),
            length_scale: theta[1].exp(),
            noise_variance: theta[2].exp(),
        }
    }
}

// ---------------------------------------------------------------------------
// Kernel
// ---------------------------------------------------------------------------

fn squared_exp_kernel(a: f64, b: f64, params: &GpHyperparameters) -> f64 {
    let d = a - b;
    params.signal_variance * (-d * d / (2.0 * params.length_scale * params.length_scale)).exp()
}

/// Symmetric train-train kernel matrix including noise and jitter on the
/// diagonal.
fn build_kernel_matrix(times: &[f64], params: &GpHyperparameters) -> DMatrix<f64> {
    let n = times.len();
    let mut k = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let v = squared_exp_kernel(times[i], times[j], params);
            k[(i, j)] = v;
            k[(j, i)] = v;
        }
        k[(i, i)] += params.noise_variance + JITTER;
    }
    k
}

/// Cross-kernel between query times (rows) and training times (columns).
fn build_cross_kernel_matrix(
    query: &[f64],
    train: &[f64],
    params: &GpHyperparameters,
) -> DMatrix<f64> {
    let mut k = DMatrix::zeros(query.len(), train.len());
    for (i, &q) in query.iter().enumerate() {
        for (j, &t) in train.iter().enumerate() {
            k[(i, j)] = squared_exp_kernel(q, t, params);
        }
    }
    k
}

// ---------------------------------------------------------------------------
// Likelihood objective
// ---------------------------------------------------------------------------

/// Negative log marginal likelihood over log-scale hyperparameters
/// `[ln signal_variance, ln length_scale, ln noise_variance]`.
struct MarginalLikelihood<'a> {
    times: &'a [f64],
    values: &'a [f64],
}

impl MarginalLikelihood<'_> {
    fn log_likelihood(&self, theta: &[f64]) -> f64 {
        if theta.iter().any(|t| !t.is_finite()) {
            return -INFEASIBLE_COST;
        }
        let params = GpHyperparameters::from_log(theta);
        let k = build_kernel_matrix(self.times, &params);
        let Some(chol) = Cholesky::new(k) else {
            return -INFEASIBLE_COST;
        };
        let y = DVector::from_column_slice(self.values);
        let alpha = chol.solve(&y);
        let n = self.values.len() as f64;
        let log_det_half: f64 = chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
        let lml = -0.5 * y.dot(&alpha) - log_det_half - 0.5 * n * (2.0 * std::f64::consts::PI).ln();
        if lml.is_finite() {
            lml
        } else {
            -INFEASIBLE_COST
        }
    }
}

impl CostFunction for MarginalLikelihood<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok(-self.log_likelihood(theta))
    }
}

impl Gradient for MarginalLikelihood<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        Ok(theta.central_diff(&|t| -self.log_likelihood(t)))
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Zero-mean Gaussian process with a squared-exponential kernel, trained by
/// maximizing the log marginal likelihood over the kernel hyperparameters.
#[derive(Debug, Clone)]
pub struct GpModel {
    train_times: Vec<f64>,
    params: GpHyperparameters,
    cholesky: Cholesky<f64, Dyn>,
    alpha: DVector<f64>,
    log_marginal_likelihood: f64,
}

impl GpModel {
    /// Fits the model to scalar inputs `times` and targets `values`.
    ///
    /// The initial lengthscale is a fraction of the span of `times`, so the
    /// optimizer starts from a scale that already resolves the data.
    pub fn fit(times: &[f64], values: &[f64], opts: &GpFitOptions) -> FitResult<Self> {
        if times.len() != values.len() {
            return Err(FitError::ShapeMismatch {
                left: times.len(),
                right: values.len(),
            });
        }
        let mut distinct = times.to_vec();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        if distinct.len() < 3 {
            return Err(FitError::InsufficientSamples {
                needed: 3,
                got: distinct.len(),
            });
        }

        let range = distinct[distinct.len() - 1] - distinct[0];
        let theta0 = vec![
            opts.initial_variance.ln(),
            (range * opts.initial_length_scale_fraction).ln(),
            opts.initial_noise_variance.ln(),
        ];

        let problem = MarginalLikelihood { times, values };
        let linesearch = MoreThuenteLineSearch::new();
        let solver = LBFGS::new(linesearch, 7)
            .with_tolerance_grad(1e-6)
            .map_err(|e| FitError::NumericalInstability(e.to_string()))?
            .with_tolerance_cost(1e-9)
            .map_err(|e| FitError::NumericalInstability(e.to_string()))?;

        let result = Executor::new(problem, solver)
            .configure(|state| state.param(theta0.clone()).max_iters(opts.max_opt_iters))
            .run()
            .map_err(|e| FitError::NumericalInstability(e.to_string()))?;

        let theta = result
            .state()
            .get_best_param()
            .cloned()
            .unwrap_or(theta0);

        Self::assemble(times, values, GpHyperparameters::from_log(&theta))
    }

    /// Conditions the model on the training data at fixed hyperparameters.
    fn assemble(times: &[f64], values: &[f64], params: GpHyperparameters) -> FitResult<Self> {
        let k = build_kernel_matrix(times, &params);
        let cholesky = cholesky_with_jitter(k).ok_or_else(|| {
            FitError::NumericalInstability(
                "kernel matrix is not positive definite at the optimized hyperparameters".into(),
            )
        })?;
        let y = DVector::from_column_slice(values);
        let alpha = cholesky.solve(&y);

        let n = values.len() as f64;
        let log_det_half: f64 = cholesky.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
        let log_marginal_likelihood =
            -0.5 * y.dot(&alpha) - log_det_half - 0.5 * n * (2.0 * std::f64::consts::PI).ln();

        Ok(Self {
            train_times: times.to_vec(),
            params,
            cholesky,
            alpha,
            log_marginal_likelihood,
        })
    }

    pub fn hyperparameters(&self) -> GpHyperparameters {
        self.params
    }

    pub fn log_marginal_likelihood(&self) -> f64 {
        self.log_marginal_likelihood
    }

    /// Posterior predictive mean and variance at the query times. The
    /// variance includes the learned observation noise, matching what an
    /// error band on new measurements should cover.
    pub fn predict(&self, query: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let k_star = build_cross_kernel_matrix(query, &self.train_times, &self.params);
        let mean: Vec<f64> = (&k_star * &self.alpha).iter().copied().collect();

        let flat = self.params.signal_variance + self.params.noise_variance;
        let k_star_t = k_star.transpose();
        let variance = match self.cholesky.l().solve_lower_triangular(&k_star_t) {
            Some(v) => (0..query.len())
                .map(|i| (flat - v.column(i).norm_squared()).max(0.0))
                .collect(),
            // Prior variance fallback when back-substitution fails.
            None => vec![flat; query.len()],
        };
        (mean, variance)
    }
}

/// Cholesky factorization with escalating diagonal jitter. Returns `None`
/// once the jitter budget is exhausted.
fn cholesky_with_jitter(k: DMatrix<f64>) -> Option<Cholesky<f64, Dyn>> {
    if let Some(chol) = Cholesky::new(k.clone()) {
        return Some(chol);
    }
    let mut jitter = JITTER;
    for _ in 0..8 {
        jitter *= 10.0;
        let mut bumped = k.clone();
        for i in 0..bumped.nrows() {
            bumped[(i, i)] += jitter;
        }
        if let Some(chol) = Cholesky::new(bumped) {
            return Some(chol);
        }
    }
    None
}
