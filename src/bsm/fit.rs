//! Weighted least-squares fit of a [`Bsm`] to sampled points.
//!
//! The fit is posed as a log-likelihood for the generic L-BFGS maximizer:
//!
//! ```text
//! ℓ(θ) = −½ Σ wᵢ · (f_θ(tᵢ) − llᵢ)² / s²,    s = max |llᵢ|
//! ```
//!
//! Dividing by `s²` keeps costs and gradients of order one whatever the
//! magnitude of the log-likelihoods. The model is reached from the
//! unconstrained vector through
//!
//! ```text
//! c = exp(θ₀),  m = exp(θ₁),  r = exp(θ₂),  b = softplus(θ₃) − t_min
//! ```
//!
//! so every candidate satisfies `c, m, r > 0` and `t + b > 0` on the sample.
use crate::{
    bsm::model::Bsm,
    curve::point::Point,
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::{
            Grad, LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Theta, Tolerances,
            maximize, validation::validate_theta,
        },
        numerical_stability::{safe_logistic, safe_softplus, safe_softplus_inv},
    },
};
use ndarray::{Array1, array};

/// Number of free parameters.
const DIM: usize = 4;

/// Smallest `t_min + b` used when mapping a starting model into θ-space.
const MIN_SHIFT: f64 = 1e-8;

/// Observations for one fit, validated and pre-scaled.
#[derive(Debug, Clone, PartialEq)]
pub struct FitData {
    pub(crate) t: Array1<f64>,
    pub(crate) ll: Array1<f64>,
    pub(crate) w: Array1<f64>,
    pub(crate) scale: f64,
    pub(crate) t_min: f64,
}

impl FitData {
    /// Validate the observations and optional weights.
    ///
    /// Weights default to one. At least three points are required.
    ///
    /// # Errors
    /// - [`OptError::TooFewPoints`] for fewer than three points.
    /// - [`OptError::InvalidObservation`] for a non-finite `t` or `ll`.
    /// - [`OptError::WeightLengthMismatch`] / [`OptError::InvalidWeight`].
    pub fn new(points: &[Point], weights: Option<&[f64]>) -> OptResult<Self> {
        if points.len() < 3 {
            return Err(OptError::TooFewPoints { required: 3, actual: points.len() });
        }
        for (index, p) in points.iter().enumerate() {
            if !p.t.is_finite() || !p.ll.is_finite() {
                return Err(OptError::InvalidObservation { index, t: p.t, ll: p.ll });
            }
        }
        let w = match weights {
            Some(w) => {
                if w.len() != points.len() {
                    return Err(OptError::WeightLengthMismatch {
                        expected: points.len(),
                        actual: w.len(),
                    });
                }
                for (index, &value) in w.iter().enumerate() {
                    if !value.is_finite() || value < 0.0 {
                        return Err(OptError::InvalidWeight { index, value });
                    }
                }
                Array1::from(w.to_vec())
            }
            None => Array1::ones(points.len()),
        };

        let t: Array1<f64> = points.iter().map(|p| p.t).collect();
        let ll: Array1<f64> = points.iter().map(|p| p.ll).collect();
        let scale = ll.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        let scale = if scale > 0.0 { scale } else { 1.0 };
        let t_min = t.iter().copied().fold(f64::INFINITY, f64::min);
        Ok(Self { t, ll, w, scale, t_min })
    }

    /// Map a model into θ-space; `t_min + b` is floored at a tiny positive
    /// shift so the starting curve is defined on every sample.
    pub fn theta_from_model(&self, model: &Bsm) -> Theta {
        let shift = (model.b + self.t_min).max(MIN_SHIFT);
        array![model.c.ln(), model.m.ln(), model.r.ln(), safe_softplus_inv(shift)]
    }

    /// Map θ back to model parameters.
    pub fn model_from_theta(&self, theta: &Theta) -> Bsm {
        Bsm {
            c: theta[0].exp(),
            m: theta[1].exp(),
            r: theta[2].exp(),
            b: safe_softplus(theta[3]) - self.t_min,
        }
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

/// Least-squares objective of a BSM against [`FitData`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BsmLeastSquares;

impl BsmLeastSquares {
    /// Scaled residuals `(f(tᵢ) − llᵢ)/s`, failing on a non-finite model value.
    fn residuals(model: &Bsm, data: &FitData) -> OptResult<Array1<f64>> {
        let mut out = Array1::zeros(data.len());
        for (i, (&t, &ll)) in data.t.iter().zip(data.ll.iter()).enumerate() {
            let value = model.log_likelihood(t);
            if !value.is_finite() {
                return Err(OptError::NonFiniteModel { t, value });
            }
            out[i] = (value - ll) / data.scale;
        }
        Ok(out)
    }
}

impl LogLikelihood for BsmLeastSquares {
    type Data = FitData;

    fn value(&self, theta: &Theta, data: &FitData) -> OptResult<f64> {
        let model = data.model_from_theta(theta);
        let res = Self::residuals(&model, data)?;
        Ok(-0.5 * (&data.w * &res * &res).sum())
    }

    fn check(&self, theta: &Theta, data: &FitData) -> OptResult<()> {
        validate_theta(theta, DIM)?;
        Self::residuals(&data.model_from_theta(theta), data).map(|_| ())
    }

    /// `∂ℓ/∂θⱼ = −Σ wᵢ rᵢ/s · ∂f/∂pⱼ · dpⱼ/dθⱼ`.
    fn grad(&self, theta: &Theta, data: &FitData) -> OptResult<Grad> {
        let model = data.model_from_theta(theta);
        let res = Self::residuals(&model, data)?;
        let chain = [model.c, model.m, model.r, safe_logistic(theta[3])];
        let mut grad = Array1::zeros(DIM);
        for ((&t, &r), &w) in data.t.iter().zip(res.iter()).zip(data.w.iter()) {
            let p = model.partials(t);
            let coeff = -w * r / data.scale;
            for (j, d) in [p.c, p.m, p.r, p.b].into_iter().enumerate() {
                grad[j] += coeff * d * chain[j];
            }
        }
        Ok(grad)
    }
}

/// Configuration of a single BSM fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    /// Optimizer settings for the first attempt.
    pub mle: MLEOptions,
    /// Retry once with the other line search when the first run errors or
    /// stops without converging.
    pub retry_alternate: bool,
}

impl FitOptions {
    pub fn new(mle: MLEOptions, retry_alternate: bool) -> Self {
        Self { mle, retry_alternate }
    }

    /// Default options with a different iteration cap.
    ///
    /// # Errors
    /// [`OptError::InvalidMaxIter`] for `max_iter == 0`.
    pub fn with_max_iter(max_iter: usize) -> OptResult<Self> {
        let mut opts = Self::default();
        let tols = opts.mle.tols;
        opts.mle.tols = Tolerances::new(tols.tol_grad, tols.tol_cost, Some(max_iter))?;
        Ok(opts)
    }
}

impl Default for FitOptions {
    /// More–Thuente, `tol_grad = 1e-9` on the scaled objective, at most 500
    /// iterations, Hager–Zhang as fallback.
    fn default() -> Self {
        let mle = MLEOptions {
            tols: Tolerances { tol_grad: Some(1e-9), tol_cost: None, max_iter: Some(500) },
            line_searcher: LineSearcher::MoreThuente,
            verbose: false,
            lbfgs_mem: None,
        };
        Self { mle, retry_alternate: true }
    }
}

/// Fit `model` to `points` by weighted least squares, updating it in place.
///
/// # Parameters
/// - `points`: at least three finite samples.
/// - `weights`: optional non-negative weights, one per point; `None` means
///   all ones.
/// - `model`: the starting point and, on return, the best model found.
/// - `opts`: optimizer settings and the line-search fallback switch.
///
/// # Returns
/// The optimizer outcome. `converged` is true only when the solver reported
/// convergence; hitting the iteration cap still updates the model.
///
/// # Errors
/// - [`OptError::InvalidStartingModel`] if `model` violates its invariants.
/// - Data validation errors from [`FitData::new`].
/// - Optimizer errors when every attempted line search fails.
///
/// A run that errors or stops without converging (iteration cap, aborted
/// line search) is retried once with the alternate line search when
/// `opts.retry_alternate` is set; the better of the two attempts is kept.
pub fn fit_bsm(
    points: &[Point], weights: Option<&[f64]>, model: &mut Bsm, opts: &FitOptions,
) -> OptResult<OptimOutcome> {
    if model.validate().is_err() {
        return Err(OptError::InvalidStartingModel {
            reason: "c, m and r must be finite and positive, b finite",
        });
    }
    let data = FitData::new(points, weights)?;
    let theta0 = data.theta_from_model(model);

    let outcome = maximize_with_retry(&BsmLeastSquares, theta0, &data, opts)?;

    *model = data.model_from_theta(&outcome.theta_hat);
    tracing::debug!(
        c = model.c,
        m = model.m,
        r = model.r,
        b = model.b,
        converged = outcome.converged,
        iterations = outcome.iterations,
        "fitted BSM"
    );
    Ok(outcome)
}

/// Run `objective` from `theta0` under `opts`.
///
/// When `opts.retry_alternate` is set and the first run errors or ends
/// without converging, the other line search is run once from the same
/// start and [`better_outcome`] decides between the two.
///
/// # Errors
/// The first run's error when no retry is allowed; otherwise an error only
/// when both runs failed (the second one's).
pub(crate) fn maximize_with_retry<F: LogLikelihood>(
    objective: &F, theta0: Theta, data: &F::Data, opts: &FitOptions,
) -> OptResult<OptimOutcome> {
    let first = maximize(objective, theta0.clone(), data, &opts.mle);
    let settled = matches!(&first, Ok(out) if out.converged);
    if settled || !opts.retry_alternate {
        return first;
    }

    let retry = opts.mle.with_alternate_line_search();
    match &first {
        Ok(out) => tracing::warn!(
            status = %out.status,
            retry_with = ?retry.line_searcher,
            "fit did not converge; retrying with alternate line search"
        ),
        Err(err) => tracing::warn!(
            error = %err,
            retry_with = ?retry.line_searcher,
            "fit failed; retrying with alternate line search"
        ),
    }
    better_outcome(first, maximize(objective, theta0, data, &retry))
}

/// Pick between two attempts: a converged run wins, then the higher `ℓ`;
/// the second error is returned only when both failed.
fn better_outcome(
    first: OptResult<OptimOutcome>, second: OptResult<OptimOutcome>,
) -> OptResult<OptimOutcome> {
    match (first, second) {
        (_, Ok(b)) if b.converged => Ok(b),
        (Ok(a), Ok(b)) => Ok(if b.value > a.value { b } else { a }),
        (Ok(a), Err(_)) => Ok(a),
        (Err(_), second) => second,
    }
}
