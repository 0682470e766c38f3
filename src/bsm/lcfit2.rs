//! Normalized BSM pinned to a known maximum.
//!
//! When the ML branch length `t0` and the curvature `d2 = f''(t0)` are
//! already known (e.g. from a Newton step in the calling program), only the
//! site counts `c > m` remain free. With
//!
//! ```text
//! z = −d2·c·m/(c + m),   r = 2√z/(c − m),   b = ln((c + m)/(c − m))/r − t0
//! ```
//!
//! the curve is the ordinary [`Bsm`] `(c, m, r, b)`, and it can be written
//! around `t0` through `θ̃ = exp(r(t − t0))` and `v = (c − m)/θ̃`:
//!
//! ```text
//! lnl(t) = c·ln(c + m + v) + m·ln(c + m − v) − (c + m)·ln(2(c + m))
//! ```
//!
//! [`Lcfit2::norm_lnl`] is `lnl(t) − lnl(t0)`, so fits run on log-likelihoods
//! shifted to zero at the maximum. [`fit_auto`] chooses the sample itself:
//! the maximum, one point on either side at the inflection distance, and
//! `max_t`, evaluated, weighted toward the peak and fitted twice.
use crate::{
    bsm::{
        fit::{FitData, FitOptions, maximize_with_retry},
        model::Bsm,
    },
    curve::{
        errors::{CurveError, CurveResult},
        likelihood::BranchLikelihood,
        point::Point,
    },
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::{Grad, LogLikelihood, OptimOutcome, Theta, validation::validate_theta},
    },
};
use ndarray::{Array1, array};

/// Number of free parameters in a normalized fit.
const DIM: usize = 2;

/// Normalized BSM: site counts `c > m > 0`, maximum at `t0`, curvature
/// `d2 < 0` there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lcfit2 {
    pub c: f64,
    pub m: f64,
    pub t0: f64,
    pub d2: f64,
}

/// Partial derivatives of [`Lcfit2::norm_lnl`] with respect to `c` and `m`
/// at fixed `t0` and `d2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lcfit2Partials {
    pub c: f64,
    pub m: f64,
}

impl Lcfit2 {
    /// # Errors
    /// [`CurveError::InvalidModel`] as described on [`Lcfit2::validate`].
    pub fn new(c: f64, m: f64, t0: f64, d2: f64) -> CurveResult<Self> {
        let model = Self { c, m, t0, d2 };
        model.validate()?;
        Ok(model)
    }

    /// Check the parameter invariants.
    ///
    /// # Errors
    /// [`CurveError::InvalidModel`] naming the first offending quantity:
    /// `c` or `m` not finite and positive, `c − m` not positive, `t0` not
    /// finite, `d2` not finite and negative.
    pub fn validate(&self) -> CurveResult<()> {
        for (name, value) in [("c", self.c), ("m", self.m)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CurveError::InvalidModel {
                    name,
                    value,
                    reason: "must be finite and positive",
                });
            }
        }
        if self.c <= self.m {
            return Err(CurveError::InvalidModel {
                name: "c - m",
                value: self.c - self.m,
                reason: "must be positive for the curve to have a maximum",
            });
        }
        if !self.t0.is_finite() {
            return Err(CurveError::InvalidModel {
                name: "t0",
                value: self.t0,
                reason: "must be finite",
            });
        }
        if !self.d2.is_finite() || self.d2 >= 0.0 {
            return Err(CurveError::InvalidModel {
                name: "d2",
                value: self.d2,
                reason: "must be finite and negative",
            });
        }
        Ok(())
    }

    /// Normalize a BSM around its own maximum.
    ///
    /// # Parameters
    /// - `model`: a BSM with `c > m`, so that [`Bsm::ml_t`] is finite.
    ///
    /// # Returns
    /// `(c, m, ml_t, f''(ml_t))`. Converting back with [`Lcfit2::to_bsm`]
    /// reproduces `r` and, for a maximum right of zero, `b`.
    ///
    /// # Errors
    /// [`CurveError::InvalidModel`] when `model` has no finite maximum.
    pub fn from_bsm(model: &Bsm) -> CurveResult<Self> {
        let t0 = model.ml_t();
        Self::new(model.c, model.m, t0, model.second_derivative(t0))
    }

    fn z(&self) -> f64 {
        -self.d2 * self.c * self.m / (self.c + self.m)
    }

    /// Rate `r = 2√z/(c − m)` of the equivalent BSM.
    pub fn rate(&self) -> f64 {
        2.0 * self.z().sqrt() / (self.c - self.m)
    }

    /// Offset `b = ln((c + m)/(c − m))/r − t0` of the equivalent BSM, not
    /// clamped.
    pub fn offset(&self) -> f64 {
        ((self.c + self.m) / (self.c - self.m)).ln() / self.rate() - self.t0
    }

    /// Equivalent four-parameter model.
    ///
    /// A slightly negative `b` from rounding is clamped to zero.
    pub fn to_bsm(&self) -> Bsm {
        Bsm { c: self.c, m: self.m, r: self.rate(), b: self.offset().max(0.0) }
    }

    fn theta_tilde(&self, t: f64) -> f64 {
        (self.rate() * (t - self.t0)).exp()
    }

    fn theta(&self, t: f64) -> f64 {
        (self.c + self.m) / (self.c - self.m) * self.theta_tilde(t)
    }

    /// Log-likelihood of the curve at `t`, written around `t0`.
    ///
    /// NaN for `t ≤ −b`, where the equivalent BSM is undefined.
    pub fn lnl(&self, t: f64) -> f64 {
        let (c, m) = (self.c, self.m);
        let v = (c - m) / self.theta_tilde(t);
        c * (c + m + v).ln() + m * (c + m - v).ln() - (c + m) * (2.0 * (c + m)).ln()
    }

    /// `lnl(t) − lnl(t0)`: zero at the maximum, negative elsewhere.
    pub fn norm_lnl(&self, t: f64) -> f64 {
        self.lnl(t) - self.lnl(self.t0)
    }

    /// Slope `f'(t)`.
    pub fn d1f_t(&self, t: f64) -> f64 {
        let r = self.rate();
        let theta = self.theta(t);
        -self.c * r / (theta + 1.0) + self.m * r / (theta - 1.0)
    }

    /// Curvature `f''(t)`; equals `d2` at `t0`.
    pub fn d2f_t(&self, t: f64) -> f64 {
        let r = self.rate();
        let theta = self.theta(t);
        self.c * r * r * theta / (theta + 1.0).powi(2)
            - self.m * r * r * theta / (theta - 1.0).powi(2)
    }

    /// Inflection point right of the maximum, where `f''` changes sign.
    pub fn infl_t(&self) -> f64 {
        let (c, m) = (self.c, self.m);
        -self.offset() + ((c + m + 2.0 * (c * m).sqrt()) / (c - m)).ln() / self.rate()
    }

    /// Distance from the maximum to the inflection point.
    pub fn delta(&self) -> f64 {
        self.infl_t() - self.t0
    }

    /// Gradient of [`Lcfit2::norm_lnl`] at `t` with respect to `(c, m)`;
    /// `r` and `v` move with `c` and `m` through `z`.
    pub fn partials(&self, t: f64) -> Lcfit2Partials {
        let (c, m) = (self.c, self.m);
        let z = self.z();
        let root_z = z.sqrt();
        let r = self.rate();
        let dt = t - self.t0;
        let tt = self.theta_tilde(t);
        let v = (c - m) / tt;
        let (hi, lo) = (c + m + v, c + m - v);
        let base = r * dt / (c - m);

        let dv_c = (base + dt * (z / (c + m) - z / c) / ((c - m) * root_z)) * v;
        let dv_m = (base - dt * (z / (c + m) - z / m) / ((c - m) * root_z)) * v;
        Lcfit2Partials {
            c: (dv_c + 1.0 / tt + 1.0) * c / hi - (dv_c + 1.0 / tt - 1.0) * m / lo
                - (2.0 * c).ln()
                + hi.ln()
                - 1.0,
            m: -(dv_m + 1.0 / tt - 1.0) * c / hi + (dv_m + 1.0 / tt + 1.0) * m / lo + lo.ln()
                - (2.0 * m).ln()
                - 1.0,
        }
    }
}

/// Weights `wᵢ = exp(lnlᵢ − max)^alpha` favouring points near the peak.
///
/// # Returns
/// `(max, weights)`; `max` is `−∞` for an empty slice. `alpha = 0` gives
/// unit weights, including for `−∞` entries.
pub fn compute_weights(lnl: &[f64], alpha: f64) -> (f64, Vec<f64>) {
    let max = lnl.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let w = lnl.iter().map(|&l| (l - max).exp().powf(alpha)).collect();
    (max, w)
}

/// `[t0 − delta, t0, t0 + delta]`, pulled inside `[min_t, max_t]`.
///
/// An end that would leave the range is replaced by the midpoint between
/// `t0` and that bound.
pub fn three_points(model: &Lcfit2, delta: f64, min_t: f64, max_t: f64) -> [f64; 3] {
    let t0 = model.t0;
    let mut left = t0 - delta;
    if left < min_t {
        left = (min_t + t0) / 2.0;
    }
    let mut right = t0 + delta;
    if right > max_t {
        right = (t0 + max_t) / 2.0;
    }
    [left, t0, right]
}

/// Observations for a normalized fit with `t0` and `d2` held fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct Lcfit2Data {
    obs: FitData,
    t0: f64,
    d2: f64,
}

impl Lcfit2Data {
    /// # Errors
    /// Same validation as [`FitData::new`]; `points` carry normalized
    /// log-likelihoods.
    pub fn new(points: &[Point], weights: Option<&[f64]>, model: &Lcfit2) -> OptResult<Self> {
        Ok(Self { obs: FitData::new(points, weights)?, t0: model.t0, d2: model.d2 })
    }

    /// `θ = (ln(c − m), ln m)`.
    pub fn theta_from_model(model: &Lcfit2) -> Theta {
        array![(model.c - model.m).ln(), model.m.ln()]
    }

    /// `m = exp(θ₁)`, `c = m + exp(θ₀)`; `c > m > 0` for every θ.
    pub fn model_from_theta(&self, theta: &Theta) -> Lcfit2 {
        let m = theta[1].exp();
        Lcfit2 { c: m + theta[0].exp(), m, t0: self.t0, d2: self.d2 }
    }
}

/// Weighted least squares of [`Lcfit2::norm_lnl`] against normalized
/// samples, scaled like the four-parameter fit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lcfit2LeastSquares;

impl Lcfit2LeastSquares {
    fn residuals(model: &Lcfit2, data: &Lcfit2Data) -> OptResult<Array1<f64>> {
        let obs = &data.obs;
        let mut out = Array1::zeros(obs.len());
        for (i, (&t, &ll)) in obs.t.iter().zip(obs.ll.iter()).enumerate() {
            let value = model.norm_lnl(t);
            if !value.is_finite() {
                return Err(OptError::NonFiniteModel { t, value });
            }
            out[i] = (value - ll) / obs.scale;
        }
        Ok(out)
    }
}

impl LogLikelihood for Lcfit2LeastSquares {
    type Data = Lcfit2Data;

    fn value(&self, theta: &Theta, data: &Lcfit2Data) -> OptResult<f64> {
        let res = Self::residuals(&data.model_from_theta(theta), data)?;
        Ok(-0.5 * (&data.obs.w * &res * &res).sum())
    }

    fn check(&self, theta: &Theta, data: &Lcfit2Data) -> OptResult<()> {
        validate_theta(theta, DIM)?;
        Self::residuals(&data.model_from_theta(theta), data).map(|_| ())
    }

    /// `dc/dθ₀ = c − m`, `dc/dθ₁ = dm/dθ₁ = m`.
    fn grad(&self, theta: &Theta, data: &Lcfit2Data) -> OptResult<Grad> {
        let model = data.model_from_theta(theta);
        let res = Self::residuals(&model, data)?;
        let obs = &data.obs;
        let mut grad = Array1::zeros(DIM);
        for ((&t, &r), &w) in obs.t.iter().zip(res.iter()).zip(obs.w.iter()) {
            let p = model.partials(t);
            let coeff = -w * r / obs.scale;
            grad[0] += coeff * p.c * (model.c - model.m);
            grad[1] += coeff * (p.c + p.m) * model.m;
        }
        Ok(grad)
    }
}

/// Fit `c` and `m` of `model` to normalized samples, in place.
///
/// `t0` and `d2` are held fixed, so the fitted curve keeps its maximum and
/// curvature there. Line-search fallback follows `opts` as in
/// [`fit_bsm`](super::fit_bsm).
///
/// # Parameters
/// - `points`: `(t, lnl(t) − lnl(t0))` pairs, at least three.
/// - `weights`: optional non-negative weights, one per point.
/// - `model`: starting model on entry, best model found on return.
///
/// # Errors
/// - [`OptError::InvalidStartingModel`] if `model` violates its invariants.
/// - Data validation errors from [`FitData::new`].
/// - Optimizer errors when every attempted line search fails.
pub fn fit_lcfit2(
    points: &[Point], weights: Option<&[f64]>, model: &mut Lcfit2, opts: &FitOptions,
) -> OptResult<OptimOutcome> {
    if model.validate().is_err() {
        return Err(OptError::InvalidStartingModel {
            reason: "c > m > 0, finite t0 and negative finite d2 required",
        });
    }
    let data = Lcfit2Data::new(points, weights, model)?;
    let theta0 = Lcfit2Data::theta_from_model(model);

    let outcome = maximize_with_retry(&Lcfit2LeastSquares, theta0, &data, opts)?;

    *model = data.model_from_theta(&outcome.theta_hat);
    tracing::debug!(
        c = model.c,
        m = model.m,
        converged = outcome.converged,
        iterations = outcome.iterations,
        "fitted normalized BSM"
    );
    Ok(outcome)
}

/// Sample `log_like` around `model.t0` and fit `c` and `m` in two passes.
///
/// Each pass evaluates `log_like` at [`three_points`] (spacing
/// [`Lcfit2::delta`] of the current model) and at `max_t`, subtracts
/// `log_like(t0)`, weights with [`compute_weights`] and runs
/// [`fit_lcfit2`]. The second pass re-spaces the sample with the model
/// from the first, so its outer points sit near the fitted inflection.
///
/// # Parameters
/// - `log_like`: the likelihood callback; called nine times.
/// - `model`: `t0` and `d2` from the caller, `c` and `m` as a starting
///   guess. Updated in place.
/// - `min_t`, `max_t`: branch-length range for the sample.
/// - `alpha`: weight exponent; `0` fits all four points equally.
/// - `opts`: optimizer settings for both passes.
///
/// # Returns
/// The outcome of the second fit.
///
/// # Errors
/// - [`CurveError::InvalidModel`] for an invalid `model`.
/// - [`CurveError::InvalidOption`] unless `0 ≤ min_t < t0 < max_t` (all
///   finite) and `alpha` is finite and non-negative.
/// - [`CurveError::Optimizer`] when a pass fails to fit, including a
///   non-finite log-likelihood at a sampled point.
pub fn fit_auto<L: BranchLikelihood + ?Sized>(
    log_like: &L, model: &mut Lcfit2, min_t: f64, max_t: f64, alpha: f64, opts: &FitOptions,
) -> CurveResult<OptimOutcome> {
    model.validate()?;
    validate_range(model.t0, min_t, max_t, alpha)?;

    let max_lnl = log_like.log_likelihood(model.t0);
    let mut last = None;
    for pass in 1..=2 {
        let delta = model.delta();
        let [left, mid, right] = three_points(model, delta, min_t, max_t);
        let ts = [left, mid, right, max_t];
        let lnl: Vec<f64> = ts.iter().map(|&t| log_like.log_likelihood(t) - max_lnl).collect();
        let (_, w) = compute_weights(&lnl, alpha);
        let points: Vec<Point> = ts.iter().zip(&lnl).map(|(&t, &l)| Point::new(t, l)).collect();
        tracing::debug!(pass, delta, ?ts, ?w, "normalized BSM sample");

        let outcome = fit_lcfit2(&points, Some(w.as_slice()), model, opts)?;
        if !outcome.converged {
            tracing::warn!(pass, status = %outcome.status, "normalized BSM fit did not converge");
        }
        last = Some(outcome);
    }
    last.ok_or(CurveError::Optimizer(OptError::MissingThetaHat))
}

fn validate_range(t0: f64, min_t: f64, max_t: f64, alpha: f64) -> CurveResult<()> {
    let invalid = |name: &'static str, value: f64, reason: &'static str| -> CurveResult<()> {
        Err(CurveError::InvalidOption { name, value, reason })
    };
    if !min_t.is_finite() || min_t < 0.0 || min_t >= t0 {
        return invalid("min_t", min_t, "must be finite, non-negative and below t0");
    }
    if !max_t.is_finite() || max_t <= t0 {
        return invalid("max_t", max_t, "must be finite and above t0");
    }
    if !alpha.is_finite() || alpha < 0.0 {
        return invalid("alpha", alpha, "must be finite and non-negative");
    }
    Ok(())
}
