//! Iterative maximum-likelihood branch length estimation.
//!
//! Evaluate the expensive log-likelihood at a handful of branch lengths, fit
//! a [`Bsm`] through them and move the sample toward the model's analytic
//! maximum until the prediction stops moving:
//!
//! 1. Evaluate at every `tᵢ`. If the sample does not enclose a maximum,
//!    rebracket from [`EstimateOptions::restart_points`] with the adaptive
//!    selector, then trim or densify back to `n` points.
//! 2. Rescale the starting model through the best point and fit.
//! 3. Until convergence: predict `t̂ = ml_t(model)`, evaluate there, keep the
//!    best `n` points, refit.
use crate::{
    bsm::{
        fit::{FitOptions, fit_bsm},
        model::Bsm,
    },
    curve::{
        classify::{CurveShape, classify_curve},
        errors::{CurveError, CurveResult},
        likelihood::BranchLikelihood,
        point::{Point, argmax_ll, sort_by_t},
        select::{SelectOptions, select_points_with},
        subset::subset_points,
    },
};

/// Returned in place of a negative ML branch length.
pub const MIN_BRANCH_LENGTH: f64 = 1e-8;

/// Result of [`estimate_ml_t`].
///
/// `ml_t` is the best-effort estimate even when `success` is `false`; it may
/// then be NaN. `refits` counts fits after the initial one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MlEstimate {
    pub ml_t: f64,
    pub success: bool,
    pub refits: usize,
}

impl MlEstimate {
    fn success(ml_t: f64, refits: usize) -> Self {
        Self { ml_t, success: true, refits }
    }

    fn failure(ml_t: f64, refits: usize) -> Self {
        Self { ml_t, success: false, refits }
    }
}

/// Configuration for [`estimate_ml_t_with`].
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateOptions {
    /// Stop once `|t̂ − t_best| ≤ tolerance`.
    pub tolerance: f64,
    /// Refits allowed after the initial fit.
    pub max_refits: usize,
    /// Starting branch lengths when the caller's sample has no maximum.
    pub restart_points: Vec<f64>,
    /// Point budget of the restart search.
    pub restart_budget: usize,
    pub select: SelectOptions,
    pub fit: FitOptions,
}

impl EstimateOptions {
    /// Default options with the given tolerance.
    ///
    /// # Errors
    /// [`CurveError::InvalidTolerance`] unless `tolerance` is finite and `> 0`.
    pub fn new(tolerance: f64) -> CurveResult<Self> {
        let opts = Self { tolerance, ..Self::default() };
        opts.validate()?;
        Ok(opts)
    }

    /// # Errors
    /// - [`CurveError::InvalidTolerance`] for a non-finite or non-positive
    ///   tolerance.
    /// - [`CurveError::TooFewPoints`] / [`CurveError::InvalidBranchLength`]
    ///   for unusable restart points.
    /// - [`CurveError::BudgetTooSmall`] if the restart budget cannot hold the
    ///   restart points.
    pub fn validate(&self) -> CurveResult<()> {
        if !self.tolerance.is_finite() {
            return Err(CurveError::InvalidTolerance {
                tol: self.tolerance,
                reason: "Tolerance must be finite.",
            });
        }
        if self.tolerance <= 0.0 {
            return Err(CurveError::InvalidTolerance {
                tol: self.tolerance,
                reason: "Tolerance must be positive.",
            });
        }
        validate_branch_lengths(&self.restart_points, 2)?;
        if self.restart_budget < self.restart_points.len() {
            return Err(CurveError::BudgetTooSmall {
                max_points: self.restart_budget,
                actual: self.restart_points.len(),
            });
        }
        Ok(())
    }
}

impl Default for EstimateOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-3,
            max_refits: 30,
            restart_points: vec![0.1, 0.5, 1.0],
            restart_budget: 8,
            select: SelectOptions::default(),
            fit: FitOptions::default(),
        }
    }
}

/// [`estimate_ml_t_with`] using default options and the given tolerance.
///
/// # Parameters
/// - `log_like`: the expensive likelihood; called once per sampled `t`.
/// - `ts`: at least three starting branch lengths, overwritten with the
///   final sample.
/// - `tolerance`: stop once the prediction is this close to the best
///   sampled `t`.
/// - `model`: starting BSM, replaced by the last fitted one.
///
/// # Returns
/// An [`MlEstimate`]; check `success` before trusting `ml_t`.
///
/// # Errors
/// As [`estimate_ml_t_with`].
pub fn estimate_ml_t<L: BranchLikelihood + ?Sized>(
    log_like: &L, ts: &mut [f64], tolerance: f64, model: &mut Bsm,
) -> CurveResult<MlEstimate> {
    let opts = EstimateOptions { tolerance, ..EstimateOptions::default() };
    estimate_ml_t_with(log_like, ts, model, &opts)
}

/// Estimate the maximum-likelihood branch length of `log_like`.
///
/// `ts` holds the starting branch lengths; on return it holds the final
/// sample (sorted) whenever a bracketing sample was established. `model` is
/// the starting BSM and ends as the last fitted model.
///
/// Numerical trouble never errors; it ends in `success = false`:
/// - a fit errors or stops without converging (including a sample holding a
///   `−∞` log-likelihood, which the fit rejects);
/// - the prediction is non-finite or leaves the bracket around the best
///   point;
/// - a new sample point would break the bracket;
/// - the refit budget runs out.
///
/// A negative prediction is reported as [`MIN_BRANCH_LENGTH`] with success,
/// and so is the smallest branch length of a restart that finds a
/// decreasing curve.
///
/// # Errors
/// - [`CurveError::TooFewPoints`] for fewer than three branch lengths.
/// - [`CurveError::InvalidBranchLength`] for a non-finite or negative `tᵢ`.
/// - [`CurveError::InvalidModel`] for an invalid starting model.
/// - Option validation errors from [`EstimateOptions::validate`].
pub fn estimate_ml_t_with<L: BranchLikelihood + ?Sized>(
    log_like: &L, ts: &mut [f64], model: &mut Bsm, opts: &EstimateOptions,
) -> CurveResult<MlEstimate> {
    opts.validate()?;
    validate_branch_lengths(ts, 3)?;
    model.validate()?;
    let n = ts.len();

    let mut points = evaluate(log_like, ts);
    sort_by_t(&mut points);
    if classify_curve(&points) != CurveShape::EnclosesMaximum {
        tracing::debug!(n, "sample does not enclose a maximum; restarting");
        match rebracket(log_like, n, opts)? {
            Bracket::Ready(p) => points = p,
            Bracket::Decreasing(t) => return Ok(MlEstimate::success(t, 0)),
            Bracket::Failed => return Ok(MlEstimate::failure(f64::NAN, 0)),
        }
    }

    let estimate = refine(log_like, &mut points, n, model, opts);
    for (slot, p) in ts.iter_mut().zip(&points) {
        *slot = p.t;
    }
    Ok(estimate)
}

/// Outcome of a restart from the default start points.
enum Bracket {
    Ready(Vec<Point>),
    Decreasing(f64),
    Failed,
}

/// What the refit loop does with a prediction `t̂`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Verdict {
    /// Stop with this estimate.
    Accept(f64),
    /// Stop without an estimate.
    Reject(&'static str),
    /// Evaluate the likelihood at `t̂` and refit.
    Sample,
}

/// Fit-and-move loop on a sample of `n` points enclosing a maximum.
fn refine<L: BranchLikelihood + ?Sized>(
    log_like: &L, points: &mut Vec<Point>, n: usize, model: &mut Bsm, opts: &EstimateOptions,
) -> MlEstimate {
    let Some(mut best) = argmax_ll(points) else {
        return MlEstimate::failure(f64::NAN, 0);
    };
    if let Err(err) = model.rescale(points[best].t, points[best].ll) {
        tracing::warn!(error = %err, "could not rescale starting model; fitting unscaled");
    }
    if !fit(points, model, opts) {
        return MlEstimate::failure(points[best].t, 0);
    }

    let mut refits = 0;
    loop {
        let t_hat = model.ml_t();
        tracing::debug!(refits, t_hat, best_t = points[best].t, "ML branch length prediction");

        match judge(t_hat, points, best, refits, opts) {
            Verdict::Accept(t) => return MlEstimate::success(t, refits),
            Verdict::Reject(reason) => {
                tracing::warn!(t_hat, refits, reason, "abandoning ML estimate");
                return MlEstimate::failure(t_hat, refits);
            }
            Verdict::Sample => {}
        }

        let ll = log_like.log_likelihood(t_hat);
        if ll.is_nan() {
            tracing::warn!(t_hat, "log-likelihood is NaN at predicted branch length");
            return MlEstimate::failure(t_hat, refits);
        }
        if !absorb(points, Point::new(t_hat, ll), n) {
            tracing::warn!(t_hat, "sample no longer encloses a maximum");
            return MlEstimate::failure(t_hat, refits);
        }

        refits += 1;
        if !fit(points, model, opts) {
            return MlEstimate::failure(t_hat, refits);
        }
        best = match argmax_ll(points) {
            Some(i) => i,
            None => return MlEstimate::failure(t_hat, refits),
        };
    }
}

/// Decide on `t_hat` given the sample sorted by `t` and its best index.
///
/// Checks, in order: non-finite, negative (clamped to
/// [`MIN_BRANCH_LENGTH`]), within tolerance of the best `t`, refit budget,
/// inside the interval spanned by the best point's neighbours.
fn judge(
    t_hat: f64, points: &[Point], best: usize, refits: usize, opts: &EstimateOptions,
) -> Verdict {
    if !t_hat.is_finite() {
        return Verdict::Reject("fitted model has no finite maximum");
    }
    if t_hat < 0.0 {
        return Verdict::Accept(MIN_BRANCH_LENGTH);
    }
    if (t_hat - points[best].t).abs() <= opts.tolerance {
        return Verdict::Accept(t_hat);
    }
    if refits >= opts.max_refits {
        return Verdict::Reject("refit budget exhausted");
    }
    let lo = points[best.saturating_sub(1)].t;
    let hi = points[(best + 1).min(points.len() - 1)].t;
    if t_hat < lo || t_hat > hi {
        return Verdict::Reject("prediction left the bracket around the best point");
    }
    Verdict::Sample
}

/// Add `p` and keep the best `n` points sorted by `t`.
///
/// Returns `false` and leaves `points` unchanged when the enlarged sample no
/// longer encloses a maximum.
fn absorb(points: &mut Vec<Point>, p: Point, n: usize) -> bool {
    let before = points.clone();
    points.push(p);
    sort_by_t(points);
    if classify_curve(points) != CurveShape::EnclosesMaximum || subset_points(points, n).is_err() {
        *points = before;
        return false;
    }
    points.truncate(n);
    true
}

/// Restart from the configured start points and shape the result to `n`
/// points.
fn rebracket<L: BranchLikelihood + ?Sized>(
    log_like: &L, n: usize, opts: &EstimateOptions,
) -> CurveResult<Bracket> {
    let start = evaluate(log_like, &opts.restart_points);
    if start.iter().any(|p| p.ll.is_nan()) {
        tracing::warn!("log-likelihood is NaN at a restart point");
        return Ok(Bracket::Failed);
    }
    let mut points = select_points_with(log_like, &start, opts.restart_budget, &opts.select)?;

    match classify_curve(&points) {
        CurveShape::EnclosesMaximum => {}
        CurveShape::MonotonicDecreasing => {
            return Ok(points.first().map_or(Bracket::Failed, |p| Bracket::Decreasing(p.t)));
        }
        shape => {
            tracing::warn!(?shape, "restart did not bracket a maximum");
            return Ok(Bracket::Failed);
        }
    }

    if points.len() > n {
        subset_points(&mut points, n)?;
        points.truncate(n);
    }
    while points.len() < n {
        let Some(t) = densify_at(&points) else {
            return Ok(Bracket::Failed);
        };
        let ll = log_like.log_likelihood(t);
        if ll.is_nan() {
            tracing::warn!(t, "log-likelihood is NaN while densifying the bracket");
            return Ok(Bracket::Failed);
        }
        points.push(Point::new(t, ll));
        sort_by_t(&mut points);
    }
    Ok(Bracket::Ready(points))
}

/// Midpoint of the wider interval next to the maximum (left on ties).
fn densify_at(points: &[Point]) -> Option<f64> {
    let i = argmax_ll(points)?;
    if i == 0 || i + 1 >= points.len() {
        return None;
    }
    let left = points[i].t - points[i - 1].t;
    let right = points[i + 1].t - points[i].t;
    Some(if left >= right { points[i - 1].t + left / 2.0 } else { points[i].t + right / 2.0 })
}

/// Refit in place; `false` when the optimizer errored or did not converge.
fn fit(points: &[Point], model: &mut Bsm, opts: &EstimateOptions) -> bool {
    match fit_bsm(points, None, model, &opts.fit) {
        Ok(outcome) if outcome.converged => true,
        Ok(outcome) => {
            tracing::warn!(status = %outcome.status, "BSM fit did not converge");
            false
        }
        Err(err) => {
            tracing::warn!(error = %err, "BSM fit failed");
            false
        }
    }
}

fn evaluate<L: BranchLikelihood + ?Sized>(log_like: &L, ts: &[f64]) -> Vec<Point> {
    ts.iter().map(|&t| Point::new(t, log_like.log_likelihood(t))).collect()
}

fn validate_branch_lengths(ts: &[f64], required: usize) -> CurveResult<()> {
    if ts.len() < required {
        return Err(CurveError::TooFewPoints { required, actual: ts.len() });
    }
    for (index, &t) in ts.iter().enumerate() {
        if !t.is_finite() || t < 0.0 {
            return Err(CurveError::InvalidBranchLength { index, t });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn reference() -> Bsm {
        Bsm::new(1200.0, 300.0, 1.0, 0.2).expect("valid model")
    }

    fn start_model() -> Bsm {
        Bsm::new(1800.0, 400.0, 1.0, 0.5).expect("valid model")
    }

    #[test]
    // Purpose
    // -------
    // A bracketing sample converges to the generating model's maximum.
    //
    // Given
    // -----
    // - ts = 0.1, 0.5, 1.0, 1.5 on BSM(1200, 300, 1, 0.2).
    // - Starting model BSM(1800, 400, 1, 0.5), tolerance 1e-3.
    //
    // Expect
    // ------
    // - Success, estimate within 0.01 of ≈0.3108, `ts` still sorted and of
    //   the same length.
    fn bracketing_sample_converges() {
        let reference = reference();
        let ll = |t: f64| reference.log_likelihood(t);
        let mut ts = [0.1, 0.5, 1.0, 1.5];
        let mut model = start_model();

        let est = estimate_ml_t(&ll, &mut ts, 1e-3, &mut model).expect("valid input");

        assert!(est.success);
        assert!((est.ml_t - reference.ml_t()).abs() < 0.01, "ml_t = {}", est.ml_t);
        assert!(ts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    // Purpose
    // -------
    // A sample entirely right of the maximum restarts and still reports an
    // estimate consistent with the fitted model.
    fn sample_without_maximum_restarts() {
        let reference = reference();
        let ll = |t: f64| reference.log_likelihood(t);
        let mut ts = [1.0, 1.1, 1.4, 1.5];
        let mut model = start_model();

        let est = estimate_ml_t(&ll, &mut ts, 1e-3, &mut model).expect("valid input");

        assert!(est.success);
        assert!((est.ml_t - model.ml_t()).abs() < 0.01);
        assert_eq!(classify_curve(&evaluate(&ll, &ts)), CurveShape::EnclosesMaximum);
    }

    #[test]
    fn decreasing_restart_returns_smallest_branch_length() {
        let falling = |t: f64| -t;
        let mut ts = [1.0, 2.0, 3.0];
        let mut model = start_model();

        let est = estimate_ml_t(&falling, &mut ts, 1e-3, &mut model).expect("valid input");

        assert!(est.success);
        assert_eq!(est.ml_t, 0.1 / 10.0 / 10.0 / 10.0 / 10.0 / 10.0);
        assert_eq!(ts, [1.0, 2.0, 3.0]);
    }

    #[test]
    // Purpose
    // -------
    // An increasing curve never brackets and is reported as a failure, not
    // an error.
    fn increasing_curve_fails_softly() {
        let calls = Cell::new(0usize);
        let rising = |t: f64| {
            calls.set(calls.get() + 1);
            t
        };
        let mut ts = [1.0, 2.0, 3.0];
        let mut model = start_model();

        let est = estimate_ml_t(&rising, &mut ts, 1e-3, &mut model).expect("valid input");

        assert!(!est.success);
        assert!(est.ml_t.is_nan());
        assert_eq!(calls.get(), 3 + 8);
    }

    #[test]
    fn densify_splits_wider_interval_next_to_maximum() {
        let pts = vec![Point::new(0.1, -2.0), Point::new(0.5, -1.0), Point::new(1.0, -3.0)];
        assert_eq!(densify_at(&pts), Some(0.75));
        let pts = vec![Point::new(0.0, -2.0), Point::new(0.5, -1.0), Point::new(1.0, -3.0)];
        assert_eq!(densify_at(&pts), Some(0.25));
        let edge = vec![Point::new(0.1, -1.0), Point::new(0.5, -2.0), Point::new(1.0, -3.0)];
        assert_eq!(densify_at(&edge), None);
    }

    fn bracket() -> Vec<Point> {
        vec![Point::new(0.1, -3.0), Point::new(0.5, -1.0), Point::new(1.0, -2.0)]
    }

    #[test]
    // Purpose
    // -------
    // Each stopping rule of the refit loop fires on its own input.
    //
    // Given
    // -----
    // - Sample t = 0.1, 0.5, 1.0 with the best point in the middle, default
    //   options (tolerance 1e-3, 30 refits).
    //
    // Expect
    // ------
    // - Negative prediction clamps to `MIN_BRANCH_LENGTH`; a prediction next
    //   to the best point is accepted; infinite, out-of-bracket and
    //   over-budget predictions are rejected; anything else is sampled.
    fn judge_applies_stopping_rules_in_order() {
        let pts = bracket();
        let opts = EstimateOptions::default();

        assert_eq!(judge(-0.2, &pts, 1, 0, &opts), Verdict::Accept(MIN_BRANCH_LENGTH));
        assert_eq!(judge(0.5004, &pts, 1, 0, &opts), Verdict::Accept(0.5004));
        assert!(matches!(judge(f64::INFINITY, &pts, 1, 0, &opts), Verdict::Reject(_)));
        assert!(matches!(judge(f64::NAN, &pts, 1, 0, &opts), Verdict::Reject(_)));
        assert_eq!(
            judge(1.5, &pts, 1, 0, &opts),
            Verdict::Reject("prediction left the bracket around the best point")
        );
        assert_eq!(judge(0.3, &pts, 1, 30, &opts), Verdict::Reject("refit budget exhausted"));
        assert_eq!(judge(0.3, &pts, 1, 0, &opts), Verdict::Sample);
        // Negative wins over the budget check.
        assert_eq!(judge(-1.0, &pts, 1, 30, &opts), Verdict::Accept(MIN_BRANCH_LENGTH));
    }

    #[test]
    // Purpose
    // -------
    // A new point that breaks the bracket is refused and the sample kept.
    //
    // Given
    // -----
    // - (0, −1), (1, 0), (2, −0.5); add (1.5, −9), the new global minimum
    //   between the maximum and the right end.
    //
    // Expect
    // ------
    // - `absorb` returns false; the sample is unchanged. A point that stays
    //   inside the bracket is taken and the sample trimmed back to three.
    fn absorb_refuses_points_that_break_the_bracket() {
        let original = vec![Point::new(0.0, -1.0), Point::new(1.0, 0.0), Point::new(2.0, -0.5)];
        let mut pts = original.clone();
        assert!(!absorb(&mut pts, Point::new(1.5, -9.0), 3));
        assert_eq!(pts, original);

        assert!(absorb(&mut pts, Point::new(0.8, 0.5), 3));
        let ts: Vec<f64> = pts.iter().map(|p| p.t).collect();
        assert_eq!(ts, vec![0.0, 0.8, 1.0]);
        assert_eq!(classify_curve(&pts), CurveShape::EnclosesMaximum);
    }

    #[test]
    // Purpose
    // -------
    // With no refits allowed, a first prediction away from the best sample
    // is reported as a failure that still carries the prediction.
    fn zero_refit_budget_fails_with_prediction() {
        let reference = reference();
        let ll = |t: f64| reference.log_likelihood(t);
        let mut ts = [0.1, 0.5, 1.0, 1.5];
        let mut model = start_model();
        let opts = EstimateOptions { max_refits: 0, ..EstimateOptions::default() };

        let est = estimate_ml_t_with(&ll, &mut ts, &mut model, &opts).expect("valid input");

        assert!(!est.success);
        assert_eq!(est.refits, 0);
        assert!((est.ml_t - reference.ml_t()).abs() < 1e-3, "ml_t = {}", est.ml_t);
        assert_eq!(ts, [0.1, 0.5, 1.0, 1.5]);
    }

    #[test]
    // Purpose
    // -------
    // A refit that stops at the iteration cap fails the estimate.
    //
    // Given
    // -----
    // - Starting model equal to the curve behind the first four samples, so
    //   the first fit converges without iterating.
    // - Later evaluations come from a different curve, one L-BFGS iteration
    //   allowed, no line-search fallback.
    //
    // Expect
    // ------
    // - `success == false` after exactly one refit.
    fn refit_that_does_not_converge_fails_estimate() {
        let reference = reference();
        let shifted = Bsm::new(1150.0, 300.0, 1.0, 0.2).expect("valid model");
        let calls = Cell::new(0usize);
        let ll = |t: f64| {
            calls.set(calls.get() + 1);
            if calls.get() <= 4 { reference.log_likelihood(t) } else { shifted.log_likelihood(t) }
        };
        let mut ts = [0.1, 0.5, 1.0, 1.5];
        let mut model = reference;
        let mut fit = FitOptions::with_max_iter(1).expect("valid cap");
        fit.retry_alternate = false;
        let opts = EstimateOptions { fit, ..EstimateOptions::default() };

        let est = estimate_ml_t_with(&ll, &mut ts, &mut model, &opts).expect("valid input");

        assert!(!est.success);
        assert_eq!(est.refits, 1);
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let reference = reference();
        let ll = |t: f64| reference.log_likelihood(t);
        let mut model = start_model();

        let mut two = [0.1, 0.5];
        assert_eq!(
            estimate_ml_t(&ll, &mut two, 1e-3, &mut model),
            Err(CurveError::TooFewPoints { required: 3, actual: 2 })
        );

        let mut negative = [0.1, -0.5, 1.0];
        assert_eq!(
            estimate_ml_t(&ll, &mut negative, 1e-3, &mut model),
            Err(CurveError::InvalidBranchLength { index: 1, t: -0.5 })
        );

        let mut ts = [0.1, 0.5, 1.0];
        assert!(matches!(
            estimate_ml_t(&ll, &mut ts, 0.0, &mut model),
            Err(CurveError::InvalidTolerance { .. })
        ));

        let mut bad_model = Bsm { c: 1.0, m: 1.0, r: 0.0, b: 0.0 };
        assert!(matches!(
            estimate_ml_t(&ll, &mut ts, 1e-3, &mut bad_model),
            Err(CurveError::InvalidModel { name: "r", .. })
        ));
    }

    #[test]
    fn estimate_options_validate_restart_configuration() {
        assert!(EstimateOptions::new(1e-4).is_ok());
        let opts = EstimateOptions { restart_budget: 2, ..EstimateOptions::default() };
        assert_eq!(opts.validate(), Err(CurveError::BudgetTooSmall { max_points: 2, actual: 3 }));
        let opts = EstimateOptions { restart_points: vec![0.5], ..EstimateOptions::default() };
        assert_eq!(opts.validate(), Err(CurveError::TooFewPoints { required: 2, actual: 1 }));
    }
}
