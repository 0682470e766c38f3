//! Integration tests for the branch-length estimation pipeline.
//!
//! Purpose
//! -------
//! - Drive the public API end to end on the reference model
//!   BSM(1200, 300, 1, 0.2): bracket the maximum, estimate the ML branch
//!   length, trim the sample and measure how well the fitted curve matches
//!   fresh evaluations.
//!
//! Coverage
//! --------
//! - `curve`: `select_points`, `classify_curve`, `subset_points`, callbacks
//!   carrying their own context.
//! - `bsm`: `estimate_ml_t` on bracketing and non-bracketing starts,
//!   `fit_bsm` with weights, the normalized `Lcfit2` form seeded from an
//!   estimate and refined with `fit_auto`.
//! - `divergence`: `kl_divergence` between fitted and true curves.
//!
//! Exclusions
//! ----------
//! - Edge cases of the individual building blocks; unit tests cover those.
use approx::assert_abs_diff_eq;
use lcfit::{
    Bsm, CurveShape, Lcfit2, Point, classify_curve, estimate_ml_t, fit_auto, fit_bsm,
    kl_divergence,
    bsm::{EstimateOptions, FitOptions, estimate_ml_t_with},
    curve::{BranchLikelihood, WithContext},
    select_points, subset_points,
};

fn reference() -> Bsm {
    Bsm::new(1200.0, 300.0, 1.0, 0.2).expect("valid model")
}

fn start_model() -> Bsm {
    Bsm::new(1800.0, 400.0, 1.0, 0.5).expect("valid model")
}

fn sample<L: BranchLikelihood + ?Sized>(log_like: &L, ts: &[f64]) -> Vec<Point> {
    ts.iter().map(|&t| Point::new(t, log_like.log_likelihood(t))).collect()
}

#[test]
// Purpose
// -------
// The selector brackets the reference maximum with a single extra point.
//
// Given
// -----
// - Start at t = 0.5, 1.0, 1.1 (all right of the maximum), budget 8.
//
// Expect
// ------
// - Exactly t = 0.05, 0.5, 1.0, 1.1 with the model's own log-likelihoods;
//   the sample encloses a maximum.
fn selector_brackets_reference_maximum() {
    let model = reference();
    let ll = |t: f64| model.log_likelihood(t);
    let start = sample(&ll, &[0.5, 1.0, 1.1]);

    let out = select_points(&ll, &start, 8).expect("valid sample");

    let ts: Vec<f64> = out.iter().map(|p| p.t).collect();
    assert_eq!(ts, vec![0.05, 0.5, 1.0, 1.1]);
    for p in &out {
        assert_eq!(p.ll, model.log_likelihood(p.t));
    }
    assert_eq!(classify_curve(&out), CurveShape::EnclosesMaximum);
}

#[test]
// Purpose
// -------
// Estimate from a bracketing start.
//
// Given
// -----
// - t = 0.1, 0.5, 1.0, 1.5; starting model BSM(1800, 400, 1, 0.5);
//   tolerance 1e-3.
//
// Expect
// ------
// - Success within 0.01 of the closed-form maximum `ln(5/3) − 0.2`.
fn estimate_converges_from_bracketing_start() {
    let reference = reference();
    let ll = |t: f64| reference.log_likelihood(t);
    let mut ts = [0.1, 0.5, 1.0, 1.5];
    let mut model = start_model();

    let est = estimate_ml_t(&ll, &mut ts, 1e-3, &mut model).expect("valid input");

    assert!(est.success);
    assert_abs_diff_eq!(est.ml_t, (5.0f64 / 3.0).ln() - 0.2, epsilon = 0.01);
    assert_abs_diff_eq!(est.ml_t, lcfit::ml_t(&model), epsilon = 1e-3);
}

#[test]
// Purpose
// -------
// Estimate from a start that lies entirely right of the maximum.
//
// Given
// -----
// - t = 1.0, 1.1, 1.4, 1.5 on the reference model.
//
// Expect
// ------
// - Success, estimate consistent with the fitted model, and a final sample
//   of four points enclosing a maximum.
fn estimate_recovers_from_non_bracketing_start() {
    let reference = reference();
    let ll = |t: f64| reference.log_likelihood(t);
    let mut ts = [1.0, 1.1, 1.4, 1.5];
    let mut model = start_model();

    let est = estimate_ml_t(&ll, &mut ts, 1e-3, &mut model).expect("valid input");

    assert!(est.success);
    assert_abs_diff_eq!(est.ml_t, model.ml_t(), epsilon = 0.01);
    assert_eq!(classify_curve(&sample(&ll, &ts)), CurveShape::EnclosesMaximum);
}

#[test]
// Purpose
// -------
// Full pipeline with a context-carrying callback behind a trait object.
//
// Given
// -----
// - A `WithContext` wrapping the reference model, used as
//   `&dyn BranchLikelihood`.
//
// Expect
// ------
// - Selection, estimation and subsetting all succeed; the fitted curve's
//   values at the final sample are within 0.01 bits of the true ones.
fn pipeline_select_estimate_subset_divergence() {
    let wrapped = WithContext::new(reference(), |t: f64, m: &Bsm| m.log_likelihood(t));
    let log_like: &dyn BranchLikelihood = &wrapped;

    let start = sample(log_like, &[0.5, 1.0, 1.1]);
    let bracket = select_points(log_like, &start, 8).expect("valid sample");
    assert_eq!(classify_curve(&bracket), CurveShape::EnclosesMaximum);

    let mut ts: Vec<f64> = bracket.iter().map(|p| p.t).collect();
    let mut model = start_model();
    let opts = EstimateOptions::new(1e-4).expect("valid tolerance");
    let est = estimate_ml_t_with(log_like, &mut ts, &mut model, &opts).expect("valid input");
    assert!(est.success);
    assert_abs_diff_eq!(est.ml_t, reference().ml_t(), epsilon = 0.01);

    let mut points = sample(log_like, &ts);
    subset_points(&mut points, 3).expect("k <= n");
    let kept = &points[..3];
    assert_eq!(classify_curve(kept), CurveShape::EnclosesMaximum);

    let truth: Vec<f64> = kept.iter().map(|p| p.ll).collect();
    let fitted: Vec<f64> = kept.iter().map(|p| model.log_likelihood(p.t)).collect();
    let kl = kl_divergence(&truth, &fitted).expect("same length");
    assert!((0.0..0.01).contains(&kl), "kl = {kl}");
}

#[test]
// Purpose
// -------
// A weighted fit on exact model values recovers the generating curve.
fn weighted_fit_recovers_reference_curve() {
    let reference = reference();
    let points = sample(&|t: f64| reference.log_likelihood(t), &[0.1, 0.3, 0.6, 1.0, 1.5]);
    let weights = [1.0, 2.0, 2.0, 1.0, 0.5];
    let mut model = start_model();
    model
        .rescale(points[1].t, points[1].ll)
        .expect("same-sign values");

    let outcome =
        fit_bsm(&points, Some(&weights[..]), &mut model, &FitOptions::default()).expect("fit runs");

    assert!(outcome.theta_hat.iter().all(|x| x.is_finite()));
    assert_abs_diff_eq!(model.ml_t(), reference.ml_t(), epsilon = 1e-2);
}

#[test]
// Purpose
// -------
// The ML estimate and the fitted curvature seed a normalized model that
// `fit_auto` refines against the true likelihood.
//
// Given
// -----
// - `estimate_ml_t` from t = 0.1, 0.5, 1.0, 1.5; `t0` and `d2` taken from
//   the fitted BSM; site counts started at (1500, 500); range [1e-6, 10].
//
// Expect
// ------
// - The maximum stays at the estimate; the inflection point lands near
//   `ln 3 − 0.2` and the normalized curve tracks the reference at t = 1.
fn normalized_fit_from_estimated_maximum() {
    let reference = reference();
    let ll = |t: f64| reference.log_likelihood(t);
    let mut ts = [0.1, 0.5, 1.0, 1.5];
    let mut model = start_model();
    let est = estimate_ml_t(&ll, &mut ts, 1e-3, &mut model).expect("valid input");
    assert!(est.success);

    let mut normalized =
        Lcfit2::new(1500.0, 500.0, est.ml_t, model.second_derivative(est.ml_t)).expect("valid");
    let outcome = fit_auto(&ll, &mut normalized, 1e-6, 10.0, 0.0, &FitOptions::default())
        .expect("valid input");

    assert!(outcome.converged, "status: {}", outcome.status);
    assert_eq!(normalized.t0, est.ml_t);
    assert_abs_diff_eq!(normalized.infl_t(), 3.0f64.ln() - 0.2, epsilon = 0.02);
    let truth = reference.log_likelihood(1.0) - reference.log_likelihood(est.ml_t);
    assert_abs_diff_eq!(normalized.norm_lnl(1.0), truth, epsilon = 0.01 * truth.abs());
}
