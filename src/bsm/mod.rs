//! bsm — the binary symmetric model and what is built on it.
//!
//! Purpose
//! -------
//! Approximate an expensive branch-length log-likelihood by the four-parameter
//! BSM curve, fit that curve to sampled points and use its closed-form
//! maximum to locate the ML branch length with few likelihood evaluations.
//!
//! Key behaviors
//! -------------
//! - [`Bsm`] evaluates the curve, its partials and its analytic maximum.
//! - [`fit_bsm`] runs a weighted least-squares fit through the crate's L-BFGS
//!   driver ([`crate::optimization::loglik_optimizer::maximize`]).
//! - [`estimate_ml_t`] alternates fitting and sampling at the predicted
//!   maximum until the prediction settles.
//! - [`lcfit2`] pins the curve to a known maximum and curvature and fits
//!   only the site counts ([`fit_lcfit2`], [`fit_auto`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - Valid models have `c, m, r > 0` and finite `b`; fits search an
//!   unconstrained reparametrization so this holds for every fitted model.
//! - Branch lengths are finite and non-negative.
//!
//! Testing notes
//! -------------
//! - The reference model BSM(1200, 300, 1, 0.2) with its maximum at
//!   `ln(5/3) − 0.2` anchors the unit tests of every submodule.

pub mod estimate;
pub mod fit;
pub mod lcfit2;
pub mod model;

pub use self::estimate::{
    EstimateOptions, MIN_BRANCH_LENGTH, MlEstimate, estimate_ml_t, estimate_ml_t_with,
};
pub use self::fit::{BsmLeastSquares, FitData, FitOptions, fit_bsm};
pub use self::lcfit2::{
    Lcfit2, Lcfit2Data, Lcfit2LeastSquares, Lcfit2Partials, compute_weights, fit_auto,
    fit_lcfit2, three_points,
};
pub use self::model::{Bsm, BsmPartials, ml_t};
