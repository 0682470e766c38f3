//! lcfit — closed-form approximation of branch-length log-likelihood curves.
//!
//! Purpose
//! -------
//! Estimating a maximum-likelihood branch length normally takes many
//! evaluations of an expensive phylogenetic likelihood. This crate samples
//! that likelihood at a few branch lengths, fits the four-parameter binary
//! symmetric model (BSM) through the samples and reads the maximum off the
//! fitted curve in closed form.
//!
//! Key behaviors
//! -------------
//! - [`curve`]: sample points, shape classification, adaptive bracketing of
//!   the maximum and bounded-size subset selection.
//! - [`bsm`]: the BSM curve, its least-squares fit, the iterative ML
//!   estimator and the normalized two-parameter form ([`Lcfit2`]).
//! - [`divergence`]: KL divergence (bits) between two sampled curves.
//! - [`optimization`]: the L-BFGS maximization driver (argmin) and the
//!   numerically stable transforms the fit relies on.
//!
//! Invariants & assumptions
//! ------------------------
//! - Branch lengths are finite and non-negative; log-likelihoods may be
//!   `−∞` but never NaN once accepted.
//! - Everything runs synchronously on the caller's thread; the likelihood
//!   callback is only borrowed.
//!
//! Conventions
//! -----------
//! - Caller mistakes are [`CurveError`] / [`optimization::errors::OptError`];
//!   numerical trouble is a flag (`success`, `converged`) or
//!   [`CurveShape::Unknown`].
//! - Progress and abandoned searches are reported through `tracing` events;
//!   install a subscriber to see them.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each module; `tests/` drives the whole pipeline
//!   against the reference model BSM(1200, 300, 1, 0.2).

pub mod bsm;
pub mod curve;
pub mod divergence;
pub mod optimization;

pub use crate::{
    bsm::{
        Bsm, EstimateOptions, FitOptions, Lcfit2, MlEstimate, estimate_ml_t, fit_auto, fit_bsm,
        ml_t,
    },
    curve::{
        BranchLikelihood, CurveError, CurveResult, CurveShape, Point, classify_curve,
        select_points, sort_by_like, sort_by_t, subset_points,
    },
    divergence::kl_divergence,
};
