//! Precondition failures for the curve engine.
//!
//! Numerical outcomes (an ambiguous shape, a fit that did not converge) are
//! not errors; they come back as [`CurveShape::Unknown`](super::CurveShape)
//! or `success = false`. Only caller mistakes end up in [`CurveError`].
use crate::optimization::errors::OptError;
use thiserror::Error;

/// Result alias for curve and BSM operations.
pub type CurveResult<T> = Result<T, CurveError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    // ---- Samples ----
    /// Not enough points for the requested operation.
    #[error("Too few points: need at least {required}, got {actual}")]
    TooFewPoints { required: usize, actual: usize },

    /// Evaluation budget smaller than the starting sample.
    #[error("Point budget {max_points} is smaller than the {actual} starting points")]
    BudgetTooSmall { max_points: usize, actual: usize },

    /// Requested subset larger than the sample.
    #[error("Cannot keep {k} of {n} points")]
    SubsetTooLarge { k: usize, n: usize },

    /// Branch lengths must be finite and non-negative.
    #[error("Invalid branch length at index {index}: {t}, must be finite and >= 0")]
    InvalidBranchLength { index: usize, t: f64 },

    /// Log-likelihood samples must not be NaN.
    #[error("Log-likelihood at index {index} (t = {t}) is NaN")]
    NanLogLikelihood { index: usize, t: f64 },

    // ---- Divergence ----
    /// Two curves sampled at a different number of points.
    #[error("Length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    /// Divergence of empty curves is undefined.
    #[error("Empty input")]
    EmptyInput,

    /// Log-values must be NaN-free, below `+∞` and not all `−∞`.
    #[error("Unusable log-value at index {index}: {value}")]
    NonFiniteInput { index: usize, value: f64 },

    // ---- Configuration ----
    /// Convergence tolerance must be finite and positive.
    #[error("Invalid tolerance {tol}: {reason}")]
    InvalidTolerance { tol: f64, reason: &'static str },

    /// Option struct failed validation.
    #[error("Invalid option '{name}' = {value}: {reason}")]
    InvalidOption { name: &'static str, value: f64, reason: &'static str },

    // ---- Model ----
    /// BSM parameters violate `c, m, r > 0` or are non-finite.
    #[error("Invalid BSM parameter {name} = {value}: {reason}")]
    InvalidModel { name: &'static str, value: f64, reason: &'static str },

    /// Optimizer configuration rejected while setting up a fit.
    #[error(transparent)]
    Optimizer(#[from] OptError),
}
