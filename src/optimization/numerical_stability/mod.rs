//! numerical_stability — guarded scalar transforms.
//!
//! Purpose
//! -------
//! Keep the small set of overflow-prone transforms in one place so the BSM
//! fit and the divergence metric can assume well-conditioned `f64`
//! arithmetic.
//!
//! Key behaviors
//! -------------
//! - `safe_softplus` / `safe_softplus_inv` map between ℝ and (0, ∞); the BSM
//!   fit uses them for the offset `b` so that `t + b > 0` on the sample.
//! - `safe_logistic` is the softplus derivative, used in the analytic
//!   gradient chain rule.
//! - `log_sum_exp` normalizes unnormalized log-probabilities for the KL
//!   divergence.
//!
//! Conventions
//! -----------
//! - Pure functions on `f64`; no logging, I/O or global state.
//! - Inputs are assumed finite unless documented otherwise; validation
//!   happens in the curve and optimizer layers.

pub mod transformations;

pub use self::transformations::{log_sum_exp, safe_logistic, safe_softplus, safe_softplus_inv};

pub mod prelude {
    pub use super::transformations::{
        log_sum_exp, safe_logistic, safe_softplus, safe_softplus_inv,
    };
}
