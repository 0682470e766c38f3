//! optimization — L-BFGS log-likelihood maximizer, stable transforms, and the
//! optimizer error surface.
//!
//! Purpose
//! -------
//! Provide the numerical backbone of the BSM fit: callers implement a
//! log-likelihood, pick tolerances, and get fitted parameters plus
//! diagnostics without touching Argmin directly.
//!
//! Key behaviors
//! -------------
//! - `loglik_optimizer`: maximize `ℓ(θ)` with L-BFGS (More–Thuente or
//!   Hager–Zhang line search), analytic or finite-difference gradients.
//! - `numerical_stability`: softplus, logistic and log-sum-exp helpers.
//! - `errors`: every configuration, numerical and backend failure as one
//!   [`errors::OptError`] with the alias `OptResult<T>`.
//!
//! Conventions
//! -----------
//! - Solvers maximize `ℓ(θ)` by minimizing `c(θ) = -ℓ(θ)`; outcomes are
//!   reported in terms of `ℓ`.
//! - Parameters and gradients use the `ndarray` aliases `Theta` and `Grad`.
//! - Fallible entry points return `OptResult<T>`; raw Argmin errors never
//!   leak out.
//! - The runner emits one `tracing` debug event per solve; installing a
//!   subscriber is left to the application.

pub mod errors;
pub mod loglik_optimizer;
pub mod numerical_stability;

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
