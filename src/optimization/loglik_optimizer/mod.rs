//! loglik_optimizer — argmin-powered log-likelihood maximizer.
//!
//! Purpose
//! -------
//! Provide a small optimization layer for **maximizing log-likelihoods**
//! `ℓ(θ)`. Callers implement one trait, [`LogLikelihood`], and invoke
//! [`maximize`] to run L-BFGS with a configurable line search, tolerances and
//! a finite-difference fallback. The BSM least-squares fit
//! ([`crate::bsm::fit`]) is the main consumer.
//!
//! Key behaviors
//! -------------
//! - [`adapter::ArgMinAdapter`] turns `ℓ(θ)` into the Argmin cost
//!   `c(θ) = -ℓ(θ)` and flips analytic gradients accordingly.
//! - [`maximize`] validates the initial guess with [`LogLikelihood::check`],
//!   picks a solver from [`builders`] based on [`traits::LineSearcher`], runs
//!   it via [`run::run_lbfgs`] and normalizes the result into an
//!   [`OptimOutcome`].
//! - [`finite_diff`] provides the gradient when a model has no analytic one,
//!   with error capture and post-hoc validation.
//! - [`Tolerances`] and [`MLEOptions`] are validated on construction;
//!   [`validation`] holds the shared checks.
//!
//! Invariants & assumptions
//! ------------------------
//! - User code implements `ℓ(θ)` and `∇ℓ(θ)`, never the cost.
//! - [`LogLikelihood::value`] and [`LogLikelihood::grad`] report invalid
//!   inputs as [`OptError`](crate::optimization::errors::OptError) values,
//!   not panics.
//! - Parameters live in an unconstrained space as [`Theta`]; mapping to
//!   constrained model parameters happens in the model layer.
//!
//! Testing notes
//! -------------
//! - Submodule unit tests cover sign conventions ([`adapter`]), solver
//!   wiring ([`builders`]), finite differences and validation, option
//!   invariants ([`traits`]) and toy maximizations ([`api`]).
//! - The BSM fit tests and the integration tests exercise [`maximize`] on
//!   real least-squares problems.

pub mod adapter;
pub mod api;
pub mod builders;
pub mod finite_diff;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::maximize;
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Theta};

pub mod prelude {
    pub use super::api::maximize;
    pub use super::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
