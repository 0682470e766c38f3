//! High-level entry point for maximizing a [`LogLikelihood`].
//!
//! Selects an L-BFGS solver for the configured line search, wraps the model in
//! an [`ArgMinAdapter`] (which *minimizes* `-ℓ(θ)`), and delegates the run to
//! [`run_lbfgs`].
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        OptimOutcome, Theta,
        adapter::ArgMinAdapter,
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        run::run_lbfgs,
        traits::{LineSearcher, LogLikelihood, MLEOptions},
    },
};

/// Maximize a log-likelihood `ℓ(θ)` using L-BFGS with the chosen line search.
///
/// # Behavior
/// - Validates the initial guess via `f.check(theta0, data)`.
/// - Builds an L-BFGS solver with **Hager–Zhang** or **More–Thuente** line
///   search based on `opts.line_searcher`.
/// - Runs it through [`run_lbfgs`] and returns an [`OptimOutcome`] whose
///   `value` is `ℓ(θ̂)`, not the cost.
///
/// # Errors
/// - Any error from `f.check`.
/// - Builder errors for rejected tolerances.
/// - Runtime errors from the solver (line-search failures, non-finite cost).
///
/// # Example
/// ```no_run
/// use lcfit::optimization::errors::OptResult;
/// use lcfit::optimization::loglik_optimizer::{
///     LogLikelihood, MLEOptions, Theta, maximize,
/// };
/// use ndarray::array;
///
/// struct Paraboloid;
///
/// impl LogLikelihood for Paraboloid {
///     type Data = ();
///     fn value(&self, theta: &Theta, _: &()) -> OptResult<f64> {
///         Ok(-theta.dot(theta))
///     }
///     fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
///         Ok(())
///     }
/// }
///
/// let out = maximize(&Paraboloid, array![0.1, -0.2, 0.3], &(), &MLEOptions::default())?;
/// println!("θ̂ = {:?}", out.theta_hat);
/// # Ok::<(), lcfit::optimization::errors::OptError>(())
/// ```
pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
    }
}
