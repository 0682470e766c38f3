//! Drive an L-BFGS solver to completion and summarize the final state.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        Grad, LogLikelihood, MLEOptions, OptimOutcome, Theta, adapter::ArgMinAdapter,
    },
};
#[cfg(feature = "obs_slog")]
use argmin::core::{CostFunction, Gradient};
use argmin::core::{Executor, IterState, Solver, State};
#[cfg(feature = "obs_slog")]
use argmin_math::ArgminL2Norm;

type LbfgsState = IterState<Theta, Grad, (), (), (), f64>;

/// Run `solver` on `problem` starting from `theta0`.
///
/// The iteration cap comes from `opts.tols.max_iter`. With the `obs_slog`
/// feature and `opts.verbose`, `ℓ(θ₀)` is printed and a terminal observer
/// follows every iteration. The outcome reports `ℓ(θ̂)`, i.e. the negated
/// best cost.
///
/// # Errors
/// - Solver and line-search failures, converted from `argmin::core::Error`.
/// - [`OptimOutcome::new`] rejections of the final state.
pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, opts: &MLEOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: LogLikelihood,
    S: Solver<ArgMinAdapter<'a, F>, LbfgsState> + Send + 'static,
{
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        print_start(&theta0, &problem)?;
    }

    let mut executor = Executor::new(problem, solver).configure(|state| state.param(theta0));
    if let Some(max_iter) = opts.tols.max_iter {
        executor = executor.configure(|state| state.max_iters(max_iter as u64));
    }
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        executor = executor.add_observer(
            argmin_observer_slog::SlogLogger::term_noblock(),
            argmin::core::observers::ObserverMode::Always,
        );
    }

    let state = executor.run()?.state().clone();
    let outcome = summarize(state)?;
    tracing::debug!(
        iterations = outcome.iterations,
        value = outcome.value,
        converged = outcome.converged,
        status = %outcome.status,
        "L-BFGS run finished"
    );
    Ok(outcome)
}

fn summarize(mut state: LbfgsState) -> OptResult<OptimOutcome> {
    let iterations = state.get_iter();
    let counts = state.get_func_counts().clone();
    let status = state.get_termination_status().clone();
    let value = -state.get_best_cost();
    let grad = state.take_gradient();
    OptimOutcome::new(state.take_best_param(), value, status, iterations, counts, grad)
}

#[cfg(feature = "obs_slog")]
fn print_start<F: LogLikelihood>(theta0: &Theta, problem: &ArgMinAdapter<'_, F>) -> OptResult<()> {
    let value = -problem.cost(theta0)?;
    match problem.gradient(theta0) {
        Ok(g) => eprintln!("start: ell = {value:.6}, |grad| = {:.6}", g.l2_norm()),
        Err(_) => eprintln!("start: ell = {value:.6}"),
    }
    Ok(())
}
