//! loglik_optimizer::finite_diff — finite-difference gradient helpers.
//!
//! Used by the Argmin adapter whenever a [`LogLikelihood`](super::LogLikelihood)
//! does not provide an analytic gradient. The objective closure handed to
//! `finitediff` must return a bare `f64`, so evaluation errors are routed into
//! a shared `closure_err` cell (the closure returns `NaN`) and turned back into
//! real errors once differencing has finished.
//!
//! Central differences are tried first; forward differences are the fallback
//! whenever the central pass captured an error or failed validation.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{Grad, Theta, validation::validate_grad},
};
use argmin::core::Error;
use finitediff::FiniteDiff;
use std::cell::RefCell;

/// Finite-difference gradient of `func` at `theta`, central first.
///
/// # Errors
/// - Any error captured in `closure_err` during the forward fallback.
/// - Validation errors from [`validate_grad`] on the fallback gradient.
pub fn fd_gradient<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>,
) -> OptResult<Grad> {
    closure_err.replace(None);
    let central = theta.central_diff(func);
    if closure_err.borrow().is_none() && validate_grad(&central, theta.len()).is_ok() {
        return Ok(central);
    }
    run_fd_diff(theta, func, closure_err)
}

/// Forward-difference gradient with error capture and validation.
///
/// Clears `closure_err`, differences `func`, then reports the first captured
/// error (if any) before validating shape and finiteness.
///
/// # Errors
/// - `OptError` converted from the captured `argmin::core::Error`.
/// - `OptError::GradientDimMismatch` / `OptError::InvalidGradient`.
pub fn run_fd_diff<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>,
) -> OptResult<Grad> {
    closure_err.replace(None);
    let fd_grad = theta.forward_diff(func);
    if let Some(err) = closure_err.take() {
        return Err(err.into());
    }
    validate_grad(&fd_grad, theta.len())?;
    Ok(fd_grad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::errors::OptError;
    use approx::assert_abs_diff_eq;
    use argmin::core::ArgminError;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Central and forward gradients for a smooth objective.
    // - Propagation of errors captured inside the objective closure.
    // - Rejection of non-finite gradients.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify that `fd_gradient` approximates the gradient of a quadratic.
    //
    // Given
    // -----
    // - `f(θ) = θᵀθ` at `θ = (1, -2)`.
    //
    // Expect
    // ------
    // - Gradient close to `(2, -4)`.
    fn fd_gradient_matches_quadratic_gradient() {
        // Arrange
        let theta: Theta = array![1.0, -2.0];
        let closure_err: RefCell<Option<Error>> = RefCell::new(None);
        let f = |x: &Theta| x.dot(x);

        // Act
        let grad = fd_gradient(&theta, &f, &closure_err).expect("smooth objective");

        // Assert
        assert_abs_diff_eq!(grad[0], 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(grad[1], -4.0, epsilon = 1e-5);
    }

    #[test]
    // Purpose
    // -------
    // Ensure that an error written into `closure_err` surfaces as an
    // `OptError` instead of a NaN gradient.
    fn run_fd_diff_closure_error_is_propagated() {
        // Arrange
        let theta: Theta = array![1.0];
        let closure_err: RefCell<Option<Error>> = RefCell::new(None);
        let f = |_: &Theta| {
            let argmin_err = ArgminError::NotImplemented { text: "fd test".to_string() };
            closure_err.replace(Some(argmin_err.into()));
            f64::NAN
        };

        // Act
        let result = run_fd_diff(&theta, &f, &closure_err);

        // Assert
        match result {
            Err(OptError::NotImplemented { text }) => assert_eq!(text, "fd test"),
            other => panic!("expected NotImplemented, got {other:?}"),
        }
    }

    #[test]
    fn run_fd_diff_rejects_non_finite_gradient() {
        let theta: Theta = array![0.5];
        let closure_err: RefCell<Option<Error>> = RefCell::new(None);
        let f = |_: &Theta| f64::NAN;

        let result = run_fd_diff(&theta, &f, &closure_err);

        assert!(matches!(result, Err(OptError::InvalidGradient { .. })));
    }
}
