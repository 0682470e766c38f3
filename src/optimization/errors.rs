//! Error surface for the log-likelihood optimizer.
//!
//! Every failure raised while configuring or running an L-BFGS solve, or while
//! evaluating an objective built on top of it (e.g. the BSM least-squares
//! objective), is normalized into [`OptError`]. Backend `argmin` errors are
//! downcast into matching variants so callers never see raw backend types.
use argmin::core::{ArgminError, Error};
use thiserror::Error;

/// Crate-wide result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptError {
    // ---- Gradient ----
    /// Implies that FD should be used
    #[error("Gradient optimization not implemented")]
    GradientNotImplemented,

    /// Gradient dimensions do not match parameter dimensions.
    #[error("Gradient dimension mismatch: expected {expected}, found {found}")]
    GradientDimMismatch { expected: usize, found: usize },

    /// Gradient elements need to be finite
    #[error("Invalid gradient at index {index}: {value}: {reason}")]
    InvalidGradient { index: usize, value: f64, reason: &'static str },

    // ---- MLEOptions ----
    /// Gradient tolerance needs to be positive and finite.
    #[error("Invalid gradient tolerance {tol}: {reason}")]
    InvalidTolGrad { tol: f64, reason: &'static str },

    /// Cost change tolerance needs to be positive and finite.
    #[error("Invalid cost function change tolerance {tol}: {reason}")]
    InvalidTolCost { tol: f64, reason: &'static str },

    /// Maximum iterations needs to be positive.
    #[error("Invalid maximum iterations {max_iter}: {reason}")]
    InvalidMaxIter { max_iter: usize, reason: &'static str },

    /// At least one tolerance must be provided.
    #[error("No tolerances provided")]
    NoTolerancesProvided,

    /// Invalid line searcher name.
    #[error("Invalid line searcher '{name}': {reason}")]
    InvalidLineSearch { name: String, reason: &'static str },

    /// lbfgs_mem needs to be at least 1.
    #[error("Invalid L-BFGS memory {mem}: {reason}")]
    InvalidLBFGSMem { mem: usize, reason: &'static str },

    // ---- Cost function ----
    /// Cost function returned a non-finite value.
    #[error("Non-finite cost value: {value}")]
    NonFiniteCost { value: f64 },

    // ---- Optimizer outcome ----
    /// Estimated parameters must be finite.
    #[error("Invalid estimated parameter at index {index}: {value}: {reason}")]
    InvalidThetaHat { index: usize, value: f64, reason: &'static str },

    /// Theta hat is missing
    #[error("Missing estimated parameters (theta hat)")]
    MissingThetaHat,

    // ---- Curve fitting objective ----
    /// Unconstrained parameter vector has the wrong length.
    #[error("Theta length mismatch: expected {expected}, actual {actual}")]
    ThetaLengthMismatch { expected: usize, actual: usize },

    /// Unconstrained optimization input must have finite values.
    #[error("Invalid theta input at index {index}: {value}, must be finite")]
    InvalidThetaInput { index: usize, value: f64 },

    /// Too few observations to identify the model.
    #[error("Too few points for fitting: need at least {required}, got {actual}")]
    TooFewPoints { required: usize, actual: usize },

    /// Weight vector does not match the number of observations.
    #[error("Weight length mismatch: expected {expected}, actual {actual}")]
    WeightLengthMismatch { expected: usize, actual: usize },

    /// Weights must be finite and non-negative.
    #[error("Invalid weight at index {index}: {value}, must be finite and >= 0")]
    InvalidWeight { index: usize, value: f64 },

    /// Observations must be finite.
    #[error("Invalid observation at index {index}: (t = {t}, ll = {ll})")]
    InvalidObservation { index: usize, t: f64, ll: f64 },

    /// Curve model evaluated to a non-finite value.
    #[error("Model evaluation at t = {t} is not finite: {value}")]
    NonFiniteModel { t: f64, value: f64 },

    /// Starting model violates the parameter invariants.
    #[error("Invalid starting model: {reason}")]
    InvalidStartingModel { reason: &'static str },

    // ---- Argmin ---
    /// Wrapper for argmin::InvalidParameter
    #[error("Invalid parameter: {text}")]
    InvalidParameter { text: String },

    /// Wrapper for argmin::NotImplemented
    #[error("Not implemented: {text}")]
    NotImplemented { text: String },

    /// Wrapper for argmin::NotInitialized
    #[error("Not initialized: {text}")]
    NotInitialized { text: String },

    /// Wrapper for argmin::ConditionViolated
    #[error("Condition violated: {text}")]
    ConditionViolated { text: String },

    /// Wrapper for argmin::CheckPointNotFound
    #[error("Checkpoint not found: {text}")]
    CheckPointNotFound { text: String },

    /// Wrapper for argmin::PotentialBug
    #[error("Potential bug: {text}")]
    PotentialBug { text: String },

    /// Wrapper for argmin::ImpossibleError
    #[error("Impossible error: {text}")]
    ImpossibleError { text: String },

    /// Wrapper for other argmin::Error types
    #[error("Backend error: {text}")]
    BackendError { text: String },

    // ---- Fallback ----
    #[error("Unknown error")]
    UnknownError,
}

impl From<Error> for OptError {
    fn from(original_err: Error) -> Self {
        // Errors raised by our own objective travel through argmin boxed; unwrap them first.
        let original_err = match original_err.downcast::<OptError>() {
            Ok(opt_err) => return opt_err,
            Err(err) => err,
        };
        match original_err.downcast() {
            Ok(argmin_err) => match argmin_err {
                ArgminError::InvalidParameter { text } => OptError::InvalidParameter { text },
                ArgminError::NotImplemented { text } => OptError::NotImplemented { text },
                ArgminError::NotInitialized { text } => OptError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => OptError::ConditionViolated { text },
                ArgminError::CheckpointNotFound { text } => OptError::CheckPointNotFound { text },
                ArgminError::PotentialBug { text } => OptError::PotentialBug { text },
                ArgminError::ImpossibleError { text } => OptError::ImpossibleError { text },
                _ => OptError::UnknownError,
            },
            Err(err) => OptError::BackendError { text: err.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Conversion of boxed `argmin` errors into `OptError` variants.
    // - Round-tripping an `OptError` through `argmin::core::Error`.
    //
    // They intentionally DO NOT cover:
    // - Where these errors are raised (tested in the optimizer and fit modules).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Ensure that a boxed `ArgminError` maps onto its dedicated variant.
    //
    // Given
    // -----
    // - `ArgminError::ConditionViolated` wrapped in `argmin::core::Error`.
    //
    // Expect
    // ------
    // - `OptError::ConditionViolated` with the same text.
    fn from_argmin_error_maps_condition_violated() {
        // Arrange
        let err: Error = ArgminError::ConditionViolated { text: "boom".to_string() }.into();

        // Act
        let converted = OptError::from(err);

        // Assert
        assert_eq!(converted, OptError::ConditionViolated { text: "boom".to_string() });
    }

    #[test]
    // Purpose
    // -------
    // Verify that an `OptError` raised inside a cost function survives the
    // trip through argmin's boxed error type unchanged.
    //
    // Given
    // -----
    // - `OptError::NonFiniteCost` converted into `argmin::core::Error`.
    //
    // Expect
    // ------
    // - Converting back yields the original variant and payload.
    fn from_argmin_error_recovers_wrapped_opt_error() {
        // Arrange
        let err: Error = OptError::NonFiniteCost { value: f64::INFINITY }.into();

        // Act
        let converted = OptError::from(err);

        // Assert
        assert_eq!(converted, OptError::NonFiniteCost { value: f64::INFINITY });
    }

    #[test]
    // Purpose
    // -------
    // Ensure that foreign errors fall through to `BackendError`.
    //
    // Given
    // -----
    // - A plain `std::io::Error` boxed as an `argmin::core::Error`.
    //
    // Expect
    // ------
    // - `OptError::BackendError` carrying the display text.
    fn from_argmin_error_wraps_foreign_errors_as_backend() {
        // Arrange
        let io = std::io::Error::other("disk on fire");
        let err: Error = io.into();

        // Act
        let converted = OptError::from(err);

        // Assert
        match converted {
            OptError::BackendError { text } => assert!(text.contains("disk on fire")),
            other => panic!("expected BackendError, got {other:?}"),
        }
    }
}
