//! The log-likelihood callback abstraction.
//!
//! The engine only ever asks for `ℓ(t)` at a branch length. Any closure
//! `Fn(f64) -> f64` qualifies; [`WithContext`] pairs a function with caller
//! data the engine never looks at.

/// Expensive log-likelihood of a single branch length.
///
/// Implementations may return `-∞` for impossible values; NaN stops the
/// adaptive search.
pub trait BranchLikelihood {
    fn log_likelihood(&self, t: f64) -> f64;
}

impl<F> BranchLikelihood for F
where
    F: Fn(f64) -> f64,
{
    fn log_likelihood(&self, t: f64) -> f64 {
        self(t)
    }
}

/// A log-likelihood function together with an opaque context it is called
/// with.
#[derive(Debug, Clone)]
pub struct WithContext<C, F> {
    pub context: C,
    pub func: F,
}

impl<C, F> WithContext<C, F>
where
    F: Fn(f64, &C) -> f64,
{
    pub fn new(context: C, func: F) -> Self {
        Self { context, func }
    }
}

impl<C, F> BranchLikelihood for WithContext<C, F>
where
    F: Fn(f64, &C) -> f64,
{
    fn log_likelihood(&self, t: f64) -> f64 {
        (self.func)(t, &self.context)
    }
}
