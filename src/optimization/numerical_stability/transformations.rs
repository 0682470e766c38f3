//! Numerical stability utilities.
//!
//! Guarded versions of nonlinear transforms that overflow or lose precision in
//! naïve form. The softplus pair uses an explicit cutoff (`x > 20.0`) to stay
//! in a well-conditioned `f64` regime.
//!
//! # Provided items
//! - [`safe_softplus`]: `ln(1 + exp(x))`, mapping ℝ → (0, ∞).
//! - [`safe_softplus_inv`]: inverse of softplus on (0, ∞).
//! - [`safe_logistic`]: `1 / (1 + exp(-x))`, the derivative of softplus.
//! - [`log_sum_exp`]: `ln Σ exp(xᵢ)` with a max shift.

/// Above this argument softplus and its inverse are the identity in `f64`.
const SOFTPLUS_CUTOFF: f64 = 20.0;

/// Numerically stable softplus: `softplus(x) = ln(1 + exp(x))`.
///
/// - For large `x`, `softplus(x) ≈ x`.
/// - Otherwise `ln1p(exp(x))`, which keeps precision for very negative `x`.
pub fn safe_softplus(x: f64) -> f64 {
    if x > SOFTPLUS_CUTOFF { x } else { x.exp().ln_1p() }
}

/// Stable inverse of softplus on `(0, ∞)`: `t = ln(exp(x) - 1)`.
///
/// - For large `x`, `t ≈ x`.
/// - Otherwise `ln(expm1(x))`.
///
/// `x` must be finite and `> 0`.
pub fn safe_softplus_inv(x: f64) -> f64 {
    if x > SOFTPLUS_CUTOFF { x } else { x.exp_m1().ln() }
}

/// Numerically stable logistic function `σ(x) = 1 / (1 + exp(-x))`.
///
/// Evaluates `exp` only on non-positive arguments so neither tail overflows.
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `ln Σ exp(xᵢ)` computed as `m + ln Σ exp(xᵢ − m)` with `m = max xᵢ`.
///
/// Returns `-∞` for an empty slice or when every entry is `-∞`.
pub fn log_sum_exp(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = xs.iter().map(|&x| (x - max).exp()).sum();
    max + sum.ln()
}
