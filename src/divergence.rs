//! Kullback–Leibler divergence between two sampled log-likelihood curves.
//!
//! Both inputs are read as unnormalized log-probabilities over the same
//! branch lengths, normalized with a log-sum-exp softmax and compared in
//! bits. Typical use: how far a fitted BSM's values at the sample points are
//! from freshly evaluated likelihoods.
use crate::{
    curve::errors::{CurveError, CurveResult},
    optimization::numerical_stability::transformations::log_sum_exp,
};
use std::f64::consts::LN_2;

/// `D(p ‖ q) = Σ pᵢ (log₂ pᵢ − log₂ qᵢ)` after softmax-normalizing both
/// vectors.
///
/// Entries of `−∞` are zero-probability outcomes. Terms with `pᵢ = 0`
/// contribute nothing; `qᵢ = 0` where `pᵢ > 0` gives `+∞`. Identical inputs
/// return exactly `0.0`.
///
/// # Parameters
/// - `p_log`: reference curve, unnormalized log-probabilities.
/// - `q_log`: approximating curve at the same branch lengths.
///
/// # Returns
/// Divergence in bits, `≥ 0`, possibly `+∞`.
///
/// # Errors
/// - [`CurveError::EmptyInput`] when either slice is empty.
/// - [`CurveError::LengthMismatch`] when the lengths differ.
/// - [`CurveError::NonFiniteInput`] for NaN or `+∞`, or a vector that is
///   entirely `−∞`.
pub fn kl_divergence(p_log: &[f64], q_log: &[f64]) -> CurveResult<f64> {
    if p_log.is_empty() || q_log.is_empty() {
        return Err(CurveError::EmptyInput);
    }
    if p_log.len() != q_log.len() {
        return Err(CurveError::LengthMismatch { left: p_log.len(), right: q_log.len() });
    }
    let p_norm = log_sum_exp(checked(p_log)?);
    let q_norm = log_sum_exp(checked(q_log)?);
    if p_log == q_log {
        return Ok(0.0);
    }

    let nats: f64 = p_log
        .iter()
        .zip(q_log)
        .map(|(&lp, &lq)| {
            let lp = lp - p_norm;
            let p = lp.exp();
            if p == 0.0 { 0.0 } else { p * (lp - (lq - q_norm)) }
        })
        .sum();
    Ok(nats / LN_2)
}

fn checked(xs: &[f64]) -> CurveResult<&[f64]> {
    if let Some(index) = xs.iter().position(|x| x.is_nan() || *x == f64::INFINITY) {
        return Err(CurveError::NonFiniteInput { index, value: xs[index] });
    }
    if xs.iter().all(|&x| x == f64::NEG_INFINITY) {
        return Err(CurveError::NonFiniteInput { index: 0, value: f64::NEG_INFINITY });
    }
    Ok(xs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    // Purpose
    // -------
    // Pin the divergence against independently computed values.
    //
    // Given
    // -----
    // - Pairs of four-point log-likelihood vectors, including values in the
    //   thousands and a vector containing an exact zero.
    //
    // Expect
    // ------
    // - Agreement to five decimals.
    fn matches_reference_values() {
        let cases: [([f64; 4], [f64; 4], f64); 5] = [
            (
                [-8.23386308827751, -7.89628369560472, -7.46488078438082, -7.0040373619371],
                [-8.50881870037115, -7.01490663616462, -6.96466932063068, -7.32206267643069],
                0.1806762,
            ),
            (
                [-7.37119800784334, -9.691829378901, -8.48775781961084, -8.64186818920151],
                [-7.2831430106067, -7.86459794233191, -7.16932601238058, -7.60551459493553],
                0.286367,
            ),
            (
                [-7.2395724556565, -6.91588211762945, -7.87524673207007, -7.1594973712871],
                [-6.97527933923003, -8.45825223896343, -7.33596648002283, -8.98276588408589],
                0.709192,
            ),
            (
                [-7430.16, -7422.50, -7467.66, -7532.40],
                [-7503.59, -7514.70, -7533.54, -7551.58],
                16.01493,
            ),
            (
                [-46.600645, 0.0, -29.433837, -181.026445],
                [-0.001183, -6.740157, -17.959673, -55.618297],
                9.723990,
            ),
        ];
        for (p, q, expected) in cases {
            let kl = kl_divergence(&p, &q).expect("valid input");
            assert_abs_diff_eq!(kl, expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn identical_inputs_are_exactly_zero() {
        let x = [-8.22743576627117, -7.85937765563544, -11.2209775173986, -7.86907487030067];
        assert_eq!(kl_divergence(&x, &x), Ok(0.0));
    }

    #[test]
    fn invariant_under_constant_shift() {
        let p = [-1.0, -2.0, -0.5];
        let q = [-0.3, -1.1, -2.2];
        let shifted: Vec<f64> = q.iter().map(|x| x - 1000.0).collect();
        let a = kl_divergence(&p, &q).expect("valid input");
        let b = kl_divergence(&p, &shifted).expect("valid input");
        assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        assert!(a > 0.0);
    }

    #[test]
    fn zero_probability_entries() {
        let p = [f64::NEG_INFINITY, -1.0, -2.0];
        let q = [-1.0, -1.0, -2.0];
        assert!(kl_divergence(&p, &q).expect("valid input").is_finite());
        assert_eq!(kl_divergence(&q, &p), Ok(f64::INFINITY));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert_eq!(kl_divergence(&[], &[]), Err(CurveError::EmptyInput));
        assert_eq!(
            kl_divergence(&[-1.0, -2.0], &[-1.0]),
            Err(CurveError::LengthMismatch { left: 2, right: 1 })
        );
        assert!(matches!(
            kl_divergence(&[-1.0, f64::NAN], &[-1.0, -2.0]),
            Err(CurveError::NonFiniteInput { index: 1, .. })
        ));
        assert!(matches!(
            kl_divergence(&[-1.0, -2.0], &[f64::NEG_INFINITY, f64::NEG_INFINITY]),
            Err(CurveError::NonFiniteInput { index: 0, .. })
        ));
    }
}
