//! Adaptive selection of sample points bracketing the likelihood maximum.
//!
//! Starting from a few evaluated points, new branch lengths are proposed from
//! the current shape of the curve until the sample encloses a maximum or the
//! evaluation budget runs out:
//!
//! - increasing curve: grow past the largest `t` by `growth_factor`;
//! - decreasing curve: shrink below the smallest `t` by `shrink_factor`
//!   (bisecting the first interval when the smallest `t` is zero);
//! - anything else: move toward whichever end has the larger `ll`.
//!
//! Only a NaN from the callback ends the search early; `±∞` values are
//! ordered like any other.
use crate::curve::{
    classify::{CurveShape, classify_curve},
    errors::{CurveError, CurveResult},
    likelihood::BranchLikelihood,
    point::{Point, sort_by_t},
};

/// Step sizes used when extending a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectOptions {
    /// Multiplier applied to the largest `t` on an increasing curve.
    pub growth_factor: f64,
    /// Divisor applied to the smallest `t` on a decreasing curve.
    pub shrink_factor: f64,
}

impl SelectOptions {
    /// # Parameters
    /// - `growth_factor`: multiplier for the largest `t` on a rising curve.
    /// - `shrink_factor`: divisor for the smallest `t` on a falling curve.
    ///
    /// # Errors
    /// [`CurveError::InvalidOption`] unless both factors are finite and `> 1`.
    pub fn new(growth_factor: f64, shrink_factor: f64) -> CurveResult<Self> {
        for (name, value) in [("growth_factor", growth_factor), ("shrink_factor", shrink_factor)] {
            if !value.is_finite() || value <= 1.0 {
                return Err(CurveError::InvalidOption {
                    name,
                    value,
                    reason: "must be finite and greater than 1",
                });
            }
        }
        Ok(Self { growth_factor, shrink_factor })
    }
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self { growth_factor: 2.0, shrink_factor: 10.0 }
    }
}

/// [`select_points_with`] using [`SelectOptions::default`] (double on the
/// way out, divide by ten on the way in).
///
/// # Errors
/// As [`select_points_with`].
pub fn select_points<L: BranchLikelihood + ?Sized>(
    log_like: &L, starting: &[Point], max_points: usize,
) -> CurveResult<Vec<Point>> {
    select_points_with(log_like, starting, max_points, &SelectOptions::default())
}

/// Extend `starting` until it encloses a maximum or holds `max_points` points.
///
/// Each step classifies the sample, proposes one branch length from its
/// shape, evaluates it and re-sorts. A `−∞` log-likelihood is an ordinary
/// (smallest) value: it is kept and usually closes the bracket on its side.
///
/// # Parameters
/// - `log_like`: the likelihood callback; invoked once per added point.
/// - `starting`: at least two evaluated points in any order. Not modified.
/// - `max_points`: total size cap, counting the starting points.
/// - `opts`: growth and shrink factors.
///
/// # Returns
/// A new vector sorted by ascending `t`; its length is the number of points
/// actually held. A sample that already encloses a maximum is returned
/// sorted and otherwise unchanged. The search also stops early when the
/// callback returns NaN or a proposal would not produce a new branch length;
/// callers should re-classify the result.
///
/// # Errors
/// - [`CurveError::TooFewPoints`] for fewer than two starting points.
/// - [`CurveError::BudgetTooSmall`] if `max_points < starting.len()`.
/// - [`CurveError::InvalidBranchLength`] for a non-finite or negative `t`.
/// - [`CurveError::NanLogLikelihood`] for a NaN `ll`.
pub fn select_points_with<L: BranchLikelihood + ?Sized>(
    log_like: &L, starting: &[Point], max_points: usize, opts: &SelectOptions,
) -> CurveResult<Vec<Point>> {
    validate_sample(starting)?;
    if max_points < starting.len() {
        return Err(CurveError::BudgetTooSmall { max_points, actual: starting.len() });
    }

    let mut points = Vec::with_capacity(max_points);
    points.extend_from_slice(starting);
    sort_by_t(&mut points);

    let mut shape = classify_curve(&points);
    while shape != CurveShape::EnclosesMaximum && points.len() < max_points {
        let Some(t) = propose(&points, shape, opts) else {
            tracing::debug!(?shape, n = points.len(), "no new branch length to propose");
            break;
        };
        let ll = log_like.log_likelihood(t);
        if ll.is_nan() {
            tracing::warn!(t, "log-likelihood is NaN; stopping point selection");
            break;
        }
        points.push(Point::new(t, ll));
        sort_by_t(&mut points);
        shape = classify_curve(&points);
        tracing::debug!(t, ll, ?shape, n = points.len(), "selected point");
    }

    Ok(points)
}

/// Reject samples the selector and estimator cannot work with.
pub(crate) fn validate_sample(points: &[Point]) -> CurveResult<()> {
    if points.len() < 2 {
        return Err(CurveError::TooFewPoints { required: 2, actual: points.len() });
    }
    for (index, p) in points.iter().enumerate() {
        if !p.t.is_finite() || p.t < 0.0 {
            return Err(CurveError::InvalidBranchLength { index, t: p.t });
        }
        if p.ll.is_nan() {
            return Err(CurveError::NanLogLikelihood { index, t: p.t });
        }
    }
    Ok(())
}

/// Next branch length to evaluate for a sample sorted by `t`.
fn propose(points: &[Point], shape: CurveShape, opts: &SelectOptions) -> Option<f64> {
    let first = *points.first()?;
    let last = *points.last()?;
    let grow = match shape {
        CurveShape::MonotonicIncreasing => true,
        CurveShape::MonotonicDecreasing => false,
        CurveShape::EnclosesMaximum => return None,
        CurveShape::EnclosesMinimum | CurveShape::Unknown => last.ll >= first.ll,
    };

    let t = if grow {
        if last.t > 0.0 { last.t * opts.growth_factor } else { 1.0 }
    } else if first.t > 0.0 {
        first.t / opts.shrink_factor
    } else {
        let next = points.iter().map(|p| p.t).find(|&t| t > first.t)?;
        first.t + (next - first.t) / 2.0
    };

    let fresh = t.is_finite() && points.iter().all(|p| p.t != t);
    fresh.then_some(t)
}
