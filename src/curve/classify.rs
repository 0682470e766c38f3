//! Shape classification of a sampled log-likelihood curve.
use crate::curve::point::Point;

/// Coarse shape of a sampled curve, read off its extrema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveShape {
    Unknown,
    MonotonicIncreasing,
    MonotonicDecreasing,
    EnclosesMinimum,
    EnclosesMaximum,
}

impl CurveShape {
    /// `true` for the two monotonic variants.
    pub fn is_monotonic(self) -> bool {
        matches!(self, CurveShape::MonotonicIncreasing | CurveShape::MonotonicDecreasing)
    }
}

/// Classify points sorted by ascending `t`.
///
/// Locates the first maximum and the first minimum of `ll` and compares their
/// positions against the two ends of the sample:
///
/// | min        | max        | shape                 |
/// |------------|------------|-----------------------|
/// | first      | last       | `MonotonicIncreasing` |
/// | last       | first      | `MonotonicDecreasing` |
/// | interior   | an end     | `EnclosesMinimum`     |
/// | an end     | interior   | `EnclosesMaximum`     |
///
/// Anything else (both extrema interior, or all values equal) is `Unknown`,
/// as is a sample with fewer than three points or any NaN. Comparisons are
/// exact: a curve flat to a few ulps still classifies by its true ordering.
///
/// Direction changes away from the extrema are not counted: `0, 5, 1, 3`
/// has its minimum at an end and its maximum inside, so it encloses a
/// maximum.
///
/// # Parameters
/// - `points`: sample sorted by ascending `t`; the order is not checked.
///
/// # Returns
/// The [`CurveShape`]; never fails.
pub fn classify_curve(points: &[Point]) -> CurveShape {
    let n = points.len();
    if n < 3 || points.iter().any(|p| p.ll.is_nan()) {
        return CurveShape::Unknown;
    }

    let (mut min_idx, mut max_idx) = (0, 0);
    for (i, p) in points.iter().enumerate().skip(1) {
        if p.ll < points[min_idx].ll {
            min_idx = i;
        }
        if p.ll > points[max_idx].ll {
            max_idx = i;
        }
    }

    let end = n - 1;
    let is_end = |i: usize| i == 0 || i == end;
    if min_idx == 0 && max_idx == end {
        CurveShape::MonotonicIncreasing
    } else if max_idx == 0 && min_idx == end {
        CurveShape::MonotonicDecreasing
    } else if !is_end(min_idx) && is_end(max_idx) {
        CurveShape::EnclosesMinimum
    } else if !is_end(max_idx) && is_end(min_idx) {
        CurveShape::EnclosesMaximum
    } else {
        CurveShape::Unknown
    }
}
