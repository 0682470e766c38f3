//! Sample points and in-place orderings.
use std::cmp::Ordering;

/// One observation of the log-likelihood: branch length `t` and value `ll`.
///
/// Plain value type. Nothing is validated here; the operations that consume
/// samples reject negative or non-finite `t` and NaN `ll` themselves. `ll`
/// may be `−∞` for a branch length the likelihood rules out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub t: f64,
    pub ll: f64,
}

impl Point {
    /// Pair a branch length with its log-likelihood.
    ///
    /// # Parameters
    /// - `t`: branch length, expected finite and `≥ 0`.
    /// - `ll`: log-likelihood at `t`; `−∞` allowed, NaN rejected downstream.
    pub fn new(t: f64, ll: f64) -> Self {
        Self { t, ll }
    }
}

impl From<(f64, f64)> for Point {
    fn from((t, ll): (f64, f64)) -> Self {
        Self { t, ll }
    }
}

/// Descending log-likelihood order.
///
/// Uses `total_cmp`, so the order is total: `−∞` sorts last and NaN
/// (positive) first.
pub fn cmp_by_like(a: &Point, b: &Point) -> Ordering {
    b.ll.total_cmp(&a.ll)
}

/// Ascending branch-length order.
pub fn cmp_by_t(a: &Point, b: &Point) -> Ordering {
    a.t.total_cmp(&b.t)
}

/// Sort points by descending `ll`, in place. Stable; ties keep input order.
pub fn sort_by_like(points: &mut [Point]) {
    points.sort_by(cmp_by_like);
}

/// Sort points by ascending `t`, in place. Stable; ties keep input order.
pub fn sort_by_t(points: &mut [Point]) {
    points.sort_by(cmp_by_t);
}

/// Index of the first point with the largest `ll`.
///
/// `None` for an empty slice. NaN values are never selected unless every
/// value is NaN.
pub(crate) fn argmax_ll(points: &[Point]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, p) in points.iter().enumerate() {
        match best {
            None => best = Some(i),
            Some(j) if p.ll > points[j].ll || (points[j].ll.is_nan() && !p.ll.is_nan()) => {
                best = Some(i)
            }
            _ => {}
        }
    }
    best
}
