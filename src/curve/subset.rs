//! Bounded-size subset selection.
use crate::curve::{
    errors::{CurveError, CurveResult},
    point::{Point, argmax_ll, cmp_by_like, sort_by_t},
};

/// Reorder `points` so the first `k` are the ones worth keeping.
///
/// Priority order: the highest-`ll` point, then its immediate neighbours in
/// `t` (higher `ll` first), then every other point by descending `ll` with
/// ties kept in input order. The first `k` entries of that order are written
/// to the front and sorted by ascending `t`; the remaining `n − k` follow in
/// priority order. On a sample enclosing a maximum the retained prefix keeps
/// the bracket around it.
///
/// `k == n` leaves the slice untouched. The input is expected sorted by `t`
/// and free of NaN.
///
/// # Parameters
/// - `points`: the sample, reordered in place.
/// - `k`: number of points to keep at the front.
///
/// # Returns
/// `()`; read the kept points as `&points[..k]`.
///
/// # Errors
/// [`CurveError::SubsetTooLarge`] if `k > points.len()`.
pub fn subset_points(points: &mut [Point], k: usize) -> CurveResult<()> {
    let n = points.len();
    if k > n {
        return Err(CurveError::SubsetTooLarge { k, n });
    }
    if k == n {
        return Ok(());
    }

    sort_by_t(points);
    let Some(max_idx) = argmax_ll(points) else {
        return Ok(());
    };

    let mut neighbours: Vec<usize> = [max_idx.checked_sub(1), Some(max_idx + 1)]
        .into_iter()
        .flatten()
        .filter(|&i| i < n)
        .collect();
    neighbours.sort_by(|&a, &b| cmp_by_like(&points[a], &points[b]));

    let mut rest: Vec<usize> =
        (0..n).filter(|i| *i != max_idx && !neighbours.contains(i)).collect();
    rest.sort_by(|&a, &b| cmp_by_like(&points[a], &points[b]));

    let ordered: Vec<Point> = std::iter::once(max_idx)
        .chain(neighbours)
        .chain(rest)
        .map(|i| points[i])
        .collect();
    points.copy_from_slice(&ordered);
    sort_by_t(&mut points[..k]);
    Ok(())
}
