//! curve — sampled log-likelihood curves.
//!
//! Purpose
//! -------
//! Everything that works on raw `(t, ll)` samples without a fitted model:
//! the [`Point`] type and its orderings, the [`BranchLikelihood`] callback
//! abstraction, shape classification, adaptive bracketing of the maximum and
//! bounded-size subset selection.
//!
//! Conventions
//! -----------
//! - Samples are plain slices of [`Point`], sorted by ascending `t` unless a
//!   function says otherwise. Sorting and subsetting work in place; the
//!   selector returns a fresh `Vec`.
//! - Caller mistakes are [`CurveError`]s. An unclassifiable sample is
//!   [`CurveShape::Unknown`], not an error.

pub mod classify;
pub mod errors;
pub mod likelihood;
pub mod point;
pub mod select;
pub mod subset;

pub use self::classify::{CurveShape, classify_curve};
pub use self::errors::{CurveError, CurveResult};
pub use self::likelihood::{BranchLikelihood, WithContext};
pub use self::point::{Point, sort_by_like, sort_by_t};
pub use self::select::{SelectOptions, select_points, select_points_with};
pub use self::subset::subset_points;
