//! The binary symmetric model (BSM) curve.
//!
//! ```text
//! f(t) = c·ln((1 + e)/2) + m·ln(2·(1 − e)),    e = exp(−r·(t + b))
//! ```
//!
//! `c` counts sites that agree across the branch, `m` sites that disagree, `r`
//! is the rate and `b` an offset in branch length. The curve rises from
//! `t = −b` to a single maximum at [`Bsm::ml_t`] when `c > m` and increases
//! forever otherwise.
use crate::curve::errors::{CurveError, CurveResult};

/// Four-parameter BSM: `c > 0`, `m > 0`, `r > 0`, `b` real.
///
/// Fields are public so fitted values can be read and updated in place; use
/// [`Bsm::new`] or [`Bsm::validate`] when the values come from outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bsm {
    pub c: f64,
    pub m: f64,
    pub r: f64,
    pub b: f64,
}

/// Partial derivatives of `f(t)` with respect to `(c, m, r, b)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BsmPartials {
    pub c: f64,
    pub m: f64,
    pub r: f64,
    pub b: f64,
}

impl Bsm {
    /// Build a validated model.
    ///
    /// # Parameters
    /// - `c`: weight of the agreeing sites, `> 0`.
    /// - `m`: weight of the disagreeing sites, `> 0`.
    /// - `r`: rate, `> 0`.
    /// - `b`: branch-length offset, any finite value.
    ///
    /// # Errors
    /// [`CurveError::InvalidModel`] unless `c`, `m`, `r` are finite and
    /// positive and `b` is finite.
    pub fn new(c: f64, m: f64, r: f64, b: f64) -> CurveResult<Self> {
        let model = Self { c, m, r, b };
        model.validate()?;
        Ok(model)
    }

    /// Check the parameter invariants.
    ///
    /// # Errors
    /// [`CurveError::InvalidModel`] naming the first offending parameter.
    pub fn validate(&self) -> CurveResult<()> {
        for (name, value) in [("c", self.c), ("m", self.m), ("r", self.r)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CurveError::InvalidModel {
                    name,
                    value,
                    reason: "must be finite and positive",
                });
            }
        }
        if !self.b.is_finite() {
            return Err(CurveError::InvalidModel { name: "b", value: self.b, reason: "must be finite" });
        }
        Ok(())
    }

    /// `(e, 1 − e)` with `e = exp(−r·(t + b))`; the complement via `expm1`
    /// keeps precision when `e` is close to one.
    fn expterms(&self, t: f64) -> (f64, f64) {
        let x = -self.r * (t + self.b);
        (x.exp(), -x.exp_m1())
    }

    /// Evaluate `f(t)`.
    ///
    /// Only meaningful for `t > −b`; closer to `−b` the curve tends to `−∞`,
    /// beyond it the value is NaN.
    pub fn log_likelihood(&self, t: f64) -> f64 {
        let (e, one_minus_e) = self.expterms(t);
        self.c * ((1.0 + e) / 2.0).ln() + self.m * (one_minus_e * 2.0).ln()
    }

    /// Branch length maximizing `f`, from `f'(t) = 0`:
    /// `t* = ln((c + m)/(c − m))/r − b`.
    ///
    /// `+∞` when `c ≤ m`, where the curve never turns down. May be negative
    /// when the maximum lies left of zero.
    pub fn ml_t(&self) -> f64 {
        if self.c <= self.m {
            return f64::INFINITY;
        }
        ((self.c + self.m) / (self.c - self.m)).ln() / self.r - self.b
    }

    /// Factor by which `c` and `m` must be scaled for the curve to pass
    /// through `(t, ll)`.
    pub fn scale_factor(&self, t: f64, ll: f64) -> f64 {
        ll / self.log_likelihood(t)
    }

    /// Scale `c` and `m` so that `f(t) = ll`, keeping `r` and `b`.
    ///
    /// # Errors
    /// [`CurveError::InvalidModel`] when the factor is not finite and positive
    /// (e.g. `f(t)` and `ll` differ in sign); the model is left unchanged.
    pub fn rescale(&mut self, t: f64, ll: f64) -> CurveResult<()> {
        let scale = self.scale_factor(t, ll);
        if !scale.is_finite() || scale <= 0.0 {
            return Err(CurveError::InvalidModel {
                name: "scale",
                value: scale,
                reason: "rescaling needs a finite positive factor",
            });
        }
        self.c *= scale;
        self.m *= scale;
        Ok(())
    }

    /// Gradient of `f(t)` with respect to the four parameters.
    pub fn partials(&self, t: f64) -> BsmPartials {
        let (e, one_minus_e) = self.expterms(t);
        let df_de = self.c / (1.0 + e) - self.m / one_minus_e;
        BsmPartials {
            c: ((1.0 + e) / 2.0).ln(),
            m: (one_minus_e * 2.0).ln(),
            r: df_de * (-(t + self.b) * e),
            b: df_de * (-self.r * e),
        }
    }

    /// Slope `f'(t)`.
    ///
    /// Equal to the `b` partial since `t` and `b` enter as `t + b`. Zero at
    /// [`Bsm::ml_t`], positive left of it.
    pub fn derivative(&self, t: f64) -> f64 {
        self.partials(t).b
    }

    /// Curvature `f''(t) = r²·e·(c/(1 + e)² − m/(1 − e)²)`.
    ///
    /// Negative at [`Bsm::ml_t`] whenever `c > m`; this is the `d2` that
    /// pins a normalized model to its maximum.
    pub fn second_derivative(&self, t: f64) -> f64 {
        let (e, one_minus_e) = self.expterms(t);
        self.r * self.r * e * (self.c / (1.0 + e).powi(2) - self.m / one_minus_e.powi(2))
    }
}

/// Analytic ML branch length of `model`.
///
/// # Parameters
/// - `model`: a BSM; not validated here.
///
/// # Returns
/// `ln((c + m)/(c − m))/r − b`, which may be negative; `+∞` when `c ≤ m`.
/// Same value as [`Bsm::ml_t`].
pub fn ml_t(model: &Bsm) -> f64 {
    model.ml_t()
}

impl Default for Bsm {
    /// Generic starting point for fits: `(1500, 1000, 1, 0.5)`.
    fn default() -> Self {
        Self { c: 1500.0, m: 1000.0, r: 1.0, b: 0.5 }
    }
}
