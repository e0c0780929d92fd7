use crate::MdError;

/// Floating point type used throughout system
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

impl Tolerances {
    /// Looser tolerance for comparisons against finite differences.
    pub fn finite_difference() -> Self {
        Self {
            abs: 1e-6,
            rel: 1e-4,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, MdError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(MdError::NonFinite { what, value: v })
    }
}

/// Like [`ensure_finite`] but also rejects zero and negative values.
pub fn ensure_positive(v: Real, what: &'static str) -> Result<Real, MdError> {
    let v = ensure_finite(v, what)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(MdError::InvalidArg { what })
    }
}

/// Squared Euclidean norm of a short vector.
#[inline]
pub fn norm_sq(v: &[Real]) -> Real {
    v.iter().map(|x| x * x).sum()
}
