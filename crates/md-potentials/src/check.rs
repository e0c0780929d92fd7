//! Finite-difference consistency of pair functions.

use crate::pair::PairFunction;

/// Analytic terms next to their central-difference estimates at one `r`.
#[derive(Clone, Copy, Debug)]
pub struct DerivativeCheck {
    pub r: f64,
    pub s: f64,
    pub s_numeric: f64,
    pub d2u: f64,
    pub d2u_numeric: f64,
}

impl DerivativeCheck {
    /// Largest error, relative to `1 + |analytic|`.
    pub fn max_error(&self) -> f64 {
        let es = (self.s - self.s_numeric).abs() / (1.0 + self.s.abs());
        let ec = (self.d2u - self.d2u_numeric).abs() / (1.0 + self.d2u.abs());
        es.max(ec)
    }
}

/// Compare `s` with `-u'(r)/r` and `u''` with the second difference of `u`.
///
/// Step sizes scale with `r`; keep `r` at least `2e-4 * r` away from any
/// discontinuity such as a cutoff.
pub fn finite_difference_check<F: PairFunction>(func: &F, params: &[f64], r: f64) -> DerivativeCheck {
    let h1 = 1e-6 * r;
    let h2 = 1e-4 * r;
    let u = |x: f64| func.eval(x, params).u;

    let du = (u(r + h1) - u(r - h1)) / (2.0 * h1);
    let d2u_numeric = (u(r + h2) - 2.0 * u(r) + u(r - h2)) / (h2 * h2);
    let terms = func.eval(r, params);

    DerivativeCheck {
        r,
        s: terms.s,
        s_numeric: -du / r,
        d2u: terms.d2u,
        d2u_numeric,
    }
}
