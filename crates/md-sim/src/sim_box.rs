//! Orthorhombic periodic simulation box.

use crate::error::{SimError, SimResult};

/// Largest supported spatial dimension.
pub const MAX_DIM: usize = 4;

/// Periodic box centered on the origin; wrapped coordinates lie in
/// `[-L/2, L/2)` along every axis.
#[derive(Clone, Debug, PartialEq)]
pub struct SimBox {
    lengths: Vec<f64>,
}

impl SimBox {
    pub fn new(lengths: Vec<f64>) -> SimResult<Self> {
        if lengths.is_empty() || lengths.len() > MAX_DIM {
            return Err(SimError::config(format!(
                "box dimension must be between 1 and {MAX_DIM}, got {}",
                lengths.len()
            )));
        }
        if lengths.iter().any(|l| !l.is_finite() || *l <= 0.0) {
            return Err(SimError::InvalidArg {
                what: "box lengths must be positive and finite",
            });
        }
        Ok(Self { lengths })
    }

    pub fn cubic(d: usize, length: f64) -> SimResult<Self> {
        Self::new(vec![length; d])
    }

    pub fn d(&self) -> usize {
        self.lengths.len()
    }

    pub fn lengths(&self) -> &[f64] {
        &self.lengths
    }

    pub fn volume(&self) -> f64 {
        self.lengths.iter().product()
    }

    /// Half of the shortest side; pair ranges must stay below it.
    pub fn half_min_length(&self) -> f64 {
        0.5 * self.lengths.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Replace `dr` by its minimum-image equivalent.
    #[inline]
    pub fn minimum_image(&self, dr: &mut [f64]) {
        for (x, l) in dr.iter_mut().zip(&self.lengths) {
            *x -= l * (*x / l).round();
        }
    }

    /// Minimum-image separation `ri - rj` written into `dr`; returns `|dr|^2`.
    #[inline]
    pub fn separation(&self, ri: &[f64], rj: &[f64], dr: &mut [f64]) -> f64 {
        let mut r2 = 0.0;
        for k in 0..dr.len() {
            let l = self.lengths[k];
            let mut x = ri[k] - rj[k];
            x -= l * (x / l).round();
            dr[k] = x;
            r2 += x * x;
        }
        r2
    }

    /// Fold `r` back into the box, counting crossings in `image`.
    #[inline]
    pub fn wrap(&self, r: &mut [f64], image: &mut [i64]) {
        for k in 0..r.len() {
            let l = self.lengths[k];
            let shift = (r[k] / l + 0.5).floor();
            if shift != 0.0 {
                r[k] -= shift * l;
                image[k] += shift as i64;
            }
        }
    }
}
