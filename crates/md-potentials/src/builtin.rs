//! Built-in pair potentials.

use crate::pair::{PairFunction, PairTerms};

/// 12-6 Lennard-Jones, `u(r) = 4ε[(σ/r)¹² − (σ/r)⁶]`.
///
/// Parameters: `[sigma, epsilon]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LennardJones;

impl PairFunction for LennardJones {
    fn name(&self) -> String {
        "lj_12_6".to_string()
    }

    fn num_params(&self) -> usize {
        2
    }

    #[inline]
    fn eval(&self, r: f64, params: &[f64]) -> PairTerms {
        let sigma = params[0];
        let epsilon = params[1];
        let inv_r2 = 1.0 / (r * r);
        let sr2 = sigma * sigma * inv_r2;
        let sr6 = sr2 * sr2 * sr2;
        let sr12 = sr6 * sr6;
        PairTerms {
            u: 4.0 * epsilon * (sr12 - sr6),
            s: 24.0 * epsilon * (2.0 * sr12 - sr6) * inv_r2,
            d2u: 24.0 * epsilon * (26.0 * sr12 - 7.0 * sr6) * inv_r2,
        }
    }
}

/// Screened Coulomb interaction, `u(r) = A·exp(−κr)/r`.
///
/// Parameters: `[kappa, prefactor]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Yukawa;

impl PairFunction for Yukawa {
    fn name(&self) -> String {
        "yukawa".to_string()
    }

    fn num_params(&self) -> usize {
        2
    }

    #[inline]
    fn eval(&self, r: f64, params: &[f64]) -> PairTerms {
        let kappa = params[0];
        let prefactor = params[1];
        let kr = kappa * r;
        let inv_r = 1.0 / r;
        let inv_r3 = inv_r * inv_r * inv_r;
        let screened = prefactor * (-kr).exp();
        PairTerms {
            u: screened * inv_r,
            s: (kr + 1.0) * screened * inv_r3,
            d2u: (kr * kr + 2.0 * kr + 2.0) * screened * inv_r3,
        }
    }
}

/// Soft harmonic repulsion, `u(r) = ½ε(1 − r/σ)²` for `r < σ`, zero beyond.
///
/// Parameters: `[epsilon, sigma]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HarmonicRepulsion;

impl PairFunction for HarmonicRepulsion {
    fn name(&self) -> String {
        "harmonic_repulsion".to_string()
    }

    fn num_params(&self) -> usize {
        2
    }

    fn cutoff(&self, params: &[f64]) -> Option<f64> {
        params.get(1).copied()
    }

    #[inline]
    fn eval(&self, r: f64, params: &[f64]) -> PairTerms {
        let epsilon = params[0];
        let sigma = params[1];
        if r >= sigma {
            return PairTerms::ZERO;
        }
        let overlap = 1.0 - r / sigma;
        PairTerms {
            u: 0.5 * epsilon * overlap * overlap,
            s: epsilon * overlap / (sigma * r),
            d2u: epsilon / (sigma * sigma),
        }
    }
}
