//! Pair function contract.

use std::fmt::Debug;

/// Energy, force and curvature of one pair at separation `r`.
///
/// `s = -u'(r)/r`, so the force vector on particle i from j is
/// `s * (r_i - r_j)`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PairTerms {
    pub u: f64,
    pub s: f64,
    pub d2u: f64,
}

impl PairTerms {
    pub const ZERO: PairTerms = PairTerms {
        u: 0.0,
        s: 0.0,
        d2u: 0.0,
    };
}

/// A pure two-body interaction.
///
/// Implementations must be side-effect free: the force kernel calls `eval`
/// once per (particle, neighbor) pair per step from many threads at once.
/// `params` always has at least `num_params()` entries; the pair potential
/// descriptor validates this once at setup, so `eval` may index directly.
pub trait PairFunction: Send + Sync + Clone + Debug {
    /// Identifier used in logs and output metadata.
    fn name(&self) -> String;

    /// Length of the parameter vector consumed by `eval`.
    fn num_params(&self) -> usize;

    /// Interaction range encoded in `params`, if this function has one.
    fn cutoff(&self, _params: &[f64]) -> Option<f64> {
        None
    }

    fn eval(&self, r: f64, params: &[f64]) -> PairTerms;
}
