//! Cutoff wrapper policies.
//!
//! Both wrappers append one parameter, the cutoff `rc`, to the parameter vector
//! of the wrapped function and return zero for all three terms at and beyond it.
//!
//! - [`ShiftedPotential`]: `u(r) - u(rc)`; the energy vanishes at `rc`, the
//!   force jumps to zero there.
//! - [`ShiftedForce`]: `u(r) - u(rc) - (r - rc) u'(rc)`; the force vanishes at
//!   `rc` and the energy is continuous.
//!
//! Inside the cutoff `u''` is unchanged by either policy.

use crate::pair::{PairFunction, PairTerms};

#[derive(Clone, Copy, Debug, Default)]
pub struct ShiftedPotential<F> {
    inner: F,
}

impl<F: PairFunction> ShiftedPotential<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: PairFunction> PairFunction for ShiftedPotential<F> {
    fn name(&self) -> String {
        format!("shifted_potential({})", self.inner.name())
    }

    fn num_params(&self) -> usize {
        self.inner.num_params() + 1
    }

    fn cutoff(&self, params: &[f64]) -> Option<f64> {
        params.get(self.inner.num_params()).copied()
    }

    #[inline]
    fn eval(&self, r: f64, params: &[f64]) -> PairTerms {
        let n = self.inner.num_params();
        let rc = params[n];
        if r >= rc {
            return PairTerms::ZERO;
        }
        let bare = &params[..n];
        let at_r = self.inner.eval(r, bare);
        let at_rc = self.inner.eval(rc, bare);
        PairTerms {
            u: at_r.u - at_rc.u,
            ..at_r
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ShiftedForce<F> {
    inner: F,
}

impl<F: PairFunction> ShiftedForce<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: PairFunction> PairFunction for ShiftedForce<F> {
    fn name(&self) -> String {
        format!("shifted_force({})", self.inner.name())
    }

    fn num_params(&self) -> usize {
        self.inner.num_params() + 1
    }

    fn cutoff(&self, params: &[f64]) -> Option<f64> {
        params.get(self.inner.num_params()).copied()
    }

    #[inline]
    fn eval(&self, r: f64, params: &[f64]) -> PairTerms {
        let n = self.inner.num_params();
        let rc = params[n];
        if r >= rc {
            return PairTerms::ZERO;
        }
        let bare = &params[..n];
        let at_r = self.inner.eval(r, bare);
        let at_rc = self.inner.eval(rc, bare);
        // u'(rc) = -rc * s(rc)
        PairTerms {
            u: at_r.u - at_rc.u + (r - rc) * rc * at_rc.s,
            s: at_r.s - at_rc.s * rc / r,
            d2u: at_r.d2u,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{LennardJones, Yukawa};

    const LJ: [f64; 3] = [1.0, 1.0, 2.5];

    #[test]
    fn shifted_potential_vanishes_at_cutoff() {
        let f = ShiftedPotential::new(LennardJones);
        assert_eq!(f.eval(2.5, &LJ).u, 0.0);
        assert!(f.eval(2.5 - 1e-9, &LJ).u.abs() < 1e-8);
        // Force is not shifted
        let bare = LennardJones.eval(2.0, &LJ[..2]);
        assert_eq!(f.eval(2.0, &LJ).s, bare.s);
    }

    #[test]
    fn shifted_force_vanishes_at_cutoff() {
        let f = ShiftedForce::new(LennardJones);
        assert_eq!(f.eval(2.5, &LJ).s, 0.0);
        let just_inside = f.eval(2.5 - 1e-9, &LJ);
        assert!(just_inside.s.abs() < 1e-8);
        assert!(just_inside.u.abs() < 1e-8);
    }

    #[test]
    fn zero_beyond_cutoff() {
        let f = ShiftedForce::new(Yukawa);
        assert_eq!(f.eval(3.0, &[1.0, 1.0, 2.5]), PairTerms::ZERO);
        let g = ShiftedPotential::new(Yukawa);
        assert_eq!(g.eval(3.0, &[1.0, 1.0, 2.5]), PairTerms::ZERO);
    }

    #[test]
    fn wrappers_report_cutoff_and_arity() {
        let f = ShiftedPotential::new(LennardJones);
        assert_eq!(f.num_params(), 3);
        assert_eq!(f.cutoff(&LJ), Some(2.5));
        assert_eq!(f.name(), "shifted_potential(lj_12_6)");
    }
}
