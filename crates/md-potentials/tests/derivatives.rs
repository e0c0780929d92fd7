use md_potentials::{
    HarmonicRepulsion, LennardJones, PairFunction, ShiftedForce, ShiftedPotential, Yukawa,
    finite_difference_check,
};
use proptest::prelude::*;

fn grid(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
        .collect()
}

fn assert_consistent<F: PairFunction>(func: &F, params: &[f64], lo: f64, hi: f64) {
    for r in grid(lo, hi, 200) {
        let check = finite_difference_check(func, params, r);
        assert!(
            check.max_error() < 1e-4,
            "{} inconsistent at r={}: {:?}",
            func.name(),
            r,
            check
        );
    }
}

#[test]
fn lj_shifted_potential_derivatives() {
    assert_consistent(&ShiftedPotential::new(LennardJones), &[1.0, 1.0, 2.5], 0.9, 2.49);
}

#[test]
fn lj_shifted_force_derivatives() {
    assert_consistent(&ShiftedForce::new(LennardJones), &[1.0, 1.0, 2.5], 0.9, 2.49);
}

#[test]
fn yukawa_wrapped_derivatives() {
    let params = [1.0, 1.0, 2.5];
    assert_consistent(&ShiftedPotential::new(Yukawa), &params, 0.8, 2.49);
    assert_consistent(&ShiftedForce::new(Yukawa), &params, 0.8, 2.49);
}

#[test]
fn harmonic_repulsion_derivatives() {
    assert_consistent(&HarmonicRepulsion, &[1.0, 1.0], 0.2, 0.99);
}

proptest! {
    #[test]
    fn shifted_force_consistent_for_any_parameters(
        sigma in 0.7_f64..1.3,
        epsilon in 0.1_f64..2.0,
        frac in 0.0_f64..1.0,
    ) {
        let rc = 2.5 * sigma;
        let r = 0.9 * sigma + frac * (rc - 0.01 - 0.9 * sigma);
        let f = ShiftedForce::new(LennardJones);
        let check = finite_difference_check(&f, &[sigma, epsilon, rc], r);
        prop_assert!(check.max_error() < 1e-4, "{:?}", check);
    }

    #[test]
    fn cutoff_policies_agree_on_curvature(r in 0.9_f64..2.45) {
        let params = [1.0, 1.0, 2.5];
        let sp = ShiftedPotential::new(LennardJones).eval(r, &params);
        let sf = ShiftedForce::new(LennardJones).eval(r, &params);
        prop_assert_eq!(sp.d2u, sf.d2u);
    }
}
