//! Integration test: Lennard-Jones liquid under NVE.
//!
//! 500 particles on an fcc lattice melt at T = 1.0. Checks:
//! - total energy U + K stays constant
//! - total momentum stays zero
//! - fused and unfused launches give the same trajectory

use md_potentials::{LennardJones, PairParams, ShiftedForce};
use md_results::MemoryStore;
use md_sim::{
    Configuration, DeviceSpec, ExecutionPlan, ExtractOptions, MomentumReset, Nve, PairPotential,
    RuntimeAction, ScalarSaver, Simulation, SimulationOptions, UnitCell,
};

fn liquid() -> Configuration {
    let mut conf = Configuration::make_lattice(UnitCell::Fcc, &[5, 5, 5], 0.8442).unwrap();
    conf.randomize_velocities(1.0, 2024).unwrap();
    conf
}

fn potential() -> PairPotential<ShiftedForce<LennardJones>> {
    let params = PairParams::uniform(vec![1.0, 1.0, 2.5]).unwrap();
    PairPotential::new(ShiftedForce::new(LennardJones), params, 128).unwrap()
}

fn simulation(
    plan: Option<ExecutionPlan>,
    num_timeblocks: usize,
    reset_momentum: bool,
) -> Simulation<ShiftedForce<LennardJones>> {
    let mut actions: Vec<Box<dyn RuntimeAction>> = vec![Box::new(ScalarSaver::new(10))];
    if reset_momentum {
        actions.push(Box::new(MomentumReset::new(100)));
    }
    Simulation::new(
        liquid(),
        potential(),
        Box::new(Nve::new(0.005).unwrap()),
        actions,
        SimulationOptions {
            num_timeblocks,
            steps_per_timeblock: 100,
            plan,
            device: DeviceSpec {
                max_resident_blocks: 16,
                ..DeviceSpec::default()
            },
            quiet: true,
        },
        Box::new(MemoryStore::new()),
    )
    .unwrap()
}

#[test]
fn energy_is_conserved() {
    let mut sim = simulation(None, 10, true);
    sim.run().unwrap();

    let totals = ExtractOptions {
        per_particle: false,
        ..ExtractOptions::default()
    };
    let series = ScalarSaver::extract(sim.output(), &["U", "K"], totals).unwrap();
    assert_eq!(series[0].len(), 100);
    let energy: Vec<f64> = series[0].iter().zip(&series[1]).map(|(u, k)| u + k).collect();
    let e0 = energy[0];
    let drift = energy
        .iter()
        .map(|e| (e - e0).abs() / e0.abs())
        .fold(0.0, f64::max);
    assert!(drift < 5e-3, "relative energy drift {drift}");

    // the liquid really moved
    assert!(sim.neighbor_rebuilds() > 1);
    assert!(series[0].iter().all(|u| u.is_finite()));

    let p = sim.configuration().total_momentum();
    assert!(p.norm() < 1e-8, "total momentum {p}");
    assert_eq!(sim.steps_done(), 1000);
}

#[test]
fn forces_sum_to_zero() {
    let mut sim = simulation(None, 1, true);
    sim.run().unwrap();
    let conf = sim.configuration();
    for k in 0..3 {
        let total: f64 = conf.forces().iter().skip(k).step_by(3).sum();
        assert!(total.abs() < 1e-9);
    }
    let u: f64 = conf.total("U").unwrap();
    assert!(u < 0.0);
}

#[test]
fn fused_and_unfused_launches_agree() {
    // momentum reset sums across blocks in launch order, so leave it out
    let mut fused = simulation(Some(ExecutionPlan::new(64, 2, true)), 2, false);
    let mut unfused = simulation(Some(ExecutionPlan::new(64, 2, false)), 2, false);
    fused.run().unwrap();
    unfused.run().unwrap();
    assert_eq!(
        fused.configuration().positions(),
        unfused.configuration().positions()
    );
    assert_eq!(
        fused.configuration().images(),
        unfused.configuration().images()
    );
}
