//! Integration test: NVU dynamics holds the potential energy at its target.

use md_potentials::{LennardJones, PairParams, ShiftedForce};
use md_results::{MemoryStore, OutputStore};
use md_sim::{
    Configuration, ExtractOptions, Nvt, Nvu, NvuOptions, PairPotential, RuntimeAction,
    ScalarSaver, Simulation, SimulationOptions, UnitCell,
};

fn potential() -> PairPotential<ShiftedForce<LennardJones>> {
    let params = PairParams::uniform(vec![1.0, 1.0, 2.5]).unwrap();
    PairPotential::new(ShiftedForce::new(LennardJones), params, 128).unwrap()
}

fn equilibrated() -> Configuration {
    let mut conf = Configuration::make_lattice(UnitCell::Fcc, &[4, 4, 4], 0.8442).unwrap();
    conf.randomize_velocities(1.0, 5).unwrap();
    let mut sim = Simulation::new(
        conf,
        potential(),
        Box::new(Nvt::new(1.0, 0.2, 0.004).unwrap()),
        Vec::new(),
        SimulationOptions {
            num_timeblocks: 4,
            steps_per_timeblock: 128,
            ..SimulationOptions::default()
        },
        Box::new(MemoryStore::new()),
    )
    .unwrap();
    sim.run().unwrap();
    sim.into_configuration()
}

#[test]
fn potential_energy_stays_on_target() {
    let conf = equilibrated();
    let actions: Vec<Box<dyn RuntimeAction>> = vec![Box::new(ScalarSaver::new(4))];
    let mut sim = Simulation::new(
        conf,
        potential(),
        Box::new(
            Nvu::new(NvuOptions {
                dl: 0.1,
                ..NvuOptions::default()
            })
            .unwrap(),
        ),
        actions,
        SimulationOptions {
            num_timeblocks: 4,
            steps_per_timeblock: 64,
            ..SimulationOptions::default()
        },
        Box::new(MemoryStore::new()),
    )
    .unwrap();
    sim.run().unwrap();

    let u = ScalarSaver::extract(sim.output(), &["U", "lapU"], ExtractOptions::default()).unwrap();
    let u0 = u[0][0];
    let worst = u[0].iter().map(|x| (x - u0).abs()).fold(0.0, f64::max);
    assert!(worst < 1e-3, "U/N deviated by {worst}");
    assert!(u[1].iter().all(|x| x.is_finite() && *x > 0.0));

    // configuration actually moved
    let rebuilds = sim.neighbor_rebuilds();
    assert!(rebuilds >= 1);

    let diagnostics = sim.output().dataset("integrator", "diagnostics").unwrap();
    assert_eq!(diagnostics.shape(), &[4, 5]);
    let last = diagnostics.block(3).unwrap();
    assert!(last[0] < 1e-3);
    assert_eq!(last[2], 0.0);
    assert!((last[3] - u0).abs() < 1e-12);
    // target was latched, not supplied
    assert_eq!(last[4], 0.0);
}
