//! Integration test: Nosé-Hoover thermostat drives the kinetic temperature
//! to its target.

use md_potentials::{LennardJones, PairParams, ShiftedPotential};
use md_results::{MemoryStore, OutputStore};
use md_sim::{
    Configuration, ExtractOptions, Nvt, PairPotential, RuntimeAction, ScalarSaver, Simulation,
    SimulationOptions, UnitCell, make_function_ramp,
};

fn run(target: md_sim::TemperatureSchedule, blocks: usize) -> Simulation<ShiftedPotential<LennardJones>> {
    let mut conf = Configuration::make_lattice(UnitCell::Fcc, &[4, 4, 4], 0.8442).unwrap();
    conf.randomize_velocities(0.5, 11).unwrap();
    let params = PairParams::uniform(vec![1.0, 1.0, 2.5]).unwrap();
    let potential = PairPotential::new(ShiftedPotential::new(LennardJones), params, 128).unwrap();
    let actions: Vec<Box<dyn RuntimeAction>> = vec![Box::new(ScalarSaver::new(8))];
    let mut sim = Simulation::new(
        conf,
        potential,
        Box::new(Nvt::new(target, 0.2, 0.004).unwrap()),
        actions,
        SimulationOptions {
            num_timeblocks: blocks,
            steps_per_timeblock: 128,
            ..SimulationOptions::default()
        },
        Box::new(MemoryStore::new()),
    )
    .unwrap();
    sim.run().unwrap();
    sim
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[test]
fn temperature_approaches_target() {
    let sim = run(2.0.into(), 24);
    let n = sim.configuration().n() as f64;
    let options = ExtractOptions {
        first_block: 12,
        ..ExtractOptions::default()
    };
    let k = ScalarSaver::extract(sim.output(), &["K"], options).unwrap();
    let t_kin = mean(&k[0]) * 2.0 / 3.0 * n / (n - 1.0);
    assert!((t_kin - 2.0).abs() < 0.2, "mean kinetic temperature {t_kin}");

    let diagnostics = sim.output().dataset("integrator", "diagnostics").unwrap();
    assert_eq!(diagnostics.shape(), &[24, 1]);
}

#[test]
fn ramp_cools_the_system() {
    // 8 blocks of 128 steps at dt 0.004 span t = 0..4.096
    let ramp = make_function_ramp(2.0, 0.0, 0.6, 3.0).unwrap();
    let sim = run(ramp, 8);
    let k = ScalarSaver::extract(sim.output(), &["K"], ExtractOptions::default()).unwrap();
    let early = mean(&k[0][16..32]);
    let late = mean(&k[0][112..]);
    assert!(late < early, "K/N early {early}, late {late}");
    let times = ScalarSaver::times(sim.output(), ExtractOptions::default()).unwrap();
    assert_eq!(times.len(), k[0].len());
    assert!((times[1] - 8.0 * 0.004).abs() < 1e-12);
}
