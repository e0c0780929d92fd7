//! Property test: momentum reset removes center-of-mass motion for any
//! masses and velocities.

use md_potentials::{HarmonicRepulsion, PairParams};
use md_results::MemoryStore;
use md_sim::{
    Configuration, MomentumReset, Nve, PairPotential, RuntimeAction, Simulation,
    SimulationOptions, UnitCell,
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn momentum_is_zero_after_reset(
        seed in 0u64..1000,
        masses in proptest::collection::vec(0.5f64..4.0, 27),
        drift in proptest::collection::vec(-2.0f64..2.0, 3),
    ) {
        let mut conf = Configuration::make_lattice(UnitCell::Sc, &[3, 3, 3], 0.5).unwrap();
        for (i, m) in masses.iter().enumerate() {
            conf.set_mass(i, *m).unwrap();
        }
        conf.randomize_velocities(1.0, seed).unwrap();
        let shifted: Vec<f64> = conf
            .velocities()
            .iter()
            .enumerate()
            .map(|(k, v)| v + drift[k % 3])
            .collect();
        conf.set_velocities(shifted).unwrap();
        prop_assume!(conf.total_momentum().norm() > 1e-3);

        // lattice spacing 1.26 exceeds sigma, so particles do not interact
        let params = PairParams::uniform(vec![1.0, 0.5]).unwrap();
        let potential = PairPotential::new(HarmonicRepulsion, params, 8).unwrap();
        let actions: Vec<Box<dyn RuntimeAction>> = vec![Box::new(MomentumReset::new(1))];
        let mut sim = Simulation::new(
            conf,
            potential,
            Box::new(Nve::new(0.001).unwrap()),
            actions,
            SimulationOptions {
                num_timeblocks: 1,
                steps_per_timeblock: 2,
                ..SimulationOptions::default()
            },
            Box::new(MemoryStore::new()),
        )
        .unwrap();
        sim.run().unwrap();
        prop_assert!(sim.configuration().total_momentum().norm() < 1e-10);
    }
}
