//! Integration test: output layout, resumed runs and setup errors.

use md_potentials::{HarmonicRepulsion, PairParams};
use md_results::{AttrValue, DirStore, MemoryStore, OutputStore, open_trajectory};
use md_sim::{
    ComputeFlags, Configuration, DeviceSpec, ExecutionPlan, ExtractOptions, Nve, PairPotential,
    RuntimeAction, ScalarSaver, SimError, Simulation, SimulationOptions, TrajectorySaver,
    TrajectorySchedule, UnitCell,
};

type Harmonic = PairPotential<HarmonicRepulsion>;

fn soft_spheres(max_num_nbs: usize) -> Harmonic {
    // epsilon, sigma; sigma is the cutoff
    let params = PairParams::uniform(vec![10.0, 1.0]).unwrap();
    PairPotential::new(HarmonicRepulsion, params, max_num_nbs)
        .unwrap()
        .with_skin(0.3)
        .unwrap()
}

fn configuration() -> Configuration {
    let mut conf = Configuration::make_lattice(UnitCell::Sc, &[6, 6, 6], 1.1).unwrap();
    conf.randomize_velocities(0.5, 9).unwrap();
    conf
}

fn options(num_timeblocks: usize, steps_per_timeblock: usize) -> SimulationOptions {
    SimulationOptions {
        num_timeblocks,
        steps_per_timeblock,
        ..SimulationOptions::default()
    }
}

fn build(
    actions: Vec<Box<dyn RuntimeAction>>,
    options: SimulationOptions,
    output: Box<dyn OutputStore>,
) -> Result<Simulation<HarmonicRepulsion>, SimError> {
    Simulation::new(
        configuration(),
        soft_spheres(64),
        Box::new(Nve::new(0.005).unwrap()),
        actions,
        options,
        output,
    )
}

#[test]
fn datasets_have_block_shapes() {
    let actions: Vec<Box<dyn RuntimeAction>> = vec![
        Box::new(ScalarSaver::new(8)),
        Box::new(TrajectorySaver::logarithmic()),
    ];
    let mut sim = build(actions, options(3, 32), Box::new(MemoryStore::new())).unwrap();
    sim.run().unwrap();
    let out = sim.output();

    assert_eq!(out.root_attr("N").and_then(AttrValue::as_usize), Some(216));
    assert_eq!(out.root_attr("integrator").and_then(AttrValue::as_str), Some("NVE"));
    assert_eq!(
        out.dataset("initial_configuration", "positions").unwrap().shape(),
        &[216, 3]
    );
    assert_eq!(out.dataset("scalar_saver", "scalars").unwrap().shape(), &[3, 4, 3]);
    // steps 0, 1, 2, 4, 8, 16
    let positions = out.dataset("block", "positions").unwrap();
    assert_eq!(positions.shape(), &[3, 6, 216, 3]);
    assert!(positions.data().iter().all(|x| x.is_finite()));

    // first snapshot of the first block is the initial configuration
    let initial = out.dataset("initial_configuration", "positions").unwrap();
    assert_eq!(&positions.block(0).unwrap()[..216 * 3], initial.data());
}

#[test]
fn run_resumes_and_appends_blocks() {
    let actions: Vec<Box<dyn RuntimeAction>> = vec![Box::new(ScalarSaver::new(4))];
    let mut sim = build(actions, options(2, 16), Box::new(MemoryStore::new())).unwrap();
    let mut reported = Vec::new();
    sim.run_with_progress(|p| reported.push(p.block)).unwrap();
    sim.run_with_progress(|p| reported.push(p.block)).unwrap();

    assert_eq!(reported, vec![0, 1, 2, 3]);
    assert_eq!(sim.blocks_done(), 4);
    assert_eq!(sim.steps_done(), 64);
    let scalars = sim.output().dataset("scalar_saver", "scalars").unwrap();
    assert_eq!(scalars.num_blocks(), 4);
}

#[test]
fn persisted_output_reopens() {
    let dir = std::env::temp_dir().join(format!("md_sim_output_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let actions: Vec<Box<dyn RuntimeAction>> = vec![
        Box::new(ScalarSaver::new(4)),
        Box::new(TrajectorySaver::new(TrajectorySchedule::Linear {
            steps_between_output: 8,
        })),
    ];
    let store = DirStore::create(&dir).unwrap();
    let mut sim = build(actions, options(2, 16), Box::new(store)).unwrap();
    sim.run().unwrap();
    let expected = sim.output().dataset("block", "images").unwrap().clone();
    drop(sim);

    let reopened = open_trajectory(&dir).unwrap().unwrap();
    assert_eq!(reopened.dataset("block", "images").unwrap(), &expected);
    assert_eq!(
        reopened.dataset("scalar_saver", "scalars").unwrap().shape(),
        &[2, 4, 3]
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn duplicate_output_groups_are_rejected() {
    let actions: Vec<Box<dyn RuntimeAction>> =
        vec![Box::new(ScalarSaver::new(4)), Box::new(ScalarSaver::new(8))];
    let err = build(actions, options(1, 16), Box::new(MemoryStore::new())).err();
    assert!(matches!(err, Some(SimError::Config { .. })));
}

#[test]
fn logarithmic_schedule_needs_power_of_two() {
    let actions: Vec<Box<dyn RuntimeAction>> = vec![Box::new(TrajectorySaver::logarithmic())];
    let err = build(actions, options(1, 100), Box::new(MemoryStore::new())).err();
    assert!(matches!(err, Some(SimError::Config { .. })));
}

#[test]
fn plan_beyond_device_limits_is_rejected() {
    let mut opts = options(1, 16);
    opts.plan = Some(ExecutionPlan::new(8, 1, true));
    opts.device = DeviceSpec {
        max_threads_per_block: 1024,
        max_resident_blocks: 4,
        max_grid_blocks: 65535,
    };
    let err = build(Vec::new(), opts, Box::new(MemoryStore::new())).err();
    assert!(matches!(
        err,
        Some(SimError::Capacity {
            limit: 4,
            required: 27,
            ..
        })
    ));
}

#[test]
fn cutoff_must_fit_in_box() {
    let conf = Configuration::make_lattice(UnitCell::Sc, &[2, 2, 2], 1.0).unwrap();
    let err = Simulation::new(
        conf,
        soft_spheres(16),
        Box::new(Nve::new(0.005).unwrap()),
        Vec::new(),
        options(1, 16),
        Box::new(MemoryStore::new()),
    )
    .err();
    assert!(matches!(err, Some(SimError::Config { .. })));
}

#[test]
fn neighbor_overflow_aborts_before_output() {
    let actions: Vec<Box<dyn RuntimeAction>> = vec![Box::new(ScalarSaver::new(4))];
    let mut sim = Simulation::new(
        configuration(),
        soft_spheres(2),
        Box::new(Nve::new(0.005).unwrap()),
        actions,
        options(2, 16),
        Box::new(MemoryStore::new()),
    )
    .unwrap();
    let err = sim.run().unwrap_err();
    assert!(matches!(err, SimError::Capacity { limit: 2, .. }));
    assert_eq!(
        sim.output().dataset("scalar_saver", "scalars").unwrap().num_blocks(),
        0
    );
    assert_eq!(sim.blocks_done(), 0);
    assert_eq!(sim.steps_done(), 0);
    // the simulation stays unusable
    assert!(sim.run().is_err());
}

#[test]
fn shear_stress_includes_kinetic_part() {
    // lattice spacing 1.26 exceeds sigma, so no pair contributes
    let mut conf = Configuration::make_lattice(UnitCell::Sc, &[3, 3, 3], 0.5).unwrap();
    conf.randomize_velocities(1.0, 21).unwrap();
    let v = conf.velocities().to_vec();
    let expected: f64 = conf
        .masses()
        .iter()
        .enumerate()
        .map(|(i, m)| -m * v[3 * i] * v[3 * i + 1])
        .sum();
    assert!(expected.abs() > 1e-6);

    let flags = ComputeFlags {
        stresses: true,
        ..ComputeFlags::NONE
    };
    let actions: Vec<Box<dyn RuntimeAction>> = vec![Box::new(ScalarSaver::with_flags(1, flags))];
    let mut sim = Simulation::new(
        conf,
        soft_spheres(64),
        Box::new(Nve::new(0.001).unwrap()),
        actions,
        options(1, 4),
        Box::new(MemoryStore::new()),
    )
    .unwrap();
    sim.run().unwrap();

    let totals = ExtractOptions {
        per_particle: false,
        ..ExtractOptions::default()
    };
    let sxy = ScalarSaver::extract(sim.output(), &["Sxy"], totals).unwrap();
    assert_eq!(sxy[0].len(), 4);
    for value in &sxy[0] {
        assert!((value - expected).abs() < 1e-9 * expected.abs().max(1.0), "{value} vs {expected}");
    }
}
