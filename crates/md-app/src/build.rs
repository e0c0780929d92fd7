//! Turns a run definition into simulation components.

use md_potentials::{
    HarmonicRepulsion, LennardJones, PairFunction, PairParams, ShiftedForce, ShiftedPotential,
    Yukawa,
};
use md_project::schema::{
    ActionDef, ConfigurationDef, CutoffPolicyDef, IntegratorDef, LatticeDef, PairFunctionDef,
    PlanDef, PotentialDef, RunDefinition, TemperatureDef, TrajectoryScheduleDef,
};
use md_sim::{
    ComputeFlags, Configuration, DeviceSpec, ExecutionPlan, Integrator, MomentumReset, Nve, Nvt,
    Nvu, NvuOptions, PairPotential, RuntimeAction, ScalarSaver, SimulationOptions,
    TemperatureSchedule, TrajectorySaver, TrajectorySchedule, UnitCell, make_function_ramp,
};

use crate::error::{AppError, AppResult};

/// Everything a simulation needs apart from the pair potential, which is
/// generic and handed out through [`with_potential`].
pub struct SimulationParts {
    pub configuration: Configuration,
    pub integrator: Box<dyn Integrator>,
    pub actions: Vec<Box<dyn RuntimeAction>>,
    pub options: SimulationOptions,
}

pub fn build_parts(def: &RunDefinition) -> AppResult<SimulationParts> {
    let configuration = build_configuration(&def.configuration)?;
    let device = DeviceSpec::default();
    let plan = resolve_plan(&def.plan, configuration.n(), &device);
    Ok(SimulationParts {
        integrator: build_integrator(&def.integrator)?,
        actions: build_actions(&def.actions)?,
        options: SimulationOptions {
            num_timeblocks: def.schedule.num_timeblocks,
            steps_per_timeblock: def.schedule.steps_per_timeblock,
            plan,
            device,
            quiet: def.plan.quiet,
        },
        configuration,
    })
}

pub fn build_configuration(def: &ConfigurationDef) -> AppResult<Configuration> {
    let mut conf = match &def.lattice {
        LatticeDef::Sc { cells } => Configuration::make_lattice(UnitCell::Sc, cells, def.density)?,
        LatticeDef::Bcc { cells } => Configuration::make_lattice(UnitCell::Bcc, cells, def.density)?,
        LatticeDef::Fcc { cells } => Configuration::make_lattice(UnitCell::Fcc, cells, def.density)?,
        LatticeDef::Fill { n, d } => Configuration::make_positions(*n, *d, def.density)?,
    };

    if !def.type_counts.is_empty() {
        if def.type_counts.iter().sum::<usize>() != conf.n() {
            return Err(AppError::Build(format!(
                "type counts {:?} do not add up to {} particles",
                def.type_counts,
                conf.n()
            )));
        }
        conf.set_ptypes(spread_types(&def.type_counts))?;
    }
    if !def.masses.is_empty() {
        let ptype = conf.ptype().to_vec();
        for (i, &t) in ptype.iter().enumerate() {
            let mass = def.masses.get(t).copied().ok_or_else(|| {
                AppError::Build(format!("no mass given for particle type {t}"))
            })?;
            conf.set_mass(i, mass)?;
        }
    }
    if !def.compute_flags.is_empty() {
        conf = conf.with_compute_flags(ComputeFlags::from_names(&def.compute_flags)?);
    }
    conf.randomize_velocities(def.temperature, def.seed)?;
    Ok(conf)
}

/// Type labels with `counts[t]` entries of type `t`, interleaved so every
/// prefix of the lattice holds the types in proportion.
pub fn spread_types(counts: &[usize]) -> Vec<usize> {
    let n: usize = counts.iter().sum();
    let mut assigned = vec![0usize; counts.len()];
    let mut types = Vec::with_capacity(n);
    for i in 0..n {
        let mut best = 0;
        let mut best_deficit = f64::NEG_INFINITY;
        for (t, (&count, &done)) in counts.iter().zip(&assigned).enumerate() {
            if done == count {
                continue;
            }
            let deficit = count as f64 * (i + 1) as f64 / n as f64 - done as f64;
            if deficit > best_deficit {
                best = t;
                best_deficit = deficit;
            }
        }
        assigned[best] += 1;
        types.push(best);
    }
    types
}

pub fn build_integrator(def: &IntegratorDef) -> AppResult<Box<dyn Integrator>> {
    let integrator: Box<dyn Integrator> = match def {
        IntegratorDef::Nve { dt } => Box::new(Nve::new(*dt)?),
        IntegratorDef::Nvt {
            dt,
            tau,
            temperature,
        } => {
            let schedule = match *temperature {
                TemperatureDef::Constant { value } => TemperatureSchedule::Constant(value),
                TemperatureDef::Ramp {
                    value0,
                    x0,
                    value1,
                    x1,
                } => make_function_ramp(value0, x0, value1, x1)?,
            };
            Box::new(Nvt::new(schedule, *tau, *dt)?)
        }
        IntegratorDef::Nvu {
            dl,
            u0,
            tolerance,
            max_excursion_steps,
        } => {
            let defaults = NvuOptions::default();
            Box::new(Nvu::new(NvuOptions {
                u0: *u0,
                dl: *dl,
                tolerance: tolerance.unwrap_or(defaults.tolerance),
                max_excursion_steps: max_excursion_steps.unwrap_or(defaults.max_excursion_steps),
            })?)
        }
    };
    Ok(integrator)
}

pub fn build_actions(defs: &[ActionDef]) -> AppResult<Vec<Box<dyn RuntimeAction>>> {
    let mut actions: Vec<Box<dyn RuntimeAction>> = Vec::with_capacity(defs.len());
    for def in defs {
        match def {
            ActionDef::ScalarSaver {
                steps_between_output,
                compute_flags,
            } => {
                let flags = ComputeFlags::from_names(compute_flags)?;
                actions.push(Box::new(ScalarSaver::with_flags(*steps_between_output, flags)));
            }
            ActionDef::TrajectorySaver { schedule } => {
                let schedule = match *schedule {
                    TrajectoryScheduleDef::Logarithmic => TrajectorySchedule::Logarithmic,
                    TrajectoryScheduleDef::Linear {
                        steps_between_output,
                    } => TrajectorySchedule::Linear {
                        steps_between_output,
                    },
                };
                actions.push(Box::new(TrajectorySaver::new(schedule)));
            }
            ActionDef::MomentumReset {
                steps_between_reset,
            } => actions.push(Box::new(MomentumReset::new(*steps_between_reset))),
        }
    }
    Ok(actions)
}

/// Launch plan with the definition's overrides applied to the automatic
/// choice; `None` when nothing is overridden.
pub fn resolve_plan(def: &PlanDef, n: usize, device: &DeviceSpec) -> Option<ExecutionPlan> {
    if def.pb.is_none() && def.tp.is_none() && def.gridsync.is_none() {
        return None;
    }
    let auto = ExecutionPlan::auto(n, device);
    let pb = def.pb.unwrap_or(auto.pb);
    let gridsync = def
        .gridsync
        .unwrap_or_else(|| pb > 0 && n.div_ceil(pb) <= device.max_resident_blocks);
    Some(ExecutionPlan::new(pb, def.tp.unwrap_or(auto.tp), gridsync))
}

/// Receives the pair potential once its concrete type is known.
pub trait PotentialVisitor {
    type Output;

    fn visit<F: PairFunction + 'static>(self, potential: PairPotential<F>) -> AppResult<Self::Output>;
}

/// Build the pair potential named by `def` and pass it to `visitor`.
pub fn with_potential<V: PotentialVisitor>(def: &PotentialDef, visitor: V) -> AppResult<V::Output> {
    match def.function {
        PairFunctionDef::LennardJones => with_cutoff(LennardJones, def, visitor),
        PairFunctionDef::Yukawa => with_cutoff(Yukawa, def, visitor),
        PairFunctionDef::HarmonicRepulsion => with_cutoff(HarmonicRepulsion, def, visitor),
    }
}

fn with_cutoff<B, V>(bare: B, def: &PotentialDef, visitor: V) -> AppResult<V::Output>
where
    B: PairFunction + 'static,
    V: PotentialVisitor,
{
    match def.cutoff {
        CutoffPolicyDef::ShiftedPotential => finish(ShiftedPotential::new(bare), def, visitor),
        CutoffPolicyDef::ShiftedForce => finish(ShiftedForce::new(bare), def, visitor),
        CutoffPolicyDef::None => finish(bare, def, visitor),
    }
}

fn finish<F, V>(func: F, def: &PotentialDef, visitor: V) -> AppResult<V::Output>
where
    F: PairFunction + 'static,
    V: PotentialVisitor,
{
    let params = PairParams::from_matrices(&def.params)?;
    let mut potential = PairPotential::new(func, params, def.max_num_nbs)?;
    if let Some(skin) = def.skin {
        potential = potential.with_skin(skin)?;
    }
    visitor.visit(potential)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spread_types_interleaves() {
        let types = spread_types(&[8, 2]);
        assert_eq!(types.len(), 10);
        assert_eq!(types.iter().filter(|&&t| t == 1).count(), 2);
        // Type 1 is not bunched at the end.
        assert!(types[..6].contains(&1));
    }

    #[test]
    fn spread_types_single_type() {
        assert_eq!(spread_types(&[4]), vec![0, 0, 0, 0]);
    }

    #[test]
    fn plan_overrides_keep_auto_fields() {
        let device = DeviceSpec {
            max_threads_per_block: 1024,
            max_resident_blocks: 8,
            max_grid_blocks: 65535,
        };
        assert_eq!(resolve_plan(&PlanDef::default(), 1000, &device), None);

        let auto = ExecutionPlan::auto(1000, &device);
        let plan = resolve_plan(
            &PlanDef {
                tp: Some(1),
                ..PlanDef::default()
            },
            1000,
            &device,
        )
        .unwrap();
        assert_eq!(plan.pb, auto.pb);
        assert_eq!(plan.tp, 1);

        let plan = resolve_plan(
            &PlanDef {
                pb: Some(10),
                ..PlanDef::default()
            },
            1000,
            &device,
        )
        .unwrap();
        assert!(!plan.gridsync, "100 blocks cannot be co-resident on 8");
    }

    #[test]
    fn configuration_masses_by_type() {
        let def = ConfigurationDef {
            lattice: LatticeDef::Sc {
                cells: vec![4, 4, 4],
            },
            density: 0.8,
            temperature: 1.0,
            seed: 3,
            type_counts: vec![48, 16],
            masses: vec![1.0, 2.5],
            compute_flags: vec!["U".to_string(), "Fsq".to_string()],
        };
        let conf = build_configuration(&def).unwrap();
        assert_eq!(conf.n(), 64);
        assert_eq!(conf.num_types(), 2);
        for (t, m) in conf.ptype().iter().zip(conf.masses()) {
            assert_eq!(*m, if *t == 0 { 1.0 } else { 2.5 });
        }
        assert!(conf.compute_flags().fsq);
        assert!(!conf.compute_flags().w);
        approx::assert_relative_eq!(conf.kinetic_temperature(), 1.0, epsilon = 1e-10);
    }

    struct Name;

    impl PotentialVisitor for Name {
        type Output = (String, f64);

        fn visit<F: PairFunction + 'static>(self, potential: PairPotential<F>) -> AppResult<Self::Output> {
            Ok((potential.name(), potential.neighbor_range()))
        }
    }

    #[test]
    fn potential_dispatch_names_wrapper() {
        let def = PotentialDef {
            function: PairFunctionDef::LennardJones,
            cutoff: CutoffPolicyDef::ShiftedForce,
            params: vec![vec![vec![1.0]], vec![vec![1.0]], vec![vec![2.5]]],
            max_num_nbs: 64,
            skin: Some(0.3),
        };
        let (name, range) = with_potential(&def, Name).unwrap();
        assert!(name.contains("shifted_force"), "{name}");
        approx::assert_relative_eq!(range, 2.8);
    }

    #[test]
    fn bare_lj_rejected_at_build() {
        let def = PotentialDef {
            function: PairFunctionDef::LennardJones,
            cutoff: CutoffPolicyDef::None,
            params: vec![vec![vec![1.0]], vec![vec![1.0]]],
            max_num_nbs: 64,
            skin: None,
        };
        assert!(with_potential(&def, Name).is_err());
    }
}
