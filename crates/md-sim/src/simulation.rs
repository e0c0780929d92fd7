//! Simulation assembly and the timeblock loop.

use std::collections::BTreeSet;
use std::time::Instant;

use md_core::timing::{PerfStats, Timer, pipeline_timing};
use md_potentials::PairFunction;
use md_results::{AttrValue, Dataset, OutputStore};
use tracing::{debug, info, warn};

use crate::actions::RuntimeAction;
use crate::configuration::Configuration;
use crate::device::DeviceState;
use crate::error::{SimError, SimResult};
use crate::flags::ComputeFlags;
use crate::integrators::Integrator;
use crate::neighbor::NeighborList;
use crate::pair::{PairKernel, PairPotential, select_kernel};
use crate::pipeline::{Pipeline, RunContext, StepInfo};
use crate::plan::{DeviceSpec, ExecutionPlan};

/// Run length and launch configuration.
#[derive(Clone, Debug)]
pub struct SimulationOptions {
    pub num_timeblocks: usize,
    pub steps_per_timeblock: usize,
    /// Chosen automatically from the particle count when `None`.
    pub plan: Option<ExecutionPlan>,
    pub device: DeviceSpec,
    /// Log the low-occupancy notice at debug instead of warn.
    pub quiet: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            num_timeblocks: 16,
            steps_per_timeblock: 1024,
            plan: None,
            device: DeviceSpec::default(),
            quiet: false,
        }
    }
}

/// Progress report after each finished timeblock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockProgress {
    /// Global index of the finished block.
    pub block: usize,
    /// Blocks finished in the current `run` call.
    pub completed: usize,
    pub total: usize,
    pub steps_done: u64,
    pub time: f64,
    pub block_seconds: f64,
}

pub struct Simulation<F: PairFunction> {
    configuration: Configuration,
    potential: PairPotential<F>,
    integrator: Box<dyn Integrator>,
    actions: Vec<Box<dyn RuntimeAction>>,
    options: SimulationOptions,
    plan: ExecutionPlan,
    flags: ComputeFlags,
    output: Box<dyn OutputStore>,
    device: DeviceState,
    neighbors: NeighborList,
    pair_kernel: PairKernel<F>,
    blocks_done: usize,
    steps_done: u64,
    perf: PerfStats,
}

impl<F: PairFunction> Simulation<F> {
    /// Validate every component against the run, upload the configuration
    /// and write run metadata and the initial configuration to `output`.
    pub fn new(
        configuration: Configuration,
        potential: PairPotential<F>,
        mut integrator: Box<dyn Integrator>,
        mut actions: Vec<Box<dyn RuntimeAction>>,
        options: SimulationOptions,
        mut output: Box<dyn OutputStore>,
    ) -> SimResult<Self> {
        let setup_start = Instant::now();
        let timer = Timer::start("simulation setup");
        if options.steps_per_timeblock == 0 {
            return Err(SimError::InvalidArg {
                what: "steps_per_timeblock must be positive",
            });
        }
        let n = configuration.n();
        let d = configuration.d();

        let flags = actions.iter().fold(
            configuration
                .compute_flags()
                .union(integrator.compute_flags()),
            |acc, a| acc.union(a.compute_flags()),
        );
        if flags.stresses && d < 2 {
            return Err(SimError::config("stress computation needs at least two dimensions"));
        }

        let mut groups = BTreeSet::new();
        for group in actions.iter().filter_map(|a| a.output_group()) {
            if !groups.insert(group) {
                return Err(SimError::config(format!(
                    "two runtime actions write output group {group:?}"
                )));
            }
        }

        let num_types = potential.params().num_types();
        if configuration.num_types() > num_types {
            return Err(SimError::config(format!(
                "configuration has {} particle types but the potential defines {num_types}",
                configuration.num_types()
            )));
        }

        let plan = options
            .plan
            .unwrap_or_else(|| ExecutionPlan::auto(n, &options.device));
        plan.validate(n, &options.device)?;
        let num_blocks = plan.num_blocks(n);
        if num_blocks < options.device.max_resident_blocks {
            let resident = options.device.max_resident_blocks;
            if options.quiet {
                debug!(num_blocks, resident, "low occupancy");
            } else {
                warn!(
                    num_blocks,
                    resident, "low occupancy: fewer blocks than the device can run concurrently"
                );
            }
        }

        let range = potential.neighbor_range();
        let half_box = configuration.sim_box().half_min_length();
        if range >= half_box {
            return Err(SimError::config(format!(
                "cutoff plus skin ({range}) must be below half the shortest box side ({half_box})"
            )));
        }

        let ctx = RunContext {
            n,
            d,
            num_timeblocks: options.num_timeblocks,
            steps_per_timeblock: options.steps_per_timeblock,
            dt: integrator.dt(),
            flags,
        };
        integrator.setup(&ctx)?;
        for action in actions.iter_mut() {
            action.setup(&ctx, output.as_mut())?;
        }

        let device = DeviceState::upload(&configuration, flags);
        let neighbors = NeighborList::new(n, d, potential.max_num_nbs(), range, potential.skin())?;
        let pair_kernel = select_kernel::<F>(flags);

        write_metadata(output.as_mut(), &configuration, &ctx, integrator.as_ref(), &potential)?;
        output.flush()?;

        let setup_time_s = setup_start.elapsed().as_secs_f64();
        timer.stop_and_log();
        info!(
            n,
            d,
            integrator = integrator.name(),
            potential = %potential.name(),
            pb = plan.pb,
            tp = plan.tp,
            gridsync = plan.gridsync,
            flags = ?flags.names(),
            "simulation ready"
        );

        Ok(Self {
            configuration,
            potential,
            integrator,
            actions,
            perf: PerfStats {
                setup_time_s,
                particles: n,
                ..PerfStats::default()
            },
            options,
            plan,
            flags,
            output,
            device,
            neighbors,
            pair_kernel,
            blocks_done: 0,
            steps_done: 0,
        })
    }

    /// Run `num_timeblocks` more timeblocks.
    pub fn run(&mut self) -> SimResult<()> {
        self.run_with_progress(|_| {})
    }

    /// Run `num_timeblocks` more timeblocks, reporting after each one.
    ///
    /// Output blocks are appended after any written by earlier calls. The
    /// host configuration is refreshed from device state when the call ends.
    pub fn run_with_progress(&mut self, mut on_block: impl FnMut(&BlockProgress)) -> SimResult<()> {
        self.neighbors.check_overflow()?;
        let total = self.options.num_timeblocks;
        let steps = self.options.steps_per_timeblock;
        let dt = self.integrator.dt();
        let run_start = Instant::now();
        let rebuilds_before = self.neighbors.rebuild_count();
        let mut flush_time_s = 0.0;

        for completed in 1..=total {
            let block = self.blocks_done;
            let block_start = Instant::now();
            for action in self.actions.iter_mut() {
                action.before_block(block)?;
            }

            {
                let pipeline = self.pipeline();
                for step in 0..steps {
                    let global_step = self.steps_done + step as u64;
                    pipeline.run_step(&StepInfo {
                        block,
                        step,
                        global_step,
                        time: global_step as f64 * dt,
                    });
                }
            }
            pipeline_timing::TIMEBLOCKS.record(block_start.elapsed().as_secs_f64());

            self.neighbors.check_overflow()?;
            self.steps_done += steps as u64;
            let flush_start = Instant::now();
            self.flush_block(block)?;
            let flush_s = flush_start.elapsed().as_secs_f64();
            pipeline_timing::OUTPUT_FLUSH.record(flush_s);
            flush_time_s += flush_s;
            self.blocks_done += 1;

            let progress = BlockProgress {
                block,
                completed,
                total,
                steps_done: self.steps_done,
                time: self.steps_done as f64 * dt,
                block_seconds: block_start.elapsed().as_secs_f64(),
            };
            debug!(
                block,
                rebuilds = self.neighbors.rebuild_count(),
                seconds = progress.block_seconds,
                "timeblock done"
            );
            on_block(&progress);
        }

        self.device.download(&mut self.configuration);
        for _ in rebuilds_before..self.neighbors.rebuild_count() {
            pipeline_timing::NEIGHBOR_REBUILDS.tick();
        }
        self.perf.run_time_s += run_start.elapsed().as_secs_f64();
        self.perf.flush_time_s += flush_time_s;
        self.perf.steps = self.steps_done as usize;
        self.perf.log_summary();
        Ok(())
    }

    /// Phases of one step in execution order.
    fn pipeline(&self) -> Pipeline<'_> {
        let dev = &self.device;
        let nbl = &self.neighbors;
        let pot = &self.potential;
        let kernel = self.pair_kernel;
        let integrator = self.integrator.as_ref();
        let mut pipeline = Pipeline::new(self.plan, dev.n);

        for action in &self.actions {
            let action = action.as_ref();
            for phase in 0..action.pre_step_phases() {
                pipeline.push(action.name(), move |step, lane| {
                    action.pre_step(phase, dev, step, lane)
                });
            }
        }
        pipeline.push("neighbor_check", move |_, lane| {
            if lane.is_primary() {
                nbl.check_displacement(dev, lane.particle);
                dev.clear_accumulators(lane.particle);
            }
        });
        pipeline.push("neighbor_build", move |_, lane| {
            if lane.is_primary() {
                nbl.rebuild_particle(dev, lane.particle);
            }
        });
        pipeline.push("pair_forces", move |_, lane| {
            if lane.is_leader() {
                nbl.finish_rebuild();
            }
            kernel(pot, nbl, dev, lane);
        });
        for phase in 0..integrator.num_phases() {
            pipeline.push(integrator.name(), move |step, lane| {
                if phase == 0 && lane.is_primary() {
                    dev.finalize_particle(lane.particle);
                }
                integrator.phase(phase, dev, step, lane);
            });
        }
        for action in &self.actions {
            let action = action.as_ref();
            for phase in 0..action.post_step_phases() {
                pipeline.push(action.name(), move |step, lane| {
                    action.post_step(phase, dev, step, lane)
                });
            }
        }
        pipeline
    }

    fn flush_block(&mut self, block: usize) -> SimResult<()> {
        for action in self.actions.iter_mut() {
            action.after_block(block, self.output.as_mut())?;
        }
        let diagnostics = self.integrator.after_block(block)?;
        if !diagnostics.is_empty() {
            self.output
                .write_block("integrator", "diagnostics", block, &diagnostics)?;
        }
        self.output.flush()?;
        Ok(())
    }

    /// Host copy of the configuration as of the end of the last `run`.
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn into_configuration(self) -> Configuration {
        self.configuration
    }

    pub fn output(&self) -> &dyn OutputStore {
        self.output.as_ref()
    }

    pub fn into_output(self) -> Box<dyn OutputStore> {
        self.output
    }

    pub fn potential(&self) -> &PairPotential<F> {
        &self.potential
    }

    pub fn integrator(&self) -> &dyn Integrator {
        self.integrator.as_ref()
    }

    pub fn plan(&self) -> ExecutionPlan {
        self.plan
    }

    pub fn compute_flags(&self) -> ComputeFlags {
        self.flags
    }

    pub fn blocks_done(&self) -> usize {
        self.blocks_done
    }

    pub fn steps_done(&self) -> u64 {
        self.steps_done
    }

    pub fn neighbor_rebuilds(&self) -> u64 {
        self.neighbors.rebuild_count()
    }

    pub fn perf(&self) -> &PerfStats {
        &self.perf
    }
}

fn write_metadata<F: PairFunction>(
    output: &mut dyn OutputStore,
    conf: &Configuration,
    ctx: &RunContext,
    integrator: &dyn Integrator,
    potential: &PairPotential<F>,
) -> SimResult<()> {
    output.set_root_attr("dt", AttrValue::from(ctx.dt))?;
    output.set_root_attr("integrator", AttrValue::from(integrator.name()))?;
    output.set_root_attr("N", AttrValue::from(ctx.n))?;
    output.set_root_attr("D", AttrValue::from(ctx.d))?;
    output.set_root_attr("steps_per_timeblock", AttrValue::from(ctx.steps_per_timeblock))?;
    output.set_root_attr("potential", AttrValue::from(potential.name()))?;
    output.set_root_attr(
        "box_lengths",
        AttrValue::FloatList(conf.sim_box().lengths().to_vec()),
    )?;
    let flag_names = ctx.flags.names().iter().map(|s| s.to_string()).collect();
    output.set_root_attr("compute_flags", AttrValue::TextList(flag_names))?;

    let group = "initial_configuration";
    let (n, d) = (ctx.n, ctx.d);
    output.create_group(group)?;
    output.create_dataset(
        group,
        "positions",
        Dataset::new(vec![n, d], conf.positions().to_vec())?,
    )?;
    output.create_dataset(
        group,
        "velocities",
        Dataset::new(vec![n, d], conf.velocities().to_vec())?,
    )?;
    let images = conf.images().iter().map(|i| *i as f64).collect();
    output.create_dataset(group, "images", Dataset::new(vec![n, d], images)?)?;
    let ptype = conf.ptype().iter().map(|t| *t as f64).collect();
    output.create_dataset(group, "ptype", Dataset::new(vec![n], ptype)?)?;
    output.create_dataset(group, "masses", Dataset::new(vec![n], conf.masses().to_vec())?)?;

    let names = integrator.diagnostic_names();
    if !names.is_empty() {
        output.create_group("integrator")?;
        output.create_dataset("integrator", "diagnostics", Dataset::blocks(&[names.len()]))?;
        let names = names.iter().map(|s| s.to_string()).collect();
        output.set_group_attr("integrator", "diagnostic_names", AttrValue::TextList(names))?;
    }
    Ok(())
}
