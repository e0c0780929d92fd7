//! Phase pipeline and its two launch modes.
//!
//! A step is an ordered list of phases. Between phases every lane of every
//! block must be finished. In fused mode one launch runs all phases of a step
//! with a grid-wide barrier between them; otherwise each phase is a separate
//! launch and the launch boundary is the barrier.

use std::sync::Barrier;

use rayon::prelude::*;

use crate::flags::ComputeFlags;
use crate::plan::{ExecutionPlan, Lane};

/// Position of the current step within the run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepInfo {
    /// Global index of the running timeblock.
    pub block: usize,
    /// Step within the timeblock.
    pub step: usize,
    /// Steps taken since the simulation was constructed.
    pub global_step: u64,
    /// Elapsed simulation time at the start of the step.
    pub time: f64,
}

/// Fixed facts about a run, handed to integrators and actions at setup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunContext {
    pub n: usize,
    pub d: usize,
    pub num_timeblocks: usize,
    pub steps_per_timeblock: usize,
    /// Integrator step size.
    pub dt: f64,
    /// Resolved union of all requested compute flags.
    pub flags: ComputeFlags,
}

pub type PhaseFn<'a> = Box<dyn Fn(&StepInfo, Lane) + Send + Sync + 'a>;

pub struct Pipeline<'a> {
    plan: ExecutionPlan,
    n: usize,
    phases: Vec<(&'static str, PhaseFn<'a>)>,
}

impl<'a> Pipeline<'a> {
    pub fn new(plan: ExecutionPlan, n: usize) -> Self {
        Self {
            plan,
            n,
            phases: Vec::new(),
        }
    }

    pub fn push(&mut self, name: &'static str, phase: impl Fn(&StepInfo, Lane) + Send + Sync + 'a) {
        self.phases.push((name, Box::new(phase)));
    }

    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|(name, _)| *name).collect()
    }

    pub fn run_step(&self, info: &StepInfo) {
        if self.plan.gridsync {
            self.run_fused(info);
        } else {
            self.run_unfused(info);
        }
    }

    fn run_block(&self, phase: &PhaseFn<'a>, block: usize, info: &StepInfo) {
        for lane in self.plan.lanes(block, self.n) {
            phase(info, lane);
        }
    }

    /// One thread per block, all phases, barrier-separated.
    fn run_fused(&self, info: &StepInfo) {
        let num_blocks = self.plan.num_blocks(self.n);
        let barrier = Barrier::new(num_blocks);
        std::thread::scope(|s| {
            for block in 0..num_blocks {
                let barrier = &barrier;
                s.spawn(move || {
                    for (idx, (_, phase)) in self.phases.iter().enumerate() {
                        if idx > 0 {
                            barrier.wait();
                        }
                        self.run_block(phase, block, info);
                    }
                });
            }
        });
    }

    /// One parallel launch per phase.
    fn run_unfused(&self, info: &StepInfo) {
        let num_blocks = self.plan.num_blocks(self.n);
        for (_, phase) in &self.phases {
            (0..num_blocks)
                .into_par_iter()
                .for_each(|block| self.run_block(phase, block, info));
        }
    }
}
