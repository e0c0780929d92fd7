//! Periodic removal of center-of-mass motion.

use md_results::OutputStore;

use crate::actions::{RuntimeAction, check_cadence};
use crate::device::{AtomicF64, DeviceState};
use crate::error::SimResult;
use crate::pipeline::{RunContext, StepInfo};
use crate::plan::Lane;
use crate::sim_box::MAX_DIM;

/// Every `steps_between_reset` steps: zero the accumulator, sum momentum
/// and mass over all particles, then subtract the center-of-mass velocity
/// from every particle. Each stage is its own phase so the sums are complete
/// before they are read.
#[derive(Debug)]
pub struct MomentumReset {
    steps_between_reset: usize,
    // total momentum per axis, then total mass
    totals: [AtomicF64; MAX_DIM + 1],
}

impl MomentumReset {
    pub fn new(steps_between_reset: usize) -> Self {
        Self {
            steps_between_reset,
            totals: Default::default(),
        }
    }
}

impl RuntimeAction for MomentumReset {
    fn name(&self) -> &'static str {
        "momentum_reset"
    }

    fn setup(&mut self, ctx: &RunContext, _output: &mut dyn OutputStore) -> SimResult<()> {
        check_cadence("momentum_reset", self.steps_between_reset, ctx.steps_per_timeblock)?;
        Ok(())
    }

    fn post_step_phases(&self) -> usize {
        3
    }

    fn post_step(&self, phase: usize, dev: &DeviceState, step: &StepInfo, lane: Lane) {
        if step.step % self.steps_between_reset != 0 || !lane.is_primary() {
            return;
        }
        let d = dev.d;
        let i = lane.particle;
        match phase {
            0 => {
                if lane.is_leader() {
                    self.totals.iter().for_each(|t| t.store(0.0));
                }
            }
            1 => {
                let m = dev.mass(i);
                for k in 0..d {
                    self.totals[k].fetch_add(m * dev.v.get(i, k));
                }
                self.totals[MAX_DIM].fetch_add(m);
            }
            _ => {
                let total_mass = self.totals[MAX_DIM].load();
                for k in 0..d {
                    let v_cm = self.totals[k].load() / total_mass;
                    dev.v.set(i, k, dev.v.get(i, k) - v_cm);
                }
            }
        }
    }
}
