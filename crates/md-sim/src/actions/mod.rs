//! Runtime actions: pluggable per-step work with optional output.
//!
//! An action may contribute phases before the force evaluation (`pre_step`)
//! and after the integrator (`post_step`). Its host hooks run once per
//! timeblock: `before_block` prepares device buffers, `after_block` flushes
//! them into the output store under the action's own group.

mod momentum_reset;
mod scalar_saver;
mod trajectory_saver;

pub use momentum_reset::MomentumReset;
pub use scalar_saver::{ExtractOptions, ScalarSaver, extract_scalars};
pub use trajectory_saver::{TrajectorySaver, TrajectorySchedule};

use md_results::OutputStore;

use crate::device::DeviceState;
use crate::error::{SimError, SimResult};
use crate::flags::ComputeFlags;
use crate::pipeline::{RunContext, StepInfo};
use crate::plan::Lane;

pub trait RuntimeAction: Send + Sync {
    fn name(&self) -> &'static str;

    /// Output group written by this action, if any. Must be unique per run.
    fn output_group(&self) -> Option<&'static str> {
        None
    }

    fn compute_flags(&self) -> ComputeFlags {
        ComputeFlags::NONE
    }

    /// Validate the schedule against the run and create output groups.
    fn setup(&mut self, ctx: &RunContext, output: &mut dyn OutputStore) -> SimResult<()>;

    fn pre_step_phases(&self) -> usize {
        0
    }

    fn pre_step(&self, _phase: usize, _dev: &DeviceState, _step: &StepInfo, _lane: Lane) {}

    fn post_step_phases(&self) -> usize {
        0
    }

    fn post_step(&self, _phase: usize, _dev: &DeviceState, _step: &StepInfo, _lane: Lane) {}

    fn before_block(&mut self, _block: usize) -> SimResult<()> {
        Ok(())
    }

    fn after_block(&mut self, _block: usize, _output: &mut dyn OutputStore) -> SimResult<()> {
        Ok(())
    }
}

/// Check an output cadence of every `k` steps against the timeblock length.
pub(crate) fn check_cadence(what: &str, k: usize, steps_per_timeblock: usize) -> SimResult<usize> {
    if k == 0 {
        return Err(SimError::config(format!("{what}: steps between outputs must be positive")));
    }
    if k > steps_per_timeblock {
        return Err(SimError::config(format!(
            "{what}: {k} steps between outputs exceeds the {steps_per_timeblock} steps per timeblock"
        )));
    }
    Ok(steps_per_timeblock / k)
}
