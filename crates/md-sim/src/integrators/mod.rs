//! Integrators: how positions and velocities advance each step.
//!
//! An integrator contributes one or more barrier-separated phases to the
//! step pipeline, after the force evaluation. Per-particle work runs on the
//! primary lane of each particle; system-wide reductions that need a
//! finished sum run on the leader lane in a later phase.

mod nve;
mod nvt;
mod nvu;
mod schedule;

pub use nve::Nve;
pub use nvt::Nvt;
pub use nvu::{Nvu, NvuOptions};
pub use schedule::{TemperatureSchedule, make_function_ramp};

use crate::device::DeviceState;
use crate::error::SimResult;
use crate::flags::ComputeFlags;
use crate::pipeline::{RunContext, StepInfo};
use crate::plan::Lane;
use crate::sim_box::MAX_DIM;

pub trait Integrator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Increment per step; elapsed time is `global_step * dt`.
    fn dt(&self) -> f64;

    fn compute_flags(&self) -> ComputeFlags {
        ComputeFlags::NONE
    }

    fn setup(&mut self, _ctx: &RunContext) -> SimResult<()> {
        Ok(())
    }

    fn num_phases(&self) -> usize {
        1
    }

    fn phase(&self, phase: usize, dev: &DeviceState, step: &StepInfo, lane: Lane);

    /// Names of the per-block diagnostics, empty when none are recorded.
    fn diagnostic_names(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Diagnostics for the block that just finished, in `diagnostic_names` order.
    ///
    /// Called once per timeblock; implementations may reset per-block state.
    fn after_block(&mut self, _block: usize) -> SimResult<Vec<f64>> {
        Ok(Vec::new())
    }
}

/// Position update shared by the integrators: `r += dr`, wrapped into the box.
#[inline]
pub(crate) fn displace(dev: &DeviceState, i: usize, dr: &[f64]) {
    let d = dev.d;
    let mut r = [0.0; MAX_DIM];
    let mut im = [0i64; MAX_DIM];
    dev.r.load_row(i, &mut r[..d]);
    dev.r_im.load_row(i, &mut im[..d]);
    for k in 0..d {
        r[k] += dr[k];
    }
    dev.sim_box.wrap(&mut r[..d], &mut im[..d]);
    dev.r.store_row(i, &r[..d]);
    dev.r_im.store_row(i, &im[..d]);
}

pub(crate) fn check_dt(dt: f64) -> SimResult<f64> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(crate::error::SimError::InvalidArg {
            what: "time step must be positive and finite",
        });
    }
    Ok(dt)
}
