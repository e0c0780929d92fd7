//! Constant-energy leapfrog.

use crate::device::DeviceState;
use crate::error::SimResult;
use crate::flags::ComputeFlags;
use crate::integrators::{Integrator, check_dt, displace};
use crate::pipeline::StepInfo;
use crate::plan::Lane;
use crate::sim_box::MAX_DIM;

/// Leapfrog: velocities are stored at half steps, `v(t + dt/2)`.
///
/// Kinetic energy is reported at integer steps from the mean of the two
/// half-step velocities.
#[derive(Clone, Debug)]
pub struct Nve {
    dt: f64,
}

impl Nve {
    pub fn new(dt: f64) -> SimResult<Self> {
        Ok(Self { dt: check_dt(dt)? })
    }
}

impl Integrator for Nve {
    fn name(&self) -> &'static str {
        "NVE"
    }

    fn dt(&self) -> f64 {
        self.dt
    }

    fn compute_flags(&self) -> ComputeFlags {
        ComputeFlags {
            k: true,
            ..ComputeFlags::NONE
        }
    }

    fn phase(&self, _phase: usize, dev: &DeviceState, _step: &StepInfo, lane: Lane) {
        if !lane.is_primary() {
            return;
        }
        let i = lane.particle;
        let d = dev.d;
        let m = dev.mass(i);
        let mut v = [0.0; MAX_DIM];
        let mut dr = [0.0; MAX_DIM];
        dev.v.load_row(i, &mut v[..d]);

        let mut v_mean_sq = 0.0;
        for k in 0..d {
            let v_new = v[k] + dev.f.get(i, k) / m * self.dt;
            let mean = 0.5 * (v[k] + v_new);
            v_mean_sq += mean * mean;
            v[k] = v_new;
            dr[k] = v_new * self.dt;
        }
        dev.v.store_row(i, &v[..d]);
        if let Some(slot) = dev.layout.k {
            dev.scalars.set(i, slot, 0.5 * m * v_mean_sq);
        }
        displace(dev, i, &dr[..d]);
    }
}
