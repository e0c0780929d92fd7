//! Nosé-Hoover thermostat.

use crate::device::{AtomicF64, DeviceState};
use crate::error::{SimError, SimResult};
use crate::flags::ComputeFlags;
use crate::integrators::{Integrator, TemperatureSchedule, check_dt, displace};
use crate::pipeline::{RunContext, StepInfo};
use crate::plan::Lane;
use crate::sim_box::MAX_DIM;

/// Leapfrog coupled to a Nosé-Hoover friction `zeta`.
///
/// Phase 0 updates every particle and accumulates `2K`; phase 1 advances
/// `zeta` toward the target temperature of the current time:
/// `zeta += dt / tau^2 * (T_kin / T(t) - 1)`, with `T_kin = 2K / (D (N - 1))`.
#[derive(Debug)]
pub struct Nvt {
    temperature: TemperatureSchedule,
    tau: f64,
    dt: f64,
    zeta: AtomicF64,
    twice_k: AtomicF64,
    dof: f64,
}

impl Nvt {
    pub fn new(temperature: impl Into<TemperatureSchedule>, tau: f64, dt: f64) -> SimResult<Self> {
        let temperature = temperature.into();
        temperature.validate()?;
        if !tau.is_finite() || tau <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "thermostat relaxation time must be positive and finite",
            });
        }
        Ok(Self {
            temperature,
            tau,
            dt: check_dt(dt)?,
            zeta: AtomicF64::new(0.0),
            twice_k: AtomicF64::new(0.0),
            dof: 0.0,
        })
    }

    /// Current thermostat friction.
    pub fn thermostat_state(&self) -> f64 {
        self.zeta.load()
    }

    fn update_particle(&self, dev: &DeviceState, i: usize) {
        let d = dev.d;
        let m = dev.mass(i);
        let half_friction = 0.5 * self.zeta.load() * self.dt;
        let plus = 1.0 / (1.0 + half_friction);
        let minus = 1.0 - half_friction;

        let mut v = [0.0; MAX_DIM];
        let mut dr = [0.0; MAX_DIM];
        dev.v.load_row(i, &mut v[..d]);
        let mut v_mean_sq = 0.0;
        for k in 0..d {
            let v_new = plus * (minus * v[k] + dev.f.get(i, k) / m * self.dt);
            let mean = 0.5 * (v[k] + v_new);
            v_mean_sq += mean * mean;
            v[k] = v_new;
            dr[k] = v_new * self.dt;
        }
        dev.v.store_row(i, &v[..d]);
        self.twice_k.fetch_add(m * v_mean_sq);
        if let Some(slot) = dev.layout.k {
            dev.scalars.set(i, slot, 0.5 * m * v_mean_sq);
        }
        displace(dev, i, &dr[..d]);
    }

    fn update_thermostat(&self, time: f64) {
        let t_kin = self.twice_k.load() / self.dof;
        let target = self.temperature.at(time);
        let zeta = self.zeta.load() + self.dt / (self.tau * self.tau) * (t_kin / target - 1.0);
        self.zeta.store(zeta);
        self.twice_k.store(0.0);
    }
}

impl Integrator for Nvt {
    fn name(&self) -> &'static str {
        "NVT"
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

    fn setup(&mut self, ctx: &RunContext) -> SimResult<()> {
        if ctx.n < 2 {
            return Err(SimError::config("NVT needs at least two particles"));
        }
        self.dof = (ctx.d * (ctx.n - 1)) as f64;
        Ok(())
    }

    fn num_phases(&self) -> usize {
        2
    }

    fn phase(&self, phase: usize, dev: &DeviceState, step: &StepInfo, lane: Lane) {
        match phase {
            0 if lane.is_primary() => self.update_particle(dev, lane.particle),
            1 if lane.is_leader() => self.update_thermostat(step.time),
            _ => {}
        }
    }

    fn diagnostic_names(&self) -> Vec<&'static str> {
        vec!["thermostat_state"]
    }

    fn after_block(&mut self, _block: usize) -> SimResult<Vec<f64>> {
        Ok(vec![self.zeta.load()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Configuration;
    use approx::assert_relative_eq;

    fn ctx(n: usize) -> RunContext {
        RunContext {
            n,
            d: 3,
            num_timeblocks: 1,
            steps_per_timeblock: 1,
            dt: 0.01,
            flags: ComputeFlags::standard(),
        }
    }

    #[test]
    fn hot_system_increases_friction() {
        let mut conf = Configuration::make_positions(32, 3, 1.0).unwrap();
        conf.randomize_velocities(2.0, 1).unwrap();
        let dev = DeviceState::upload(&conf, ComputeFlags::standard());
        let mut nvt = Nvt::new(1.0, 0.2, 0.01).unwrap();
        nvt.setup(&ctx(32)).unwrap();

        let step = StepInfo {
            block: 0,
            step: 0,
            global_step: 0,
            time: 0.0,
        };
        for particle in 0..32 {
            let lane = Lane {
                block: 0,
                particle,
                thread: 0,
                threads: 1,
            };
            nvt.phase(0, &dev, &step, lane);
        }
        let leader = Lane {
            block: 0,
            particle: 0,
            thread: 0,
            threads: 1,
        };
        nvt.phase(1, &dev, &step, leader);
        // forces are zero, so T_kin stays 2: zeta = dt/tau^2 * (2/1 - 1)
        assert_relative_eq!(nvt.thermostat_state(), 0.01 / 0.04, epsilon = 1e-9);
        assert_eq!(nvt.twice_k.load(), 0.0);
    }

    #[test]
    fn needs_two_particles() {
        let mut nvt = Nvt::new(1.0, 0.2, 0.01).unwrap();
        assert!(nvt.setup(&ctx(1)).is_err());
    }

    #[test]
    fn rejects_bad_tau() {
        assert!(Nvt::new(1.0, 0.0, 0.01).is_err());
    }
}
