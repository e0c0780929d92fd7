//! Constant-potential-energy (NVU) dynamics.
//!
//! The system moves along geodesics of the constant-U hypersurface in
//! configuration space with a fixed step length `dl`. Each step:
//!
//! 1. reduce `F.V`, `F^2`, `V^2`, `U` and `lapU` over all particles;
//! 2. on the leader lane, reflect the direction in the tangent plane,
//!    `V+ = V - 2 (F.V)/F^2 F`, and choose a correction `c` along the force so
//!    that the second-order prediction of U after the step equals the target,
//!    using `lapU / (D N)` as the curvature along the step;
//! 3. move every particle by `g V+ - c F` with `g = dl / |V+|` and store the
//!    normalized direction as the velocity.
//!
//! Steps whose potential energy per particle deviates from the target by more
//! than the tolerance are counted; a long consecutive excursion raises a
//! drift warning.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, warn};

use crate::device::{AtomicF64, DeviceState};
use crate::error::{SimError, SimResult};
use crate::flags::ComputeFlags;
use crate::integrators::{Integrator, displace};
use crate::pipeline::{RunContext, StepInfo};
use crate::plan::Lane;
use crate::sim_box::MAX_DIM;

const FV: usize = 0;
const FF: usize = 1;
const VV: usize = 2;
const U: usize = 3;
const LAP: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NvuOptions {
    /// Target potential energy per particle; taken from the first step when `None`.
    pub u0: Option<f64>,
    /// Configuration-space step length.
    pub dl: f64,
    /// Allowed deviation of `U/N` from the target.
    pub tolerance: f64,
    /// Consecutive out-of-tolerance steps before a drift warning.
    pub max_excursion_steps: u64,
}

impl Default for NvuOptions {
    fn default() -> Self {
        Self {
            u0: None,
            dl: 0.03,
            tolerance: 1e-3,
            max_excursion_steps: 1000,
        }
    }
}

#[derive(Debug)]
pub struct Nvu {
    options: NvuOptions,
    n: usize,
    d: usize,
    sums: [AtomicF64; 5],
    reflect: AtomicF64,
    scale: AtomicF64,
    correct: AtomicF64,
    target: AtomicF64,
    deviation_max: AtomicF64,
    excursion: AtomicU64,
    steps_out: AtomicU64,
    warnings: AtomicU64,
    warnings_reported: u64,
    target_reported: bool,
}

impl Nvu {
    pub fn new(options: NvuOptions) -> SimResult<Self> {
        if !options.dl.is_finite() || options.dl <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "NVU step length must be positive and finite",
            });
        }
        if !options.tolerance.is_finite() || options.tolerance <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "NVU tolerance must be positive and finite",
            });
        }
        if options.u0.is_some_and(|u| !u.is_finite()) {
            return Err(SimError::InvalidArg {
                what: "NVU target energy must be finite",
            });
        }
        Ok(Self {
            options,
            n: 0,
            d: 0,
            sums: Default::default(),
            reflect: AtomicF64::new(0.0),
            scale: AtomicF64::new(0.0),
            correct: AtomicF64::new(0.0),
            target: AtomicF64::new(options.u0.unwrap_or(f64::NAN)),
            deviation_max: AtomicF64::new(0.0),
            excursion: AtomicU64::new(0),
            steps_out: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
            warnings_reported: 0,
            target_reported: options.u0.is_some(),
        })
    }

    /// Target potential energy per particle, once known.
    pub fn target(&self) -> Option<f64> {
        let u0 = self.target.load();
        (!u0.is_nan()).then_some(u0)
    }

    /// Whether the target was given rather than taken from the first step.
    pub fn target_supplied(&self) -> bool {
        self.options.u0.is_some()
    }

    pub fn drift_warnings(&self) -> u64 {
        self.warnings.load(Ordering::Relaxed)
    }

    fn reduce(&self, dev: &DeviceState, i: usize) {
        let d = dev.d;
        let mut fv = 0.0;
        let mut vv = 0.0;
        for k in 0..d {
            let v = dev.v.get(i, k);
            fv += dev.f.get(i, k) * v;
            vv += v * v;
        }
        self.sums[FV].fetch_add(fv);
        self.sums[VV].fetch_add(vv);
        if let Some(slot) = dev.layout.fsq {
            self.sums[FF].fetch_add(dev.scalars.get(i, slot));
        }
        if let Some(slot) = dev.layout.u {
            self.sums[U].fetch_add(dev.scalars.get(i, slot));
        }
        if let Some(slot) = dev.layout.lap_u {
            self.sums[LAP].fetch_add(dev.scalars.get(i, slot));
        }
    }

    fn solve(&self) {
        let n = self.n as f64;
        let [fv, ff, vv, u, lap] = [FV, FF, VV, U, LAP].map(|k| self.sums[k].load());
        for s in &self.sums {
            s.store(0.0);
        }

        let mut u0 = self.target.load();
        if u0.is_nan() {
            u0 = u / n;
            self.target.store(u0);
        }
        self.track_drift((u / n - u0).abs());

        const TINY: f64 = 1e-300;
        if ff <= TINY {
            // no force: straight line
            self.reflect.store(0.0);
            self.correct.store(0.0);
            self.scale.store(if vv > TINY { self.options.dl / vv.sqrt() } else { 0.0 });
            return;
        }
        // restart along the force when the direction is lost
        let a = if vv > TINY { -2.0 * fv / ff } else { 1.0 };
        let vplus_sq = vv + 2.0 * a * fv + a * a * ff;
        let fv_plus = fv + a * ff;
        let g = self.options.dl / vplus_sq.sqrt();
        let kappa = lap / (self.d as f64 * n);
        let dl = self.options.dl;
        let c = (n * u0 - u + g * fv_plus - 0.5 * kappa * dl * dl) / ff;

        self.reflect.store(a);
        self.scale.store(g);
        self.correct.store(c);
    }

    fn track_drift(&self, deviation: f64) {
        self.deviation_max.fetch_max(deviation);
        if deviation > self.options.tolerance {
            self.steps_out.fetch_add(1, Ordering::Relaxed);
            let run = self.excursion.fetch_add(1, Ordering::Relaxed) + 1;
            if run == self.options.max_excursion_steps {
                self.warnings.fetch_add(1, Ordering::Relaxed);
            }
        } else {
            self.excursion.store(0, Ordering::Relaxed);
        }
    }

    fn advance(&self, dev: &DeviceState, i: usize) {
        let d = dev.d;
        let a = self.reflect.load();
        let g = self.scale.load();
        let c = self.correct.load();
        let dl = self.options.dl;

        let mut v = [0.0; MAX_DIM];
        let mut dr = [0.0; MAX_DIM];
        let mut v_sq = 0.0;
        for k in 0..d {
            let f = dev.f.get(i, k);
            let step = g * (dev.v.get(i, k) + a * f);
            dr[k] = step - c * f;
            v[k] = step / dl;
            v_sq += v[k] * v[k];
        }
        dev.v.store_row(i, &v[..d]);
        if let Some(slot) = dev.layout.k {
            dev.scalars.set(i, slot, 0.5 * dev.mass(i) * v_sq);
        }
        displace(dev, i, &dr[..d]);
    }
}

impl Integrator for Nvu {
    fn name(&self) -> &'static str {
        "NVU"
    }

    fn dt(&self) -> f64 {
        self.options.dl
    }

    fn compute_flags(&self) -> ComputeFlags {
        ComputeFlags {
            u: true,
            lap_u: true,
            fsq: true,
            ..ComputeFlags::NONE
        }
    }

    fn setup(&mut self, ctx: &RunContext) -> SimResult<()> {
        self.n = ctx.n;
        self.d = ctx.d;
        if self.options.u0.is_none() {
            info!("NVU target energy not supplied, using U/N of the first step");
        }
        Ok(())
    }

    fn num_phases(&self) -> usize {
        3
    }

    fn phase(&self, phase: usize, dev: &DeviceState, _step: &StepInfo, lane: Lane) {
        match phase {
            0 if lane.is_primary() => self.reduce(dev, lane.particle),
            1 if lane.is_leader() => self.solve(),
            2 if lane.is_primary() => self.advance(dev, lane.particle),
            _ => {}
        }
    }

    fn diagnostic_names(&self) -> Vec<&'static str> {
        vec![
            "U_deviation_max",
            "steps_out_of_tolerance",
            "drift_warnings",
            "target_u",
            "target_supplied",
        ]
    }

    fn after_block(&mut self, block: usize) -> SimResult<Vec<f64>> {
        let warnings = self.warnings.load(Ordering::Relaxed);
        if warnings > self.warnings_reported {
            warn!(
                block,
                warnings,
                tolerance = self.options.tolerance,
                "NVU potential energy drifted out of tolerance for {} consecutive steps",
                self.options.max_excursion_steps
            );
            self.warnings_reported = warnings;
        }
        if !self.target_reported {
            if let Some(u0) = self.target() {
                info!(block, u0, "NVU target energy taken from the first step");
                self.target_reported = true;
            }
        }
        let out = vec![
            self.deviation_max.load(),
            self.steps_out.swap(0, Ordering::Relaxed) as f64,
            warnings as f64,
            self.target.load(),
            if self.target_supplied() { 1.0 } else { 0.0 },
        ];
        self.deviation_max.store(0.0);
        Ok(out)
    }
}
