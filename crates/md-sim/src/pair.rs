//! Pair potential descriptor and the force kernel.

use md_potentials::{PairFunction, PairParams};

use crate::device::DeviceState;
use crate::error::{SimError, SimResult};
use crate::flags::ComputeFlags;
use crate::neighbor::NeighborList;
use crate::plan::Lane;
use crate::sim_box::MAX_DIM;

/// Neighbor skin used unless overridden.
pub const DEFAULT_SKIN: f64 = 0.5;

/// A pair function with its per-type parameters and neighbor-list sizing.
#[derive(Clone, Debug)]
pub struct PairPotential<F: PairFunction> {
    func: F,
    params: PairParams,
    max_num_nbs: usize,
    skin: f64,
    max_cutoff: f64,
}

impl<F: PairFunction> PairPotential<F> {
    /// Validates the parameter vectors against `func` and requires a cutoff
    /// for every type pair.
    pub fn new(func: F, params: PairParams, max_num_nbs: usize) -> SimResult<Self> {
        params.validate_for(&func)?;
        let max_cutoff = params.max_cutoff_for(&func)?;
        if max_num_nbs == 0 {
            return Err(SimError::InvalidArg {
                what: "max_num_nbs must be positive",
            });
        }
        Ok(Self {
            func,
            params,
            max_num_nbs,
            skin: DEFAULT_SKIN,
            max_cutoff,
        })
    }

    pub fn with_skin(mut self, skin: f64) -> SimResult<Self> {
        if !skin.is_finite() || skin < 0.0 {
            return Err(SimError::InvalidArg {
                what: "neighbor skin must be non-negative and finite",
            });
        }
        self.skin = skin;
        Ok(self)
    }

    pub fn func(&self) -> &F {
        &self.func
    }

    pub fn params(&self) -> &PairParams {
        &self.params
    }

    pub fn max_num_nbs(&self) -> usize {
        self.max_num_nbs
    }

    pub fn skin(&self) -> f64 {
        self.skin
    }

    pub fn max_cutoff(&self) -> f64 {
        self.max_cutoff
    }

    /// Distance within which pairs enter the neighbor list.
    pub fn neighbor_range(&self) -> f64 {
        self.max_cutoff + self.skin
    }

    pub fn name(&self) -> String {
        self.func.name()
    }
}

/// Force kernel specialized for one combination of accumulated quantities.
pub type PairKernel<F> = fn(&PairPotential<F>, &NeighborList, &DeviceState, Lane);

/// Pick the kernel variant for `flags`; done once at setup.
pub fn select_kernel<F: PairFunction>(flags: ComputeFlags) -> PairKernel<F> {
    if flags.u {
        select_w::<F, true>(flags)
    } else {
        select_w::<F, false>(flags)
    }
}

fn select_w<F: PairFunction, const U: bool>(flags: ComputeFlags) -> PairKernel<F> {
    if flags.w {
        select_lap::<F, U, true>(flags)
    } else {
        select_lap::<F, U, false>(flags)
    }
}

fn select_lap<F: PairFunction, const U: bool, const W: bool>(flags: ComputeFlags) -> PairKernel<F> {
    match (flags.lap_u, flags.stresses) {
        (false, false) => pair_kernel::<F, U, W, false, false>,
        (false, true) => pair_kernel::<F, U, W, false, true>,
        (true, false) => pair_kernel::<F, U, W, true, false>,
        (true, true) => pair_kernel::<F, U, W, true, true>,
    }
}

/// Lane `t` of particle i handles neighbors `t, t + tp, ...`; each lane adds
/// its partial sums into particle i's slots.
///
/// Per pair at separation `r_ij = r_i - r_j`:
/// `f_i += s r_ij`, `U_i += u/2`, `W_i += s r^2 / (2D)`,
/// `lapU_i += u'' - (D-1) s`, `sx_i[k] -= r_ij[0] s r_ij[k] / 2`.
fn pair_kernel<
    F: PairFunction,
    const U: bool,
    const W: bool,
    const LAP: bool,
    const STRESS: bool,
>(
    pot: &PairPotential<F>,
    nbl: &NeighborList,
    dev: &DeviceState,
    lane: Lane,
) {
    let i = lane.particle;
    let d = dev.d;
    let tp = lane.threads;
    let ti = dev.ptype[i];

    let mut ri = [0.0; MAX_DIM];
    let mut rj = [0.0; MAX_DIM];
    let mut dr = [0.0; MAX_DIM];
    let mut fi = [0.0; MAX_DIM];
    let mut sxi = [0.0; MAX_DIM];
    let (mut u_sum, mut w_sum, mut lap_sum) = (0.0, 0.0, 0.0);
    dev.r.load_row(i, &mut ri[..d]);

    let (count, row) = nbl.neighbors(i);
    let mut k = lane.thread;
    while k < count {
        let j = row[k].load(std::sync::atomic::Ordering::Relaxed);
        dev.r.load_row(j, &mut rj[..d]);
        let r2 = dev.sim_box.separation(&ri[..d], &rj[..d], &mut dr[..d]);
        let terms = pot.func.eval(r2.sqrt(), pot.params.get(ti, dev.ptype[j]));
        for a in 0..d {
            fi[a] += terms.s * dr[a];
        }
        if U {
            u_sum += 0.5 * terms.u;
        }
        if W {
            w_sum += terms.s * r2;
        }
        if LAP {
            lap_sum += terms.d2u - (d - 1) as f64 * terms.s;
        }
        if STRESS {
            for a in 0..d {
                sxi[a] -= 0.5 * dr[0] * terms.s * dr[a];
            }
        }
        k += tp;
    }

    for a in 0..d {
        dev.f.add(i, a, fi[a]);
    }
    if U {
        if let Some(slot) = dev.layout.u {
            dev.scalars.add(i, slot, u_sum);
        }
    }
    if W {
        if let Some(slot) = dev.layout.w {
            dev.scalars.add(i, slot, w_sum / (2 * d) as f64);
        }
    }
    if LAP {
        if let Some(slot) = dev.layout.lap_u {
            dev.scalars.add(i, slot, lap_sum);
        }
    }
    if STRESS {
        if let Some(sx) = &dev.sx {
            for a in 0..d {
                sx.add(i, a, sxi[a]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Configuration;
    use crate::sim_box::SimBox;
    use approx::assert_relative_eq;
    use md_potentials::{LennardJones, ShiftedPotential, Yukawa};

    fn lj() -> PairPotential<ShiftedPotential<LennardJones>> {
        let params = PairParams::uniform(vec![1.0, 1.0, 2.5]).unwrap();
        PairPotential::new(ShiftedPotential::new(LennardJones), params, 160).unwrap()
    }

    fn evaluate(conf: &Configuration, flags: ComputeFlags, tp: usize) -> DeviceState {
        let pot = lj();
        let dev = DeviceState::upload(conf, flags);
        let nbl = NeighborList::new(
            conf.n(),
            conf.d(),
            pot.max_num_nbs(),
            pot.neighbor_range(),
            pot.skin(),
        )
        .unwrap();
        for i in 0..conf.n() {
            nbl.rebuild_particle(&dev, i);
            dev.clear_accumulators(i);
        }
        let kernel = select_kernel::<ShiftedPotential<LennardJones>>(flags);
        for particle in 0..conf.n() {
            for thread in 0..tp {
                kernel(
                    &pot,
                    &nbl,
                    &dev,
                    Lane {
                        block: 0,
                        particle,
                        thread,
                        threads: tp,
                    },
                );
            }
        }
        dev
    }

    fn dimer(r: f64) -> Configuration {
        let sim_box = SimBox::cubic(3, 10.0).unwrap();
        Configuration::new(sim_box, vec![0.0, 0.0, 0.0, r, 0.0, 0.0]).unwrap()
    }

    #[test]
    fn requires_cutoff() {
        let params = PairParams::uniform(vec![1.0, 1.0]).unwrap();
        assert!(matches!(
            PairPotential::new(Yukawa, params, 16),
            Err(SimError::Potential(_))
        ));
    }

    #[test]
    fn rejects_wrong_parameter_count() {
        let params = PairParams::uniform(vec![1.0, 2.5]).unwrap();
        assert!(PairPotential::new(ShiftedPotential::new(LennardJones), params, 16).is_err());
    }

    #[test]
    fn dimer_forces_are_opposite() {
        let flags = ComputeFlags {
            lap_u: true,
            stresses: true,
            ..ComputeFlags::standard()
        };
        let dev = evaluate(&dimer(1.2), flags, 1);
        let pot = lj();
        let terms = pot.func().eval(1.2, &[1.0, 1.0, 2.5]);

        assert_relative_eq!(dev.f.get(0, 0), -terms.s * 1.2, epsilon = 1e-12);
        assert_relative_eq!(dev.f.get(1, 0), terms.s * 1.2, epsilon = 1e-12);
        let u_total = dev.total(dev.layout.u.unwrap());
        assert_relative_eq!(u_total, terms.u, epsilon = 1e-12);
        let w_total = dev.total(dev.layout.w.unwrap());
        assert_relative_eq!(w_total, terms.s * 1.44 / 3.0, epsilon = 1e-12);
        let lap_total = dev.total(dev.layout.lap_u.unwrap());
        assert_relative_eq!(lap_total, 2.0 * (terms.d2u - 2.0 * terms.s), epsilon = 1e-12);
        let sx = dev.sx.as_ref().unwrap();
        assert_relative_eq!(sx.get(0, 0) + sx.get(1, 0), -1.44 * terms.s, epsilon = 1e-12);
    }

    #[test]
    fn threads_per_particle_do_not_change_forces() {
        let lattice = Configuration::make_positions(256, 3, 0.9).unwrap();
        let jittered: Vec<f64> = lattice
            .positions()
            .iter()
            .enumerate()
            .map(|(k, x)| x + 0.05 * (k as f64 * 0.7).sin())
            .collect();
        let conf = Configuration::new(lattice.sim_box().clone(), jittered).unwrap();
        let one = evaluate(&conf, ComputeFlags::standard(), 1).f.to_host();
        let four = evaluate(&conf, ComputeFlags::standard(), 4).f.to_host();
        for (a, b) in one.iter().zip(&four) {
            assert_relative_eq!(a, b, epsilon = 1e-10);
        }
        let sum: f64 = one.iter().step_by(3).sum();
        assert!(sum.abs() < 1e-9);
        assert!(one.iter().any(|f| f.abs() > 1e-3));
    }

    #[test]
    fn beyond_cutoff_contributes_nothing() {
        let dev = evaluate(&dimer(2.7), ComputeFlags::standard(), 1);
        assert_eq!(dev.f.get(0, 0), 0.0);
        assert_eq!(dev.total(dev.layout.u.unwrap()), 0.0);
    }
}
