//! Host-side particle configuration.
//!
//! Positions, velocities, images, types and masses live here between runs.
//! The simulation uploads a configuration to device memory at setup and
//! downloads it again after every `run`.

use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::error::{SimError, SimResult};
use crate::flags::{ComputeFlags, ScalarLayout};
use crate::sim_box::SimBox;

/// Lattice unit cells for `Configuration::make_lattice`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitCell {
    /// Simple cubic, any dimension
    Sc,
    /// Body-centered cubic, any dimension
    Bcc,
    /// Face-centered cubic, three dimensions only
    Fcc,
}

impl UnitCell {
    /// Fractional coordinates of the sites in one cell.
    pub fn basis(self, d: usize) -> SimResult<Vec<Vec<f64>>> {
        match self {
            UnitCell::Sc => Ok(vec![vec![0.0; d]]),
            UnitCell::Bcc => Ok(vec![vec![0.0; d], vec![0.5; d]]),
            UnitCell::Fcc if d == 3 => Ok(vec![
                vec![0.0, 0.0, 0.0],
                vec![0.5, 0.5, 0.0],
                vec![0.5, 0.0, 0.5],
                vec![0.0, 0.5, 0.5],
            ]),
            UnitCell::Fcc => Err(SimError::config(format!(
                "fcc lattice requires three dimensions, got {d}"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Configuration {
    d: usize,
    sim_box: SimBox,
    positions: Vec<f64>,
    velocities: Vec<f64>,
    forces: Vec<f64>,
    images: Vec<i64>,
    ptype: Vec<usize>,
    masses: Vec<f64>,
    compute_flags: ComputeFlags,
    scalars: Option<(ScalarLayout, Vec<f64>)>,
}

impl Configuration {
    /// Particles at `positions` (row-major, N x D), wrapped into `sim_box`.
    ///
    /// Velocities start at zero, masses at one and every particle has type 0.
    pub fn new(sim_box: SimBox, positions: Vec<f64>) -> SimResult<Self> {
        let d = sim_box.d();
        if positions.is_empty() || positions.len() % d != 0 {
            return Err(SimError::config(format!(
                "position buffer of length {} is not a non-empty multiple of D = {d}",
                positions.len()
            )));
        }
        if positions.iter().any(|x| !x.is_finite()) {
            return Err(SimError::NonPhysical {
                what: "non-finite particle position",
            });
        }
        let n = positions.len() / d;
        let mut positions = positions;
        let mut images = vec![0; n * d];
        for (r, im) in positions.chunks_mut(d).zip(images.chunks_mut(d)) {
            sim_box.wrap(r, im);
        }
        Ok(Self {
            d,
            sim_box,
            positions,
            velocities: vec![0.0; n * d],
            forces: vec![0.0; n * d],
            images,
            ptype: vec![0; n],
            masses: vec![1.0; n],
            compute_flags: ComputeFlags::standard(),
            scalars: None,
        })
    }

    /// Perfect lattice of `cells[k]` unit cells along axis k at number density `density`.
    pub fn make_lattice(cell: UnitCell, cells: &[usize], density: f64) -> SimResult<Self> {
        let d = cells.len();
        if cells.contains(&0) {
            return Err(SimError::InvalidArg {
                what: "lattice needs at least one cell per axis",
            });
        }
        if !density.is_finite() || density <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "density must be positive and finite",
            });
        }
        let basis = cell.basis(d)?;
        let num_cells: usize = cells.iter().product();
        let spacing = (basis.len() as f64 / density).powf(1.0 / d as f64);
        let lengths: Vec<f64> = cells.iter().map(|c| *c as f64 * spacing).collect();
        let sim_box = SimBox::new(lengths.clone())?;

        let mut positions = Vec::with_capacity(num_cells * basis.len() * d);
        let mut index = vec![0usize; d];
        for _ in 0..num_cells {
            for site in &basis {
                for k in 0..d {
                    positions.push((index[k] as f64 + site[k]) * spacing - 0.5 * lengths[k]);
                }
            }
            advance_index(&mut index, cells);
        }
        Self::new(sim_box, positions)
    }

    /// `n` particles on a lattice filling a cubic box at number density `density`.
    ///
    /// Uses fcc in three dimensions and simple cubic otherwise; when `n` does not
    /// fill the lattice the last sites are left empty.
    pub fn make_positions(n: usize, d: usize, density: f64) -> SimResult<Self> {
        if n == 0 {
            return Err(SimError::InvalidArg {
                what: "need at least one particle",
            });
        }
        if !density.is_finite() || density <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "density must be positive and finite",
            });
        }
        let cell = if d == 3 { UnitCell::Fcc } else { UnitCell::Sc };
        let basis = cell.basis(d)?;
        let mut per_side = 1usize;
        while per_side.pow(d as u32) * basis.len() < n {
            per_side += 1;
        }
        let length = (n as f64 / density).powf(1.0 / d as f64);
        let sim_box = SimBox::cubic(d, length)?;
        let spacing = length / per_side as f64;

        let cells = vec![per_side; d];
        let mut positions = Vec::with_capacity(n * d);
        let mut index = vec![0usize; d];
        'fill: loop {
            for site in &basis {
                if positions.len() == n * d {
                    break 'fill;
                }
                for k in 0..d {
                    positions.push((index[k] as f64 + site[k]) * spacing - 0.5 * length);
                }
            }
            advance_index(&mut index, &cells);
        }
        Self::new(sim_box, positions)
    }

    pub fn with_compute_flags(mut self, flags: ComputeFlags) -> Self {
        self.compute_flags = flags;
        self
    }

    pub fn n(&self) -> usize {
        self.ptype.len()
    }

    pub fn d(&self) -> usize {
        self.d
    }

    pub fn sim_box(&self) -> &SimBox {
        &self.sim_box
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn velocities(&self) -> &[f64] {
        &self.velocities
    }

    /// Forces from the last evaluated step, zero before any run.
    pub fn forces(&self) -> &[f64] {
        &self.forces
    }

    pub fn images(&self) -> &[i64] {
        &self.images
    }

    pub fn ptype(&self) -> &[usize] {
        &self.ptype
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn compute_flags(&self) -> ComputeFlags {
        self.compute_flags
    }

    pub fn num_types(&self) -> usize {
        self.ptype.iter().max().map_or(0, |t| t + 1)
    }

    /// Positions with periodic images undone.
    pub fn unwrapped_positions(&self) -> Vec<f64> {
        let lengths = self.sim_box.lengths();
        self.positions
            .iter()
            .zip(&self.images)
            .enumerate()
            .map(|(idx, (r, im))| r + *im as f64 * lengths[idx % self.d])
            .collect()
    }

    /// Per-particle values of a computed scalar (`"U"`, `"W"`, `"K"`, ...)
    /// as of the last download.
    pub fn scalar(&self, name: &str) -> Option<Vec<f64>> {
        let (layout, values) = self.scalars.as_ref()?;
        let slot = layout.index_of(name)?;
        let width = layout.len();
        Some(values.chunks(width).map(|row| row[slot]).collect())
    }

    pub fn set_masses(&mut self, mass: f64) -> SimResult<()> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "mass must be positive and finite",
            });
        }
        self.masses.fill(mass);
        Ok(())
    }

    pub fn set_mass(&mut self, i: usize, mass: f64) -> SimResult<()> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "mass must be positive and finite",
            });
        }
        let slot = self.masses.get_mut(i).ok_or(SimError::InvalidArg {
            what: "particle index out of range",
        })?;
        *slot = mass;
        Ok(())
    }

    pub fn set_ptype(&mut self, i: usize, ptype: usize) -> SimResult<()> {
        let slot = self.ptype.get_mut(i).ok_or(SimError::InvalidArg {
            what: "particle index out of range",
        })?;
        *slot = ptype;
        Ok(())
    }

    pub fn set_ptypes(&mut self, ptype: Vec<usize>) -> SimResult<()> {
        if ptype.len() != self.n() {
            return Err(SimError::InvalidArg {
                what: "type vector length must equal the particle count",
            });
        }
        self.ptype = ptype;
        Ok(())
    }

    pub fn set_velocities(&mut self, velocities: Vec<f64>) -> SimResult<()> {
        if velocities.len() != self.velocities.len() {
            return Err(SimError::InvalidArg {
                what: "velocity buffer must be N x D",
            });
        }
        if velocities.iter().any(|v| !v.is_finite()) {
            return Err(SimError::NonPhysical {
                what: "non-finite velocity",
            });
        }
        self.velocities = velocities;
        Ok(())
    }

    /// Draw Maxwell-Boltzmann velocities at `temperature`, remove the
    /// center-of-mass motion and rescale to the exact kinetic temperature.
    pub fn randomize_velocities(&mut self, temperature: f64, seed: u64) -> SimResult<()> {
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(SimError::InvalidArg {
                what: "temperature must be non-negative and finite",
            });
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let d = self.d;
        for (i, v) in self.velocities.chunks_mut(d).enumerate() {
            let normal = Normal::new(0.0, (temperature / self.masses[i]).sqrt()).map_err(|_| {
                SimError::InvalidArg {
                    what: "invalid velocity distribution",
                }
            })?;
            for x in v.iter_mut() {
                *x = normal.sample(&mut rng);
            }
        }
        self.remove_drift();

        let current = self.kinetic_temperature();
        if current > 0.0 {
            let scale = (temperature / current).sqrt();
            self.velocities.iter_mut().for_each(|v| *v *= scale);
        }
        Ok(())
    }

    /// Subtract the center-of-mass velocity.
    pub fn remove_drift(&mut self) {
        let total_mass: f64 = self.masses.iter().sum();
        let v_cm = self.total_momentum() / total_mass;
        for v in self.velocities.chunks_mut(self.d) {
            for (x, c) in v.iter_mut().zip(v_cm.iter()) {
                *x -= c;
            }
        }
    }

    pub fn total_momentum(&self) -> DVector<f64> {
        let v = DMatrix::from_row_slice(self.n(), self.d, &self.velocities);
        let m = DVector::from_column_slice(&self.masses);
        v.transpose() * m
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.velocities
            .chunks(self.d)
            .zip(&self.masses)
            .map(|(v, m)| 0.5 * m * v.iter().map(|x| x * x).sum::<f64>())
            .sum()
    }

    /// `2K / (D (N - 1))`: momentum conservation removes D degrees of freedom.
    pub fn kinetic_temperature(&self) -> f64 {
        let dof = (self.d * self.n().saturating_sub(1)) as f64;
        if dof == 0.0 {
            return 0.0;
        }
        2.0 * self.kinetic_energy() / dof
    }

    /// Sum of downloaded per-particle scalar `name`.
    pub fn total(&self, name: &str) -> Option<f64> {
        self.scalar(name).map(|values| values.iter().sum())
    }

    pub(crate) fn store_state(
        &mut self,
        positions: Vec<f64>,
        velocities: Vec<f64>,
        forces: Vec<f64>,
        images: Vec<i64>,
        scalars: (ScalarLayout, Vec<f64>),
    ) {
        self.positions = positions;
        self.velocities = velocities;
        self.forces = forces;
        self.images = images;
        self.scalars = Some(scalars);
    }
}

fn advance_index(index: &mut [usize], bounds: &[usize]) {
    for (k, bound) in bounds.iter().enumerate() {
        index[k] += 1;
        if index[k] < *bound {
            return;
        }
        index[k] = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fcc_lattice_has_requested_density() {
        let c = Configuration::make_lattice(UnitCell::Fcc, &[4, 4, 4], 0.8).unwrap();
        assert_eq!(c.n(), 256);
        assert_eq!(c.d(), 3);
        assert_relative_eq!(c.n() as f64 / c.sim_box().volume(), 0.8, epsilon = 1e-12);
        let half = 0.5 * c.sim_box().lengths()[0];
        assert!(c.positions().iter().all(|x| *x >= -half && *x < half));
    }

    #[test]
    fn fcc_requires_three_dimensions() {
        assert!(matches!(
            Configuration::make_lattice(UnitCell::Fcc, &[4, 4], 1.0),
            Err(SimError::Config { .. })
        ));
    }

    #[test]
    fn make_positions_truncates_lattice() {
        let c = Configuration::make_positions(100, 2, 0.5).unwrap();
        assert_eq!(c.n(), 100);
        assert_relative_eq!(c.sim_box().volume(), 200.0, epsilon = 1e-9);
    }

    #[test]
    fn randomized_velocities_have_exact_temperature() {
        let mut c = Configuration::make_lattice(UnitCell::Bcc, &[5, 5, 5], 1.0).unwrap();
        c.randomize_velocities(1.5, 7).unwrap();
        assert_relative_eq!(c.kinetic_temperature(), 1.5, epsilon = 1e-10);
        assert!(c.total_momentum().norm() < 1e-9);
    }

    #[test]
    fn randomization_is_seeded() {
        let mut a = Configuration::make_positions(50, 3, 1.0).unwrap();
        let mut b = a.clone();
        a.randomize_velocities(1.0, 42).unwrap();
        b.randomize_velocities(1.0, 42).unwrap();
        assert_eq!(a.velocities(), b.velocities());
    }

    #[test]
    fn unwrapped_positions_apply_images() {
        let sim_box = SimBox::cubic(1, 4.0).unwrap();
        let c = Configuration::new(sim_box, vec![5.0, -1.0]).unwrap();
        assert_eq!(c.images(), &[1, 0]);
        assert_relative_eq!(c.positions()[0], 1.0);
        assert_relative_eq!(c.unwrapped_positions()[0], 5.0);
    }

    #[test]
    fn per_particle_setters_check_bounds() {
        let mut c = Configuration::make_positions(4, 2, 1.0).unwrap();
        c.set_ptype(3, 1).unwrap();
        assert_eq!(c.num_types(), 2);
        assert!(c.set_ptype(4, 0).is_err());
        assert!(c.set_mass(0, -1.0).is_err());
    }
}
