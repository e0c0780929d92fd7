//! Device-resident state.
//!
//! Every buffer is a flat array of atomic cells so that phases running on
//! many lanes at once can share it without locks. Plain loads and stores use
//! relaxed ordering; phase barriers provide the happens-before edges.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::configuration::Configuration;
use crate::flags::{ComputeFlags, ScalarLayout};
use crate::sim_box::SimBox;

/// `f64` with atomic load, store and add.
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Atomically add `delta`, returning the previous value.
    #[inline]
    pub fn fetch_add(&self, delta: f64) -> f64 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(prev) => return f64::from_bits(prev),
                Err(actual) => current = actual,
            }
        }
    }

    /// Atomically raise the value to at least `value`.
    #[inline]
    pub fn fetch_max(&self, value: f64) -> f64 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let prev = f64::from_bits(current);
            if prev >= value {
                return prev;
            }
            match self.0.compare_exchange_weak(
                current,
                value.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return prev,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Row-major `rows x cols` table of atomic floats.
#[derive(Debug)]
pub struct DeviceBuffer {
    cells: Vec<AtomicF64>,
    cols: usize,
}

impl DeviceBuffer {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            cells: (0..rows * cols).map(|_| AtomicF64::default()).collect(),
            cols,
        }
    }

    pub fn from_host(values: &[f64], cols: usize) -> Self {
        Self {
            cells: values.iter().map(|v| AtomicF64::new(*v)).collect(),
            cols,
        }
    }

    pub fn rows(&self) -> usize {
        if self.cols == 0 {
            0
        } else {
            self.cells.len() / self.cols
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn cell(&self, row: usize, col: usize) -> &AtomicF64 {
        &self.cells[row * self.cols + col]
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.cell(row, col).load()
    }

    #[inline]
    pub fn set(&self, row: usize, col: usize, value: f64) {
        self.cell(row, col).store(value);
    }

    #[inline]
    pub fn add(&self, row: usize, col: usize, value: f64) {
        self.cell(row, col).fetch_add(value);
    }

    #[inline]
    pub fn load_row(&self, row: usize, out: &mut [f64]) {
        let start = row * self.cols;
        for (o, c) in out.iter_mut().zip(&self.cells[start..start + self.cols]) {
            *o = c.load();
        }
    }

    #[inline]
    pub fn store_row(&self, row: usize, values: &[f64]) {
        let start = row * self.cols;
        for (c, v) in self.cells[start..start + self.cols].iter().zip(values) {
            c.store(*v);
        }
    }

    pub fn fill(&self, value: f64) {
        self.cells.iter().for_each(|c| c.store(value));
    }

    pub fn to_host(&self) -> Vec<f64> {
        self.cells.iter().map(AtomicF64::load).collect()
    }
}

/// Row-major table of atomic image counters.
#[derive(Debug)]
pub struct ImageBuffer {
    cells: Vec<AtomicI64>,
    cols: usize,
}

impl ImageBuffer {
    pub fn from_host(values: &[i64], cols: usize) -> Self {
        Self {
            cells: values.iter().map(|v| AtomicI64::new(*v)).collect(),
            cols,
        }
    }

    #[inline]
    pub fn load_row(&self, row: usize, out: &mut [i64]) {
        let start = row * self.cols;
        for (o, c) in out.iter_mut().zip(&self.cells[start..start + self.cols]) {
            *o = c.load(Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn store_row(&self, row: usize, values: &[i64]) {
        let start = row * self.cols;
        for (c, v) in self.cells[start..start + self.cols].iter().zip(values) {
            c.store(*v, Ordering::Relaxed);
        }
    }

    pub fn to_host(&self) -> Vec<i64> {
        self.cells.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }
}

/// Particle data uploaded for a run.
#[derive(Debug)]
pub struct DeviceState {
    pub n: usize,
    pub d: usize,
    pub sim_box: SimBox,
    pub flags: ComputeFlags,
    pub layout: ScalarLayout,
    pub r: DeviceBuffer,
    pub v: DeviceBuffer,
    pub f: DeviceBuffer,
    pub r_im: ImageBuffer,
    /// Per-particle scalars; column `layout.m` holds the mass.
    pub scalars: DeviceBuffer,
    /// Per-particle row of the stress tensor's first row, when `flags.stresses`.
    pub sx: Option<DeviceBuffer>,
    pub ptype: Vec<usize>,
}

impl DeviceState {
    pub fn upload(conf: &Configuration, flags: ComputeFlags) -> Self {
        let n = conf.n();
        let d = conf.d();
        let layout = ScalarLayout::new(flags);
        let scalars = DeviceBuffer::zeros(n, layout.len());
        for (i, m) in conf.masses().iter().enumerate() {
            scalars.set(i, layout.m, *m);
        }
        Self {
            n,
            d,
            sim_box: conf.sim_box().clone(),
            flags,
            layout,
            r: DeviceBuffer::from_host(conf.positions(), d),
            v: DeviceBuffer::from_host(conf.velocities(), d),
            f: DeviceBuffer::from_host(conf.forces(), d),
            r_im: ImageBuffer::from_host(conf.images(), d),
            scalars,
            sx: flags.stresses.then(|| DeviceBuffer::zeros(n, d)),
            ptype: conf.ptype().to_vec(),
        }
    }

    pub fn download(&self, conf: &mut Configuration) {
        conf.store_state(
            self.r.to_host(),
            self.v.to_host(),
            self.f.to_host(),
            self.r_im.to_host(),
            (self.layout, self.scalars.to_host()),
        );
    }

    #[inline]
    pub fn mass(&self, i: usize) -> f64 {
        self.scalars.get(i, self.layout.m)
    }

    /// Zero the force row and accumulated scalars of particle `i`.
    #[inline]
    pub fn clear_accumulators(&self, i: usize) {
        for k in 0..self.d {
            self.f.set(i, k, 0.0);
        }
        for slot in self.layout.accumulated() {
            self.scalars.set(i, slot, 0.0);
        }
        if let Some(sx) = &self.sx {
            for k in 0..self.d {
                sx.set(i, k, 0.0);
            }
        }
    }

    /// Write `|f_i|^2` once the force on `i` is complete.
    #[inline]
    pub fn finalize_particle(&self, i: usize) {
        if let Some(slot) = self.layout.fsq {
            let fsq = (0..self.d).map(|k| self.f.get(i, k).powi(2)).sum();
            self.scalars.set(i, slot, fsq);
        }
    }

    /// Sum a per-particle scalar column on the host.
    pub fn total(&self, slot: usize) -> f64 {
        (0..self.n).map(|i| self.scalars.get(i, slot)).sum()
    }
}
