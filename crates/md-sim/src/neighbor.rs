//! Verlet neighbor list with a displacement-triggered rebuild.
//!
//! Each particle owns a fixed-capacity row of neighbor indices. A rebuild is
//! requested when any particle has moved more than half the skin since the
//! last build; all rows are then rebuilt in the same step. A row that would
//! exceed its capacity marks the list as overflowed, which the simulation
//! treats as fatal at the end of the timeblock.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::device::{DeviceBuffer, DeviceState};
use crate::error::{SimError, SimResult};
use crate::sim_box::MAX_DIM;

#[derive(Debug)]
pub struct NeighborList {
    capacity: usize,
    range_sq: f64,
    half_skin_sq: f64,
    r_ref: DeviceBuffer,
    counts: Vec<AtomicUsize>,
    indices: Vec<AtomicUsize>,
    rebuild: AtomicBool,
    max_required: AtomicUsize,
    rebuilds: AtomicU64,
}

impl NeighborList {
    /// Empty list for `n` particles that is rebuilt on the first step.
    ///
    /// `range` is the largest pair cutoff plus `skin`.
    pub fn new(n: usize, d: usize, capacity: usize, range: f64, skin: f64) -> SimResult<Self> {
        if capacity == 0 {
            return Err(SimError::InvalidArg {
                what: "neighbor list capacity must be positive",
            });
        }
        if !(skin.is_finite() && skin >= 0.0 && range.is_finite() && range > skin) {
            return Err(SimError::InvalidArg {
                what: "neighbor skin and range must be finite with range > skin >= 0",
            });
        }
        Ok(Self {
            capacity,
            range_sq: range * range,
            half_skin_sq: 0.25 * skin * skin,
            r_ref: DeviceBuffer::zeros(n, d),
            counts: (0..n).map(|_| AtomicUsize::new(0)).collect(),
            indices: (0..n * capacity).map(|_| AtomicUsize::new(0)).collect(),
            rebuild: AtomicBool::new(true),
            max_required: AtomicUsize::new(0),
            rebuilds: AtomicU64::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Flag a rebuild if particle `i` moved more than half the skin.
    #[inline]
    pub fn check_displacement(&self, dev: &DeviceState, i: usize) {
        let d = dev.d;
        let mut r = [0.0; MAX_DIM];
        let mut r0 = [0.0; MAX_DIM];
        let mut dr = [0.0; MAX_DIM];
        dev.r.load_row(i, &mut r[..d]);
        self.r_ref.load_row(i, &mut r0[..d]);
        let moved = dev.sim_box.separation(&r[..d], &r0[..d], &mut dr[..d]);
        if moved > self.half_skin_sq {
            self.rebuild.store(true, Ordering::Relaxed);
        }
    }

    /// Rebuild the row of particle `i` if a rebuild is pending.
    pub fn rebuild_particle(&self, dev: &DeviceState, i: usize) {
        if !self.rebuild.load(Ordering::Relaxed) {
            return;
        }
        let d = dev.d;
        let mut ri = [0.0; MAX_DIM];
        let mut rj = [0.0; MAX_DIM];
        let mut dr = [0.0; MAX_DIM];
        dev.r.load_row(i, &mut ri[..d]);

        let row = &self.indices[i * self.capacity..(i + 1) * self.capacity];
        let mut count = 0;
        for j in (0..dev.n).filter(|j| *j != i) {
            dev.r.load_row(j, &mut rj[..d]);
            if dev.sim_box.separation(&ri[..d], &rj[..d], &mut dr[..d]) < self.range_sq {
                if count < self.capacity {
                    row[count].store(j, Ordering::Relaxed);
                }
                count += 1;
            }
        }
        if count > self.capacity {
            self.max_required.fetch_max(count, Ordering::Relaxed);
        }
        self.counts[i].store(count.min(self.capacity), Ordering::Relaxed);
        self.r_ref.store_row(i, &ri[..d]);
    }

    /// Clear a pending rebuild once every row has been rebuilt.
    pub fn finish_rebuild(&self) {
        if self.rebuild.swap(false, Ordering::Relaxed) {
            self.rebuilds.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Neighbor count and index row of particle `i`.
    #[inline]
    pub fn neighbors(&self, i: usize) -> (usize, &[AtomicUsize]) {
        let count = self.counts[i].load(Ordering::Relaxed);
        (count, &self.indices[i * self.capacity..i * self.capacity + count])
    }

    /// Number of completed rebuilds.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    pub fn check_overflow(&self) -> SimResult<()> {
        let required = self.max_required.load(Ordering::Relaxed);
        if required > self.capacity {
            return Err(SimError::Capacity {
                what: "neighbor list entries per particle",
                limit: self.capacity,
                required,
            });
        }
        Ok(())
    }
}
