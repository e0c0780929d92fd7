//! Launch geometry: how particles map onto blocks and lanes.

use crate::error::{SimError, SimResult};

/// Capacity limits of the compute device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceSpec {
    /// Most lanes a single block may hold.
    pub max_threads_per_block: usize,
    /// Most blocks that can run concurrently; bounds a fused launch.
    pub max_resident_blocks: usize,
    /// Most blocks in one launch.
    pub max_grid_blocks: usize,
}

impl Default for DeviceSpec {
    fn default() -> Self {
        Self {
            max_threads_per_block: 1024,
            max_resident_blocks: rayon::current_num_threads().max(1),
            max_grid_blocks: 65535,
        }
    }
}

/// Particles per block, threads per particle, and whether all phases of a
/// step run inside one fused launch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub pb: usize,
    pub tp: usize,
    pub gridsync: bool,
}

/// One execution lane: thread `thread` of particle `particle` in `block`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lane {
    pub block: usize,
    pub particle: usize,
    pub thread: usize,
    /// Threads per particle in this launch.
    pub threads: usize,
}

impl Lane {
    /// The single lane that performs system-wide bookkeeping.
    #[inline]
    pub fn is_leader(&self) -> bool {
        self.particle == 0 && self.thread == 0
    }

    /// The lane that performs per-particle updates.
    #[inline]
    pub fn is_primary(&self) -> bool {
        self.thread == 0
    }
}

impl ExecutionPlan {
    pub fn new(pb: usize, tp: usize, gridsync: bool) -> Self {
        Self { pb, tp, gridsync }
    }

    /// Heuristic plan for `n` particles.
    ///
    /// Small systems get more threads per particle; blocks are sized so the
    /// grid fits the device's resident capacity, which enables fusing.
    pub fn auto(n: usize, device: &DeviceSpec) -> Self {
        let tp = match n {
            0..512 => 8,
            512..2048 => 4,
            2048..8192 => 2,
            _ => 1,
        }
        .min(device.max_threads_per_block.max(1));
        let pb_max = (device.max_threads_per_block / tp).max(1);
        let resident = device.max_resident_blocks.max(1);
        let pb_needed = n.div_ceil(resident).max(1);
        let pb = pb_needed.next_power_of_two().clamp(pb_max.min(16), pb_max);
        let num_blocks = n.div_ceil(pb);
        Self {
            pb,
            tp,
            gridsync: num_blocks <= resident,
        }
    }

    pub fn num_blocks(&self, n: usize) -> usize {
        n.div_ceil(self.pb)
    }

    pub fn threads_per_block(&self) -> usize {
        self.pb * self.tp
    }

    /// Check the plan against the device for `n` particles.
    pub fn validate(&self, n: usize, device: &DeviceSpec) -> SimResult<()> {
        if n == 0 {
            return Err(SimError::InvalidArg {
                what: "need at least one particle",
            });
        }
        if self.pb == 0 || self.tp == 0 {
            return Err(SimError::InvalidArg {
                what: "particles per block and threads per particle must be positive",
            });
        }
        if self.threads_per_block() > device.max_threads_per_block {
            return Err(SimError::Capacity {
                what: "threads per block",
                limit: device.max_threads_per_block,
                required: self.threads_per_block(),
            });
        }
        let num_blocks = self.num_blocks(n);
        if self.gridsync && num_blocks > device.max_resident_blocks {
            return Err(SimError::Capacity {
                what: "co-resident blocks for a fused launch",
                limit: device.max_resident_blocks,
                required: num_blocks,
            });
        }
        if num_blocks > device.max_grid_blocks {
            return Err(SimError::Capacity {
                what: "blocks per launch",
                limit: device.max_grid_blocks,
                required: num_blocks,
            });
        }
        Ok(())
    }

    /// Lanes of `block` that map onto particles below `n`.
    pub fn lanes(&self, block: usize, n: usize) -> impl Iterator<Item = Lane> + '_ {
        let first = block * self.pb;
        let last = (first + self.pb).min(n);
        let tp = self.tp;
        (first..last).flat_map(move |particle| {
            (0..tp).map(move |thread| Lane {
                block,
                particle,
                thread,
                threads: tp,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn device(resident: usize) -> DeviceSpec {
        DeviceSpec {
            max_threads_per_block: 1024,
            max_resident_blocks: resident,
            max_grid_blocks: 65535,
        }
    }

    #[test]
    fn auto_plan_fuses_when_grid_fits() {
        let plan = ExecutionPlan::auto(500, &device(8));
        assert_eq!(plan.tp, 8);
        assert_eq!(plan.pb, 64);
        assert!(plan.gridsync);
        assert!(plan.validate(500, &device(8)).is_ok());
    }

    #[test]
    fn auto_plan_falls_back_for_large_systems() {
        let plan = ExecutionPlan::auto(1_000_000, &device(4));
        assert!(!plan.gridsync);
        assert!(plan.threads_per_block() <= 1024);
        assert!(plan.validate(1_000_000, &device(4)).is_ok());
    }

    #[test]
    fn oversized_block_is_capacity_error() {
        let plan = ExecutionPlan::new(512, 4, false);
        assert!(matches!(
            plan.validate(1000, &device(8)),
            Err(SimError::Capacity {
                limit: 1024,
                required: 2048,
                ..
            })
        ));
    }

    #[test]
    fn fused_launch_needs_resident_blocks() {
        let plan = ExecutionPlan::new(16, 1, true);
        assert!(matches!(
            plan.validate(100, &device(4)),
            Err(SimError::Capacity { required: 7, .. })
        ));
        assert!(ExecutionPlan::new(16, 1, false).validate(100, &device(4)).is_ok());
    }

    proptest! {
        #[test]
        fn every_particle_gets_tp_lanes(n in 1usize..600, pb in 1usize..64, tp in 1usize..8) {
            let plan = ExecutionPlan::new(pb, tp, false);
            let mut hits = vec![0usize; n];
            for block in 0..plan.num_blocks(n) {
                for lane in plan.lanes(block, n) {
                    prop_assert_eq!(lane.block, block);
                    hits[lane.particle] += 1;
                }
            }
            prop_assert!(hits.iter().all(|h| *h == tp));
        }
    }
}
