//! Periodic snapshots of positions and images.

use md_results::{AttrValue, Dataset, OutputStore};

use crate::actions::{RuntimeAction, check_cadence};
use crate::device::{DeviceBuffer, DeviceState};
use crate::error::{SimError, SimResult};
use crate::pipeline::{RunContext, StepInfo};
use crate::plan::Lane;

const GROUP: &str = "block";

/// Which steps of a timeblock are recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrajectorySchedule {
    /// Steps 0, 1, 2, 4, ..., S/2; the timeblock length must be a power of two.
    Logarithmic,
    /// Every `steps_between_output` steps starting at 0.
    Linear { steps_between_output: usize },
}

impl TrajectorySchedule {
    /// Steps within a timeblock of `steps_per_timeblock` that are saved.
    pub fn save_steps(&self, steps_per_timeblock: usize) -> SimResult<Vec<usize>> {
        match *self {
            TrajectorySchedule::Logarithmic => {
                if !steps_per_timeblock.is_power_of_two() {
                    return Err(SimError::config(format!(
                        "logarithmic trajectory needs a power-of-two timeblock, got {steps_per_timeblock} steps"
                    )));
                }
                let mut steps = vec![0];
                let mut s = 1;
                while s < steps_per_timeblock {
                    steps.push(s);
                    s *= 2;
                }
                Ok(steps)
            }
            TrajectorySchedule::Linear {
                steps_between_output,
            } => {
                let saves = check_cadence("trajectory", steps_between_output, steps_per_timeblock)?;
                Ok((0..saves).map(|k| k * steps_between_output).collect())
            }
        }
    }

    #[inline]
    fn save_index(&self, step: usize) -> Option<usize> {
        match *self {
            TrajectorySchedule::Logarithmic if step == 0 => Some(0),
            TrajectorySchedule::Logarithmic => {
                step.is_power_of_two().then(|| step.trailing_zeros() as usize + 1)
            }
            TrajectorySchedule::Linear {
                steps_between_output,
            } => (step % steps_between_output == 0).then(|| step / steps_between_output),
        }
    }
}

/// Records the configuration at the start of scheduled steps into
/// `block/positions` and `block/images`, shape `[blocks, saves, N, D]`.
#[derive(Debug)]
pub struct TrajectorySaver {
    schedule: TrajectorySchedule,
    saves: usize,
    n: usize,
    positions: Option<DeviceBuffer>,
    images: Option<DeviceBuffer>,
}

impl TrajectorySaver {
    pub fn new(schedule: TrajectorySchedule) -> Self {
        Self {
            schedule,
            saves: 0,
            n: 0,
            positions: None,
            images: None,
        }
    }

    pub fn logarithmic() -> Self {
        Self::new(TrajectorySchedule::Logarithmic)
    }

    pub fn schedule(&self) -> TrajectorySchedule {
        self.schedule
    }
}

impl RuntimeAction for TrajectorySaver {
    fn name(&self) -> &'static str {
        "trajectory_saver"
    }

    fn output_group(&self) -> Option<&'static str> {
        Some(GROUP)
    }

    fn setup(&mut self, ctx: &RunContext, output: &mut dyn OutputStore) -> SimResult<()> {
        let steps = self.schedule.save_steps(ctx.steps_per_timeblock)?;
        self.saves = steps.len();
        self.n = ctx.n;
        self.positions = Some(DeviceBuffer::zeros(self.saves * ctx.n, ctx.d));
        self.images = Some(DeviceBuffer::zeros(self.saves * ctx.n, ctx.d));

        output.create_group(GROUP)?;
        let shape = [self.saves, ctx.n, ctx.d];
        output.create_dataset(GROUP, "positions", Dataset::blocks(&shape))?;
        output.create_dataset(GROUP, "images", Dataset::blocks(&shape))?;
        let kind = match self.schedule {
            TrajectorySchedule::Logarithmic => "logarithmic",
            TrajectorySchedule::Linear { .. } => "linear",
        };
        output.set_group_attr(GROUP, "schedule", AttrValue::from(kind))?;
        let steps: Vec<f64> = steps.iter().map(|s| *s as f64).collect();
        output.set_group_attr(GROUP, "save_steps", AttrValue::FloatList(steps))?;
        Ok(())
    }

    fn pre_step_phases(&self) -> usize {
        1
    }

    fn pre_step(&self, _phase: usize, dev: &DeviceState, step: &StepInfo, lane: Lane) {
        let (Some(positions), Some(images)) = (&self.positions, &self.images) else {
            return;
        };
        if !lane.is_primary() {
            return;
        }
        let Some(save) = self.schedule.save_index(step.step).filter(|s| *s < self.saves) else {
            return;
        };
        let i = lane.particle;
        let row = save * self.n + i;
        let mut im = [0i64; crate::sim_box::MAX_DIM];
        dev.r_im.load_row(i, &mut im[..dev.d]);
        for k in 0..dev.d {
            positions.set(row, k, dev.r.get(i, k));
            images.set(row, k, im[k] as f64);
        }
    }

    fn after_block(&mut self, block: usize, output: &mut dyn OutputStore) -> SimResult<()> {
        if let (Some(positions), Some(images)) = (&self.positions, &self.images) {
            output.write_block(GROUP, "positions", block, &positions.to_host())?;
            output.write_block(GROUP, "images", block, &images.to_host())?;
        }
        Ok(())
    }
}
