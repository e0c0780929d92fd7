//! Periodic recording of system totals.

use md_results::{AttrValue, Dataset, OutputStore};

use crate::actions::{RuntimeAction, check_cadence};
use crate::device::{DeviceBuffer, DeviceState};
use crate::error::{SimError, SimResult};
use crate::flags::{ComputeFlags, ScalarLayout};
use crate::pipeline::{RunContext, StepInfo};
use crate::plan::Lane;

const GROUP: &str = "scalar_saver";
const DATASET: &str = "scalars";
const MOMENTUM_NAMES: [&str; 4] = ["Px", "Py", "Pz", "Pw"];

#[derive(Clone, Copy, Debug)]
enum Source {
    Slot(usize),
    Volume,
    Momentum(usize),
    ShearStress,
}

/// Sums per-particle scalars over the system every `steps_between_output`
/// steps, one row per save, into `scalar_saver/scalars` with shape
/// `[blocks, saves_per_block, columns]`.
///
/// Columns appear in the order U, W, lapU, K, Fsq, Vol, momentum components,
/// Sxy, restricted to the flags resolved for the run.
#[derive(Debug)]
pub struct ScalarSaver {
    steps_between_output: usize,
    extra_flags: ComputeFlags,
    saves_per_block: usize,
    columns: Vec<(String, Source)>,
    buffer: Option<DeviceBuffer>,
}

impl ScalarSaver {
    pub fn new(steps_between_output: usize) -> Self {
        Self::with_flags(steps_between_output, ComputeFlags::NONE)
    }

    /// Also request `flags` beyond those the configuration computes.
    pub fn with_flags(steps_between_output: usize, flags: ComputeFlags) -> Self {
        Self {
            steps_between_output,
            extra_flags: flags,
            saves_per_block: 0,
            columns: Vec::new(),
            buffer: None,
        }
    }

    pub fn steps_between_output(&self) -> usize {
        self.steps_between_output
    }

    fn resolve_columns(flags: ComputeFlags, layout: &ScalarLayout, d: usize) -> Vec<(String, Source)> {
        let mut columns = Vec::new();
        let slots = [
            ("U", layout.u),
            ("W", layout.w),
            ("lapU", layout.lap_u),
            ("K", layout.k),
            ("Fsq", layout.fsq),
        ];
        for (name, slot) in slots {
            if let Some(slot) = slot {
                columns.push((name.to_string(), Source::Slot(slot)));
            }
        }
        if flags.vol {
            columns.push(("Vol".to_string(), Source::Volume));
        }
        if flags.ptot {
            for (k, name) in MOMENTUM_NAMES.iter().take(d).enumerate() {
                columns.push((name.to_string(), Source::Momentum(k)));
            }
        }
        if flags.stresses {
            columns.push(("Sxy".to_string(), Source::ShearStress));
        }
        columns
    }

    /// Column names of a recorded scalar table.
    pub fn columns(store: &dyn OutputStore) -> SimResult<Vec<String>> {
        let names = store
            .group_attr(GROUP, "scalar_names")
            .and_then(AttrValue::as_text_list)
            .ok_or_else(|| SimError::config("scalar_saver group has no scalar_names attribute"))?;
        Ok(names.to_vec())
    }

    /// Columns `names` as one series each, rows ordered by time.
    pub fn extract<S: AsRef<str>>(
        store: &dyn OutputStore,
        names: &[S],
        options: ExtractOptions,
    ) -> SimResult<Vec<Vec<f64>>> {
        let all = Self::columns(store)?;
        let indices = names
            .iter()
            .map(|name| {
                all.iter().position(|c| c == name.as_ref()).ok_or_else(|| {
                    SimError::config(format!(
                        "no scalar column {:?}; recorded columns are {all:?}",
                        name.as_ref()
                    ))
                })
            })
            .collect::<SimResult<Vec<_>>>()?;

        let scale = if options.per_particle {
            1.0 / particle_count(store)? as f64
        } else {
            1.0
        };
        let rows = selected_rows(store, &options)?;
        Ok(indices
            .iter()
            .map(|&c| rows.iter().map(|row| row[c] * scale).collect())
            .collect())
    }

    /// Simulation time of every row `extract` returns for the same options.
    pub fn times(store: &dyn OutputStore, options: ExtractOptions) -> SimResult<Vec<f64>> {
        let dt = store
            .root_attr("dt")
            .and_then(AttrValue::as_f64)
            .ok_or_else(|| SimError::config("output has no dt attribute"))?;
        let k = steps_between(store)?;
        let data = store.dataset(GROUP, DATASET)?;
        let saves = data.shape().get(1).copied().unwrap_or(0);
        let steps_per_block = store
            .root_attr("steps_per_timeblock")
            .and_then(AttrValue::as_usize)
            .unwrap_or(saves * k);
        let (first, last) = options.block_range(data.num_blocks());
        let mut times = Vec::new();
        for block in first..last {
            for save in 0..saves {
                times.push((block * steps_per_block + save * k) as f64 * dt);
            }
        }
        Ok(times.into_iter().step_by(options.subsample.max(1)).collect())
    }

    /// One-line summary of the recorded table.
    pub fn info(store: &dyn OutputStore) -> SimResult<String> {
        let columns = Self::columns(store)?;
        let data = store.dataset(GROUP, DATASET)?;
        let shape = data.shape();
        Ok(format!(
            "{GROUP}: {} blocks x {} saves, every {} steps, columns {}",
            shape.first().copied().unwrap_or(0),
            shape.get(1).copied().unwrap_or(0),
            steps_between(store)?,
            columns.join(", ")
        ))
    }
}

/// Row selection for [`ScalarSaver::extract`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Divide every column by the particle count.
    pub per_particle: bool,
    pub first_block: usize,
    /// Exclusive; `None` reads to the last recorded block.
    pub last_block: Option<usize>,
    /// Keep every n-th row.
    pub subsample: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            per_particle: true,
            first_block: 0,
            last_block: None,
            subsample: 1,
        }
    }
}

impl ExtractOptions {
    fn block_range(&self, num_blocks: usize) -> (usize, usize) {
        let last = self.last_block.unwrap_or(num_blocks).min(num_blocks);
        (self.first_block.min(last), last)
    }
}

/// Per-particle columns `names`, skipping the first `first_block` blocks.
pub fn extract_scalars<S: AsRef<str>>(
    store: &dyn OutputStore,
    names: &[S],
    first_block: usize,
) -> SimResult<Vec<Vec<f64>>> {
    ScalarSaver::extract(
        store,
        names,
        ExtractOptions {
            first_block,
            ..ExtractOptions::default()
        },
    )
}

fn steps_between(store: &dyn OutputStore) -> SimResult<usize> {
    store
        .group_attr(GROUP, "steps_between_output")
        .and_then(AttrValue::as_usize)
        .ok_or_else(|| SimError::config("scalar_saver group has no steps_between_output attribute"))
}

fn particle_count(store: &dyn OutputStore) -> SimResult<usize> {
    if let Some(n) = store.root_attr("N").and_then(AttrValue::as_usize) {
        return Ok(n);
    }
    let positions = store.dataset("initial_configuration", "positions")?;
    positions
        .shape()
        .first()
        .copied()
        .filter(|n| *n > 0)
        .ok_or_else(|| SimError::config("cannot determine the particle count"))
}

fn selected_rows<'a>(store: &'a dyn OutputStore, options: &ExtractOptions) -> SimResult<Vec<&'a [f64]>> {
    let data = store.dataset(GROUP, DATASET)?;
    let ncols = data.shape().get(2).copied().unwrap_or(0);
    if ncols == 0 {
        return Ok(Vec::new());
    }
    let (first, last) = options.block_range(data.num_blocks());
    Ok(data
        .blocks_range(first, last)
        .chunks(ncols)
        .step_by(options.subsample.max(1))
        .collect())
}

impl RuntimeAction for ScalarSaver {
    fn name(&self) -> &'static str {
        "scalar_saver"
    }

    fn output_group(&self) -> Option<&'static str> {
        Some(GROUP)
    }

    fn compute_flags(&self) -> ComputeFlags {
        self.extra_flags
    }

    fn setup(&mut self, ctx: &RunContext, output: &mut dyn OutputStore) -> SimResult<()> {
        self.saves_per_block = check_cadence(
            "scalar_saver",
            self.steps_between_output,
            ctx.steps_per_timeblock,
        )?;
        if ctx.flags.stresses && ctx.d < 2 {
            return Err(SimError::config("shear stress needs at least two dimensions"));
        }
        let layout = ScalarLayout::new(ctx.flags);
        self.columns = Self::resolve_columns(ctx.flags, &layout, ctx.d);
        let ncols = self.columns.len();
        self.buffer = Some(DeviceBuffer::zeros(self.saves_per_block, ncols));

        output.create_group(GROUP)?;
        output.create_dataset(GROUP, DATASET, Dataset::blocks(&[self.saves_per_block, ncols]))?;
        let names: Vec<String> = self.columns.iter().map(|(n, _)| n.clone()).collect();
        output.set_group_attr(GROUP, "scalar_names", AttrValue::TextList(names))?;
        output.set_group_attr(
            GROUP,
            "steps_between_output",
            AttrValue::from(self.steps_between_output),
        )?;
        output.set_group_attr(GROUP, "compression_info", AttrValue::from("none"))?;
        Ok(())
    }

    fn post_step_phases(&self) -> usize {
        1
    }

    fn post_step(&self, _phase: usize, dev: &DeviceState, step: &StepInfo, lane: Lane) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        if !lane.is_primary() || step.step % self.steps_between_output != 0 {
            return;
        }
        let save = step.step / self.steps_between_output;
        if save >= self.saves_per_block {
            return;
        }
        let i = lane.particle;
        for (col, (_, source)) in self.columns.iter().enumerate() {
            match *source {
                Source::Slot(slot) => buffer.add(save, col, dev.scalars.get(i, slot)),
                Source::Volume => {
                    if i == 0 {
                        buffer.set(save, col, dev.sim_box.volume());
                    }
                }
                Source::Momentum(k) => buffer.add(save, col, dev.mass(i) * dev.v.get(i, k)),
                Source::ShearStress => {
                    if let Some(sx) = &dev.sx {
                        let kinetic = dev.mass(i) * dev.v.get(i, 0) * dev.v.get(i, 1);
                        buffer.add(save, col, sx.get(i, 1) - kinetic);
                    }
                }
            }
        }
    }

    fn before_block(&mut self, _block: usize) -> SimResult<()> {
        if let Some(buffer) = &self.buffer {
            buffer.fill(0.0);
        }
        Ok(())
    }

    fn after_block(&mut self, block: usize, output: &mut dyn OutputStore) -> SimResult<()> {
        if let Some(buffer) = &self.buffer {
            output.write_block(GROUP, DATASET, block, &buffer.to_host())?;
        }
        Ok(())
    }
}
