//! Run execution and caching service.

use std::path::{Path, PathBuf};
use std::time::Instant;

use md_potentials::PairFunction;
use md_project::RunDefinition;
use md_results::{DirStore, OutputStore, RunManifest, RunStatus, RunStore, now_timestamp};
use md_sim::{BlockProgress, PairPotential, Simulation};
use tracing::{info, warn};

use crate::build::{self, PotentialVisitor, SimulationParts};
use crate::error::AppResult;
use crate::progress::{RunProgressEvent, RunStage};
use crate::query::{self, EnergySummary};

/// Options for running simulations.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub use_cache: bool,
    /// Overrides the definition's storage location.
    pub runs_dir: Option<PathBuf>,
    pub engine_version: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            runs_dir: None,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Request to execute a run definition file.
pub struct RunRequest<'a> {
    pub definition_path: &'a Path,
    pub options: RunOptions,
}

#[derive(Debug, Clone, Default)]
pub struct RunTimingSummary {
    pub build_time_s: f64,
    pub setup_time_s: f64,
    pub run_time_s: f64,
    pub flush_time_s: f64,
    pub load_cache_time_s: f64,
    pub total_time_s: f64,
    pub steps: usize,
    pub steps_per_second: f64,
    pub neighbor_rebuilds: u64,
}

#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    pub manifest: RunManifest,
    pub loaded_from_cache: bool,
    /// Present when the run records `U` and `K` scalars.
    pub summary: Option<EnergySummary>,
    pub timing: RunTimingSummary,
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    stage: RunStage,
    num_blocks: usize,
    started: Instant,
    message: Option<String>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent::stage(
            stage,
            num_blocks,
            started.elapsed().as_secs_f64(),
            message,
        ));
    }
}

/// Execute or load the run described by a definition file.
pub fn ensure_run(request: &RunRequest) -> AppResult<RunResponse> {
    ensure_run_with_progress(request, None)
}

pub fn ensure_run_with_progress(
    request: &RunRequest,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<RunResponse> {
    let started = Instant::now();
    emit_progress(
        &mut progress_cb,
        RunStage::LoadingDefinition,
        0,
        started,
        Some(request.definition_path.display().to_string()),
    );
    let def = md_project::load_yaml(request.definition_path)?;
    let store = open_run_store(request.definition_path, &def, &request.options)?;
    run_definition(&def, &store, &request.options, progress_cb)
}

/// Run store for a definition: the explicit override, then the definition's
/// `storage.runs_dir` (relative to the file), then `.mdflow/runs` beside it.
pub fn open_run_store(
    definition_path: &Path,
    def: &RunDefinition,
    options: &RunOptions,
) -> AppResult<RunStore> {
    if let Some(dir) = &options.runs_dir {
        return Ok(RunStore::new(dir.clone())?);
    }
    if let Some(dir) = &def.storage.runs_dir {
        let base = definition_path.parent().unwrap_or_else(|| Path::new("."));
        return Ok(RunStore::new(base.join(dir))?);
    }
    Ok(RunStore::for_definition(definition_path)?)
}

/// Execute or load an already loaded definition against `store`.
pub fn run_definition(
    def: &RunDefinition,
    store: &RunStore,
    options: &RunOptions,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<RunResponse> {
    let started = Instant::now();
    let num_blocks = def.schedule.num_timeblocks;
    let mut timing = RunTimingSummary::default();

    emit_progress(&mut progress_cb, RunStage::CheckingCache, num_blocks, started, None);
    let run_id = md_results::compute_run_id(def, &options.engine_version);

    if options.use_cache && store.has_run(&run_id) {
        let manifest = store.load_manifest(&run_id)?;
        if manifest.status == RunStatus::Completed {
            emit_progress(
                &mut progress_cb,
                RunStage::LoadingCachedResult,
                num_blocks,
                started,
                Some("Loading cached run".to_string()),
            );
            let load_started = Instant::now();
            let output = store.open_output(&run_id)?;
            let summary = query::energy_summary(&output).ok();
            timing.load_cache_time_s = load_started.elapsed().as_secs_f64();
            timing.total_time_s = started.elapsed().as_secs_f64();
            info!(run_id = %run_id, "loaded cached run");
            emit_progress(&mut progress_cb, RunStage::Completed, num_blocks, started, None);
            return Ok(RunResponse {
                run_id,
                manifest,
                loaded_from_cache: true,
                summary,
                timing,
            });
        }
        warn!(run_id = %run_id, "cached run did not complete; running again");
    }

    emit_progress(&mut progress_cb, RunStage::Building, num_blocks, started, None);
    let build_started = Instant::now();
    let parts = build::build_parts(def)?;
    let output = store.create_output(&run_id)?;
    timing.build_time_s = build_started.elapsed().as_secs_f64();

    let mut manifest = RunManifest {
        run_id: run_id.clone(),
        name: def.name.clone(),
        timestamp: now_timestamp(),
        engine_version: options.engine_version.clone(),
        integrator: parts.integrator.name().to_string(),
        n: parts.configuration.n(),
        d: parts.configuration.d(),
        dt: parts.integrator.dt(),
        num_timeblocks: def.schedule.num_timeblocks,
        steps_per_timeblock: def.schedule.steps_per_timeblock,
        status: RunStatus::Failed,
    };

    emit_progress(&mut progress_cb, RunStage::Running, num_blocks, started, None);
    let mut on_block = |p: &BlockProgress| {
        if let Some(cb) = progress_cb.as_deref_mut() {
            cb(RunProgressEvent {
                stage: RunStage::Running,
                block: Some(p.completed),
                num_blocks: p.total,
                elapsed_wall_s: started.elapsed().as_secs_f64(),
                message: None,
            });
        }
    };
    let runner = Runner {
        parts,
        output: Box::new(output),
        on_block: &mut on_block,
    };
    let outcome = match build::with_potential(&def.potential, runner) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(run_id = %run_id, error = %err, "run failed");
            store.save_manifest(&manifest)?;
            return Err(err);
        }
    };

    emit_progress(&mut progress_cb, RunStage::SavingResults, num_blocks, started, None);
    manifest.status = RunStatus::Completed;
    manifest.timestamp = now_timestamp();
    store.save_manifest(&manifest)?;

    let summary = query::energy_summary(outcome.output.as_ref()).ok();
    timing.setup_time_s = outcome.perf.setup_time_s;
    timing.run_time_s = outcome.perf.run_time_s;
    timing.flush_time_s = outcome.perf.flush_time_s;
    timing.steps = outcome.perf.steps;
    timing.steps_per_second = outcome.perf.steps_per_second();
    timing.neighbor_rebuilds = outcome.neighbor_rebuilds;
    timing.total_time_s = started.elapsed().as_secs_f64();

    info!(
        run_id = %run_id,
        steps = timing.steps,
        seconds = timing.run_time_s,
        rebuilds = timing.neighbor_rebuilds,
        "run completed"
    );
    emit_progress(&mut progress_cb, RunStage::Completed, num_blocks, started, None);

    Ok(RunResponse {
        run_id,
        manifest,
        loaded_from_cache: false,
        summary,
        timing,
    })
}

struct RunOutcome {
    output: Box<dyn OutputStore>,
    perf: md_core::timing::PerfStats,
    neighbor_rebuilds: u64,
}

struct Runner<'a> {
    parts: SimulationParts,
    output: Box<dyn OutputStore>,
    on_block: &'a mut dyn FnMut(&BlockProgress),
}

impl PotentialVisitor for Runner<'_> {
    type Output = RunOutcome;

    fn visit<F: PairFunction + 'static>(self, potential: PairPotential<F>) -> AppResult<RunOutcome> {
        let Runner {
            parts,
            output,
            on_block,
        } = self;
        let mut sim = Simulation::new(
            parts.configuration,
            potential,
            parts.integrator,
            parts.actions,
            parts.options,
            output,
        )?;
        sim.run_with_progress(|p| on_block(p))?;
        Ok(RunOutcome {
            perf: sim.perf().clone(),
            neighbor_rebuilds: sim.neighbor_rebuilds(),
            output: sim.into_output(),
        })
    }
}

/// Manifest and recorded output of a stored run.
pub fn load_run(store: &RunStore, run_id: &str) -> AppResult<(RunManifest, DirStore)> {
    let manifest = store.load_manifest(run_id)?;
    let output = store.open_output(run_id)?;
    Ok((manifest, output))
}

pub fn list_runs(store: &RunStore) -> AppResult<Vec<RunManifest>> {
    Ok(store.list_runs()?)
}
