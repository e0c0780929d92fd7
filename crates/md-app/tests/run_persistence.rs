use std::path::PathBuf;

use md_app::{AppError, RunOptions, RunProgressEvent, RunRequest, RunStage, run_service};
use md_results::{OutputStore, RunStatus, RunStore};

const SOFT_SPHERES: &str = r#"
version: 1
name: soft spheres
configuration:
  lattice: { type: Sc, cells: [5, 5, 5] }
  density: 1.0
  temperature: 0.05
  seed: 9
potential:
  function: harmonic_repulsion
  cutoff: none
  params: [[[10.0]], [[1.1]]]
  max_num_nbs: 24
  skin: 0.3
integrator: { type: Nve, dt: 0.005 }
actions:
  - { type: ScalarSaver, steps_between_output: 8 }
schedule: { num_timeblocks: 2, steps_per_timeblock: 32 }
plan: { quiet: true }
"#;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("md_app_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_definition(dir: &std::path::Path, yaml: &str) -> PathBuf {
    let path = dir.join("run.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

#[test]
fn second_run_loads_from_cache() {
    let dir = scratch_dir("cache");
    let path = write_definition(&dir, SOFT_SPHERES);
    let request = RunRequest {
        definition_path: &path,
        options: RunOptions::default(),
    };

    let mut events: Vec<RunProgressEvent> = Vec::new();
    let first = run_service::ensure_run_with_progress(&request, Some(&mut |e| events.push(e))).unwrap();
    assert!(!first.loaded_from_cache);
    assert_eq!(first.manifest.status, RunStatus::Completed);
    assert_eq!(first.manifest.n, 125);
    assert_eq!(first.timing.steps, 64);

    let blocks: Vec<usize> = events
        .iter()
        .filter(|e| e.stage == RunStage::Running)
        .filter_map(|e| e.block)
        .collect();
    assert_eq!(blocks, vec![1, 2]);
    assert_eq!(events.last().map(|e| e.stage), Some(RunStage::Completed));

    let summary = first.summary.clone().expect("U and K are recorded");
    assert_eq!(summary.rows, 8);
    assert!(summary.relative_drift.abs() < 1e-2, "{summary:?}");

    let second = run_service::ensure_run(&request).unwrap();
    assert!(second.loaded_from_cache);
    assert_eq!(second.run_id, first.run_id);
    assert_eq!(second.summary, first.summary);

    let store = RunStore::for_definition(&path).unwrap();
    let (manifest, output) = run_service::load_run(&store, &first.run_id).unwrap();
    assert_eq!(manifest.name, "soft spheres");
    let scalars = output.dataset("scalar_saver", "scalars").unwrap();
    assert_eq!(&scalars.shape()[..2], &[2, 4]);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn no_cache_reruns_and_edit_changes_id() {
    let dir = scratch_dir("nocache");
    let runs = dir.join("runs");
    let path = write_definition(&dir, SOFT_SPHERES);
    let options = RunOptions {
        use_cache: false,
        runs_dir: Some(runs.clone()),
        ..RunOptions::default()
    };
    let request = RunRequest {
        definition_path: &path,
        options,
    };
    let first = run_service::ensure_run(&request).unwrap();
    let again = run_service::ensure_run(&request).unwrap();
    assert!(!again.loaded_from_cache);
    assert_eq!(again.run_id, first.run_id);

    let edited = SOFT_SPHERES.replace("seed: 9", "seed: 10");
    write_definition(&dir, &edited);
    let other = run_service::ensure_run(&request).unwrap();
    assert_ne!(other.run_id, first.run_id);

    let store = RunStore::new(runs).unwrap();
    assert_eq!(run_service::list_runs(&store).unwrap().len(), 2);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn failed_run_is_recorded_and_not_reused() {
    let dir = scratch_dir("failed");
    let overflowing = SOFT_SPHERES.replace("max_num_nbs: 24", "max_num_nbs: 2");
    let path = write_definition(&dir, &overflowing);
    let request = RunRequest {
        definition_path: &path,
        options: RunOptions::default(),
    };

    let err = run_service::ensure_run(&request).unwrap_err();
    assert!(matches!(err, AppError::Simulation(_)), "{err}");

    let def = md_project::load_yaml(&path).unwrap();
    let run_id = md_results::compute_run_id(&def, &RunOptions::default().engine_version);
    let store = RunStore::for_definition(&path).unwrap();
    assert_eq!(store.load_manifest(&run_id).unwrap().status, RunStatus::Failed);

    // A failed manifest is never served from cache.
    assert!(run_service::ensure_run(&request).is_err());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn invalid_definition_is_a_project_error() {
    let dir = scratch_dir("invalid");
    let path = write_definition(&dir, &SOFT_SPHERES.replace("dt: 0.005", "dt: -1.0"));
    let request = RunRequest {
        definition_path: &path,
        options: RunOptions::default(),
    };
    assert!(matches!(
        run_service::ensure_run(&request),
        Err(AppError::Project(_))
    ));
    std::fs::remove_dir_all(&dir).unwrap();
}
