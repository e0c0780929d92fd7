use md_results::*;
use std::fs;

fn manifest(run_id: &str, timestamp: &str) -> RunManifest {
    RunManifest {
        run_id: run_id.to_string(),
        name: "lj".to_string(),
        timestamp: timestamp.to_string(),
        engine_version: "0.1.0".to_string(),
        integrator: "NVE".to_string(),
        n: 500,
        d: 3,
        dt: 0.005,
        num_timeblocks: 2,
        steps_per_timeblock: 64,
        status: RunStatus::Completed,
    }
}

#[test]
fn save_and_load_run() {
    let temp_dir = std::env::temp_dir().join(format!("md_results_test_{}", std::process::id()));
    let _ = fs::remove_dir_all(&temp_dir);

    let store = RunStore::new(temp_dir.clone()).unwrap();
    let mut output = store.create_output("run_a").unwrap();
    output.set_root_attr("dt", AttrValue::Float(0.005)).unwrap();
    output.create_group("scalar_saver").unwrap();
    output
        .create_dataset("scalar_saver", "scalars", Dataset::blocks(&[4, 3]))
        .unwrap();
    for block in 0..2 {
        output
            .write_block("scalar_saver", "scalars", block, &[block as f64; 12])
            .unwrap();
    }
    output.flush().unwrap();
    store.save_manifest(&manifest("run_a", &now_timestamp())).unwrap();

    assert!(store.has_run("run_a"));
    let loaded = store.load_manifest("run_a").unwrap();
    assert_eq!(loaded.n, 500);
    assert_eq!(loaded.status, RunStatus::Completed);

    let reopened = store.open_output("run_a").unwrap();
    let ds = reopened.dataset("scalar_saver", "scalars").unwrap();
    assert_eq!(ds.shape(), &[2, 4, 3]);
    assert_eq!(ds.block(1).unwrap(), &[1.0; 12]);

    // The same directory also opens through the generic reader
    let generic = open_trajectory(&store.output_dir("run_a")).unwrap().unwrap();
    assert_eq!(generic.root_attr("dt").and_then(|v| v.as_f64()), Some(0.005));

    fs::remove_dir_all(&temp_dir).unwrap();
}

#[test]
fn list_and_delete_runs() {
    let temp_dir = std::env::temp_dir().join(format!("md_results_list_{}", std::process::id()));
    let _ = fs::remove_dir_all(&temp_dir);

    let store = RunStore::new(temp_dir.clone()).unwrap();
    store.save_manifest(&manifest("b", "2026-01-02T00:00:00Z")).unwrap();
    store.save_manifest(&manifest("a", "2026-01-01T00:00:00Z")).unwrap();

    let runs = store.list_runs().unwrap();
    let ids: Vec<_> = runs.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);

    store.delete_run("a").unwrap();
    assert!(!store.has_run("a"));
    assert!(matches!(
        store.load_manifest("a"),
        Err(StoreError::RunNotFound { .. })
    ));

    fs::remove_dir_all(&temp_dir).unwrap();
}
