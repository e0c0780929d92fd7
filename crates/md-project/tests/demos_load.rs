use std::path::Path;

#[test]
fn demos_load_and_validate() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");
    let demos = [
        "01_lj_nve.yaml",
        "02_kob_andersen_nvt.yaml",
        "03_lj_nvu.yaml",
        "04_harmonic_2d.yaml",
    ];

    for name in demos {
        let path = root.join(name);
        let def = md_project::load_yaml(&path)
            .unwrap_or_else(|e| panic!("Failed to load {}: {}", name, e));
        md_project::validate_run(&def)
            .unwrap_or_else(|e| panic!("Failed to validate {}: {}", name, e));
    }
}

#[test]
fn kob_andersen_demo_fields() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/02_kob_andersen_nvt.yaml");
    let def = md_project::load_yaml(&path).unwrap();
    assert_eq!(def.configuration.lattice.num_particles(), 500);
    assert_eq!(def.configuration.type_counts, vec![400, 100]);
    assert_eq!(def.potential.params.len(), 3);
    assert_eq!(def.integrator.name(), "NVT");
    assert_eq!(def.actions.len(), 2);
}
