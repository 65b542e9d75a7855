use specsynth_core::domain::{
    ComputeModule, ComputeRequest, PlasmaPoint, SimilarityMethod, SynthErrorCategory,
};
use specsynth_core::modules::execute_module;
use specsynth_core::modules::grid_scan::{GridScanner, NoProgress, ScanInputs};
use specsynth_core::modules::pipeline::{SCAN_REPORT_ARTIFACT, ScanReport};
use specsynth_core::modules::project::ProjectConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PROJECT: &str = r#"{
    "element": { "atomic_number": 13 },
    "experimental": "exp_data.txt",
    "wavelength_range": [95.0, 140.0],
    "stages": [
        { "ion": 3, "line_list": "Al_3/spectra.dat" },
        { "ion": 4, "line_list": "Al_4/spectra.dat" },
        { "ion": 5, "line_list": "Al_5/spectra.dat" }
    ],
    "broadening": { "fwhm": { "linear": { "intercept": 0.2, "slope": 0.01 } } },
    "curve": "cross_weighted",
    "similarity": "pearson",
    "grid": {
        "temperature": { "start": 15.0, "stop": 35.0, "count": 3 },
        "density": { "start": 1e18, "stop": 1e22, "count": 3, "spacing": "logarithmic" }
    }
}"#;

fn write_fixture(dir: &Path) -> PathBuf {
    for stage in ["Al_3", "Al_4", "Al_5"] {
        fs::create_dir_all(dir.join(stage)).expect("stage directory");
    }
    fs::write(
        dir.join("Al_3/spectra.dat"),
        "0.0 11.27 11.27 1.0 1 2 0.5 1.5\n0.2 9.7 9.5 0.4 2 3 1.5 0.5\n",
    )
    .expect("stage 3 lines");
    fs::write(dir.join("Al_4/spectra.dat"), "0.0 10.5 10.5 0.7 1 2 0.0 1.0\n")
        .expect("stage 4 lines");
    // Nothing inside the window: the stage must contribute zero.
    fs::write(dir.join("Al_5/spectra.dat"), "0.0 40.0 40.0 1.0 1 2 0.0 1.0\n")
        .expect("stage 5 lines");

    let mut experiment = String::from("wavelength intensity\n");
    for step in 0..161 {
        let wavelength = 90.0 + 0.375 * f64::from(step);
        let intensity = 0.02
            + (-(wavelength - 110.0).powi(2) / 3.0).exp()
            + 0.5 * (-(wavelength - 118.0).powi(2) / 3.0).exp();
        experiment.push_str(&format!("{wavelength} {intensity}\n"));
    }
    fs::write(dir.join("exp_data.txt"), experiment).expect("experiment");

    let path = dir.join("project.json");
    fs::write(&path, PROJECT).expect("project");
    path
}

#[test]
fn pipeline_scan_matches_direct_point_evaluations() {
    let temp = TempDir::new().expect("tempdir should be created");
    let project_path = write_fixture(temp.path());
    let out = temp.path().join("out");

    let request = ComputeRequest::new(ComputeModule::Scan, &project_path, &out).with_workers(2);
    execute_module(&request, &NoProgress).expect("scan should succeed");
    let report: ScanReport = serde_json::from_str(
        &fs::read_to_string(out.join(SCAN_REPORT_ARTIFACT)).expect("scan report"),
    )
    .expect("scan report json");

    let config = ProjectConfig::load(&project_path).expect("project");
    let atom = config.atomic_structure().expect("atom");
    let experimental = config.load_experimental().expect("experimental");
    let stage_lines = config.load_stage_lines().expect("lines");
    let engine = config.engine();
    let strategy = config.abundance_strategy.strategy();
    let inputs = ScanInputs::new(
        &atom,
        &experimental,
        &stage_lines,
        &engine,
        strategy.as_ref(),
    )
    .with_window(config.window(&experimental))
    .with_axis(config.axis(&experimental))
    .with_curve(config.curve)
    .with_method(config.similarity);

    assert_eq!(report.method, SimilarityMethod::Pearson);
    assert_eq!(report.temperatures, vec![15.0, 25.0, 35.0]);
    let scanner = GridScanner::new(1);
    for (row, density) in report.densities.iter().enumerate() {
        for (column, temperature) in report.temperatures.iter().enumerate() {
            let direct = scanner
                .evaluate_point(&inputs, PlasmaPoint::new(*temperature, *density))
                .map(|evaluation| evaluation.score)
                .ok();
            match (report.scores[row][column], direct) {
                (Some(scanned), Some(expected)) => assert!(
                    (scanned - expected).abs() <= 1.0e-12 * expected.abs().max(1.0),
                    "cell ({row}, {column}): {scanned} != {expected}"
                ),
                (scanned, expected) => {
                    assert_eq!(scanned, expected, "cell ({row}, {column})")
                }
            }
        }
    }
}

#[test]
fn worker_count_does_not_change_the_score_matrix() {
    let temp = TempDir::new().expect("tempdir should be created");
    let project_path = write_fixture(temp.path());

    let mut reports = Vec::new();
    for workers in [1, 4] {
        let out = temp.path().join(format!("out_{workers}"));
        let request =
            ComputeRequest::new(ComputeModule::Scan, &project_path, &out).with_workers(workers);
        execute_module(&request, &NoProgress).expect("scan should succeed");
        let text = fs::read_to_string(out.join(SCAN_REPORT_ARTIFACT)).expect("scan report");
        reports.push(text);
    }

    assert_eq!(reports[0], reports[1]);
}

#[test]
fn malformed_line_lists_stop_the_run_before_any_output() {
    let temp = TempDir::new().expect("tempdir should be created");
    let project_path = write_fixture(temp.path());
    fs::write(
        temp.path().join("Al_4/spectra.dat"),
        "0.0 10.5 10.5 0.7 1 2 0.0 1.0\n0.0 10.5 10.5\n",
    )
    .expect("broken line list");
    let out = temp.path().join("out");

    let request = ComputeRequest::new(ComputeModule::Synthesize, &project_path, &out)
        .with_point(PlasmaPoint::new(25.0, 1.0e20));
    let error = execute_module(&request, &NoProgress).expect_err("line list is malformed");

    assert_eq!(error.category(), SynthErrorCategory::InputValidationError);
    assert_eq!(error.placeholder(), "INPUT.LINE_LIST");
    assert!(error.message().contains("line 2"));
    assert!(!out.exists());
}
