//! Barrido completo sobre las plantillas del repositorio con un scheduler
//! que sólo registra los envíos.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use wing_adapters::ConvergenceConfig;
use wing_core::PipelineError;
use wing_domain::{BoundaryLayerMode, ResourceRequest, SolverKind, StageSelection, SweepGrid, WorkspaceLayout};
use wingflow::{JobId, Scheduler, SchedulerError, SweepConfig, SweepDriver, WingflowError};

#[derive(Default)]
struct RecordingScheduler {
    scripts: RefCell<Vec<PathBuf>>,
}

impl Scheduler for RecordingScheduler {
    fn submit(&self, script: &Path) -> Result<JobId, SchedulerError> {
        let mut scripts = self.scripts.borrow_mut();
        scripts.push(script.to_path_buf());
        Ok(JobId(format!("{}.pbs", 1000 + scripts.len())))
    }
}

fn config(output: &Path) -> SweepConfig {
    let templates = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates");
    SweepConfig { project_root: output.to_path_buf(),
                  output_dir: output.to_path_buf(),
                  template_dir: templates,
                  scheduler: PathBuf::from("qsub"),
                  wingflow_bin: PathBuf::from("/opt/wingflow/bin/wingflow") }
}

#[test]
fn euler_sweep_builds_one_workspace_and_job_per_point() {
    let out = tempfile::tempdir().unwrap();
    let driver = SweepDriver::new(&config(out.path()), RecordingScheduler::default());
    let grid = SweepGrid::new(vec![-15.0, 0.0, 15.0], vec![0.0]).unwrap();
    let selection = StageSelection::full(SolverKind::Inviscid);

    let report = driver.run_sweep(&grid, &selection, &ResourceRequest::default()).unwrap();

    assert!(report.is_success(), "failed points: {:?}", report.failed);
    assert_eq!(report.submitted.len(), 3);
    assert_eq!(driver.scheduler().scripts.borrow().len(), 3);
    for name in ["winglet_c-15_s0", "winglet_c0_s0", "winglet_c15_s0"] {
        let root = out.path().join(name);
        for dir in ["GEOMETRY", "MESH/without_prism", "CFD/Euler", "ASO/Euler"] {
            assert!(root.join(dir).is_dir(), "{name}/{dir} missing");
        }
        assert!(!root.join("MESH/with_prism").exists());
        assert!(root.join("GEOMETRY/winggen.vspscript.in").is_file());
        assert!(root.join("MESH/without_prism/macro.java.in").is_file());
        assert!(root.join("CFD/Euler/Euler-cfd.cfg.in").is_file());
        assert!(root.join("ASO/Euler/Euler-shapeOptimisation.cfg.in").is_file());

        let script = fs::read_to_string(root.join("submit.pbs")).unwrap();
        assert!(script.contains(&format!("#PBS -N {name}")));
        assert!(script.contains("#PBS -l walltime=8:00:00"));
        assert!(script.contains("#PBS -l select=1:ncpus=48:mem=64gb"));
        assert!(script.contains("CFD_SOLVER=Euler"));
        assert!(script.contains("/opt/wingflow/bin/wingflow stage cfd --workdir \"$WORKDIR\" --np 48 --solver Euler || exit 1"));
        assert!(!script.contains("{{"));
        assert!(!script.contains("@wingflow"));
    }
    let first = &report.submitted[0];
    assert_eq!(first.job_id, JobId("1001.pbs".into()));
    assert_eq!(first.root, out.path().join("winglet_c-15_s0"));
}

#[test]
fn convergence_overrides_travel_in_the_job_script() {
    let out = tempfile::tempdir().unwrap();
    let convergence = ConvergenceConfig { initial_spacing: 1e-5,
                                          max_iterations: 3,
                                          y_plus_target: 0.5 };
    let driver = SweepDriver::new(&config(out.path()), RecordingScheduler::default()).with_convergence(convergence);
    let grid = SweepGrid::new(SweepGrid::axis(0.0, 0.2, 0.1).unwrap(), vec![0.0]).unwrap();
    let report = driver.run_sweep(&grid, &StageSelection::full(SolverKind::Viscous), &ResourceRequest::default())
                       .unwrap();

    assert!(report.is_success(), "failed points: {:?}", report.failed);
    for name in ["winglet_c0_s0", "winglet_c0.1_s0", "winglet_c0.2_s0"] {
        let script = fs::read_to_string(out.path().join(name).join("submit.pbs")).unwrap();
        assert!(script.contains("--prism --initial-spacing 0.00001 || exit 1"));
        assert!(script.contains("--solver RANS --y-plus-target 0.5 --max-iterations 3 || exit 1"));
    }
}

#[test]
fn rans_sweep_uses_prism_mesh() {
    let out = tempfile::tempdir().unwrap();
    let driver = SweepDriver::new(&config(out.path()), RecordingScheduler::default());
    let grid = SweepGrid::new(vec![30.0], vec![-10.0]).unwrap();
    let report = driver.run_sweep(&grid, &StageSelection::full(SolverKind::Viscous), &ResourceRequest::new(24, 32, 12))
                       .unwrap();

    assert_eq!(report.submitted.len(), 1);
    let root = out.path().join("winglet_c30_s-10");
    assert!(root.join("MESH/with_prism/macro.java.in").is_file());
    assert!(root.join("CFD/RANS/RANS-cfd.cfg.in").is_file());
    let script = fs::read_to_string(root.join("submit.pbs")).unwrap();
    assert!(script.contains("#PBS -l walltime=12:00:00"));
    assert!(script.contains("--np 24 --prism || exit 1"));
}

#[test]
fn mesh_only_without_wing_model_is_skipped_with_exact_path() {
    let out = tempfile::tempdir().unwrap();
    let driver = SweepDriver::new(&config(out.path()), RecordingScheduler::default());
    let grid = SweepGrid::new(vec![0.0], vec![0.0]).unwrap();
    let selection = StageSelection { geometry: false,
                                     mesh: true,
                                     flow_solve: false,
                                     optimize: false,
                                     ..StageSelection::full(SolverKind::Inviscid) };

    let report = driver.run_sweep(&grid, &selection, &ResourceRequest::default()).unwrap();

    assert!(report.submitted.is_empty());
    assert!(driver.scheduler().scripts.borrow().is_empty());
    assert_eq!(report.failed.len(), 1);
    let expected = WorkspaceLayout::new(out.path().join("winglet_c0_s0")).wing_model();
    assert!(report.failed[0].error.contains(&expected.display().to_string()),
            "unexpected error: {}",
            report.failed[0].error);
    assert!(!out.path().join("winglet_c0_s0/submit.pbs").exists());

    // the single-point entry point surfaces the typed error
    let template = fs::read_to_string(config(out.path()).template_dir.join("submit.pbs")).unwrap();
    let err = driver.submit_point(&template,
                                  &grid.points().next().unwrap(),
                                  &selection,
                                  &ResourceRequest::default())
                    .unwrap_err();
    match err {
        WingflowError::Pipeline(PipelineError::MissingArtifact { stage, path }) => {
            assert_eq!(stage, "mesh");
            assert_eq!(path, expected);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn incompatible_solver_fails_every_point_but_sweep_completes() {
    let out = tempfile::tempdir().unwrap();
    let driver = SweepDriver::new(&config(out.path()), RecordingScheduler::default());
    let grid = SweepGrid::new(vec![0.0, 15.0], vec![0.0]).unwrap();
    let selection = StageSelection { mesh_mode: BoundaryLayerMode::WithoutPrism,
                                     ..StageSelection::full(SolverKind::Viscous) };

    let report = driver.run_sweep(&grid, &selection, &ResourceRequest::default()).unwrap();

    assert!(report.submitted.is_empty());
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed[0].error.contains("prism"));
    // pre-flight failure: no workspace is created
    assert!(!out.path().join("winglet_c0_s0").exists());
}
