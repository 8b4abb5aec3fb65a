use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wing_adapters::layout::all_template_names;
use wing_adapters::pipeline::build_stage;
use wing_adapters::{build_pipeline, run_stages, ConvergenceConfig, LayoutManager, StageEnv, ToolCommand,
                    ToolInvoker, ToolchainConfig};
use wing_core::{CancellationToken, PipelineError};
use wing_domain::{BoundaryLayerMode, MeshSettings, SolverKind, Stage, StageSelection, SweepPoint, WorkspaceLayout};

/// Herramientas simuladas: el mallador graba la altura de primera celda en
/// la malla y el solver devuelve `y+ = scale * spacing`.
struct FakeTools {
    calls: Mutex<Vec<String>>,
    y_plus_scale: f64,
}

impl FakeTools {
    fn new(y_plus_scale: f64) -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(Vec::new()),
                        y_plus_scale })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ToolInvoker for FakeTools {
    fn run(&self,
           command: &ToolCommand,
           working_dir: &Path,
           declared_output: &Path,
           _timeout: Option<Duration>)
           -> Result<(), PipelineError> {
        self.calls.lock().unwrap().push(command.tool.clone());
        let body = match command.tool.as_str() {
            "starccm" => {
                let text = fs::read_to_string(working_dir.join("mesh_settings.json")).unwrap();
                let settings: MeshSettings = serde_json::from_str(&text).unwrap();
                settings.near_wall_spacing.to_string()
            }
            "su2_cfd" => {
                let spacing: f64 = fs::read_to_string(working_dir.join("mesh.cga")).unwrap().parse().unwrap();
                let csv = format!("\"PointID\",\"Y_Plus\"\n0,{}\n1,0.01\n", self.y_plus_scale * spacing);
                fs::write(working_dir.join("surface_flow.csv"), csv).unwrap();
                "field".to_string()
            }
            other => format!("{other} output"),
        };
        fs::write(declared_output, body).unwrap();
        Ok(())
    }
}

fn toolchain() -> ToolchainConfig {
    let vars: HashMap<&str, &str> = HashMap::from([("WINGFLOW_VSP_BIN", "vspscript"),
                                                   ("WINGFLOW_STARCCM_BIN", "starccm+"),
                                                   ("WINGFLOW_SU2_CFD_RUN", "/su2/bin"),
                                                   ("WINGFLOW_SU2_CFD_HOME", "/su2/src"),
                                                   ("WINGFLOW_SU2_ASO_RUN", "/su2ad/bin"),
                                                   ("WINGFLOW_SU2_ASO_HOME", "/su2ad/src")]);
    ToolchainConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap()
}

fn templates() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in all_template_names() {
        let body = if name.starts_with("macro_") {
            "// {{INPUT_MODEL}}\nspacing={{NEAR_WALL_SPACING}}\nlayers={{PRISM_LAYERS}}\n".to_string()
        } else if name.ends_with(".cfg") {
            "MESH_FILENAME= {{MESH_FILENAME}}\n".to_string()
        } else {
            format!("# {name}\n")
        };
        fs::write(dir.path().join(name), body).unwrap();
    }
    dir
}

fn env_for(layout: WorkspaceLayout, tools: Arc<FakeTools>) -> StageEnv {
    StageEnv::new(layout, toolchain(), tools, 4)
}

#[test]
fn rans_pipeline_refines_mesh_until_y_plus_below_one() {
    let tpl = templates();
    let out = tempfile::tempdir().unwrap();
    let point = SweepPoint::new(15.0, 10.0);
    let sel = StageSelection::full(SolverKind::Viscous);
    let layout = LayoutManager::new(tpl.path()).ensure_layout(&out.path().join(point.workspace_name()), &sel)
                                               .unwrap();
    let tools = FakeTools::new(4400.0);
    let env = env_for(layout.clone(), tools.clone());

    let stages = build_pipeline(&env, &sel, Some(point), ConvergenceConfig::default()).unwrap();
    run_stages(&layout, stages, CancellationToken::new()).unwrap();

    assert_eq!(tools.calls(),
               vec!["vspscript", "starccm", "su2_cfd", "starccm", "su2_cfd", "su2_def", "su2_geo",
                    "shape_optimization"]);
    let text = fs::read_to_string(layout.mesh_settings_file(BoundaryLayerMode::WithPrism)).unwrap();
    let settings: MeshSettings = serde_json::from_str(&text).unwrap();
    assert!((settings.near_wall_spacing - 0.001 / (4.4 * 1.1)).abs() < 1e-12);
    let macro_text = fs::read_to_string(layout.mesh_macro(BoundaryLayerMode::WithPrism)).unwrap();
    assert!(macro_text.contains(&format!("spacing={}", settings.near_wall_spacing)));
    assert!(macro_text.contains(&layout.wing_model().display().to_string()));
    assert!(layout.intermediate_mesh(SolverKind::Viscous).is_file());
    assert!(!layout.deformed_mesh(SolverKind::Viscous).exists());

    let log = fs::read_to_string(layout.events_file()).unwrap();
    assert!(log.contains("mesh_refined"));
    assert!(log.contains("mesh_converged"));
    assert!(log.contains("FlowCompleted"));
}

#[test]
fn euler_pipeline_skips_the_convergence_loop() {
    let tpl = templates();
    let out = tempfile::tempdir().unwrap();
    let sel = StageSelection::full(SolverKind::Inviscid);
    let layout = LayoutManager::new(tpl.path()).ensure_layout(out.path(), &sel).unwrap();
    let tools = FakeTools::new(4400.0);
    let env = env_for(layout.clone(), tools.clone());
    let stages = build_pipeline(&env, &sel, Some(SweepPoint::new(0.0, 0.0)), ConvergenceConfig::default()).unwrap();
    run_stages(&layout, stages, CancellationToken::new()).unwrap();
    assert_eq!(tools.calls(),
               vec!["vspscript", "starccm", "su2_cfd", "su2_def", "su2_geo", "shape_optimization"]);
    assert!(layout.flow_field(SolverKind::Inviscid).is_file());
}

#[test]
fn missing_wing_model_stops_mesh_stage_with_exact_path() {
    let tpl = templates();
    let out = tempfile::tempdir().unwrap();
    let sel = StageSelection { geometry: false,
                               flow_solve: false,
                               optimize: false,
                               ..StageSelection::full(SolverKind::Inviscid) };
    let layout = LayoutManager::new(tpl.path()).ensure_layout(out.path(), &sel).unwrap();
    let tools = FakeTools::new(1.0);
    let env = env_for(layout.clone(), tools.clone());

    let expected = PipelineError::MissingArtifact { stage: "mesh".into(),
                                                    path: layout.wing_model() };
    assert_eq!(build_pipeline(&env, &sel, None, ConvergenceConfig::default()).err(),
               Some(expected.clone()));

    // the stage itself guards the input too
    let mesh = build_stage(&env, Stage::Mesh, &sel, None, ConvergenceConfig::default()).unwrap();
    assert_eq!(run_stages(&layout, vec![mesh], CancellationToken::new()).unwrap_err(), expected);
    assert!(tools.calls().is_empty());
}

#[test]
fn cancelled_token_runs_nothing() {
    let tpl = templates();
    let out = tempfile::tempdir().unwrap();
    let sel = StageSelection::full(SolverKind::Inviscid);
    let layout = LayoutManager::new(tpl.path()).ensure_layout(out.path(), &sel).unwrap();
    let tools = FakeTools::new(1.0);
    let env = env_for(layout.clone(), tools.clone());
    let stages = build_pipeline(&env, &sel, Some(SweepPoint::new(0.0, 0.0)), ConvergenceConfig::default()).unwrap();
    let token = CancellationToken::new();
    token.cancel();
    assert_eq!(run_stages(&layout, stages, token).unwrap_err(), PipelineError::Cancelled);
    assert!(tools.calls().is_empty());
}

#[test]
fn convergence_cap_fails_the_flow_solve_stage() {
    let tpl = templates();
    let out = tempfile::tempdir().unwrap();
    let sel = StageSelection::full(SolverKind::Viscous);
    let layout = LayoutManager::new(tpl.path()).ensure_layout(out.path(), &sel).unwrap();
    // y+ = 1e9 * spacing never drops below one within two solves
    let tools = FakeTools::new(1e9);
    let env = env_for(layout.clone(), tools.clone());
    let config = ConvergenceConfig { max_iterations: 2,
                                     ..ConvergenceConfig::default() };
    let stages = build_pipeline(&env, &sel, Some(SweepPoint::new(0.0, 0.0)), config).unwrap();
    let err = run_stages(&layout, stages, CancellationToken::new()).unwrap_err();
    assert!(matches!(err, PipelineError::ConvergenceFailure { iterations: 2, .. }));
    assert!(!tools.calls().contains(&"su2_def".to_string()));
}

#[test]
fn corrupt_mesh_settings_fail_the_convergence_loop() {
    let tpl = templates();
    let out = tempfile::tempdir().unwrap();
    let sel = StageSelection::full(SolverKind::Viscous);
    let layout = LayoutManager::new(tpl.path()).ensure_layout(out.path(), &sel).unwrap();
    let tools = FakeTools::new(4400.0);
    let env = env_for(layout.clone(), tools.clone());
    let point = Some(SweepPoint::new(0.0, 0.0));
    let upstream = vec![build_stage(&env, Stage::Geometry, &sel, point, ConvergenceConfig::default()).unwrap(),
                        build_stage(&env, Stage::Mesh, &sel, point, ConvergenceConfig::default()).unwrap()];
    run_stages(&layout, upstream, CancellationToken::new()).unwrap();

    let settings = layout.mesh_settings_file(BoundaryLayerMode::WithPrism);
    fs::write(&settings, "{ not json").unwrap();
    let cfd = build_stage(&env, Stage::FlowSolve, &sel, point, ConvergenceConfig::default()).unwrap();
    let err = run_stages(&layout, vec![cfd], CancellationToken::new()).unwrap_err();

    match err {
        PipelineError::Io(message) => assert!(message.contains("mesh_settings.json"), "{message}"),
        other => panic!("expected an io error, got {other:?}"),
    }
    assert_eq!(tools.calls(), vec!["vspscript", "starccm"]);
}
