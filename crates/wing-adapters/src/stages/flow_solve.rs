use std::fs;
use std::io::ErrorKind;

use log::{info, warn};
use serde_json::{json, Value};
use wing_core::{Artifact, ArtifactKind, CancellationToken, ExecutionContext, PipelineError, StageDefinition,
                StageRunResult};
use wing_domain::layout::{cfd_config_name, template_copy, MESH_FILE};
use wing_domain::{BoundaryLayerMode, MeshSettings, SolverKind};
use wing_policies::{GeometricGrowthPolicy, RefinementParams, RefinementPolicy};

use super::{remove_stale, stage_mesh_copy, MeshStage, StageEnv};
use crate::convergence::{ConvergenceConfig, ConvergenceReport, MeshConvergenceController, RefinementDriver};
use crate::probe::max_y_plus;
use crate::template::{render_file, RenderContext};

/// Solución de flujo en `CFD/<solver>/`. Con RANS y bucle de convergencia
/// activo, vuelve a mallar hasta que el `y+` máximo cumple el umbral.
pub struct FlowSolveStage {
    env: StageEnv,
    solver: SolverKind,
    convergence: Option<ConvergenceSetup>,
}

struct ConvergenceSetup {
    config: ConvergenceConfig,
    mesher: MeshStage,
}

impl FlowSolveStage {
    pub fn new(env: StageEnv, solver: SolverKind) -> Self {
        Self { env,
               solver,
               convergence: None }
    }

    /// Activa el bucle de convergencia; sólo tiene efecto con RANS.
    pub fn with_convergence(mut self, config: ConvergenceConfig) -> Self {
        if self.solver == SolverKind::Viscous {
            let settings = MeshSettings::default().with_spacing(config.initial_spacing);
            let mesher = MeshStage::new(self.env.clone(), BoundaryLayerMode::WithPrism, settings);
            self.convergence = Some(ConvergenceSetup { config, mesher });
        } else {
            warn!("cfd:convergence loop ignored for solver={}", self.solver);
        }
        self
    }

    fn mode(&self) -> BoundaryLayerMode {
        self.solver.required_mesh_mode()
    }

    /// Una ejecución del solver sobre la malla actual del modo requerido.
    pub fn solve_once(&self) -> Result<(), PipelineError> {
        let layout = &self.env.layout;
        let dir = layout.cfd_dir(self.solver);
        stage_mesh_copy("cfd", &layout.mesh_file(self.mode()), &dir)?;

        let config = layout.cfd_config(self.solver);
        let ctx = RenderContext::new().value("MESH_FILENAME", MESH_FILE)
                                      .value("VOLUME_OUTPUT", "flow")
                                      .value("SURFACE_OUTPUT", "surface_flow")
                                      .value("NP", self.env.np);
        render_file(&template_copy(&config), &config, &ctx)?;

        let field = layout.flow_field(self.solver);
        remove_stale(&field)?;
        remove_stale(&layout.surface_field(self.solver))?;

        let su2 = &self.env.toolchain.su2_cfd;
        let cmd = self.env
                      .mpi("su2_cfd", &su2.bin("SU2_CFD"))
                      .arg(cfd_config_name(self.solver))
                      .envs(su2.child_env());
        info!("cfd:solve solver={} root={}", self.solver, layout.root().display());
        self.env.invoke(&cmd, &dir, &field)
    }

    /// Parámetros con los que se generó la malla vigente.
    /// Sin fichero se parte de la configuración inicial; un fichero ilegible
    /// es un error.
    fn current_mesh_settings(&self, setup: &ConvergenceSetup) -> Result<MeshSettings, PipelineError> {
        let path = self.env.layout.mesh_settings_file(BoundaryLayerMode::WithPrism);
        match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| PipelineError::io(&path, e.into())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let initial = *setup.mesher.settings();
                warn!("cfd:no {} found, assuming spacing={} layers={}",
                      path.display(),
                      initial.near_wall_spacing,
                      initial.prism_layers);
                Ok(initial)
            }
            Err(e) => Err(PipelineError::io(&path, e)),
        }
    }

    fn converge(&self, setup: &ConvergenceSetup, cancel: &CancellationToken) -> Result<ConvergenceReport, PipelineError> {
        let policy = GeometricGrowthPolicy::new(RefinementParams::default().with_threshold(setup.config.y_plus_target));
        info!("cfd:convergence policy={} target={} max_iterations={}",
              policy.id(), setup.config.y_plus_target, setup.config.max_iterations);
        let controller = MeshConvergenceController::new(policy, setup.config.max_iterations);
        let driver = SolveDriver { stage: self,
                                   mesher: &setup.mesher };
        controller.run(&driver, self.current_mesh_settings(setup)?, cancel)
    }

    fn outputs(&self) -> Vec<Artifact> {
        let layout = &self.env.layout;
        let mut outputs = vec![Artifact::declared(ArtifactKind::FlowField, layout.flow_field(self.solver))];
        if self.convergence.is_some() {
            outputs.push(Artifact::declared(ArtifactKind::FlowField, layout.surface_field(self.solver)));
            outputs.push(Artifact::declared(ArtifactKind::Mesh, layout.mesh_file(self.mode())));
        }
        outputs
    }
}

struct SolveDriver<'a> {
    stage: &'a FlowSolveStage,
    mesher: &'a MeshStage,
}

impl RefinementDriver for SolveDriver<'_> {
    fn solve(&self) -> Result<(), PipelineError> {
        self.stage.solve_once()
    }

    fn evaluate(&self) -> Result<f64, PipelineError> {
        max_y_plus(&self.stage.env.layout.surface_field(self.stage.solver))
    }

    fn remesh(&self, settings: &MeshSettings) -> Result<(), PipelineError> {
        self.mesher.mesh_with(settings).map(|_| ())
    }
}

impl StageDefinition for FlowSolveStage {
    fn id(&self) -> &str {
        "cfd"
    }

    fn base_params(&self) -> Value {
        json!({
            "solver": self.solver.dir_name(),
            "np": self.env.np,
            "convergence": self.convergence.as_ref().map(|c| c.config),
        })
    }

    fn run(&self, ctx: &ExecutionContext) -> StageRunResult {
        match &self.convergence {
            None => self.solve_once().map(|_| self.outputs()).into(),
            Some(setup) => match self.converge(setup, &ctx.cancel) {
                Ok(report) => StageRunResult::SuccessWithSignals { outputs: self.outputs(),
                                                                   signals: report.signals },
                Err(error) => StageRunResult::Failure { error },
            },
        }
    }
}
