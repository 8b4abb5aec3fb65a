use std::fs;

use serde_json::{json, Value};
use wing_core::{Artifact, ArtifactKind, ExecutionContext, PipelineError, StageDefinition, StageRunResult};
use wing_domain::layout::{aso_config_name, template_copy, DEFORMED_MESH, MESH_FILE};
use wing_domain::SolverKind;

use super::{remove_stale, stage_mesh_copy, StageEnv};
use crate::invoker::ToolCommand;
use crate::template::{render_file, RenderContext};

/// Optimización de forma por adjunto discreto en `ASO/<solver>/`:
/// deformación de malla, geometría y el driver de optimización.
pub struct OptimizeStage {
    env: StageEnv,
    solver: SolverKind,
}

impl OptimizeStage {
    pub fn new(env: StageEnv, solver: SolverKind) -> Self {
        Self { env, solver }
    }

    fn execute(&self) -> Result<Vec<Artifact>, PipelineError> {
        let layout = &self.env.layout;
        let dir = layout.aso_dir(self.solver);
        stage_mesh_copy("aso", &layout.mesh_file(self.solver.required_mesh_mode()), &dir)?;

        let config = layout.aso_config(self.solver);
        let config_name = aso_config_name(self.solver);
        let ctx = RenderContext::new().value("MESH_FILENAME", MESH_FILE)
                                      .value("MESH_OUT_FILENAME", DEFORMED_MESH)
                                      .value("NP", self.env.np);
        render_file(&template_copy(&config), &config, &ctx)?;

        let su2 = &self.env.toolchain.su2_aso;
        let deformed = layout.deformed_mesh(self.solver);
        remove_stale(&deformed)?;
        let def = self.env
                      .mpi("su2_def", &su2.bin("SU2_DEF"))
                      .arg(config_name.as_str())
                      .envs(su2.child_env());
        self.env.invoke(&def, &dir, &deformed)?;

        let intermediate = layout.intermediate_mesh(self.solver);
        remove_stale(&intermediate)?;
        fs::rename(&deformed, &intermediate).map_err(|e| PipelineError::io(&intermediate, e))?;

        let objective = layout.objective_file(self.solver);
        remove_stale(&objective)?;
        let geo = self.env
                      .mpi("su2_geo", &su2.bin("SU2_GEO"))
                      .arg(config_name.as_str())
                      .envs(su2.child_env());
        self.env.invoke(&geo, &dir, &objective)?;

        let history = layout.optimization_history(self.solver);
        remove_stale(&history)?;
        let opt = ToolCommand::new("shape_optimization", &self.env.toolchain.python)
            .arg(su2.bin("shape_optimization.py").display().to_string())
            .args(["-n".to_string(), self.env.np.to_string()])
            .args(["-g", "DISCRETE_ADJOINT", "-f"])
            .arg(config_name)
            .envs(su2.child_env());
        self.env.invoke(&opt, &dir, &history)?;

        Ok(vec![Artifact::declared(ArtifactKind::Mesh, intermediate),
                Artifact::declared(ArtifactKind::Optimization, objective),
                Artifact::declared(ArtifactKind::Optimization, history)])
    }
}

impl StageDefinition for OptimizeStage {
    fn id(&self) -> &str {
        "aso"
    }

    fn base_params(&self) -> Value {
        json!({"solver": self.solver.dir_name(), "np": self.env.np})
    }

    fn run(&self, _ctx: &ExecutionContext) -> StageRunResult {
        self.execute().into()
    }
}
