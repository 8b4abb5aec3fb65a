use std::fs;
use std::path::PathBuf;

use log::info;
use serde_json::{json, Value};
use wing_core::{Artifact, ArtifactKind, ExecutionContext, PipelineError, StageDefinition, StageRunResult};
use wing_domain::layout::{template_copy, MESH_FILE, MESH_MACRO};
use wing_domain::{BoundaryLayerMode, MeshSettings};

use super::{remove_stale, require_input, StageEnv};
use crate::invoker::ToolCommand;
use crate::template::{render_file, RenderContext};

/// Malla `MESH/<modo>/mesh.cga` a partir del modelo sólido.
pub struct MeshStage {
    env: StageEnv,
    mode: BoundaryLayerMode,
    settings: MeshSettings,
}

impl MeshStage {
    pub fn new(env: StageEnv, mode: BoundaryLayerMode, settings: MeshSettings) -> Self {
        Self { env, mode, settings }
    }

    pub fn mode(&self) -> BoundaryLayerMode {
        self.mode
    }

    pub fn settings(&self) -> &MeshSettings {
        &self.settings
    }

    /// Malla con los parámetros dados. Escribe `mesh_settings.json`,
    /// renderiza la macro y borra la malla y el estado del mallador previos.
    pub fn mesh_with(&self, settings: &MeshSettings) -> Result<PathBuf, PipelineError> {
        let layout = &self.env.layout;
        let model = layout.wing_model();
        require_input("mesh", &model)?;

        let dir = layout.mesh_dir(self.mode);
        let settings_file = layout.mesh_settings_file(self.mode);
        let body = serde_json::to_string_pretty(settings).map_err(|e| PipelineError::Internal(e.to_string()))?;
        fs::write(&settings_file, body).map_err(|e| PipelineError::io(&settings_file, e))?;

        let macro_file = layout.mesh_macro(self.mode);
        let ctx = RenderContext::new().value("INPUT_MODEL", model.display())
                                      .value("MESH_OUTPUT", MESH_FILE)
                                      .value("NEAR_WALL_SPACING", settings.near_wall_spacing)
                                      .value("PRISM_LAYERS", settings.prism_layers)
                                      .value("PRISM_THICKNESS", settings.prism_thickness)
                                      .value("NP", self.env.np);
        render_file(&template_copy(&macro_file), &macro_file, &ctx)?;

        let mesh = layout.mesh_file(self.mode);
        remove_stale(&mesh)?;
        remove_stale(&layout.mesh_state_file(self.mode))?;

        info!("mesh:start mode={} spacing={} layers={}",
              self.mode, settings.near_wall_spacing, settings.prism_layers);
        self.env.invoke(&self.command(), &dir, &mesh)?;
        Ok(mesh)
    }

    fn command(&self) -> ToolCommand {
        let tc = &self.env.toolchain;
        let mut cmd = ToolCommand::new("starccm", &tc.starccm_bin).arg("-batch")
                                                                 .arg(format!("./{MESH_MACRO}"))
                                                                 .arg("-power");
        if let Some(key) = &tc.starccm_podkey {
            cmd = cmd.arg("-podkey").arg(key.as_str());
        }
        if let Some(lic) = &tc.starccm_licpath {
            cmd = cmd.arg("-licpath").arg(lic.as_str());
        }
        cmd.arg("-np").arg(self.env.np.to_string())
    }
}

impl StageDefinition for MeshStage {
    fn id(&self) -> &str {
        "mesh"
    }

    fn base_params(&self) -> Value {
        json!({
            "mode": self.mode.dir_name(),
            "np": self.env.np,
            "near_wall_spacing": self.settings.near_wall_spacing,
            "prism_layers": self.settings.prism_layers,
        })
    }

    fn run(&self, _ctx: &ExecutionContext) -> StageRunResult {
        self.mesh_with(&self.settings)
            .map(|mesh| vec![Artifact::declared(ArtifactKind::Mesh, mesh)])
            .into()
    }
}
