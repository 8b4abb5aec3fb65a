use serde_json::{json, Value};
use wing_core::{Artifact, ArtifactKind, ExecutionContext, PipelineError, StageDefinition, StageRunResult};
use wing_domain::layout::{template_copy, GEOMETRY_SCRIPT, WING_MODEL};
use wing_domain::SweepPoint;

use super::{remove_stale, StageEnv};
use crate::invoker::ToolCommand;
use crate::template::{render_file, RenderContext};

/// Genera `GEOMETRY/wing.stp` con el kernel de geometría.
pub struct GeometryStage {
    env: StageEnv,
    point: SweepPoint,
}

impl GeometryStage {
    pub fn new(env: StageEnv, point: SweepPoint) -> Self {
        Self { env, point }
    }

    fn execute(&self) -> Result<Vec<Artifact>, PipelineError> {
        let layout = &self.env.layout;
        let dir = layout.geometry_dir();
        let script = layout.geometry_script();
        let ctx = RenderContext::new().value("CANT", self.point.cant())
                                      .value("SWEEP", self.point.sweep())
                                      .value("OUTPUT", WING_MODEL);
        render_file(&template_copy(&script), &script, &ctx)?;

        let model = layout.wing_model();
        remove_stale(&model)?;
        let cmd = ToolCommand::new("vspscript", &self.env.toolchain.vsp_bin).arg("-script")
                                                                           .arg(format!("./{GEOMETRY_SCRIPT}"));
        self.env.invoke(&cmd, &dir, &model)?;
        Ok(vec![Artifact::declared(ArtifactKind::Geometry, model)])
    }
}

impl StageDefinition for GeometryStage {
    fn id(&self) -> &str {
        "geometry"
    }

    fn base_params(&self) -> Value {
        json!({"cant": self.point.cant(), "sweep": self.point.sweep()})
    }

    fn run(&self, _ctx: &ExecutionContext) -> StageRunResult {
        self.execute().into()
    }
}
