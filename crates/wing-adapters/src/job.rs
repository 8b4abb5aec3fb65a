//! Script de envío de un punto del barrido.

use std::path::PathBuf;

use wing_core::PipelineError;
use wing_domain::{ResourceRequest, Stage, StageSelection, SweepPoint, WorkspaceLayout};

use crate::convergence::ConvergenceConfig;
use crate::template::{render, RenderContext};

/// Construye el contexto del script de envío y lo renderiza.
#[derive(Debug, Clone)]
pub struct JobRenderer {
    /// Binario `wingflow` disponible en el nodo de cómputo.
    wingflow_bin: PathBuf,
    /// Parámetros del bucle de y+ que se pasan a mesh y cfd; `None` deja
    /// los valores por defecto del nodo.
    convergence: Option<ConvergenceConfig>,
}

impl JobRenderer {
    pub fn new(wingflow_bin: impl Into<PathBuf>) -> Self {
        Self { wingflow_bin: wingflow_bin.into(),
               convergence: None }
    }

    pub fn with_convergence(mut self, convergence: ConvergenceConfig) -> Self {
        self.convergence = Some(convergence);
        self
    }

    pub fn render(&self,
                  template: &str,
                  point: &SweepPoint,
                  resources: &ResourceRequest,
                  selection: &StageSelection,
                  layout: &WorkspaceLayout)
                  -> Result<String, PipelineError> {
        render(template, &self.context(point, resources, selection, layout))
    }

    pub fn context(&self,
                   point: &SweepPoint,
                   resources: &ResourceRequest,
                   selection: &StageSelection,
                   layout: &WorkspaceLayout)
                   -> RenderContext {
        let workdir = shell_word(&layout.root().display().to_string());
        let bin = shell_word(&self.wingflow_bin.display().to_string());
        let mut ctx = RenderContext::new().value("JOB_NAME", point.workspace_name())
                                          .value("CANT", point.cant())
                                          .value("SWEEP", point.sweep())
                                          .value("WORKDIR", &workdir)
                                          .value("NP", resources.np)
                                          .value("MEM_GB", resources.mem_gb)
                                          .value("WALLTIME_HOURS", resources.walltime_hours)
                                          .value("WINGFLOW_BIN", &bin)
                                          .with_resources(*resources)
                                          .with_params_block(params_block(point, selection, &workdir));
        for stage in Stage::ALL {
            let command = selection.is_enabled(stage)
                                   .then(|| {
                                       stage_command(&bin,
                                                     stage,
                                                     point,
                                                     resources,
                                                     selection,
                                                     self.convergence.as_ref())
                                   });
            ctx = ctx.invocation(stage.id(), command);
        }
        ctx
    }
}

/// Bloque de variables que el script exporta al principio.
pub fn params_block(point: &SweepPoint, selection: &StageSelection, workdir: &str) -> String {
    let flag = |on: bool| if on { 1 } else { 0 };
    [format!("GEO={}", flag(selection.geometry)),
     format!("MESH={}", flag(selection.mesh)),
     format!("PRISM_LAYER={}", flag(selection.mesh_mode.is_prism())),
     format!("CFD={}", flag(selection.flow_solve)),
     format!("CFD_SOLVER={}", selection.flow_solver),
     format!("ASO={}", flag(selection.optimize)),
     format!("ASO_SOLVER={}", selection.optimizer_solver),
     format!("CANT={}", point.cant()),
     format!("SWEEP={}", point.sweep()),
     format!("WORKDIR={workdir}")].join("\n")
}

/// Línea que ejecuta una etapa en el nodo de cómputo; aborta el job si falla.
pub fn stage_command(bin: &str,
                     stage: Stage,
                     point: &SweepPoint,
                     resources: &ResourceRequest,
                     selection: &StageSelection,
                     convergence: Option<&ConvergenceConfig>)
                     -> String {
    let mut cmd = format!("{bin} stage {} --workdir \"$WORKDIR\"", stage.id());
    match stage {
        Stage::Geometry => {
            cmd.push_str(&format!(" --cant {} --sweep {}", point.cant(), point.sweep()));
        }
        Stage::Mesh => {
            cmd.push_str(&format!(" --np {}", resources.np));
            if selection.mesh_mode.is_prism() {
                cmd.push_str(" --prism");
            }
            if let Some(c) = convergence {
                cmd.push_str(&format!(" --initial-spacing {}", c.initial_spacing));
            }
        }
        Stage::FlowSolve | Stage::Optimize => {
            let solver = selection.solver_for(stage).unwrap_or(selection.flow_solver);
            cmd.push_str(&format!(" --np {} --solver {solver}", resources.np));
            if let (Stage::FlowSolve, Some(c)) = (stage, convergence) {
                cmd.push_str(&format!(" --y-plus-target {} --max-iterations {}",
                                      c.y_plus_target, c.max_iterations));
            }
        }
    }
    cmd.push_str(" || exit 1");
    cmd
}

/// Entrecomilla una palabra de shell sólo si hace falta.
fn shell_word(raw: &str) -> String {
    let safe = raw.chars()
                  .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | '@' | ':' | ','));
    if safe && !raw.is_empty() {
        raw.to_string()
    } else {
        format!("'{}'", raw.replace('\'', r"'\''"))
    }
}

/// Escribe el script renderizado en `<root>/submit.pbs`.
pub fn write_submit_script(layout: &WorkspaceLayout, text: &str) -> Result<PathBuf, PipelineError> {
    let path = layout.submit_script();
    std::fs::write(&path, text).map_err(|e| PipelineError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use wing_domain::SolverKind;

    use super::*;

    const TEMPLATE: &str = "#!/bin/bash\n\
#PBS -l walltime=01:00:00\n\
#PBS -l select=1:ncpus=1:mem=1gb\n\
#PBS -N {{JOB_NAME}}\n\
# @wingflow:params\n\
cd \"$WORKDIR\"\n\
# @wingflow:invoke geometry\n\
# @wingflow:invoke mesh\n\
# @wingflow:invoke cfd\n\
# @wingflow:invoke aso\n";

    fn inputs() -> (SweepPoint, ResourceRequest, StageSelection, WorkspaceLayout) {
        let point = SweepPoint::new(-15.0, 0.0);
        let layout = WorkspaceLayout::for_point(Path::new("/scratch/out"), &point);
        (point, ResourceRequest::new(48, 64, 8), StageSelection::full(SolverKind::Inviscid), layout)
    }

    #[test]
    fn renders_the_full_job() {
        let (point, res, sel, layout) = inputs();
        let out = JobRenderer::new("wingflow").render(TEMPLATE, &point, &res, &sel, &layout).unwrap();
        assert!(out.contains("#PBS -l walltime=8:00:00\n"));
        assert!(out.contains("#PBS -l select=1:ncpus=48:mem=64gb\n"));
        assert!(out.contains("#PBS -N winglet_c-15_s0\n"));
        assert!(out.contains("PRISM_LAYER=0\nCFD=1\nCFD_SOLVER=Euler\n"));
        assert!(out.contains("WORKDIR=/scratch/out/winglet_c-15_s0\n"));
        assert!(out.contains("wingflow stage geometry --workdir \"$WORKDIR\" --cant -15 --sweep 0 || exit 1\n"));
        assert!(out.contains("wingflow stage aso --workdir \"$WORKDIR\" --np 48 --solver Euler || exit 1\n"));
    }

    #[test]
    fn rendering_is_byte_identical_across_calls() {
        let (point, res, sel, layout) = inputs();
        let renderer = JobRenderer::new("/opt/bin/wingflow");
        let a = renderer.render(TEMPLATE, &point, &res, &sel, &layout).unwrap();
        let b = renderer.render(TEMPLATE, &point, &res, &sel, &layout).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn disabled_stages_become_comments() {
        let (point, res, mut sel, layout) = inputs();
        sel.optimize = false;
        let out = JobRenderer::new("wingflow").render(TEMPLATE, &point, &res, &sel, &layout).unwrap();
        assert!(out.contains("# aso: disabled\n"));
        assert!(out.contains("ASO=0\n"));
    }

    #[test]
    fn rans_mesh_command_requests_prism_layer() {
        let (point, res, _, layout) = inputs();
        let sel = StageSelection::full(SolverKind::Viscous);
        let out = JobRenderer::new("wingflow").render(TEMPLATE, &point, &res, &sel, &layout).unwrap();
        assert!(out.contains("stage mesh --workdir \"$WORKDIR\" --np 48 --prism || exit 1"));
        assert!(out.contains("--solver RANS"));
    }

    #[test]
    fn convergence_settings_reach_mesh_and_cfd_lines() {
        let (point, res, _, layout) = inputs();
        let sel = StageSelection::full(SolverKind::Viscous);
        let convergence = ConvergenceConfig { initial_spacing: 2.5e-6,
                                              max_iterations: 7,
                                              y_plus_target: 0.8 };
        let out = JobRenderer::new("wingflow").with_convergence(convergence)
                                              .render(TEMPLATE, &point, &res, &sel, &layout)
                                              .unwrap();
        assert!(out.contains("stage mesh --workdir \"$WORKDIR\" --np 48 --prism --initial-spacing 0.0000025 || exit 1"));
        assert!(out.contains("stage cfd --workdir \"$WORKDIR\" --np 48 --solver RANS --y-plus-target 0.8 --max-iterations 7 || exit 1"));
        assert!(out.contains("stage aso --workdir \"$WORKDIR\" --np 48 --solver RANS || exit 1"));
    }

    #[test]
    fn default_jobs_leave_convergence_to_the_node() {
        let (point, res, sel, layout) = inputs();
        let out = JobRenderer::new("wingflow").render(TEMPLATE, &point, &res, &sel, &layout).unwrap();
        assert!(!out.contains("--initial-spacing"));
        assert!(!out.contains("--y-plus-target"));
    }

    #[test]
    fn workdir_with_spaces_is_quoted() {
        assert_eq!(shell_word("/a b/c"), "'/a b/c'");
        assert_eq!(shell_word("/plain/path"), "/plain/path");
    }
}
