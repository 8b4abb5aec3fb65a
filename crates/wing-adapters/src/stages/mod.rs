//! Etapas concretas del pipeline.
//!
//! Cada etapa lee sus entradas del layout, renderiza su plantilla `.in`,
//! invoca la herramienta externa y declara los ficheros producidos.

pub mod flow_solve;
pub mod geometry;
pub mod mesh;
pub mod optimize;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use wing_core::PipelineError;
use wing_domain::WorkspaceLayout;

pub use flow_solve::FlowSolveStage;
pub use geometry::GeometryStage;
pub use mesh::MeshStage;
pub use optimize::OptimizeStage;

use crate::invoker::{ToolCommand, ToolInvoker};
use crate::toolchain::ToolchainConfig;

/// Todo lo que una etapa necesita del exterior.
#[derive(Clone)]
pub struct StageEnv {
    pub layout: WorkspaceLayout,
    pub toolchain: ToolchainConfig,
    pub invoker: Arc<dyn ToolInvoker>,
    /// Procesos MPI por herramienta.
    pub np: u32,
}

impl StageEnv {
    pub fn new(layout: WorkspaceLayout, toolchain: ToolchainConfig, invoker: Arc<dyn ToolInvoker>, np: u32) -> Self {
        Self { layout,
               toolchain,
               invoker,
               np }
    }

    pub(crate) fn invoke(&self, command: &ToolCommand, working_dir: &Path, output: &Path) -> Result<(), PipelineError> {
        self.invoker.run(command, working_dir, output, self.toolchain.tool_timeout)
    }

    /// `mpiexec -n <np> <bin> <args..>`
    pub(crate) fn mpi(&self, tool: &str, bin: &Path) -> ToolCommand {
        ToolCommand::new(tool, &self.toolchain.mpiexec).arg("-n")
                                                       .arg(self.np.to_string())
                                                       .arg(bin.display().to_string())
    }
}

pub(crate) fn require_input(stage: &str, path: &Path) -> Result<(), PipelineError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::MissingArtifact { stage: stage.to_string(),
                                             path: path.to_path_buf() })
    }
}

/// Borra un fichero de una ejecución anterior; no existir no es un error.
pub(crate) fn remove_stale(path: &Path) -> Result<(), PipelineError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PipelineError::io(path, e)),
    }
}

/// Copia de trabajo de la malla en el directorio de la etapa.
pub(crate) fn stage_mesh_copy(stage: &str, source: &Path, dir: &Path) -> Result<std::path::PathBuf, PipelineError> {
    require_input(stage, source)?;
    let dest = dir.join(wing_domain::layout::MESH_FILE);
    fs::copy(source, &dest).map_err(|e| PipelineError::io(&dest, e))?;
    Ok(dest)
}
