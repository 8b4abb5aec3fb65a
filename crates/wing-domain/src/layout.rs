//! Contrato de directorios de un punto del barrido.
//!
//! Las etapas sólo se comunican a través de estas rutas, así que productores
//! y consumidores las obtienen siempre de aquí.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::selection::{BoundaryLayerMode, SolverKind, Stage};
use crate::sweep::SweepPoint;

pub const GEOMETRY_DIR: &str = "GEOMETRY";
pub const MESH_DIR: &str = "MESH";
pub const CFD_DIR: &str = "CFD";
pub const ASO_DIR: &str = "ASO";

pub const WING_MODEL: &str = "wing.stp";
pub const GEOMETRY_SCRIPT: &str = "winggen.vspscript";
pub const MESH_MACRO: &str = "macro.java";
pub const MESH_FILE: &str = "mesh.cga";
pub const MESH_STATE_FILE: &str = "star@meshed.sim";
pub const MESH_SETTINGS_FILE: &str = "mesh_settings.json";
pub const FLOW_FIELD: &str = "flow.vtu";
pub const SURFACE_FIELD: &str = "surface_flow.csv";
pub const DEFORMED_MESH: &str = "mesh_out.su2";
pub const INTERMEDIATE_MESH: &str = "mesh.su2";
pub const OBJECTIVE_FILE: &str = "of_func.csv";
pub const OPTIMIZATION_HISTORY: &str = "history_project.csv";
pub const SUBMIT_SCRIPT: &str = "submit.pbs";
pub const EVENTS_FILE: &str = "events.jsonl";

/// Sufijo de las plantillas copiadas a cada directorio de etapa.
pub const TEMPLATE_SUFFIX: &str = ".in";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn for_point(output_dir: &Path, point: &SweepPoint) -> Self {
        Self::new(output_dir.join(point.workspace_name()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn geometry_dir(&self) -> PathBuf {
        self.root.join(GEOMETRY_DIR)
    }

    /// Modelo sólido producido por la etapa de geometría.
    pub fn wing_model(&self) -> PathBuf {
        self.geometry_dir().join(WING_MODEL)
    }

    pub fn geometry_script(&self) -> PathBuf {
        self.geometry_dir().join(GEOMETRY_SCRIPT)
    }

    pub fn mesh_dir(&self, mode: BoundaryLayerMode) -> PathBuf {
        self.root.join(MESH_DIR).join(mode.dir_name())
    }

    pub fn mesh_macro(&self, mode: BoundaryLayerMode) -> PathBuf {
        self.mesh_dir(mode).join(MESH_MACRO)
    }

    pub fn mesh_file(&self, mode: BoundaryLayerMode) -> PathBuf {
        self.mesh_dir(mode).join(MESH_FILE)
    }

    pub fn mesh_state_file(&self, mode: BoundaryLayerMode) -> PathBuf {
        self.mesh_dir(mode).join(MESH_STATE_FILE)
    }

    pub fn mesh_settings_file(&self, mode: BoundaryLayerMode) -> PathBuf {
        self.mesh_dir(mode).join(MESH_SETTINGS_FILE)
    }

    pub fn cfd_dir(&self, solver: SolverKind) -> PathBuf {
        self.root.join(CFD_DIR).join(solver.dir_name())
    }

    pub fn cfd_config(&self, solver: SolverKind) -> PathBuf {
        self.cfd_dir(solver).join(cfd_config_name(solver))
    }

    pub fn flow_field(&self, solver: SolverKind) -> PathBuf {
        self.cfd_dir(solver).join(FLOW_FIELD)
    }

    pub fn surface_field(&self, solver: SolverKind) -> PathBuf {
        self.cfd_dir(solver).join(SURFACE_FIELD)
    }

    pub fn aso_dir(&self, solver: SolverKind) -> PathBuf {
        self.root.join(ASO_DIR).join(solver.dir_name())
    }

    pub fn aso_config(&self, solver: SolverKind) -> PathBuf {
        self.aso_dir(solver).join(aso_config_name(solver))
    }

    pub fn deformed_mesh(&self, solver: SolverKind) -> PathBuf {
        self.aso_dir(solver).join(DEFORMED_MESH)
    }

    pub fn intermediate_mesh(&self, solver: SolverKind) -> PathBuf {
        self.aso_dir(solver).join(INTERMEDIATE_MESH)
    }

    pub fn objective_file(&self, solver: SolverKind) -> PathBuf {
        self.aso_dir(solver).join(OBJECTIVE_FILE)
    }

    pub fn optimization_history(&self, solver: SolverKind) -> PathBuf {
        self.aso_dir(solver).join(OPTIMIZATION_HISTORY)
    }

    pub fn submit_script(&self) -> PathBuf {
        self.root.join(SUBMIT_SCRIPT)
    }

    pub fn events_file(&self) -> PathBuf {
        self.root.join(EVENTS_FILE)
    }

    /// Directorio de trabajo de una etapa para la selección dada.
    pub fn stage_dir(&self, stage: Stage, mode: BoundaryLayerMode, solver: SolverKind) -> PathBuf {
        match stage {
            Stage::Geometry => self.geometry_dir(),
            Stage::Mesh => self.mesh_dir(mode),
            Stage::FlowSolve => self.cfd_dir(solver),
            Stage::Optimize => self.aso_dir(solver),
        }
    }

    /// Artifact principal que una etapa deja para la siguiente.
    pub fn stage_output(&self, stage: Stage, mode: BoundaryLayerMode, solver: SolverKind) -> PathBuf {
        match stage {
            Stage::Geometry => self.wing_model(),
            Stage::Mesh => self.mesh_file(mode),
            Stage::FlowSolve => self.flow_field(solver),
            Stage::Optimize => self.objective_file(solver),
        }
    }
}

pub fn cfd_config_name(solver: SolverKind) -> String {
    format!("{}-cfd.cfg", solver.dir_name())
}

pub fn aso_config_name(solver: SolverKind) -> String {
    format!("{}-shapeOptimisation.cfg", solver.dir_name())
}

/// Ruta de la copia de plantilla (`<file>.in`) de un fichero renderizable.
pub fn template_copy(rendered: &Path) -> PathBuf {
    let mut name = rendered.as_os_str().to_os_string();
    name.push(TEMPLATE_SUFFIX);
    PathBuf::from(name)
}
