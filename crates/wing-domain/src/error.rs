use std::path::PathBuf;

use thiserror::Error;

use crate::selection::{BoundaryLayerMode, SolverKind, Stage};

/// Errores de configuración detectados antes de invocar cualquier
/// herramienta externa. Nunca se reintentan.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{solver} solver requires a mesh generated {} (got {mode})", required_mode_text(.solver))]
    SolverMeshMismatch { stage: Stage, solver: SolverKind, mode: BoundaryLayerMode },

    #[error("stage {stage} requires {} produced by an earlier run or by stage {producer}", .path.display())]
    MissingUpstream { stage: Stage, producer: Stage, path: PathBuf },

    #[error("unknown solver '{0}' (expected euler or rans)")]
    UnknownSolver(String),

    #[error("sweep axis '{0}' is empty")]
    EmptyAxis(&'static str),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

fn required_mode_text(solver: &SolverKind) -> &'static str {
    match solver.required_mesh_mode() {
        BoundaryLayerMode::WithPrism => "with a prism layer",
        BoundaryLayerMode::WithoutPrism => "without a prism layer",
    }
}
