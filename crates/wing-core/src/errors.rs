//! Errores del motor de etapas.
//!
//! `PipelineError` es la taxonomía completa que puede abortar una instancia
//! del pipeline. Es `Clone + Serialize` porque se guarda dentro de los
//! eventos `StageFailed`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone, Serialize, Deserialize)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("stage '{stage}' is missing required artifact {}", .path.display())]
    MissingArtifact { stage: String, path: PathBuf },

    #[error("template file not found: {}", .path.display())]
    MissingTemplate { path: PathBuf },

    #[error("could not create directory {}: {reason}", .path.display())]
    DirectoryCreation { path: PathBuf, reason: String },

    #[error("unresolved template token '{token}' at line {line}")]
    UnresolvedToken { token: String, line: usize },

    #[error("tool '{tool}' failed (exit code {exit_code:?}): {stderr_excerpt}")]
    ToolFailure {
        tool: String,
        exit_code: Option<i32>,
        stderr_excerpt: String,
    },

    #[error("tool '{tool}' timed out after {timeout_secs}s")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("mesh did not converge after {iterations} iterations (last y+ = {last_y_plus})")]
    ConvergenceFailure { iterations: u32, last_y_plus: f64 },

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("flow already completed")]
    FlowCompleted,

    #[error("flow has failed previously (stop-on-failure invariant)")]
    FlowHasFailed,

    #[error("io error: {0}")]
    Io(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Construye `Io` a partir de un `std::io::Error` anotando la ruta.
    pub fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        PipelineError::Io(format!("{}: {err}", path.display()))
    }

    /// Código de salida del proceso para la CLI de etapas.
    pub fn exit_code(&self) -> i32 {
        1
    }
}
