//! Artifact declarado por una etapa.
//!
//! Las etapas no se pasan datos en memoria: cada una escribe ficheros en su
//! directorio del workspace. Un `Artifact` sólo registra la ruta declarada;
//! el motor calcula `hash` (blake3 del contenido) y `bytes` al terminar la
//! etapa, y esos hashes entran en el fingerprint.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Modelo sólido de la geometría.
    Geometry,
    /// Malla volumétrica.
    Mesh,
    /// Campo de flujo o salida del solver.
    FlowField,
    /// Historia / resultados de la optimización.
    Optimization,
    /// Cualquier otro fichero.
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub hash: String, // asignado por el engine
    pub bytes: u64,   // asignado por el engine
}

impl Artifact {
    /// Artifact aún no inspeccionado por el engine.
    pub fn declared(kind: ArtifactKind, path: impl Into<PathBuf>) -> Self {
        Self { kind,
               path: path.into(),
               hash: String::new(),
               bytes: 0 }
    }
}
