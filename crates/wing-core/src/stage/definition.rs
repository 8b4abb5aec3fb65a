use serde_json::Value;

use super::run_result::StageRunResult;
use crate::model::ExecutionContext;

/// Trait que define una etapa del pipeline.
pub trait StageDefinition {
    /// Identificador estable y único dentro del flujo.
    fn id(&self) -> &str;

    /// Nombre opcional amigable.
    fn name(&self) -> &str {
        self.id()
    }

    /// Parámetros deterministas de la etapa; entran en el fingerprint.
    fn base_params(&self) -> Value;

    /// Ejecución bloqueante de la etapa.
    fn run(&self, ctx: &ExecutionContext) -> StageRunResult;
}
