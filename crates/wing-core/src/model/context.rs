use serde_json::Value;

use crate::cancel::CancellationToken;

/// Contexto de ejecución entregado a `StageDefinition::run`.
pub struct ExecutionContext {
    pub params: Value,             // parámetros canónicos de la etapa
    pub cancel: CancellationToken, // consultado por bucles largos dentro de la etapa
}
