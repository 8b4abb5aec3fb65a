use crate::{errors::PipelineError, model::Artifact};

/// Señal ligera emitida por una etapa (p. ej. una iteración de refinamiento).
#[derive(Debug, Clone, PartialEq)]
pub struct StageSignal {
    pub signal: String,
    pub data: serde_json::Value,
}

impl StageSignal {
    pub fn new(signal: impl Into<String>, data: serde_json::Value) -> Self {
        Self { signal: signal.into(),
               data }
    }
}

/// Resultado abstracto de ejecutar una etapa.
pub enum StageRunResult {
    Success { outputs: Vec<Artifact> },
    SuccessWithSignals { outputs: Vec<Artifact>, signals: Vec<StageSignal> },
    Failure { error: PipelineError },
}

impl From<Result<Vec<Artifact>, PipelineError>> for StageRunResult {
    fn from(res: Result<Vec<Artifact>, PipelineError>) -> Self {
        match res {
            Ok(outputs) => StageRunResult::Success { outputs },
            Err(error) => StageRunResult::Failure { error },
        }
    }
}
