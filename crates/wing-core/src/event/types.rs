//! Tipos de evento del flujo y estructura `FlowEvent`.
//!
//! - Cada ejecución del `FlowEngine` emite eventos a un `EventStore`
//!   append-only.
//! - El `FlowRepository` reconstruye el estado (replay) sólo a partir de
//!   estos eventos.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FlowEventKind {
    /// Primer evento de un `flow_id`: fija la `definition_hash` y la cantidad
    /// de etapas.
    FlowInitialized { definition_hash: String, stage_count: usize },
    /// Una etapa comenzó. No implica éxito.
    StageStarted { stage_index: usize, stage_id: String },
    /// Una etapa terminó correctamente, con los hashes de sus outputs.
    StageFinished {
        stage_index: usize,
        stage_id: String,
        outputs: Vec<String>,
        fingerprint: String,
    },
    /// Error terminal. El flujo no continúa (stop-on-failure).
    StageFailed {
        stage_index: usize,
        stage_id: String,
        error: PipelineError,
        fingerprint: String,
    },
    /// Hito ligero emitido por una etapa; no altera el estado.
    StageSignal {
        stage_index: usize,
        stage_id: String,
        signal: String,
        data: serde_json::Value,
    },
    /// Cancelación observada en la frontera de una etapa.
    FlowCancelled { before_stage: usize },
    /// Cierre con fingerprint agregado del flujo.
    FlowCompleted { flow_fingerprint: String },
}

impl FlowEventKind {
    /// Nombre corto de la variante, para logs.
    pub fn variant_name(&self) -> &'static str {
        match self {
            FlowEventKind::FlowInitialized { .. } => "FlowInitialized",
            FlowEventKind::StageStarted { .. } => "StageStarted",
            FlowEventKind::StageFinished { .. } => "StageFinished",
            FlowEventKind::StageFailed { .. } => "StageFailed",
            FlowEventKind::StageSignal { .. } => "StageSignal",
            FlowEventKind::FlowCancelled { .. } => "FlowCancelled",
            FlowEventKind::FlowCompleted { .. } => "FlowCompleted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEvent {
    pub seq: u64,
    pub flow_id: Uuid,
    pub kind: FlowEventKind,
    pub ts: DateTime<Utc>, // metadato (no entra en fingerprint)
}
