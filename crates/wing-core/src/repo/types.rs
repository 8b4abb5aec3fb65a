//! Tipos de repositorio: estado reconstruido (FlowInstance) y definición
//! (FlowDefinition).
//!
//! El repositorio aplica un replay lineal: consume eventos en orden y
//! actualiza un `FlowInstance`. Sólo guarda hashes de outputs.
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::event::{FlowEvent, FlowEventKind};
use crate::stage::{StageDefinition, StageStatus};

pub struct FlowInstance {
    pub id: Uuid,
    pub stages: Vec<StageSlot>,
    pub cursor: usize,
    pub completed: bool,
    pub cancelled: bool,
}

impl FlowInstance {
    /// Primer error terminal registrado, si existe.
    pub fn failure(&self) -> Option<&PipelineError> {
        self.stages.iter().find_map(|s| s.error.as_ref())
    }
}

/// Estado de una etapa en la instancia.
pub struct StageSlot {
    pub stage_id: String,
    pub status: StageStatus,
    pub fingerprint: Option<String>,
    pub outputs: Vec<String>,
    pub signals: usize,
    pub error: Option<PipelineError>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Trait para reconstruir (`replay`) el estado de un flujo a partir de eventos.
pub trait FlowRepository {
    fn load(&self, flow_id: Uuid, events: &[FlowEvent], definition: &FlowDefinition) -> FlowInstance;
}

/// Definición inmutable del flujo.
pub struct FlowDefinition {
    pub stages: Vec<Box<dyn StageDefinition>>,
    pub definition_hash: String,
}

impl FlowDefinition {
    pub fn new(stages: Vec<Box<dyn StageDefinition>>, definition_hash: String) -> Self {
        Self { stages, definition_hash }
    }
    pub fn len(&self) -> usize {
        self.stages.len()
    }
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
    pub fn stage_ids(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.id()).collect()
    }
}

#[derive(Default)]
pub struct InMemoryFlowRepository;

impl InMemoryFlowRepository {
    pub fn new() -> Self {
        Self
    }
}

impl FlowRepository for InMemoryFlowRepository {
    fn load(&self, flow_id: Uuid, events: &[FlowEvent], definition: &FlowDefinition) -> FlowInstance {
        let mut stages: Vec<StageSlot> = definition.stages
                                                   .iter()
                                                   .map(|s| StageSlot { stage_id: s.id().to_string(),
                                                                        status: StageStatus::Pending,
                                                                        fingerprint: None,
                                                                        outputs: vec![],
                                                                        signals: 0,
                                                                        error: None,
                                                                        started_at: None,
                                                                        finished_at: None })
                                                   .collect();
        let mut completed = false;
        let mut cancelled = false;
        for ev in events {
            match &ev.kind {
                FlowEventKind::FlowInitialized { .. } => {}
                FlowEventKind::StageStarted { stage_index, .. } => {
                    if let Some(slot) = stages.get_mut(*stage_index) {
                        slot.status = StageStatus::Running;
                        slot.started_at = Some(ev.ts);
                    }
                }
                FlowEventKind::StageFinished { stage_index,
                                               fingerprint,
                                               outputs,
                                               .. } => {
                    if let Some(slot) = stages.get_mut(*stage_index) {
                        slot.status = StageStatus::FinishedOk;
                        slot.fingerprint = Some(fingerprint.clone());
                        slot.outputs = outputs.clone();
                        slot.finished_at = Some(ev.ts);
                    }
                }
                FlowEventKind::StageFailed { stage_index,
                                             fingerprint,
                                             error,
                                             .. } => {
                    if let Some(slot) = stages.get_mut(*stage_index) {
                        slot.status = StageStatus::Failed;
                        slot.fingerprint = Some(fingerprint.clone());
                        slot.error = Some(error.clone());
                        slot.finished_at = Some(ev.ts);
                    }
                }
                FlowEventKind::StageSignal { stage_index, .. } => {
                    if let Some(slot) = stages.get_mut(*stage_index) {
                        slot.signals += 1;
                    }
                }
                FlowEventKind::FlowCancelled { .. } => cancelled = true,
                FlowEventKind::FlowCompleted { .. } => completed = true,
            }
        }
        let cursor = stages.iter()
                           .position(|s| matches!(s.status, StageStatus::Pending))
                           .unwrap_or(stages.len());
        FlowInstance { id: flow_id,
                       stages,
                       cursor,
                       completed,
                       cancelled }
    }
}

pub fn build_flow_definition(stage_ids: &[&str], stages: Vec<Box<dyn StageDefinition>>) -> FlowDefinition {
    use crate::hashing::hash_value;
    use serde_json::json;
    let definition_hash = hash_value(&json!(stage_ids));
    FlowDefinition::new(stages, definition_hash)
}

/// Variante que extrae los ids de las etapas en orden.
pub fn build_flow_definition_auto(stages: Vec<Box<dyn StageDefinition>>) -> FlowDefinition {
    let ids: Vec<String> = stages.iter().map(|s| s.id().to_string()).collect();
    let id_refs: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
    build_flow_definition(&id_refs, stages)
}
