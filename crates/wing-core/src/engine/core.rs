//! Core FlowEngine implementation

use std::collections::HashMap;

use log::{debug, info, warn};
use serde_json::json;
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::engine::EngineBuilderInit;
use crate::errors::PipelineError;
use crate::event::{EventStore, FlowEvent, FlowEventKind, InMemoryEventStore};
use crate::hashing::{hash_file, hash_value};
use crate::model::{Artifact, ExecutionContext};
use crate::repo::{FlowDefinition, FlowRepository, InMemoryFlowRepository};
use crate::stage::{StageDefinition, StageRunResult, StageSignal, StageStatus};

/// Motor de ejecución secuencial de etapas.
///
/// Orquesta las etapas de una instancia del pipeline, una detrás de otra,
/// registra cada transición en el `EventStore` y calcula fingerprints sobre
/// los hashes de los ficheros producidos.
pub struct FlowEngine<E, R>
    where E: EventStore,
          R: FlowRepository
{
    event_store: E,
    repository: R,
    artifact_store: HashMap<String, Artifact>,
    cancel: CancellationToken,
    default_flow_id: Option<Uuid>,
    default_definition: Option<FlowDefinition>,
}

impl<E, R> FlowEngine<E, R>
    where E: EventStore,
          R: FlowRepository
{
    /// Crea un nuevo builder con las stores dadas
    #[inline]
    pub fn builder(event_store: E, repository: R) -> EngineBuilderInit<E, R> {
        EngineBuilderInit::new(event_store, repository)
    }

    /// Crea un nuevo motor con los stores proporcionados
    pub fn new_with_stores(event_store: E, repository: R) -> Self {
        Self { event_store,
               repository,
               artifact_store: HashMap::new(),
               cancel: CancellationToken::new(),
               default_flow_id: None,
               default_definition: None }
    }

    /// Token consultado antes de cada etapa.
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    /// Recupera un artifact por su hash
    pub fn get_artifact(&self, hash: &str) -> Option<&Artifact> {
        self.artifact_store.get(hash)
    }

    /// Ensure a FlowInitialized event exists and return the current events
    /// for the flow (including the possibly newly appended FlowInitialized).
    fn load_or_init(&mut self, flow_id: Uuid, definition: &FlowDefinition) -> Vec<FlowEvent> {
        let mut events = self.event_store.list(flow_id);
        let has_init = events.iter().any(|e| matches!(e.kind, FlowEventKind::FlowInitialized { .. }));
        if !has_init {
            let ev = self.event_store
                         .append_kind(flow_id,
                                      FlowEventKind::FlowInitialized { definition_hash: definition.definition_hash.clone(),
                                                                       stage_count: definition.len() });
            events.push(ev);
        }
        self.default_flow_id = Some(flow_id);
        events
    }

    /// Define/genera un `flow_id` por defecto si no existe aún y lo retorna.
    pub fn ensure_default_flow_id(&mut self) -> Uuid {
        *self.default_flow_id.get_or_insert_with(Uuid::new_v4)
    }

    pub fn default_flow_id(&self) -> Option<Uuid> {
        self.default_flow_id
    }

    /// Configura la definición por defecto del flujo
    pub fn set_default_definition(&mut self, definition: FlowDefinition) {
        self.default_definition = Some(definition);
    }

    /// Ejecuta el flujo completo y retorna el ID del flujo ejecutado
    pub fn run(&mut self) -> Result<Uuid, PipelineError> {
        let flow_id = self.ensure_default_flow_id();
        let def = self.default_definition
                      .take()
                      .ok_or_else(|| PipelineError::Internal("no default definition configured".into()))?;

        let result = self.run_flow_to_completion(flow_id, &def);
        self.default_definition = Some(def);
        result
    }

    /// Avanza una etapa en el flujo por defecto
    pub fn step(&mut self) -> Result<(), PipelineError> {
        let flow_id = self.ensure_default_flow_id();
        let def = self.default_definition
                      .take()
                      .ok_or_else(|| PipelineError::Internal("no default definition configured".into()))?;
        let result = self.next_with(flow_id, &def);
        self.default_definition = Some(def);
        result
    }

    /// Ejecuta un flujo específico hasta su finalización
    pub fn run_flow_to_completion(&mut self, flow_id: Uuid, definition: &FlowDefinition) -> Result<Uuid, PipelineError> {
        loop {
            match self.next_with(flow_id, definition) {
                Ok(()) => continue,
                Err(PipelineError::FlowCompleted) => return Ok(flow_id),
                Err(e) => return Err(e),
            }
        }
    }

    /// Ejecuta la siguiente etapa pendiente del flujo
    pub fn next_with(&mut self, flow_id: Uuid, definition: &FlowDefinition) -> Result<(), PipelineError> {
        let events = self.load_or_init(flow_id, definition);
        let instance = self.repository.load(flow_id, &events, definition);

        if instance.completed {
            return Err(PipelineError::FlowCompleted);
        }
        if instance.stages.iter().any(|s| s.status == StageStatus::Failed) {
            return Err(PipelineError::FlowHasFailed);
        }
        if instance.cancelled {
            return Err(PipelineError::Cancelled);
        }

        let cursor = instance.cursor;
        if cursor >= definition.len() {
            // flujo vacío o ya recorrido sin cierre
            self.complete_flow(flow_id, definition);
            return Err(PipelineError::FlowCompleted);
        }

        if self.cancel.is_cancelled() {
            warn!("flow cancelled flow_id={flow_id} before_stage={cursor}");
            self.event_store
                .append_kind(flow_id, FlowEventKind::FlowCancelled { before_stage: cursor });
            return Err(PipelineError::Cancelled);
        }

        let stage_def = &definition.stages[cursor];
        let ctx = ExecutionContext { params: stage_def.base_params(),
                                     cancel: self.cancel.clone() };

        info!("stage:start flow_id={flow_id} index={cursor} stage={}", stage_def.id());
        self.event_store.append_kind(flow_id,
                                     FlowEventKind::StageStarted { stage_index: cursor,
                                                                   stage_id: stage_def.id().to_string() });

        match stage_def.run(&ctx) {
            StageRunResult::Success { outputs } => self.handle_stage_success(flow_id, cursor, stage_def.as_ref(), outputs, vec![], definition),
            StageRunResult::SuccessWithSignals { outputs, signals } => {
                self.handle_stage_success(flow_id, cursor, stage_def.as_ref(), outputs, signals, definition)
            }
            StageRunResult::Failure { error } => self.handle_stage_failure(flow_id, cursor, stage_def.as_ref(), error, definition),
        }
    }

    fn handle_stage_success(&mut self,
                            flow_id: Uuid,
                            cursor: usize,
                            stage_def: &dyn StageDefinition,
                            mut outputs: Vec<Artifact>,
                            signals: Vec<StageSignal>,
                            definition: &FlowDefinition)
                            -> Result<(), PipelineError> {
        let output_hashes = match self.hash_and_store_outputs(stage_def.id(), &mut outputs) {
            Ok(h) => h,
            Err(error) => return self.handle_stage_failure(flow_id, cursor, stage_def, error, definition),
        };

        for s in signals {
            self.event_store.append_kind(flow_id,
                                         FlowEventKind::StageSignal { stage_index: cursor,
                                                                      stage_id: stage_def.id().to_string(),
                                                                      signal: s.signal,
                                                                      data: s.data });
        }

        let fp = self.calculate_stage_fingerprint(cursor, stage_def, &output_hashes, definition);
        info!("stage:done flow_id={flow_id} index={cursor} stage={} outputs={}",
              stage_def.id(),
              output_hashes.len());
        self.event_store.append_kind(flow_id,
                                     FlowEventKind::StageFinished { stage_index: cursor,
                                                                    stage_id: stage_def.id().to_string(),
                                                                    outputs: output_hashes,
                                                                    fingerprint: fp });

        if cursor + 1 == definition.len() {
            self.complete_flow(flow_id, definition);
        }
        Ok(())
    }

    fn handle_stage_failure(&mut self,
                            flow_id: Uuid,
                            cursor: usize,
                            stage_def: &dyn StageDefinition,
                            error: PipelineError,
                            definition: &FlowDefinition)
                            -> Result<(), PipelineError> {
        let fp = hash_value(&json!({
                                "engine_version": crate::constants::ENGINE_VERSION,
                                "definition_hash": definition.definition_hash,
                                "stage_index": cursor,
                                "params": stage_def.base_params()
                            }));
        warn!("stage:failed flow_id={flow_id} index={cursor} stage={} err={error}", stage_def.id());
        self.event_store.append_kind(flow_id,
                                     FlowEventKind::StageFailed { stage_index: cursor,
                                                                  stage_id: stage_def.id().to_string(),
                                                                  error: error.clone(),
                                                                  fingerprint: fp });
        Err(error)
    }

    /// Calcula hash y tamaño de cada fichero declarado. Un output declarado
    /// que no existe es un `MissingArtifact` de la propia etapa.
    fn hash_and_store_outputs(&mut self, stage_id: &str, outputs: &mut [Artifact]) -> Result<Vec<String>, PipelineError> {
        let mut hashes = Vec::with_capacity(outputs.len());
        for o in outputs.iter_mut() {
            if !o.path.is_file() {
                return Err(PipelineError::MissingArtifact { stage: stage_id.to_string(),
                                                            path: o.path.clone() });
            }
            let h = hash_file(&o.path).map_err(|e| PipelineError::io(&o.path, e))?;
            o.bytes = std::fs::metadata(&o.path).map(|m| m.len()).unwrap_or(0);
            o.hash = h.clone();
            debug!("artifact stage={stage_id} path={} hash={h}", o.path.display());
            self.artifact_store.insert(h.clone(), o.clone());
            hashes.push(h);
        }
        Ok(hashes)
    }

    fn calculate_stage_fingerprint(&self,
                                   cursor: usize,
                                   stage_def: &dyn StageDefinition,
                                   output_hashes: &[String],
                                   definition: &FlowDefinition)
                                   -> String {
        hash_value(&json!({
                       "engine_version": crate::constants::ENGINE_VERSION,
                       "definition_hash": definition.definition_hash,
                       "stage_index": cursor,
                       "output_hashes": output_hashes,
                       "params": stage_def.base_params()
                   }))
    }

    fn complete_flow(&mut self, flow_id: Uuid, definition: &FlowDefinition) {
        let events = self.event_store.list(flow_id);
        let stage_fps: Vec<String> = events.iter()
                                           .filter_map(|e| match &e.kind {
                                               FlowEventKind::StageFinished { fingerprint, .. } => Some(fingerprint.clone()),
                                               _ => None,
                                           })
                                           .collect();

        let flow_fp = hash_value(&json!({
                                     "engine_version": crate::constants::ENGINE_VERSION,
                                     "definition_hash": definition.definition_hash,
                                     "stage_fingerprints": stage_fps
                                 }));
        info!("flow:completed flow_id={flow_id} fingerprint={flow_fp}");
        self.event_store
            .append_kind(flow_id, FlowEventKind::FlowCompleted { flow_fingerprint: flow_fp });
    }

    /// Lista eventos del flujo por defecto
    pub fn events(&self) -> Option<Vec<FlowEvent>> {
        self.default_flow_id.map(|fid| self.event_store.list(fid))
    }

    pub fn events_for(&self, flow_id: Uuid) -> Vec<FlowEvent> {
        self.event_store.list(flow_id)
    }

    /// Variante compacta de eventos para el flujo por defecto
    pub fn event_variants(&self) -> Option<Vec<&'static str>> {
        self.events().map(|events| {
                         events.iter()
                               .map(|e| match e.kind {
                                   FlowEventKind::FlowInitialized { .. } => "I",
                                   FlowEventKind::StageStarted { .. } => "S",
                                   FlowEventKind::StageFinished { .. } => "F",
                                   FlowEventKind::StageFailed { .. } => "X",
                                   FlowEventKind::StageSignal { .. } => "G",
                                   FlowEventKind::FlowCancelled { .. } => "K",
                                   FlowEventKind::FlowCompleted { .. } => "C",
                               })
                               .collect()
                     })
    }

    /// Fingerprint del flujo por defecto si está presente
    pub fn flow_fingerprint(&self) -> Option<String> {
        let evs = self.events()?;
        evs.iter().rev().find_map(|e| match &e.kind {
                            FlowEventKind::FlowCompleted { flow_fingerprint } => Some(flow_fingerprint.clone()),
                            _ => None,
                        })
    }
}

impl FlowEngine<InMemoryEventStore, InMemoryFlowRepository> {
    /// Crea un nuevo builder con stores en memoria
    #[inline]
    pub fn new() -> EngineBuilderInit<InMemoryEventStore, InMemoryFlowRepository> {
        EngineBuilderInit::new(InMemoryEventStore::default(), InMemoryFlowRepository::new())
    }
}

impl Default for FlowEngine<InMemoryEventStore, InMemoryFlowRepository> {
    fn default() -> Self {
        Self::new_with_stores(InMemoryEventStore::default(), InMemoryFlowRepository::new())
    }
}
