//! Builder para `FlowEngine`.
//!
//! `EngineBuilderInit` contiene las stores; `first_stage` fija la primera
//! etapa y devuelve un `EngineBuilder` que acumula el resto en orden. Las
//! etapas no intercambian datos en memoria (el workspace es el único canal),
//! así que no hay restricciones de tipos entre etapas adyacentes.
//!
//! ```ignore
//! let engine = FlowEngine::new()
//!     .first_stage(GeometryStage::new(..))
//!     .add_stage(MeshStage::new(..))
//!     .build();
//! ```

use crate::cancel::CancellationToken;
use crate::engine::FlowEngine;
use crate::event::EventStore;
use crate::repo::FlowRepository;
use crate::stage::StageDefinition;

/// Estado inicial del builder.
pub struct EngineBuilderInit<E: EventStore, R: FlowRepository> {
    pub event_store: E,
    pub repository: R,
}

impl<E: EventStore, R: FlowRepository> EngineBuilderInit<E, R> {
    pub fn new(event_store: E, repository: R) -> Self {
        Self { event_store, repository }
    }

    /// Define la primera etapa del flujo.
    #[inline]
    pub fn first_stage<S>(self, stage: S) -> EngineBuilder<E, R>
        where S: StageDefinition + 'static
    {
        self.stages(vec![Box::new(stage)])
    }

    /// Usa una lista de etapas ya construida (p. ej. según la selección de
    /// etapas de una configuración).
    pub fn stages(self, stages: Vec<Box<dyn StageDefinition>>) -> EngineBuilder<E, R> {
        EngineBuilder { event_store: self.event_store,
                        repository: self.repository,
                        stages,
                        cancel: None }
    }
}

/// Builder principal que acumula etapas.
pub struct EngineBuilder<E: EventStore, R: FlowRepository> {
    event_store: E,
    repository: R,
    stages: Vec<Box<dyn StageDefinition>>,
    cancel: Option<CancellationToken>,
}

impl<E: EventStore, R: FlowRepository> EngineBuilder<E, R> {
    /// Añade una etapa al final del flujo.
    #[inline]
    pub fn add_stage<N>(mut self, next: N) -> Self
        where N: StageDefinition + 'static
    {
        self.stages.push(Box::new(next));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Construye el `FlowEngine` y fija la definición por defecto.
    #[inline]
    pub fn build(self) -> FlowEngine<E, R> {
        let mut engine = FlowEngine::new_with_stores(self.event_store, self.repository);
        if let Some(token) = self.cancel {
            engine.set_cancellation(token);
        }
        engine.set_default_definition(crate::repo::build_flow_definition_auto(self.stages));
        engine
    }
}
