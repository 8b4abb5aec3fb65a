//! wing-core: motor secuencial de etapas.
//!
//! Ejecuta las etapas de una instancia del pipeline en orden, registra cada
//! transición en un log de eventos append-only y corta en el primer fallo.
pub mod cancel;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod repo;
pub mod stage;

pub use cancel::CancellationToken;
pub use engine::FlowEngine;
pub use errors::PipelineError;
pub use event::{EventStore, FlowEvent, FlowEventKind, InMemoryEventStore, JsonlEventStore};
pub use model::{Artifact, ArtifactKind, ExecutionContext};
pub use repo::{build_flow_definition, FlowDefinition, FlowRepository, InMemoryFlowRepository};
pub use stage::{StageDefinition, StageRunResult, StageSignal, StageStatus};
