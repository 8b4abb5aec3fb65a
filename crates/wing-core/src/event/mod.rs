//! Definiciones de eventos y trait EventStore.

mod store;
mod types;

pub use store::{EventStore, InMemoryEventStore, JsonlEventStore};
pub use types::{FlowEvent, FlowEventKind};
