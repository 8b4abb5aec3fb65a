//! Definiciones relacionadas a etapas.
//!
//! Una etapa es una unidad síncrona que lee ficheros de entrada del workspace,
//! invoca herramientas externas y declara 0..n artifacts de salida. Este
//! módulo define:
//! - `StageDefinition`: interfaz neutral usada por el engine.
//! - `StageRunResult` y señales (`StageSignal`).
//! - `StageStatus`: estado reconstruido por replay.

pub mod definition;
mod run_result;
mod status;

pub use definition::StageDefinition;
pub use run_result::{StageRunResult, StageSignal};
pub use status::StageStatus;
