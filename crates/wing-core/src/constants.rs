//! Constantes del motor.

/// Versión lógica del motor. Forma parte del input de los fingerprints de
/// etapa, así que un cambio de versión invalida fingerprints previos aunque
/// los artifacts no cambien.
pub const ENGINE_VERSION: &str = "W1.0";
