use serde::{Deserialize, Serialize};

/// Parámetros de capa límite que el mallador lee de `mesh_settings.json`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshSettings {
    /// Altura de la primera celda junto a la pared.
    pub near_wall_spacing: f64,
    /// Número de capas prismáticas.
    pub prism_layers: u32,
    /// Espesor total de la capa prismática.
    pub prism_thickness: f64,
}

impl MeshSettings {
    pub const DEFAULT_SPACING: f64 = 0.001;
    pub const DEFAULT_LAYERS: u32 = 7;
    pub const DEFAULT_THICKNESS: f64 = 0.01;

    pub fn new(near_wall_spacing: f64, prism_layers: u32, prism_thickness: f64) -> Self {
        Self { near_wall_spacing,
               prism_layers,
               prism_thickness }
    }

    pub fn with_spacing(self, near_wall_spacing: f64) -> Self {
        Self { near_wall_spacing, ..self }
    }
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SPACING, Self::DEFAULT_LAYERS, Self::DEFAULT_THICKNESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_file_uses_field_names() {
        let json = serde_json::to_value(MeshSettings::default()).unwrap();
        assert_eq!(json["near_wall_spacing"], 0.001);
        assert_eq!(json["prism_layers"], 7);
        let back: MeshSettings = serde_json::from_value(json).unwrap();
        assert_eq!(back, MeshSettings::default());
    }
}
