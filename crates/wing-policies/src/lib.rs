//! wing-policies – política de refinamiento de la malla de capa límite
//!
//! Decide si un `y+` máximo observado es aceptable y, si no lo es, deriva la
//! nueva altura de primera celda y el número de capas prismáticas con la
//! fórmula cerrada de una serie geométrica.

use serde::{Deserialize, Serialize};
use wing_core::hashing::{hash_str, to_canonical_json};
use wing_domain::MeshSettings;

/// Parámetros del modelo de crecimiento geométrico.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct RefinementParams {
    /// Margen frente a fluctuaciones del solver: `s' = s / (y+ * safety_factor)`.
    pub safety_factor: f64,
    /// Espesor total que deben cubrir las capas prismáticas.
    pub target_thickness: f64,
    /// Razón de crecimiento entre capas consecutivas.
    pub growth_ratio: f64,
    pub growth_base: f64,
    /// Umbral estricto: la malla converge si `y+ < y_plus_threshold`.
    pub y_plus_threshold: f64,
}

impl Default for RefinementParams {
    fn default() -> Self {
        Self { safety_factor: 1.1,
               target_thickness: 0.01,
               growth_ratio: 1.2,
               growth_base: 0.2,
               y_plus_threshold: 1.0 }
    }
}

impl RefinementParams {
    pub fn with_threshold(self, y_plus_threshold: f64) -> Self {
        Self { y_plus_threshold, ..self }
    }
}

/// Resultado de un paso de refinamiento, serializable para los eventos.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RefinementDecision {
    pub policy_id: String,
    pub observed_y_plus: f64,
    pub previous: MeshSettings,
    pub next: MeshSettings,
}

/// Contrato de las políticas de refinamiento.
pub trait RefinementPolicy {
    fn id(&self) -> &'static str;
    fn params(&self) -> &RefinementParams;
    fn is_converged(&self, y_plus_max: f64) -> bool;
    fn refine(&self, current: &MeshSettings, y_plus_max: f64) -> RefinementDecision;
}

/// Reducción proporcional al `y+` con recuento de capas por serie geométrica.
pub struct GeometricGrowthPolicy {
    params: RefinementParams,
}

impl GeometricGrowthPolicy {
    pub fn new(params: RefinementParams) -> Self {
        Self { params }
    }

    /// Nueva altura de primera celda.
    pub fn next_spacing(&self, spacing: f64, y_plus_max: f64) -> f64 {
        spacing / (y_plus_max * self.params.safety_factor)
    }

    /// Número de capas `n = ceil(ln(1 + base * espesor / s') / ln(razón))`.
    pub fn layer_count(&self, spacing: f64) -> u32 {
        let p = &self.params;
        let n = (1.0 + p.growth_base * p.target_thickness / spacing).ln() / p.growth_ratio.ln();
        n.ceil().max(1.0) as u32
    }
}

impl Default for GeometricGrowthPolicy {
    fn default() -> Self {
        Self::new(RefinementParams::default())
    }
}

impl RefinementPolicy for GeometricGrowthPolicy {
    fn id(&self) -> &'static str {
        "geometric_growth"
    }

    fn params(&self) -> &RefinementParams {
        &self.params
    }

    fn is_converged(&self, y_plus_max: f64) -> bool {
        y_plus_max < self.params.y_plus_threshold
    }

    fn refine(&self, current: &MeshSettings, y_plus_max: f64) -> RefinementDecision {
        let spacing = self.next_spacing(current.near_wall_spacing, y_plus_max);
        let next = MeshSettings::new(spacing, self.layer_count(spacing), self.params.target_thickness);
        RefinementDecision { policy_id: self.id().into(),
                             observed_y_plus: y_plus_max,
                             previous: *current,
                             next }
    }
}

/// Hash canónico de parámetros.
pub fn params_hash(params: &RefinementParams) -> String {
    let v = serde_json::to_value(params).unwrap_or_default();
    hash_str(&to_canonical_json(&v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refinement_matches_closed_form() {
        let policy = GeometricGrowthPolicy::default();
        let d = policy.refine(&MeshSettings::new(0.001, 7, 0.01), 2.2);
        let expected = 0.001 / (2.2 * 1.1);
        assert!((d.next.near_wall_spacing - expected).abs() < 1e-15);
        assert!((d.next.near_wall_spacing - 0.0004132).abs() < 1e-7);
        let n = ((1.0 + 0.2 * 0.01 / expected).ln() / 1.2f64.ln()).ceil() as u32;
        assert_eq!(d.next.prism_layers, n);
        assert_eq!(n, 10);
        assert_eq!(d.previous.near_wall_spacing, 0.001);
    }

    #[test]
    fn threshold_is_strict() {
        let policy = GeometricGrowthPolicy::default();
        assert!(policy.is_converged(0.99));
        assert!(!policy.is_converged(1.0));
        let relaxed = GeometricGrowthPolicy::new(RefinementParams::default().with_threshold(5.0));
        assert!(relaxed.is_converged(4.4));
    }

    #[test]
    fn smaller_spacing_needs_more_layers() {
        let policy = GeometricGrowthPolicy::default();
        assert!(policy.layer_count(1e-5) > policy.layer_count(1e-3));
        assert_eq!(policy.layer_count(0.001), MeshSettings::DEFAULT_LAYERS);
    }

    #[test]
    fn params_hash_changes_with_params() {
        let a = params_hash(&RefinementParams::default());
        let b = params_hash(&RefinementParams::default().with_threshold(2.0));
        assert_eq!(a, params_hash(&RefinementParams::default()));
        assert_ne!(a, b);
    }
}
