//! Bucle de convergencia de la malla de capa límite.
//!
//! Máquina de estados acotada:
//! `Solving → Evaluating → {Converged, Refining}`, y `Refining → Solving`.
//! Cada vuelta ejecuta el solver, mide el `y+` máximo y, si no cumple el
//! umbral, vuelve a mallar con la altura de primera celda reducida. El número
//! de soluciones está limitado por `max_iterations`; agotarlo es un
//! `ConvergenceFailure` con el último `y+` observado.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use wing_core::{CancellationToken, PipelineError, StageSignal};
use wing_domain::MeshSettings;
use wing_policies::RefinementPolicy;

pub const SIGNAL_MESH_REFINED: &str = "mesh_refined";
pub const SIGNAL_MESH_CONVERGED: &str = "mesh_converged";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    /// Altura de primera celda de la primera malla.
    pub initial_spacing: f64,
    /// Máximo de ejecuciones del solver dentro del bucle.
    pub max_iterations: u32,
    pub y_plus_target: f64,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self { initial_spacing: MeshSettings::DEFAULT_SPACING,
               max_iterations: 5,
               y_plus_target: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopState {
    Solving,
    Evaluating,
    Refining { y_plus: f64 },
    Converged { y_plus: f64 },
}

/// Estado mutable del bucle; sólo vive durante una invocación de CFD.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRefinementState {
    pub settings: MeshSettings,
    pub last_y_plus: Option<f64>,
    /// Soluciones ejecutadas hasta ahora.
    pub iterations: u32,
}

/// Acciones con efectos que el bucle necesita.
pub trait RefinementDriver {
    /// Ejecuta el solver sobre la malla actual.
    fn solve(&self) -> Result<(), PipelineError>;
    /// `y+` máximo de la última solución.
    fn evaluate(&self) -> Result<f64, PipelineError>;
    /// Malla de nuevo, con capa prismática, usando `settings`.
    fn remesh(&self, settings: &MeshSettings) -> Result<(), PipelineError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceReport {
    pub state: MeshRefinementState,
    pub signals: Vec<StageSignal>,
}

pub struct MeshConvergenceController<P: RefinementPolicy> {
    policy: P,
    max_iterations: u32,
}

impl<P: RefinementPolicy> MeshConvergenceController<P> {
    pub fn new(policy: P, max_iterations: u32) -> Self {
        Self { policy,
               max_iterations: max_iterations.max(1) }
    }

    /// Ejecuta el bucle partiendo de la malla ya existente (`initial`).
    /// La cancelación se comprueba antes de cada solución y de cada remallado.
    pub fn run<D>(&self,
                  driver: &D,
                  initial: MeshSettings,
                  cancel: &CancellationToken)
                  -> Result<ConvergenceReport, PipelineError>
        where D: RefinementDriver + ?Sized
    {
        let mut state = MeshRefinementState { settings: initial,
                                              last_y_plus: None,
                                              iterations: 0 };
        let mut signals = Vec::new();
        let mut phase = LoopState::Solving;

        loop {
            phase = match phase {
                LoopState::Solving => {
                    if cancel.is_cancelled() {
                        return Err(PipelineError::Cancelled);
                    }
                    driver.solve()?;
                    state.iterations += 1;
                    LoopState::Evaluating
                }
                LoopState::Evaluating => {
                    let y_plus = driver.evaluate()?;
                    state.last_y_plus = Some(y_plus);
                    if self.policy.is_converged(y_plus) {
                        LoopState::Converged { y_plus }
                    } else {
                        LoopState::Refining { y_plus }
                    }
                }
                LoopState::Refining { y_plus } => {
                    if state.iterations >= self.max_iterations {
                        warn!("convergence:exhausted iterations={} y_plus={y_plus}", state.iterations);
                        return Err(PipelineError::ConvergenceFailure { iterations: state.iterations,
                                                                       last_y_plus: y_plus });
                    }
                    if cancel.is_cancelled() {
                        return Err(PipelineError::Cancelled);
                    }
                    let decision = self.policy.refine(&state.settings, y_plus);
                    warn!("convergence:refine iteration={} y_plus={y_plus} spacing={} layers={}",
                          state.iterations, decision.next.near_wall_spacing, decision.next.prism_layers);
                    signals.push(StageSignal::new(SIGNAL_MESH_REFINED,
                                                  json!({
                                                      "iteration": state.iterations,
                                                      "y_plus": y_plus,
                                                      "spacing": decision.next.near_wall_spacing,
                                                      "layers": decision.next.prism_layers,
                                                  })));
                    driver.remesh(&decision.next)?;
                    state.settings = decision.next;
                    LoopState::Solving
                }
                LoopState::Converged { y_plus } => {
                    info!("convergence:done iterations={} y_plus={y_plus}", state.iterations);
                    signals.push(StageSignal::new(SIGNAL_MESH_CONVERGED,
                                                  json!({
                                                      "iterations": state.iterations,
                                                      "y_plus": y_plus,
                                                      "spacing": state.settings.near_wall_spacing,
                                                      "layers": state.settings.prism_layers,
                                                  })));
                    return Ok(ConvergenceReport { state, signals });
                }
            };
        }
    }
}
