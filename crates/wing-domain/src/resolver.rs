//! Resolución de dependencias entre etapas.
//!
//! `validate` es puro; `check_prerequisites` sólo consulta existencia de
//! ficheros mediante el predicado que recibe.

use std::path::Path;

use crate::error::ConfigurationError;
use crate::layout::WorkspaceLayout;
use crate::selection::{Stage, StageSelection};

/// Comprueba la compatibilidad solver/malla antes de gastar cómputo.
pub fn validate(selection: &StageSelection) -> Result<(), ConfigurationError> {
    let mode = selection.mesh_mode;
    if selection.flow_solver.required_mesh_mode() != mode {
        return Err(ConfigurationError::SolverMeshMismatch { stage: Stage::FlowSolve,
                                                            solver: selection.flow_solver,
                                                            mode });
    }
    if selection.optimize && selection.optimizer_solver.required_mesh_mode() != mode {
        return Err(ConfigurationError::SolverMeshMismatch { stage: Stage::Optimize,
                                                            solver: selection.optimizer_solver,
                                                            mode });
    }
    Ok(())
}

/// Toda etapa activa cuyo productor está desactivado necesita que el
/// artifact de entrada exista ya en el layout.
pub fn check_prerequisites<F>(selection: &StageSelection,
                              layout: &WorkspaceLayout,
                              exists: F)
                              -> Result<(), ConfigurationError>
    where F: Fn(&Path) -> bool
{
    for stage in selection.enabled_stages() {
        let Some(producer) = stage.upstream() else {
            continue;
        };
        if selection.is_enabled(producer) {
            continue;
        }
        let path = layout.stage_output(producer, selection.mesh_mode, selection.flow_solver);
        if !exists(&path) {
            return Err(ConfigurationError::MissingUpstream { stage, producer, path });
        }
    }
    // El bucle de convergencia vuelve a mallar desde el modelo sólido.
    if selection.needs_mesh_convergence() && !selection.geometry {
        let path = layout.wing_model();
        if !exists(&path) {
            return Err(ConfigurationError::MissingUpstream { stage: Stage::FlowSolve,
                                                             producer: Stage::Geometry,
                                                             path });
        }
    }
    Ok(())
}
