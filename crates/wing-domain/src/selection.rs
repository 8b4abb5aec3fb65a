//! Selección de etapas y opciones de solver/mallado.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Etapas del pipeline, en su orden de ejecución.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Geometry,
    Mesh,
    FlowSolve,
    Optimize,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Geometry, Stage::Mesh, Stage::FlowSolve, Stage::Optimize];

    /// Identificador estable usado en CLI, eventos y plantillas.
    pub fn id(self) -> &'static str {
        match self {
            Stage::Geometry => "geometry",
            Stage::Mesh => "mesh",
            Stage::FlowSolve => "cfd",
            Stage::Optimize => "aso",
        }
    }

    /// Etapa que produce el artifact de entrada de ésta.
    pub fn upstream(self) -> Option<Stage> {
        match self {
            Stage::Geometry => None,
            Stage::Mesh => Some(Stage::Geometry),
            Stage::FlowSolve | Stage::Optimize => Some(Stage::Mesh),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Stage {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "geometry" | "geo" => Ok(Stage::Geometry),
            "mesh" => Ok(Stage::Mesh),
            "cfd" | "flow" | "flowsolve" => Ok(Stage::FlowSolve),
            "aso" | "optimize" => Ok(Stage::Optimize),
            other => Err(ConfigurationError::InvalidValue { field: "stage",
                                                            reason: format!("unknown stage '{other}'") }),
        }
    }
}

/// Capa prismática (resolución de capa límite) en la malla.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundaryLayerMode {
    WithPrism,
    WithoutPrism,
}

impl BoundaryLayerMode {
    pub fn is_prism(self) -> bool {
        self == BoundaryLayerMode::WithPrism
    }

    /// Nombre del subdirectorio bajo `MESH/`.
    pub fn dir_name(self) -> &'static str {
        match self {
            BoundaryLayerMode::WithPrism => "with_prism",
            BoundaryLayerMode::WithoutPrism => "without_prism",
        }
    }
}

impl fmt::Display for BoundaryLayerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Tipo de solver de flujo (y del optimizador, que lo replica).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverKind {
    /// Euler.
    Inviscid,
    /// RANS.
    Viscous,
}

impl SolverKind {
    /// Nombre del directorio y prefijo de las plantillas del solver.
    pub fn dir_name(self) -> &'static str {
        match self {
            SolverKind::Inviscid => "Euler",
            SolverKind::Viscous => "RANS",
        }
    }

    pub fn required_mesh_mode(self) -> BoundaryLayerMode {
        match self {
            SolverKind::Inviscid => BoundaryLayerMode::WithoutPrism,
            SolverKind::Viscous => BoundaryLayerMode::WithPrism,
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for SolverKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euler" | "inviscid" => Ok(SolverKind::Inviscid),
            "rans" | "viscous" | "viscous-turbulent" => Ok(SolverKind::Viscous),
            _ => Err(ConfigurationError::UnknownSolver(s.to_string())),
        }
    }
}

/// Flags por etapa más las elecciones de mallado y solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSelection {
    pub geometry: bool,
    pub mesh: bool,
    pub flow_solve: bool,
    pub optimize: bool,
    pub mesh_mode: BoundaryLayerMode,
    pub flow_solver: SolverKind,
    pub optimizer_solver: SolverKind,
}

impl StageSelection {
    /// Todas las etapas activas con el solver dado y el modo de malla que
    /// ese solver exige.
    pub fn full(solver: SolverKind) -> Self {
        Self { geometry: true,
               mesh: true,
               flow_solve: true,
               optimize: true,
               mesh_mode: solver.required_mesh_mode(),
               flow_solver: solver,
               optimizer_solver: solver }
    }

    pub fn is_enabled(&self, stage: Stage) -> bool {
        match stage {
            Stage::Geometry => self.geometry,
            Stage::Mesh => self.mesh,
            Stage::FlowSolve => self.flow_solve,
            Stage::Optimize => self.optimize,
        }
    }

    /// Etapas activas en orden de ejecución.
    pub fn enabled_stages(&self) -> Vec<Stage> {
        Stage::ALL.into_iter().filter(|s| self.is_enabled(*s)).collect()
    }

    /// Solver asociado a una etapa que lo tenga.
    pub fn solver_for(&self, stage: Stage) -> Option<SolverKind> {
        match stage {
            Stage::FlowSolve => Some(self.flow_solver),
            Stage::Optimize => Some(self.optimizer_solver),
            _ => None,
        }
    }

    /// El bucle de convergencia de malla sólo se activa con RANS.
    pub fn needs_mesh_convergence(&self) -> bool {
        self.flow_solve && self.flow_solver == SolverKind::Viscous
    }
}
