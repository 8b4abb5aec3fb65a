use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use wing_domain::{BoundaryLayerMode, SolverKind, Stage, StageSelection, SweepGrid, SweepPoint};

#[derive(Debug, Parser)]
#[command(name = "wingflow", version, about = "Winglet design sweeps on a batch cluster")]
pub struct Cli {
    /// off | error | warn | info | debug | trace
    #[arg(long, global = true, env = "WINGFLOW_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Nivel de log; un valor irreconocible cae a `info`.
    pub fn level(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crea un workspace y envía un job por punto del barrido.
    Sweep(SweepArgs),
    /// Ejecuta todas las etapas activas de un workspace.
    Run(RunArgs),
    /// Ejecuta una sola etapa (lo que llama el script de envío).
    Stage(StageArgs),
    /// Extrae CL/CD de los logs de los jobs a `results.dat`.
    Collect(CollectArgs),
}

/// Ejes del barrido: lista `a,b,c` o rango inclusivo `inicio:fin:paso`.
#[derive(Debug, Clone, Args)]
pub struct GridArgs {
    #[arg(long, default_value = "-120:120:15", allow_hyphen_values = true)]
    pub cant: String,
    #[arg(long, default_value = "-20:20:10", allow_hyphen_values = true)]
    pub sweep: String,
}

impl GridArgs {
    pub fn grid(&self) -> Result<SweepGrid, wing_domain::ConfigurationError> {
        SweepGrid::new(parse_axis("cant", &self.cant)?, parse_axis("sweep", &self.sweep)?)
    }
}

/// Solver y modo de malla comunes a `sweep`, `run` y `stage`.
#[derive(Debug, Clone, Args)]
pub struct SolverArgs {
    /// Solver de flujo (euler | rans).
    #[arg(long)]
    pub solver: Option<SolverKind>,
    /// Solver de la optimización; por defecto el de flujo.
    #[arg(long)]
    pub aso_solver: Option<SolverKind>,
    /// Malla con capa de prismas.
    #[arg(long)]
    pub prism: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StageName {
    Geometry,
    Mesh,
    Cfd,
    Aso,
}

impl From<StageName> for Stage {
    fn from(name: StageName) -> Self {
        match name {
            StageName::Geometry => Stage::Geometry,
            StageName::Mesh => Stage::Mesh,
            StageName::Cfd => Stage::FlowSolve,
            StageName::Aso => Stage::Optimize,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ResourceArgs {
    #[arg(long, default_value_t = 48)]
    pub np: u32,
    #[arg(long, default_value_t = 64)]
    pub mem_gb: u32,
    #[arg(long, default_value_t = 8)]
    pub walltime_hours: u32,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ConvergenceArgs {
    /// Umbral de y+ de la malla con prismas.
    #[arg(long)]
    pub y_plus_target: Option<f64>,
    #[arg(long)]
    pub max_iterations: Option<u32>,
    /// Altura de primera celda de la primera malla.
    #[arg(long)]
    pub initial_spacing: Option<f64>,
}

impl ConvergenceArgs {
    /// Algún parámetro del bucle de y+ dado explícitamente.
    pub fn is_set(&self) -> bool {
        self.y_plus_target.is_some() || self.max_iterations.is_some() || self.initial_spacing.is_some()
    }
}

#[derive(Debug, Args)]
pub struct SweepArgs {
    #[command(flatten)]
    pub grid: GridArgs,
    #[command(flatten)]
    pub solver: SolverArgs,
    #[command(flatten)]
    pub resources: ResourceArgs,
    #[command(flatten)]
    pub convergence: ConvergenceArgs,
    /// Etapas activas, separadas por comas.
    #[arg(long, value_enum, value_delimiter = ',', default_values = ["geometry", "mesh", "cfd", "aso"])]
    pub stages: Vec<StageName>,
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    #[arg(long)]
    pub template_dir: Option<PathBuf>,
    #[arg(long)]
    pub scheduler: Option<PathBuf>,
    #[arg(long)]
    pub wingflow_bin: Option<PathBuf>,
    /// No envía: sólo prepara workspaces y scripts.
    #[arg(long)]
    pub dry_run: bool,
    /// Escribe el informe del barrido en JSON.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long)]
    pub workdir: PathBuf,
    #[arg(long, allow_hyphen_values = true)]
    pub cant: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    pub sweep: Option<f64>,
    #[arg(long, value_enum, value_delimiter = ',', default_values = ["geometry", "mesh", "cfd", "aso"])]
    pub stages: Vec<StageName>,
    #[arg(long, default_value_t = 48)]
    pub np: u32,
    #[command(flatten)]
    pub solver: SolverArgs,
    #[command(flatten)]
    pub convergence: ConvergenceArgs,
}

#[derive(Debug, Args)]
pub struct StageArgs {
    #[arg(value_enum)]
    pub stage: StageName,
    #[arg(long)]
    pub workdir: PathBuf,
    #[arg(long, default_value_t = 48)]
    pub np: u32,
    #[arg(long, allow_hyphen_values = true)]
    pub cant: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    pub sweep: Option<f64>,
    #[command(flatten)]
    pub solver: SolverArgs,
    #[command(flatten)]
    pub convergence: ConvergenceArgs,
}

#[derive(Debug, Args)]
pub struct CollectArgs {
    #[command(flatten)]
    pub grid: GridArgs,
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Fichero de resultados; por defecto `<output_dir>/results.dat`.
    #[arg(long)]
    pub results: Option<PathBuf>,
}

/// Punto del barrido si se dieron ambos ángulos.
pub fn point_of(cant: Option<f64>, sweep: Option<f64>) -> Option<SweepPoint> {
    match (cant, sweep) {
        (Some(c), Some(s)) => Some(SweepPoint::new(c, s)),
        _ => None,
    }
}

/// Selección con las etapas dadas. Sin `--solver` el solver se deduce del
/// modo de malla; sin `--prism` el modo se deduce del solver.
pub fn selection(stages: &[StageName], solver: &SolverArgs) -> StageSelection {
    let flow_solver = solver.solver.unwrap_or(if solver.prism {
                                                  SolverKind::Viscous
                                              } else {
                                                  SolverKind::Inviscid
                                              });
    let mesh_mode = if solver.prism {
        BoundaryLayerMode::WithPrism
    } else {
        flow_solver.required_mesh_mode()
    };
    let has = |name: StageName| stages.contains(&name);
    StageSelection { geometry: has(StageName::Geometry),
                     mesh: has(StageName::Mesh),
                     flow_solve: has(StageName::Cfd),
                     optimize: has(StageName::Aso),
                     mesh_mode,
                     flow_solver,
                     optimizer_solver: solver.aso_solver.unwrap_or(flow_solver) }
}

pub fn parse_axis(name: &'static str, raw: &str) -> Result<Vec<f64>, wing_domain::ConfigurationError> {
    let invalid = |reason: String| wing_domain::ConfigurationError::InvalidValue { field: name, reason };
    let number = |s: &str| s.trim().parse::<f64>().map_err(|e| invalid(format!("'{}': {e}", s.trim())));
    let parts: Vec<&str> = raw.split(':').collect();
    match parts.as_slice() {
        [start, end, step] => SweepGrid::axis(number(start)?, number(end)?, number(step)?),
        [_] => raw.split(',').filter(|s| !s.trim().is_empty()).map(number).collect(),
        _ => Err(invalid(format!("expected 'a,b,c' or 'start:end:step', got '{raw}'"))),
    }
}
