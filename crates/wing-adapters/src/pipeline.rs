//! Ensamblado de las etapas activas en un `FlowEngine`.

use std::path::Path;

use log::{error, info};
use uuid::Uuid;
use wing_core::{CancellationToken, FlowEngine, InMemoryFlowRepository, JsonlEventStore, PipelineError,
                StageDefinition};
use wing_domain::{check_prerequisites, validate, ConfigurationError, MeshSettings, Stage, StageSelection, SweepPoint,
                  WorkspaceLayout};
use wing_policies::GeometricGrowthPolicy;

use crate::convergence::ConvergenceConfig;
use crate::stages::{FlowSolveStage, GeometryStage, MeshStage, OptimizeStage, StageEnv};

/// Traduce un error de pre-vuelo a la taxonomía del pipeline. Un artifact de
/// entrada ausente conserva la ruta exacta esperada.
pub fn preflight_error(err: ConfigurationError) -> PipelineError {
    match err {
        ConfigurationError::MissingUpstream { stage, path, .. } => {
            PipelineError::MissingArtifact { stage: stage.id().to_string(),
                                             path }
        }
        other => PipelineError::Configuration(other.to_string()),
    }
}

/// Compatibilidad solver/malla y entradas de etapas cuyo productor no corre.
pub fn preflight<F>(selection: &StageSelection, layout: &WorkspaceLayout, exists: F) -> Result<(), PipelineError>
    where F: Fn(&Path) -> bool
{
    validate(selection).map_err(preflight_error)?;
    check_prerequisites(selection, layout, exists).map_err(preflight_error)
}

/// Parámetros de la primera malla para una altura de primera celda.
pub fn initial_mesh_settings(spacing: f64) -> MeshSettings {
    let layers = GeometricGrowthPolicy::default().layer_count(spacing);
    MeshSettings { prism_layers: layers,
                   ..MeshSettings::default().with_spacing(spacing) }
}

/// Construye una etapa concreta.
pub fn build_stage(env: &StageEnv,
                   stage: Stage,
                   selection: &StageSelection,
                   point: Option<SweepPoint>,
                   convergence: ConvergenceConfig)
                   -> Result<Box<dyn StageDefinition>, PipelineError> {
    let env = env.clone();
    let built: Box<dyn StageDefinition> = match stage {
        Stage::Geometry => {
            let point = point.ok_or_else(|| {
                                 PipelineError::Configuration("geometry stage needs the cant and sweep angles".into())
                             })?;
            Box::new(GeometryStage::new(env, point))
        }
        Stage::Mesh => Box::new(MeshStage::new(env,
                                               selection.mesh_mode,
                                               initial_mesh_settings(convergence.initial_spacing))),
        Stage::FlowSolve => {
            let mut cfd = FlowSolveStage::new(env, selection.flow_solver);
            if selection.needs_mesh_convergence() {
                cfd = cfd.with_convergence(convergence);
            }
            Box::new(cfd)
        }
        Stage::Optimize => Box::new(OptimizeStage::new(env, selection.optimizer_solver)),
    };
    Ok(built)
}

/// Etapas activas en orden, tras el pre-vuelo contra el disco.
pub fn build_pipeline(env: &StageEnv,
                      selection: &StageSelection,
                      point: Option<SweepPoint>,
                      convergence: ConvergenceConfig)
                      -> Result<Vec<Box<dyn StageDefinition>>, PipelineError> {
    preflight(selection, &env.layout, |p| p.is_file())?;
    selection.enabled_stages()
             .into_iter()
             .map(|stage| build_stage(env, stage, selection, point, convergence))
             .collect()
}

/// Ejecuta las etapas con el log de eventos en `<root>/events.jsonl`.
pub fn run_stages(layout: &WorkspaceLayout,
                  stages: Vec<Box<dyn StageDefinition>>,
                  cancel: CancellationToken)
                  -> Result<Uuid, PipelineError> {
    let events = layout.events_file();
    let store = JsonlEventStore::open(&events).map_err(|e| PipelineError::io(&events, e))?;
    let ids: Vec<String> = stages.iter().map(|s| s.id().to_string()).collect();
    info!("pipeline:start root={} stages={ids:?}", layout.root().display());
    let mut engine = FlowEngine::builder(store, InMemoryFlowRepository::new()).stages(stages)
                                                                            .with_cancellation(cancel)
                                                                            .build();
    match engine.run() {
        Ok(flow_id) => {
            info!("pipeline:done root={} flow_id={flow_id} fingerprint={}",
                  layout.root().display(),
                  engine.flow_fingerprint().unwrap_or_default());
            Ok(flow_id)
        }
        Err(e) => {
            error!("pipeline:failed root={} err={e}", layout.root().display());
            Err(e)
        }
    }
}
