use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{error, info, warn};
use wing_adapters::{preflight, ConvergenceConfig, JobRenderer, LayoutManager};
use wing_core::{CancellationToken, PipelineError};
use wing_domain::{ResourceRequest, StageSelection, SweepGrid, SweepPoint};

use super::report::{FailedPoint, SubmittedJob, SweepReport};
use crate::config::SweepConfig;
use crate::errors::WingflowError;
use crate::scheduler::Scheduler;

/// Recorre la malla de puntos y envía un job por punto.
///
/// Cada punto es independiente: un fallo al resolver la configuración, crear
/// el workspace, renderizar o enviar se registra y el punto se omite.
pub struct SweepDriver<S: Scheduler> {
    output_dir: PathBuf,
    layouts: LayoutManager,
    jobs: JobRenderer,
    scheduler: S,
    cancel: CancellationToken,
}

impl<S: Scheduler> SweepDriver<S> {
    pub fn new(config: &SweepConfig, scheduler: S) -> Self {
        Self { output_dir: config.output_dir.clone(),
               layouts: LayoutManager::new(&config.template_dir),
               jobs: JobRenderer::new(&config.wingflow_bin),
               scheduler,
               cancel: CancellationToken::new() }
    }

    /// Token compartido con el manejador de señales; se consulta antes de
    /// cada punto.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Parámetros del bucle de y+ que se escriben en cada script de envío.
    pub fn with_convergence(mut self, convergence: ConvergenceConfig) -> Self {
        self.jobs = self.jobs.with_convergence(convergence);
        self
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn run_sweep(&self,
                     grid: &SweepGrid,
                     selection: &StageSelection,
                     resources: &ResourceRequest)
                     -> Result<SweepReport, WingflowError> {
        // sin plantilla de envío no hay nada que hacer en ningún punto
        let template_path = self.layouts.job_template();
        let template = fs::read_to_string(&template_path).map_err(|_| {
                                                             PipelineError::MissingTemplate { path: template_path.clone() }
                                                         })?;
        info!("sweep:start points={} stages={:?} output={}",
              grid.len(),
              selection.enabled_stages(),
              self.output_dir.display());

        let mut report = SweepReport::default();
        for point in grid.points() {
            if self.cancel.is_cancelled() {
                warn!("sweep:cancelled before {point}");
                report.cancelled = true;
                break;
            }
            match self.submit_point(&template, &point, selection, resources) {
                Ok(job) => {
                    info!("sweep:submitted {point} job_id={} root={}", job.job_id, job.root.display());
                    report.submitted.push(job);
                }
                Err(e) => {
                    error!("sweep:point_failed {point}: {e}");
                    report.failed.push(FailedPoint { point,
                                                     error: e.to_string() });
                }
            }
        }
        info!("sweep:end submitted={} failed={} cancelled={}",
              report.submitted.len(),
              report.failed.len(),
              report.cancelled);
        Ok(report)
    }

    /// Prepara y envía un único punto.
    pub fn submit_point(&self,
                        template: &str,
                        point: &SweepPoint,
                        selection: &StageSelection,
                        resources: &ResourceRequest)
                        -> Result<SubmittedJob, WingflowError> {
        wing_domain::validate(selection)?;
        let root = self.output_dir.join(point.workspace_name());
        let layout = self.layouts.ensure_layout(&root, selection)?;
        preflight(selection, &layout, Path::exists)?;
        let script = self.jobs.render(template, point, resources, selection, &layout)?;
        let script_path = wing_adapters::job::write_submit_script(&layout, &script)?;
        let job_id = self.scheduler.submit(&script_path)?;
        Ok(SubmittedJob { point: *point,
                          root,
                          job_id,
                          submitted_at: Utc::now() })
    }
}
