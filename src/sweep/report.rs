use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use wing_domain::SweepPoint;

use crate::scheduler::JobId;

#[derive(Debug, Clone, Serialize)]
pub struct SubmittedJob {
    pub point: SweepPoint,
    pub root: PathBuf,
    pub job_id: JobId,
    pub submitted_at: DateTime<Utc>,
}

/// Punto descartado; el resto del barrido continúa.
#[derive(Debug, Clone, Serialize)]
pub struct FailedPoint {
    pub point: SweepPoint,
    pub error: String,
}

/// Resultado de un barrido completo.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub submitted: Vec<SubmittedJob>,
    pub failed: Vec<FailedPoint>,
    /// true si se interrumpió antes de recorrer todos los puntos.
    pub cancelled: bool,
}

impl SweepReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}
