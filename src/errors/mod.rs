use thiserror::Error;
use wing_adapters::ConfigError;
use wing_core::PipelineError;
use wing_domain::ConfigurationError;

use crate::scheduler::SchedulerError;

/// Error de nivel superior de un punto del barrido o de un comando.
#[derive(Debug, Error)]
pub enum WingflowError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Environment(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WingflowError {
    /// Estado de salida del proceso para este error.
    pub fn exit_code(&self) -> i32 {
        match self {
            WingflowError::Pipeline(e) => e.exit_code(),
            _ => 1,
        }
    }
}
