//! wingflow: orquestación de barridos de diseño de winglets
//!
//! Este crate reúne lo que corre en el nodo de login:
//! - `config` con la configuración del barrido (`SweepConfig`).
//! - `sweep` con el driver que prepara un workspace y un job por punto.
//! - `scheduler` con el envío a la cola (`qsub`) o en seco.
//! - `results` con la extracción de coeficientes de los logs de los jobs.
//!
//! La ejecución de etapas en el nodo de cómputo vive en `wing-adapters`.

pub mod config;
pub mod errors;
pub mod results;
pub mod scheduler;
pub mod sweep;

pub use config::SweepConfig;
pub use errors::WingflowError;
pub use scheduler::{DryRunScheduler, JobId, QsubScheduler, Scheduler, SchedulerError};
pub use results::{collect, write_results, CoefficientRow};
pub use sweep::{FailedPoint, SubmittedJob, SweepDriver, SweepReport};
