//! Barrido de parámetros: un workspace y un job por punto de la malla
//! (cant, sweep).
pub mod driver;
pub mod report;

pub use driver::SweepDriver;
pub use report::{FailedPoint, SubmittedJob, SweepReport};
