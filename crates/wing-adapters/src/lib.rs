//! wing-adapters: colaboradores con efectos del pipeline
//!
//! - `ToolchainConfig`: localización de las herramientas externas.
//! - `ToolInvoker` / `ProcessInvoker`: invocación bloqueante con límite de tiempo.
//! - `LayoutManager`: creación del árbol de directorios y copia de plantillas.
//! - Renderizador de plantillas y del script de envío.
//! - Bucle de convergencia de malla y las cuatro etapas concretas.

pub mod backoff;
pub mod convergence;
pub mod invoker;
pub mod job;
pub mod layout;
pub mod pipeline;
pub mod probe;
pub mod stages;
pub mod template;
pub mod toolchain;

pub use convergence::{ConvergenceConfig, MeshConvergenceController, RefinementDriver};
pub use invoker::{ProcessInvoker, ToolCommand, ToolInvoker};
pub use job::JobRenderer;
pub use layout::LayoutManager;
pub use pipeline::{build_pipeline, preflight, run_stages};
pub use stages::StageEnv;
pub use template::{render, RenderContext};
pub use toolchain::{ConfigError, ToolchainConfig};
