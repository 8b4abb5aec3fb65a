//! Configuración del barrido.
//! Se lee del entorno (y de `.env`) una sola vez; la CLI puede sobrescribir
//! cualquier campo.

use std::env;
use std::path::PathBuf;

use wing_adapters::toolchain::init_dotenv;

#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    /// Raíz del proyecto; base de las rutas por defecto.
    pub project_root: PathBuf,
    /// Directorio donde se crean los `winglet_c*_s*`.
    pub output_dir: PathBuf,
    /// Plantillas: `submit.pbs`, macros, scripts y configs de solver.
    pub template_dir: PathBuf,
    /// Comando de envío (`qsub`).
    pub scheduler: PathBuf,
    /// Binario `wingflow` que ejecutará las etapas en el nodo de cómputo.
    pub wingflow_bin: PathBuf,
}

impl SweepConfig {
    pub fn from_env() -> Self {
        // asegura que .env se haya cargado
        init_dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
        where F: Fn(&str) -> Option<String>
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let project_root = get("WINGFLOW_PROJECT_ROOT").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
        Self { output_dir: get("WINGFLOW_OUTPUT_DIR").map(PathBuf::from)
                                                     .unwrap_or_else(|| project_root.join("output")),
               template_dir: get("WINGFLOW_TEMPLATE_DIR").map(PathBuf::from)
                                                         .unwrap_or_else(|| project_root.join("templates")),
               scheduler: get("WINGFLOW_SCHEDULER").map(PathBuf::from).unwrap_or_else(|| "qsub".into()),
               wingflow_bin: get("WINGFLOW_BIN").map(PathBuf::from).unwrap_or_else(|| "wingflow".into()),
               project_root }
    }
}
