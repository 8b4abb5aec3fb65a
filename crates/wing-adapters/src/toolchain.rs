//! Localización de las herramientas externas.
//!
//! Se lee una sola vez del entorno (y de `.env`) y se pasa explícitamente al
//! invocador y a las etapas. Las variables que necesita cada herramienta
//! (`SU2_RUN`, `PATH`, ...) sólo se fijan en el `Command` hijo.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use thiserror::Error;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),
    #[error("environment variable {name}='{value}' is invalid: {reason}")]
    InvalidVar { name: &'static str, value: String, reason: String },
}

/// Instalación de SU2: binarios compilados y árbol de fuentes.
#[derive(Debug, Clone, PartialEq)]
pub struct Su2Install {
    pub run: PathBuf,
    pub home: PathBuf,
}

impl Su2Install {
    pub fn bin(&self, name: &str) -> PathBuf {
        self.run.join(name)
    }

    /// Entorno del proceso hijo: `SU2_RUN`, `SU2_HOME` y `SU2_RUN` añadido a
    /// `PATH` y `PYTHONPATH`.
    pub fn child_env(&self) -> Vec<(String, String)> {
        let run = self.run.display().to_string();
        vec![("SU2_RUN".into(), run.clone()),
             ("SU2_HOME".into(), self.home.display().to_string()),
             ("PATH".into(), append_path(env::var_os("PATH"), &run)),
             ("PYTHONPATH".into(), append_path(env::var_os("PYTHONPATH"), &run)),]
    }
}

fn append_path(current: Option<OsString>, extra: &str) -> String {
    match current.map(|v| v.to_string_lossy().into_owned()) {
        Some(v) if !v.is_empty() => format!("{v}:{extra}"),
        _ => extra.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolchainConfig {
    /// Intérprete de scripts del kernel de geometría (`vspscript`).
    pub vsp_bin: PathBuf,
    pub starccm_bin: PathBuf,
    pub starccm_podkey: Option<String>,
    pub starccm_licpath: Option<String>,
    pub mpiexec: PathBuf,
    pub su2_cfd: Su2Install,
    pub su2_aso: Su2Install,
    pub python: PathBuf,
    /// Límite por invocación; `None` espera sin límite.
    pub tool_timeout: Option<Duration>,
}

impl ToolchainConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Construye la configuración con una fuente de variables arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let get = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).map(PathBuf::from).ok_or(ConfigError::MissingVar(name));

        let tool_timeout = match get("WINGFLOW_TOOL_TIMEOUT_SECS") {
            None => None,
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                                                      ConfigError::InvalidVar { name: "WINGFLOW_TOOL_TIMEOUT_SECS",
                                                                                value: raw.clone(),
                                                                                reason: e.to_string() }
                                                  })?;
                Some(Duration::from_secs(secs))
            }
        };

        Ok(Self { vsp_bin: require("WINGFLOW_VSP_BIN")?,
                  starccm_bin: require("WINGFLOW_STARCCM_BIN")?,
                  starccm_podkey: get("WINGFLOW_STARCCM_PODKEY"),
                  starccm_licpath: get("WINGFLOW_STARCCM_LICPATH"),
                  mpiexec: get("WINGFLOW_MPIEXEC").map(PathBuf::from).unwrap_or_else(|| "mpiexec".into()),
                  su2_cfd: Su2Install { run: require("WINGFLOW_SU2_CFD_RUN")?,
                                        home: require("WINGFLOW_SU2_CFD_HOME")? },
                  su2_aso: Su2Install { run: require("WINGFLOW_SU2_ASO_RUN")?,
                                        home: require("WINGFLOW_SU2_ASO_HOME")? },
                  python: get("WINGFLOW_PYTHON").map(PathBuf::from).unwrap_or_else(|| "python3".into()),
                  tool_timeout })
    }
}
