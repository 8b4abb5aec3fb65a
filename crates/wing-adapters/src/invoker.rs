//! Invocación bloqueante de herramientas externas.
//!
//! Una invocación tiene éxito sólo si el proceso termina con estado 0 y el
//! artifact declarado existe y no está vacío.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use wing_core::PipelineError;

use crate::backoff::ExponentialBackoff;

/// Líneas finales del stderr incluidas en `ToolFailure`.
pub const STDERR_EXCERPT_LINES: usize = 20;

/// Línea de comando de una herramienta externa.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCommand {
    /// Nombre corto para logs y errores (`starccm`, `su2_cfd`, ...).
    pub tool: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Variables añadidas sólo al proceso hijo.
    pub env: Vec<(String, String)>,
}

impl ToolCommand {
    pub fn new(tool: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self { tool: tool.into(),
               program: program.into(),
               args: Vec::new(),
               env: Vec::new() }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, vars: Vec<(String, String)>) -> Self {
        self.env.extend(vars);
        self
    }

    /// Representación legible (sin entorno) para logs y scripts.
    pub fn command_line(&self) -> String {
        let mut out = self.program.display().to_string();
        for a in &self.args {
            out.push(' ');
            out.push_str(a);
        }
        out
    }
}

/// Seam para sustituir las herramientas reales en tests.
pub trait ToolInvoker: Send + Sync {
    fn run(&self,
           command: &ToolCommand,
           working_dir: &Path,
           declared_output: &Path,
           timeout: Option<Duration>)
           -> Result<(), PipelineError>;
}

/// Ejecuta la herramienta como subproceso real.
///
/// stdin nulo, stdout heredado (el log del job conserva la historia del
/// solver) y stderr redirigido a `<working_dir>/<tool>.stderr.log`.
#[derive(Debug, Default, Clone)]
pub struct ProcessInvoker;

impl ProcessInvoker {
    pub fn new() -> Self {
        Self
    }
}

impl ToolInvoker for ProcessInvoker {
    fn run(&self,
           command: &ToolCommand,
           working_dir: &Path,
           declared_output: &Path,
           timeout: Option<Duration>)
           -> Result<(), PipelineError> {
        let stderr_path = working_dir.join(format!("{}.stderr.log", command.tool));
        let stderr = File::create(&stderr_path).map_err(|e| PipelineError::io(&stderr_path, e))?;
        info!("invoke:start tool={} cwd={}", command.tool, working_dir.display());
        debug!("invoke:cmd tool={} cmd={}", command.tool, command.command_line());

        let mut child = Command::new(&command.program).args(&command.args)
                                                      .envs(command.env.iter().map(|(k, v)| (k, v)))
                                                      .current_dir(working_dir)
                                                      .stdin(Stdio::null())
                                                      .stdout(Stdio::inherit())
                                                      .stderr(Stdio::from(stderr))
                                                      .spawn()
                                                      .map_err(|e| PipelineError::ToolFailure {
                                                          tool: command.tool.clone(),
                                                          exit_code: None,
                                                          stderr_excerpt: format!("failed to start {}: {e}",
                                                                                  command.program.display()),
                                                      })?;

        let status = match timeout {
            None => child.wait().map_err(|e| PipelineError::io(&command.program, e))?,
            Some(limit) => wait_with_deadline(&mut child, &command.tool, limit)?,
        };

        if !status.success() {
            warn!("invoke:failed tool={} status={status}", command.tool);
            return Err(PipelineError::ToolFailure { tool: command.tool.clone(),
                                                    exit_code: status.code(),
                                                    stderr_excerpt: stderr_excerpt(&stderr_path,
                                                                                   STDERR_EXCERPT_LINES) });
        }
        verify_output(&command.tool, declared_output, || stderr_excerpt(&stderr_path, STDERR_EXCERPT_LINES))?;
        info!("invoke:ok tool={} output={}", command.tool, declared_output.display());
        Ok(())
    }
}

/// Espera al hijo con `try_wait` espaciado por backoff hasta el límite; al
/// vencer lo mata y lo recoge.
fn wait_with_deadline(child: &mut Child, tool: &str, limit: Duration) -> Result<ExitStatus, PipelineError> {
    let deadline = Instant::now() + limit;
    for delay in ExponentialBackoff::default() {
        if let Some(status) = child.try_wait().map_err(|e| PipelineError::Io(format!("{tool}: {e}")))? {
            return Ok(status);
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(delay.min(deadline - now));
    }
    warn!("invoke:timeout tool={tool} limit_secs={}", limit.as_secs());
    reap(child, tool);
    Err(PipelineError::ToolTimeout { tool: tool.to_string(),
                                     timeout_secs: limit.as_secs() })
}

/// Mata y recoge al hijo; si falla, el proceso puede seguir vivo en el nodo.
fn reap(child: &mut Child, tool: &str) -> Option<ExitStatus> {
    if let Err(e) = child.kill() {
        warn!("invoke:kill_failed tool={tool} pid={}: {e}", child.id());
    }
    match child.wait() {
        Ok(status) => Some(status),
        Err(e) => {
            warn!("invoke:wait_failed tool={tool} pid={}: {e}", child.id());
            None
        }
    }
}

/// El artifact declarado debe existir y no estar vacío.
pub fn verify_output<F>(tool: &str, declared_output: &Path, excerpt: F) -> Result<(), PipelineError>
    where F: FnOnce() -> String
{
    let problem = match fs::metadata(declared_output) {
        Ok(meta) if meta.len() > 0 => return Ok(()),
        Ok(_) => format!("declared output {} is empty", declared_output.display()),
        Err(_) => format!("declared output {} was not produced", declared_output.display()),
    };
    let tail = excerpt();
    let stderr_excerpt = if tail.is_empty() { problem } else { format!("{problem}\n{tail}") };
    Err(PipelineError::ToolFailure { tool: tool.to_string(),
                                     exit_code: Some(0),
                                     stderr_excerpt })
}

/// Últimas `lines` líneas de un fichero de log; vacío si no se puede leer.
pub fn stderr_excerpt(path: &Path, lines: usize) -> String {
    let Ok(text) = fs::read_to_string(path) else {
        return String::new();
    };
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
