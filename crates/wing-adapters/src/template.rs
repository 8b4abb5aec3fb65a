//! Renderizador de plantillas orientadas a líneas.
//!
//! Un único renderizador para el script de envío y para las plantillas de
//! cada etapa. El conjunto de tokens es cerrado: cualquier marcador o
//! placeholder sin valor es un `UnresolvedToken`, nunca se emite tal cual.
//!
//! Reglas por línea:
//! - `#PBS -l walltime=...` y `#PBS -l select=1:ncpus=...` se reescriben con
//!   los recursos del contexto.
//! - `# @wingflow:params` (o el marcador heredado
//!   `# Read parameters from environment variables`) se sustituye por el
//!   bloque de parámetros.
//! - `# @wingflow:invoke <etapa>` se sustituye por el comando de la etapa.
//! - `{{NOMBRE}}` dentro de cualquier otra línea se sustituye por su valor.
//! - El resto pasa sin cambios.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use wing_core::PipelineError;
use wing_domain::ResourceRequest;

pub const WALLTIME_DIRECTIVE: &str = "#PBS -l walltime=";
pub const SELECT_DIRECTIVE: &str = "#PBS -l select=1:ncpus=";
pub const MARKER_PREFIX: &str = "# @wingflow:";
pub const PARAMS_MARKER: &str = "# @wingflow:params";
pub const LEGACY_PARAMS_MARKER: &str = "# Read parameters from environment variables";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    values: IndexMap<String, String>,
    resources: Option<ResourceRequest>,
    params_block: Option<String>,
    invocations: IndexMap<String, Option<String>>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Valor de un placeholder `{{name}}`.
    pub fn value(mut self, name: &str, value: impl ToString) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_resources(mut self, resources: ResourceRequest) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn with_params_block(mut self, block: String) -> Self {
        self.params_block = Some(block);
        self
    }

    /// Comando de una etapa; `None` si la etapa está desactivada.
    pub fn invocation(mut self, stage: &str, command: Option<String>) -> Self {
        self.invocations.insert(stage.to_string(), command);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Renderiza `template` con `ctx`. Puro: mismas entradas, misma salida.
pub fn render(template: &str, ctx: &RenderContext) -> Result<String, PipelineError> {
    let trailing_newline = template.ends_with('\n');
    let body = template.strip_suffix('\n').unwrap_or(template);
    let mut out: Vec<String> = Vec::new();

    for (idx, line) in body.split('\n').enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();

        if trimmed.starts_with(WALLTIME_DIRECTIVE) {
            let r = require_resources(ctx, "walltime", line_no)?;
            out.push(format!("{WALLTIME_DIRECTIVE}{}:00:00", r.walltime_hours));
        } else if trimmed.starts_with(SELECT_DIRECTIVE) {
            let r = require_resources(ctx, "select", line_no)?;
            out.push(format!("{SELECT_DIRECTIVE}{}:mem={}gb", r.np, r.mem_gb));
        } else if trimmed == PARAMS_MARKER || trimmed.starts_with(LEGACY_PARAMS_MARKER) {
            let block = ctx.params_block
                           .as_ref()
                           .ok_or_else(|| unresolved("@wingflow:params", line_no))?;
            out.push(block.clone());
        } else if let Some(marker) = trimmed.strip_prefix(MARKER_PREFIX) {
            out.push(render_marker(marker, ctx, line_no)?);
        } else {
            out.push(substitute(line, ctx, line_no)?);
        }
    }

    let mut text = out.join("\n");
    if trailing_newline {
        text.push('\n');
    }
    Ok(text)
}

/// Lee la plantilla, la renderiza y escribe el resultado.
pub fn render_file(template_path: &Path, output_path: &Path, ctx: &RenderContext) -> Result<(), PipelineError> {
    if !template_path.is_file() {
        return Err(PipelineError::MissingTemplate { path: template_path.to_path_buf() });
    }
    let template = fs::read_to_string(template_path).map_err(|e| PipelineError::io(template_path, e))?;
    let text = render(&template, ctx)?;
    fs::write(output_path, text).map_err(|e| PipelineError::io(output_path, e))
}

fn render_marker(marker: &str, ctx: &RenderContext, line_no: usize) -> Result<String, PipelineError> {
    let mut parts = marker.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("invoke"), Some(stage), None) => match ctx.invocations.get(stage) {
            Some(Some(command)) => Ok(command.clone()),
            Some(None) => Ok(format!("# {stage}: disabled")),
            None => Err(unresolved(&format!("@wingflow:invoke {stage}"), line_no)),
        },
        _ => Err(unresolved(&format!("@wingflow:{}", marker.trim()), line_no)),
    }
}

fn substitute(line: &str, ctx: &RenderContext, line_no: usize) -> Result<String, PipelineError> {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            return Err(unresolved(after.trim(), line_no));
        };
        let name = after[..end].trim();
        let value = ctx.get(name).ok_or_else(|| unresolved(name, line_no))?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn require_resources(ctx: &RenderContext, token: &str, line_no: usize) -> Result<ResourceRequest, PipelineError> {
    ctx.resources.ok_or_else(|| unresolved(token, line_no))
}

fn unresolved(token: &str, line: usize) -> PipelineError {
    PipelineError::UnresolvedToken { token: token.to_string(),
                                     line }
}
