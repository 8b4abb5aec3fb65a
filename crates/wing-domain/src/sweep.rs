use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Límite de puntos por eje generado con `axis`.
pub const MAX_AXIS_POINTS: usize = 10_000;
/// Decimales conservados en los valores de eje y en los nombres de workspace.
pub const AXIS_DECIMALS: usize = 6;

/// Un punto del barrido: ángulo de cant y ángulo de flecha (grados).
/// Identifica una instancia del pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    cant: f64,
    sweep: f64,
}

impl SweepPoint {
    pub fn new(cant: f64, sweep: f64) -> Self {
        Self { cant: normalize_zero(cant),
               sweep: normalize_zero(sweep) }
    }

    pub fn cant(&self) -> f64 {
        self.cant
    }

    pub fn sweep(&self) -> f64 {
        self.sweep
    }

    /// Nombre del directorio de trabajo del punto, p.ej. `winglet_c-15_s0`.
    /// Como mucho `AXIS_DECIMALS` decimales, sin ceros finales.
    pub fn workspace_name(&self) -> String {
        format!("winglet_c{}_s{}", coordinate(self.cant), coordinate(self.sweep))
    }
}

impl fmt::Display for SweepPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cant={} sweep={}", self.cant, self.sweep)
    }
}

// -0.0 se imprime como "-0" y rompería el nombre del directorio.
fn normalize_zero(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

fn coordinate(v: f64) -> String {
    let fixed = format!("{v:.prec$}", prec = AXIS_DECIMALS);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

fn round_decimals(v: f64) -> f64 {
    let scale = 10f64.powi(AXIS_DECIMALS as i32);
    normalize_zero((v * scale).round() / scale)
}

/// Rejilla cartesiana de los dos ejes de diseño.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid {
    cant: Vec<f64>,
    sweep: Vec<f64>,
}

impl SweepGrid {
    pub fn new(cant: Vec<f64>, sweep: Vec<f64>) -> Result<Self, ConfigurationError> {
        if cant.is_empty() {
            return Err(ConfigurationError::EmptyAxis("cant"));
        }
        if sweep.is_empty() {
            return Err(ConfigurationError::EmptyAxis("sweep"));
        }
        for v in cant.iter().chain(sweep.iter()) {
            if !v.is_finite() {
                return Err(ConfigurationError::InvalidValue { field: "sweep grid",
                                                              reason: format!("non-finite value {v}") });
            }
        }
        Ok(Self { cant, sweep })
    }

    /// Eje uniforme `start, start+step, ..., <= end`, redondeado a
    /// `AXIS_DECIMALS` para que `0:1:0.1` y `0,0.1,...,1` coincidan.
    pub fn axis(start: f64, end: f64, step: f64) -> Result<Vec<f64>, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidValue { field: "axis", reason };
        if !(start.is_finite() && end.is_finite() && step.is_finite()) || step <= 0.0 || end < start {
            return Err(invalid(format!("cannot build {start}..={end} step {step}")));
        }
        let span = ((end - start) / step + 1e-9).floor();
        let too_many = || invalid(format!("{start}..={end} step {step} exceeds {MAX_AXIS_POINTS} points"));
        if !span.is_finite() || span >= MAX_AXIS_POINTS as f64 {
            return Err(too_many());
        }
        let count = (span as usize).checked_add(1).ok_or_else(too_many)?;
        Ok((0..count).map(|i| round_decimals(start + step * i as f64)).collect())
    }

    pub fn len(&self) -> usize {
        self.cant.len() * self.sweep.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Producto cartesiano, cant como eje exterior.
    pub fn points(&self) -> impl Iterator<Item = SweepPoint> + '_ {
        self.cant
            .iter()
            .flat_map(move |c| self.sweep.iter().map(move |s| SweepPoint::new(*c, *s)))
    }
}
