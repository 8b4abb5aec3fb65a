//! Extracción de CL/CD de los logs de los jobs (`submit.pbs.o*`).
//!
//! El solver imprime su historial como tabla `| iter | ... | CL | CD |`; la
//! última fila válida de cada workspace da los coeficientes del punto.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;
use wing_domain::{SweepGrid, SweepPoint};

/// Prefijo de los logs de salida que deja el scheduler.
pub const JOB_LOG_PREFIX: &str = "submit.pbs.o";
pub const RESULTS_FILE: &str = "results.dat";

const CL_COLUMN: usize = 4;
const CD_COLUMN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoefficientRow {
    pub point: SweepPoint,
    pub cl: Option<f64>,
    pub cd: Option<f64>,
}

impl CoefficientRow {
    /// Línea de `results.dat`: `cant sweep cl cd`.
    pub fn to_line(&self) -> String {
        format!("{} {} {} {}",
                self.point.cant(),
                self.point.sweep(),
                fmt_opt(self.cl),
                fmt_opt(self.cd))
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_else(|| "None".to_string())
}

fn is_history_row(line: &str) -> bool {
    let Some(rest) = line.trim_start().strip_prefix('|') else {
        return false;
    };
    let Some((first, _)) = rest.split_once('|') else {
        return false;
    };
    let first = first.trim();
    !first.is_empty() && first.chars().all(|c| c.is_ascii_digit())
}

/// Último par (CL, CD) de una tabla de historial. Las filas cuyo CL/CD no se
/// puede leer como número se ignoran.
pub fn parse_last_coefficients(text: &str) -> Option<(f64, f64)> {
    let mut last = None;
    for line in text.lines().filter(|l| is_history_row(l)) {
        let parts: Vec<&str> = line.split('|').collect();
        let (Some(cl), Some(cd)) = (parts.get(CL_COLUMN), parts.get(CD_COLUMN)) else {
            continue;
        };
        match (cl.trim().parse::<f64>(), cd.trim().parse::<f64>()) {
            (Ok(cl), Ok(cd)) => last = Some((cl, cd)),
            _ => debug!("results:skip unparsable row {}", line.trim()),
        }
    }
    last
}

/// Logs del scheduler dentro de un workspace, en orden de nombre.
pub fn job_logs(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut logs = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.file_name()
                          .and_then(|n| n.to_str())
                          .is_some_and(|n| n.starts_with(JOB_LOG_PREFIX))
            {
                logs.push(path);
            }
        }
    }
    logs.sort();
    Ok(logs)
}

/// Una fila por workspace existente. Con varios logs gana la última fila
/// del último log que tenga historial.
pub fn collect(output_dir: &Path, grid: &SweepGrid) -> io::Result<Vec<CoefficientRow>> {
    let mut rows = Vec::new();
    for point in grid.points() {
        let root = output_dir.join(point.workspace_name());
        if !root.is_dir() {
            continue;
        }
        let mut coefficients = None;
        for log_path in job_logs(&root)? {
            let text = fs::read(&log_path).map(|b| String::from_utf8_lossy(&b).into_owned())?;
            if let Some(found) = parse_last_coefficients(&text) {
                coefficients = Some(found);
            }
        }
        if coefficients.is_none() {
            warn!("results:no coefficients for {point} in {}", root.display());
        }
        rows.push(CoefficientRow { point,
                                   cl: coefficients.map(|c| c.0),
                                   cd: coefficients.map(|c| c.1) });
    }
    Ok(rows)
}

pub fn write_results(path: &Path, rows: &[CoefficientRow]) -> io::Result<()> {
    let mut text = String::new();
    for row in rows {
        text.push_str(&row.to_line());
        text.push('\n');
    }
    fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HISTORY: &str = "\
+-----------------------------------------------+
|  Inner_Iter|   rms[Rho]|  rms[RhoE]|       CL|       CD|
+-----------------------------------------------+
|           0|  -2.40000|   3.10000| 0.120000| 0.030000|
|           1|  -2.50000|   3.00000| 0.125000| 0.031000|
|           2|  -2.60000|   2.90000|        -|        -|
";

    #[test]
    fn last_numeric_row_wins() {
        assert_eq!(parse_last_coefficients(HISTORY), Some((0.125, 0.031)));
    }

    #[test]
    fn rows_without_cd_column_are_skipped() {
        let text = "|  0| a| b| 0.5|\n|  1| a| b| 0.6| 0.07|\n| 2| a| b| 0.7|\n";
        assert_eq!(parse_last_coefficients(text), Some((0.6, 0.07)));
    }

    #[test]
    fn header_rows_are_not_history() {
        assert!(!is_history_row("|  Inner_Iter|   CL|"));
        assert!(is_history_row("  |  12| 0.1|"));
        assert_eq!(parse_last_coefficients("no table here\n"), None);
    }

    #[test]
    fn missing_values_render_as_none() {
        let row = CoefficientRow { point: SweepPoint::new(-15.0, 10.0),
                                   cl: None,
                                   cd: None };
        assert_eq!(row.to_line(), "-15 10 None None");
    }
}
