//! Lectura del `y+` máximo a partir de la salida superficial del solver.

use std::fs;
use std::path::Path;

use wing_core::PipelineError;

pub const Y_PLUS_COLUMN: &str = "Y_Plus";

/// Máximo de la columna `Y_Plus` de un CSV de SU2 (cabeceras entre comillas).
pub fn max_y_plus(surface_csv: &Path) -> Result<f64, PipelineError> {
    if !surface_csv.is_file() {
        return Err(PipelineError::MissingArtifact { stage: "cfd".into(),
                                                    path: surface_csv.to_path_buf() });
    }
    let text = fs::read_to_string(surface_csv).map_err(|e| PipelineError::io(surface_csv, e))?;
    parse_max_y_plus(&text).ok_or_else(|| PipelineError::ToolFailure {
                               tool: "su2_cfd".into(),
                               exit_code: Some(0),
                               stderr_excerpt: format!("{} has no usable {Y_PLUS_COLUMN} values",
                                                       surface_csv.display()),
                           })
}

/// `None` si falta la columna o no hay ningún valor finito.
pub fn parse_max_y_plus(text: &str) -> Option<f64> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next()?;
    let column = header.split(',').position(|h| h.trim().trim_matches('"') == Y_PLUS_COLUMN)?;
    lines.filter_map(|row| row.split(',').nth(column))
         .filter_map(|cell| cell.trim().parse::<f64>().ok())
         .filter(|v| v.is_finite())
         .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_the_maximum_of_the_column() {
        let csv = "\"PointID\",\"x\",\"Y_Plus\"\n0,0.1,0.4\n1,0.2,2.2\n2,0.3,1.7\n";
        assert_eq!(parse_max_y_plus(csv), Some(2.2));
    }

    #[test]
    fn skips_unparseable_cells() {
        let csv = "Y_Plus,x\nnan,1\n0.8,2\n-,3\n";
        assert_eq!(parse_max_y_plus(csv), Some(0.8));
    }

    #[test]
    fn missing_column_is_none() {
        assert_eq!(parse_max_y_plus("x,y\n1,2\n"), None);
        assert_eq!(parse_max_y_plus(""), None);
    }

    #[test]
    fn missing_file_is_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface_flow.csv");
        assert_eq!(max_y_plus(&path).unwrap_err(),
                   PipelineError::MissingArtifact { stage: "cfd".into(),
                                                    path });
    }
}
