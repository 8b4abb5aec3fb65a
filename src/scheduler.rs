//! Envío de jobs al scheduler del cluster.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

/// Identificador devuelto por el scheduler (p.ej. `1234567.pbs`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("could not run {}: {reason}", .program.display())]
    Spawn { program: PathBuf, reason: String },
    #[error("submission rejected (exit code {exit_code:?}): {stderr}")]
    Rejected { exit_code: Option<i32>, stderr: String },
    #[error("scheduler returned no job id")]
    EmptyJobId,
}

pub trait Scheduler {
    /// Envía el script; el job se ejecuta en el directorio del script.
    fn submit(&self, script: &Path) -> Result<JobId, SchedulerError>;
}

/// `qsub <script>` ejecutado en el directorio del script.
#[derive(Debug, Clone)]
pub struct QsubScheduler {
    program: PathBuf,
}

impl QsubScheduler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for QsubScheduler {
    fn default() -> Self {
        Self::new("qsub")
    }
}

impl Scheduler for QsubScheduler {
    fn submit(&self, script: &Path) -> Result<JobId, SchedulerError> {
        let dir = script.parent().unwrap_or_else(|| Path::new("."));
        let name = script.file_name().map(PathBuf::from).unwrap_or_else(|| script.to_path_buf());
        debug!("submit:start program={} script={}", self.program.display(), script.display());
        let output = Command::new(&self.program).arg(&name)
                                                .current_dir(dir)
                                                .stdin(Stdio::null())
                                                .output()
                                                .map_err(|e| SchedulerError::Spawn { program: self.program.clone(),
                                                                                     reason: e.to_string() })?;
        if !output.status.success() {
            return Err(SchedulerError::Rejected { exit_code: output.status.code(),
                                                  stderr: String::from_utf8_lossy(&output.stderr).trim().to_string() });
        }
        let job_id = parse_job_id(&String::from_utf8_lossy(&output.stdout)).ok_or(SchedulerError::EmptyJobId)?;
        info!("submit:ok job_id={job_id} dir={}", dir.display());
        Ok(job_id)
    }
}

/// Primera línea no vacía de la salida de `qsub`.
pub fn parse_job_id(stdout: &str) -> Option<JobId> {
    stdout.lines()
          .map(str::trim)
          .find(|l| !l.is_empty())
          .map(|l| JobId(l.to_string()))
}

/// No envía nada: registra el script y devuelve un id sintético.
#[derive(Debug, Default)]
pub struct DryRunScheduler {
    count: RefCell<u32>,
}

impl DryRunScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for DryRunScheduler {
    fn submit(&self, script: &Path) -> Result<JobId, SchedulerError> {
        let mut n = self.count.borrow_mut();
        *n += 1;
        info!("submit:dry-run n={} script={}", *n, script.display());
        Ok(JobId(format!("dry-run-{}", *n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_is_first_non_empty_line() {
        assert_eq!(parse_job_id("\n 1234567.pbs \n"), Some(JobId("1234567.pbs".into())));
        assert_eq!(parse_job_id("  \n"), None);
    }

    #[test]
    fn dry_run_numbers_submissions() {
        let s = DryRunScheduler::new();
        assert_eq!(s.submit(Path::new("/w/a/submit.pbs")).unwrap().0, "dry-run-1");
        assert_eq!(s.submit(Path::new("/w/b/submit.pbs")).unwrap().0, "dry-run-2");
    }

    #[cfg(unix)]
    #[test]
    fn qsub_runs_in_the_script_directory() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("submit.pbs");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        // a fake qsub that echoes a job id only when the script is found in cwd
        let fake = dir.path().join("fake-qsub");
        std::fs::write(&fake, "#!/bin/sh\ntest -f \"$1\" && echo 42.pbs\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();
        let id = QsubScheduler::new(&fake).submit(&script).unwrap();
        assert_eq!(id, JobId("42.pbs".into()));
    }

    #[cfg(unix)]
    #[test]
    fn rejected_submission_reports_exit_code() {
        let err = QsubScheduler::new("false").submit(Path::new("/tmp/submit.pbs")).unwrap_err();
        assert!(matches!(err, SchedulerError::Rejected { exit_code: Some(1), .. }));
    }
}
