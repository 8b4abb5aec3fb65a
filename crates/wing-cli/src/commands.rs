use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use log::{info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use wing_adapters::{build_pipeline, run_stages, ConvergenceConfig, ProcessInvoker, StageEnv, ToolchainConfig};
use wing_core::CancellationToken;
use wing_domain::{ConfigurationError, ResourceRequest, WorkspaceLayout};
use wingflow::results::{self, RESULTS_FILE};
use wingflow::{DryRunScheduler, QsubScheduler, Scheduler, SweepConfig, SweepDriver, WingflowError};

use crate::args::{point_of, selection, CollectArgs, ConvergenceArgs, RunArgs, SolverArgs, StageArgs, StageName,
                  SweepArgs};

/// SIGINT/SIGTERM marcan el token; el trabajo en curso termina antes de
/// parar.
fn cancellation_on_signals() -> Result<CancellationToken, WingflowError> {
    let token = CancellationToken::new();
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, token.flag())?;
    }
    Ok(token)
}

fn exit_status(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

pub fn sweep(args: SweepArgs) -> Result<ExitCode, WingflowError> {
    let mut config = SweepConfig::from_env();
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(dir) = args.template_dir {
        config.template_dir = dir;
    }
    if let Some(program) = args.scheduler {
        config.scheduler = program;
    }
    if let Some(bin) = args.wingflow_bin {
        config.wingflow_bin = bin;
    }
    let grid = args.grid.grid()?;
    let sel = selection(&args.stages, &args.solver);
    let resources = ResourceRequest::new(args.resources.np, args.resources.mem_gb, args.resources.walltime_hours);
    let cancel = cancellation_on_signals()?;

    // sin flags explícitos cada nodo usa sus valores por defecto
    let convergence = if args.convergence.is_set() {
        Some(convergence_config(&args.convergence)?)
    } else {
        None
    };

    let report = if args.dry_run {
        let driver = configure(SweepDriver::new(&config, DryRunScheduler::new()), cancel, convergence);
        driver.run_sweep(&grid, &sel, &resources)?
    } else {
        let driver = configure(SweepDriver::new(&config, QsubScheduler::new(&config.scheduler)), cancel, convergence);
        driver.run_sweep(&grid, &sel, &resources)?
    };

    if let Some(path) = args.report {
        let json = serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?;
        fs::write(&path, json)?;
        info!("sweep:report written to {}", path.display());
    }
    for failed in &report.failed {
        warn!("sweep:failed {} -> {}", failed.point, failed.error);
    }
    Ok(exit_status(report.is_success()))
}

fn configure<S: Scheduler>(driver: SweepDriver<S>,
                           cancel: CancellationToken,
                           convergence: Option<ConvergenceConfig>)
                           -> SweepDriver<S> {
    let driver = driver.with_cancellation(cancel);
    match convergence {
        Some(c) => driver.with_convergence(c),
        None => driver,
    }
}

pub fn run(args: RunArgs) -> Result<ExitCode, WingflowError> {
    execute(&args.workdir,
            &args.stages,
            args.np,
            point_of(args.cant, args.sweep),
            &args.solver,
            &args.convergence)
}

pub fn stage(args: StageArgs) -> Result<ExitCode, WingflowError> {
    execute(&args.workdir,
            &[args.stage],
            args.np,
            point_of(args.cant, args.sweep),
            &args.solver,
            &args.convergence)
}

fn execute(workdir: &Path,
           stages: &[StageName],
           np: u32,
           point: Option<wing_domain::SweepPoint>,
           solver: &SolverArgs,
           convergence: &ConvergenceArgs)
           -> Result<ExitCode, WingflowError> {
    let toolchain = ToolchainConfig::from_env()?;
    let sel = selection(stages, solver);
    let convergence = convergence_config(convergence)?;
    let env = StageEnv::new(WorkspaceLayout::new(workdir), toolchain, Arc::new(ProcessInvoker::new()), np);
    let pipeline = build_pipeline(&env, &sel, point, convergence)?;
    let cancel = cancellation_on_signals()?;
    let flow_id = run_stages(&env.layout, pipeline, cancel)?;
    info!("run:ok workdir={} flow_id={flow_id}", workdir.display());
    Ok(ExitCode::SUCCESS)
}

/// Valores por defecto del bucle con las sobrescrituras de la línea de
/// comandos.
pub fn convergence_config(args: &ConvergenceArgs) -> Result<ConvergenceConfig, ConfigurationError> {
    let mut config = ConvergenceConfig::default();
    if let Some(target) = args.y_plus_target {
        config.y_plus_target = positive("y_plus_target", target)?;
    }
    if let Some(spacing) = args.initial_spacing {
        config.initial_spacing = positive("initial_spacing", spacing)?;
    }
    if let Some(max) = args.max_iterations {
        if max == 0 {
            return Err(ConfigurationError::InvalidValue { field: "max_iterations",
                                                          reason: "must be at least 1".into() });
        }
        config.max_iterations = max;
    }
    Ok(config)
}

fn positive(field: &'static str, value: f64) -> Result<f64, ConfigurationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigurationError::InvalidValue { field,
                                               reason: format!("must be a positive number, got {value}") })
    }
}

pub fn collect(args: CollectArgs) -> Result<ExitCode, WingflowError> {
    let mut config = SweepConfig::from_env();
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    let grid = args.grid.grid()?;
    let rows = results::collect(&config.output_dir, &grid)?;
    let path: PathBuf = args.results.unwrap_or_else(|| config.output_dir.join(RESULTS_FILE));
    results::write_results(&path, &rows)?;
    let missing = rows.iter().filter(|r| r.cl.is_none()).count();
    info!("collect:ok rows={} missing={missing} results={}", rows.len(), path.display());
    Ok(ExitCode::SUCCESS)
}
