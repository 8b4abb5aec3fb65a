//! `wingflow`: barridos de winglets en el cluster.
//!
//! En el nodo de login `sweep` prepara un workspace por punto y envía los
//! jobs; `collect` reúne CL/CD de los logs. En el nodo de cómputo el script
//! de envío llama a `stage` (una etapa) o `run` (todas las activas).

mod args;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use log::error;
use simple_logger::SimpleLogger;

use crate::args::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = SimpleLogger::new().with_level(cli.level()).init() {
        eprintln!("wingflow: logger init failed: {e}");
    }
    let result = match cli.command {
        Command::Sweep(args) => commands::sweep(args),
        Command::Run(args) => commands::run(args),
        Command::Stage(args) => commands::stage(args),
        Command::Collect(args) => commands::collect(args),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code().clamp(1, 255) as u8)
        }
    }
}
