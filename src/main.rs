//! spackdev - Version-constrained Spack development environments CLI
//!
//! Resolves the dependencies declared in `spackdev.toml` and manages the
//! Spack environments built from them.

use clap::Parser;
use colored::Colorize;
use spackdev::cli::{CliArgs, Command};
use spackdev::config::{DevConfig, CONFIG_FILE};
use spackdev::error::failure_message;
use spackdev::orchestrator::Orchestrator;
use spackdev::output::{create_formatter, OutputConfig};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    // Run the main logic and handle errors
    match run(&args).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), failure_message(&e, args.ci));
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr; `RUST_LOG` takes precedence over `--verbose`
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

/// Main application logic
async fn run(args: &CliArgs) -> anyhow::Result<ExitCode> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = DevConfig::load(&config_path)?;

    if args.verbose {
        eprintln!("spackdev v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("Config: {}", config_path.display());
    }

    let orchestrator = Orchestrator::new(config, !args.quiet);
    let color = io::stdout().is_terminal();
    let mut stdout = io::stdout().lock();

    match &args.command {
        Command::Resolve { resolution, json } => {
            let report = orchestrator
                .resolve(resolution.mode.mode(), &resolution.unresolve)
                .await?;
            let formatter =
                create_formatter(OutputConfig::from_cli(*json, args.verbose, args.quiet, color));
            formatter.format_resolution(&report, &mut stdout)?;
        }
        Command::Generate {
            name,
            resolution,
            install,
        } => {
            let report = orchestrator
                .generate(
                    name,
                    resolution.mode.mode(),
                    &resolution.unresolve,
                    *install,
                )
                .await?;
            let formatter =
                create_formatter(OutputConfig::from_cli(false, args.verbose, args.quiet, color));
            formatter.format_generate(&report, &mut stdout)?;
        }
        Command::Install { name } => {
            orchestrator.install(name)?;
        }
        Command::Which {
            name,
            command,
            spec,
            check_arg,
            no_check,
        } => {
            let check_arg = (!no_check).then_some(check_arg.as_str());
            let path = orchestrator.which(name, command, spec, check_arg)?;
            writeln!(stdout, "{}", path.display())?;
        }
        Command::Compiler { name } => match orchestrator.compiler(name)? {
            Some(compiler) => writeln!(stdout, "{}", compiler)?,
            None => {
                if !args.quiet {
                    eprintln!(
                        "{} no compiler recorded in environment '{}', install it first",
                        "Note:".yellow().bold(),
                        name
                    );
                }
                return Ok(ExitCode::FAILURE);
            }
        },
    }

    stdout.flush()?;
    Ok(ExitCode::SUCCESS)
}
