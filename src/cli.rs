//! CLI argument parsing module for spackdev

use crate::domain::DependencyMode;
use crate::env::SpackEnv;
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Validate an environment name given on the command line
fn parse_env_name(s: &str) -> Result<String, String> {
    SpackEnv::validate_name(s).map_err(|e| e.to_string())?;
    Ok(s.to_string())
}

/// Version-constrained Spack development environments
#[derive(Parser, Debug, Clone)]
#[command(
    name = "spackdev",
    version,
    about = "Version-constrained Spack development environments"
)]
pub struct CliArgs {
    /// Configuration file (default: ./spackdev.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Enable quiet mode - minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Running under continuous integration (read from $CI when not given)
    #[arg(
        long,
        global = true,
        env = "CI",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub ci: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the resolved specs grouped by `when` predicate
    Resolve {
        #[command(flatten)]
        resolution: ResolutionArgs,

        /// Output results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Write spack.yaml for a development environment
    Generate {
        /// Environment name
        #[arg(value_parser = parse_env_name)]
        name: String,

        #[command(flatten)]
        resolution: ResolutionArgs,

        /// Run spack install after generating
        #[arg(long)]
        install: bool,
    },

    /// Install a generated environment
    Install {
        /// Environment name
        #[arg(value_parser = parse_env_name)]
        name: String,
    },

    /// Print the path of a command provided by an installed package
    Which {
        /// Environment name
        #[arg(value_parser = parse_env_name)]
        name: String,

        /// Command to look up
        command: String,

        /// Spec of the package providing the command
        spec: String,

        /// Argument used to check the binary runs
        #[arg(
            long,
            value_name = "ARG",
            default_value = "--version",
            allow_hyphen_values = true
        )]
        check_arg: String,

        /// Do not run the binary after locating it
        #[arg(long, conflicts_with = "check_arg")]
        no_check: bool,
    },

    /// Print the compiler preferred by an installed environment
    Compiler {
        /// Environment name
        #[arg(value_parser = parse_env_name)]
        name: String,
    },
}

/// Options shared by commands that resolve specs
#[derive(Args, Debug, Clone, Default)]
pub struct ResolutionArgs {
    #[command(flatten)]
    pub mode: ModeArgs,

    /// Resolve this package as if in `any` mode (can be specified multiple times)
    #[arg(long, value_name = "PKG", action = ArgAction::Append)]
    pub unresolve: Vec<String>,
}

/// Mutually exclusive resolution mode flags
#[derive(Args, Debug, Clone, Default)]
#[group(multiple = false)]
pub struct ModeArgs {
    /// Full ranges plus the latest supported version (default)
    #[arg(long)]
    pub latest: bool,

    /// Pin each package to its minimum version
    #[arg(long)]
    pub minimum: bool,

    /// Full declared ranges, no index queries
    #[arg(long)]
    pub any: bool,
}

impl ModeArgs {
    /// Mode selected on the command line, if any
    pub fn mode(&self) -> Option<DependencyMode> {
        if self.latest {
            Some(DependencyMode::Latest)
        } else if self.minimum {
            Some(DependencyMode::Minimum)
        } else if self.any {
            Some(DependencyMode::Any)
        } else {
            None
        }
    }
}
