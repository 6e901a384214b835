//! Spack integration for managed environments
//!
//! This module provides:
//! - The `SpackRunner` trait wrapping the environment-scoped Spack commands
//! - `SystemSpack`, running the real `spack` executable
//! - Helpers for reading `spack load --sh` output and searching a PATH

use crate::error::CommandError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Trait for running Spack commands against an environment directory
pub trait SpackRunner {
    /// Install the environment, stopping at the first failure
    fn install(&self, env: &Path) -> Result<(), CommandError>;

    /// List installed specs as JSON, optionally filtered by a spec
    fn find_json(&self, env: &Path, spec: Option<&str>) -> Result<String, CommandError>;

    /// Shell commands that load an installed spec into the environment
    fn load_script(&self, env: &Path, spec: &str) -> Result<String, CommandError>;

    /// Run `program arg` with output discarded to check it responds
    fn check_binary(&self, program: &Path, arg: &str) -> Result<(), CommandError>;
}

/// Default runner that executes the real `spack` executable
#[derive(Debug, Clone)]
pub struct SystemSpack {
    program: String,
}

impl SystemSpack {
    /// Create a runner that uses `spack` from PATH
    pub fn new() -> Self {
        Self::with_program("spack")
    }

    /// Create a runner for the given Spack executable
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn env_command(&self, env: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("-D").arg(env);
        command
    }

    /// Run a command and capture its stdout
    fn capture(&self, mut command: Command) -> Result<String, CommandError> {
        let command_line = describe(&command);
        debug!(command = %command_line, "running spack");

        let output = command.output().map_err(|e| CommandError::Spawn {
            command: command_line.clone(),
            source: e,
        })?;

        if !output.status.success() {
            return Err(CommandError::Failed {
                command: command_line,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for SystemSpack {
    fn default() -> Self {
        Self::new()
    }
}

impl SpackRunner for SystemSpack {
    fn install(&self, env: &Path) -> Result<(), CommandError> {
        let mut command = self.env_command(env);
        command.args(["install", "--fail-fast"]);
        let command_line = describe(&command);
        debug!(command = %command_line, "running spack");

        // Build output goes straight to the user's terminal
        let status = command.status().map_err(|e| CommandError::Spawn {
            command: command_line.clone(),
            source: e,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(CommandError::Failed {
                command: command_line,
                code: status.code(),
                stderr: String::new(),
            })
        }
    }

    fn find_json(&self, env: &Path, spec: Option<&str>) -> Result<String, CommandError> {
        let mut command = self.env_command(env);
        command.args(["find", "--json"]);
        if let Some(spec) = spec {
            command.arg(spec);
        }
        self.capture(command)
    }

    fn load_script(&self, env: &Path, spec: &str) -> Result<String, CommandError> {
        let mut command = self.env_command(env);
        command.args(["load", "--sh", spec]);
        self.capture(command)
    }

    fn check_binary(&self, program: &Path, arg: &str) -> Result<(), CommandError> {
        let command_line = format!("{} {}", program.display(), arg);
        debug!(command = %command_line, "checking binary");

        let status = Command::new(program)
            .arg(arg)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| CommandError::Spawn {
                command: command_line.clone(),
                source: e,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(CommandError::Failed {
                command: command_line,
                code: status.code(),
                stderr: String::new(),
            })
        }
    }
}

fn describe(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the value a shell script exports for `name`
///
/// Understands the `export NAME=value;` lines printed by `spack load --sh`,
/// with the value optionally single- or double-quoted.
pub fn parse_exported_variable(script: &str, name: &str) -> Option<String> {
    script
        .split([';', '\n'])
        .filter_map(|statement| statement.trim().strip_prefix("export "))
        .filter_map(|assignment| assignment.split_once('='))
        .filter(|(key, _)| key.trim() == name)
        .map(|(_, value)| unquote(value.trim()).to_string())
        .last()
}

fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Locate an executable named `command` in a PATH-style search list
pub fn find_in_path(command: &str, path: &str) -> Option<PathBuf> {
    std::env::split_paths(path)
        .map(|dir| dir.join(command))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
