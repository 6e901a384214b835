//! Application error types using thiserror
//!
//! Error hierarchy:
//! - SpecError: malformed spec strings and version constraints
//! - IndexError: failures while querying the live package index
//! - ResolveError: version resolution that cannot be satisfied
//! - CommandError: failed external command invocations
//! - EnvError: environment construction, generation, install and lookup
//! - ConfigError: configuration and template loading

use std::path::PathBuf;
use thiserror::Error;

/// Hint appended to failures when running under continuous integration
pub const CI_HINT: &str =
    "In CI: the reused merge-base image is out-of-date. Try updating the branch.";

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Spec parsing related errors
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Version resolution related errors
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Environment related errors
    #[error(transparent)]
    Env(#[from] EnvError),

    /// Configuration related errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while parsing a version-constrained spec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// The spec does not start with a package name
    #[error("spec '{spec}' does not start with a package name")]
    MissingPackage { spec: String },

    /// Ranges were declared but the first one has no lower bound
    #[error("spec must declare a minimum version: '{spec}'")]
    MissingMinimum { spec: String },

    /// A later range starts below the first range's minimum
    #[error("version ranges in '{spec}' must ascend from the minimum version")]
    UnorderedRanges { spec: String },

    /// A version bound could not be parsed
    #[error("invalid version '{version}'")]
    InvalidVersion { version: String },

    /// A range item was empty or malformed
    #[error("invalid version range '{range}' in '{spec}'")]
    InvalidRange { spec: String, range: String },
}

/// Errors related to live package index queries
#[derive(Error, Debug)]
pub enum IndexError {
    /// The index command could not be run or exited unsuccessfully
    #[error("failed to query {index} for '{package}': {message}")]
    QueryFailed {
        package: String,
        index: String,
        message: String,
    },

    /// The index knows no versions for the package
    #[error("no versions of '{package}' are known to {index}")]
    NoVersions { package: String, index: String },

    /// The index answered with something unparseable
    #[error("invalid response from {index} for '{package}': {message}")]
    InvalidResponse {
        package: String,
        index: String,
        message: String,
    },
}

/// Errors raised while resolving specs against the package index
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The live latest version and the declared ranges do not intersect
    #[error(
        "no supported latest version for '{package}', intersection of @:{latest} and {version_spec} is empty"
    )]
    EmptyIntersection {
        package: String,
        latest: String,
        version_spec: String,
    },

    /// The package index query failed
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Errors from external command invocations
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command could not be started at all
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command exited unsuccessfully
    #[error("'{command}' failed{}: {stderr}", code_suffix(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The command output could not be understood
    #[error("unexpected output from '{command}': {message}")]
    InvalidOutput { command: String, message: String },
}

/// Errors related to managed Spack environments
#[derive(Error, Debug)]
pub enum EnvError {
    /// The environment root exists but is not a directory
    #[error("environment root exists and is not a directory: {path}")]
    Conflict { path: PathBuf },

    /// The environment name is not acceptable
    #[error("invalid environment name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Filesystem operation failed
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest serialization failed
    #[error("failed to write manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    /// `spack install` exited unsuccessfully
    #[error("spack install failed with code {}", exit_code(.code))]
    InstallFailed { code: Option<i32> },

    /// The command is not on the package's PATH
    #[error("unable to find {command} in path {path}")]
    CommandNotFound { command: String, path: String },

    /// The located binary did not answer its check invocation
    #[error("{} {arg} failed{}", .command.display(), code_suffix(.code))]
    CheckFailed {
        command: PathBuf,
        arg: String,
        code: Option<i32>,
    },

    /// No installed package matches the spec
    #[error("no installed package matches '{spec}'")]
    PackageNotFound { spec: String },

    /// More than one installed package matches the spec
    #[error("'{spec}' matches {count} installed packages")]
    AmbiguousPackage { spec: String, count: usize },

    /// An external command failed
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read a configuration or template file
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("failed to parse TOML in {path}: {message}")]
    TomlParse { path: PathBuf, message: String },

    /// YAML template parsing error
    #[error("failed to parse YAML template {path}: {message}")]
    YamlParse { path: PathBuf, message: String },

    /// Template top level is not a mapping
    #[error("template {path} must be a mapping")]
    TemplateNotMapping { path: PathBuf },

    /// A dependency entry is not a valid spec
    #[error("invalid dependency in {path}: {source}")]
    Dependency {
        path: PathBuf,
        #[source]
        source: SpecError,
    },
}

fn code_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" with code {c}")).unwrap_or_default()
}

fn exit_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl EnvError {
    /// Creates a new Io error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EnvError::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a new InvalidName error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        EnvError::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl IndexError {
    /// Creates a new QueryFailed error
    pub fn query_failed(
        package: impl Into<String>,
        index: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        IndexError::QueryFailed {
            package: package.into(),
            index: index.into(),
            message: message.into(),
        }
    }

    /// Creates a new InvalidResponse error
    pub fn invalid_response(
        package: impl Into<String>,
        index: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        IndexError::InvalidResponse {
            package: package.into(),
            index: index.into(),
            message: message.into(),
        }
    }
}

/// Render a failure as the one-line message shown to users
///
/// With `ci` set the stale-image hint is appended on its own line.
pub fn failure_message(err: &dyn std::fmt::Display, ci: bool) -> String {
    if ci {
        format!("{err}\n  {CI_HINT}")
    } else {
        err.to_string()
    }
}
