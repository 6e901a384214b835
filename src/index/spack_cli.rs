//! Spack CLI index adapter
//!
//! Answers index queries by running Spack itself:
//! - latest version: `spack versions --safe <package>`
//! - externals: `spack config get packages`, reading `packages.<package>.externals[].spec`

use crate::domain::Version;
use crate::error::IndexError;
use crate::index::PackageIndex;
use crate::parser::parse_spec;
use async_trait::async_trait;
use serde_yaml::Value;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default Spack executable
const DEFAULT_SPACK: &str = "spack";

/// Package index backed by the `spack` executable
#[derive(Debug, Clone)]
pub struct SpackIndex {
    program: String,
}

impl SpackIndex {
    /// Create an index that runs `spack` from PATH
    pub fn new() -> Self {
        Self::with_program(DEFAULT_SPACK)
    }

    /// Create an index that runs the given Spack executable
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str], package: &str) -> Result<String, IndexError> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!(%command, "querying package index");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                IndexError::query_failed(
                    package,
                    self.index_name(),
                    format!("failed to run '{}': {}", command, e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IndexError::query_failed(
                package,
                self.index_name(),
                format!("'{}' exited with {}: {}", command, output.status, stderr.trim()),
            ));
        }

        String::from_utf8(output.stdout).map_err(|e| {
            IndexError::invalid_response(package, self.index_name(), e.to_string())
        })
    }
}

impl Default for SpackIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PackageIndex for SpackIndex {
    fn index_name(&self) -> &'static str {
        "spack"
    }

    async fn fetch_latest_version(&self, package: &str) -> Result<Version, IndexError> {
        let stdout = self.run(&["versions", "--safe", package], package).await?;
        let latest = parse_versions_output(&stdout)
            .into_iter()
            .max()
            .ok_or_else(|| IndexError::NoVersions {
                package: package.to_string(),
                index: self.index_name().to_string(),
            })?;

        debug!(package, %latest, "latest known version");
        Ok(latest)
    }

    async fn fetch_external_versions(&self, package: &str) -> Result<Vec<Version>, IndexError> {
        let stdout = self.run(&["config", "get", "packages"], package).await?;
        let versions = external_versions_from_config(&stdout, package).map_err(|message| {
            IndexError::invalid_response(package, self.index_name(), message)
        })?;

        debug!(package, count = versions.len(), "external versions");
        Ok(versions)
    }
}

/// Parse the output of `spack versions`, one or more versions per line
///
/// Spack status lines (`==> ...`) are skipped.
pub fn parse_versions_output(output: &str) -> Vec<Version> {
    let mut versions = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("==>") {
            continue;
        }
        for word in line.split_whitespace() {
            match Version::parse(word) {
                Ok(version) => versions.push(version),
                Err(_) => warn!(word, "ignoring unparseable version from spack"),
            }
        }
    }
    versions
}

/// Collect the versions of a package's externals from `packages.yaml` content
pub fn external_versions_from_config(yaml: &str, package: &str) -> Result<Vec<Version>, String> {
    let config: Value =
        serde_yaml::from_str(yaml).map_err(|e| format!("failed to parse packages config: {}", e))?;

    let Some(externals) = config["packages"][package]["externals"].as_sequence() else {
        return Ok(Vec::new());
    };

    let mut versions = Vec::new();
    for external in externals {
        let Some(spec) = external["spec"].as_str() else {
            continue;
        };
        match parse_spec(spec) {
            Ok(parsed) => {
                if let Some(version) = parsed.ranges.into_iter().find_map(|range| range.lower) {
                    versions.push(version);
                }
            }
            Err(e) => warn!(spec, error = %e, "ignoring unparseable external spec"),
        }
    }
    Ok(versions)
}
