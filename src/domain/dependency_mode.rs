//! Resolution modes for version-constrained specs

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a version-constrained spec is turned into concrete spec strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyMode {
    /// Prefer the newest version the index and the constraints agree on
    #[default]
    Latest,
    /// Pin every dependency to its declared minimum version
    Minimum,
    /// Leave the full declared range for Spack to choose from
    Any,
}

impl DependencyMode {
    /// Returns all modes
    pub fn all() -> &'static [DependencyMode] {
        &[
            DependencyMode::Latest,
            DependencyMode::Minimum,
            DependencyMode::Any,
        ]
    }

    /// The identifier used in configuration files and CLI flags
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyMode::Latest => "latest",
            DependencyMode::Minimum => "minimum",
            DependencyMode::Any => "any",
        }
    }
}

impl fmt::Display for DependencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
