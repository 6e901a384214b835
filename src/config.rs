//! Project configuration loaded from `spackdev.toml`
//!
//! Relative paths in the file resolve against the directory holding it.

use crate::domain::{DependencyMode, VerConSpec};
use crate::env::yaml_merge;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file name
pub const CONFIG_FILE: &str = "spackdev.toml";

/// A dependency declared with `[[dependency]]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencyEntry {
    /// Spack spec, with an optional `@` version constraint
    pub spec: String,
    /// Predicate the spec is conditioned on
    #[serde(default)]
    pub when: Option<String>,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DevConfig {
    #[serde(default = "default_environments_dir")]
    pub environments_dir: PathBuf,

    #[serde(default)]
    pub templates: Vec<PathBuf>,

    #[serde(default)]
    pub unresolve: BTreeSet<String>,

    #[serde(default)]
    pub mode: DependencyMode,

    #[serde(default = "default_spack")]
    pub spack: String,

    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<DependencyEntry>,

    /// File this configuration was read from
    #[serde(skip)]
    path: PathBuf,
}

fn default_environments_dir() -> PathBuf {
    PathBuf::from("dev-envs")
}

fn default_spack() -> String {
    "spack".to_string()
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            environments_dir: default_environments_dir(),
            templates: Vec::new(),
            unresolve: BTreeSet::new(),
            mode: DependencyMode::default(),
            spack: default_spack(),
            dependencies: Vec::new(),
            path: PathBuf::from(CONFIG_FILE),
        }
    }
}

impl DevConfig {
    /// Read and parse a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Parse configuration text as if it were read from `path`
    pub fn from_toml_str(content: &str, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config: DevConfig =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.path = path.to_path_buf();

        debug!(
            path = %path.display(),
            dependencies = config.dependencies.len(),
            templates = config.templates.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Path the configuration was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory relative paths resolve against
    pub fn base_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    /// Root directory of the named environment
    pub fn environment_root(&self, name: &str) -> PathBuf {
        self.resolve_path(&self.environments_dir).join(name)
    }

    /// Parse every declared dependency
    pub fn specs(&self) -> Result<Vec<VerConSpec>, ConfigError> {
        self.dependencies
            .iter()
            .map(|entry| {
                VerConSpec::new(&entry.spec, entry.when.as_deref()).map_err(|source| {
                    ConfigError::Dependency {
                        path: self.path.clone(),
                        source,
                    }
                })
            })
            .collect()
    }

    /// The first declared dependency on `package`, if any
    pub fn spec_for_package(&self, package: &str) -> Result<Option<VerConSpec>, ConfigError> {
        Ok(self
            .specs()?
            .into_iter()
            .find(|spec| spec.package() == package))
    }

    /// Merge all template layers into one mapping
    ///
    /// Returns `None` when no templates are configured. A layer whose only
    /// top-level key is `spack` contributes the mapping below it.
    pub fn load_template(&self) -> Result<Option<Mapping>, ConfigError> {
        if self.templates.is_empty() {
            return Ok(None);
        }

        let mut merged = Mapping::new();
        for template in &self.templates {
            let path = self.resolve_path(template);
            let layer = read_template(&path)?;
            yaml_merge(&mut merged, &layer);
        }
        Ok(Some(merged))
    }
}

fn read_template(path: &Path) -> Result<Mapping, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let document: Value = serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut layer = match document {
        Value::Mapping(mapping) => mapping,
        Value::Null => Mapping::new(),
        _ => {
            return Err(ConfigError::TemplateNotMapping {
                path: path.to_path_buf(),
            })
        }
    };

    if layer.len() == 1 {
        if let Some(Value::Mapping(inner)) = layer.remove("spack") {
            layer = inner;
        }
    }

    debug!(path = %path.display(), keys = layer.len(), "loaded template layer");
    Ok(layer)
}
