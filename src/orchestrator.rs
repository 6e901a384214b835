//! Orchestrator coordinating configuration, resolution and environments
//!
//! This module provides:
//! - Workflow coordination: load specs → query index → resolve → write manifest
//! - Mode and unresolve selection from configuration plus CLI overrides
//! - Progress display while the package index or an environment is queried

use crate::config::DevConfig;
use crate::domain::{DependencyMode, VerConSpec};
use crate::env::{CompilerSpec, GenerateResult, SpackEnv};
use crate::error::{AppError, ResolveError};
use crate::index::{PackageIndex, SpackIndex};
use crate::progress::Progress;
use crate::resolve::{resolve_specs, ResolvedSpecs};
use crate::spack::SystemSpack;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

/// Orchestrator for the resolve, generate, install and which workflows
pub struct Orchestrator {
    /// Loaded project configuration
    config: DevConfig,
    /// Live package index
    index: Box<dyn PackageIndex>,
    /// Whether to draw progress while querying the index
    show_progress: bool,
}

/// Result of resolving the configured dependencies
#[derive(Debug, Clone)]
pub struct ResolutionReport {
    /// Mode the specs were resolved for
    pub mode: DependencyMode,
    /// Packages forced to `any` mode
    pub unresolve: BTreeSet<String>,
    /// Resolved spec strings grouped by `when`
    pub groups: ResolvedSpecs,
}

impl ResolutionReport {
    /// Total number of resolved spec strings
    pub fn spec_count(&self) -> usize {
        self.groups.values().map(|specs| specs.len()).sum()
    }
}

/// Result of generating an environment
#[derive(Debug, Clone)]
pub struct GenerateReport {
    /// Environment name
    pub name: String,
    /// Resolution written into the manifest
    pub resolution: ResolutionReport,
    /// Files written
    pub result: GenerateResult,
    /// Whether `spack install` ran afterwards
    pub installed: bool,
}

impl Orchestrator {
    /// Create an orchestrator querying the configured `spack` executable
    pub fn new(config: DevConfig, show_progress: bool) -> Self {
        let index = SpackIndex::with_program(config.spack.clone());
        Self {
            config,
            index: Box::new(index),
            show_progress,
        }
    }

    /// Create an orchestrator with a custom package index (for testing)
    pub fn with_index(config: DevConfig, index: Box<dyn PackageIndex>) -> Self {
        Self {
            config,
            index,
            show_progress: false,
        }
    }

    fn mode(&self, requested: Option<DependencyMode>) -> DependencyMode {
        requested.unwrap_or(self.config.mode)
    }

    fn unresolve(&self, extra: &[String]) -> BTreeSet<String> {
        self.config
            .unresolve
            .iter()
            .chain(extra)
            .cloned()
            .collect()
    }

    /// Open the named environment below the configured environments directory
    pub fn environment(&self, name: &str) -> Result<SpackEnv, AppError> {
        SpackEnv::validate_name(name)?;
        let root = self.config.environment_root(name);
        let runner = SystemSpack::with_program(self.config.spack.clone());
        Ok(SpackEnv::with_runner(root, Box::new(runner))?)
    }

    /// Resolve every configured dependency
    ///
    /// `mode` overrides the configured mode; `unresolve` adds to the
    /// configured set.
    pub async fn resolve(
        &self,
        mode: Option<DependencyMode>,
        unresolve: &[String],
    ) -> Result<ResolutionReport, AppError> {
        let specs = self.config.specs()?;
        let mode = self.mode(mode);
        let unresolve = self.unresolve(unresolve);
        debug!(%mode, specs = specs.len(), ?unresolve, "resolving dependencies");

        if mode == DependencyMode::Latest {
            self.prefetch(&specs, &unresolve).await?;
        }

        let groups = resolve_specs(&specs, mode, &unresolve, self.index.as_ref()).await?;
        Ok(ResolutionReport {
            mode,
            unresolve,
            groups,
        })
    }

    /// Query the index for every spec that needs it, with progress
    ///
    /// Results are memoized on the specs themselves so the following
    /// resolution does not query again.
    async fn prefetch(
        &self,
        specs: &[VerConSpec],
        unresolve: &BTreeSet<String>,
    ) -> Result<(), ResolveError> {
        let pending: Vec<&VerConSpec> = specs
            .iter()
            .filter(|spec| spec.is_constrained() && !unresolve.contains(spec.package()))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let mut progress = Progress::new(self.show_progress);
        progress.start_queries(pending.len() as u64);
        for spec in pending {
            progress.querying(spec.package());
            let result = match spec.latest_external_version(self.index.as_ref()).await {
                Ok(_) => spec.latest_version(self.index.as_ref()).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                progress.finish_and_clear();
                return Err(e);
            }
            progress.inc();
        }
        progress.finish_and_clear();
        Ok(())
    }

    /// Resolve the dependencies and write the environment manifest
    pub async fn generate(
        &self,
        name: &str,
        mode: Option<DependencyMode>,
        unresolve: &[String],
        install: bool,
    ) -> Result<GenerateReport, AppError> {
        let env = self.environment(name)?;
        let resolution = self.resolve(mode, unresolve).await?;
        let template = self.config.load_template()?;
        let result = env.generate(&resolution.groups, template.as_ref())?;

        if install {
            env.install()?;
        }

        Ok(GenerateReport {
            name: name.to_string(),
            resolution,
            result,
            installed: install,
        })
    }

    /// Install a previously generated environment
    pub fn install(&self, name: &str) -> Result<(), AppError> {
        let env = self.environment(name)?;
        env.install()?;
        Ok(())
    }

    /// Locate `command` provided by the package `spec` names
    ///
    /// The configured dependency on the same package is preferred over the
    /// spec as given.
    pub fn which(
        &self,
        name: &str,
        command: &str,
        spec: &str,
        check_arg: Option<&str>,
    ) -> Result<PathBuf, AppError> {
        let env = self.environment(name)?;
        let requested = VerConSpec::parse(spec)?;
        let spec = self
            .config
            .spec_for_package(requested.package())?
            .unwrap_or(requested);
        debug!(%spec, command, "looking up command");

        let mut progress = Progress::new(self.show_progress);
        progress.spinner(&format!("Locating {} from {}", command, spec.package()));
        let found = env.which(command, &spec, check_arg);
        progress.finish_and_clear();
        Ok(found?)
    }

    /// The compiler preferred by the packages installed in the environment
    ///
    /// `None` until the environment has been installed.
    pub fn compiler(&self, name: &str) -> Result<Option<CompilerSpec>, AppError> {
        let env = self.environment(name)?;

        let mut progress = Progress::new(self.show_progress);
        progress.spinner("Reading installed packages");
        let compiler = env.recommended_compiler();
        progress.finish_and_clear();
        Ok(compiler?)
    }
}
