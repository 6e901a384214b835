//! Managed Spack environments
//!
//! This module provides:
//! - `SpackEnv`, a directory holding a generated `spack.yaml`
//! - Manifest generation from resolved spec groups and an optional template
//! - Installation and command lookup through the `spack` executable
//! - The recursive YAML merge used for templates

mod manifest;
mod merge;

pub use manifest::{
    build_manifest, DEV_DEFINITION, DEV_REFERENCE, GITIGNORE, IGNORE_FILE, LOCK_FILE,
    MANIFEST_FILE,
};
pub use merge::yaml_merge;

use crate::domain::{VerConSpec, Version};
use crate::error::{CommandError, EnvError};
use crate::resolve::ResolvedSpecs;
use crate::spack::{find_in_path, parse_exported_variable, SpackRunner, SystemSpack};
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// A package installed in an environment, as reported by `spack find --json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    pub hash: String,
    #[serde(default)]
    pub prefix: Option<PathBuf>,
    /// Compiler the package was built with
    #[serde(default)]
    pub compiler: Option<CompilerSpec>,
}

/// A compiler name and version, such as `gcc@12.2.0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSpec {
    pub name: String,
    pub version: String,
}

impl fmt::Display for CompilerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// The compiler with the highest version, ties broken by name
///
/// Versions Spack reports that do not parse rank below every parsed one.
pub fn preferred_compiler<'a>(
    compilers: impl IntoIterator<Item = &'a CompilerSpec>,
) -> Option<&'a CompilerSpec> {
    compilers
        .into_iter()
        .max_by_key(|compiler| {
            (
                Version::parse(&compiler.version).ok(),
                compiler.name.clone(),
            )
        })
}

/// Summary of a manifest generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateResult {
    /// Environment root directory
    pub root: PathBuf,
    /// Path of the written `spack.yaml`
    pub manifest: PathBuf,
    /// Number of `_dev` definition clauses written
    pub groups: usize,
    /// Total number of resolved spec strings
    pub specs: usize,
    /// Whether a stale `spack.lock` was deleted
    pub lock_removed: bool,
}

/// A Spack environment rooted at a directory
pub struct SpackEnv {
    root: PathBuf,
    runner: Box<dyn SpackRunner>,
    packages: OnceLock<BTreeMap<String, InstalledPackage>>,
}

impl SpackEnv {
    /// Open an environment at `root` using `spack` from PATH
    ///
    /// The directory need not exist yet, but the path must not be taken by
    /// anything other than a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, EnvError> {
        Self::with_runner(root, Box::new(SystemSpack::new()))
    }

    /// Open an environment with a custom Spack runner
    pub fn with_runner(
        root: impl AsRef<Path>,
        runner: Box<dyn SpackRunner>,
    ) -> Result<Self, EnvError> {
        let root = root.as_ref();
        let root = std::path::absolute(root).map_err(|e| EnvError::io(root, e))?;
        if root.exists() && !root.is_dir() {
            return Err(EnvError::Conflict { path: root });
        }

        Ok(Self {
            root,
            runner,
            packages: OnceLock::new(),
        })
    }

    /// Check that `name` is usable as an environment directory name
    pub fn validate_name(name: &str) -> Result<(), EnvError> {
        if name.is_empty() {
            return Err(EnvError::invalid_name(name, "name must not be empty"));
        }
        if name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
            return Err(EnvError::invalid_name(
                name,
                "slashes are invalid in environment names",
            ));
        }
        if name.starts_with('_') {
            return Err(EnvError::invalid_name(
                name,
                "names starting with '_' are reserved for internal use",
            ));
        }
        Ok(())
    }

    /// Environment root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if the environment has been generated and concretized
    pub fn exists(&self) -> bool {
        self.root.is_dir()
            && self.root.join(MANIFEST_FILE).is_file()
            && self.root.join(LOCK_FILE).is_file()
    }

    /// Write `spack.yaml` and `.gitignore` for the resolved groups
    ///
    /// Any existing `spack.lock` is deleted so the next install
    /// re-concretizes.
    pub fn generate(
        &self,
        resolved: &ResolvedSpecs,
        template: Option<&Mapping>,
    ) -> Result<GenerateResult, EnvError> {
        fs::create_dir_all(&self.root).map_err(|e| EnvError::io(&self.root, e))?;

        let manifest_path = self.root.join(MANIFEST_FILE);
        let manifest = build_manifest(resolved, template);
        let content = serde_yaml::to_string(&manifest).map_err(|e| EnvError::Manifest {
            path: manifest_path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&manifest_path, content).map_err(|e| EnvError::io(&manifest_path, e))?;
        info!(path = %manifest_path.display(), "wrote environment manifest");

        let ignore_path = self.root.join(IGNORE_FILE);
        fs::write(&ignore_path, GITIGNORE).map_err(|e| EnvError::io(&ignore_path, e))?;

        let lock_path = self.root.join(LOCK_FILE);
        let lock_removed = match fs::remove_file(&lock_path) {
            Ok(()) => {
                info!(path = %lock_path.display(), "removed stale lock file");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(EnvError::io(&lock_path, e)),
        };

        Ok(GenerateResult {
            root: self.root.clone(),
            manifest: manifest_path,
            groups: resolved.len(),
            specs: resolved.values().map(|specs| specs.len()).sum(),
            lock_removed,
        })
    }

    /// Install the environment with `spack install --fail-fast`
    pub fn install(&self) -> Result<(), EnvError> {
        self.runner.install(&self.root).map_err(|e| match e {
            CommandError::Failed { code, .. } => EnvError::InstallFailed { code },
            other => EnvError::Command(other),
        })
    }

    /// All packages installed in the environment, keyed by name
    pub fn packages(&self) -> Result<&BTreeMap<String, InstalledPackage>, EnvError> {
        if let Some(packages) = self.packages.get() {
            return Ok(packages);
        }

        let output = self.runner.find_json(&self.root, None)?;
        let packages = parse_find_output(&output)?
            .into_iter()
            .map(|package| (package.name.clone(), package))
            .collect();
        Ok(self.packages.get_or_init(|| packages))
    }

    /// The compiler new builds in this environment should use
    ///
    /// Picks the preferred compiler among the installed packages, or `None`
    /// when the environment has not been installed yet.
    pub fn recommended_compiler(&self) -> Result<Option<CompilerSpec>, EnvError> {
        if !self.exists() {
            return Ok(None);
        }
        let packages = self.packages()?;
        let compiler = preferred_compiler(packages.values().filter_map(|p| p.compiler.as_ref()));
        debug!(compiler = ?compiler, "recommended compiler");
        Ok(compiler.cloned())
    }

    /// The single installed package matching `spec`
    pub fn package(&self, spec: &str) -> Result<InstalledPackage, EnvError> {
        let output = match self.runner.find_json(&self.root, Some(spec)) {
            Ok(output) => output,
            Err(CommandError::Failed { .. }) => {
                return Err(EnvError::PackageNotFound {
                    spec: spec.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let mut matches = parse_find_output(&output)?;
        match matches.len() {
            0 => Err(EnvError::PackageNotFound {
                spec: spec.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            count => Err(EnvError::AmbiguousPackage {
                spec: spec.to_string(),
                count,
            }),
        }
    }

    /// Locate `command` in the PATH of the installed package for `spec`
    ///
    /// When `check_arg` is given the binary is run once with it and must
    /// exit successfully.
    pub fn which(
        &self,
        command: &str,
        spec: &VerConSpec,
        check_arg: Option<&str>,
    ) -> Result<PathBuf, EnvError> {
        let package = self.package(&spec.to_string())?;
        debug!(package = %package.name, hash = %package.hash, "loading package");

        let script = self
            .runner
            .load_script(&self.root, &format!("/{}", package.hash))?;
        let path = parse_exported_variable(&script, "PATH").ok_or_else(|| {
            CommandError::InvalidOutput {
                command: "spack load --sh".to_string(),
                message: "no PATH exported".to_string(),
            }
        })?;

        let found = find_in_path(command, &path).ok_or_else(|| EnvError::CommandNotFound {
            command: command.to_string(),
            path: path.clone(),
        })?;

        if let Some(arg) = check_arg {
            self.runner
                .check_binary(&found, arg)
                .map_err(|e| match e {
                    CommandError::Failed { code, .. } => EnvError::CheckFailed {
                        command: found.clone(),
                        arg: arg.to_string(),
                        code,
                    },
                    other => EnvError::Command(other),
                })?;
        }

        Ok(found)
    }
}

fn parse_find_output(output: &str) -> Result<Vec<InstalledPackage>, EnvError> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(output).map_err(|e| {
        CommandError::InvalidOutput {
            command: "spack find --json".to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    /// Runner returning canned answers and recording the calls made
    #[derive(Default)]
    struct MockSpack {
        install_code: Option<Option<i32>>,
        find_output: String,
        load_output: String,
        calls: RefCell<Vec<String>>,
    }

    impl SpackRunner for MockSpack {
        fn install(&self, _env: &Path) -> Result<(), CommandError> {
            self.calls.borrow_mut().push("install".to_string());
            match self.install_code {
                Some(code) => Err(CommandError::Failed {
                    command: "spack install".to_string(),
                    code,
                    stderr: String::new(),
                }),
                None => Ok(()),
            }
        }

        fn find_json(&self, _env: &Path, spec: Option<&str>) -> Result<String, CommandError> {
            self.calls
                .borrow_mut()
                .push(format!("find {}", spec.unwrap_or("")));
            Ok(self.find_output.clone())
        }

        fn load_script(&self, _env: &Path, spec: &str) -> Result<String, CommandError> {
            self.calls.borrow_mut().push(format!("load {}", spec));
            Ok(self.load_output.clone())
        }

        fn check_binary(&self, program: &Path, arg: &str) -> Result<(), CommandError> {
            self.calls
                .borrow_mut()
                .push(format!("check {} {}", program.display(), arg));
            Ok(())
        }
    }

    fn resolved() -> ResolvedSpecs {
        ResolvedSpecs::from([
            (None, BTreeSet::from(["zlib @1.2".to_string()])),
            (
                Some("+mpi".to_string()),
                BTreeSet::from(["openmpi @4.0".to_string()]),
            ),
        ])
    }

    #[test]
    fn test_validate_name() {
        assert!(SpackEnv::validate_name("default").is_ok());
        assert!(SpackEnv::validate_name("gcc-12.debug").is_ok());
        assert!(SpackEnv::validate_name("").is_err());
        assert!(SpackEnv::validate_name("a/b").is_err());
        assert!(matches!(
            SpackEnv::validate_name("_internal"),
            Err(EnvError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_root_is_file_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("env");
        fs::write(&file, "").unwrap();

        let result = SpackEnv::new(&file);
        assert!(matches!(result, Err(EnvError::Conflict { .. })));
    }

    #[test]
    fn test_generate_writes_files() {
        let temp_dir = TempDir::new().unwrap();
        let env = SpackEnv::new(temp_dir.path().join("dev")).unwrap();
        assert!(!env.exists());

        let result = env.generate(&resolved(), None).unwrap();
        assert_eq!(result.groups, 2);
        assert_eq!(result.specs, 2);
        assert!(!result.lock_removed);

        let written: Mapping =
            serde_yaml::from_str(&fs::read_to_string(env.root().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(written, build_manifest(&resolved(), None));
        assert_eq!(
            fs::read_to_string(env.root().join(IGNORE_FILE)).unwrap(),
            GITIGNORE
        );
    }

    #[test]
    fn test_generate_removes_lock_file() {
        let temp_dir = TempDir::new().unwrap();
        let env = SpackEnv::new(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join(MANIFEST_FILE), "spack: {}\n").unwrap();
        fs::write(temp_dir.path().join(LOCK_FILE), "{}").unwrap();
        assert!(env.exists());

        let result = env.generate(&resolved(), None).unwrap();
        assert!(result.lock_removed);
        assert!(!temp_dir.path().join(LOCK_FILE).exists());
        assert!(!env.exists());
    }

    #[test]
    fn test_install_failure_carries_code() {
        let temp_dir = TempDir::new().unwrap();
        let runner = MockSpack {
            install_code: Some(Some(3)),
            ..Default::default()
        };
        let env = SpackEnv::with_runner(temp_dir.path(), Box::new(runner)).unwrap();

        let err = env.install().unwrap_err();
        assert!(matches!(err, EnvError::InstallFailed { code: Some(3) }));
    }

    #[test]
    fn test_packages_keyed_by_name() {
        let temp_dir = TempDir::new().unwrap();
        let runner = MockSpack {
            find_output: r#"[
                {"name": "zlib", "version": "1.3", "hash": "abc", "arch": {}},
                {"name": "cmake", "version": "3.27.7", "hash": "def", "prefix": "/opt/cmake"}
            ]"#
            .to_string(),
            ..Default::default()
        };
        let env = SpackEnv::with_runner(temp_dir.path(), Box::new(runner)).unwrap();

        let packages = env.packages().unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages["cmake"].prefix, Some(PathBuf::from("/opt/cmake")));
        assert_eq!(packages["zlib"].prefix, None);
        // Second call is served from memory
        env.packages().unwrap();
    }

    fn compiler(name: &str, version: &str) -> CompilerSpec {
        CompilerSpec {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    #[test]
    fn test_preferred_compiler_highest_version() {
        let compilers = [
            compiler("gcc", "9.4.0"),
            compiler("gcc", "12.2.0"),
            compiler("clang", "12.2.0"),
            compiler("gcc", "not a version"),
        ];
        assert_eq!(preferred_compiler(&compilers), Some(&compiler("gcc", "12.2.0")));
        assert_eq!(preferred_compiler(std::iter::empty()), None);
        assert_eq!(compiler("gcc", "12.2.0").to_string(), "gcc@12.2.0");
    }

    #[test]
    fn test_recommended_compiler_from_installed_packages() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(MANIFEST_FILE), "spack: {}\n").unwrap();
        fs::write(temp_dir.path().join(LOCK_FILE), "{}").unwrap();

        let runner = MockSpack {
            find_output: r#"[
                {"name": "zlib", "version": "1.3", "hash": "a", "compiler": {"name": "gcc", "version": "11.4.0"}},
                {"name": "cmake", "version": "3.27.7", "hash": "b", "compiler": {"name": "gcc", "version": "13.2.0"}},
                {"name": "gcc-runtime", "version": "13.2.0", "hash": "c"}
            ]"#
            .to_string(),
            ..Default::default()
        };
        let env = SpackEnv::with_runner(temp_dir.path(), Box::new(runner)).unwrap();

        assert_eq!(
            env.recommended_compiler().unwrap(),
            Some(compiler("gcc", "13.2.0"))
        );
    }

    #[test]
    fn test_recommended_compiler_requires_installed_environment() {
        let temp_dir = TempDir::new().unwrap();
        let runner = MockSpack {
            find_output: r#"[{"name":"zlib","version":"1.3","hash":"a","compiler":{"name":"gcc","version":"12"}}]"#
                .to_string(),
            ..Default::default()
        };
        let env = SpackEnv::with_runner(temp_dir.path(), Box::new(runner)).unwrap();

        assert_eq!(env.recommended_compiler().unwrap(), None);
    }

    #[test]
    fn test_package_not_found_and_ambiguous() {
        let temp_dir = TempDir::new().unwrap();
        let env = SpackEnv::with_runner(
            temp_dir.path(),
            Box::new(MockSpack {
                find_output: "[]".to_string(),
                ..Default::default()
            }),
        )
        .unwrap();
        assert!(matches!(
            env.package("zlib"),
            Err(EnvError::PackageNotFound { .. })
        ));

        let env = SpackEnv::with_runner(
            temp_dir.path(),
            Box::new(MockSpack {
                find_output: r#"[{"name":"zlib","version":"1.2","hash":"a"},{"name":"zlib","version":"1.3","hash":"b"}]"#
                    .to_string(),
                ..Default::default()
            }),
        )
        .unwrap();
        assert!(matches!(
            env.package("zlib"),
            Err(EnvError::AmbiguousPackage { count: 2, .. })
        ));
    }

    #[test]
    fn test_which_missing_command() {
        let temp_dir = TempDir::new().unwrap();
        let bin = temp_dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();

        let runner = MockSpack {
            find_output: r#"[{"name":"cmake","version":"3.27.7","hash":"xyz"}]"#.to_string(),
            load_output: format!("export PATH={};\n", bin.display()),
            ..Default::default()
        };
        let env = SpackEnv::with_runner(temp_dir.path(), Box::new(runner)).unwrap();
        let spec = VerConSpec::parse("cmake@3.20:").unwrap();

        let err = env.which("cmake", &spec, Some("--version")).unwrap_err();
        assert!(matches!(err, EnvError::CommandNotFound { .. }));
        assert!(format!("{}", err).starts_with("unable to find cmake in path"));
    }

    #[cfg(unix)]
    #[test]
    fn test_which_finds_and_checks_binary() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let bin = temp_dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let tool = bin.join("cmake");
        fs::write(&tool, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let runner = MockSpack {
            find_output: r#"[{"name":"cmake","version":"3.27.7","hash":"xyz"}]"#.to_string(),
            load_output: format!("export PATH={};\n", bin.display()),
            ..Default::default()
        };
        let env = SpackEnv::with_runner(temp_dir.path(), Box::new(runner)).unwrap();
        let spec = VerConSpec::parse("cmake@3.20:").unwrap();

        let found = env.which("cmake", &spec, Some("--version")).unwrap();
        assert_eq!(found, tool);
    }
}
