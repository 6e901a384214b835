//! Live package index queries
//!
//! This module provides:
//! - The `PackageIndex` trait consumed by version resolution
//! - A Spack CLI adapter answering from `spack versions` and `spack config`

mod spack_cli;

pub use spack_cli::{external_versions_from_config, parse_versions_output, SpackIndex};

use crate::domain::Version;
use crate::error::IndexError;
use async_trait::async_trait;

/// Trait for package index adapters
#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// Get the index name used in error messages
    fn index_name(&self) -> &'static str;

    /// Fetch the newest version the index knows for a package
    async fn fetch_latest_version(&self, package: &str) -> Result<Version, IndexError>;

    /// Fetch the versions available as prebuilt externals for a package
    async fn fetch_external_versions(&self, package: &str) -> Result<Vec<Version>, IndexError>;
}
