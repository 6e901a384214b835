//! Core domain models for spackdev
//!
//! This module contains the fundamental types used throughout the application:
//! - Spack-style versions and inclusive version ranges
//! - Resolution modes
//! - Version-constrained specs and their resolution queries

mod dependency_mode;
mod ver_con_spec;
mod version;

pub use dependency_mode::DependencyMode;
pub use ver_con_spec::{latest_in_ranges, max_within_all, VerConSpec};
pub use version::{Version, VersionRange};
