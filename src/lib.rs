//! spackdev - Version-constrained Spack development environments
//!
//! This library provides:
//! - Spack spec parsing with version range constraints
//! - Resolution of specs to minimum, latest or full-range spec strings
//! - `spack.yaml` generation from resolved specs and layered templates
//! - Install and command lookup in generated environments

pub mod cli;
pub mod config;
pub mod domain;
pub mod env;
pub mod error;
pub mod index;
pub mod orchestrator;
pub mod output;
pub mod parser;
pub mod progress;
pub mod resolve;
pub mod spack;
