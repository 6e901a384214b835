//! Spack spec string parsing
//!
//! Splits a spec such as `boost@1.70.0:1.80,1.82: +atomic %gcc@12` into:
//! - the root package name (`boost`)
//! - the declared version ranges (`[(1.70.0, 1.80), (1.82, )]`)
//! - the base spec with the root version token removed (`boost +atomic %gcc@12`)

mod spec;

pub use spec::{
    extract_package, parse_spec, strip_version_tokens, with_root_version, ParsedSpec,
};
