//! Version token extraction for Spack specs
//!
//! A root version token is an `@` directly after the package name or after
//! whitespace, followed by comma-separated items:
//! - `lower:upper`, either bound optional (`1.0:`, `:2.0`, `1.0:2.0`)
//! - `version` or `=version`, meaning exactly `version:version`
//!
//! Root tokens end at the first `%compiler` or `^dependency` node. Any `@`
//! from there on, spaced or not, belongs to that node and is left alone.

use crate::domain::{Version, VersionRange};
use crate::error::SpecError;
use regex::Regex;
use std::sync::LazyLock;

// Leading package name: boost, py-numpy, intel_tbb
static PACKAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+").unwrap());

// Root version token, capture 1 keeps what precedes the `@`
static VERSION_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^[A-Za-z0-9_-]+|\s)@\s*([A-Za-z0-9_.:,=-]*)").unwrap()
});

/// Result of parsing a spec string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSpec {
    /// Root package name
    pub package: String,
    /// Spec text without the root version token
    pub base_spec: String,
    /// Declared version ranges in the order written
    pub ranges: Vec<VersionRange>,
}

/// Extract the root package name from a spec string
pub fn extract_package(spec: &str) -> Result<&str, SpecError> {
    PACKAGE_RE
        .find(spec)
        .map(|m| m.as_str())
        .ok_or_else(|| SpecError::MissingPackage {
            spec: spec.to_string(),
        })
}

/// Split a spec into its root node and the trailing `%`/`^` nodes
fn split_root(spec: &str) -> (&str, &str) {
    match spec.find(['%', '^']) {
        Some(pos) => spec.split_at(pos),
        None => (spec, ""),
    }
}

/// Remove root version tokens and collapse the remaining whitespace
pub fn strip_version_tokens(spec: &str) -> String {
    let (root, nodes) = split_root(spec.trim());
    let stripped = VERSION_TOKEN_RE.replace_all(root, "${1}");
    stripped
        .split_whitespace()
        .chain(nodes.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Attach a version token such as `@1.2:` to the root node of `base_spec`
///
/// The token goes before any `%`/`^` node so Spack does not read it as the
/// compiler's or dependency's version.
pub fn with_root_version(base_spec: &str, version: &str) -> String {
    let (root, nodes) = split_root(base_spec);
    let root = root.trim_end();
    if nodes.is_empty() {
        format!("{} {}", root, version)
    } else {
        format!("{} {} {}", root, version, nodes)
    }
}

/// Parse a spec string into package, base spec and version ranges
pub fn parse_spec(spec: &str) -> Result<ParsedSpec, SpecError> {
    let spec = spec.trim();
    let package = extract_package(spec)?.to_string();

    let (root, _) = split_root(spec);
    let mut ranges = Vec::new();
    for caps in VERSION_TOKEN_RE.captures_iter(root) {
        let token = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        ranges.extend(parse_ranges(spec, token)?);
    }

    Ok(ParsedSpec {
        package,
        base_spec: strip_version_tokens(spec),
        ranges,
    })
}

fn parse_ranges(spec: &str, token: &str) -> Result<Vec<VersionRange>, SpecError> {
    token
        .split(',')
        .map(|item| parse_range_item(spec, item.trim()))
        .collect()
}

fn parse_range_item(spec: &str, item: &str) -> Result<VersionRange, SpecError> {
    let invalid = || SpecError::InvalidRange {
        spec: spec.to_string(),
        range: item.to_string(),
    };

    if item.is_empty() {
        return Err(invalid());
    }

    match item.split_once(':') {
        Some((lower, upper)) => {
            if upper.contains(':') {
                return Err(invalid());
            }
            Ok(VersionRange::new(parse_bound(lower)?, parse_bound(upper)?))
        }
        None => {
            let exact = item.strip_prefix('=').unwrap_or(item);
            let version = Version::parse(exact)?;
            Ok(VersionRange::new(Some(version.clone()), Some(version)))
        }
    }
}

fn parse_bound(bound: &str) -> Result<Option<Version>, SpecError> {
    let bound = bound.trim();
    if bound.is_empty() {
        Ok(None)
    } else {
        Version::parse(bound).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_extract_package() {
        assert_eq!(extract_package("boost@1.70:").unwrap(), "boost");
        assert_eq!(extract_package("py-numpy +blas").unwrap(), "py-numpy");
        assert_eq!(extract_package("intel_tbb").unwrap(), "intel_tbb");
    }

    #[test]
    fn test_extract_package_missing() {
        let err = extract_package("@1.0:").unwrap_err();
        assert!(matches!(err, SpecError::MissingPackage { .. }));
        assert!(extract_package("+mpi").is_err());
    }

    #[test]
    fn test_parse_single_range() {
        let parsed = parse_spec("foo@1.0:2.0").unwrap();
        assert_eq!(parsed.package, "foo");
        assert_eq!(parsed.base_spec, "foo");
        assert_eq!(
            parsed.ranges,
            vec![VersionRange::new(Some(v("1.0")), Some(v("2.0")))]
        );
    }

    #[test]
    fn test_parse_no_version() {
        let parsed = parse_spec("bar").unwrap();
        assert_eq!(parsed.package, "bar");
        assert_eq!(parsed.base_spec, "bar");
        assert!(parsed.ranges.is_empty());
    }

    #[test]
    fn test_parse_multiple_ranges() {
        let parsed = parse_spec("boost@1.70.0:1.80,1.82:").unwrap();
        assert_eq!(
            parsed.ranges,
            vec![
                VersionRange::new(Some(v("1.70.0")), Some(v("1.80"))),
                VersionRange::new(Some(v("1.82")), None),
            ]
        );
    }

    #[test]
    fn test_parse_keeps_variants_and_compiler() {
        let parsed = parse_spec("boost@1.70.0: +atomic %gcc@12").unwrap();
        assert_eq!(parsed.base_spec, "boost +atomic %gcc@12");
        assert_eq!(parsed.ranges.len(), 1);
        assert_eq!(parsed.ranges[0].lower, Some(v("1.70.0")));
    }

    #[test]
    fn test_parse_dependency_version_is_not_root() {
        let parsed = parse_spec("hpctoolkit ^dyninst@12.3:").unwrap();
        assert!(parsed.ranges.is_empty());
        assert_eq!(parsed.base_spec, "hpctoolkit ^dyninst@12.3:");
    }

    #[test]
    fn test_parse_spaced_dependency_version_is_not_root() {
        let parsed = parse_spec("hpctoolkit@2023.08: ^dyninst @12.3:").unwrap();
        assert_eq!(parsed.base_spec, "hpctoolkit ^dyninst @12.3:");
        assert_eq!(
            parsed.ranges,
            vec![VersionRange::new(Some(v("2023.08")), None)]
        );
    }

    #[test]
    fn test_parse_spaced_compiler_version_is_not_root() {
        let parsed = parse_spec("hpctoolkit@2023.08: %gcc @12").unwrap();
        assert_eq!(parsed.base_spec, "hpctoolkit %gcc @12");
        assert_eq!(
            parsed.ranges,
            vec![VersionRange::new(Some(v("2023.08")), None)]
        );
    }

    #[test]
    fn test_parse_root_token_after_variant() {
        let parsed = parse_spec("cmake +ownlibs @3.21: %gcc@12 ^zlib @1.3").unwrap();
        assert_eq!(parsed.base_spec, "cmake +ownlibs %gcc@12 ^zlib @1.3");
        assert_eq!(parsed.ranges, vec![VersionRange::new(Some(v("3.21")), None)]);
    }

    #[test]
    fn test_parse_spaced_version_token() {
        let parsed = parse_spec("cmake +ownlibs @3.21:").unwrap();
        assert_eq!(parsed.base_spec, "cmake +ownlibs");
        assert_eq!(parsed.ranges, vec![VersionRange::new(Some(v("3.21")), None)]);
    }

    #[test]
    fn test_parse_exact_version() {
        let parsed = parse_spec("zlib@=1.2.13").unwrap();
        assert_eq!(
            parsed.ranges,
            vec![VersionRange::new(Some(v("1.2.13")), Some(v("1.2.13")))]
        );
    }

    #[test]
    fn test_parse_rejects_empty_range_item() {
        let err = parse_spec("foo@1.0:,,2.0:").unwrap_err();
        assert!(matches!(err, SpecError::InvalidRange { .. }));
        assert!(parse_spec("foo@").is_err());
    }

    #[test]
    fn test_parse_rejects_double_colon() {
        let err = parse_spec("foo@1:2:3").unwrap_err();
        assert!(matches!(err, SpecError::InvalidRange { .. }));
    }

    #[test]
    fn test_with_root_version() {
        assert_eq!(with_root_version("boost +atomic", "@1.70:"), "boost +atomic @1.70:");
        assert_eq!(
            with_root_version("hpctoolkit %gcc @12 ^dyninst", "@2023.08:"),
            "hpctoolkit @2023.08: %gcc @12 ^dyninst"
        );
        assert_eq!(with_root_version("zlib%gcc", "@1.2"), "zlib @1.2 %gcc");
    }

    #[test]
    fn test_strip_version_tokens_collapses_whitespace() {
        assert_eq!(strip_version_tokens("  foo@1:  +bar   ~baz "), "foo +bar ~baz");
    }
}
