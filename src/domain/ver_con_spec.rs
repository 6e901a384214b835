//! Version-constrained Spack specs
//!
//! A `VerConSpec` couples a Spack spec with the version ranges it supports
//! and an optional `when` predicate. It answers:
//! - whether a concrete version is supported
//! - the minimum supported version
//! - the newest version both the ranges and the live index agree on
//! - the newest supported version available as a prebuilt external
//! - the spec strings to hand to Spack for a `DependencyMode`

use super::{DependencyMode, Version, VersionRange};
use crate::error::{ResolveError, SpecError};
use crate::index::PackageIndex;
use crate::parser::{parse_spec, with_root_version};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use tokio::sync::OnceCell;
use tracing::debug;

/// A Spack spec with semi-customizable version constraints
#[derive(Debug)]
pub struct VerConSpec {
    package: String,
    base_spec: String,
    ranges: Vec<VersionRange>,
    when: Option<String>,
    version_spec: OnceLock<String>,
    latest_version: OnceCell<Option<Version>>,
    latest_external_version: OnceCell<Option<Version>>,
}

impl VerConSpec {
    /// Create a spec from Spack spec text and an optional `when` predicate
    ///
    /// Fails if the spec has no leading package name, or declares ranges
    /// without a minimum version.
    pub fn new(spec: &str, when: Option<&str>) -> Result<Self, SpecError> {
        let parsed = parse_spec(spec)?;

        if let Some(first) = parsed.ranges.first() {
            let Some(minimum) = first.lower.as_ref() else {
                return Err(SpecError::MissingMinimum {
                    spec: spec.to_string(),
                });
            };
            let unordered = parsed
                .ranges
                .iter()
                .any(|range| range.lower.as_ref().map_or(true, |lower| lower < minimum));
            if unordered {
                return Err(SpecError::UnorderedRanges {
                    spec: spec.to_string(),
                });
            }
        }

        Ok(Self {
            package: parsed.package,
            base_spec: parsed.base_spec,
            ranges: parsed.ranges,
            when: when.map(str::to_string),
            version_spec: OnceLock::new(),
            latest_version: OnceCell::new(),
            latest_external_version: OnceCell::new(),
        })
    }

    /// Create a spec with no `when` predicate
    pub fn parse(spec: &str) -> Result<Self, SpecError> {
        Self::new(spec, None)
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// The spec text with the root version token removed
    pub fn base_spec(&self) -> &str {
        &self.base_spec
    }

    pub fn ranges(&self) -> &[VersionRange] {
        &self.ranges
    }

    pub fn when(&self) -> Option<&str> {
        self.when.as_deref()
    }

    /// Returns true if any version range was declared
    pub fn is_constrained(&self) -> bool {
        !self.ranges.is_empty()
    }

    /// The version constraints in Spack spec syntax, `@:` when unconstrained
    pub fn version_spec(&self) -> &str {
        self.version_spec
            .get_or_init(|| render_version_spec(&self.ranges))
    }

    /// Determine whether the given version is supported by the constraints
    pub fn version_ok(&self, version: &Version) -> bool {
        self.ranges.is_empty() || self.ranges.iter().any(|range| range.contains(version))
    }

    /// The minimum supported version, `None` when unconstrained
    pub fn minimum_version(&self) -> Option<&Version> {
        self.ranges.first().and_then(|range| range.lower.as_ref())
    }

    /// The latest version supported by both the index and the constraints
    ///
    /// Returns `None` when unconstrained. The index is queried once; the
    /// answer is kept for the lifetime of this spec.
    pub async fn latest_version(
        &self,
        index: &dyn PackageIndex,
    ) -> Result<Option<Version>, ResolveError> {
        if self.ranges.is_empty() {
            return Ok(None);
        }

        let latest = self
            .latest_version
            .get_or_try_init(|| async {
                let live = index.fetch_latest_version(&self.package).await?;
                let latest = latest_in_ranges(&self.ranges, &live).ok_or_else(|| {
                    ResolveError::EmptyIntersection {
                        package: self.package.clone(),
                        latest: live.to_string(),
                        version_spec: self.version_spec().to_string(),
                    }
                })?;
                debug!(package = %self.package, %live, %latest, "resolved latest version");
                Ok::<_, ResolveError>(Some(latest))
            })
            .await?;

        Ok(latest.clone())
    }

    /// The latest supported version available as an external, if any
    pub async fn latest_external_version(
        &self,
        index: &dyn PackageIndex,
    ) -> Result<Option<Version>, ResolveError> {
        let latest = self
            .latest_external_version
            .get_or_try_init(|| async {
                let externals = index.fetch_external_versions(&self.package).await?;
                Ok::<_, ResolveError>(max_within_all(&self.ranges, externals))
            })
            .await?;

        Ok(latest.clone())
    }

    /// The spec strings Spack should receive for the given mode
    ///
    /// Packages listed in `unresolve` are always rendered as in `Any` mode.
    pub async fn specs_for(
        &self,
        mode: DependencyMode,
        unresolve: &BTreeSet<String>,
        index: &dyn PackageIndex,
    ) -> Result<BTreeSet<String>, ResolveError> {
        if self.ranges.is_empty() {
            return Ok(BTreeSet::from([self.base_spec.clone()]));
        }

        let mode = if unresolve.contains(&self.package) {
            DependencyMode::Any
        } else {
            mode
        };

        let full_range = with_root_version(&self.base_spec, self.version_spec());
        match mode {
            DependencyMode::Any => Ok(BTreeSet::from([full_range])),
            DependencyMode::Minimum => {
                let minimum = self
                    .minimum_version()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| ":".to_string());
                let pinned = format!("@{}", minimum);
                Ok(BTreeSet::from([with_root_version(&self.base_spec, &pinned)]))
            }
            DependencyMode::Latest => {
                let mut result = BTreeSet::from([full_range]);

                let mut versions = Vec::new();
                if let Some(external) = self.latest_external_version(index).await? {
                    versions.push(external.to_string());
                }
                if let Some(latest) = self.latest_version(index).await? {
                    versions.push(format!("{}:", latest));
                }
                if !versions.is_empty() {
                    let pinned = format!("@{}", versions.join(","));
                    result.insert(with_root_version(&self.base_spec, &pinned));
                }

                Ok(result)
            }
        }
    }
}

/// Render ranges as a Spack version constraint
fn render_version_spec(ranges: &[VersionRange]) -> String {
    if ranges.is_empty() {
        return "@:".to_string();
    }
    let items: Vec<String> = ranges.iter().map(|range| range.to_string()).collect();
    format!("@{}", items.join(","))
}

/// Walk ascending ranges looking for the newest version not above `latest`
///
/// Returns `latest` itself when a range contains it, otherwise the highest
/// upper bound below it, otherwise `None`.
pub fn latest_in_ranges(ranges: &[VersionRange], latest: &Version) -> Option<Version> {
    let mut candidate = None;
    for range in ranges {
        if range.lower.as_ref().is_some_and(|lower| latest < lower) {
            // Later ranges start even higher
            break;
        }
        if let Some(upper) = range.upper.as_ref().filter(|upper| *upper < latest) {
            candidate = Some(upper.clone());
            continue;
        }
        return Some(latest.clone());
    }
    candidate
}

/// The maximum of `versions` that satisfies the bounds of every range
pub fn max_within_all(ranges: &[VersionRange], versions: Vec<Version>) -> Option<Version> {
    versions
        .into_iter()
        .filter(|version| ranges.iter().all(|range| range.contains(version)))
        .max()
}

impl fmt::Display for VerConSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ranges.is_empty() {
            write!(f, "{}", self.base_spec)
        } else {
            f.write_str(&with_root_version(&self.base_spec, self.version_spec()))
        }
    }
}

impl PartialEq for VerConSpec {
    fn eq(&self, other: &Self) -> bool {
        self.package == other.package
            && self.base_spec == other.base_spec
            && self.ranges == other.ranges
            && self.when == other.when
    }
}

impl Eq for VerConSpec {}

impl Hash for VerConSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.package.hash(state);
        self.base_spec.hash(state);
        self.ranges.hash(state);
        self.when.hash(state);
    }
}
