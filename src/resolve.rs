//! Resolution of spec collections into manifest definition groups
//!
//! Specs are grouped by their `when` predicate; each group's resolved spec
//! strings are unioned. Groups iterate with the unconditional group first,
//! then by predicate text.

use crate::domain::{DependencyMode, VerConSpec};
use crate::error::ResolveError;
use crate::index::PackageIndex;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Resolved spec strings keyed by `when` predicate
pub type ResolvedSpecs = BTreeMap<Option<String>, BTreeSet<String>>;

/// Resolve every spec for `mode` and group the results by `when`
///
/// Structurally equal specs are resolved once.
pub async fn resolve_specs(
    specs: &[VerConSpec],
    mode: DependencyMode,
    unresolve: &BTreeSet<String>,
    index: &dyn PackageIndex,
) -> Result<ResolvedSpecs, ResolveError> {
    let mut seen = HashSet::new();
    let mut by_when: BTreeMap<Option<&str>, Vec<&VerConSpec>> = BTreeMap::new();
    for spec in specs {
        if seen.insert(spec) {
            by_when.entry(spec.when()).or_default().push(spec);
        }
    }

    let mut result = ResolvedSpecs::new();
    for (when, members) in by_when {
        let mut bits = BTreeSet::new();
        for spec in members {
            bits.extend(spec.specs_for(mode, unresolve, index).await?);
        }
        result.insert(when.map(str::to_string), bits);
    }
    Ok(result)
}
