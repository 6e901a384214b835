//! `spack.yaml` manifest construction

use crate::resolve::ResolvedSpecs;
use serde_yaml::{Mapping, Value};

/// Environment manifest file name
pub const MANIFEST_FILE: &str = "spack.yaml";

/// Concretization lock file, invalidated on every regeneration
pub const LOCK_FILE: &str = "spack.lock";

/// Ignore file written next to the manifest
pub const IGNORE_FILE: &str = ".gitignore";

/// Contents of the generated ignore file
pub const GITIGNORE: &str = "# File created by spackdev\n/**\n!/spack.yaml\n";

/// Definition name holding the resolved development specs
pub const DEV_DEFINITION: &str = "_dev";

/// Reference to the development definition from `specs`
pub const DEV_REFERENCE: &str = "$_dev";

/// Build the full manifest document for the resolved spec groups
///
/// The template (the contents below `spack:`) is copied and then adjusted:
/// - `view` defaults to `false`
/// - `concretizer.unify` is forced to `true`
/// - previous `_dev` definitions are replaced by one clause per group
/// - `specs` references `$_dev`
pub fn build_manifest(resolved: &ResolvedSpecs, template: Option<&Mapping>) -> Mapping {
    let mut spack = template.cloned().unwrap_or_default();

    if !spack.contains_key("view") {
        spack.insert("view".into(), Value::Bool(false));
    }

    let concretizer = spack
        .entry("concretizer".into())
        .or_insert(Value::Mapping(Mapping::new()));
    if !concretizer.is_mapping() {
        *concretizer = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(concretizer) = concretizer {
        concretizer.insert("unify".into(), Value::Bool(true));
    }

    let mut definitions: Vec<Value> = match spack.get("definitions") {
        Some(Value::Sequence(existing)) => existing
            .iter()
            .filter(|definition| !is_dev_definition(definition))
            .cloned()
            .collect(),
        _ => Vec::new(),
    };
    for (when, specs) in resolved {
        let mut clause = Mapping::new();
        clause.insert(
            DEV_DEFINITION.into(),
            Value::Sequence(specs.iter().map(|spec| Value::from(spec.as_str())).collect()),
        );
        if let Some(when) = when {
            clause.insert("when".into(), Value::from(when.as_str()));
        }
        definitions.push(Value::Mapping(clause));
    }
    spack.insert("definitions".into(), Value::Sequence(definitions));

    let specs = spack
        .entry("specs".into())
        .or_insert(Value::Sequence(Vec::new()));
    if !specs.is_sequence() {
        *specs = Value::Sequence(Vec::new());
    }
    if let Value::Sequence(specs) = specs {
        if !specs.iter().any(|spec| spec.as_str() == Some(DEV_REFERENCE)) {
            specs.push(Value::from(DEV_REFERENCE));
        }
    }

    let mut manifest = Mapping::new();
    manifest.insert("spack".into(), Value::Mapping(spack));
    manifest
}

fn is_dev_definition(definition: &Value) -> bool {
    definition
        .as_mapping()
        .is_some_and(|clause| clause.contains_key(DEV_DEFINITION))
}
