//! JSON output formatter for machine processing

use crate::domain::DependencyMode;
use crate::orchestrator::{GenerateReport, ResolutionReport};
use crate::output::OutputFormatter;
use crate::resolve::ResolvedSpecs;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

/// JSON formatter for machine-readable output
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self
    }
}

/// JSON representation of a resolution
#[derive(Serialize)]
struct JsonResolution<'a> {
    mode: DependencyMode,
    unresolve: &'a BTreeSet<String>,
    groups: Vec<JsonGroup<'a>>,
}

/// JSON representation of one `when` group
#[derive(Serialize)]
struct JsonGroup<'a> {
    when: Option<&'a str>,
    specs: &'a BTreeSet<String>,
}

/// JSON representation of a generated environment
#[derive(Serialize)]
struct JsonGenerate<'a> {
    name: &'a str,
    root: &'a Path,
    manifest: &'a Path,
    lock_removed: bool,
    installed: bool,
    resolution: JsonResolution<'a>,
}

impl<'a> JsonResolution<'a> {
    fn from_report(report: &'a ResolutionReport) -> Self {
        Self {
            mode: report.mode,
            unresolve: &report.unresolve,
            groups: groups_to_json(&report.groups),
        }
    }
}

fn groups_to_json(groups: &ResolvedSpecs) -> Vec<JsonGroup<'_>> {
    groups
        .iter()
        .map(|(when, specs)| JsonGroup {
            when: when.as_deref(),
            specs,
        })
        .collect()
}

fn write_json<T: Serialize>(value: &T, writer: &mut dyn Write) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    writeln!(writer, "{}", json)
}

impl OutputFormatter for JsonFormatter {
    fn format_resolution(
        &self,
        report: &ResolutionReport,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        write_json(&JsonResolution::from_report(report), writer)
    }

    fn format_generate(
        &self,
        report: &GenerateReport,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let output = JsonGenerate {
            name: &report.name,
            root: &report.result.root,
            manifest: &report.result.manifest,
            lock_removed: report.result.lock_removed,
            installed: report.installed,
            resolution: JsonResolution::from_report(&report.resolution),
        };
        write_json(&output, writer)
    }
}
