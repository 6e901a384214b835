//! Text output formatter for human-readable display
//!
//! This module provides:
//! - Resolved spec listing grouped by `when` predicate
//! - Generated environment summary
//! - Plain (uncolored) rendering for pipes and tests

use crate::orchestrator::{GenerateReport, ResolutionReport};
use crate::output::{OutputFormatter, Verbosity};
use crate::resolve::ResolvedSpecs;
use colored::Colorize;
use std::io::Write;

/// Text formatter for human-readable output
pub struct TextFormatter {
    /// Verbosity level
    verbosity: Verbosity,
    /// Whether to use colors
    color: bool,
}

impl TextFormatter {
    /// Create a new text formatter with color option
    pub fn with_color(verbosity: Verbosity, color: bool) -> Self {
        Self { verbosity, color }
    }

    fn group_header(&self, when: Option<&str>) -> String {
        match (when, self.color) {
            (None, true) => format!("{}:", "Dependencies".bold()),
            (None, false) => "Dependencies:".to_string(),
            (Some(when), true) => format!("{} {}:", "When".bold(), when.cyan()),
            (Some(when), false) => format!("When {}:", when),
        }
    }

    fn spec_line(&self, spec: &str) -> String {
        if self.color {
            format!("  {}", spec.green())
        } else {
            format!("  {}", spec)
        }
    }

    fn write_groups(&self, groups: &ResolvedSpecs, writer: &mut dyn Write) -> std::io::Result<()> {
        for (when, specs) in groups {
            writeln!(writer, "{}", self.group_header(when.as_deref()))?;
            for spec in specs {
                writeln!(writer, "{}", self.spec_line(spec))?;
            }
        }
        Ok(())
    }

    /// One spec per line, conditioned specs suffixed with their predicate
    fn write_quiet(&self, groups: &ResolvedSpecs, writer: &mut dyn Write) -> std::io::Result<()> {
        for (when, specs) in groups {
            for spec in specs {
                match when {
                    Some(when) => writeln!(writer, "{} (when {})", spec, when)?,
                    None => writeln!(writer, "{}", spec)?,
                }
            }
        }
        Ok(())
    }

    fn summary_line(&self, report: &ResolutionReport) -> String {
        let count = report.spec_count();
        let groups = report.groups.len();
        format!(
            "{} spec{} in {} group{} ({})",
            count,
            if count == 1 { "" } else { "s" },
            groups,
            if groups == 1 { "" } else { "s" },
            report.mode
        )
    }
}

impl OutputFormatter for TextFormatter {
    fn format_resolution(
        &self,
        report: &ResolutionReport,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        if self.verbosity == Verbosity::Quiet {
            return self.write_quiet(&report.groups, writer);
        }

        if report.groups.is_empty() {
            writeln!(writer, "No dependencies configured")?;
            return Ok(());
        }

        self.write_groups(&report.groups, writer)?;
        writeln!(writer)?;

        if self.verbosity == Verbosity::Verbose && !report.unresolve.is_empty() {
            let packages: Vec<&str> = report.unresolve.iter().map(String::as_str).collect();
            writeln!(writer, "Unresolved: {}", packages.join(", "))?;
        }

        let summary = self.summary_line(report);
        if self.color {
            writeln!(writer, "{}", summary.dimmed())?;
        } else {
            writeln!(writer, "{}", summary)?;
        }
        Ok(())
    }

    fn format_generate(
        &self,
        report: &GenerateReport,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        if self.verbosity == Verbosity::Quiet {
            writeln!(writer, "{}", report.result.root.display())?;
            return Ok(());
        }

        if self.verbosity == Verbosity::Verbose {
            self.write_groups(&report.resolution.groups, writer)?;
            writeln!(writer)?;
        }

        let heading = format!("Generated environment '{}'", report.name);
        if self.color {
            writeln!(writer, "{} {}", "✓".green(), heading.bold())?;
        } else {
            writeln!(writer, "{}", heading)?;
        }
        writeln!(writer, "  manifest: {}", report.result.manifest.display())?;
        if report.result.lock_removed {
            writeln!(writer, "  removed stale spack.lock")?;
        }
        writeln!(writer, "  {}", self.summary_line(&report.resolution))?;
        if report.installed {
            writeln!(writer, "  installed")?;
        }
        Ok(())
    }
}
