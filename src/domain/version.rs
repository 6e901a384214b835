//! Spack-style package versions and inclusive version ranges
//!
//! Versions are split into segments on `.`, `-`, `_` and on every
//! digit/letter boundary:
//! - Numeric segments compare as numbers
//! - Alphabetic segments compare lexicographically and sort below numbers
//! - `develop`, `main`, `master`, `head`, `trunk` and `stable` sort above
//!   every numeric segment, in that order
//! - When one version is a prefix of another, the shorter one is smaller

use crate::error::SpecError;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Branch-like names that compare above every release, highest first
const INFINITY_NAMES: [&str; 6] = ["develop", "main", "master", "head", "trunk", "stable"];

/// A parsed package version with comparable segments.
#[derive(Debug, Clone)]
pub struct Version {
    original: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    /// Alphabetic component such as `rc` or `beta`
    Text(String),
    /// Digit run without leading zeros, so any length compares exactly
    Numeric(String),
    /// Index into `INFINITY_NAMES`, lower index is greater
    Infinity(usize),
}

impl Segment {
    fn rank(&self) -> u8 {
        match self {
            Segment::Text(_) => 0,
            Segment::Numeric(_) => 1,
            Segment::Infinity(_) => 2,
        }
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Numeric(a), Segment::Numeric(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
            (Segment::Infinity(a), Segment::Infinity(b)) => b.cmp(a),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Version {
    /// Parse a version string such as `1.2.3`, `2022.10.1` or `develop`
    pub fn parse(version: &str) -> Result<Self, SpecError> {
        let invalid = || SpecError::InvalidVersion {
            version: version.to_string(),
        };

        if version.is_empty()
            || !version
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            return Err(invalid());
        }

        let segments = split_segments(version);
        if segments.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            original: version.to_string(),
            segments,
        })
    }

    /// The version text as it was written
    pub fn as_str(&self) -> &str {
        &self.original
    }
}

fn split_segments(version: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();

    let flush = |current: &mut String, segments: &mut Vec<Segment>| {
        if current.is_empty() {
            return;
        }
        let segment = if current.bytes().all(|b| b.is_ascii_digit()) {
            let digits = current.trim_start_matches('0');
            Segment::Numeric(if digits.is_empty() { "0" } else { digits }.to_string())
        } else {
            let lower = current.to_ascii_lowercase();
            match INFINITY_NAMES.iter().position(|name| *name == lower) {
                Some(idx) => Segment::Infinity(idx),
                None => Segment::Text(lower),
            }
        };
        segments.push(segment);
        current.clear();
    };

    for c in version.chars() {
        if matches!(c, '.' | '-' | '_') {
            flush(&mut current, &mut segments);
            continue;
        }
        let boundary = current
            .chars()
            .last()
            .is_some_and(|last| last.is_ascii_digit() != c.is_ascii_digit());
        if boundary {
            flush(&mut current, &mut segments);
        }
        current.push(c);
    }
    flush(&mut current, &mut segments);

    segments
}

impl FromStr for Version {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.segments.iter().zip(other.segments.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        self.segments.len().cmp(&other.segments.len())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An inclusive version range; a missing bound is unbounded on that side
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VersionRange {
    pub lower: Option<Version>,
    pub upper: Option<Version>,
}

impl VersionRange {
    /// Creates a new range from optional bounds
    pub fn new(lower: Option<Version>, upper: Option<Version>) -> Self {
        Self { lower, upper }
    }

    /// Returns true if `version` lies within both bounds
    pub fn contains(&self, version: &Version) -> bool {
        self.lower.as_ref().map_or(true, |lower| lower <= version)
            && self.upper.as_ref().map_or(true, |upper| version <= upper)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref lower) = self.lower {
            write!(f, "{}", lower)?;
        }
        f.write_str(":")?;
        if let Some(ref upper) = self.upper {
            write!(f, "{}", upper)?;
        }
        Ok(())
    }
}
