//! Semantic versions and range constraints.

pub mod constraint;

pub use constraint::Constraint;

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// A parsed semantic version that remembers the string it was parsed from.
///
/// Release tags usually carry a `v` prefix (`v1.2.0`) and are sometimes
/// partial (`1.2`). Both are accepted; the raw string is kept so ledgers and
/// revisions record exactly what the source reported.
///
/// Equality and ordering follow semver precedence, so build metadata
/// (`1.0.0+build.1`) does not distinguish two versions.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    parsed: semver::Version,
}

impl Version {
    /// Parse a version string.
    pub fn parse(input: &str) -> Result<Self> {
        let parsed = semver::Version::parse(&normalize(input)).map_err(|source| {
            Error::InvalidVersion {
                version: input.to_string(),
                source,
            }
        })?;
        Ok(Self {
            raw: input.to_string(),
            parsed,
        })
    }

    /// `0.0.0`, the implicit pin of a dependency that is not tracked yet.
    pub fn zero() -> Self {
        Self {
            raw: "0.0.0".to_string(),
            parsed: semver::Version::new(0, 0, 0),
        }
    }

    /// The original string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn semver(&self) -> &semver::Version {
        &self.parsed
    }
}

/// Strip a leading `v` and pad missing minor/patch components.
fn normalize(input: &str) -> String {
    let input = input.trim();
    let input = input
        .strip_prefix('v')
        .or_else(|| input.strip_prefix('V'))
        .unwrap_or(input);

    let split = input.find(['-', '+']).unwrap_or(input.len());
    let (core, suffix) = input.split_at(split);
    let parts = core.split('.').count();
    let padding = match parts {
        1 => ".0.0",
        2 => ".0",
        _ => "",
    };
    format!("{core}{padding}{suffix}")
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parsed.cmp_precedence(&other.parsed)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
