//! Version range constraints.

use std::cmp::Ordering;
use std::fmt;

use semver::VersionReq;

use super::Version;
use crate::error::{Error, Result};

/// A version range expression such as `>= 1.0.0` or `^1.2 || ~2.0`.
///
/// Space-separated comparators are intersected (`>= 1.0 < 2.0`), `||`
/// separates alternatives, and the empty expression matches every version.
/// `!= 1.1.0` excludes a single version from the alternative it appears in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    raw: String,
    alternatives: Vec<Alternative>,
}

/// One `||` branch: an optional range and the versions it excludes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Alternative {
    range: Option<VersionReq>,
    excluded: Vec<semver::Version>,
}

impl Alternative {
    fn matches(&self, version: &semver::Version) -> bool {
        self.range.as_ref().is_none_or(|req| req.matches(version))
            && !self
                .excluded
                .iter()
                .any(|excluded| excluded.cmp_precedence(version) == Ordering::Equal)
    }
}

impl Constraint {
    /// Parse a constraint expression.
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim().to_string();
        if raw.is_empty() || raw == "*" {
            return Ok(Self::any());
        }

        let invalid = |source: semver::Error| Error::InvalidConstraint {
            constraint: raw.clone(),
            source,
        };
        let alternatives = raw
            .split("||")
            .map(|alternative| -> Result<Alternative> {
                let (comparators, excluded) = normalize_alternative(alternative);
                let range = if comparators.is_empty() && !excluded.is_empty() {
                    None
                } else {
                    Some(VersionReq::parse(&comparators.join(", ")).map_err(invalid)?)
                };
                let excluded = excluded
                    .iter()
                    .map(|version| semver::Version::parse(&super::normalize(version)))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(invalid)?;
                Ok(Alternative { range, excluded })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { raw, alternatives })
    }

    /// A constraint every version satisfies.
    pub fn any() -> Self {
        Self {
            raw: String::new(),
            alternatives: Vec::new(),
        }
    }

    pub fn is_any(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// Check whether a version satisfies this constraint.
    pub fn matches(&self, version: &Version) -> bool {
        self.is_any()
            || self
                .alternatives
                .iter()
                .any(|alternative| alternative.matches(version.semver()))
    }

    /// The expression as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split one `||` alternative into `semver` comparators and `!=` exclusions.
///
/// Operators separated from their version (`>= 1.0`) are joined, `v`
/// prefixes are dropped, and hyphen ranges (`1.0 - 2.0`) become
/// `>=1.0, <=2.0`.
fn normalize_alternative(alternative: &str) -> (Vec<String>, Vec<String>) {
    let tokens: Vec<&str> = alternative
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();

    let mut comparators = Vec::new();
    let mut excluded = Vec::new();
    let mut pending_op = String::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if token.chars().all(is_operator_char) {
            pending_op.push_str(token);
            i += 1;
            continue;
        }

        if pending_op.is_empty() && tokens.get(i + 1) == Some(&"-") {
            if let Some(upper) = tokens.get(i + 2) {
                comparators.push(format!(">={}", strip_v(token)));
                comparators.push(format!("<={}", strip_v(upper)));
                i += 3;
                continue;
            }
        }

        let split = token
            .find(|c: char| !is_operator_char(c))
            .unwrap_or(token.len());
        let (op, version) = token.split_at(split);
        let op = format!("{pending_op}{op}");
        if op == "!=" {
            excluded.push(version.to_string());
        } else {
            comparators.push(format!("{op}{}", strip_v(version)));
        }
        pending_op.clear();
        i += 1;
    }

    (comparators, excluded)
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '=' | '>' | '<' | '~' | '^' | '!')
}

fn strip_v(version: &str) -> &str {
    match version.strip_prefix(['v', 'V']) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(input: &str) -> Version {
        Version::parse(input).unwrap()
    }

    #[test]
    fn test_empty_matches_everything() {
        let constraint = Constraint::parse("").unwrap();
        assert!(constraint.is_any());
        assert!(constraint.matches(&v("0.0.1")));
        assert!(Constraint::parse("*").unwrap().matches(&v("v9.9.9")));
    }

    #[test]
    fn test_spaced_operator() {
        let constraint = Constraint::parse(">= 1.0.0").unwrap();
        assert!(constraint.matches(&v("v1.0.0")));
        assert!(constraint.matches(&v("v2.3.0")));
        assert!(!constraint.matches(&v("v0.9.0")));
        assert_eq!(constraint.as_str(), ">= 1.0.0");
    }

    #[test]
    fn test_space_separated_comparators_intersect() {
        let constraint = Constraint::parse(">=1.0.0 <1.1.0").unwrap();
        assert!(constraint.matches(&v("v1.0.5")));
        assert!(!constraint.matches(&v("v1.1.0")));
    }

    #[test]
    fn test_alternatives() {
        let constraint = Constraint::parse("~1.0 || >= v3.0").unwrap();
        assert!(constraint.matches(&v("1.0.7")));
        assert!(!constraint.matches(&v("2.0.0")));
        assert!(constraint.matches(&v("3.1.0")));
    }

    #[test]
    fn test_hyphen_range() {
        let constraint = Constraint::parse("1.2.0 - 1.4.0").unwrap();
        assert!(constraint.matches(&v("1.3.9")));
        assert!(constraint.matches(&v("1.4.0")));
        assert!(!constraint.matches(&v("1.4.1")));
    }

    #[test]
    fn test_not_equal_excludes_version() {
        let constraint = Constraint::parse(">= 1.0.0 != v1.1.0").unwrap();
        assert!(constraint.matches(&v("1.0.4")));
        assert!(!constraint.matches(&v("v1.1.0")));
        assert!(constraint.matches(&v("1.1.1")));

        let only = Constraint::parse("!=1.1").unwrap();
        assert!(!only.matches(&v("1.1.0+build.7")));
        assert!(only.matches(&v("2.0.0-rc.1")));
    }

    #[test]
    fn test_not_equal_is_scoped_to_its_alternative() {
        let constraint = Constraint::parse("~1.0 != 1.0.2 || 1.0.2 - 1.0.2").unwrap();
        assert!(constraint.matches(&v("1.0.2")));
        assert!(constraint.matches(&v("1.0.3")));
        assert!(Constraint::parse("!= banana").unwrap_err().is_parse());
    }

    #[test]
    fn test_invalid_constraint() {
        let err = Constraint::parse(">= banana").unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains(">= banana"));
    }
}
