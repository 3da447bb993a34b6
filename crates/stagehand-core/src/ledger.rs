//! Append-only dependency version ledger.
//!
//! The ledger records, per dependency name, every version observed by a
//! candidate source in ascending semver order. History is never reordered or
//! removed: a version is appended only when it is strictly greater than the
//! last recorded one.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::version::Version;

/// Free-form per-version metadata reported by a candidate source.
pub type Metadata = BTreeMap<String, serde_yaml::Value>;

/// Recorded history for one dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Observed versions, ascending
    pub versions: Vec<String>,

    /// Metadata keyed by version string
    pub meta: BTreeMap<String, Metadata>,
}

impl LedgerEntry {
    pub fn latest(&self) -> Option<&str> {
        self.versions.last().map(String::as_str)
    }
}

/// One version reported by a candidate source.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub version: String,
    pub meta: Metadata,
}

impl Candidate {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            meta: Metadata::new(),
        }
    }

    /// Attach a metadata value
    pub fn with_meta(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_yaml::Value>,
    ) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// Supplies candidate versions for a dependency name.
///
/// Implementations own their transport (git, registry APIs, commands). The
/// ledger imposes no timeout or retry policy; wrap the source if needed.
pub trait CandidateSource {
    fn fetch(&mut self, name: &str) -> anyhow::Result<Vec<Candidate>>;
}

impl<F> CandidateSource for F
where
    F: FnMut(&str) -> anyhow::Result<Vec<Candidate>>,
{
    fn fetch(&mut self, name: &str) -> anyhow::Result<Vec<Candidate>> {
        self(name)
    }
}

/// Read-only view of version history used by revision selection.
pub trait LedgerView {
    /// Ordered history for a dependency, or `None` if it is not tracked.
    fn history(&self, name: &str) -> Option<&[String]>;

    /// Every tracked dependency name.
    fn dependency_names(&self) -> Vec<&str>;

    /// Metadata recorded for one version.
    fn metadata(&self, name: &str, version: &str) -> Option<&Metadata>;
}

/// Outcome of an ingestion pass.
///
/// Names are processed independently: a failure for one name leaves the
/// versions already appended for other names in place.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Versions appended, per dependency
    pub appended: BTreeMap<String, Vec<String>>,

    /// Dependencies whose ingestion was aborted
    pub failures: BTreeMap<String, Error>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of versions appended across all dependencies.
    pub fn appended_count(&self) -> usize {
        self.appended.values().map(Vec::len).sum()
    }
}

/// Per-dependency version history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyLedger {
    entries: BTreeMap<String, LedgerEntry>,
}

impl DependencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, LedgerEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &BTreeMap<String, LedgerEntry> {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&LedgerEntry> {
        self.entries.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start tracking a dependency. Returns `true` if the entry was created.
    pub fn track(&mut self, name: &str) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_string(), LedgerEntry::default());
        true
    }

    /// Record an observed version.
    ///
    /// Returns `Ok(true)` if the version was appended and `Ok(false)` if it
    /// is not strictly greater than the last recorded version. Unknown
    /// dependencies are rejected without touching the ledger.
    pub fn record(&mut self, name: &str, version: &str) -> Result<bool> {
        let observed = Version::parse(version)?;
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| Error::DependencyNotFound(name.to_string()))?;

        if let Some(last) = entry.versions.last() {
            if observed <= Version::parse(last)? {
                tracing::debug!(
                    dependency = name,
                    version,
                    last = %last,
                    "Skipping version not newer than ledger tail"
                );
                return Ok(false);
            }
        }

        entry.versions.push(version.to_string());
        tracing::info!(dependency = name, version, "Recorded new version");
        Ok(true)
    }

    /// Attach metadata to a recorded version, merging with existing keys.
    pub fn annotate(&mut self, name: &str, version: &str, meta: Metadata) -> Result<()> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| Error::DependencyNotFound(name.to_string()))?;
        entry
            .meta
            .entry(version.to_string())
            .or_default()
            .extend(meta);
        Ok(())
    }

    /// The recorded string for a version equal to `version`, if any.
    fn stored_version(&self, name: &str, version: &Version) -> Option<String> {
        self.entries
            .get(name)?
            .versions
            .iter()
            .find(|raw| Version::parse(raw).is_ok_and(|parsed| parsed == *version))
            .cloned()
    }

    /// Fetch candidates for each name and record them in the order returned.
    ///
    /// Unknown names start being tracked. A fetch error or an unparseable
    /// candidate aborts that name only; it is reported in
    /// [`IngestReport::failures`].
    pub fn ingest<'a, I, S>(&mut self, names: I, source: &mut S) -> IngestReport
    where
        I: IntoIterator<Item = &'a str>,
        S: CandidateSource + ?Sized,
    {
        let mut report = IngestReport::default();
        for name in names {
            match self.ingest_one(name, source) {
                Ok(appended) => {
                    if !appended.is_empty() {
                        report.appended.insert(name.to_string(), appended);
                    }
                }
                Err(err) => {
                    tracing::warn!(dependency = name, error = %err, "Ingestion failed");
                    report.failures.insert(name.to_string(), err);
                }
            }
        }
        report
    }

    fn ingest_one<S>(&mut self, name: &str, source: &mut S) -> Result<Vec<String>>
    where
        S: CandidateSource + ?Sized,
    {
        self.track(name);
        let candidates = source.fetch(name).map_err(|err| Error::Fetch {
            name: name.to_string(),
            source: err.into(),
        })?;
        tracing::debug!(dependency = name, count = candidates.len(), "Fetched candidates");

        let mut appended = Vec::new();
        for candidate in candidates {
            if self.record(name, &candidate.version)? {
                appended.push(candidate.version.clone());
            }
            if candidate.meta.is_empty() {
                continue;
            }
            // Metadata lands on the stored spelling of the same version
            let observed = Version::parse(&candidate.version)?;
            if let Some(stored) = self.stored_version(name, &observed) {
                self.annotate(name, &stored, candidate.meta)?;
            }
        }
        Ok(appended)
    }

    /// Check that every history is parseable and strictly ascending.
    pub fn validate(&self) -> Result<()> {
        for (name, entry) in &self.entries {
            let mut previous: Option<Version> = None;
            for raw in &entry.versions {
                let version = Version::parse(raw)?;
                if let Some(prev) = &previous {
                    if version <= *prev {
                        return Err(Error::InvalidState(format!(
                            "ledger history for '{name}' is not strictly ascending at '{raw}'"
                        )));
                    }
                }
                previous = Some(version);
            }
        }
        Ok(())
    }
}

impl LedgerView for DependencyLedger {
    fn history(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(|entry| entry.versions.as_slice())
    }

    fn dependency_names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    fn metadata(&self, name: &str, version: &str) -> Option<&Metadata> {
        self.entries.get(name)?.meta.get(version)
    }
}
