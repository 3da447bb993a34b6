//! Immutable revision log and next-revision selection.
//!
//! A revision is a complete snapshot of dependency versions. The log only
//! grows: each recomputation appends at most one revision whose id is the
//! previous id plus one.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::ledger::LedgerView;
use crate::version::{Constraint, Version};

/// A fully-resolved snapshot of dependency versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub id: i64,
    pub versions: BTreeMap<String, String>,
}

impl Revision {
    pub fn new(id: i64, versions: BTreeMap<String, String>) -> Self {
        Self { id, versions }
    }

    pub fn version_of(&self, name: &str) -> Option<&str> {
        self.versions.get(name).map(String::as_str)
    }
}

/// Which declared dependencies may move during a recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdateTarget {
    /// Every declared dependency
    #[default]
    All,
    /// Only the named dependency; the rest keep their current pin
    Only(String),
}

impl UpdateTarget {
    /// `"*"` selects every dependency, anything else a single name.
    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "*" | "" => UpdateTarget::All,
            name => UpdateTarget::Only(name.to_string()),
        }
    }

    pub fn includes(&self, name: &str) -> bool {
        match self {
            UpdateTarget::All => true,
            UpdateTarget::Only(target) => target == name,
        }
    }
}

impl fmt::Display for UpdateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateTarget::All => f.write_str("*"),
            UpdateTarget::Only(name) => f.write_str(name),
        }
    }
}

/// Append-only sequence of revisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionLog {
    revisions: Vec<Revision>,
}

impl RevisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from persisted revisions, checking ids are consecutive.
    pub fn from_revisions(revisions: Vec<Revision>) -> Result<Self> {
        for pair in revisions.windows(2) {
            if pair[1].id != pair[0].id + 1 {
                return Err(Error::InvalidState(format!(
                    "revision {} follows revision {}; ids must be consecutive",
                    pair[1].id, pair[0].id
                )));
            }
        }
        if let Some(first) = revisions.first() {
            if first.id < 1 {
                return Err(Error::InvalidState(format!(
                    "revision ids start at 1, found {}",
                    first.id
                )));
            }
        }
        Ok(Self { revisions })
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn latest(&self) -> Option<&Revision> {
        self.revisions.last()
    }

    pub fn get(&self, id: i64) -> Option<&Revision> {
        let first = self.revisions.first()?.id;
        let index = usize::try_from(id.checked_sub(first)?).ok()?;
        self.revisions.get(index)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.get(id).is_some()
    }

    /// Derive the next revision from the latest one and append it.
    ///
    /// Returns the appended revision, or `None` if nothing changed. Nothing
    /// is appended when any dependency fails to resolve.
    pub fn recompute<L>(
        &mut self,
        ledger: &L,
        target: &UpdateTarget,
        constraints: &BTreeMap<String, String>,
    ) -> Result<Option<&Revision>>
    where
        L: LedgerView + ?Sized,
    {
        let current = self.latest().ok_or(Error::EmptyRevisionLog)?;
        let current_id = current.id;
        match select_next(current, ledger, target, constraints)? {
            Some(next) => {
                tracing::info!(
                    revision = next.id,
                    target = %target,
                    "Appended revision"
                );
                self.revisions.push(next);
                Ok(self.revisions.last())
            }
            None => {
                tracing::debug!(revision = current_id, target = %target, "No newer versions");
                Ok(None)
            }
        }
    }
}

/// Compute the revision that follows `current`, if any dependency moved.
///
/// Declared dependencies take the newest ledger version that is greater than
/// their current pin and satisfies their constraint. Ledger dependencies not
/// yet in `current` are adopted at their latest version, regardless of
/// `target` or constraints.
pub fn select_next<L>(
    current: &Revision,
    ledger: &L,
    target: &UpdateTarget,
    constraints: &BTreeMap<String, String>,
) -> Result<Option<Revision>>
where
    L: LedgerView + ?Sized,
{
    let parsed = constraints
        .iter()
        .map(|(name, expr)| Ok((name.as_str(), Constraint::parse(expr)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut versions = current.versions.clone();
    let mut changed = false;

    for (name, constraint) in &parsed {
        if !target.includes(name) {
            continue;
        }
        let pinned = current.version_of(name);
        let resolved = resolve(name, pinned, constraint, ledger)?;
        if pinned != Some(resolved.as_str()) {
            tracing::debug!(dependency = name, from = ?pinned, to = %resolved, "Selected version");
            versions.insert(name.to_string(), resolved);
            changed = true;
        }
    }

    for name in ledger.dependency_names() {
        if versions.contains_key(name) {
            continue;
        }
        let Some(latest) = ledger.history(name).and_then(<[String]>::last) else {
            continue;
        };
        tracing::debug!(dependency = name, version = %latest, "Adopting newly tracked dependency");
        versions.insert(name.to_string(), latest.clone());
        changed = true;
    }

    if !changed {
        return Ok(None);
    }
    Ok(Some(Revision::new(current.id + 1, versions)))
}

/// Newest-to-oldest scan for one dependency.
fn resolve<L>(
    name: &str,
    pinned: Option<&str>,
    constraint: &Constraint,
    ledger: &L,
) -> Result<String>
where
    L: LedgerView + ?Sized,
{
    let floor = match pinned {
        Some(raw) => Version::parse(raw)?,
        None => Version::zero(),
    };
    let history = ledger
        .history(name)
        .ok_or_else(|| Error::NoLedgerData(name.to_string()))?;

    for raw in history.iter().rev() {
        let candidate = Version::parse(raw)?;
        if candidate <= floor {
            break;
        }
        if constraint.matches(&candidate) {
            return Ok(raw.clone());
        }
    }

    pinned
        .map(str::to_string)
        .ok_or_else(|| Error::UnresolvedDependency {
            name: name.to_string(),
            constraint: constraint.to_string(),
        })
}
