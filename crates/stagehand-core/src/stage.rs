//! Stage pointers and the cascading promotion rule.
//!
//! Stages form an ordered pipeline. The first stage pulls the latest revision
//! from the log; every later stage can only pull the revision its predecessor
//! is pinned to. Pointers never move backwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ledger::{LedgerView, Metadata};
use crate::revision::RevisionLog;

/// Pointer value of a stage that has never been promoted.
pub const UNPROMOTED: i64 = -1;

/// A pipeline stage as declared in the deployment spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,

    /// Opaque labels handed to whatever applies the stage
    #[serde(default)]
    pub environments: Vec<String>,
}

impl StageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            environments: Vec::new(),
        }
    }

    pub fn with_environments<I, S>(mut self, environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environments = environments.into_iter().map(Into::into).collect();
        self
    }
}

/// The revision a stage is pinned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageState {
    pub name: String,
    pub revision: i64,
}

impl StageState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            revision: UNPROMOTED,
        }
    }

    pub fn is_promoted(&self) -> bool {
        self.revision != UNPROMOTED
    }
}

/// Result of advancing a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageAdvance {
    Advanced { from: i64, to: i64 },
    Unchanged { revision: i64 },
}

impl StageAdvance {
    /// The revision the stage is pinned to afterwards.
    pub fn revision(&self) -> i64 {
        match self {
            StageAdvance::Advanced { to, .. } => *to,
            StageAdvance::Unchanged { revision } => *revision,
        }
    }
}

/// What a stage is currently running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    pub stage: String,
    pub revision: i64,
    pub environments: Vec<String>,
    pub versions: BTreeMap<String, String>,

    /// Ledger metadata for each pinned version that has any
    pub meta: BTreeMap<String, Metadata>,
}

/// Stage states, indexed by their position in the stage spec list.
///
/// States are created lazily and in order: a stage gets a state the first
/// time it is advanced, and only once every earlier stage has one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagePointers {
    states: Vec<StageState>,
}

impl StagePointers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_states(states: Vec<StageState>) -> Self {
        Self { states }
    }

    pub fn states(&self) -> &[StageState] {
        &self.states
    }

    pub fn state(&self, name: &str) -> Option<&StageState> {
        self.states.iter().find(|state| state.name == name)
    }

    /// Pull the next eligible revision into a stage.
    pub fn advance(
        &mut self,
        specs: &[StageSpec],
        name: &str,
        log: &RevisionLog,
    ) -> Result<StageAdvance> {
        let index = position(specs, name)?;
        if index > self.states.len() {
            return Err(Error::OutOfOrderInitialization {
                stage: name.to_string(),
                requires: specs[self.states.len()].name.clone(),
            });
        }

        let candidate = match index {
            0 => log.latest().ok_or(Error::EmptyRevisionLog)?.id,
            _ => self.states[index - 1].revision,
        };

        if index == self.states.len() {
            tracing::debug!(stage = name, "Initializing stage");
            self.states.push(StageState::new(name));
        }

        let state = &mut self.states[index];
        if candidate > state.revision {
            let from = state.revision;
            state.revision = candidate;
            tracing::info!(stage = name, from, to = candidate, "Advanced stage");
            Ok(StageAdvance::Advanced {
                from,
                to: candidate,
            })
        } else {
            tracing::debug!(stage = name, revision = state.revision, "Stage already current");
            Ok(StageAdvance::Unchanged {
                revision: state.revision,
            })
        }
    }

    /// Resolve the snapshot a stage is pinned to.
    pub fn summary<L>(
        &self,
        specs: &[StageSpec],
        name: &str,
        log: &RevisionLog,
        ledger: &L,
    ) -> Result<StageSummary>
    where
        L: LedgerView + ?Sized,
    {
        let index = position(specs, name)?;
        if log.is_empty() {
            return Err(Error::EmptyRevisionLog);
        }

        let id = self
            .states
            .get(index)
            .map_or(UNPROMOTED, |state| state.revision);
        let revision = log.get(id).ok_or_else(|| Error::RevisionNotFound {
            stage: name.to_string(),
            id,
        })?;

        let meta = revision
            .versions
            .iter()
            .filter_map(|(dependency, version)| {
                ledger
                    .metadata(dependency, version)
                    .map(|meta| (dependency.clone(), meta.clone()))
            })
            .collect();

        Ok(StageSummary {
            stage: name.to_string(),
            revision: revision.id,
            environments: specs[index].environments.clone(),
            versions: revision.versions.clone(),
            meta,
        })
    }

    /// Check persisted pointers against the stage specs and revision log.
    pub fn validate(&self, specs: &[StageSpec], log: &RevisionLog) -> Result<()> {
        if self.states.len() > specs.len() {
            return Err(Error::InvalidState(format!(
                "{} stage states recorded for {} declared stages",
                self.states.len(),
                specs.len()
            )));
        }

        let mut previous: Option<&StageState> = None;
        for (state, spec) in self.states.iter().zip(specs) {
            if state.name != spec.name {
                return Err(Error::InvalidState(format!(
                    "stage state '{}' is recorded where stage '{}' is declared",
                    state.name, spec.name
                )));
            }
            if state.is_promoted() && !log.contains(state.revision) {
                return Err(Error::RevisionNotFound {
                    stage: state.name.clone(),
                    id: state.revision,
                });
            }
            if let Some(prev) = previous {
                if state.revision > prev.revision {
                    return Err(Error::InvalidState(format!(
                        "stage '{}' (revision {}) is ahead of stage '{}' (revision {})",
                        state.name, state.revision, prev.name, prev.revision
                    )));
                }
            }
            previous = Some(state);
        }
        Ok(())
    }
}

fn position(specs: &[StageSpec], name: &str) -> Result<usize> {
    specs
        .iter()
        .position(|spec| spec.name == name)
        .ok_or_else(|| Error::StageNotFound(name.to_string()))
}
