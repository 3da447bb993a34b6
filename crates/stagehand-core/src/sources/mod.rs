//! Candidate sources that feed the dependency ledger.
//!
//! Each source turns one kind of release tracking into [`Candidate`] lists.
//! [`ConfiguredSources`] dispatches by dependency name using the
//! `[sources.*]` tables of stagehand.toml.

pub mod command;
pub mod git;

pub use command::CommandSource;
pub use git::GitTagSource;

use std::collections::BTreeMap;

use crate::config::{SourceConfig, StagehandConfig};
use crate::ledger::{Candidate, CandidateSource};

/// A fixed list of versions.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    versions: Vec<String>,
}

impl StaticSource {
    pub fn new(versions: Vec<String>) -> Self {
        Self { versions }
    }
}

impl CandidateSource for StaticSource {
    fn fetch(&mut self, _name: &str) -> anyhow::Result<Vec<Candidate>> {
        Ok(self.versions.iter().map(Candidate::new).collect())
    }
}

/// Routes each dependency name to the source configured for it.
#[derive(Default)]
pub struct ConfiguredSources {
    sources: BTreeMap<String, Box<dyn CandidateSource>>,
}

impl ConfiguredSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build sources from the `[sources.*]` tables of a config.
    pub fn from_config(config: &StagehandConfig) -> Self {
        let mut sources = Self::new();
        for (name, source) in &config.sources {
            let boxed: Box<dyn CandidateSource> = match source {
                SourceConfig::Static { versions } => Box::new(StaticSource::new(versions.clone())),
                SourceConfig::GitTags {
                    repository,
                    pattern,
                } => Box::new(GitTagSource::new(repository.clone(), pattern.clone())),
                SourceConfig::Command { command } => Box::new(CommandSource::new(command.clone())),
            };
            sources.insert(name.clone(), boxed);
        }
        sources
    }

    pub fn insert(&mut self, name: String, source: Box<dyn CandidateSource>) {
        self.sources.insert(name, source);
    }

    pub fn is_configured(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }
}

impl CandidateSource for ConfiguredSources {
    fn fetch(&mut self, name: &str) -> anyhow::Result<Vec<Candidate>> {
        match self.sources.get_mut(name) {
            Some(source) => source.fetch(name),
            None => {
                tracing::debug!(dependency = name, "No source configured");
                Ok(Vec::new())
            }
        }
    }
}
