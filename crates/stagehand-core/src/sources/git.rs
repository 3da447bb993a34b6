//! Candidate versions from the tags of a local git repository.

use std::path::PathBuf;

use git2::Repository;

use crate::ledger::{Candidate, CandidateSource};
use crate::version::Version;

/// Lists semver tags of a repository in ascending version order.
///
/// Tags that do not parse as versions are skipped. Each candidate carries
/// the tagged commit id as `commit` metadata.
#[derive(Debug, Clone)]
pub struct GitTagSource {
    repository: PathBuf,
    pattern: Option<String>,
}

impl GitTagSource {
    pub fn new(repository: PathBuf, pattern: Option<String>) -> Self {
        Self {
            repository,
            pattern,
        }
    }
}

impl CandidateSource for GitTagSource {
    fn fetch(&mut self, name: &str) -> anyhow::Result<Vec<Candidate>> {
        let repo = Repository::open(&self.repository)?;
        let tags = repo.tag_names(self.pattern.as_deref())?;

        let mut versions = Vec::new();
        for tag in tags.iter().flatten() {
            match Version::parse(tag) {
                Ok(version) => versions.push(version),
                Err(_) => tracing::debug!(dependency = name, tag, "Skipping non-semver tag"),
            }
        }
        versions.sort();

        versions
            .into_iter()
            .map(|version| -> anyhow::Result<Candidate> {
                let reference = format!("refs/tags/{}", version.as_str());
                let commit = repo.revparse_single(&reference)?.peel_to_commit()?;
                Ok(Candidate::new(version.as_str()).with_meta("commit", commit.id().to_string()))
            })
            .collect()
    }
}
