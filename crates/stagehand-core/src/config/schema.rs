//! Configuration schema for stagehand.toml
//!
//! ```toml
//! spec = "deploy.yaml"
//! state = "state.yaml"
//!
//! [sources.app]
//! kind = "git-tags"
//! repository = "../app"
//! pattern = "v*"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Root configuration structure for stagehand.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagehandConfig {
    /// Deployment spec file (YAML)
    #[serde(default = "default_spec")]
    pub spec: PathBuf,

    /// Mutable state file (YAML)
    #[serde(default = "default_state")]
    pub state: PathBuf,

    /// Candidate sources keyed by dependency name
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

fn default_spec() -> PathBuf {
    PathBuf::from("deploy.yaml")
}

fn default_state() -> PathBuf {
    PathBuf::from("state.yaml")
}

impl Default for StagehandConfig {
    fn default() -> Self {
        Self {
            spec: default_spec(),
            state: default_state(),
            sources: BTreeMap::new(),
        }
    }
}

/// Where candidate versions for one dependency come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SourceConfig {
    /// Fixed list of versions
    Static {
        #[serde(default)]
        versions: Vec<String>,
    },

    /// Tags of a local git repository
    GitTags {
        repository: PathBuf,
        /// Glob passed to git when listing tags
        #[serde(default)]
        pattern: Option<String>,
    },

    /// Command printing one version per line
    Command { command: Vec<String> },
}

impl StagehandConfig {
    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, source) in &self.sources {
            match source {
                SourceConfig::Static { .. } => {}
                SourceConfig::GitTags { repository, .. } => {
                    if repository.as_os_str().is_empty() {
                        anyhow::bail!("Source '{}': git-tags requires a repository path", name);
                    }
                }
                SourceConfig::Command { command } => {
                    if command.is_empty() {
                        anyhow::bail!("Source '{}': command must not be empty", name);
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve relative paths against the directory holding the config file.
    pub fn resolve_paths(&mut self, base: &Path) {
        self.spec = resolve(base, &self.spec);
        self.state = resolve(base, &self.state);
        for source in self.sources.values_mut() {
            if let SourceConfig::GitTags { repository, .. } = source {
                *repository = resolve(base, repository);
            }
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StagehandConfig::default();
        assert_eq!(config.spec, PathBuf::from("deploy.yaml"));
        assert_eq!(config.state, PathBuf::from("state.yaml"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_command() {
        let mut config = StagehandConfig::default();
        config
            .sources
            .insert("app".to_string(), SourceConfig::Command { command: vec![] });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_paths() {
        let mut config = StagehandConfig::default();
        config.sources.insert(
            "app".to_string(),
            SourceConfig::GitTags {
                repository: PathBuf::from("repos/app"),
                pattern: None,
            },
        );
        config.state = PathBuf::from("/var/lib/stagehand/state.yaml");

        config.resolve_paths(Path::new("/srv/project"));

        assert_eq!(config.spec, PathBuf::from("/srv/project/deploy.yaml"));
        assert_eq!(config.state, PathBuf::from("/var/lib/stagehand/state.yaml"));
        match &config.sources["app"] {
            SourceConfig::GitTags { repository, .. } => {
                assert_eq!(repository, &PathBuf::from("/srv/project/repos/app"));
            }
            other => panic!("Expected git-tags source, got {other:?}"),
        }
    }
}
