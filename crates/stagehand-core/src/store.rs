//! Spec and state file persistence.
//!
//! The whole mutable state is read at the start of an operation sequence and
//! written back as one unit. Saves go through a temp file and a rename so a
//! crash never leaves a truncated state file behind. Concurrent writers must
//! coordinate outside this type.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::deployment::{MultiState, SingleState};
use crate::document::{self, SpecDocument};

/// Read and parse a spec file.
pub fn load_spec(path: &Path) -> anyhow::Result<SpecDocument> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read spec file: {}", path.display()))?;
    SpecDocument::parse(&bytes)
        .with_context(|| format!("Failed to parse spec file: {}", path.display()))
}

/// State file storage.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load a single-deployment state.
    ///
    /// A missing file is an error: the first revision must be seeded
    /// before the coordinator can run.
    pub fn load_single(&self) -> anyhow::Result<SingleState> {
        let bytes = self.read()?;
        document::parse_state(&bytes)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))
    }

    pub fn load_multi(&self) -> anyhow::Result<MultiState> {
        let bytes = self.read()?;
        document::parse_multi_state(&bytes)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))
    }

    pub fn save_single(&self, state: &SingleState) -> anyhow::Result<()> {
        let bytes = document::marshal_state(state).context("Failed to serialize state")?;
        self.write_atomic(&bytes)
    }

    pub fn save_multi(&self, state: &MultiState) -> anyhow::Result<()> {
        let bytes = document::marshal_multi_state(state).context("Failed to serialize state")?;
        self.write_atomic(&bytes)
    }

    fn read(&self) -> anyhow::Result<Vec<u8>> {
        fs::read(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))
    }

    fn write_atomic(&self, bytes: &[u8]) -> anyhow::Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("State path has no file name: {}", self.path.display()))?;
        let tmp_path = dir.join(format!(
            ".{}.{}.tmp",
            file_name.to_string_lossy(),
            std::process::id()
        ));

        fs::write(&tmp_path, bytes)
            .with_context(|| format!("Failed to write tmp state file: {}", tmp_path.display()))?;

        // Remove target first on Windows for replace semantics
        if cfg!(windows) && self.path.exists() {
            fs::remove_file(&self.path).with_context(|| {
                format!("Failed to remove existing state file: {}", self.path.display())
            })?;
        }
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to rename tmp state file: {}", tmp_path.display()))?;

        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "Saved state");
        Ok(())
    }
}
