//! Persistent record of synced repositories.
//!
//! The registry is an explicit store object owned by the caller and passed by
//! reference to whatever needs it; there is no ambient global and no implicit
//! load-on-first-use. It wraps the `repos_metadata.json` file under the data
//! directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Repository;

/// File name of the registry inside the data directory.
pub const METADATA_FILE: &str = "repos_metadata.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(flatten)]
    pub repository: Repository,
    pub synced_at: DateTime<Utc>,
}

/// Store for repository metadata, keyed by remote URL.
#[derive(Debug)]
pub struct RepoRegistry {
    path: PathBuf,
    entries: Vec<RegistryEntry>,
}

impl RepoRegistry {
    /// Loads the registry from `data_dir`, tolerating a missing or corrupt
    /// file by starting empty.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(METADATA_FILE);
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("ignoring corrupt registry {}: {e}", path.display());
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self { path, entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Every known repository, in registry order.
    pub fn repositories(&self) -> Vec<Repository> {
        self.entries.iter().map(|e| e.repository.clone()).collect()
    }

    /// Every known remote URL, in registry order.
    pub fn urls(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.repository.url.clone()).collect()
    }

    /// Looks a repository up by its `group/name` selector.
    pub fn find(&self, selector: &str) -> Option<Repository> {
        self.entries
            .iter()
            .map(|e| &e.repository)
            .find(|r| r.selector() == selector)
            .cloned()
    }

    /// Replaces or inserts entries for the given repositories, stamping them
    /// with the current time.
    pub fn record_synced(&mut self, repos: &[Repository]) {
        let now = Utc::now();
        for repo in repos {
            match self
                .entries
                .iter_mut()
                .find(|e| e.repository.url == repo.url)
            {
                Some(entry) => {
                    entry.repository = repo.clone();
                    entry.synced_at = now;
                }
                None => self.entries.push(RegistryEntry {
                    repository: repo.clone(),
                    synced_at: now,
                }),
            }
        }
    }

    /// Writes the registry back to disk as pretty JSON.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let bytes = serde_json::to_vec_pretty(&self.entries)?;
        std::fs::write(&self.path, bytes)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}
