//! Repository identity and provenance.

pub mod registry;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::records::Provenance;

/// A cloned source repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Remote URL the checkout came from.
    pub url: String,
    /// Group or organization segment of the URL.
    pub group_name: String,
    /// Repository name with any `.git` suffix stripped.
    pub repo_name: String,
    /// Local checkout path.
    pub repo_path: PathBuf,
}

impl Repository {
    /// Derives the repository identity from a remote URL, with the checkout
    /// rooted under `data_dir/<group>/<name>`.
    pub fn from_remote_url(url: &str, data_dir: &Path) -> Result<Self> {
        let parsed = Url::parse(url).with_context(|| format!("invalid repository URL: {url}"))?;
        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        if segments.len() < 2 {
            bail!("repository URL has no group/name path: {url}");
        }

        let group_name = segments[segments.len() - 2].to_string();
        let repo_name = segments[segments.len() - 1]
            .trim_end_matches(".git")
            .to_string();
        let repo_path = data_dir.join(&group_name).join(&repo_name);

        Ok(Self {
            url: url.to_string(),
            group_name,
            repo_name,
            repo_path,
        })
    }

    /// `group/name` selector used by the CLI.
    pub fn selector(&self) -> String {
        format!("{}/{}", self.group_name, self.repo_name)
    }

    /// Provenance fields for a file at `relative_path` inside this checkout.
    pub fn provenance(&self, relative_path: &Path) -> Provenance {
        Provenance {
            filepath: relative_path.to_string_lossy().into_owned(),
            repository_url: self.url.clone(),
            group_name: self.group_name.clone(),
            repo_name: self.repo_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_https_url_with_git_suffix() {
        let repo =
            Repository::from_remote_url("https://github.com/acme/widget.git", Path::new("./data"))
                .unwrap();
        assert_eq!(repo.group_name, "acme");
        assert_eq!(repo.repo_name, "widget");
        assert_eq!(repo.repo_path, Path::new("./data/acme/widget"));
        assert_eq!(repo.selector(), "acme/widget");
    }

    #[test]
    fn tolerates_trailing_slash() {
        let repo =
            Repository::from_remote_url("https://gitlab.com/group/project/", Path::new("/tmp"))
                .unwrap();
        assert_eq!(repo.group_name, "group");
        assert_eq!(repo.repo_name, "project");
    }

    #[test]
    fn rejects_urls_without_a_group_segment() {
        assert!(Repository::from_remote_url("https://github.com/solo", Path::new(".")).is_err());
        assert!(Repository::from_remote_url("not a url", Path::new(".")).is_err());
    }

    #[test]
    fn provenance_carries_identity_and_relative_path() {
        let repo =
            Repository::from_remote_url("https://github.com/acme/widget.git", Path::new("."))
                .unwrap();
        let prov = repo.provenance(Path::new("src/main.py"));
        assert_eq!(prov.filepath, "src/main.py");
        assert_eq!(prov.repo_name, "widget");
        assert_eq!(prov.repository_url, "https://github.com/acme/widget.git");
    }
}
