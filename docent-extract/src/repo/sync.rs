//! Clone-or-update of remote repositories, bounded by a worker cap.
//!
//! Sync unions the registry's known URLs with the requested ones, runs each
//! clone/pull on a blocking thread (libgit2 is synchronous), and caps the
//! number running at once. One repository's failure is logged and never
//! aborts the rest.

use std::path::Path;

use anyhow::{Context, Result, bail};
use futures::stream::{self, StreamExt};
use tracing::{error, info};

use super::Repository;
use super::registry::RepoRegistry;

/// Default number of repositories synced concurrently.
pub const DEFAULT_SYNC_WORKERS: usize = 5;

/// Clones or fast-forwards every URL, records successes in the registry, and
/// returns the repositories that synced.
pub async fn sync_repositories(
    registry: &mut RepoRegistry,
    urls: &[String],
    data_dir: &Path,
    max_workers: usize,
) -> Result<Vec<Repository>> {
    let mut all_urls = registry.urls();
    for url in urls {
        if !all_urls.contains(url) {
            all_urls.push(url.clone());
        }
    }

    tokio::fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("creating {}", data_dir.display()))?;

    let data_dir = data_dir.to_path_buf();
    let mut results = stream::iter(all_urls)
        .map(|url| {
            let data_dir = data_dir.clone();
            async move {
                let join = tokio::task::spawn_blocking({
                    let url = url.clone();
                    move || clone_or_pull(&url, &data_dir)
                })
                .await;
                match join {
                    Ok(Ok(repo)) => {
                        info!("synced {} at {}", repo.selector(), repo.repo_path.display());
                        Some(repo)
                    }
                    Ok(Err(e)) => {
                        error!("failed to sync {url}: {e:#}");
                        None
                    }
                    Err(e) => {
                        error!("sync task for {url} panicked: {e}");
                        None
                    }
                }
            }
        })
        .buffer_unordered(max_workers.max(1));

    let mut synced = Vec::new();
    while let Some(result) = results.next().await {
        if let Some(repo) = result {
            synced.push(repo);
        }
    }

    registry.record_synced(&synced);
    registry.save()?;
    Ok(synced)
}

/// Clones `url` under the data directory, or fast-forwards an existing
/// checkout.
pub fn clone_or_pull(url: &str, data_dir: &Path) -> Result<Repository> {
    let repo = Repository::from_remote_url(url, data_dir)?;

    if repo.repo_path.join(".git").exists() {
        info!("updating existing checkout {}", repo.selector());
        fast_forward(&repo.repo_path).with_context(|| format!("updating {}", repo.selector()))?;
    } else {
        info!("cloning {} into {}", url, repo.repo_path.display());
        if let Some(parent) = repo.repo_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        git2::Repository::clone(url, &repo.repo_path).with_context(|| format!("cloning {url}"))?;
    }

    Ok(repo)
}

/// Fetches origin and fast-forwards the current branch. A diverged local
/// checkout is an error rather than a merge.
fn fast_forward(path: &Path) -> Result<()> {
    let repo = git2::Repository::open(path)?;
    let mut remote = repo.find_remote("origin")?;
    remote.fetch(&[] as &[&str], None, None)?;

    let fetch_head = repo.find_reference("FETCH_HEAD")?;
    let fetch_commit = repo.reference_to_annotated_commit(&fetch_head)?;
    let (analysis, _) = repo.merge_analysis(&[&fetch_commit])?;

    if analysis.is_up_to_date() {
        return Ok(());
    }
    if !analysis.is_fast_forward() {
        bail!("local checkout has diverged from origin; refusing a non-fast-forward update");
    }

    let head = repo.head()?;
    let ref_name = head
        .name()
        .map(str::to_owned)
        .context("HEAD is not a named reference")?;

    let mut reference = repo.find_reference(&ref_name)?;
    reference.set_target(fetch_commit.id(), "fast-forward")?;
    repo.set_head(&ref_name)?;
    repo.checkout_head(Some(git2::build::CheckoutBuilder::default().force()))?;
    Ok(())
}
