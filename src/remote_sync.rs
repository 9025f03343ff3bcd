// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciliation of the local index with the published one.

use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::git::{GitRunner, run_checked};
use crate::hosting::RepositoryHost;
use crate::manifest::Manifest;
use crate::store::{StoreLayout, to_slash};

/// Prefix of the temporary copy of the remote manifest
const REMOTE_COPY_PREFIX: &str = "remote_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Local index matches the published manifest
    UpToDate,
    /// Nothing has been published yet
    Bootstrap,
    /// The index subtree was replaced by the remote version
    Synced {
        local_only: usize,
        remote_only: usize,
    },
}

/// Removes the file when dropped
struct TempFile(PathBuf);

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.0.display(), error = %e, "failed to remove temporary file");
        }
    }
}

fn remote_copy_path(layout: &StoreLayout) -> PathBuf {
    let name = layout
        .manifest_rel()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    layout.root().join(format!("{REMOTE_COPY_PREFIX}{name}"))
}

/// Bring the local index in line with the published manifest
///
/// The remote wins: when the index subtree's hashes differ from the
/// published manifest, the subtree is checked out from `origin/<branch>`.
/// A missing remote manifest means nothing was published yet.
pub async fn pull_and_sync(
    host: &dyn RepositoryHost,
    git: &dyn GitRunner,
    layout: &StoreLayout,
    branch: &str,
) -> Result<SyncStatus, SyncError> {
    let manifest_rel = to_slash(layout.manifest_rel());

    let bytes = match host.fetch_raw(&manifest_rel, branch).await {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => {
            tracing::info!(manifest = %manifest_rel, "no published manifest; nothing to sync");
            return Ok(SyncStatus::Bootstrap);
        }
        Err(e) => return Err(SyncError::RemoteManifest(e)),
    };

    let temp_path = remote_copy_path(layout);
    let _guard = TempFile(temp_path.clone());
    std::fs::write(&temp_path, &bytes).map_err(|e| SyncError::TempFileFailed {
        path: temp_path.clone(),
        source: e,
    })?;

    let remote = Manifest::read(&temp_path)?;
    let local = Manifest::scan(&layout.index_dir())?;

    let diff = local.diff(&remote);
    if diff.is_empty() {
        tracing::debug!(entries = local.len(), "local index matches published manifest");
        return Ok(SyncStatus::UpToDate);
    }

    for entry in &diff.local_only {
        tracing::info!(path = %entry.relative_path, hash = %entry.content_hash, "only in local index");
    }
    for entry in &diff.remote_only {
        tracing::info!(path = %entry.relative_path, hash = %entry.content_hash, "only in published index");
    }

    restore_index(git, layout.index_rel(), branch).await?;

    Ok(SyncStatus::Synced {
        local_only: diff.local_only.len(),
        remote_only: diff.remote_only.len(),
    })
}

async fn restore_index(git: &dyn GitRunner, index_rel: &Path, branch: &str) -> Result<(), SyncError> {
    run_checked(git, &["fetch", "origin"])
        .await
        .map_err(|source| SyncError::Git {
            step: "fetch from origin",
            source,
        })?;

    let revision = format!("origin/{branch}");
    let index_rel = to_slash(index_rel);
    run_checked(git, &["checkout", revision.as_str(), "--", index_rel.as_str()])
        .await
        .map_err(|source| SyncError::Git {
            step: "check out the published index",
            source,
        })?;

    tracing::info!(revision = %revision, path = %index_rel, "restored index from remote");
    Ok(())
}
