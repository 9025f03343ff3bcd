// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Opt-in removal of local and remote state.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::CleanError;
use crate::hosting::RepositoryHost;
use crate::lock::{LOCK_FILE, RunLock};

/// What to delete; nothing is removed unless asked for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanOptions {
    /// Contents of the download directory
    pub downloads: bool,
    pub index: bool,
    pub manifest: bool,
    pub archive: bool,
    pub transcripts: bool,
    /// The repository's `.git` directory
    pub git_dir: bool,
    /// The repository on the hosting provider
    pub remote: bool,
    /// Confirms irreversible remote deletion
    pub force: bool,
}

impl CleanOptions {
    pub fn is_empty(&self) -> bool {
        !(self.downloads
            || self.index
            || self.manifest
            || self.archive
            || self.transcripts
            || self.git_dir
            || self.remote)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Paths that existed and were removed
    pub removed: Vec<PathBuf>,
    pub remote_deleted: bool,
}

/// Delete the selected state while holding the run lock
pub async fn clean(
    config: &Config,
    host: Option<&dyn RepositoryHost>,
    options: &CleanOptions,
) -> Result<CleanReport, CleanError> {
    // Validate before touching anything
    let host = if options.remote {
        if !options.force {
            return Err(CleanError::RemoteNeedsForce);
        }
        Some(host.ok_or(CleanError::NoHost)?)
    } else {
        None
    };

    let _lock = RunLock::acquire_in(&config.download_dir)?;
    let layout = &config.layout;
    let mut report = CleanReport::default();

    if options.downloads {
        clear_directory(&config.download_dir, &mut report)?;
    }

    let targets = [
        (options.index, layout.index_dir()),
        (options.manifest, layout.manifest_path()),
        (options.archive, layout.archive_path()),
        (options.transcripts, layout.transcripts_root()),
        (options.git_dir, layout.root().join(".git")),
    ];
    for (selected, path) in targets {
        if selected && remove_path(&path)? {
            report.removed.push(path);
        }
    }

    if let Some(host) = host {
        if host.repository_exists().await? {
            host.delete_repository().await?;
            tracing::warn!("deleted remote repository");
            report.remote_deleted = true;
        } else {
            tracing::info!("remote repository does not exist");
        }
    }

    Ok(report)
}

/// Remove a file or directory tree; returns whether it existed
fn remove_path(path: &Path) -> Result<bool, CleanError> {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => Err(e),
    };

    result.map_err(|e| CleanError::RemoveFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::info!(path = %path.display(), "removed");
    Ok(true)
}

/// Empty the download directory, keeping the held lock file
fn clear_directory(dir: &Path, report: &mut CleanReport) -> Result<(), CleanError> {
    let entries = std::fs::read_dir(dir).map_err(|e| CleanError::RemoveFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| CleanError::RemoveFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if entry.file_name() == LOCK_FILE {
            continue;
        }

        let path = entry.path();
        if remove_path(&path)? {
            report.removed.push(path);
        }
    }
    Ok(())
}
