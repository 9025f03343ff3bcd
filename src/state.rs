use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::episode::PARTIAL_SUFFIX;
use crate::error::StateError;
use crate::feed::Episode;
use crate::store::EpisodeIndex;

/// State of the download directory at the start of a run
#[derive(Debug, Clone)]
pub struct WorkDir {
    /// The download directory path
    pub path: PathBuf,
    /// Number of partial files that were cleaned up during scan
    pub partial_files_cleaned: usize,
}

/// Plan for a run, indicating which feed entries need processing
#[derive(Debug, Clone)]
pub struct ItemPlan {
    /// Entries whose guid is not yet indexed, in feed order
    pub to_process: Vec<Episode>,
    /// Entries already present in the index
    pub already_indexed: Vec<Episode>,
    /// Later occurrences of a guid already planned in this run
    pub duplicates: usize,
    /// Number of entries considered after applying the item limit
    pub considered: usize,
}

/// Prepare the download directory
///
/// Creates the directory if needed and removes `.partial` files left behind
/// by interrupted downloads. Finished audio from a run whose publish failed
/// is left alone.
pub fn prepare_work_dir(dir: &Path) -> Result<WorkDir, StateError> {
    let mut partial_files_cleaned = 0;

    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| StateError::CreateDirectoryFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

        return Ok(WorkDir {
            path: dir.to_path_buf(),
            partial_files_cleaned,
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| StateError::ReadDirectoryFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| StateError::ReadDirectoryFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();
        let is_partial = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX));

        if is_partial && path.is_file() && std::fs::remove_file(&path).is_ok() {
            partial_files_cleaned += 1;
        }
    }

    Ok(WorkDir {
        path: dir.to_path_buf(),
        partial_files_cleaned,
    })
}

/// Create an item plan by comparing feed entries against the index
///
/// The limit bounds how many feed entries are looked at, counted in
/// document order before the index is consulted. An entry is processed when
/// its guid is neither indexed nor already planned earlier in the feed.
pub fn create_item_plan(
    episodes: Vec<Episode>,
    index: &dyn EpisodeIndex,
    limit: Option<usize>,
) -> ItemPlan {
    let limit = limit.unwrap_or(usize::MAX);
    let mut planned = HashSet::new();
    let mut to_process = Vec::new();
    let mut already_indexed = Vec::new();
    let mut duplicates = 0;
    let mut considered = 0;

    for episode in episodes.into_iter().take(limit) {
        considered += 1;

        if index.contains(&episode.guid) {
            already_indexed.push(episode);
        } else if planned.insert(episode.guid.clone()) {
            to_process.push(episode);
        } else {
            duplicates += 1;
        }
    }

    ItemPlan {
        to_process,
        already_indexed,
        duplicates,
        considered,
    }
}
