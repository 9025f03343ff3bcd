// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::IndexError;

use super::layout::StoreLayout;
use super::record::EpisodeRecord;

/// Metadata index of processed episodes, keyed by guid
///
/// Holds at most one record per guid. The pipeline receives the index as an
/// explicit handle so tests can substitute [`MemoryIndex`].
pub trait EpisodeIndex: Send {
    fn contains(&self, guid: &str) -> bool;

    fn get(&self, guid: &str) -> Option<&EpisodeRecord>;

    /// Insert or replace the record stored under `record.guid`
    fn upsert(&mut self, record: EpisodeRecord) -> Result<(), IndexError>;

    /// All records, in no particular order
    fn records(&self) -> Vec<EpisodeRecord>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index persisted as one JSON object inside the repository
///
/// Keys are serialized sorted so the file only changes when records do.
/// Every upsert is written through to disk via a temporary file and rename.
#[derive(Debug)]
pub struct JsonIndex {
    path: PathBuf,
    scratch: PathBuf,
    records: BTreeMap<String, EpisodeRecord>,
}

impl JsonIndex {
    /// Open the repository's index, writing through a scratch file that the
    /// manifest never sees
    pub fn open_in(layout: &StoreLayout) -> Result<Self, IndexError> {
        let mut index = Self::open(&layout.index_file())?;
        index.scratch = layout.index_scratch_path();
        Ok(index)
    }

    /// Open the index at `path`; a missing file is an empty index
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let records = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| IndexError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

            serde_json::from_str(&content).map_err(|e| IndexError::JsonParseFailed {
                path: path.to_path_buf(),
                source: e,
            })?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            scratch: path.with_extension("json.partial"),
            records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current records to disk
    pub fn save(&self) -> Result<(), IndexError> {
        let mut json = serde_json::to_string_pretty(&self.records)?;
        json.push('\n');

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::WriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(&self.scratch, json).map_err(|e| IndexError::WriteFailed {
            path: self.scratch.clone(),
            source: e,
        })?;
        std::fs::rename(&self.scratch, &self.path).map_err(|e| IndexError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl EpisodeIndex for JsonIndex {
    fn contains(&self, guid: &str) -> bool {
        self.records.contains_key(guid)
    }

    fn get(&self, guid: &str) -> Option<&EpisodeRecord> {
        self.records.get(guid)
    }

    fn upsert(&mut self, record: EpisodeRecord) -> Result<(), IndexError> {
        let guid = record.guid.clone();
        let previous = self.records.insert(guid.clone(), record);

        if let Err(e) = self.save() {
            // Keep memory consistent with what is on disk
            match previous {
                Some(previous) => self.records.insert(guid, previous),
                None => self.records.remove(&guid),
            };
            return Err(e);
        }

        Ok(())
    }

    fn records(&self) -> Vec<EpisodeRecord> {
        self.records.values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Volatile index for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryIndex {
    records: HashMap<String, EpisodeRecord>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EpisodeIndex for MemoryIndex {
    fn contains(&self, guid: &str) -> bool {
        self.records.contains_key(guid)
    }

    fn get(&self, guid: &str) -> Option<&EpisodeRecord> {
        self.records.get(guid)
    }

    fn upsert(&mut self, record: EpisodeRecord) -> Result<(), IndexError> {
        self.records.insert(record.guid.clone(), record);
        Ok(())
    }

    fn records(&self) -> Vec<EpisodeRecord> {
        self.records.values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
