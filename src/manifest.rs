// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Content hashing and hash manifests.
//!
//! A manifest is the set of `(relative_path, sha256)` pairs for every file
//! below a root directory. It is only a comparison aid between the local
//! and the remote copy of the index and is rebuilt from scratch each time.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::ManifestError;
use crate::store::to_slash;

const HASH_BLOCK_SIZE: usize = 64 * 1024;

/// SHA-256 of a file's bytes as lowercase hex
///
/// The file is streamed in fixed-size blocks; the digest only depends on
/// the content.
pub fn hash_file(path: &Path) -> Result<String, ManifestError> {
    let hash_failed = |e| ManifestError::HashFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = File::open(path).map_err(hash_failed)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BLOCK_SIZE];

    loop {
        let read = file.read(&mut buffer).map_err(hash_failed)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// One file in a manifest
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManifestEntry {
    /// Path relative to the manifest root, `/`-separated
    pub relative_path: String,
    pub content_hash: String,
}

impl ManifestEntry {
    fn to_line(&self) -> String {
        format!("{}:{}", self.relative_path, self.content_hash)
    }
}

/// Sorted set of manifest entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeSet<ManifestEntry>,
}

/// Entries present on only one side of a comparison
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    pub local_only: Vec<ManifestEntry>,
    pub remote_only: Vec<ManifestEntry>,
}

impl ManifestDiff {
    pub fn is_empty(&self) -> bool {
        self.local_only.is_empty() && self.remote_only.is_empty()
    }
}

impl Manifest {
    /// Hash every regular file below `root`
    ///
    /// A missing root yields an empty manifest. Any unreadable file aborts
    /// the scan.
    pub fn scan(root: &Path) -> Result<Self, ManifestError> {
        let mut entries = BTreeSet::new();

        if !root.exists() {
            return Ok(Self { entries });
        }

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| ManifestError::WalkFailed {
                root: root.to_path_buf(),
                source: e,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or_else(|_| entry.path());

            entries.insert(ManifestEntry {
                relative_path: to_slash(relative),
                content_hash: hash_file(entry.path())?,
            });
        }

        Ok(Self { entries })
    }

    /// Parse the newline-delimited `relative_path:digest` form
    ///
    /// The digest is taken after the last colon so paths may contain colons.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let mut entries = BTreeSet::new();

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some((path, hash)) = line.rsplit_once(':') else {
                return Err(ManifestError::MalformedLine {
                    line: number + 1,
                    content: line.to_string(),
                });
            };

            if path.is_empty() || hash.is_empty() {
                return Err(ManifestError::MalformedLine {
                    line: number + 1,
                    content: line.to_string(),
                });
            }

            entries.insert(ManifestEntry {
                relative_path: path.to_string(),
                content_hash: hash.to_string(),
            });
        }

        Ok(Self { entries })
    }

    pub fn read(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|e| ManifestError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&text)
    }

    /// Sorted serialized form, one entry per line
    pub fn serialize(&self) -> String {
        self.entries
            .iter()
            .map(ManifestEntry::to_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn write(&self, path: &Path) -> Result<(), ManifestError> {
        std::fs::write(path, self.serialize()).map_err(|e| ManifestError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Symmetric difference between this (local) manifest and `remote`
    pub fn diff(&self, remote: &Manifest) -> ManifestDiff {
        ManifestDiff {
            local_only: self.entries.difference(&remote.entries).cloned().collect(),
            remote_only: remote.entries.difference(&self.entries).cloned().collect(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
