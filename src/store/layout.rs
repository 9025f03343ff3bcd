// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

pub const DEFAULT_TRANSCRIPTS_DIR: &str = "transcribed";
pub const DEFAULT_INDEX_DIR: &str = "index";
pub const DEFAULT_ARCHIVE_FILE: &str = "podcast_history.html";
pub const DEFAULT_MANIFEST_FILE: &str = "index_hashes.txt";

const INDEX_FILENAME: &str = "episodes.json";
const INDEX_SCRATCH_FILENAME: &str = ".episodes.json.partial";
const README_FILENAME: &str = "README.md";

/// Where the managed artifacts live inside the repository working tree
///
/// All locations except the root are kept relative so they can be handed
/// to git as pathspecs and embedded in published URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
    transcripts: PathBuf,
    index_dir: PathBuf,
    archive: PathBuf,
    manifest: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            transcripts: PathBuf::from(DEFAULT_TRANSCRIPTS_DIR),
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            archive: PathBuf::from(DEFAULT_ARCHIVE_FILE),
            manifest: PathBuf::from(DEFAULT_MANIFEST_FILE),
        }
    }

    pub fn with_transcripts(mut self, relative: impl Into<PathBuf>) -> Self {
        self.transcripts = relative.into();
        self
    }

    pub fn with_index_dir(mut self, relative: impl Into<PathBuf>) -> Self {
        self.index_dir = relative.into();
        self
    }

    pub fn with_archive(mut self, relative: impl Into<PathBuf>) -> Self {
        self.archive = relative.into();
        self
    }

    pub fn with_manifest(mut self, relative: impl Into<PathBuf>) -> Self {
        self.manifest = relative.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn transcripts_rel(&self) -> &Path {
        &self.transcripts
    }

    pub fn index_rel(&self) -> &Path {
        &self.index_dir
    }

    pub fn archive_rel(&self) -> &Path {
        &self.archive
    }

    pub fn manifest_rel(&self) -> &Path {
        &self.manifest
    }

    pub fn transcripts_root(&self) -> PathBuf {
        self.root.join(&self.transcripts)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join(&self.index_dir)
    }

    pub fn index_file(&self) -> PathBuf {
        self.root.join(self.index_file_rel())
    }

    pub fn index_file_rel(&self) -> PathBuf {
        self.index_dir.join(INDEX_FILENAME)
    }

    /// Temporary file for index writes, outside the hashed index directory
    pub fn index_scratch_path(&self) -> PathBuf {
        self.root.join(INDEX_SCRATCH_FILENAME)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.root.join(&self.archive)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.manifest)
    }

    pub fn readme_path(&self) -> PathBuf {
        self.root.join(README_FILENAME)
    }

    pub fn readme_rel(&self) -> &Path {
        Path::new(README_FILENAME)
    }

    /// Location of a transcript for already-normalized collection and item names
    ///
    /// Returns the absolute path and the `/`-separated repository-relative
    /// location recorded in the index.
    pub fn transcript_location(&self, collection: &str, item: &str) -> (PathBuf, String) {
        let filename = format!("{item}.txt");
        let absolute = self.transcripts_root().join(collection).join(&filename);
        let relative = format!(
            "{}/{}/{}",
            to_slash(&self.transcripts),
            collection,
            filename
        );
        (absolute, relative)
    }

    /// Create the transcript and index directories when missing
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.transcripts_root())?;
        std::fs::create_dir_all(self.index_dir())
    }
}

/// Render a relative path with `/` separators regardless of platform
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
