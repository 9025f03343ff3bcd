// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when fetching or parsing RSS feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse RSS feed: {0}")]
    ParseFailed(#[from] rss::Error),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Episode '{title}' has no enclosure (audio file)")]
    MissingEnclosure { title: String },

    #[error("Episode '{title}' has an invalid enclosure URL {url:?}: {source}")]
    InvalidEnclosure {
        title: String,
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Errors that can occur during episode downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} into place at {to}: {source}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors raised by external programs (git, transcoder, transcriber)
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to start `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` did not finish within {}s", .timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },

    #[error("`{command}` exited with {}: {stderr}", describe_exit(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Errors raised by the episode index
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read episode index {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write episode index {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse episode index JSON in {path}: {source}")]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize episode index: {0}")]
    JsonSerializeFailed(#[from] serde_json::Error),
}

/// Errors raised while building, reading or writing a hash manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to walk {root}: {source}")]
    WalkFailed {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to hash {path}: {source}")]
    HashFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read manifest {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write manifest {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed manifest line {line}: '{content}'")]
    MalformedLine { line: usize, content: String },
}

/// Errors returned by the repository hosting provider
#[derive(Error, Debug)]
pub enum HostingError {
    #[error("{resource} was not found on the hosting provider")]
    NotFound { resource: String },

    #[error("Request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Hosting provider answered {status} for {url}: {body}")]
    UnexpectedStatus {
        url: String,
        status: u16,
        body: String,
    },
}

impl HostingError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HostingError::NotFound { .. })
    }
}

/// Errors that abort reconciliation of the local index with the remote
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to fetch remote manifest: {0}")]
    RemoteManifest(#[source] HostingError),

    #[error("Failed to store remote manifest at {path}: {source}")]
    TempFileFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Failed to {step}: {source}")]
    Git {
        step: &'static str,
        #[source]
        source: CommandError,
    },
}

/// Errors that abort a publish attempt
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Required path is missing: {0}")]
    MissingPath(PathBuf),

    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git {step} failed: {source}")]
    Git {
        step: &'static str,
        #[source]
        source: CommandError,
    },

    #[error("`{command}` printed unexpected output: {output:?}")]
    UnexpectedOutput { command: String, output: String },

    #[error("{pull}; local changes remain in the stash because restoring them failed: {stash}")]
    StashNotRestored {
        #[source]
        pull: Box<PublishError>,
        stash: Box<PublishError>,
    },
}

/// Errors raised while turning on the published site after a publish
#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Failed to enable pages: {0}")]
    Pages(#[from] HostingError),

    #[error("Failed to update {path}: {source}")]
    ReadmeFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to publish README: {0}")]
    Publish(#[from] PublishError),
}

/// Errors raised while preparing the local repository before a run
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("git is not available: {0}")]
    GitUnavailable(#[source] CommandError),

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to {step}: {source}")]
    Git {
        step: &'static str,
        #[source]
        source: CommandError,
    },

    #[error("Hosting error: {0}")]
    Hosting(#[from] HostingError),
}

/// Errors that can occur when scanning the download directory
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required setting `{0}`")]
    Missing(&'static str),

    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors raised by the maintenance `clean` command
#[derive(Error, Debug)]
pub enum CleanError {
    #[error("Deleting the remote repository requires --force")]
    RemoteNeedsForce,

    #[error("Deleting the remote repository requires GitHub settings")]
    NoHost,

    #[error("Failed to remove {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Hosting error: {0}")]
    Hosting(#[from] HostingError),
}

/// Errors raised while acquiring the run lock
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Failed to open lock file {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Another run holds the lock at {path}")]
    Held { path: PathBuf },
}

/// Failure of a single feed entry; never aborts the run
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("Malformed title '{title}': no collection name")]
    MalformedTitle { title: String },

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Transcoding failed: {0}")]
    Transcode(#[source] CommandError),

    #[error("Transcription failed: {0}")]
    Transcribe(#[source] CommandError),

    #[error("Transcriber produced no transcript at {path}")]
    TranscriptMissing { path: PathBuf },

    #[error("Failed to update transcript {path}: {source}")]
    TranscriptFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

/// Fatal errors that abort a whole pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Repository setup failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Failed to create store directories under {path}: {source}")]
    StoreFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive {path}: {source}")]
    ArchiveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
