// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Run configuration.
//!
//! Settings are read from a JSON file into [`RawConfig`], overridden from
//! the command line, and validated exactly once into the immutable
//! [`Config`] that the rest of the crate receives by reference.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::store::{
    DEFAULT_ARCHIVE_FILE, DEFAULT_INDEX_DIR, DEFAULT_MANIFEST_FILE, DEFAULT_TRANSCRIPTS_DIR,
    StoreLayout,
};

pub const DEFAULT_CONFIG_FILE: &str = "podscribe.json";
const DEFAULT_REPO_ROOT: &str = "~/podscribe";
const DEFAULT_DOWNLOAD_DIR: &str = "~/podscribe-audio";
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_COMMIT_MESSAGE: &str = "Update episode index, archive, and transcripts";

/// Settings for the external audio transcoder
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranscoderSettings {
    pub program: String,
    pub sample_rate: u32,
    pub channels: u8,
    pub codec: String,
    /// Overwrite an existing intermediate file instead of prompting
    pub overwrite: bool,
}

impl Default for TranscoderSettings {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            sample_rate: 16_000,
            channels: 1,
            codec: "pcm_s16le".to_string(),
            overwrite: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawTranscriber {
    pub program: Option<String>,
    pub model: Option<String>,
}

/// Settings for the external speech-to-text tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriberSettings {
    pub program: PathBuf,
    pub model: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawGitHub {
    pub owner: Option<String>,
    pub repository: Option<String>,
    pub private: bool,
    pub create_if_missing: bool,
    pub enable_pages: bool,
}

/// Hosting provider account and repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubSettings {
    pub owner: String,
    pub repository: String,
    pub token: String,
    pub private: bool,
    pub create_if_missing: bool,
    pub enable_pages: bool,
}

impl GitHubSettings {
    pub fn ssh_remote(&self) -> String {
        format!("git@github.com:{}/{}.git", self.owner, self.repository)
    }

    pub fn pages_url(&self) -> String {
        format!("https://{}.github.io/{}", self.owner, self.repository)
    }
}

/// Where and how artifacts are published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    pub remote_url: String,
    pub branch: String,
    pub commit_message: String,
    pub github: Option<GitHubSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutSettings {
    pub command_secs: u64,
    pub transcribe_secs: u64,
    pub http_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            command_secs: 300,
            transcribe_secs: 4 * 60 * 60,
            http_secs: 60,
        }
    }
}

/// Unvalidated settings as found in the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    pub feed: Option<String>,
    pub repo_root: Option<String>,
    pub download_dir: Option<String>,
    pub transcripts_dir: Option<String>,
    pub index_dir: Option<String>,
    pub archive_file: Option<String>,
    pub manifest_file: Option<String>,
    pub item_limit: Option<usize>,
    pub delete_audio: Option<bool>,
    pub publish: Option<bool>,
    pub remote_url: Option<String>,
    pub branch: Option<String>,
    pub commit_message: Option<String>,
    pub github_token: Option<String>,
    pub github: Option<RawGitHub>,
    pub transcoder: TranscoderSettings,
    pub transcriber: RawTranscriber,
    pub timeouts: TimeoutSettings,
}

impl RawConfig {
    /// Load settings from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load settings from a JSON file, or start empty when it does not exist
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Validated, immutable run configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub feed: String,
    pub layout: StoreLayout,
    pub download_dir: PathBuf,
    pub item_limit: Option<usize>,
    pub delete_audio: bool,
    pub transcoder: TranscoderSettings,
    pub transcriber: TranscriberSettings,
    /// `None` when publishing is disabled
    pub publish: Option<PublishSettings>,
    pub command_timeout: Duration,
    pub transcribe_timeout: Duration,
    pub http_timeout: Duration,
}

impl Config {
    pub fn repo_root(&self) -> &Path {
        self.layout.root()
    }

    pub fn github(&self) -> Option<&GitHubSettings> {
        self.publish.as_ref().and_then(|p| p.github.as_ref())
    }

    /// Validate raw settings and resolve paths
    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let feed = non_empty(raw.feed).ok_or(ConfigError::Missing("feed"))?;

        let repo_root = expand(raw.repo_root.as_deref().unwrap_or(DEFAULT_REPO_ROOT));
        let download_dir = expand(raw.download_dir.as_deref().unwrap_or(DEFAULT_DOWNLOAD_DIR));

        let layout = StoreLayout::new(repo_root)
            .with_transcripts(relative_setting(
                "transcripts_dir",
                raw.transcripts_dir.as_deref(),
                DEFAULT_TRANSCRIPTS_DIR,
            )?)
            .with_index_dir(relative_setting(
                "index_dir",
                raw.index_dir.as_deref(),
                DEFAULT_INDEX_DIR,
            )?)
            .with_archive(relative_setting(
                "archive_file",
                raw.archive_file.as_deref(),
                DEFAULT_ARCHIVE_FILE,
            )?)
            .with_manifest(relative_setting(
                "manifest_file",
                raw.manifest_file.as_deref(),
                DEFAULT_MANIFEST_FILE,
            )?);

        if raw.item_limit == Some(0) {
            return Err(ConfigError::Invalid {
                field: "item_limit",
                reason: "must be at least 1 when set".to_string(),
            });
        }

        if raw.transcoder.sample_rate == 0 || raw.transcoder.channels == 0 {
            return Err(ConfigError::Invalid {
                field: "transcoder",
                reason: "sample_rate and channels must be positive".to_string(),
            });
        }

        let transcriber = TranscriberSettings {
            program: expand(
                non_empty(raw.transcriber.program)
                    .as_deref()
                    .unwrap_or("whisper-cli"),
            ),
            model: expand(
                &non_empty(raw.transcriber.model).ok_or(ConfigError::Missing("transcriber.model"))?,
            ),
        };

        let publish = if raw.publish.unwrap_or(true) {
            let github = match raw.github {
                Some(github) => Some(GitHubSettings {
                    owner: non_empty(github.owner).ok_or(ConfigError::Missing("github.owner"))?,
                    repository: non_empty(github.repository)
                        .ok_or(ConfigError::Missing("github.repository"))?,
                    token: non_empty(raw.github_token)
                        .ok_or(ConfigError::Missing("github_token"))?,
                    private: github.private,
                    create_if_missing: github.create_if_missing,
                    enable_pages: github.enable_pages,
                }),
                None => None,
            };

            let remote_url = non_empty(raw.remote_url)
                .or_else(|| github.as_ref().map(GitHubSettings::ssh_remote))
                .ok_or(ConfigError::Missing("remote_url"))?;

            Some(PublishSettings {
                remote_url,
                branch: non_empty(raw.branch).unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
                commit_message: non_empty(raw.commit_message)
                    .unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string()),
                github,
            })
        } else {
            None
        };

        let timeouts = raw.timeouts;
        if timeouts.command_secs == 0 || timeouts.transcribe_secs == 0 || timeouts.http_secs == 0
        {
            return Err(ConfigError::Invalid {
                field: "timeouts",
                reason: "every timeout must be positive".to_string(),
            });
        }

        Ok(Self {
            feed,
            layout,
            download_dir,
            item_limit: raw.item_limit,
            delete_audio: raw.delete_audio.unwrap_or(true),
            transcoder: raw.transcoder,
            transcriber,
            publish,
            command_timeout: Duration::from_secs(timeouts.command_secs),
            transcribe_timeout: Duration::from_secs(timeouts.transcribe_secs),
            http_timeout: Duration::from_secs(timeouts.http_secs),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// A path inside the repository: relative, non-empty, never escaping the root
fn relative_setting(
    field: &'static str,
    value: Option<&str>,
    default: &str,
) -> Result<PathBuf, ConfigError> {
    let path = PathBuf::from(value.unwrap_or(default).trim());

    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

    if path.as_os_str().is_empty() || escapes {
        return Err(ConfigError::Invalid {
            field,
            reason: format!(
                "'{}' must be a relative path inside the repository",
                path.display()
            ),
        });
    }

    Ok(path)
}
