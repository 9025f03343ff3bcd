// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turning new feed entries into indexed transcripts.

use std::path::{Path, PathBuf};

use crate::episode::{
    EpisodeTitle, INTERMEDIATE_EXTENSION, audio_filename, download_episode, move_into_place,
    normalize_name, prepend_header, transcript_header,
};
use crate::error::{FeedError, ItemError};
use crate::feed::{Episode, load_feed};
use crate::http::HttpClient;
use crate::media::{Transcoder, Transcriber, transcript_path};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::state::create_item_plan;
use crate::store::{EpisodeIndex, EpisodeRecord, StoreLayout};

/// Downloaded audio and the transcoder's output for one processed entry
///
/// Kept on disk until the run's results are durably published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralArtifacts {
    pub audio: PathBuf,
    pub intermediate: PathBuf,
}

impl EphemeralArtifacts {
    pub(crate) fn for_title(download_dir: &Path, title: &str) -> Self {
        Self {
            audio: download_dir.join(audio_filename(title)),
            intermediate: download_dir.join(format!(
                "{}.{INTERMEDIATE_EXTENSION}",
                normalize_name(title)
            )),
        }
    }

    pub fn paths(&self) -> [&Path; 2] {
        [&self.audio, &self.intermediate]
    }

    /// Delete whichever of the files exist; returns how many were removed
    pub async fn remove(&self) -> usize {
        let mut removed = 0;
        for path in self.paths() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove file");
                }
            }
        }
        removed
    }
}

/// An entry that could not be processed; it stays unindexed and is retried next run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub guid: String,
    pub title: String,
    pub error: String,
}

/// Outcome of processing one feed
#[derive(Debug, Clone, Default)]
pub struct ProcessReport {
    pub feed_title: String,
    /// Artifacts of successfully processed entries, awaiting cleanup
    pub ephemeral: Vec<EphemeralArtifacts>,
    /// Guids indexed during this run, in feed order
    pub processed: Vec<String>,
    /// Entries skipped because their guid was already indexed or repeated
    pub skipped: usize,
    pub failed: Vec<ItemFailure>,
}

impl ProcessReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Drives download, transcode, transcribe, organize and index per new entry
pub struct FeedProcessor<'a> {
    http: &'a dyn HttpClient,
    transcoder: &'a dyn Transcoder,
    transcriber: &'a dyn Transcriber,
    layout: &'a StoreLayout,
    download_dir: &'a Path,
    reporter: SharedProgressReporter,
}

impl<'a> FeedProcessor<'a> {
    pub fn new(
        http: &'a dyn HttpClient,
        transcoder: &'a dyn Transcoder,
        transcriber: &'a dyn Transcriber,
        layout: &'a StoreLayout,
        download_dir: &'a Path,
        reporter: SharedProgressReporter,
    ) -> Self {
        Self {
            http,
            transcoder,
            transcriber,
            layout,
            download_dir,
            reporter,
        }
    }

    /// Process every new entry of the feed at `feed_source`, in document order
    ///
    /// Only a feed that cannot be loaded is an error; entry failures are
    /// collected in the report.
    pub async fn process_feed(
        &self,
        feed_source: &str,
        index: &mut dyn EpisodeIndex,
        limit: Option<usize>,
    ) -> Result<ProcessReport, FeedError> {
        self.reporter.report(ProgressEvent::FetchingFeed {
            source: feed_source.to_string(),
        });

        let podcast = load_feed(self.http, feed_source).await?;
        let total_items = podcast.episodes.len();
        let plan = create_item_plan(podcast.episodes, &*index, limit);

        tracing::info!(
            feed = %podcast.title,
            total_items,
            considered = plan.considered,
            new_items = plan.to_process.len(),
            without_enclosure = podcast.skipped_items,
            invalid_enclosure = podcast.invalid_items.len(),
            "feed loaded"
        );

        self.reporter.report(ProgressEvent::FeedParsed {
            feed_title: podcast.title.clone(),
            total_items,
            new_items: plan.to_process.len(),
        });

        let mut report = ProcessReport {
            feed_title: podcast.title,
            skipped: plan.already_indexed.len() + plan.duplicates,
            ..ProcessReport::default()
        };

        for invalid in podcast.invalid_items {
            self.reporter.report(ProgressEvent::ItemFailed {
                title: invalid.title.clone(),
                error: invalid.error.clone(),
            });
            report.failed.push(ItemFailure {
                guid: invalid.guid,
                title: invalid.title,
                error: invalid.error,
            });
        }

        let selected = plan.to_process.len();
        for (item_index, episode) in plan.to_process.iter().enumerate() {
            self.reporter.report(ProgressEvent::ItemStarted {
                item_index,
                total_items: selected,
                title: episode.title.clone(),
            });

            match self.process_item(episode, index).await {
                Ok((artifacts, location)) => {
                    tracing::info!(guid = %episode.guid, transcript = %location, "processed");
                    self.reporter.report(ProgressEvent::ItemCompleted {
                        title: episode.title.clone(),
                        transcript_location: location,
                    });
                    report.processed.push(episode.guid.clone());
                    report.ephemeral.push(artifacts);
                }
                Err(e) => {
                    tracing::warn!(guid = %episode.guid, title = %episode.title, error = %e, "entry failed");
                    self.reporter.report(ProgressEvent::ItemFailed {
                        title: episode.title.clone(),
                        error: e.to_string(),
                    });
                    report.failed.push(ItemFailure {
                        guid: episode.guid.clone(),
                        title: episode.title.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Run one entry end to end; on failure every file it created is removed
    async fn process_item(
        &self,
        episode: &Episode,
        index: &mut dyn EpisodeIndex,
    ) -> Result<(EphemeralArtifacts, String), ItemError> {
        let title = EpisodeTitle::parse(&episode.title);
        if title.is_malformed() {
            return Err(ItemError::MalformedTitle {
                title: episode.title.clone(),
            });
        }

        let artifacts = EphemeralArtifacts::for_title(self.download_dir, &episode.title);
        let staging_prefix = self.download_dir.join(normalize_name(&episode.title));

        match self
            .transcribe_and_record(episode, &title, &artifacts, &staging_prefix, index)
            .await
        {
            Ok(location) => Ok((artifacts, location)),
            Err(e) => {
                artifacts.remove().await;
                let _ = tokio::fs::remove_file(transcript_path(&staging_prefix)).await;
                Err(e)
            }
        }
    }

    async fn transcribe_and_record(
        &self,
        episode: &Episode,
        title: &EpisodeTitle,
        artifacts: &EphemeralArtifacts,
        staging_prefix: &Path,
        index: &mut dyn EpisodeIndex,
    ) -> Result<String, ItemError> {
        download_episode(self.http, episode, &artifacts.audio, &self.reporter).await?;

        self.reporter.report(ProgressEvent::Transcoding {
            title: episode.title.clone(),
        });
        self.transcoder
            .transcode(&artifacts.audio, &artifacts.intermediate)
            .await
            .map_err(ItemError::Transcode)?;

        self.reporter.report(ProgressEvent::Transcribing {
            title: episode.title.clone(),
        });
        let staged = self
            .transcriber
            .transcribe(&artifacts.intermediate, staging_prefix)
            .await
            .map_err(ItemError::Transcribe)?;

        if !staged.is_file() {
            return Err(ItemError::TranscriptMissing { path: staged });
        }

        let header = transcript_header(&title.item_name, episode.link.as_deref());
        prepend_header(&staged, &header).await?;

        let (destination, location) = self.layout.transcript_location(
            &normalize_name(&title.collection_name),
            &normalize_name(&title.item_name),
        );
        move_into_place(&staged, &destination).await?;

        index.upsert(EpisodeRecord::from_episode(episode, title, location.clone()))?;

        Ok(location)
    }
}
