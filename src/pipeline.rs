// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One complete run: lock, prepare, sync, process, render, publish, clean up.

use std::path::Path;

use crate::archive::{TranscriptLinks, write_archive};
use crate::config::{Config, GitHubSettings, PublishSettings};
use crate::error::{PipelineError, SiteError};
use crate::git::{
    Gateway, GitRunner, PublishOutcome, PublishSet, README_DESCRIPTION, README_PLACEHOLDER,
    RepositoryState, prepare_repository,
};
use crate::hosting::RepositoryHost;
use crate::http::HttpClient;
use crate::lock::RunLock;
use crate::manifest::Manifest;
use crate::media::{Transcoder, Transcriber};
use crate::processor::{EphemeralArtifacts, FeedProcessor, ProcessReport};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::remote_sync::{SyncStatus, pull_and_sync};
use crate::state::prepare_work_dir;
use crate::store::{EpisodeIndex, EpisodeRecord, JsonIndex, to_slash};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FATAL: i32 = 1;
pub const EXIT_PARTIAL: i32 = 2;

const SITE_COMMIT_MESSAGE: &str = "Link README to the published archive";

/// What happened to the run's changes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PublishStatus {
    /// Publishing is turned off; the local index is the durable store
    #[default]
    Disabled,
    Published,
    NoChanges,
    Failed { error: String },
}

impl PublishStatus {
    /// Whether the run's results are durable and ephemeral files may go
    pub fn is_durable(&self) -> bool {
        !matches!(self, PublishStatus::Failed { .. })
    }
}

/// Outcome of a run that was not aborted by a fatal error
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub items: ProcessReport,
    pub repository: Option<RepositoryState>,
    pub sync: Option<SyncStatus>,
    pub publish: PublishStatus,
    /// Set when enabling the site or linking the README failed
    pub site_error: Option<String>,
    pub ephemeral_removed: usize,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        if self.items.has_failures()
            || !self.publish.is_durable()
            || self.site_error.is_some()
        {
            EXIT_PARTIAL
        } else {
            EXIT_SUCCESS
        }
    }
}

/// The collaborators a run needs, all borrowed for its duration
pub struct Pipeline<'a> {
    config: &'a Config,
    http: &'a dyn HttpClient,
    transcoder: &'a dyn Transcoder,
    transcriber: &'a dyn Transcriber,
    git: &'a dyn GitRunner,
    host: Option<&'a dyn RepositoryHost>,
    reporter: SharedProgressReporter,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        http: &'a dyn HttpClient,
        transcoder: &'a dyn Transcoder,
        transcriber: &'a dyn Transcriber,
        git: &'a dyn GitRunner,
        host: Option<&'a dyn RepositoryHost>,
        reporter: SharedProgressReporter,
    ) -> Self {
        Self {
            config,
            http,
            transcoder,
            transcriber,
            git,
            host,
            reporter,
        }
    }

    /// Execute one run
    ///
    /// Errors are fatal conditions (lock held, repository setup, sync,
    /// feed, manifest). Failed entries and a failed publish are recorded in
    /// the report instead.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let config = self.config;
        let layout = &config.layout;

        let _lock = RunLock::acquire_in(&config.download_dir)?;

        let work_dir = prepare_work_dir(&config.download_dir)?;
        if work_dir.partial_files_cleaned > 0 {
            self.reporter.report(ProgressEvent::PartialFilesCleanedUp {
                count: work_dir.partial_files_cleaned,
            });
        }

        let mut report = RunReport::default();

        if let Some(publish) = &config.publish {
            let state = prepare_repository(self.git, self.host, publish, layout.root()).await?;
            tracing::info!(state = ?state, root = %layout.root().display(), "repository ready");
            report.repository = Some(state);

            if let Some(host) = self.host {
                self.reporter.report(ProgressEvent::Syncing);
                report.sync = Some(pull_and_sync(host, self.git, layout, &publish.branch).await?);
            }
        }

        layout
            .ensure_dirs()
            .map_err(|e| PipelineError::StoreFailed {
                path: layout.root().to_path_buf(),
                source: e,
            })?;

        let mut index = JsonIndex::open_in(layout)?;

        let processor = FeedProcessor::new(
            self.http,
            self.transcoder,
            self.transcriber,
            layout,
            &config.download_dir,
            self.reporter.clone(),
        );
        report.items = processor
            .process_feed(&config.feed, &mut index, config.item_limit)
            .await?;

        // The file must exist for publishing even when nothing was indexed yet
        index.save()?;

        let archive_path = layout.archive_path();
        write_archive(&archive_path, index.records(), &self.transcript_links())
            .map_err(|e| PipelineError::ArchiveFailed {
                path: archive_path.clone(),
                source: e,
            })?;

        Manifest::scan(&layout.index_dir())?.write(&layout.manifest_path())?;

        if let Some(publish) = &config.publish {
            report.publish = self.publish(publish).await;

            if let (Some(host), Some(github)) = (self.host, publish.github.as_ref())
                && github.enable_pages
                && report.publish.is_durable()
                && let Err(e) = self.publish_site(host, github, publish).await
            {
                tracing::warn!(error = %e, "failed to set up the published site");
                report.site_error = Some(e.to_string());
            }
        }

        report.ephemeral_removed = self.clean_up(&report, &index.records()).await;

        self.reporter.report(ProgressEvent::RunCompleted {
            processed_count: report.items.processed.len(),
            skipped_count: report.items.skipped,
            failed_count: report.items.failed.len(),
        });

        Ok(report)
    }

    fn transcript_links(&self) -> TranscriptLinks {
        match (self.config.publish.as_ref(), self.config.github()) {
            (Some(publish), Some(github)) => TranscriptLinks::Hosted {
                owner: github.owner.clone(),
                repository: github.repository.clone(),
                branch: publish.branch.clone(),
            },
            _ => TranscriptLinks::Relative,
        }
    }

    async fn publish(&self, settings: &PublishSettings) -> PublishStatus {
        self.reporter.report(ProgressEvent::Publishing);

        let layout = &self.config.layout;
        let set = PublishSet {
            required: vec![
                layout.index_file_rel(),
                layout.archive_rel().to_path_buf(),
                layout.transcripts_rel().to_path_buf(),
            ],
            optional: vec![layout.manifest_rel().to_path_buf()],
            message: settings.commit_message.clone(),
        };

        match Gateway::new(self.git, layout.root(), &settings.branch)
            .publish(&set)
            .await
        {
            Ok(PublishOutcome::Published) => PublishStatus::Published,
            Ok(PublishOutcome::NoChanges) => PublishStatus::NoChanges,
            Err(e) => {
                tracing::error!(error = %e, "publishing failed; keeping downloaded files");
                PublishStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Turn on the hosted site and point the README at the archive
    async fn publish_site(
        &self,
        host: &dyn RepositoryHost,
        github: &GitHubSettings,
        settings: &PublishSettings,
    ) -> Result<(), SiteError> {
        if !host.pages_enabled().await? {
            host.enable_pages(&settings.branch).await?;
            tracing::info!(url = %github.pages_url(), "enabled pages");
        }

        let layout = &self.config.layout;
        let archive_url = format!(
            "{}/{}",
            github.pages_url(),
            to_slash(layout.archive_rel())
        );

        if !link_readme(&layout.readme_path(), &archive_url)? {
            return Ok(());
        }

        let set = PublishSet {
            required: vec![layout.readme_rel().to_path_buf()],
            optional: Vec::new(),
            message: SITE_COMMIT_MESSAGE.to_string(),
        };
        Gateway::new(self.git, layout.root(), &settings.branch)
            .publish(&set)
            .await?;
        Ok(())
    }

    /// Delete ephemeral files when the run's results are durable
    ///
    /// Files kept by an earlier run whose publish failed are found by the
    /// names derived from the indexed records.
    async fn clean_up(&self, report: &RunReport, records: &[EpisodeRecord]) -> usize {
        let ephemeral = &report.items.ephemeral;

        if !report.publish.is_durable() {
            if !ephemeral.is_empty() {
                tracing::warn!(items = ephemeral.len(), "keeping downloaded files until a publish succeeds");
            }
            return 0;
        }
        if !self.config.delete_audio {
            return 0;
        }

        let download_dir = &self.config.download_dir;
        let kept = records
            .iter()
            .map(|record| EphemeralArtifacts::for_title(download_dir, &record.source_title));

        let mut removed = 0;
        for artifacts in ephemeral.iter().cloned().chain(kept) {
            removed += artifacts.remove().await;
        }
        if removed == 0 {
            return 0;
        }

        tracing::debug!(removed, "removed downloaded files");
        self.reporter
            .report(ProgressEvent::EphemeralFilesRemoved { count: removed });
        removed
    }
}

/// Make the README link to `archive_url`; returns whether the file changed
fn link_readme(path: &Path, archive_url: &str) -> Result<bool, SiteError> {
    let readme_failed = |source| SiteError::ReadmeFailed {
        path: path.to_path_buf(),
        source,
    };

    let current = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => README_PLACEHOLDER.to_string(),
        Err(e) => return Err(readme_failed(e)),
    };

    if current.contains(archive_url) {
        return Ok(false);
    }

    let link = format!("Browse the [podcast archive]({archive_url}).");
    let updated = if current.contains(README_DESCRIPTION) {
        current.replacen(README_DESCRIPTION, &link, 1)
    } else {
        format!("{}\n\n{link}\n", current.trim_end())
    };

    std::fs::write(path, updated).map_err(readme_failed)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::{TranscoderSettings, TranscriberSettings};
    use crate::store::StoreLayout;
    use crate::error::LockError;
    use crate::progress::NoopReporter;
    use crate::progress::recording::RecordingReporter;
    use crate::testing::{FakeHost, FakeHttp, FakeTranscoder, FakeTranscriber, ScriptedGit, feed_xml};
    use tempfile::{TempDir, tempdir};

    fn publish_settings(github: Option<GitHubSettings>) -> PublishSettings {
        PublishSettings {
            remote_url: "git@github.com:someone/archive.git".to_string(),
            branch: "main".to_string(),
            commit_message: "Update episode index".to_string(),
            github,
        }
    }

    fn github() -> GitHubSettings {
        GitHubSettings {
            owner: "someone".to_string(),
            repository: "archive".to_string(),
            token: "t".to_string(),
            private: false,
            create_if_missing: false,
            enable_pages: true,
        }
    }

    fn config(dir: &TempDir, publish: Option<PublishSettings>) -> Config {
        let root = dir.path().join("repo");
        std::fs::create_dir_all(root.join(".git")).unwrap();

        Config {
            feed: "https://example.com/feed.xml".to_string(),
            layout: StoreLayout::new(root),
            download_dir: dir.path().join("audio"),
            item_limit: None,
            delete_audio: true,
            transcoder: TranscoderSettings::default(),
            transcriber: TranscriberSettings {
                program: "whisper-cli".into(),
                model: "ggml-base.en.bin".into(),
            },
            publish,
            command_timeout: Duration::from_secs(5),
            transcribe_timeout: Duration::from_secs(5),
            http_timeout: Duration::from_secs(5),
        }
    }

    fn one_episode() -> String {
        feed_xml(&[("Show: Episode One", "ep1", "http://x/a.mp3")])
    }

    async fn run(
        config: &Config,
        http: &FakeHttp,
        transcoder: &FakeTranscoder,
        git: &ScriptedGit,
        host: Option<&FakeHost>,
    ) -> Result<RunReport, PipelineError> {
        let transcriber = FakeTranscriber::default();
        Pipeline::new(
            config,
            http,
            transcoder,
            &transcriber,
            git,
            host.map(|h| h as &dyn RepositoryHost),
            NoopReporter::shared(),
        )
        .run()
        .await
    }

    #[tokio::test]
    async fn new_episode_is_transcribed_published_and_cleaned_up() {
        let dir = tempdir().unwrap();
        let config = config(&dir, Some(publish_settings(None)));
        let http = FakeHttp::new(one_episode());
        let git = ScriptedGit::new().on(&["diff", "--cached", "--quiet"], 1, "", "");

        let report = run(&config, &http, &FakeTranscoder::default(), &git, None)
            .await
            .unwrap();

        assert_eq!(report.repository, Some(RepositoryState::Existing));
        assert_eq!(report.publish, PublishStatus::Published);
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
        assert_eq!(report.ephemeral_removed, 2);

        let layout = &config.layout;
        let transcript = layout.root().join("transcribed/Show/Episode_One.txt");
        assert!(
            std::fs::read_to_string(transcript)
                .unwrap()
                .starts_with("Episode One\n")
        );
        assert!(
            std::fs::read_to_string(layout.archive_path())
                .unwrap()
                .contains("Episode One")
        );
        assert!(
            std::fs::read_to_string(layout.manifest_path())
                .unwrap()
                .starts_with("episodes.json:")
        );
        assert!(!layout.index_scratch_path().exists());
        assert_eq!(Manifest::scan(&layout.index_dir()).unwrap().len(), 1);
        assert!(JsonIndex::open(&layout.index_file()).unwrap().contains("ep1"));

        assert!(git.called("add -- index/episodes.json"));
        assert!(git.called("add -- index_hashes.txt"));
        assert!(git.called("commit -m Update episode index"));
        assert!(git.called("push -u origin main"));
        assert!(!config.download_dir.join("Show_Episode_One.mp3").exists());
        assert!(!config.download_dir.join("Show_Episode_One.wav").exists());
    }

    #[tokio::test]
    async fn failed_publish_keeps_downloaded_files() {
        let dir = tempdir().unwrap();
        let config = config(&dir, Some(publish_settings(None)));
        let http = FakeHttp::new(one_episode());
        let git = ScriptedGit::new()
            .on(&["diff", "--cached", "--quiet"], 1, "", "")
            .on(&["push"], 1, "", "! [rejected] main -> main (fetch first)");

        let report = run(&config, &http, &FakeTranscoder::default(), &git, None)
            .await
            .unwrap();

        assert!(matches!(report.publish, PublishStatus::Failed { .. }));
        assert_eq!(report.exit_code(), EXIT_PARTIAL);
        assert_eq!(report.ephemeral_removed, 0);
        assert!(config.download_dir.join("Show_Episode_One.mp3").exists());
        assert!(config.download_dir.join("Show_Episode_One.wav").exists());
    }

    #[tokio::test]
    async fn files_kept_by_failed_publish_are_removed_after_next_publish() {
        let dir = tempdir().unwrap();
        let config = config(&dir, Some(publish_settings(None)));
        let audio = config.download_dir.join("Show_Episode_One.mp3");
        let intermediate = config.download_dir.join("Show_Episode_One.wav");

        let rejected = ScriptedGit::new()
            .on(&["diff", "--cached", "--quiet"], 1, "", "")
            .on(&["push"], 1, "", "! [remote rejected] main -> main (pre-receive hook declined)");
        let first = run(
            &config,
            &FakeHttp::new(one_episode()),
            &FakeTranscoder::default(),
            &rejected,
            None,
        )
        .await
        .unwrap();
        assert!(matches!(first.publish, PublishStatus::Failed { .. }));
        assert!(audio.exists() && intermediate.exists());

        // The entry is indexed now, so the rerun processes nothing and only pushes
        let http = FakeHttp::new(one_episode());
        let git = ScriptedGit::new().on(&["rev-list"], 0, "1\n", "");
        let second = run(&config, &http, &FakeTranscoder::default(), &git, None)
            .await
            .unwrap();

        assert_eq!(http.download_count(), 0);
        assert!(second.items.ephemeral.is_empty());
        assert_eq!(second.publish, PublishStatus::Published);
        assert!(git.called("push -u origin main"));
        assert_eq!(second.ephemeral_removed, 2);
        assert!(!audio.exists());
        assert!(!intermediate.exists());
    }

    #[tokio::test]
    async fn kept_files_survive_while_publishing_keeps_failing() {
        let dir = tempdir().unwrap();
        let config = config(&dir, Some(publish_settings(None)));
        let git = ScriptedGit::new()
            .on(&["diff", "--cached", "--quiet"], 1, "", "")
            .on(&["push"], 1, "", "fatal: unable to access remote");

        for _ in 0..2 {
            let report = run(
                &config,
                &FakeHttp::new(one_episode()),
                &FakeTranscoder::default(),
                &git,
                None,
            )
            .await
            .unwrap();
            assert_eq!(report.ephemeral_removed, 0);
        }

        assert!(config.download_dir.join("Show_Episode_One.mp3").exists());
        assert!(config.download_dir.join("Show_Episode_One.wav").exists());
    }

    #[tokio::test]
    async fn rerun_over_unchanged_feed_downloads_nothing() {
        let dir = tempdir().unwrap();
        let config = config(&dir, Some(publish_settings(None)));

        let first_git = ScriptedGit::new().on(&["diff", "--cached", "--quiet"], 1, "", "");
        run(
            &config,
            &FakeHttp::new(one_episode()),
            &FakeTranscoder::default(),
            &first_git,
            None,
        )
        .await
        .unwrap();
        let archive = std::fs::read(config.layout.archive_path()).unwrap();
        let manifest = std::fs::read(config.layout.manifest_path()).unwrap();

        let http = FakeHttp::new(one_episode());
        let git = ScriptedGit::new().on(&["rev-list"], 0, "0\n", "");
        let report = run(&config, &http, &FakeTranscoder::default(), &git, None)
            .await
            .unwrap();

        assert_eq!(http.download_count(), 0);
        assert!(report.items.processed.is_empty());
        assert_eq!(report.items.skipped, 1);
        assert_eq!(report.publish, PublishStatus::NoChanges);
        assert!(!git.called("commit"));
        assert_eq!(std::fs::read(config.layout.archive_path()).unwrap(), archive);
        assert_eq!(std::fs::read(config.layout.manifest_path()).unwrap(), manifest);
    }

    #[tokio::test]
    async fn disabled_publishing_cleans_up_without_git() {
        let dir = tempdir().unwrap();
        let config = config(&dir, None);
        let http = FakeHttp::new(one_episode());
        let git = ScriptedGit::new();

        let report = run(&config, &http, &FakeTranscoder::default(), &git, None)
            .await
            .unwrap();

        assert_eq!(report.publish, PublishStatus::Disabled);
        assert_eq!(report.repository, None);
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
        assert_eq!(report.ephemeral_removed, 2);
        assert!(git.calls().is_empty());
    }

    #[tokio::test]
    async fn item_failure_yields_partial_exit_code() {
        let dir = tempdir().unwrap();
        let config = config(&dir, None);
        let http = FakeHttp::new(feed_xml(&[
            ("Show: Broken", "bad", "http://x/bad.mp3"),
            ("Show: Fine", "good", "http://x/good.mp3"),
        ]));
        let transcoder = FakeTranscoder {
            fail_when: Some("Broken".to_string()),
            ..FakeTranscoder::default()
        };

        let report = run(&config, &http, &transcoder, &ScriptedGit::new(), None)
            .await
            .unwrap();

        assert_eq!(report.items.processed, vec!["good"]);
        assert_eq!(report.items.failed.len(), 1);
        assert_eq!(report.exit_code(), EXIT_PARTIAL);
    }

    #[tokio::test]
    async fn held_lock_aborts_before_any_work() {
        let dir = tempdir().unwrap();
        let config = config(&dir, Some(publish_settings(None)));
        let _held = RunLock::acquire_in(&config.download_dir).unwrap();
        let http = FakeHttp::new(one_episode());
        let git = ScriptedGit::new();

        let result = run(&config, &http, &FakeTranscoder::default(), &git, None).await;

        assert!(matches!(
            result,
            Err(PipelineError::Lock(LockError::Held { .. }))
        ));
        assert!(git.calls().is_empty());
        assert_eq!(http.download_count(), 0);
    }

    #[tokio::test]
    async fn missing_git_is_fatal_before_feed_processing() {
        let dir = tempdir().unwrap();
        let config = config(&dir, Some(publish_settings(None)));
        let http = FakeHttp::new(one_episode());
        let git = ScriptedGit::new().on(&["--version"], 127, "", "git: not found");

        let result = run(&config, &http, &FakeTranscoder::default(), &git, None).await;

        assert!(matches!(result, Err(PipelineError::Repository(_))));
        assert_eq!(http.download_count(), 0);
    }

    #[tokio::test]
    async fn hosted_run_syncs_enables_pages_and_links_readme() {
        let dir = tempdir().unwrap();
        let config = config(&dir, Some(publish_settings(Some(github()))));
        let http = FakeHttp::new(one_episode());
        let git = ScriptedGit::new().on(&["diff", "--cached", "--quiet"], 1, "", "");
        let host = FakeHost::default().existing();

        let report = run(&config, &http, &FakeTranscoder::default(), &git, Some(&host))
            .await
            .unwrap();

        assert_eq!(report.sync, Some(SyncStatus::Bootstrap));
        assert_eq!(report.site_error, None);
        assert_eq!(
            host.calls(),
            vec![
                "exists",
                "fetch index_hashes.txt@main",
                "pages?",
                "enable pages main"
            ]
        );

        let readme = std::fs::read_to_string(config.layout.readme_path()).unwrap();
        assert!(readme.contains("https://someone.github.io/archive/podcast_history.html"));
        assert!(!readme.contains(README_DESCRIPTION));
        assert!(git.called("commit -m Link README to the published archive"));

        let archive = std::fs::read_to_string(config.layout.archive_path()).unwrap();
        assert!(archive.contains(
            "https://raw.githubusercontent.com/someone/archive/main/transcribed/Show/Episode_One.txt"
        ));
    }

    #[tokio::test]
    async fn leftover_partial_downloads_are_reported() {
        let dir = tempdir().unwrap();
        let config = config(&dir, None);
        std::fs::create_dir_all(&config.download_dir).unwrap();
        std::fs::write(config.download_dir.join("old.mp3.partial"), "x").unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let http = FakeHttp::new(one_episode());
        let git = ScriptedGit::new();
        let transcoder = FakeTranscoder::default();
        let transcriber = FakeTranscriber::default();

        Pipeline::new(
            &config,
            &http,
            &transcoder,
            &transcriber,
            &git,
            None,
            reporter.clone(),
        )
        .run()
        .await
        .unwrap();

        assert!(!config.download_dir.join("old.mp3.partial").exists());
        let events = reporter.snapshot();
        assert!(matches!(
            events.first(),
            Some(ProgressEvent::PartialFilesCleanedUp { count: 1 })
        ));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::RunCompleted {
                processed_count: 1,
                ..
            })
        ));
    }

    #[test]
    fn readme_description_is_replaced_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("README.md");
        std::fs::write(&path, README_PLACEHOLDER).unwrap();

        assert!(link_readme(&path, "https://someone.github.io/archive/index.html").unwrap());
        assert!(!link_readme(&path, "https://someone.github.io/archive/index.html").unwrap());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Podcast archive\n\nBrowse the [podcast archive]"));
    }

    #[test]
    fn readme_without_description_gets_link_appended() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("README.md");
        std::fs::write(&path, "# My notes\n").unwrap();

        link_readme(&path, "https://example.com/a.html").unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# My notes\n\nBrowse the [podcast archive](https://example.com/a.html).\n"
        );
    }
}
