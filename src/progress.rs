use std::sync::Arc;

/// Events emitted during a pipeline run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Feed is being fetched from a URL or read from disk
    FetchingFeed { source: String },

    /// Feed has been parsed and compared against the index
    FeedParsed {
        feed_title: String,
        total_items: usize,
        new_items: usize,
    },

    /// The local index is being reconciled with the published one
    Syncing,

    /// Processing of one feed entry begins
    ItemStarted {
        /// Position of this entry among the entries selected for the run
        item_index: usize,
        total_items: usize,
        title: String,
    },

    /// Audio download is starting
    DownloadStarting {
        title: String,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        title: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// Audio download finished and was moved into place
    DownloadCompleted { title: String, bytes_downloaded: u64 },

    /// Audio is being converted for the transcriber
    Transcoding { title: String },

    /// Speech-to-text is running; usually the longest step
    Transcribing { title: String },

    /// Entry was transcribed and recorded in the index
    ItemCompleted {
        title: String,
        transcript_location: String,
    },

    /// Entry failed; the run continues with the next one
    ItemFailed { title: String, error: String },

    /// Leftover partial downloads were removed from the work directory
    PartialFilesCleanedUp { count: usize },

    /// Changes are being committed and pushed
    Publishing,

    /// Downloaded audio and intermediates were removed after publishing
    EphemeralFilesRemoved { count: usize },

    /// All entries have been handled
    RunCompleted {
        processed_count: usize,
        skipped_count: usize,
        failed_count: usize,
    },
}

/// Trait for reporting progress events during a run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::Mutex;

    use super::*;

    /// Collects every event for assertions
    #[derive(Default)]
    pub struct RecordingReporter {
        pub events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl RecordingReporter {
        pub fn snapshot(&self) -> Vec<ProgressEvent> {
            self.events.lock().unwrap().clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::recording::RecordingReporter;
    use super::*;

    #[test]
    fn noop_reporter_handles_all_events() {
        let reporter = NoopReporter;

        reporter.report(ProgressEvent::FetchingFeed {
            source: "https://example.com/feed.xml".to_string(),
        });

        reporter.report(ProgressEvent::FeedParsed {
            feed_title: "History".to_string(),
            total_items: 10,
            new_items: 5,
        });

        reporter.report(ProgressEvent::Syncing);

        reporter.report(ProgressEvent::ItemStarted {
            item_index: 0,
            total_items: 5,
            title: "Show: Episode 1".to_string(),
        });

        reporter.report(ProgressEvent::DownloadStarting {
            title: "Show: Episode 1".to_string(),
            content_length: Some(1024),
        });

        reporter.report(ProgressEvent::DownloadProgress {
            title: "Show: Episode 1".to_string(),
            bytes_downloaded: 512,
            total_bytes: Some(1024),
        });

        reporter.report(ProgressEvent::DownloadCompleted {
            title: "Show: Episode 1".to_string(),
            bytes_downloaded: 1024,
        });

        reporter.report(ProgressEvent::Transcoding {
            title: "Show: Episode 1".to_string(),
        });

        reporter.report(ProgressEvent::Transcribing {
            title: "Show: Episode 1".to_string(),
        });

        reporter.report(ProgressEvent::ItemCompleted {
            title: "Show: Episode 1".to_string(),
            transcript_location: "transcribed/Show/Episode_1.txt".to_string(),
        });

        reporter.report(ProgressEvent::ItemFailed {
            title: "Show: Episode 2".to_string(),
            error: "Connection timeout".to_string(),
        });

        reporter.report(ProgressEvent::PartialFilesCleanedUp { count: 2 });
        reporter.report(ProgressEvent::Publishing);
        reporter.report(ProgressEvent::EphemeralFilesRemoved { count: 2 });

        reporter.report(ProgressEvent::RunCompleted {
            processed_count: 4,
            skipped_count: 5,
            failed_count: 1,
        });
    }

    #[test]
    fn recording_reporter_keeps_order() {
        let reporter = RecordingReporter::default();

        reporter.report(ProgressEvent::Syncing);
        reporter.report(ProgressEvent::Publishing);

        let events = reporter.snapshot();
        assert!(matches!(events[0], ProgressEvent::Syncing));
        assert!(matches!(events[1], ProgressEvent::Publishing));
    }
}
