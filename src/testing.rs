//! Hand-written fakes for the seam traits, shared by unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::command::CommandOutput;
use crate::error::{CommandError, HostingError};
use crate::git::GitRunner;
use crate::hosting::RepositoryHost;
use crate::http::{ByteStream, HttpClient, HttpResponse};
use crate::media::{Transcoder, Transcriber, transcript_path};

/// Render an RSS document with one item per `(title, guid, enclosure_url)`
pub fn feed_xml(items: &[(&str, &str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, guid, url)| {
            format!(
                "<item><title>{title}</title><link>https://example.com/{guid}</link>\
                 <guid>{guid}</guid><pubDate>Mon, 15 Jan 2024 12:00:00 +0000</pubDate>\
                 <enclosure url=\"{url}\" length=\"4\" type=\"audio/mpeg\"/></item>"
            )
        })
        .collect();

    format!(
        "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>History</title>\
         <link>https://example.com</link><description>Listening history</description>\
         {items}</channel></rss>"
    )
}

/// Git runner answering from a script and recording every call
///
/// Unscripted commands succeed with empty output. When several rules match,
/// the one added last wins.
#[derive(Default)]
pub struct ScriptedGit {
    rules: Vec<(Vec<String>, CommandOutput)>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call whose arguments start with `prefix`
    pub fn on(mut self, prefix: &[&str], code: i32, stdout: &str, stderr: &str) -> Self {
        self.rules.push((
            prefix.iter().map(|s| s.to_string()).collect(),
            CommandOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        ));
        self
    }

    /// Every call so far, each rendered as space-joined arguments
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|args| args.join(" "))
            .collect()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|call| call.starts_with(prefix))
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls().iter().position(|call| call.starts_with(prefix))
    }
}

#[async_trait]
impl GitRunner for ScriptedGit {
    async fn run(&self, args: &[&str]) -> Result<CommandOutput, CommandError> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        self.calls.lock().unwrap().push(args.clone());

        let output = self
            .rules
            .iter()
            .rev()
            .find(|(prefix, _)| args.starts_with(prefix))
            .map(|(_, output)| output.clone())
            .unwrap_or(CommandOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            });

        Ok(output)
    }
}

/// HTTP client serving a fixed feed and audio bodies
pub struct FakeHttp {
    feed: String,
    missing: Vec<String>,
    pub downloads: AtomicUsize,
}

impl FakeHttp {
    pub fn new(feed: String) -> Self {
        Self {
            feed,
            missing: Vec::new(),
            downloads: AtomicUsize::new(0),
        }
    }

    /// Answer 404 for this enclosure URL
    pub fn missing(mut self, url: &str) -> Self {
        self.missing.push(url.to_string());
        self
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
        Ok(Bytes::from(self.feed.clone()))
    }

    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        self.downloads.fetch_add(1, Ordering::SeqCst);

        let status = if self.missing.iter().any(|m| m == url) {
            404
        } else {
            200
        };
        let body: ByteStream = Box::pin(futures::stream::once(async {
            Ok(Bytes::from_static(b"ID3\x04"))
        }));

        Ok(HttpResponse {
            status,
            content_length: Some(4),
            body,
        })
    }
}

/// Transcoder copying its input, optionally failing for inputs containing a marker
#[derive(Default)]
pub struct FakeTranscoder {
    pub fail_when: Option<String>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), CommandError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(marker) = &self.fail_when
            && input.to_string_lossy().contains(marker.as_str())
        {
            return Err(CommandError::Failed {
                command: format!("ffmpeg -i {}", input.display()),
                code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }

        tokio::fs::copy(input, output)
            .await
            .map_err(|e| CommandError::SpawnFailed {
                program: "ffmpeg".to_string(),
                source: e,
            })?;
        Ok(())
    }
}

/// How the fake transcriber behaves
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub enum TranscriberMode {
    #[default]
    Writes,
    /// Exits successfully without producing output
    Silent,
    Fails,
}

#[derive(Default)]
pub struct FakeTranscriber {
    pub mode: TranscriberMode,
}

impl FakeTranscriber {
    pub fn with_mode(mode: TranscriberMode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        audio: &Path,
        output_prefix: &Path,
    ) -> Result<PathBuf, CommandError> {
        let path = transcript_path(output_prefix);
        match self.mode {
            TranscriberMode::Writes => {
                tokio::fs::write(&path, format!("transcript of {}\n", audio.display()))
                    .await
                    .map_err(|e| CommandError::SpawnFailed {
                        program: "whisper-cli".to_string(),
                        source: e,
                    })?;
            }
            TranscriberMode::Silent => {}
            TranscriberMode::Fails => {
                return Err(CommandError::Failed {
                    command: "whisper-cli".to_string(),
                    code: Some(3),
                    stderr: "failed to load model".to_string(),
                });
            }
        }
        Ok(path)
    }
}

/// Hosting provider holding files in memory
#[derive(Default)]
pub struct FakeHost {
    pub files: Mutex<HashMap<String, Bytes>>,
    pub exists: Mutex<bool>,
    pub pages: Mutex<bool>,
    /// Answer raw fetches with this status instead of serving files
    pub fetch_status: Option<u16>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), Bytes::from(content.to_string()));
        self
    }

    pub fn existing(self) -> Self {
        *self.exists.lock().unwrap() = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl RepositoryHost for FakeHost {
    async fn repository_exists(&self) -> Result<bool, HostingError> {
        self.record("exists");
        Ok(*self.exists.lock().unwrap())
    }

    async fn create_repository(&self, private: bool) -> Result<(), HostingError> {
        self.record(&format!("create private={private}"));
        *self.exists.lock().unwrap() = true;
        Ok(())
    }

    async fn fetch_raw(&self, path: &str, branch: &str) -> Result<Bytes, HostingError> {
        self.record(&format!("fetch {path}@{branch}"));

        if let Some(status) = self.fetch_status {
            return Err(HostingError::UnexpectedStatus {
                url: path.to_string(),
                status,
                body: String::new(),
            });
        }

        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| HostingError::NotFound {
                resource: path.to_string(),
            })
    }

    async fn pages_enabled(&self) -> Result<bool, HostingError> {
        self.record("pages?");
        Ok(*self.pages.lock().unwrap())
    }

    async fn enable_pages(&self, branch: &str) -> Result<(), HostingError> {
        self.record(&format!("enable pages {branch}"));
        *self.pages.lock().unwrap() = true;
        Ok(())
    }

    async fn delete_repository(&self) -> Result<(), HostingError> {
        self.record("delete");
        *self.exists.lock().unwrap() = false;
        Ok(())
    }
}
