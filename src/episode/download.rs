use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::DownloadError;
use crate::feed::Episode;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Suffix of in-flight downloads; such files are never mistaken for audio
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Path the download is streamed to before being renamed to `output_path`
pub fn partial_path(output_path: &Path) -> PathBuf {
    let mut name = output_path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Download an episode's audio to the specified output path
///
/// Streams the response body to a `.partial` sibling, reporting progress
/// through the reporter, and renames it into place once complete. A failed
/// download leaves no file at `output_path`. Returns the number of bytes
/// downloaded on success.
pub async fn download_episode<C: HttpClient + ?Sized>(
    client: &C,
    episode: &Episode,
    output_path: &Path,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let partial = partial_path(output_path);

    match stream_to_file(client, episode, &partial, reporter).await {
        Ok(bytes_downloaded) => {
            tokio::fs::rename(&partial, output_path)
                .await
                .map_err(|e| DownloadError::RenameFailed {
                    from: partial.clone(),
                    to: output_path.to_path_buf(),
                    source: e,
                })?;

            reporter.report(ProgressEvent::DownloadCompleted {
                title: episode.title.clone(),
                bytes_downloaded,
            });

            Ok(bytes_downloaded)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            Err(e)
        }
    }
}

async fn stream_to_file<C: HttpClient + ?Sized>(
    client: &C,
    episode: &Episode,
    path: &Path,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let url = episode.enclosure.url.as_str();

    let response = client
        .get_stream(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        title: episode.title.clone(),
        content_length: response.content_length,
    });

    let mut file = File::create(path)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            title: episode.title.clone(),
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(bytes_downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Enclosure;
    use crate::http::{ByteStream, HttpResponse};
    use crate::progress::NoopReporter;
    use async_trait::async_trait;
    use bytes::Bytes;

    use tempfile::tempdir;
    use url::Url;

    struct MockHttpClient {
        response_data: Vec<u8>,
        status: u16,
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from(self.response_data.clone()))
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let data = self.response_data.clone();
            let len = data.len() as u64;

            let stream: ByteStream =
                Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }));

            Ok(HttpResponse {
                status: self.status,
                content_length: Some(len),
                body: stream,
            })
        }
    }

    fn make_episode() -> Episode {
        Episode {
            title: "Show: Test Episode".to_string(),
            link: None,
            pub_date_raw: None,
            pub_date: None,
            guid: "test-guid".to_string(),
            enclosure: Enclosure {
                url: Url::parse("https://example.com/episode.mp3").unwrap(),
                length: Some(1000),
                mime_type: Some("audio/mpeg".to_string()),
            },
        }
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/tmp/Show_Episode.mp3")),
            PathBuf::from("/tmp/Show_Episode.mp3.partial")
        );
    }

    #[tokio::test]
    async fn download_writes_file() {
        let dir = tempdir().unwrap();
        let output_path = dir.path().join("episode.mp3");

        let client = MockHttpClient {
            response_data: b"test audio content".to_vec(),
            status: 200,
        };

        let episode = make_episode();
        let reporter = NoopReporter::shared();

        let bytes = download_episode(&client, &episode, &output_path, &reporter)
            .await
            .unwrap();

        assert_eq!(bytes, 18); // "test audio content".len()
        assert!(output_path.exists());
        assert!(!partial_path(&output_path).exists());

        let content = std::fs::read(&output_path).unwrap();
        assert_eq!(content, b"test audio content");
    }

    #[tokio::test]
    async fn download_fails_on_http_error() {
        let dir = tempdir().unwrap();
        let output_path = dir.path().join("episode.mp3");

        let client = MockHttpClient {
            response_data: b"Not Found".to_vec(),
            status: 404,
        };

        let episode = make_episode();
        let reporter = NoopReporter::shared();

        let result = download_episode(&client, &episode, &output_path, &reporter).await;

        match result.unwrap_err() {
            DownloadError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
        assert!(!output_path.exists());
        assert!(!partial_path(&output_path).exists());
    }

    #[tokio::test]
    async fn download_reports_completion() {
        use crate::progress::recording::RecordingReporter;
        use std::sync::Arc;

        let dir = tempdir().unwrap();
        let output_path = dir.path().join("episode.mp3");
        let client = MockHttpClient {
            response_data: b"abc".to_vec(),
            status: 200,
        };
        let recorder = Arc::new(RecordingReporter::default());
        let reporter: SharedProgressReporter = recorder.clone();

        download_episode(&client, &make_episode(), &output_path, &reporter)
            .await
            .unwrap();

        let events = recorder.snapshot();
        assert!(matches!(
            events.first(),
            Some(ProgressEvent::DownloadStarting {
                content_length: Some(3),
                ..
            })
        ));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::DownloadCompleted {
                bytes_downloaded: 3,
                ..
            })
        ));
    }
}
