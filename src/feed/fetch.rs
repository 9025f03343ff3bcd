// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use bytes::Bytes;
use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::{Podcast, parse_feed};

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Bytes, FeedError> {
    let bytes = client
        .get_bytes(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;
    Ok(bytes)
}

/// Read raw feed bytes from a local file (without parsing)
pub fn read_feed_file(path: &Path) -> Result<Vec<u8>, FeedError> {
    std::fs::read(path).map_err(|e| FeedError::FileReadFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Construct a file:// URL for a local file path
fn file_path_to_url(path: &Path) -> Result<Url, FeedError> {
    let absolute = std::path::absolute(path).map_err(|e| FeedError::FileReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    match Url::from_file_path(&absolute) {
        Ok(url) => Ok(url),
        Err(()) => Ok(Url::parse(&format!("file://{}", absolute.display()))?),
    }
}

/// Load a feed from an http(s) URL or a local file path
pub async fn load_feed<C: HttpClient + ?Sized>(
    client: &C,
    source: &str,
) -> Result<Podcast, FeedError> {
    if is_url(source) {
        let feed_url = Url::parse(source)?;
        let bytes = fetch_feed_bytes(client, source).await?;
        parse_feed(&bytes, feed_url)
    } else {
        let path = Path::new(source);
        let bytes = read_feed_file(path)?;
        parse_feed(&bytes, file_path_to_url(path)?)
    }
}

/// Determine if a string is a URL or a file path
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
