// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::ItemError;

/// Two-line header placed above every transcript: item name, then source link
pub fn transcript_header(item_name: &str, link: Option<&str>) -> String {
    format!("{}\n{}\n\n", item_name, link.unwrap_or_default())
}

/// Prepend `header` to the transcript at `path` unless it already starts with it
///
/// Returns whether the file was changed.
pub async fn prepend_header(path: &Path, header: &str) -> Result<bool, ItemError> {
    let failed = |source| ItemError::TranscriptFailed {
        path: path.to_path_buf(),
        source,
    };

    let body = tokio::fs::read_to_string(path).await.map_err(failed)?;
    if body.starts_with(header) {
        return Ok(false);
    }

    let mut content = String::with_capacity(header.len() + body.len());
    content.push_str(header);
    content.push_str(&body);
    tokio::fs::write(path, content).await.map_err(failed)?;

    Ok(true)
}

/// Move a finished transcript to `destination`, creating its directory
///
/// Falls back to copy-and-delete when the source sits on another filesystem.
pub async fn move_into_place(source: &Path, destination: &Path) -> Result<PathBuf, ItemError> {
    let failed = |path: &Path, source| ItemError::TranscriptFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| failed(parent, e))?;
    }

    match tokio::fs::rename(source, destination).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tokio::fs::copy(source, destination)
                .await
                .map_err(|e| failed(destination, e))?;
            tokio::fs::remove_file(source)
                .await
                .map_err(|e| failed(source, e))?;
        }
        Err(e) => return Err(failed(destination, e)),
    }

    Ok(destination.to_path_buf())
}
