// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Maximum length of a normalized name
const MAX_NAME_LENGTH: usize = 100;

/// Used when nothing of the original name survives normalization
const FALLBACK_NAME: &str = "untitled";

/// Extension forced onto downloaded audio regardless of the enclosure type
pub const AUDIO_EXTENSION: &str = "mp3";

/// Extension of the transcoder's intermediate output
pub const INTERMEDIATE_EXTENSION: &str = "wav";

/// Check if a character is kept in names (whitelist approach)
fn is_kept_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_')
}

/// Normalize a title fragment into a filesystem- and URL-safe name
///
/// Whitespace becomes `_`, every other character outside `[A-Za-z0-9_-]`
/// is dropped. Distinct titles can normalize to the same name.
pub fn normalize_name(title: &str) -> String {
    let mapped: String = title
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if is_kept_char(c) {
                Some(c)
            } else {
                None
            }
        })
        .collect();

    let collapsed = collapse_underscores(&mapped);
    let trimmed = collapsed.trim_matches('_');

    let limited = if trimmed.len() > MAX_NAME_LENGTH {
        truncate_at_boundary(trimmed, MAX_NAME_LENGTH)
    } else {
        trimmed.to_string()
    };

    if limited.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        limited
    }
}

/// Filename of the downloaded audio for a feed title
pub fn audio_filename(title: &str) -> String {
    format!("{}.{}", normalize_name(title), AUDIO_EXTENSION)
}

/// Collapse runs of underscores into one
fn collapse_underscores(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut last_was_separator = false;

    for c in s.chars() {
        if c == '_' {
            if !last_was_separator {
                result.push('_');
                last_was_separator = true;
            }
        } else {
            result.push(c);
            last_was_separator = false;
        }
    }

    result
}

/// Truncate an ASCII string at a word boundary
fn truncate_at_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let truncated = &s[..max_len];
    if let Some(pos) = truncated.rfind('_')
        && pos > max_len / 2
    {
        return truncated[..pos].to_string();
    }

    truncated.trim_end_matches('_').to_string()
}
