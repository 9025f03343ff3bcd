// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Browsable HTML listing of every indexed episode.
//!
//! The document is regenerated in full from the index on every run and
//! contains nothing that changes between runs over the same index, so an
//! unchanged index yields a byte-identical file.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::path::Path;

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::hosting::raw_file_url;
use crate::store::EpisodeRecord;

/// Where the transcript links in the archive point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptLinks {
    /// Repository-relative paths, for viewing a local checkout
    Relative,
    /// Raw file URLs on the hosting provider
    Hosted {
        owner: String,
        repository: String,
        branch: String,
    },
}

impl TranscriptLinks {
    fn href(&self, location: &str) -> String {
        match self {
            TranscriptLinks::Relative => location.to_string(),
            TranscriptLinks::Hosted {
                owner,
                repository,
                branch,
            } => raw_file_url(owner, repository, branch, location),
        }
    }
}

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Podcast &#x1F442; Archive</title>
<style>
body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 2rem; }
table { width: 100%; border-collapse: collapse; background-color: white; box-shadow: 0 4px 6px rgba(0, 0, 0, 0.1); }
th { background-color: #4a90e2; color: white; font-weight: 600; text-align: left; padding: 16px; text-transform: uppercase; font-size: 14px; letter-spacing: 0.5px; }
th.sortable { cursor: pointer; }
td { padding: 16px; border-bottom: 1px solid #e0e0e0; }
tr:nth-child(even) { background-color: #f9f9f9; }
tr:hover { background-color: #f0f0f0; }
a { color: #2c3e50; text-decoration: none; border-bottom: 1px solid #3498db; }
a:hover { color: #3498db; border-bottom-color: #2c3e50; }
a.no-underline { border-bottom: none; }
</style>
<script>
function sortTable(n) {
  var table = document.getElementById("podcastTable");
  var body = table.tBodies[0];
  var rows = Array.prototype.slice.call(body.rows);
  var dir = table.getAttribute("data-sort-col") == n && table.getAttribute("data-sort-dir") == "asc" ? "desc" : "asc";
  rows.sort(function (a, b) {
    var x = a.cells[n].getAttribute("data-sort") || a.cells[n].textContent.toLowerCase();
    var y = b.cells[n].getAttribute("data-sort") || b.cells[n].textContent.toLowerCase();
    if (x < y) { return dir == "asc" ? -1 : 1; }
    if (x > y) { return dir == "asc" ? 1 : -1; }
    return 0;
  });
  rows.forEach(function (row) { body.appendChild(row); });
  table.setAttribute("data-sort-col", n);
  table.setAttribute("data-sort-dir", dir);
}
</script>
</head>
<body>
<h2>Podcast &#x1F442; Archive</h2>
<table id="podcastTable">
<thead>
<tr>
<th class="sortable" onclick="sortTable(0)">Podcast</th>
<th class="sortable" onclick="sortTable(1)">Episode</th>
<th class="sortable" onclick="sortTable(2)">Published</th>
<th>Transcript</th>
<th>Stream</th>
</tr>
</thead>
<tbody>
"#;

const FOOT: &str = "</tbody>\n</table>\n</body>\n</html>\n";

/// Newest first; undated records last; ties broken by guid
fn compare_records(a: &EpisodeRecord, b: &EpisodeRecord) -> Ordering {
    match (a.published(), b.published()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.guid.cmp(&b.guid))
}

fn render_row(out: &mut String, record: &EpisodeRecord, links: &TranscriptLinks) {
    let (date_sort, date_text) = match record.published() {
        Some(date) => (
            date.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            date.format("%Y-%m-%d").to_string(),
        ),
        None => (String::new(), record.published_at.clone()),
    };

    let episode = match &record.source_link {
        Some(link) => format!(
            "<a href=\"{}\" target=\"_blank\">{}</a>",
            encode_double_quoted_attribute(link),
            encode_text(&record.item_name)
        ),
        None => encode_text(&record.item_name).into_owned(),
    };

    // Writing to a String cannot fail
    let _ = write!(
        out,
        "<tr>\n\
         <td>{collection}</td>\n\
         <td>{episode}</td>\n\
         <td data-sort=\"{date_sort}\">{date_text}</td>\n\
         <td><a href=\"{transcript}\" target=\"_blank\" class=\"no-underline\">&#x1F4C4;</a></td>\n\
         <td><audio src=\"{audio}\" preload=\"none\" controls></audio></td>\n\
         </tr>\n",
        collection = encode_text(&record.collection_name),
        date_sort = encode_double_quoted_attribute(&date_sort),
        date_text = encode_text(&date_text),
        transcript = encode_double_quoted_attribute(&links.href(&record.transcript_location)),
        audio = encode_double_quoted_attribute(&record.audio_url),
    );
}

/// Render the archive document for `records`, given in any order
pub fn render_archive(mut records: Vec<EpisodeRecord>, links: &TranscriptLinks) -> String {
    records.sort_by(compare_records);

    let mut out = String::with_capacity(HEAD.len() + FOOT.len() + records.len() * 512);
    out.push_str(HEAD);
    for record in &records {
        render_row(&mut out, record, links);
    }
    out.push_str(FOOT);
    out
}

/// Render and overwrite the archive file at `path`
pub fn write_archive(
    path: &Path,
    records: Vec<EpisodeRecord>,
    links: &TranscriptLinks,
) -> std::io::Result<()> {
    let count = records.len();
    std::fs::write(path, render_archive(records, links))?;
    tracing::debug!(path = %path.display(), records = count, "archive written");
    Ok(())
}
