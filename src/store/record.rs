// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::episode::EpisodeTitle;
use crate::feed::Episode;

/// Format of `published_at` when the feed carried no date
const PUBLISHED_AT_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Durable metadata for one fully processed feed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub guid: String,
    pub source_title: String,
    pub collection_name: String,
    pub item_name: String,
    pub published_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_link: Option<String>,
    pub audio_url: String,
    pub transcript_location: String,
    pub processed_at: String,
}

impl EpisodeRecord {
    /// Create a record for an episode whose transcript now sits at `transcript_location`
    pub fn from_episode(episode: &Episode, title: &EpisodeTitle, transcript_location: String) -> Self {
        let published_at = episode
            .pub_date_raw
            .clone()
            .unwrap_or_else(|| Utc::now().format(PUBLISHED_AT_FORMAT).to_string());

        Self {
            guid: episode.guid.clone(),
            source_title: episode.title.clone(),
            collection_name: title.collection_name.clone(),
            item_name: title.item_name.clone(),
            published_at,
            source_link: episode.link.clone(),
            audio_url: episode.enclosure.url.to_string(),
            transcript_location,
            processed_at: Utc::now().to_rfc3339(),
        }
    }

    /// Publication date, if `published_at` parses as RFC 2822
    pub fn published(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc2822(&self.published_at).ok()
    }
}
