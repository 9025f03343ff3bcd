// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset};
use url::Url;

use crate::error::FeedError;

/// Represents a parsed podcast feed
#[derive(Debug, Clone)]
pub struct Podcast {
    pub title: String,
    pub feed_url: Url,
    /// Entries with an enclosure, in document order
    pub episodes: Vec<Episode>,
    /// Number of items dropped because they carried no enclosure
    pub skipped_items: usize,
    /// Items whose enclosure URL could not be parsed
    pub invalid_items: Vec<InvalidItem>,
}

/// A feed entry dropped because its enclosure URL is malformed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidItem {
    pub title: String,
    /// Feed guid, or the raw enclosure URL when the feed has none
    pub guid: String,
    pub error: String,
}

/// Represents a single feed entry with audio attached
#[derive(Debug, Clone)]
pub struct Episode {
    /// Raw feed title, empty when the item has none
    pub title: String,
    pub link: Option<String>,
    /// `pubDate` exactly as the feed wrote it
    pub pub_date_raw: Option<String>,
    pub pub_date: Option<DateTime<FixedOffset>>,
    /// Feed guid, or the enclosure URL when the feed has none
    pub guid: String,
    pub enclosure: Enclosure,
}

/// Represents the audio file attached to an episode
#[derive(Debug, Clone)]
pub struct Enclosure {
    pub url: Url,
    pub length: Option<u64>,
    pub mime_type: Option<String>,
}

/// Parse RSS feed XML bytes into a Podcast struct
pub fn parse_feed(xml_bytes: &[u8], feed_url: Url) -> Result<Podcast, FeedError> {
    let channel = rss::Channel::read_from(xml_bytes)?;

    let mut episodes = Vec::new();
    let mut skipped_items = 0;
    let mut invalid_items = Vec::new();

    for item in channel.items() {
        match parse_episode(item) {
            Ok(episode) => episodes.push(episode),
            Err(e) => match &e {
                FeedError::InvalidEnclosure { title, url, .. } => {
                    let guid = item_guid(item).unwrap_or_else(|| url.clone());
                    tracing::warn!(guid = %guid, error = %e, "feed item rejected");
                    invalid_items.push(InvalidItem {
                        title: title.clone(),
                        guid,
                        error: e.to_string(),
                    });
                }
                _ => {
                    tracing::debug!(error = %e, "skipping feed item");
                    skipped_items += 1;
                }
            },
        }
    }

    Ok(Podcast {
        title: channel.title().to_string(),
        feed_url,
        episodes,
        skipped_items,
        invalid_items,
    })
}

fn parse_episode(item: &rss::Item) -> Result<Episode, FeedError> {
    let title = item.title().map(str::trim).unwrap_or_default().to_string();

    let enclosure = item
        .enclosure()
        .filter(|e| !e.url().trim().is_empty())
        .ok_or_else(|| FeedError::MissingEnclosure {
            title: title.clone(),
        })?;

    let raw_url = enclosure.url().trim();
    let enclosure_url = Url::parse(raw_url).map_err(|source| FeedError::InvalidEnclosure {
        title: title.clone(),
        url: raw_url.to_string(),
        source,
    })?;

    let pub_date_raw = item
        .pub_date()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from);

    let pub_date = pub_date_raw.as_deref().and_then(|date_str| {
        DateTime::parse_from_rfc2822(date_str)
            .ok()
            .or_else(|| parse_relaxed_date(date_str))
    });

    let guid = item_guid(item).unwrap_or_else(|| enclosure_url.to_string());

    let link = item
        .link()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from);

    Ok(Episode {
        title,
        link,
        pub_date_raw,
        pub_date,
        guid,
        enclosure: Enclosure {
            url: enclosure_url,
            length: enclosure.length().parse().ok(),
            mime_type: Some(enclosure.mime_type().to_string()).filter(|s| !s.is_empty()),
        },
    })
}

fn item_guid(item: &rss::Item) -> Option<String> {
    item.guid()
        .map(|g| g.value().trim())
        .filter(|g| !g.is_empty())
        .map(String::from)
}

/// Try to parse dates that don't strictly conform to RFC 2822
fn parse_relaxed_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    formats
        .iter()
        .find_map(|format| DateTime::parse_from_str(date_str, format).ok())
}
