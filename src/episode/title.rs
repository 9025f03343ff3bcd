// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Item name used when a title has no `collection: item` separator
pub const UNKNOWN_EPISODE: &str = "Unknown Episode";

/// A feed title split into the show it belongs to and the episode name
///
/// Listening-history feeds title entries `"<show>: <episode>"`. Titles
/// without a colon cannot be split; the whole title becomes the collection
/// name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeTitle {
    pub collection_name: String,
    pub item_name: String,
}

impl EpisodeTitle {
    /// Split on the first colon, trimming both sides
    pub fn parse(title: &str) -> Self {
        match title.split_once(':') {
            Some((collection, item)) => {
                let item = item.trim();
                Self {
                    collection_name: collection.trim().to_string(),
                    item_name: if item.is_empty() {
                        UNKNOWN_EPISODE.to_string()
                    } else {
                        item.to_string()
                    },
                }
            }
            None => Self {
                collection_name: title.trim().to_string(),
                item_name: UNKNOWN_EPISODE.to_string(),
            },
        }
    }

    /// A title that yields no collection name cannot be filed
    pub fn is_malformed(&self) -> bool {
        self.collection_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_colon() {
        let title = EpisodeTitle::parse("Show: Episode One");

        assert_eq!(title.collection_name, "Show");
        assert_eq!(title.item_name, "Episode One");
        assert!(!title.is_malformed());
    }

    #[test]
    fn later_colons_stay_in_item_name() {
        let title = EpisodeTitle::parse("Show: Part 2: The Return");

        assert_eq!(title.collection_name, "Show");
        assert_eq!(title.item_name, "Part 2: The Return");
    }

    #[test]
    fn title_without_colon_is_collection_only() {
        let title = EpisodeTitle::parse("NoColonHere");

        assert_eq!(title.collection_name, "NoColonHere");
        assert_eq!(title.item_name, "Unknown Episode");
    }

    #[test]
    fn whitespace_is_trimmed() {
        let title = EpisodeTitle::parse("  Show   :   Episode  ");

        assert_eq!(title.collection_name, "Show");
        assert_eq!(title.item_name, "Episode");
    }

    #[test]
    fn empty_item_falls_back_to_unknown() {
        let title = EpisodeTitle::parse("Show:");

        assert_eq!(title.item_name, UNKNOWN_EPISODE);
    }

    #[test]
    fn empty_collection_is_malformed() {
        assert!(EpisodeTitle::parse(": Episode").is_malformed());
        assert!(EpisodeTitle::parse("").is_malformed());
        assert!(EpisodeTitle::parse("   ").is_malformed());
    }
}
