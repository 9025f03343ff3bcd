mod index;
mod layout;
mod record;

pub use index::{EpisodeIndex, JsonIndex, MemoryIndex};
pub use layout::{
    DEFAULT_ARCHIVE_FILE, DEFAULT_INDEX_DIR, DEFAULT_MANIFEST_FILE, DEFAULT_TRANSCRIPTS_DIR,
    StoreLayout, to_slash,
};
pub use record::EpisodeRecord;
