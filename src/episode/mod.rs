mod download;
mod filename;
mod title;
mod transcript;

pub use download::{PARTIAL_SUFFIX, download_episode, partial_path};
pub use filename::{AUDIO_EXTENSION, INTERMEDIATE_EXTENSION, audio_filename, normalize_name};
pub use title::{EpisodeTitle, UNKNOWN_EPISODE};
pub use transcript::{move_into_place, prepend_header, transcript_header};
