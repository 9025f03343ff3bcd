pub mod archive;
pub mod clean;
pub mod command;
pub mod config;
pub mod episode;
pub mod error;
pub mod feed;
pub mod git;
pub mod hosting;
pub mod http;
pub mod lock;
pub mod manifest;
pub mod media;
pub mod pipeline;
pub mod processor;
pub mod progress;
pub mod remote_sync;
pub mod state;
pub mod store;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use clean::{CleanOptions, CleanReport, clean};
pub use config::{Config, DEFAULT_CONFIG_FILE, RawConfig};
pub use error::{CleanError, ConfigError, PipelineError};
pub use git::SystemGit;
pub use hosting::{GitHubClient, RepositoryHost};
pub use http::{HttpClient, ReqwestClient};
pub use media::{ExternalTranscoder, ExternalTranscriber};
pub use pipeline::{EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS, Pipeline, PublishStatus, RunReport};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
