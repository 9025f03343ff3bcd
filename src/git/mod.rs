mod publish;
mod repository;
mod runner;

pub use publish::{Gateway, PublishOutcome, PublishSet, README_DESCRIPTION, README_PLACEHOLDER};
pub use repository::{RepositoryState, prepare_repository};
pub use runner::{GitRunner, SystemGit, command_line, run_checked};
