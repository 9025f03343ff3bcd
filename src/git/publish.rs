// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use crate::command::CommandOutput;
use crate::error::{CommandError, PublishError};
use crate::store::to_slash;

use super::runner::{GitRunner, command_line, run_checked};

const INITIAL_COMMIT_MESSAGE: &str = "Initial commit";
const STASH_MESSAGE: &str = "podscribe: local changes before pull";
const NOTHING_TO_STASH: &str = "No local changes to save";
const NO_STASH_ENTRIES: &str = "No stash entries found";

/// Line of the placeholder README replaced by the archive link once the site is live
pub const README_DESCRIPTION: &str = "This repository contains podcast archives.";

/// Placeholder written when the repository has no commits yet
pub const README_PLACEHOLDER: &str =
    "# Podcast archive\n\nThis repository contains podcast archives.\n";

/// Repository-relative paths to publish and the commit message to use
#[derive(Debug, Clone)]
pub struct PublishSet {
    /// Must exist before any git command runs
    pub required: Vec<PathBuf>,
    /// Staged only when present
    pub optional: Vec<PathBuf>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The remote branch now holds a commit it did not have before
    Published,
    /// Nothing staged and no local commits ahead of the remote
    NoChanges,
}

/// The only writer of committed history
pub struct Gateway<'a> {
    git: &'a dyn GitRunner,
    repo_root: &'a Path,
    branch: &'a str,
}

impl<'a> Gateway<'a> {
    pub fn new(git: &'a dyn GitRunner, repo_root: &'a Path, branch: &'a str) -> Self {
        Self {
            git,
            repo_root,
            branch,
        }
    }

    /// Commit and push the managed paths
    ///
    /// Runs: precondition check, bootstrap commit for an empty repository,
    /// stash of local modifications, rebase-pull, stash restore, per-path
    /// staging, change detection, commit and push. The first failing step
    /// aborts the attempt.
    ///
    /// A commit whose push failed in an earlier attempt is pushed even when
    /// nothing new is staged.
    pub async fn publish(&self, set: &PublishSet) -> Result<PublishOutcome, PublishError> {
        for path in &set.required {
            if !self.repo_root.join(path).exists() {
                return Err(PublishError::MissingPath(path.clone()));
            }
        }

        self.ensure_initial_commit().await?;

        let stashed = self.stash_local_changes().await?;

        let remote_branch = match self.pull_rebase().await {
            Ok(exists) => exists,
            Err(pull) if stashed => {
                return Err(match self.restore_stash().await {
                    Ok(()) => pull,
                    Err(stash) => {
                        tracing::error!(error = %stash, "stashed changes were not restored");
                        PublishError::StashNotRestored {
                            pull: Box::new(pull),
                            stash: Box::new(stash),
                        }
                    }
                });
            }
            Err(pull) => return Err(pull),
        };

        if stashed {
            self.restore_stash().await?;
        }

        for path in set.required.iter().chain(set.optional.iter()) {
            if self.repo_root.join(path).exists() {
                let path = to_slash(path);
                self.checked("add", &["add", "--", path.as_str()]).await?;
            } else {
                tracing::debug!(path = %path.display(), "optional path absent; not staged");
            }
        }

        if self.has_staged_changes().await? {
            self.checked("commit", &["commit", "-m", set.message.as_str()])
                .await?;
        } else if self.has_unpushed_commits(remote_branch).await? {
            tracing::info!(branch = %self.branch, "nothing to commit; pushing earlier commits");
        } else {
            tracing::info!("nothing to commit");
            return Ok(PublishOutcome::NoChanges);
        }

        self.checked("push", &["push", "-u", "origin", self.branch])
            .await?;

        tracing::info!(branch = %self.branch, "published changes");
        Ok(PublishOutcome::Published)
    }

    async fn checked(
        &self,
        step: &'static str,
        args: &[&str],
    ) -> Result<CommandOutput, PublishError> {
        run_checked(self.git, args)
            .await
            .map_err(|source| PublishError::Git { step, source })
    }

    /// Give an empty repository a first commit on the configured branch
    async fn ensure_initial_commit(&self) -> Result<(), PublishError> {
        let head = self
            .git
            .run(&["rev-parse", "--verify", "HEAD"])
            .await
            .map_err(|source| PublishError::Git {
                step: "rev-parse",
                source,
            })?;

        if head.success() {
            return Ok(());
        }

        tracing::info!("repository has no commits; creating the initial commit");

        let readme = self.repo_root.join("README.md");
        if !readme.exists() {
            std::fs::write(&readme, README_PLACEHOLDER).map_err(|e| PublishError::WriteFailed {
                path: readme.clone(),
                source: e,
            })?;
        }

        self.checked("add", &["add", "--", "README.md"]).await?;
        self.checked("commit", &["commit", "-m", INITIAL_COMMIT_MESSAGE])
            .await?;
        self.checked("branch", &["branch", "-M", self.branch])
            .await?;
        Ok(())
    }

    /// Stash modifications to tracked files; returns whether a stash entry was created
    async fn stash_local_changes(&self) -> Result<bool, PublishError> {
        let status = self.checked("status", &["status", "--porcelain"]).await?;
        if status.stdout.trim().is_empty() {
            return Ok(false);
        }

        let stash = self
            .checked("stash", &["stash", "push", "-m", STASH_MESSAGE])
            .await?;

        // Untracked-only changes leave nothing to stash
        Ok(!stash.mentions(NOTHING_TO_STASH))
    }

    async fn restore_stash(&self) -> Result<(), PublishError> {
        let args = ["stash", "pop"];
        let output = self
            .git
            .run(&args)
            .await
            .map_err(|source| PublishError::Git {
                step: "stash pop",
                source,
            })?;

        if output.success() || output.mentions(NO_STASH_ENTRIES) {
            return Ok(());
        }

        let command = command_line(&args);
        tracing::error!(command = %command, stderr = %output.stderr.trim(), "git command failed");
        Err(PublishError::Git {
            step: "stash pop",
            source: CommandError::Failed {
                command,
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            },
        })
    }

    /// Rebase onto the remote branch when it exists; returns whether it does
    async fn pull_rebase(&self) -> Result<bool, PublishError> {
        let remote = self
            .git
            .run(&["ls-remote", "--exit-code", "--heads", "origin", self.branch])
            .await
            .map_err(|source| PublishError::Git {
                step: "ls-remote",
                source,
            })?;

        match remote.code {
            Some(0) => {}
            // Exit status 2: the remote has no such branch yet
            Some(2) => {
                tracing::info!(branch = %self.branch, "remote branch does not exist yet; skipping pull");
                return Ok(false);
            }
            _ => {
                remote
                    .check(&command_line(&[
                        "ls-remote",
                        "--exit-code",
                        "--heads",
                        "origin",
                        self.branch,
                    ]))
                    .map_err(|source| PublishError::Git {
                        step: "ls-remote",
                        source,
                    })?;
            }
        }

        if let Err(e) = self
            .checked("pull --rebase", &["pull", "--rebase", "origin", self.branch])
            .await
        {
            let _ = self.git.run(&["rebase", "--abort"]).await;
            return Err(e);
        }
        Ok(true)
    }

    /// Whether `HEAD` holds commits the remote branch lacks
    ///
    /// Without a remote branch every local commit is unpushed.
    async fn has_unpushed_commits(&self, remote_branch: bool) -> Result<bool, PublishError> {
        if !remote_branch {
            return Ok(true);
        }

        let range = format!("origin/{}..HEAD", self.branch);
        let args = ["rev-list", "--count", range.as_str()];
        let output = self.checked("rev-list", &args).await?;

        let ahead: usize = output.stdout.trim().parse().map_err(|_| {
            PublishError::UnexpectedOutput {
                command: command_line(&args),
                output: output.stdout.clone(),
            }
        })?;
        tracing::debug!(ahead, "local commits not on the remote");
        Ok(ahead > 0)
    }

    /// `git diff --cached --quiet`: exit 0 means clean, 1 means staged changes
    async fn has_staged_changes(&self) -> Result<bool, PublishError> {
        let args = ["diff", "--cached", "--quiet"];
        let output = self
            .git
            .run(&args)
            .await
            .map_err(|source| PublishError::Git {
                step: "diff",
                source,
            })?;

        match output.code {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(PublishError::Git {
                step: "diff",
                source: CommandError::Failed {
                    command: command_line(&args),
                    code: output.code,
                    stderr: output.stderr.trim().to_string(),
                },
            }),
        }
    }
}
