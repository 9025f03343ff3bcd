// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::command::{self, CommandOutput, Invocation};
use crate::error::CommandError;

/// Runs git subcommands inside one repository
///
/// A non-zero exit status is returned as output, not as an error, so callers
/// can branch on it (`diff --quiet`, `ls-remote --exit-code`).
#[async_trait]
pub trait GitRunner: Send + Sync {
    async fn run(&self, args: &[&str]) -> Result<CommandOutput, CommandError>;
}

/// Literal command line for logs and errors
pub fn command_line(args: &[&str]) -> String {
    Invocation::new("git").args(args).display()
}

/// Run git and treat a non-zero exit as failure
///
/// Failures are logged with the literal command and its stderr.
pub async fn run_checked(
    git: &dyn GitRunner,
    args: &[&str],
) -> Result<CommandOutput, CommandError> {
    let command = command_line(args);

    let output = git.run(args).await.inspect_err(|e| {
        tracing::error!(command = %command, error = %e, "git did not run");
    })?;

    output.check(&command).inspect_err(|e| {
        if let CommandError::Failed { code, stderr, .. } = e {
            tracing::error!(command = %command, ?code, stderr = %stderr, "git command failed");
        }
    })
}

/// The `git` executable on `PATH`, run with the repository as working directory
#[derive(Debug, Clone)]
pub struct SystemGit {
    repo_root: PathBuf,
    timeout: Duration,
}

impl SystemGit {
    pub fn new(repo_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            repo_root: repo_root.into(),
            timeout,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

#[async_trait]
impl GitRunner for SystemGit {
    async fn run(&self, args: &[&str]) -> Result<CommandOutput, CommandError> {
        let invocation = Invocation::new("git")
            .args(args)
            .current_dir(&self.repo_root);
        command::run(&invocation, self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGit;
    use tempfile::tempdir;

    #[test]
    fn command_line_quotes_messages() {
        assert_eq!(
            command_line(&["commit", "-m", "Update archive"]),
            "git commit -m \"Update archive\""
        );
    }

    #[tokio::test]
    async fn run_checked_turns_exit_status_into_error() {
        let git = ScriptedGit::new().on(&["status"], 128, "", "fatal: not a git repository");

        let result = run_checked(&git, &["status", "--porcelain"]).await;

        match result.unwrap_err() {
            CommandError::Failed { command, code, .. } => {
                assert_eq!(command, "git status --porcelain");
                assert_eq!(code, Some(128));
            }
            other => panic!("Expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn system_git_runs_in_repository() {
        let dir = tempdir().unwrap();
        let git = SystemGit::new(dir.path(), Duration::from_secs(30));

        // Environments without git cannot exercise the real binary
        let Ok(version) = git.run(&["--version"]).await else {
            return;
        };
        assert!(version.success());
        assert!(version.stdout.starts_with("git version"));

        run_checked(&git, &["init", "--quiet"]).await.unwrap();
        assert!(dir.path().join(".git").exists());
        assert_eq!(git.repo_root(), dir.path());
    }
}
