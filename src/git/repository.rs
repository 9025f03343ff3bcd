// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use crate::config::PublishSettings;
use crate::error::{HostingError, RepositoryError};
use crate::hosting::RepositoryHost;

use super::runner::{GitRunner, run_checked};

/// How the local repository was found or created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryState {
    /// A git repository already existed
    Existing,
    /// Cloned from the remote into an empty directory
    Cloned,
    /// Initialized in place with `origin` pointing at the remote
    Initialized,
}

/// Make sure git works, the remote exists and `repo_root` is a clone of it
///
/// `git` must run with `repo_root` as its working directory; the directory
/// is created first.
pub async fn prepare_repository(
    git: &dyn GitRunner,
    host: Option<&dyn RepositoryHost>,
    settings: &PublishSettings,
    repo_root: &Path,
) -> Result<RepositoryState, RepositoryError> {
    std::fs::create_dir_all(repo_root).map_err(|e| RepositoryError::CreateDirectoryFailed {
        path: repo_root.to_path_buf(),
        source: e,
    })?;

    let version = run_checked(git, &["--version"])
        .await
        .map_err(RepositoryError::GitUnavailable)?;
    tracing::debug!(version = %version.stdout.trim(), "found git");

    if let (Some(host), Some(github)) = (host, settings.github.as_ref()) {
        ensure_remote_repository(host, github.private, github.create_if_missing).await?;
    }

    if repo_root.join(".git").exists() {
        ensure_origin(git, &settings.remote_url).await?;
        return Ok(RepositoryState::Existing);
    }

    if is_empty_dir(repo_root) {
        run_checked(git, &["clone", settings.remote_url.as_str(), "."])
            .await
            .map_err(|source| RepositoryError::Git {
                step: "clone the remote repository",
                source,
            })?;
        tracing::info!(remote = %settings.remote_url, "cloned repository");
        return Ok(RepositoryState::Cloned);
    }

    tracing::warn!(
        path = %repo_root.display(),
        "directory is not empty and not a git repository; initializing in place"
    );
    run_checked(git, &["init", "--initial-branch", settings.branch.as_str()])
        .await
        .map_err(|source| RepositoryError::Git {
            step: "initialize the repository",
            source,
        })?;
    ensure_origin(git, &settings.remote_url).await?;
    Ok(RepositoryState::Initialized)
}

async fn ensure_remote_repository(
    host: &dyn RepositoryHost,
    private: bool,
    create_if_missing: bool,
) -> Result<(), RepositoryError> {
    if host.repository_exists().await? {
        return Ok(());
    }

    if !create_if_missing {
        return Err(RepositoryError::Hosting(HostingError::NotFound {
            resource: "remote repository (set github.create_if_missing to create it)".to_string(),
        }));
    }

    host.create_repository(private).await?;
    Ok(())
}

/// Point `origin` at `remote_url`, adding or correcting it as needed
async fn ensure_origin(git: &dyn GitRunner, remote_url: &str) -> Result<(), RepositoryError> {
    let current = git
        .run(&["remote", "get-url", "origin"])
        .await
        .map_err(|source| RepositoryError::Git {
            step: "read the origin remote",
            source,
        })?;

    let args: [&str; 4] = if !current.success() {
        ["remote", "add", "origin", remote_url]
    } else if current.stdout.trim() != remote_url {
        tracing::warn!(
            from = %current.stdout.trim(),
            to = %remote_url,
            "origin points elsewhere; updating"
        );
        ["remote", "set-url", "origin", remote_url]
    } else {
        return Ok(());
    };

    run_checked(git, &args)
        .await
        .map_err(|source| RepositoryError::Git {
            step: "configure the origin remote",
            source,
        })?;
    Ok(())
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitHubSettings;
    use crate::testing::{FakeHost, ScriptedGit};
    use tempfile::tempdir;

    fn settings(github: Option<GitHubSettings>) -> PublishSettings {
        PublishSettings {
            remote_url: "git@github.com:someone/archive.git".to_string(),
            branch: "main".to_string(),
            commit_message: "Update".to_string(),
            github,
        }
    }

    fn github(create_if_missing: bool) -> GitHubSettings {
        GitHubSettings {
            owner: "someone".to_string(),
            repository: "archive".to_string(),
            token: "t".to_string(),
            private: true,
            create_if_missing,
            enable_pages: false,
        }
    }

    #[tokio::test]
    async fn missing_git_is_fatal() {
        let dir = tempdir().unwrap();
        let git = ScriptedGit::new().on(&["--version"], 127, "", "git: not found");

        let result = prepare_repository(&git, None, &settings(None), dir.path()).await;

        assert!(matches!(result, Err(RepositoryError::GitUnavailable(_))));
        assert_eq!(git.calls(), vec!["--version"]);
    }

    #[tokio::test]
    async fn empty_directory_is_cloned() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("archive");
        let git = ScriptedGit::new();

        let state = prepare_repository(&git, None, &settings(None), &root)
            .await
            .unwrap();

        assert_eq!(state, RepositoryState::Cloned);
        assert!(root.exists());
        assert!(git.called("clone git@github.com:someone/archive.git ."));
    }

    #[tokio::test]
    async fn non_empty_directory_is_initialized_in_place() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        let git = ScriptedGit::new().on(&["remote", "get-url"], 2, "", "error: No such remote");

        let state = prepare_repository(&git, None, &settings(None), dir.path())
            .await
            .unwrap();

        assert_eq!(state, RepositoryState::Initialized);
        assert!(git.called("init --initial-branch main"));
        assert!(git.called("remote add origin git@github.com:someone/archive.git"));
        assert!(!git.called("clone"));
    }

    #[tokio::test]
    async fn existing_repository_gets_origin_corrected() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let git = ScriptedGit::new().on(&["remote", "get-url"], 0, "https://old/remote.git\n", "");

        let state = prepare_repository(&git, None, &settings(None), dir.path())
            .await
            .unwrap();

        assert_eq!(state, RepositoryState::Existing);
        assert!(git.called("remote set-url origin git@github.com:someone/archive.git"));
    }

    #[tokio::test]
    async fn matching_origin_is_left_alone() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let git = ScriptedGit::new().on(
            &["remote", "get-url"],
            0,
            "git@github.com:someone/archive.git\n",
            "",
        );

        prepare_repository(&git, None, &settings(None), dir.path())
            .await
            .unwrap();

        assert!(!git.called("remote add"));
        assert!(!git.called("remote set-url"));
    }

    #[tokio::test]
    async fn missing_remote_is_created_when_allowed() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let git = ScriptedGit::new();
        let host = FakeHost::default();

        prepare_repository(&git, Some(&host), &settings(Some(github(true))), dir.path())
            .await
            .unwrap();

        assert_eq!(host.calls(), vec!["exists", "create private=true"]);
    }

    #[tokio::test]
    async fn missing_remote_is_fatal_otherwise() {
        let dir = tempdir().unwrap();
        let git = ScriptedGit::new();
        let host = FakeHost::default();

        let result =
            prepare_repository(&git, Some(&host), &settings(Some(github(false))), dir.path())
                .await;

        assert!(matches!(result, Err(RepositoryError::Hosting(_))));
        assert!(!git.called("clone"));
    }
}
