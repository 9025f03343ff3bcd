// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed invocation of external programs.
//!
//! Programs are always started with an argument vector, never through a
//! shell. Every invocation is bounded by a timeout; the child is killed when
//! the timeout elapses.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::CommandError;

/// A program plus its arguments and working directory
#[derive(Debug, Clone)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn program(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Human readable command line, used in logs and error messages
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| {
                let part = part.to_string_lossy();
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("\"{part}\"")
                } else {
                    part.into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished program
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into [`CommandError::Failed`]
    pub fn check(self, command: &str) -> Result<Self, CommandError> {
        if self.success() {
            Ok(self)
        } else {
            Err(CommandError::Failed {
                command: command.to_string(),
                code: self.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }

    /// Whether either stream contains `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.stdout.contains(needle) || self.stderr.contains(needle)
    }
}

/// Run a program to completion, capturing both output streams
///
/// A non-zero exit status is not an error at this level; callers decide
/// with [`CommandOutput::check`] or by inspecting the output.
pub async fn run(invocation: &Invocation, timeout: Duration) -> Result<CommandOutput, CommandError> {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &invocation.current_dir {
        command.current_dir(dir);
    }

    tracing::debug!(command = %invocation.display(), "running");

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(result) => result.map_err(|e| CommandError::SpawnFailed {
            program: invocation.program(),
            source: e,
        })?,
        Err(_) => {
            return Err(CommandError::TimedOut {
                command: invocation.display(),
                timeout,
            });
        }
    };

    Ok(CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let invocation = Invocation::new("git")
            .args(["commit", "-m"])
            .arg("Update archive");

        assert_eq!(invocation.display(), "git commit -m \"Update archive\"");
    }

    #[test]
    fn check_passes_successful_output_through() {
        let output = CommandOutput {
            code: Some(0),
            stdout: "ok".to_string(),
            stderr: String::new(),
        };

        assert_eq!(output.check("true").unwrap().stdout, "ok");
    }

    #[test]
    fn check_reports_exit_code_and_stderr() {
        let output = CommandOutput {
            code: Some(128),
            stdout: String::new(),
            stderr: "fatal: not a git repository\n".to_string(),
        };

        match output.check("git status").unwrap_err() {
            CommandError::Failed {
                command,
                code,
                stderr,
            } => {
                assert_eq!(command, "git status");
                assert_eq!(code, Some(128));
                assert_eq!(stderr, "fatal: not a git repository");
            }
            other => panic!("Expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn mentions_searches_both_streams() {
        let output = CommandOutput {
            code: Some(1),
            stdout: "No stash entries found.".to_string(),
            stderr: String::new(),
        };

        assert!(output.mentions("No stash entries found"));
        assert!(!output.mentions("conflict"));
    }

    #[tokio::test]
    async fn run_reports_missing_program() {
        let invocation = Invocation::new("podscribe-definitely-not-a-program");
        let result = run(&invocation, Duration::from_secs(5)).await;

        assert!(matches!(result, Err(CommandError::SpawnFailed { .. })));
    }
}
