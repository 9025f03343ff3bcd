// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! External audio transcoder and speech-to-text tool.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::command::{self, Invocation};
use crate::config::{TranscoderSettings, TranscriberSettings};
use crate::error::CommandError;

/// Converts downloaded audio into the format the transcriber expects
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), CommandError>;
}

/// Turns audio into a plain-text transcript
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio`, writing `<output_prefix>.txt`
    ///
    /// Returns the path the transcript is expected at. A zero exit status
    /// does not guarantee the file exists; callers check.
    async fn transcribe(&self, audio: &Path, output_prefix: &Path)
    -> Result<PathBuf, CommandError>;
}

/// Path of the text file written for `prefix`
pub fn transcript_path(prefix: &Path) -> PathBuf {
    let mut name: OsString = prefix.as_os_str().to_owned();
    name.push(".txt");
    PathBuf::from(name)
}

/// Transcoder backed by an ffmpeg-compatible command line tool
#[derive(Debug, Clone)]
pub struct ExternalTranscoder {
    settings: TranscoderSettings,
    timeout: Duration,
}

impl ExternalTranscoder {
    pub fn new(settings: TranscoderSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }

    fn invocation(&self, input: &Path, output: &Path) -> Invocation {
        let mut invocation = Invocation::new(&self.settings.program);
        if self.settings.overwrite {
            invocation = invocation.arg("-y");
        }
        invocation
            .arg("-i")
            .arg(input)
            .arg("-ar")
            .arg(self.settings.sample_rate.to_string())
            .arg("-ac")
            .arg(self.settings.channels.to_string())
            .arg("-c:a")
            .arg(&self.settings.codec)
            .arg(output)
    }
}

#[async_trait]
impl Transcoder for ExternalTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), CommandError> {
        let invocation = self.invocation(input, output);
        command::run(&invocation, self.timeout)
            .await?
            .check(&invocation.display())?;
        Ok(())
    }
}

/// Transcriber backed by a whisper.cpp-style command line tool
#[derive(Debug, Clone)]
pub struct ExternalTranscriber {
    settings: TranscriberSettings,
    timeout: Duration,
}

impl ExternalTranscriber {
    pub fn new(settings: TranscriberSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }

    fn invocation(&self, audio: &Path, output_prefix: &Path) -> Invocation {
        Invocation::new(&self.settings.program)
            .arg("-m")
            .arg(&self.settings.model)
            .arg("-f")
            .arg(audio)
            .arg("-otxt")
            .arg("--output-file")
            .arg(output_prefix)
    }
}

#[async_trait]
impl Transcriber for ExternalTranscriber {
    async fn transcribe(
        &self,
        audio: &Path,
        output_prefix: &Path,
    ) -> Result<PathBuf, CommandError> {
        let invocation = self.invocation(audio, output_prefix);
        let output = command::run(&invocation, self.timeout)
            .await?
            .check(&invocation.display())?;

        if !output.stderr.is_empty() {
            tracing::trace!(stderr = %output.stderr.trim(), "transcriber diagnostics");
        }

        Ok(transcript_path(output_prefix))
    }
}
