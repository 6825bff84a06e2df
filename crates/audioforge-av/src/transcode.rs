//! Video-to-audio transcoding.
//!
//! [`Transcoder`] is the seam between the conversion pipeline and whatever
//! engine does the work. [`FfmpegTranscoder`] drives the ffmpeg CLI.

use crate::{tools, Error, Result, ToolCommand};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Target audio formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MPEG-1 Audio Layer III
    #[default]
    Mp3,
}

impl AudioFormat {
    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
        }
    }

    /// MIME type used when serving the file.
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
        }
    }

    /// ffmpeg muxer name passed to `-f`.
    pub fn ffmpeg_format(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
        }
    }

    /// ffmpeg encoder name passed to `-codec:a`.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "libmp3lame",
        }
    }
}

impl FromStr for AudioFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            other => Err(Error::Unsupported(format!("audio format: {other}"))),
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Converts a media file into an audio file.
///
/// Implementations must leave nothing at `output` unless the conversion
/// succeeded completely.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Convert `input` into `output` in the given format.
    async fn transcode(&self, input: &Path, output: &Path, format: AudioFormat) -> Result<()>;
}

/// Path the engine writes to before the output is moved into place.
pub fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    output.with_file_name(name)
}

/// Transcoder backed by the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    bitrate: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    /// Default audio bitrate.
    pub const DEFAULT_BITRATE: &'static str = "192k";

    /// Default watchdog timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

    /// Create a transcoder for the ffmpeg executable at `program`.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            bitrate: Self::DEFAULT_BITRATE.to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Locate ffmpeg, preferring a configured path over `PATH`.
    pub fn discover(configured: Option<&Path>) -> Result<Self> {
        tools::resolve_tool("ffmpeg", configured).map(Self::new)
    }

    /// Set the audio bitrate (ffmpeg syntax, e.g. `192k`).
    pub fn with_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.bitrate = bitrate.into();
        self
    }

    /// Set the watchdog timeout. `Duration::ZERO` lets ffmpeg run unbounded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path of the ffmpeg executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, input: &Path, partial: &Path, format: AudioFormat) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.program.clone());
        cmd.args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .path_arg(input)
            // Drop video, keep the first audio stream
            .args(["-vn", "-map", "0:a:0"])
            .args(["-codec:a", format.ffmpeg_codec()])
            .args(["-b:a", self.bitrate.as_str()])
            // The .part suffix hides the extension, so name the muxer
            .args(["-f", format.ffmpeg_format()])
            .path_arg(partial)
            .timeout(self.timeout);
        cmd
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn transcode(&self, input: &Path, output: &Path, format: AudioFormat) -> Result<()> {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(Error::file_not_found(input));
        }

        let partial = partial_path(output);

        #[cfg(feature = "tracing")]
        tracing::debug!(input = %input.display(), output = %output.display(), %format, "Running ffmpeg");

        let result = self.command(input, &partial, format).execute().await;

        if let Err(e) = result {
            if let Err(rm) = tokio::fs::remove_file(&partial).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(path = %partial.display(), "Failed to remove partial output: {}", rm);
                }
            }
            return Err(e);
        }

        tokio::fs::rename(&partial, output).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(output = %output.display(), "ffmpeg finished");

        Ok(())
    }
}
