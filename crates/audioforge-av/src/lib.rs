//! # audioforge-av
//!
//! External transcoder invocation for audioforge.
//!
//! This crate provides functionality for:
//! - Detecting the external tools the service relies on (ffmpeg, ffprobe)
//! - Running external tools asynchronously with a watchdog timeout
//! - Converting a video file into an audio file through the [`Transcoder`]
//!   abstraction, with [`FfmpegTranscoder`] as the production implementation
//!
//! ## Features
//!
//! - `tracing` - Enable tracing support
//!
//! ## Example
//!
//! ```no_run
//! use audioforge_av::{AudioFormat, FfmpegTranscoder, Transcoder};
//! use std::path::Path;
//!
//! # async fn example() -> audioforge_av::Result<()> {
//! let ffmpeg = FfmpegTranscoder::discover(None)?;
//! ffmpeg
//!     .transcode(Path::new("clip.mp4"), Path::new("clip.mp3"), AudioFormat::Mp3)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod command;
mod error;
pub mod tools;
pub mod transcode;

// Re-exports
pub use command::{ToolCommand, ToolOutput};
pub use error::{Error, Result};
pub use tools::{check_tool, check_tools, resolve_tool, ToolInfo};
pub use transcode::{AudioFormat, FfmpegTranscoder, Transcoder};
