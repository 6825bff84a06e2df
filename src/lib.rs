//! Audioforge - video to MP3 conversion service
//!
//! This library crate exposes the core functionality for integration testing.

pub mod artifacts;
pub mod config;
pub mod conversion;
pub mod quota;
pub mod server;
pub mod upload;
