//! Audioforge-Common: Shared types and utilities.
//!
//! This crate provides common functionality used across audioforge:
//!
//! - **Typed IDs**: The conversion job identifier used to key staged uploads
//!   and artifacts on disk
//! - **Path Utilities**: Derived output names and retrieval-name validation
//! - **Error Handling**: The conversion pipeline's error taxonomy
//!
//! # Examples
//!
//! ```
//! use audioforge_common::{Error, JobId, Result};
//! use audioforge_common::paths::derive_output_name;
//!
//! let job_id = JobId::new();
//! assert_eq!(derive_output_name("holiday.mp4", "mp3"), "holiday.mp3");
//!
//! fn example() -> Result<()> {
//!     Err(Error::artifact_not_found("missing.mp3"))
//! }
//! # let _ = job_id;
//! ```

pub mod error;
pub mod ids;
pub mod paths;

pub use error::{Error, Result};
pub use ids::*;
