//! Conversion pipeline.
//!
//! - [`ConversionEngine`] runs the transcoder off the request path and
//!   reports back over a oneshot channel
//! - [`ConversionOrchestrator`] drives one request from quota check to
//!   response
//! - [`CleanupScheduler`] deletes a job's files once retention expires

pub mod cleanup;
mod engine;
mod orchestrator;

pub use cleanup::{sweep_orphans, CleanupScheduler};
pub use engine::{ConversionEngine, ConversionHandle, EngineOutcome};
pub use orchestrator::{ConversionOrchestrator, ConversionResponse};
