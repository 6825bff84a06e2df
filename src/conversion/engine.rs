//! Engine adapter.
//!
//! Runs a [`Transcoder`] on its own task and reports the outcome once over a
//! oneshot channel.

use audioforge_av::transcode::partial_path;
use audioforge_av::{AudioFormat, Transcoder};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;

/// Result of one engine run. The error is a diagnostic for logs only.
pub type EngineOutcome = std::result::Result<(), String>;

/// Completion handle for a running conversion.
///
/// Resolves exactly once. If the engine task disappears without reporting,
/// the handle resolves to a failure.
pub struct ConversionHandle {
    rx: oneshot::Receiver<EngineOutcome>,
}

impl Future for ConversionHandle {
    type Output = EngineOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(outcome) => outcome,
            Err(_) => Err("engine task ended without reporting".to_string()),
        })
    }
}

#[derive(Clone)]
pub struct ConversionEngine {
    transcoder: Arc<dyn Transcoder>,
    timeout: Option<Duration>,
}

impl ConversionEngine {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            transcoder,
            timeout: None,
        }
    }

    /// Kill conversions that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        self.transcoder.name()
    }

    /// Start converting `input` into `output`.
    ///
    /// Returns immediately; the work happens on a spawned task.
    pub fn start(&self, input: PathBuf, output: PathBuf, format: AudioFormat) -> ConversionHandle {
        let (tx, rx) = oneshot::channel();
        let transcoder = Arc::clone(&self.transcoder);
        let timeout = self.timeout;

        tokio::spawn(async move {
            let run = transcoder.transcode(&input, &output, format);

            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, run).await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => {
                        // The dropped future kills the child; its partial
                        // output is left behind.
                        let partial = partial_path(&output);
                        if let Err(e) = crate::upload::remove_if_present(&partial).await {
                            tracing::warn!("Failed to remove {:?}: {}", partial, e);
                        }
                        Err(format!(
                            "{} timed out after {:?}",
                            transcoder.name(),
                            limit
                        ))
                    }
                },
                None => run.await.map_err(|e| e.to_string()),
            };

            if tx.send(outcome).is_err() {
                tracing::debug!(output = %output.display(), "Conversion finished with nobody waiting");
            }
        });

        ConversionHandle { rx }
    }
}
