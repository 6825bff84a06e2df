//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires a full [`AppContext`] over a temp
//! directory with a scripted [`FakeTranscoder`] standing in for ffmpeg. The
//! [`TestHarness::with_server`] constructor starts Axum on a random port for
//! HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use audioforge::config::Config;
use audioforge::server::{create_router, AppContext};
use audioforge_av::{AudioFormat, Transcoder};
use tempfile::TempDir;

pub const BOUNDARY: &str = "audioforge-test-boundary";

/// Transcoder that never spawns a process.
///
/// On success the output is `ID3` followed by the input bytes.
pub struct FakeTranscoder {
    fail: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeTranscoder {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::succeeding()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::succeeding()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    fn name(&self) -> &str {
        "fake"
    }

    async fn transcode(&self, input: &Path, output: &Path, _format: AudioFormat) -> audioforge_av::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        if self.fail {
            return Err(audioforge_av::Error::tool_failed(
                "fake",
                "Invalid data found when processing input",
            ));
        }

        let mut bytes = b"ID3".to_vec();
        bytes.extend(tokio::fs::read(input).await?);
        tokio::fs::write(output, bytes).await?;
        Ok(())
    }
}

/// Full application context over a temp directory.
pub struct TestHarness {
    pub dir: TempDir,
    pub ctx: AppContext,
    pub transcoder: Arc<FakeTranscoder>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::build(FakeTranscoder::succeeding(), |_| {})
    }

    pub fn failing() -> Self {
        Self::build(FakeTranscoder::failing(), |_| {})
    }

    /// Build a harness, letting the caller adjust the config first.
    pub fn build(transcoder: FakeTranscoder, configure: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut config = Config::default();
        config.server.public_url = Some("http://audio.test".to_string());
        config.quota.state_file = dir.path().join("conversionCount.json");
        config.storage.staging_dir = dir.path().join("uploads");
        config.storage.artifact_dir = dir.path().join("converted");
        configure(&mut config);

        let transcoder = Arc::new(transcoder);
        let ctx = AppContext::build(config, Arc::clone(&transcoder) as Arc<dyn Transcoder>)
            .expect("failed to build context");

        Self {
            dir,
            ctx,
            transcoder,
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let app = create_router(harness.ctx.clone(), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.ctx.config.storage.staging_dir.clone()
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.ctx.config.storage.artifact_dir.clone()
    }

    pub fn staged_count(&self) -> usize {
        count_files(&self.staging_dir())
    }

    pub fn artifact_count(&self) -> usize {
        count_files(&self.artifact_dir())
    }
}

pub fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Encode a single-file multipart body. Returns the `Content-Type` header
/// value and the body bytes.
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

/// Poll until `done` holds, for at most three seconds.
pub async fn eventually(done: impl Fn() -> bool) -> bool {
    for _ in 0..300 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    done()
}
