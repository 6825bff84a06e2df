use audioforge_av::AudioFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub quota: QuotaConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Overridden by the `PORT` environment variable
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL used to build download links (default: http://localhost:{port})
    #[serde(default)]
    pub public_url: Option<String>,

    /// Front-end assets served for any unmatched route
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
            static_dir: None,
        }
    }
}

impl ServerConfig {
    /// Base URL for download links, without a trailing slash.
    pub fn base_url(&self) -> String {
        match self.public_url {
            Some(ref url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuotaConfig {
    /// Conversions allowed per calendar day (UTC). Overridden by
    /// `AUDIOFORGE_DAILY_LIMIT`.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,

    /// JSON file holding the persisted counter
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

fn default_daily_limit() -> u32 {
    3
}

fn default_state_file() -> PathBuf {
    PathBuf::from("conversionCount.json")
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            state_file: default_state_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Where uploads are staged while they are converted
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Where converted artifacts wait to be downloaded
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("converted")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            artifact_dir: default_artifact_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// The one content type uploads may declare (default: "video/mp4")
    #[serde(default = "default_accepted_mime")]
    pub accepted_mime: String,

    /// Output format (default: mp3)
    #[serde(default)]
    pub target_format: AudioFormat,

    /// Audio bitrate passed to the encoder (default: "192k")
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    /// Seconds a successful conversion's files are kept (default: 300)
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Seconds cleanup is pushed back when a download starts close to
    /// expiry (default: 60)
    #[serde(default = "default_download_grace_secs")]
    pub download_grace_secs: u64,

    /// Seconds before a running conversion is killed (default: 600)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Largest accepted upload in bytes (default: 512 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_accepted_mime() -> String {
    "video/mp4".to_string()
}

fn default_bitrate() -> String {
    "192k".to_string()
}

fn default_retention_secs() -> u64 {
    300
}

fn default_download_grace_secs() -> u64 {
    60
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_max_upload_bytes() -> u64 {
    512 * 1024 * 1024
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            accepted_mime: default_accepted_mime(),
            target_format: AudioFormat::default(),
            bitrate: default_bitrate(),
            retention_secs: default_retention_secs(),
            download_grace_secs: default_download_grace_secs(),
            timeout_secs: default_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ConversionConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn download_grace(&self) -> Duration {
        Duration::from_secs(self.download_grace_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}
