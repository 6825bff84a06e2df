mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Environment variable overriding `server.port`
pub const PORT_ENV: &str = "PORT";

/// Environment variable overriding `quota.daily_limit`
pub const DAILY_LIMIT_ENV: &str = "AUDIOFORGE_DAILY_LIMIT";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./config.toml",
        "./audioforge.toml",
        "~/.config/audioforge/config.toml",
        "/etc/audioforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

/// Apply `PORT` and `AUDIOFORGE_DAILY_LIMIT` on top of file values
fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(port) = std::env::var(PORT_ENV) {
        config.server.port = port
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value: {:?}", PORT_ENV, port))?;
    }

    if let Ok(limit) = std::env::var(DAILY_LIMIT_ENV) {
        config.quota.daily_limit = limit
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value: {:?}", DAILY_LIMIT_ENV, limit))?;
    }

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.quota.daily_limit == 0 {
        anyhow::bail!("Daily conversion limit must be at least 1");
    }

    if config.conversion.accepted_mime.trim().is_empty() {
        anyhow::bail!("conversion.accepted_mime cannot be empty");
    }

    if config.storage.staging_dir == config.storage.artifact_dir {
        anyhow::bail!("Staging and artifact directories must differ");
    }

    if config.conversion.timeout_secs == 0 {
        tracing::warn!("conversion.timeout_secs is 0; conversions run without a time limit");
    }

    if let Some(ref path) = config.tools.ffmpeg_path {
        if !path.exists() {
            tracing::warn!("Configured ffmpeg path does not exist: {:?}", path);
        }
    }

    Ok(())
}
