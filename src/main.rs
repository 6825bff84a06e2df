mod cli;

use audioforge::{config, quota::QuotaStore, server};
use audioforge_av::{FfmpegTranscoder, Transcoder};
use audioforge_common::paths::derive_output_name;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI flags win over file and environment
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting audioforge server");
    tracing::info!(
        "Daily limit {}, retention {}s, staging {:?}, artifacts {:?}",
        config.quota.daily_limit,
        config.conversion.retention_secs,
        config.storage.staging_dir,
        config.storage.artifact_dir
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "audioforge=trace,audioforge_av=trace,audioforge_common=debug,tower_http=debug"
                .to_string()
        } else {
            "audioforge=debug,audioforge_av=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Convert { input, output } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_file(&input, output, cli.config.as_deref()))
        }
        Commands::Quota => show_quota(cli.config.as_deref()),
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("audioforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn convert_file(input: &Path, output: Option<PathBuf>, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let format = config.conversion.target_format;
    let output = output.unwrap_or_else(|| {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        input.with_file_name(derive_output_name(&name, format.extension()))
    });

    let same_file = output == input
        || matches!((input.canonicalize(), output.canonicalize()), (Ok(a), Ok(b)) if a == b);
    if same_file {
        anyhow::bail!(
            "Output would overwrite the input {:?}; pass --output to choose another path",
            input
        );
    }

    let transcoder = FfmpegTranscoder::discover(config.tools.ffmpeg_path.as_deref())
        .context("ffmpeg is required to convert files")?
        .with_bitrate(config.conversion.bitrate.clone())
        .with_timeout(config.conversion.timeout());

    tracing::info!("Converting {:?} -> {:?}", input, output);
    transcoder
        .transcode(input, &output, format)
        .await
        .with_context(|| format!("Failed to convert {:?}", input))?;

    println!("{}", output.display());
    Ok(())
}

fn show_quota(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let path = &config.quota.state_file;

    if !path.exists() {
        println!("No conversions recorded yet ({:?} does not exist)", path);
        return Ok(());
    }

    let record = QuotaStore::open(path).snapshot();
    println!("Conversions: {} / {}", record.count, config.quota.daily_limit);
    println!("Last reset:  {}", record.last_reset_date.to_rfc3339());
    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    let tools = audioforge_av::check_tools();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to enable conversions.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Download URL base: {}", config.server.base_url());
    println!("  Daily limit: {}", config.quota.daily_limit);
    println!("  Accepted type: {}", config.conversion.accepted_mime);
    println!("  Target format: {}", config.conversion.target_format);
    println!("  Retention: {}s", config.conversion.retention_secs);
    println!("  Staging dir: {:?}", config.storage.staging_dir);
    println!("  Artifact dir: {:?}", config.storage.artifact_dir);

    Ok(())
}
