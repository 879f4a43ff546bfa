//! Telegram bot binary for photo2pdf.
//!
//! Maps CLI flags / environment onto `BotConfig`, then long-polls the Bot API
//! and hands each update to its own task.

use anyhow::{Context, Result};
use clap::Parser;
use photo2pdf::transport::telegram::Update;
use photo2pdf::{Bot, BotConfig, RetryPolicy, TelegramTransport, ValidationPolicy};
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run with a token from the environment
  BOT_TOKEN=123456:ABC... photo2pdf-bot

  # Reject undecodable photos as soon as they arrive
  photo2pdf-bot --validate-on-ingest

  # Smaller margins, lower JPEG quality, verbose logs
  photo2pdf-bot --margin 15 --quality 85 --verbose

  # Also append logs to a file
  photo2pdf-bot --log-file bot.log

ENVIRONMENT VARIABLES:
  BOT_TOKEN               Bot API token (required)
  TELEGRAM_API_URL        Bot API base URL (self-hosted API servers)
  RUST_LOG                Log filter, overrides --verbose
  PHOTO2PDF_*             Every flag below, e.g. PHOTO2PDF_QUALITY=90
"#;

/// Collect photos in Telegram and send them back as one PDF.
#[derive(Parser, Debug)]
#[command(
    name = "photo2pdf-bot",
    version,
    about = "Telegram bot that converts collected photos into a PDF",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Bot API token.
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    token: String,

    /// Bot API base URL.
    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    api_url: String,

    /// Page margin in points.
    #[arg(long, env = "PHOTO2PDF_MARGIN", default_value_t = 30.0)]
    margin: f64,

    /// JPEG quality for page images (1–100).
    #[arg(long, env = "PHOTO2PDF_QUALITY", default_value_t = 95,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Longest image side after normalization, in pixels.
    #[arg(long, env = "PHOTO2PDF_MAX_DIMENSION", default_value_t = 4096)]
    max_dimension: u32,

    /// Largest accepted photo, in MiB.
    #[arg(long, env = "PHOTO2PDF_MAX_FILE_MB", default_value_t = 50)]
    max_file_mb: u64,

    /// Maximum stored photos per user.
    #[arg(long, env = "PHOTO2PDF_MAX_IMAGES", default_value_t = 200)]
    max_images: usize,

    /// Maximum stored MiB per user.
    #[arg(long, env = "PHOTO2PDF_MAX_USER_MB", default_value_t = 512)]
    max_user_mb: u64,

    /// Decode every photo on arrival instead of at conversion time.
    #[arg(long, env = "PHOTO2PDF_VALIDATE_ON_INGEST")]
    validate_on_ingest: bool,

    /// Seconds after which a stuck conversion no longer blocks the user.
    #[arg(long, env = "PHOTO2PDF_LEASE_TIMEOUT", default_value_t = 600)]
    lease_timeout: u64,

    /// Download attempts per photo.
    #[arg(long, env = "PHOTO2PDF_DOWNLOAD_ATTEMPTS", default_value_t = 3)]
    download_attempts: u32,

    /// Delay between download attempts, in milliseconds.
    #[arg(long, env = "PHOTO2PDF_DOWNLOAD_RETRY_DELAY_MS", default_value_t = 1000)]
    download_retry_delay_ms: u64,

    /// Long-polling timeout in seconds.
    #[arg(long, env = "PHOTO2PDF_POLL_TIMEOUT", default_value_t = 30)]
    poll_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PHOTO2PDF_VERBOSE")]
    verbose: bool,

    /// Also append logs (without colours) to this file.
    #[arg(long, env = "PHOTO2PDF_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn to_config(&self) -> Result<BotConfig> {
        let validation = if self.validate_on_ingest {
            ValidationPolicy::OnIngest
        } else {
            ValidationPolicy::OnConvert
        };

        BotConfig::builder()
            .token(self.token.clone())
            .api_url(self.api_url.clone())
            .margin(self.margin)
            .jpeg_quality(self.quality)
            .max_image_dimension(self.max_dimension)
            .max_file_size(self.max_file_mb * 1024 * 1024)
            .max_images_per_user(self.max_images)
            .max_bytes_per_user(self.max_user_mb * 1024 * 1024)
            .validation(validation)
            .lease_timeout_secs(self.lease_timeout)
            .download_retry(RetryPolicy::new(
                self.download_attempts,
                self.download_retry_delay_ms,
            ))
            .poll_timeout_secs(self.poll_timeout)
            .build()
            .context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug,reqwest=info,hyper=info"
    } else {
        "info,reqwest=warn,hyper=warn"
    };
    let file_layer = match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();

    let config = cli.to_config()?;
    info!("Starting photo2pdf-bot v{}", env!("CARGO_PKG_VERSION"));
    info!("{:?}", config);

    let transport = Arc::new(
        TelegramTransport::new(&config).context("Failed to build HTTP client")?,
    );
    transport
        .drop_pending_updates()
        .await
        .context("Failed to reach the Bot API (check BOT_TOKEN)")?;

    let bot = Bot::new(config, transport.clone());

    tokio::select! {
        _ = poll(&transport, &bot) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Shutting down");
        }
    }
    Ok(())
}

/// Long-poll forever, spawning one task per update.
async fn poll(transport: &TelegramTransport, bot: &Bot) {
    let mut offset: Option<i64> = None;
    loop {
        let updates: Vec<Update> = match transport.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                let wait = match e {
                    photo2pdf::TransportError::RateLimited {
                        retry_after_secs: Some(secs),
                    } => Duration::from_secs(secs),
                    _ => Duration::from_secs(3),
                };
                if e.is_transient() {
                    warn!("getUpdates failed: {}; retrying in {:?}", e, wait);
                } else {
                    error!("getUpdates failed: {}; retrying in {:?}", e, wait);
                }
                tokio::time::sleep(wait).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let bot = bot.clone();
            tokio::spawn(async move { bot.handle(update.into_event()).await });
        }
    }
}
