//! Command-line front end

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use tokio_util::sync::CancellationToken;

use crate::downloader::{
    DownloadRequest, Downloader, Phase, ProgressSink, QualitySpec, YtDlpBackend, YtDlpConfig,
};

/// Download YouTube videos
#[derive(Debug, Parser)]
#[command(name = "tube-fetch", version, about = "Download YouTube videos")]
pub struct Cli {
    /// YouTube video URL
    pub url: String,

    /// Video resolution (highest, lowest, or specific like 720p)
    #[arg(short, long, default_value = "highest")]
    pub resolution: String,

    /// Output directory for downloaded videos
    #[arg(short, long, default_value = "downloads")]
    pub output: PathBuf,

    /// Maximum number of retry attempts
    #[arg(short = 't', long, default_value_t = 3)]
    pub retries: u32,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,

    /// Proxy URL passed to yt-dlp and the transfer client
    #[arg(long, env = "TUBE_FETCH_PROXY")]
    pub proxy: Option<String>,

    /// cookies.txt file for age-gated or members-only videos
    #[arg(long)]
    pub cookies: Option<PathBuf>,

    /// Explicit yt-dlp binary
    #[arg(long, env = "YTDLP_PATH")]
    pub ytdlp: Option<PathBuf>,
}

/// Install the tracing subscriber. `RUST_LOG` wins over `--verbose`;
/// `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "tube_fetch_lib=debug"
    } else {
        "tube_fetch_lib=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json_format {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// Progress sink for console mode
struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn on_progress(&self, percentage: f64) {
        print!("\rDownload progress: {:.2}%", percentage);
        let _ = std::io::stdout().flush();
    }

    fn on_phase(&self, phase: Phase) {
        if phase == Phase::Retrying {
            println!();
        }
    }
}

/// Parse arguments from the process and run
pub fn main_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    Ok(runtime.block_on(run(cli)))
}

/// Handle CLI download
pub async fn run(cli: Cli) -> ExitCode {
    let quality = match cli.resolution.parse::<QualitySpec>() {
        Ok(quality) => quality,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let request = match DownloadRequest::new(&cli.url, quality, &cli.output, cli.retries) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = YtDlpConfig::from_env()
        .with_binary(cli.ytdlp.clone())
        .with_proxy(cli.proxy.clone())
        .with_cookies_path(cli.cookies.clone());
    let backend = match YtDlpBackend::new(config) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if cli.verbose {
        let info = backend.tools().tool_info();
        tracing::debug!(path = ?info.path, version = ?info.version, "Using yt-dlp");
    }

    println!("Downloading video: {}", request.identifier());
    println!("Resolution: {}", request.quality());
    println!("Output directory: {}", request.destination().display());
    println!("Maximum retries: {}", request.max_retries());

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - stopping after the current step");
                cancel.cancel();
            }
        }
    });

    let downloader = Downloader::new(Arc::new(backend))
        .with_progress_sink(Arc::new(ConsoleSink))
        .with_cancel_token(cancel);

    println!("Starting download...");
    let (path, message) = downloader.download(&request).await.into_parts();

    match path {
        Some(path) => {
            println!("\n{}", message);
            println!("Video saved to: {}", path.display());
            ExitCode::SUCCESS
        }
        None => {
            println!("\nError: {}", message);
            println!("\nTroubleshooting tips:");
            println!("1. Check your internet connection");
            println!("2. Update yt-dlp with: yt-dlp -U (or pip3 install -U yt-dlp)");
            println!("3. Verify the YouTube URL is correct and the video is available");
            println!("4. Try a different resolution");
            ExitCode::FAILURE
        }
    }
}
