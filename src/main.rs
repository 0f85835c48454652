use std::path::PathBuf;
use std::time::Duration;
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use tokio::sync::mpsc;

use relay_downloader::config::{AppConfig, ProgressRounding};
use relay_downloader::downloader::{DownloadOrchestrator, UiState};
use relay_downloader::formats::{FormatKey, FORMAT_CATALOG};
use relay_downloader::RelayClient;

#[derive(Parser, Debug)]
#[command(name = "relay-dl", version, about = "Convert and download videos through a remote conversion service")]
struct Cli {
    /// Config file (JSON). Defaults to the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the CORS relay
    #[arg(long, global = true)]
    relay: Option<String>,

    /// Milliseconds between status polls
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    /// How progress is turned into a percentage: round or truncate
    #[arg(long, global = true)]
    rounding: Option<ProgressRounding>,

    /// Give up after this many status polls
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    /// Give up when the job is still running after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Only accept URLs from known video hosts
    #[arg(long, global = true)]
    strict: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the supported output formats
    Formats,
    /// Show title, author and thumbnail of a video
    Info { url: String },
    /// Convert a video and print (or save) the download link
    Get {
        url: String,
        #[arg(short, long, default_value = "mp3")]
        format: FormatKey,
        /// Save the finished file into the download directory
        #[arg(long)]
        save: bool,
        /// Override the download directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Write the effective configuration to the config file
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let config = load_config(&cli)?;
    info!("Relay: {}", config.relay_base_url);

    match cli.command {
        Commands::Formats => {
            for descriptor in FORMAT_CATALOG.iter() {
                println!("{:<12} {}", descriptor.key.as_str(), descriptor.display_name());
            }
            Ok(())
        }
        Commands::InitConfig => {
            let path = config.save(cli.config.as_deref())?;
            println!("Configuration written to {}", path.display());
            Ok(())
        }
        Commands::Info { ref url } => {
            let orchestrator = DownloadOrchestrator::new(RelayClient::from_config(&config)?, &config);
            let metadata = orchestrator.request_metadata(url).await?;
            println!("Title:     {}", metadata.title);
            if let Some(author) = &metadata.author_name {
                println!("By:        {}", author);
            }
            println!("Thumbnail: {}", metadata.thumbnail_url);
            Ok(())
        }
        Commands::Get { ref url, format, save, ref output_dir } => {
            let orchestrator = DownloadOrchestrator::new(RelayClient::from_config(&config)?, &config);
            let final_state = download(&orchestrator, url, format).await;

            match final_state {
                UiState::JobComplete { url: artifact_url, filename } => {
                    println!("Download complete!");
                    println!("{}", artifact_url);
                    println!("Suggested filename: {}", filename);
                    if save {
                        let dir = output_dir.clone().unwrap_or_else(|| config.download_dir.clone());
                        save_artifact(orchestrator.service(), &artifact_url, dir.join(&filename)).await?;
                    }
                    Ok(())
                }
                UiState::Error(message) => Err(anyhow!(message)),
                other => Err(anyhow!("download stopped in state {:?}", other)),
            }
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        // A file named with --config must load.
        Some(path) => AppConfig::load(Some(path.as_path()))
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => match AppConfig::load(None) {
            Ok(config) => {
                info!("Configuration loaded successfully");
                config
            }
            Err(e) => {
                log::error!("Failed to load configuration: {}", e);
                AppConfig::default()
            }
        },
    };

    if let Some(relay) = &cli.relay {
        config.relay_base_url = relay.clone();
    }
    if let Some(interval_ms) = cli.interval_ms {
        config.poll_interval_ms = interval_ms;
    }
    if let Some(rounding) = cli.rounding {
        config.progress_rounding = rounding;
    }
    if cli.max_attempts.is_some() {
        config.max_poll_attempts = cli.max_attempts;
    }
    if cli.timeout_secs.is_some() {
        config.job_timeout_secs = cli.timeout_secs;
    }
    if cli.strict {
        config.strict_url_validation = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn download(orchestrator: &DownloadOrchestrator<RelayClient>, url: &str, format: FormatKey) -> UiState {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let run = async move {
        let state = orchestrator.run(url, format, &tx).await;
        drop(tx);
        state
    };
    let render = async move {
        let mut renderer = Renderer::new();
        while let Some(state) = rx.recv().await {
            renderer.render(&state);
        }
    };

    let (state, _) = tokio::join!(run, render);
    state
}

struct Renderer {
    bar: ProgressBar,
}

impl Renderer {
    fn new() -> Self {
        let bar = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}") {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    fn render(&mut self, state: &UiState) {
        match state {
            UiState::Idle => {}
            UiState::FetchingMetadata { .. } => self.bar.set_message("Fetching video metadata..."),
            UiState::MetadataReady { metadata, selected: None, .. } => {
                let author = metadata.author_name.as_deref().unwrap_or("unknown");
                self.bar.println(format!("{} (by {})", metadata.title, author));
                self.bar.println(format!("Thumbnail: {}", metadata.thumbnail_url));
            }
            UiState::MetadataReady { .. } => {}
            UiState::JobStarting { format, .. } => {
                self.bar.set_message(format!("Initiating download as {}...", format.descriptor().display_name()));
            }
            UiState::JobInProgress { percent: None, .. } => {
                self.bar.set_message("Waiting for download to start...");
            }
            UiState::JobInProgress { percent: Some(percent), job_id, .. } => {
                self.bar.set_position(u64::from(*percent));
                self.bar.set_message(format!("Converting (job {})", job_id));
            }
            UiState::JobComplete { .. } => {
                self.bar.set_position(100);
                self.bar.finish_and_clear();
            }
            UiState::Error(_) => self.bar.abandon(),
        }
    }
}

async fn save_artifact(client: &RelayClient, artifact_url: &str, target: PathBuf) -> anyhow::Result<()> {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{bytes}/{total_bytes} [{bar:40.green/white}] {binary_bytes_per_sec}") {
        bar.set_style(style.progress_chars("#>-"));
    }

    let progress = bar.clone();
    let written = client
        .save_artifact(artifact_url, &target, move |downloaded, total, _percent| {
            if total > 0 {
                progress.set_length(total);
            }
            progress.set_position(downloaded);
        })
        .await
        .with_context(|| format!("Saving {}", target.display()))?;

    bar.finish_and_clear();
    println!("Saved {} bytes to {}", written, target.display());
    Ok(())
}
