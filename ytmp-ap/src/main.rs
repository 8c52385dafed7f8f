//! Audio Player (ytmp-ap) - Main entry point
//!
//! Plays tracks from a JSON manifest, fetching audio from a music folder or
//! an HTTP byte source, and takes transport commands from stdin.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ytmp_ap::audio::CpalBackend;
use ytmp_ap::config::{ByteSourceConfig, CliOverrides, PlayerConfig};
use ytmp_ap::console::Command;
use ytmp_ap::playback::{PlaybackCoordinator, SeekController, SliderBounds};
use ytmp_ap::source::{AudioByteSource, FileAudioSource, HttpAudioSource, InMemoryCatalog};
use ytmp_ap::SharedState;
use ytmp_common::config::{ConfigResolver, TomlConfig};
use ytmp_common::human_time;

/// Command-line arguments for ytmp-ap
#[derive(Parser, Debug)]
#[command(name = "ytmp-ap")]
#[command(about = "Audio player for YTMP")]
#[command(version)]
struct Args {
    /// Track manifest (JSON array of {id, durationSeconds, loudnessLufs})
    #[arg(short, long, env = "YTMP_MANIFEST")]
    manifest: PathBuf,

    /// Config file (overrides YTMP_CONFIG and the platform default)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder containing <track id>.<ext> audio files
    #[arg(long, env = "YTMP_MUSIC_FOLDER")]
    music_folder: Option<PathBuf>,

    /// Base URL of the HTTP audio byte source
    #[arg(long, env = "YTMP_AUDIO_BASE_URL")]
    base_url: Option<String>,

    /// Loudness normalization target (LUFS)
    #[arg(long, allow_negative_numbers = true)]
    target_lufs: Option<f64>,

    /// Initial volume multiplier
    #[arg(long)]
    volume: Option<f64>,

    /// Log level used when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = ConfigResolver::new(args.config.clone()).resolve();
    let file_config = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load config file")?;
    let config = PlayerConfig::resolve(
        &file_config,
        &CliOverrides {
            target_lufs: args.target_lufs,
            volume: args.volume,
            audio_base_url: args.base_url.clone(),
            music_folder: args.music_folder.clone(),
            log_level: args.log_level.clone(),
        },
    )
    .context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ytmp_ap={0},ytmp_common={0}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting ytmp-ap {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    let bytes: Arc<dyn AudioByteSource> = match &config.byte_source {
        Some(ByteSourceConfig::Folder { path }) => {
            info!("Music folder: {}", path.display());
            Arc::new(FileAudioSource::new(path.clone()))
        }
        Some(ByteSourceConfig::Http { base_url }) => {
            info!("Audio base URL: {}", base_url);
            Arc::new(HttpAudioSource::new(base_url.clone()).context("Failed to create HTTP source")?)
        }
        None => bail!("No audio source configured: pass --music-folder or --base-url"),
    };

    let catalog = Arc::new(
        InMemoryCatalog::load_manifest(&args.manifest)
            .await
            .with_context(|| format!("Failed to load manifest {}", args.manifest.display()))?,
    );
    let queue = catalog.track_ids().await;

    let state = Arc::new(SharedState::new(config.event_capacity, config.volume));
    let coordinator = PlaybackCoordinator::new(
        Arc::new(CpalBackend::new()),
        bytes,
        catalog,
        Arc::clone(&state),
        config.coordinator_config(),
    );
    coordinator.set_queue(queue.clone()).await;
    let seek = SeekController::new(coordinator.clone());

    println!("{} tracks loaded. Commands: play <id>, toggle, seek <0..1>, repeat off|all|single, shuffle, volume <x>, width <px>, status, quit", queue.len());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        if let Err(e) = run_command(&coordinator, &seek, command).await {
                            warn!("{}", e);
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
            _ = &mut shutdown => break,
        }
    }

    coordinator.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

async fn run_command(
    coordinator: &PlaybackCoordinator,
    seek: &SeekController,
    command: Command,
) -> ytmp_ap::Result<()> {
    match command {
        Command::Play(track_id) => coordinator.select_track(track_id).await?,
        Command::Toggle => coordinator.toggle_play_pause().await?,
        // Console seeks go through the same path as a waveform click
        Command::Seek(fraction) => seek.click(fraction, SliderBounds::new(0.0, 1.0)).await?,
        Command::Repeat(mode) => coordinator.set_repeat_mode(mode).await,
        Command::Shuffle => {
            let shuffle = coordinator.toggle_shuffle().await;
            println!("shuffle {}", if shuffle { "on" } else { "off" });
        }
        Command::Volume(volume) => coordinator.set_volume(volume).await?,
        Command::Width(width) => coordinator.set_visible_width(width).await,
        Command::Status => print_status(coordinator).await,
        Command::Quit => {}
    }
    Ok(())
}

async fn print_status(coordinator: &PlaybackCoordinator) {
    let ui = coordinator.state().ui_snapshot().await;
    let track = coordinator
        .current_track()
        .await
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    let session = coordinator
        .session_state()
        .await
        .map_or_else(|| "none".to_string(), |s| s.to_string());
    let position = coordinator
        .current_offset_seconds()
        .await
        .map_or_else(|| "-".to_string(), human_time::format_clock);

    println!(
        "track={} session={} playing={} at={} [{}] {:.1}% repeat={} volume={:.2}",
        track,
        session,
        ui.is_playing,
        position,
        ui.time_progress_label,
        ui.progress_percent,
        ui.repeat_mode,
        ui.volume_multiplier
    );
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
