//! Audio Player (voxplay-ap) - Main entry point
//!
//! Command-line front end for the speech playback engine: lists output
//! devices, selects one, and plays a WAV file or a test tone through
//! [`AudioFacade::play_audio_data`] exactly as the speech producer would.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use voxplay_ap::audio::AudioContext;
use voxplay_ap::config::{CliOverrides, Config};
use voxplay_ap::source::{self, PcmClip};
use voxplay_ap::{AudioFacade, MixingEngine, PlayOutcome};

/// Interval at which finished sounds are reclaimed while waiting
const RECLAIM_INTERVAL: Duration = Duration::from_millis(50);

/// Command-line arguments for voxplay-ap
#[derive(Parser, Debug)]
#[command(name = "voxplay-ap")]
#[command(about = "Speech audio player")]
#[command(version)]
struct Args {
    /// Configuration file (overrides VOXPLAY_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Audio host to use (e.g. "alsa", "jack")
    #[arg(long)]
    host: Option<String>,

    /// Output device index, as printed by --list-devices
    #[arg(short, long)]
    device: Option<usize>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Master volume in percent
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: Option<u8>,

    /// WAV file to play
    #[arg(long, conflicts_with = "tone")]
    wav: Option<PathBuf>,

    /// Play a sine tone at this frequency in Hz (default when no WAV is given)
    #[arg(long)]
    tone: Option<f32>,

    /// Tone length in milliseconds
    #[arg(long, default_value = "1000")]
    duration_ms: u64,

    /// Tone sample rate in Hz
    #[arg(long, default_value = "22050")]
    rate: u32,

    /// Tone channel count
    #[arg(long, default_value = "1")]
    channels: u16,

    /// Tone bits per sample (8, 16, 24 or 32)
    #[arg(long, default_value = "16")]
    bits: u16,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(CliOverrides {
        config_path: args.config.clone(),
        host: args.host.clone(),
        device_index: args.device,
        volume_percent: args.volume,
    })
    .context("Failed to load configuration")?;

    voxplay_common::logging::init_tracing(&config.log_level)
        .context("Failed to initialize logging")?;

    info!("Starting voxplay Audio Player");

    // Resource objects, torn down in reverse by the facade
    let context = AudioContext::new(&config.audio).context("Failed to initialize audio backend")?;
    let engine = Arc::new(
        MixingEngine::new(config.audio.channels, config.audio.max_sounds)
            .context("Failed to initialize mixing engine")?,
    );
    engine.set_volume(config.audio.volume);

    let mut facade = AudioFacade::new(context, engine, &config.audio)
        .context("Failed to initialize audio player")?;

    if args.list_devices {
        let devices = facade.list_devices().context("Failed to list audio devices")?;
        for (index, device) in devices.iter().enumerate() {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}: {}{}", index, device.name, marker);
        }
        facade.shutdown();
        return Ok(());
    }

    if let Some(index) = config.device_index {
        facade.list_devices().context("Failed to list audio devices")?;
        facade.select_device(index);
    }

    let clip = load_clip(&args)?;
    info!(
        "Playing {} ms of audio ({} Hz, {} channels, {} bits)",
        clip.duration_ms(),
        clip.sample_rate,
        clip.channels,
        clip.bits_per_sample
    );

    let outcome = facade.play_audio_data(
        i32::from(clip.channels),
        clip.sample_rate as i32,
        i32::from(clip.bits_per_sample),
        clip.data.len() as u64,
        Some(clip.into_speech_buffer()),
    );

    match outcome {
        Ok(PlayOutcome::Queued { id, frames }) => {
            info!("Sound {} queued ({} frames)", id, frames);
            wait_for_playback(&mut facade).await?;
        }
        Ok(PlayOutcome::Empty) => info!("Nothing to play"),
        Err(e) if e.is_fatal() => {
            return Err(e).context("Audio playback failed");
        }
        Err(e) => {
            error!("Playback failed: {}", e);
            facade.shutdown();
            bail!("Playback failed: {}", e);
        }
    }

    facade.shutdown();
    info!("Shutdown complete");
    Ok(())
}

fn load_clip(args: &Args) -> Result<PcmClip> {
    match &args.wav {
        Some(path) => source::load_wav(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => source::tone(
            args.tone.unwrap_or(440.0),
            args.duration_ms,
            args.rate,
            args.channels,
            args.bits,
        )
        .context("Failed to generate tone"),
    }
}

/// Reclaim finished sounds until none are left or Ctrl+C is pressed.
async fn wait_for_playback(facade: &mut AudioFacade) -> Result<()> {
    let mut interval = tokio::time::interval(RECLAIM_INTERVAL);
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, stopping playback");
                return Ok(());
            }
            _ = interval.tick() => {
                facade.free_sounds(true);
                if facade.live_sounds() == 0 {
                    return Ok(());
                }
            }
        }
    }
}
