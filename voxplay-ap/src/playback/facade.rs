//! Audio facade
//!
//! Entry point used by the speech producer and the UI/CLI: device listing and
//! selection, master volume, and [`AudioFacade::play_audio_data`].
//!
//! All methods run on the calling thread. The audio thread only ever sees the
//! [`MixingEngine`] through the open device's render callback.
//!
//! # Teardown
//!
//! Dropping the facade (or calling [`AudioFacade::shutdown`]) releases, in
//! order: every live sound, the playback device, the mixing engine, the audio
//! context.

use crate::audio::backend::{DeviceIdentity, StreamRequest};
use crate::audio::buffer::{AudioBufferView, SpeechBuffer};
use crate::audio::catalog::DeviceCatalog;
use crate::audio::context::AudioContext;
use crate::audio::output::PlaybackDevice;
use crate::audio::resampler::Resampler;
use crate::audio::types::SampleFormat;
use crate::error::{Error, Result};
use crate::playback::mixer::MixingEngine;
use crate::playback::sound::{SoundId, SoundPayload};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use voxplay_common::AudioConfig;

/// Result of a successful [`AudioFacade::play_audio_data`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Nothing to play (empty input or zero output frames)
    Empty,
    /// A sound was registered and started
    Queued {
        id: SoundId,
        /// Frames at the device rate
        frames: u64,
    },
}

/// Orchestrates devices, resampling and live sounds.
///
/// Field order is drop order.
pub struct AudioFacade {
    sounds: Vec<SoundPayload>,
    device: Option<PlaybackDevice>,
    resampler: Resampler,
    catalog: DeviceCatalog,
    selected: Option<DeviceIdentity>,
    stream_request: StreamRequest,
    next_sound_id: u64,
    engine: Arc<MixingEngine>,
    context: AudioContext,
}

impl AudioFacade {
    /// Create the facade.
    ///
    /// Enumerates devices and selects the configured device (by name), falling
    /// back to the first listed one. A host with no devices is allowed; playback
    /// requests fail until one appears.
    ///
    /// # Errors
    /// `Error::DeviceQuery` if devices cannot be enumerated. Fatal.
    pub fn new(context: AudioContext, engine: Arc<MixingEngine>, config: &AudioConfig) -> Result<Self> {
        let mut catalog = DeviceCatalog::new();
        catalog.refresh(&context)?;

        let selected = match config.device.as_deref() {
            Some(name) => match catalog.find_by_name(name) {
                Some(device) => Some(device.clone()),
                None => {
                    warn!("Configured device '{}' not found, using first listed device", name);
                    catalog.first().cloned()
                }
            },
            None => catalog.first().cloned(),
        };

        match &selected {
            Some(device) => info!("Selected audio device: {}", device.name),
            None => warn!("No audio output devices found"),
        }

        let stream_request = StreamRequest {
            sample_rate: config.sample_rate,
            channels: engine.channels(),
            buffer_size: config.buffer_size,
        };

        Ok(Self {
            sounds: Vec::new(),
            device: None,
            resampler: Resampler::new(),
            catalog,
            selected,
            stream_request,
            next_sound_id: 1,
            engine,
            context,
        })
    }

    /// Re-enumerate devices. Default device first.
    ///
    /// # Errors
    /// `Error::DeviceQuery` if the backend cannot enumerate. Fatal.
    pub fn list_devices(&mut self) -> Result<Vec<DeviceIdentity>> {
        Ok(self.catalog.refresh(&self.context)?.to_vec())
    }

    /// Select a device by its index in the most recent listing.
    ///
    /// Out-of-range indices select index 0. The device is switched lazily, on
    /// the next [`play_audio_data`](Self::play_audio_data).
    pub fn select_device(&mut self, index: usize) {
        if self.catalog.is_empty() {
            warn!("Cannot select audio device: device list is empty");
            return;
        }
        if let Some(device) = self.catalog.resolve_index(index) {
            info!("Selected audio device: {}", device.name);
            self.selected = Some(device.clone());
        }
    }

    /// Select a device by display name from the most recent listing.
    ///
    /// Returns false (and keeps the current selection) if no device matches.
    pub fn select_device_by_name(&mut self, name: &str) -> bool {
        match self.catalog.find_by_name(name) {
            Some(device) => {
                info!("Selected audio device: {}", device.name);
                self.selected = Some(device.clone());
                true
            }
            None => {
                warn!("Audio device '{}' not found", name);
                false
            }
        }
    }

    pub fn selected_device(&self) -> Option<&DeviceIdentity> {
        self.selected.as_ref()
    }

    /// Rate of the open device, if one is open
    pub fn output_sample_rate(&self) -> Option<u32> {
        self.device.as_ref().map(PlaybackDevice::sample_rate)
    }

    pub fn volume(&self) -> f32 {
        self.engine.volume()
    }

    /// Set master volume (0.0 to 1.0, clamped)
    pub fn set_volume(&self, volume: f32) {
        self.engine.set_volume(volume);
    }

    /// Set master volume as a percentage (0 to 100)
    pub fn set_volume_percent(&self, percent: u8) {
        self.set_volume(f32::from(percent) / 100.0);
    }

    /// Number of sounds not yet reclaimed
    pub fn live_sounds(&self) -> usize {
        self.sounds.len()
    }

    /// Sounds not yet reclaimed, oldest first
    pub fn sounds(&self) -> &[SoundPayload] {
        &self.sounds
    }

    /// Play a PCM buffer from the speech producer.
    ///
    /// Consumes `buffer`; it is released exactly once whatever the outcome.
    /// `None` is a missing buffer.
    ///
    /// # Arguments
    /// - `channels`, `sample_rate`, `bits_per_sample`: layout of the PCM
    /// - `buffer_size`: number of valid bytes at the start of `buffer`
    ///
    /// # Returns
    /// `PlayOutcome::Queued` when a sound was started, `PlayOutcome::Empty`
    /// when there was nothing to play.
    ///
    /// # Errors
    /// Any recoverable [`Error`]; it is also logged. `Error::DeviceQuery` is
    /// fatal. No partial state is left behind on failure.
    pub fn play_audio_data(
        &mut self,
        channels: i32,
        sample_rate: i32,
        bits_per_sample: i32,
        buffer_size: u64,
        buffer: Option<SpeechBuffer>,
    ) -> Result<PlayOutcome> {
        let result = self.play(channels, sample_rate, bits_per_sample, buffer_size, buffer);
        if let Err(e) = &result {
            error!("Failed to play audio data: {}", e);
        }
        result
    }

    fn play(
        &mut self,
        channels: i32,
        sample_rate: i32,
        bits_per_sample: i32,
        buffer_size: u64,
        buffer: Option<SpeechBuffer>,
    ) -> Result<PlayOutcome> {
        let buffer = buffer.ok_or(Error::NullBuffer)?;

        if channels <= 0 || sample_rate <= 0 || bits_per_sample <= 0 {
            return Err(Error::InvalidMetadata(format!(
                "channels={}, sample_rate={}, bits_per_sample={}",
                channels, sample_rate, bits_per_sample
            )));
        }
        let channels = u16::try_from(channels)
            .map_err(|_| Error::InvalidMetadata(format!("{} channels is too many", channels)))?;
        let rate_in = sample_rate as u32;

        let format =
            SampleFormat::from_bits(bits_per_sample).ok_or(Error::UnsupportedFormat(bits_per_sample))?;

        if buffer_size > buffer.len() as u64 {
            return Err(Error::InvalidMetadata(format!(
                "buffer_size {} exceeds the {} bytes provided",
                buffer_size,
                buffer.len()
            )));
        }
        if buffer_size == 0 {
            return Ok(PlayOutcome::Empty);
        }

        self.catalog.refresh(&self.context)?;
        if self.catalog.is_empty() {
            return Err(Error::NoDevices);
        }
        self.resync_selection();

        self.free_sounds(true);
        self.ensure_device()?;

        let device_rate = match &self.device {
            Some(device) => device.sample_rate(),
            None => return Err(Error::DeviceOpen("no device is open".to_string())),
        };

        // Fails only if rubato rejects the ratio, which the validated rates
        // above never produce. On error `buffer` drops here; no payload exists yet.
        self.resampler.ensure_ready(format, channels, rate_in, device_rate)?;

        let frame_bytes = format.frame_bytes(channels);
        let frames_in = buffer_size / frame_bytes as u64;
        let input = &buffer.as_bytes()[..(frames_in as usize * frame_bytes)];

        let (pcm, frames_out) = if rate_in == device_rate {
            (input.to_vec(), frames_in)
        } else {
            let expected = self.resampler.expected_output_frames(frames_in)?;
            let mut pcm = vec![0u8; expected as usize * frame_bytes];
            let written = self.resampler.process(frames_in, input, &mut pcm)?;
            pcm.truncate(written as usize * frame_bytes);
            (pcm, written)
        };

        drop(buffer);

        if frames_out == 0 {
            return Ok(PlayOutcome::Empty);
        }

        let view = AudioBufferView::new(pcm, format, channels, frames_out, device_rate)?;
        let id = SoundId::new(self.next_sound_id);
        let payload = SoundPayload::start(id, &self.engine, view)?;
        self.next_sound_id += 1;
        self.sounds.push(payload);

        debug!(
            "Queued sound {}: {} frames {} x{} @ {} Hz -> {} frames @ {} Hz",
            id, frames_in, format, channels, rate_in, frames_out, device_rate
        );
        Ok(PlayOutcome::Queued { id, frames: frames_out })
    }

    /// Fall back to the first listed device if the selection disappeared.
    fn resync_selection(&mut self) {
        let present = self
            .selected
            .as_ref()
            .is_some_and(|device| self.catalog.contains(&device.id));
        if present {
            return;
        }

        if let Some(device) = self.catalog.resolve_index(0) {
            match &self.selected {
                Some(previous) => warn!(
                    "Selected device '{}' is no longer available, using '{}'",
                    previous.name, device.name
                ),
                None => warn!("No device selected, using '{}'", device.name),
            }
            self.selected = Some(device.clone());
        }
    }

    /// Make the open device match the selection.
    ///
    /// A device that reported a stream error is re-opened. Live sounds at a
    /// rate the new device does not run at are reclaimed.
    fn ensure_device(&mut self) -> Result<()> {
        let selected = match &self.selected {
            Some(device) => device.clone(),
            None => return Err(Error::NoDevices),
        };

        if let Some(device) = &self.device {
            if device.id() == &selected.id && !device.has_error() {
                return Ok(());
            }
            if device.has_error() {
                warn!(
                    "Re-opening '{}' after {} stream errors",
                    device.name(),
                    device.error_count()
                );
            }
        }

        // Close the old device before opening the new one
        self.device = None;

        let mut device = PlaybackDevice::open(
            &self.context,
            &selected,
            Arc::clone(&self.engine),
            &self.stream_request,
        )?;
        device.start()?;
        let rate = device.sample_rate();
        self.device = Some(device);
        self.drop_sounds_at_other_rate(rate);
        Ok(())
    }

    /// Reclaim sounds prepared for another device rate.
    ///
    /// They were resampled for the previous device and would play at the
    /// wrong speed on this one.
    fn drop_sounds_at_other_rate(&mut self, rate: u32) {
        let before = self.sounds.len();
        self.sounds
            .retain(|sound| sound.view().is_some_and(|view| view.sample_rate() == rate));
        let dropped = before - self.sounds.len();
        if dropped > 0 {
            warn!(
                "Dropped {} sounds prepared for another sample rate (device now {} Hz)",
                dropped, rate
            );
        }
    }

    /// Reclaim sounds.
    ///
    /// # Arguments
    /// - `only_unused`: true = only finished sounds, false = all sounds
    ///
    /// # Returns
    /// Number of sounds reclaimed
    pub fn free_sounds(&mut self, only_unused: bool) -> usize {
        let before = self.sounds.len();
        if only_unused {
            self.sounds.retain(|sound| !sound.is_finished());
        } else {
            self.sounds.clear();
        }
        let freed = before - self.sounds.len();
        if freed > 0 {
            debug!("Freed {} sounds", freed);
        }
        freed
    }

    /// Tear down in order. Equivalent to dropping the facade.
    pub fn shutdown(self) {
        info!("Shutting down audio");
        drop(self);
    }

    fn release(&mut self) {
        self.free_sounds(false);
        self.device = None;
    }
}

impl Drop for AudioFacade {
    fn drop(&mut self) {
        self.release();
        // Remaining fields drop in declaration order: engine, then context
    }
}
