//! Playback device
//!
//! One open output endpoint whose render callback pulls frames from the
//! [`MixingEngine`]. The device neither mixes nor resamples.
//!
//! Stream errors reported by the backend (typically a hot-unplugged device)
//! set an error flag; the facade re-opens a flagged device before the next
//! sound is played.

use crate::audio::backend::{DeviceId, DeviceIdentity, OutputStream, StreamRequest};
use crate::audio::context::AudioContext;
use crate::error::{Error, Result};
use crate::playback::mixer::MixingEngine;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Open output endpoint bound to the mixing engine.
pub struct PlaybackDevice {
    id: DeviceId,
    name: String,
    sample_rate: u32,
    channels: u16,
    stream: Box<dyn OutputStream>,
    running: bool,
    /// Stream error flag - set from the backend's error callback
    error_flag: Arc<AtomicBool>,
    /// Number of stream errors since the device was opened
    error_count: Arc<AtomicU32>,
}

impl PlaybackDevice {
    /// Open `identity` and bind its render callback to `engine`.
    ///
    /// The stream is built but not started; call [`start`](Self::start).
    ///
    /// # Errors
    /// `Error::DeviceOpen` if the backend cannot open the device.
    pub fn open(
        context: &AudioContext,
        identity: &DeviceIdentity,
        engine: Arc<MixingEngine>,
        request: &StreamRequest,
    ) -> Result<Self> {
        let error_flag = Arc::new(AtomicBool::new(false));
        let error_count = Arc::new(AtomicU32::new(0));

        let channels = Arc::new(AtomicU32::new(u32::from(request.channels)));
        let render_channels = Arc::clone(&channels);
        let engine_rate = Arc::clone(&engine);
        let render = Box::new(move |data: &mut [f32]| {
            let channels = render_channels.load(Ordering::Relaxed) as usize;
            engine.read_frames(data, channels);
        });

        let flag = Arc::clone(&error_flag);
        let count = Arc::clone(&error_count);
        let device_name = identity.name.clone();
        let on_error = Box::new(move |err: String| {
            error!("Audio stream error on '{}': {} - marking for recovery", device_name, err);
            flag.store(true, Ordering::SeqCst);
            count.fetch_add(1, Ordering::SeqCst);
        });

        let opened = context
            .open_output_stream(&identity.id, request, render, on_error)
            .map_err(|e| match e {
                Error::DeviceOpen(msg) => Error::DeviceOpen(msg),
                other => Error::DeviceOpen(format!("{}: {}", identity.name, other)),
            })?;

        // The backend may have negotiated another layout than requested
        channels.store(u32::from(opened.channels), Ordering::Relaxed);
        engine_rate.set_output_rate(opened.sample_rate);

        debug!(
            "Opened device '{}': {} Hz, {} channels",
            identity.name, opened.sample_rate, opened.channels
        );

        Ok(Self {
            id: identity.id.clone(),
            name: identity.name.clone(),
            sample_rate: opened.sample_rate,
            channels: opened.channels,
            stream: opened.stream,
            running: false,
            error_flag,
            error_count,
        })
    }

    /// Start pulling audio.
    ///
    /// # Errors
    /// `Error::DeviceOpen` if the stream cannot be started.
    pub fn start(&mut self) -> Result<()> {
        info!("Starting audio stream on '{}'", self.name);
        self.stream
            .play()
            .map_err(|e| Error::DeviceOpen(format!("{}: {}", self.name, e)))?;
        self.running = true;
        Ok(())
    }

    /// Stop pulling audio.
    pub fn stop(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        info!("Stopping audio stream on '{}'", self.name);
        self.running = false;
        self.stream.pause()
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sample rate the device runs at
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the backend reported a stream error since the device was opened.
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::SeqCst)
    }
}

impl Drop for PlaybackDevice {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to stop stream on '{}': {}", self.name, e);
        }
        debug!("Closed device '{}'", self.name);
    }
}
