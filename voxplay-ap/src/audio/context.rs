//! Audio backend context
//!
//! The one long-lived handle to the platform audio system. Constructed once at
//! startup and shared by reference with everything that talks to the host.

use crate::audio::backend::{
    AudioBackend, DeviceId, DeviceIdentity, ErrorCallback, OpenedStream, RenderCallback,
    StreamRequest,
};
use crate::audio::cpal_backend::CpalBackend;
use crate::error::Result;
use tracing::debug;
use voxplay_common::AudioConfig;

/// Owner of the audio backend.
pub struct AudioContext {
    backend: Box<dyn AudioBackend>,
}

impl AudioContext {
    /// Initialize the platform backend selected by the configuration.
    ///
    /// # Errors
    /// `Error::BackendInit` if the host cannot be opened. This is fatal for the
    /// player.
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let backend = CpalBackend::new(config.host.as_deref())?;
        Ok(Self::with_backend(Box::new(backend)))
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(backend: Box<dyn AudioBackend>) -> Self {
        debug!("Audio context created with backend '{}'", backend.name());
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Enumerate playback devices in host order.
    pub fn output_devices(&self) -> Result<Vec<DeviceIdentity>> {
        self.backend.output_devices()
    }

    /// Build (without starting) an output stream on `device`.
    pub fn open_output_stream(
        &self,
        device: &DeviceId,
        request: &StreamRequest,
        render: RenderCallback,
        on_error: ErrorCallback,
    ) -> Result<OpenedStream> {
        self.backend.open_output_stream(device, request, render, on_error)
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        debug!("Audio context '{}' released", self.backend.name());
    }
}
