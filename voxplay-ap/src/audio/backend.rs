//! Audio backend abstraction
//!
//! [`AudioBackend`] decouples the playback engine from the platform audio API.
//! The production implementation wraps cpal ([`CpalBackend`](super::cpal_backend::CpalBackend));
//! tests substitute a deterministic backend whose render closure they drive by hand.
//!
//! Callbacks are boxed closures bound when the stream is built, so the audio
//! thread receives a typed handle to whatever it renders from.

use crate::error::Result;
use std::fmt;

/// Backend-specific identifier of an output device.
///
/// Durable across enumerations, unlike the position in a device list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One enumerated playback device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Durable identifier used to open the device
    pub id: DeviceId,
    /// Human-readable name for display
    pub name: String,
    /// Whether the host reports this as its default output
    pub is_default: bool,
}

/// Parameters requested when opening an output stream.
///
/// The backend may negotiate a different rate or channel count; the actual
/// values are returned in [`OpenedStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Requested channel count
    pub channels: u16,
    /// Preferred buffer size in frames (None = device default)
    pub buffer_size: Option<u32>,
}

/// Render callback invoked on the audio thread.
///
/// Receives an interleaved f32 buffer of `frames * channels` samples that it
/// must fill completely. Must not block or allocate.
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// Stream error callback, invoked from the backend's thread.
pub type ErrorCallback = Box<dyn FnMut(String) + Send + 'static>;

/// A built output stream. Dropping it stops playback and releases the device.
pub trait OutputStream {
    /// Start or resume pulling audio from the render callback.
    fn play(&self) -> Result<()>;

    /// Stop pulling audio; the stream can be resumed with `play`.
    fn pause(&self) -> Result<()>;
}

/// Result of [`AudioBackend::open_output_stream`].
pub struct OpenedStream {
    /// The stream, built but not started
    pub stream: Box<dyn OutputStream>,
    /// Sample rate the device actually runs at
    pub sample_rate: u32,
    /// Channel count the render callback is asked to fill
    pub channels: u16,
}

impl fmt::Debug for OpenedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedStream")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

/// Pluggable audio backend.
///
/// Object-safe so the context can hold `Box<dyn AudioBackend>`.
pub trait AudioBackend {
    /// Human-readable backend name (e.g. "ALSA", "mock")
    fn name(&self) -> &str;

    /// Enumerate playback devices in the order the host reports them.
    fn output_devices(&self) -> Result<Vec<DeviceIdentity>>;

    /// Build an output stream on the given device without starting it.
    fn open_output_stream(
        &self,
        device: &DeviceId,
        request: &StreamRequest,
        render: RenderCallback,
        on_error: ErrorCallback,
    ) -> Result<OpenedStream>;
}
