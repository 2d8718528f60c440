//! Error types for voxplay-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Errors are split into two severities, see [`Error::is_fatal`].

use thiserror::Error;

/// Main error type for voxplay-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(#[from] voxplay_common::Error),

    /// Audio backend (host) could not be initialized
    #[error("Audio backend initialization failed: {0}")]
    BackendInit(String),

    /// Mixing engine could not be initialized
    #[error("Mixing engine initialization failed: {0}")]
    EngineInit(String),

    /// Output devices could not be enumerated
    #[error("Failed to query audio devices: {0}")]
    DeviceQuery(String),

    /// Speech buffer was missing
    #[error("Speech buffer was null")]
    NullBuffer,

    /// Channel count, sample rate, bit depth or buffer size is invalid
    #[error("Invalid audio metadata: {0}")]
    InvalidMetadata(String),

    /// Bit depth has no matching sample format
    #[error("Unsupported bits per sample value: {0}")]
    UnsupportedFormat(i32),

    /// Host reported no playback devices
    #[error("No playback devices are available")]
    NoDevices,

    /// Output device could not be opened or started
    #[error("Failed to open audio device: {0}")]
    DeviceOpen(String),

    /// Sample rate conversion failed
    #[error("Resampling failed: {0}")]
    Resampling(String),

    /// Buffer view or sound handle could not be created
    #[error("Failed to initialize sound: {0}")]
    SoundInit(String),

    /// Running output stream errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// WAV file could not be read, or a tone could not be generated
    #[error("Failed to load PCM source: {0}")]
    Source(String),
}

impl Error {
    /// Whether the process cannot proceed after this error.
    ///
    /// Fatal errors come from resource construction (backend, mixing engine,
    /// configuration) and device enumeration. Everything else is a per-call
    /// failure that leaves the player usable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::BackendInit(_) | Error::EngineInit(_) | Error::DeviceQuery(_)
        )
    }
}

/// Convenience Result type using voxplay-ap Error
pub type Result<T> = std::result::Result<T, Error>;
