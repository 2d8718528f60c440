//! Audio I/O: backend, devices, buffers and sample rate conversion

pub mod backend;
pub mod buffer;
pub mod catalog;
pub mod context;
pub mod cpal_backend;
pub mod output;
pub mod resampler;
pub mod types;

pub use backend::{AudioBackend, DeviceId, DeviceIdentity, StreamRequest};
pub use buffer::{AudioBufferView, SpeechBuffer};
pub use catalog::DeviceCatalog;
pub use context::AudioContext;
pub use output::PlaybackDevice;
pub use resampler::Resampler;
pub use types::SampleFormat;
