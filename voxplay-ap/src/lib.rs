//! # voxplay Audio Player Library (voxplay-ap)
//!
//! Real-time playback engine for synthesized speech.
//!
//! **Purpose:** Accept raw PCM buffers from a speech producer, convert them to
//! the output device's rate, and mix them into a continuously running audio
//! callback while keeping every buffer alive until the callback is done with it.
//!
//! **Architecture:** [`AudioFacade`](playback::AudioFacade) on the calling thread,
//! [`MixingEngine`](playback::MixingEngine) pulled by the cpal callback thread,
//! rubato for linear resampling.

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod source;

pub use error::{Error, Result};
pub use playback::{AudioFacade, MixingEngine, PlayOutcome};
