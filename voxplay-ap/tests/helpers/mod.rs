//! Test helper modules for voxplay Audio Player integration tests
//!
//! - MockHost: scripted audio backend whose callback the test drives
//! - Release counters and PCM builders for speech buffers

#![allow(dead_code)]

pub mod mock_backend;

pub use mock_backend::{device, MockHost, MOCK_NATIVE_RATE};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use voxplay_ap::audio::SpeechBuffer;
use voxplay_ap::playback::MixingEngine;
use voxplay_ap::AudioFacade;
use voxplay_common::AudioConfig;

/// Counts speech buffer releases.
#[derive(Clone, Default)]
pub struct ReleaseCounter(Arc<AtomicUsize>);

impl ReleaseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `data` so that its release is counted.
    pub fn buffer(&self, data: Vec<u8>) -> SpeechBuffer {
        let count = Arc::clone(&self.0);
        SpeechBuffer::with_release_hook(data, move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    pub fn releases(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Facade over `host` with default configuration.
///
/// Returns the engine too so tests can observe it after the facade is gone.
pub fn facade(host: &MockHost) -> (AudioFacade, Arc<MixingEngine>) {
    facade_with(host, &AudioConfig::default())
}

pub fn facade_with(host: &MockHost, config: &AudioConfig) -> (AudioFacade, Arc<MixingEngine>) {
    let engine = Arc::new(MixingEngine::new(config.channels, config.max_sounds).unwrap());
    engine.set_volume(config.volume);
    let facade = AudioFacade::new(host.context(), Arc::clone(&engine), config).unwrap();
    (facade, engine)
}

/// Little-endian s16 PCM from samples
pub fn s16_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Mono s16 ramp of `frames` frames
pub fn s16_ramp(frames: usize) -> Vec<u8> {
    let samples: Vec<i16> = (0..frames).map(|i| (i as i16).wrapping_mul(37)).collect();
    s16_bytes(&samples)
}
