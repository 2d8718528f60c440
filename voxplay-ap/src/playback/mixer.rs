//! Master mixing engine
//!
//! Device-less mixer shared between the calling thread and the audio thread.
//!
//! The calling thread attaches and detaches [`SoundSource`]s; the audio thread
//! pulls mixed frames through [`MixingEngine::read_frames`]. The source list is
//! behind a mutex the audio thread only `try_lock`s: if the calling thread holds
//! it, that callback renders silence instead of blocking.
//!
//! Because `detach` takes the lock, once it returns the audio thread is not
//! mixing the detached source, so its memory can be released.

use crate::error::{Error, Result};
use crate::playback::sound::{SoundId, SoundSource};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use tracing::{debug, warn};

/// Mixer for all in-flight sounds.
pub struct MixingEngine {
    /// Output channel count the engine is configured for
    channels: u16,

    /// Upper bound on simultaneously attached sounds
    max_sounds: usize,

    /// Attached sources, in attach order
    sources: Mutex<Vec<Arc<SoundSource>>>,

    /// Master volume as f32 bits (0.0 to 1.0)
    volume: AtomicU32,

    /// Rate of the device being rendered to, 0 while unbound
    output_rate: AtomicU32,

    /// Callbacks that found the source list locked and rendered silence
    contended_callbacks: AtomicU64,
}

impl MixingEngine {
    /// Create the engine.
    ///
    /// # Errors
    /// `Error::EngineInit` if `channels` or `max_sounds` is zero.
    pub fn new(channels: u16, max_sounds: usize) -> Result<Self> {
        if channels == 0 {
            return Err(Error::EngineInit("channel count must be positive".to_string()));
        }
        if max_sounds == 0 {
            return Err(Error::EngineInit("max_sounds must be positive".to_string()));
        }

        debug!("Mixing engine created: {} channels, up to {} sounds", channels, max_sounds);
        Ok(Self {
            channels,
            max_sounds,
            sources: Mutex::new(Vec::new()),
            volume: AtomicU32::new(1.0f32.to_bits()),
            output_rate: AtomicU32::new(0),
            contended_callbacks: AtomicU64::new(0),
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn max_sounds(&self) -> usize {
        self.max_sounds
    }

    /// Get master volume
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// Set master volume
    ///
    /// # Arguments
    ///
    /// * `volume` - New master volume (0.0 to 1.0), will be clamped. NaN is ignored.
    pub fn set_volume(&self, volume: f32) {
        if volume.is_nan() {
            warn!("Ignoring NaN master volume");
            return;
        }
        let clamped = volume.clamp(0.0, 1.0);
        if clamped != volume {
            warn!("Master volume {} out of range, clamped to {}", volume, clamped);
        }
        self.volume.store(clamped.to_bits(), Ordering::Relaxed);
    }

    /// Rate the engine is rendering at, if a device is bound
    pub fn output_rate(&self) -> Option<u32> {
        match self.output_rate.load(Ordering::Acquire) {
            0 => None,
            rate => Some(rate),
        }
    }

    /// Bind the engine to a device rate.
    ///
    /// Sources whose view rate differs are skipped by [`read_frames`](Self::read_frames)
    /// until they are detached.
    pub fn set_output_rate(&self, rate: u32) {
        let previous = self.output_rate.swap(rate, Ordering::AcqRel);
        if previous != rate {
            debug!("Mixing engine output rate: {} Hz", rate);
        }
    }

    /// Register a source for mixing.
    ///
    /// # Errors
    /// `Error::SoundInit` if the voice limit is reached.
    pub fn attach(&self, source: Arc<SoundSource>) -> Result<()> {
        let mut sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        if sources.len() >= self.max_sounds {
            return Err(Error::SoundInit(format!(
                "voice limit of {} sounds reached",
                self.max_sounds
            )));
        }
        debug!("Attached sound {} ({} frames)", source.id(), source.frames());
        sources.push(source);
        Ok(())
    }

    /// Unregister a source. Returns whether it was attached.
    ///
    /// Blocks until any in-progress mix has finished.
    pub fn detach(&self, id: SoundId) -> bool {
        let mut sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sources.len();
        sources.retain(|source| source.id() != id);
        before != sources.len()
    }

    /// Number of attached sources
    pub fn active_sources(&self) -> usize {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of callbacks that rendered silence due to lock contention
    pub fn contended_callbacks(&self) -> u64 {
        self.contended_callbacks.load(Ordering::Relaxed)
    }

    /// Fill `out` with the next mixed frames.
    ///
    /// Called from the audio thread. `out` is interleaved with `channels`
    /// samples per frame; it is always completely overwritten. Sources prepared
    /// for another rate than the bound output rate contribute nothing.
    pub fn read_frames(&self, out: &mut [f32], channels: usize) {
        out.fill(0.0);
        if channels == 0 {
            return;
        }

        let sources = match self.sources.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.contended_callbacks.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let rate = self.output_rate.load(Ordering::Acquire);
        for source in sources.iter() {
            source.mix_into(out, channels, rate);
        }
        drop(sources);

        let volume = self.volume();
        for sample in out.iter_mut() {
            *sample = (*sample * volume).clamp(-1.0, 1.0);
        }
    }
}

impl Drop for MixingEngine {
    fn drop(&mut self) {
        let remaining = self.sources.get_mut().map(|s| s.len()).unwrap_or(0);
        if remaining > 0 {
            warn!("Mixing engine dropped with {} sounds still attached", remaining);
        }
        debug!("Mixing engine released");
    }
}
