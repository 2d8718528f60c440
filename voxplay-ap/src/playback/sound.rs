//! In-flight sounds
//!
//! A [`SoundPayload`] owns everything one played utterance needs: the PCM bytes
//! (inside an [`AudioBufferView`]) and the playable [`SoundHandle`] derived from
//! the view. The handle's [`SoundSource`] is shared with the mixer.
//!
//! Teardown order is fixed: detach from the mixer, release the handle, release
//! the view (and with it the PCM).

use crate::audio::buffer::AudioBufferView;
use crate::error::Result;
use crate::playback::mixer::MixingEngine;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Identifier of a sound, unique per facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundId(u64);

impl SoundId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Playback state of one buffer view, mixed on the audio thread.
pub struct SoundSource {
    id: SoundId,
    view: AudioBufferView,
    /// Next frame to mix
    cursor: AtomicU64,
    playing: AtomicBool,
    at_end: AtomicBool,
}

impl SoundSource {
    pub fn new(id: SoundId, view: AudioBufferView) -> Self {
        let at_end = view.frames() == 0;
        Self {
            id,
            view,
            cursor: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            at_end: AtomicBool::new(at_end),
        }
    }

    pub fn id(&self) -> SoundId {
        self.id
    }

    pub fn frames(&self) -> u64 {
        self.view.frames()
    }

    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn start(&self) {
        self.playing.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.playing.store(false, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn is_at_end(&self) -> bool {
        self.at_end.load(Ordering::Acquire)
    }

    /// Add this source's next frames into `out` and advance the cursor.
    ///
    /// Output channel `c` reads source channel `min(c, source_channels - 1)`,
    /// so mono is duplicated to every output channel. Nothing is mixed when
    /// `rate` is set (non-zero) and differs from the view's rate.
    pub(crate) fn mix_into(&self, out: &mut [f32], channels: usize, rate: u32) {
        if !self.is_playing() || self.is_at_end() {
            return;
        }
        if rate != 0 && rate != self.view.sample_rate() {
            return;
        }

        let start = self.cursor.load(Ordering::Acquire);
        let total = self.view.frames();
        let wanted = (out.len() / channels) as u64;
        let count = total.saturating_sub(start).min(wanted);
        let last_channel = self.view.channels() - 1;

        for (i, frame) in out.chunks_exact_mut(channels).take(count as usize).enumerate() {
            let position = start + i as u64;
            for (c, sample) in frame.iter_mut().enumerate() {
                let source_channel = (c as u16).min(last_channel);
                *sample += self.view.sample(position, source_channel);
            }
        }

        let cursor = start + count;
        self.cursor.store(cursor, Ordering::Release);
        if cursor >= total {
            self.playing.store(false, Ordering::Release);
            self.at_end.store(true, Ordering::Release);
        }
    }
}

impl fmt::Debug for SoundSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundSource")
            .field("id", &self.id)
            .field("cursor", &self.cursor())
            .field("frames", &self.frames())
            .field("playing", &self.is_playing())
            .field("at_end", &self.is_at_end())
            .finish()
    }
}

/// Playable handle over a buffer view.
#[derive(Debug)]
pub struct SoundHandle {
    source: Arc<SoundSource>,
}

impl SoundHandle {
    pub fn new(id: SoundId, view: &AudioBufferView) -> Self {
        Self {
            source: Arc::new(SoundSource::new(id, view.clone())),
        }
    }

    pub fn id(&self) -> SoundId {
        self.source.id()
    }

    pub fn source(&self) -> &Arc<SoundSource> {
        &self.source
    }

    pub fn is_at_end(&self) -> bool {
        self.source.is_at_end()
    }
}

/// One in-flight utterance.
pub struct SoundPayload {
    id: SoundId,
    engine: Arc<MixingEngine>,
    attached: bool,
    handle: Option<SoundHandle>,
    view: Option<AudioBufferView>,
}

impl SoundPayload {
    /// Derive a handle from `view`, register it with the engine and start it.
    ///
    /// Never waits for playback. On failure everything built so far is
    /// released in reverse dependency order.
    ///
    /// # Errors
    /// `Error::SoundInit` if the engine refuses the sound.
    pub fn start(
        id: SoundId,
        engine: &Arc<MixingEngine>,
        view: AudioBufferView,
    ) -> Result<Self> {
        let handle = SoundHandle::new(id, &view);
        let source = Arc::clone(handle.source());
        let mut payload = Self {
            id,
            engine: Arc::clone(engine),
            attached: false,
            handle: Some(handle),
            view: Some(view),
        };

        source.start();
        engine.attach(source)?;
        payload.attached = true;

        debug!("Sound {} started ({} frames)", id, payload.frames());
        Ok(payload)
    }

    pub fn id(&self) -> SoundId {
        self.id
    }

    pub fn frames(&self) -> u64 {
        self.view.as_ref().map(|v| v.frames()).unwrap_or(0)
    }

    pub fn view(&self) -> Option<&AudioBufferView> {
        self.view.as_ref()
    }

    /// Whether playback reached the end of the buffer.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, SoundHandle::is_at_end)
    }
}

impl fmt::Debug for SoundPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundPayload")
            .field("id", &self.id)
            .field("attached", &self.attached)
            .field("frames", &self.frames())
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Drop for SoundPayload {
    fn drop(&mut self) {
        if self.attached {
            self.engine.detach(self.id);
            self.attached = false;
        }
        if let Some(handle) = self.handle.take() {
            handle.source().stop();
            drop(handle);
        }
        drop(self.view.take());
    }
}
