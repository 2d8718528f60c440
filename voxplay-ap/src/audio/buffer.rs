//! PCM buffers
//!
//! [`SpeechBuffer`] is the raw byte buffer handed over by the speech producer.
//! [`AudioBufferView`] is the read-only, shareable view the mixer plays from.

use crate::audio::types::SampleFormat;
use crate::error::{Error, Result};
use std::fmt;
use std::sync::Arc;

type ReleaseHook = Box<dyn FnOnce(usize) + Send + 'static>;

/// Owned PCM bytes from the speech producer.
///
/// Move-only. The bytes are released when the value is dropped, which happens
/// exactly once. An optional release hook is invoked at that point with the
/// buffer length (e.g. to return memory to a foreign allocator).
pub struct SpeechBuffer {
    data: Vec<u8>,
    on_release: Option<ReleaseHook>,
}

impl SpeechBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            on_release: None,
        }
    }

    /// Wrap bytes and register a hook that runs when they are released.
    pub fn with_release_hook<F>(data: Vec<u8>, on_release: F) -> Self
    where
        F: FnOnce(usize) + Send + 'static,
    {
        Self {
            data,
            on_release: Some(Box::new(on_release)),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for SpeechBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechBuffer")
            .field("len", &self.data.len())
            .field("has_release_hook", &self.on_release.is_some())
            .finish()
    }
}

impl From<Vec<u8>> for SpeechBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl Drop for SpeechBuffer {
    fn drop(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook(self.data.len());
        }
    }
}

/// Interleaved PCM described by format, channel count, frame count and rate.
///
/// Cheap to clone; clones share the same bytes.
#[derive(Clone)]
pub struct AudioBufferView {
    data: Arc<[u8]>,
    format: SampleFormat,
    channels: u16,
    frames: u64,
    sample_rate: u32,
}

impl AudioBufferView {
    /// Create a view over `data`.
    ///
    /// # Errors
    /// `Error::SoundInit` if the channel count or rate is zero, or `data` does
    /// not hold exactly `frames` frames.
    pub fn new(
        data: Vec<u8>,
        format: SampleFormat,
        channels: u16,
        frames: u64,
        sample_rate: u32,
    ) -> Result<Self> {
        if channels == 0 || sample_rate == 0 {
            return Err(Error::SoundInit(format!(
                "Invalid buffer shape: {} channels at {} Hz",
                channels, sample_rate
            )));
        }

        let expected = frames
            .checked_mul(format.frame_bytes(channels) as u64)
            .ok_or_else(|| Error::SoundInit(format!("Frame count {} overflows", frames)))?;
        if data.len() as u64 != expected {
            return Err(Error::SoundInit(format!(
                "Buffer holds {} bytes, expected {} for {} frames of {} x{}",
                data.len(),
                expected,
                frames,
                format,
                channels
            )));
        }

        Ok(Self {
            data: data.into(),
            format,
            channels,
            frames,
            sample_rate,
        })
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Decode one sample to f32. Out-of-range positions read as silence.
    #[inline]
    pub fn sample(&self, frame: u64, channel: u16) -> f32 {
        if frame >= self.frames || channel >= self.channels {
            return 0.0;
        }
        let width = self.format.bytes_per_sample();
        let offset = frame as usize * self.format.frame_bytes(self.channels) + channel as usize * width;
        self.format.decode(&self.data[offset..offset + width])
    }
}

impl fmt::Debug for AudioBufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBufferView")
            .field("format", &self.format)
            .field("channels", &self.channels)
            .field("frames", &self.frames)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
