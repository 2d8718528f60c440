//! PCM sources for the command-line player
//!
//! Produces the same `(channels, rate, bits, bytes)` tuple the speech
//! producer hands to [`AudioFacade::play_audio_data`](crate::playback::AudioFacade::play_audio_data):
//! either read from a WAV file or synthesized as a sine tone.

use crate::audio::buffer::SpeechBuffer;
use crate::audio::types::SampleFormat;
use crate::error::{Error, Result};
use std::f32::consts::PI;
use std::path::Path;
use tracing::debug;

/// Tone amplitude (0.0 to 1.0), leaves headroom for mixing
const TONE_AMPLITUDE: f32 = 0.5;

/// Interleaved little-endian PCM with its layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmClip {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub data: Vec<u8>,
}

impl PcmClip {
    /// Number of complete frames in `data`
    pub fn frames(&self) -> u64 {
        crate::audio::types::frames_in_bytes(self.data.len() as u64, self.channels, self.bits_per_sample)
    }

    pub fn duration_ms(&self) -> u64 {
        self.frames() * 1000 / u64::from(self.sample_rate.max(1))
    }

    /// Hand the bytes over as a speech buffer.
    pub fn into_speech_buffer(self) -> SpeechBuffer {
        SpeechBuffer::new(self.data)
    }
}

/// Synthesize a sine tone.
///
/// # Arguments
/// * `frequency_hz` - Tone frequency (e.g. 440.0)
/// * `duration_ms` - Length in milliseconds
/// * `sample_rate` - Rate in Hz
/// * `channels` - Every channel carries the same signal
/// * `bits_per_sample` - 8, 16, 24 or 32
///
/// # Errors
/// `Error::Source` for a zero rate or channel count, a non-positive
/// frequency, or an unsupported bit depth.
pub fn tone(
    frequency_hz: f32,
    duration_ms: u64,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
) -> Result<PcmClip> {
    if sample_rate == 0 || channels == 0 {
        return Err(Error::Source(format!(
            "invalid tone layout: {} Hz, {} channels",
            sample_rate, channels
        )));
    }
    if frequency_hz.is_nan() || frequency_hz <= 0.0 {
        return Err(Error::Source(format!("invalid tone frequency: {}", frequency_hz)));
    }
    let format = SampleFormat::from_bits(i32::from(bits_per_sample))
        .ok_or_else(|| Error::Source(format!("unsupported bit depth: {}", bits_per_sample)))?;

    let frames = u64::from(sample_rate) * duration_ms / 1000;
    let width = format.bytes_per_sample();
    let mut data = vec![0u8; frames as usize * format.frame_bytes(channels)];

    for (i, frame) in data.chunks_exact_mut(format.frame_bytes(channels)).enumerate() {
        let t = i as f32 / sample_rate as f32;
        let sample = TONE_AMPLITUDE * (2.0 * PI * frequency_hz * t).sin();
        for slot in frame.chunks_exact_mut(width) {
            format.encode(sample, slot);
        }
    }

    debug!(
        "Generated {} Hz tone: {} frames {} x{} @ {} Hz",
        frequency_hz, frames, format, channels, sample_rate
    );
    Ok(PcmClip {
        channels,
        sample_rate,
        bits_per_sample,
        data,
    })
}

/// Read a WAV file into PCM.
///
/// Integer WAVs keep their bit depth. 8-bit data is stored unsigned as in the
/// file; float WAVs are converted to 32-bit integer.
///
/// # Errors
/// `Error::Source` if the file cannot be read or has an unsupported layout.
pub fn load_wav(path: &Path) -> Result<PcmClip> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| Error::Source(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();
    let read_error = |e: hound::Error| Error::Source(format!("{}: {}", path.display(), e));

    let (format, samples): (SampleFormat, Vec<f32>) = match spec.sample_format {
        hound::SampleFormat::Float => {
            let samples = reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(read_error)?;
            (SampleFormat::S32, samples)
        }
        hound::SampleFormat::Int => {
            let format = SampleFormat::from_bits(i32::from(spec.bits_per_sample)).ok_or_else(|| {
                Error::Source(format!(
                    "{}: unsupported bit depth {}",
                    path.display(),
                    spec.bits_per_sample
                ))
            })?;
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            let samples = reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(read_error)?;
            (format, samples)
        }
    };

    let width = format.bytes_per_sample();
    let mut data = vec![0u8; samples.len() * width];
    for (sample, slot) in samples.iter().zip(data.chunks_exact_mut(width)) {
        format.encode(*sample, slot);
    }

    debug!(
        "Loaded {}: {} samples {} x{} @ {} Hz",
        path.display(),
        samples.len(),
        format,
        spec.channels,
        spec.sample_rate
    );
    Ok(PcmClip {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: (width * 8) as u16,
        data,
    })
}
