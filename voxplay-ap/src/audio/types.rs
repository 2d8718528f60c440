//! Core audio data types
//!
//! Integer PCM sample formats accepted from the speech synthesizer, and the
//! conversions between their little-endian byte layout and f32 samples.

use std::fmt;

/// Integer PCM sample format, little-endian, interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Unsigned 8-bit, silence at 128
    U8,
    /// Signed 16-bit (most common for speech)
    S16,
    /// Signed 24-bit packed in 3 bytes
    S24,
    /// Signed 32-bit
    S32,
}

impl SampleFormat {
    /// Map a bits-per-sample value to a sample format.
    ///
    /// Returns None for bit depths without an integer PCM format.
    pub fn from_bits(bits_per_sample: i32) -> Option<Self> {
        match bits_per_sample {
            8 => Some(SampleFormat::U8),
            16 => Some(SampleFormat::S16),
            24 => Some(SampleFormat::S24),
            32 => Some(SampleFormat::S32),
            _ => None,
        }
    }

    /// Size of one sample in bytes
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 => 3,
            SampleFormat::S32 => 4,
        }
    }

    /// Size of one interleaved frame in bytes
    pub fn frame_bytes(self, channels: u16) -> usize {
        self.bytes_per_sample() * channels as usize
    }

    /// Decode one sample starting at `bytes[0]` to the range [-1.0, 1.0).
    ///
    /// `bytes` must hold at least `bytes_per_sample()` bytes.
    pub fn decode(self, bytes: &[u8]) -> f32 {
        match self {
            SampleFormat::U8 => (bytes[0] as f32 - 128.0) / 128.0,
            SampleFormat::S16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32_768.0,
            SampleFormat::S24 => {
                // Shift into the top of an i32 so the sign bit extends
                let value = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
                value as f32 / 8_388_608.0
            }
            SampleFormat::S32 => {
                let value = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                (value as f64 / 2_147_483_648.0) as f32
            }
        }
    }

    /// Encode one f32 sample into `out[..bytes_per_sample()]`, clamping to the format range.
    pub fn encode(self, sample: f32, out: &mut [u8]) {
        let sample = sample.clamp(-1.0, 1.0) as f64;
        match self {
            SampleFormat::U8 => {
                out[0] = (sample * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8;
            }
            SampleFormat::S16 => {
                let value = (sample * 32_768.0).round().clamp(-32_768.0, 32_767.0) as i16;
                out[..2].copy_from_slice(&value.to_le_bytes());
            }
            SampleFormat::S24 => {
                let value = (sample * 8_388_608.0).round().clamp(-8_388_608.0, 8_388_607.0) as i32;
                out[..3].copy_from_slice(&value.to_le_bytes()[..3]);
            }
            SampleFormat::S32 => {
                let value = (sample * 2_147_483_648.0)
                    .round()
                    .clamp(-2_147_483_648.0, 2_147_483_647.0) as i32;
                out[..4].copy_from_slice(&value.to_le_bytes());
            }
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
            SampleFormat::S24 => "s24",
            SampleFormat::S32 => "s32",
        };
        f.write_str(name)
    }
}

/// Number of whole frames described by a PCM byte count.
///
/// Trailing bytes that do not form a complete frame are ignored.
pub fn frames_in_bytes(byte_count: u64, channels: u16, bits_per_sample: u16) -> u64 {
    let bits_per_frame = channels as u64 * bits_per_sample as u64;
    if bits_per_frame == 0 {
        return 0;
    }
    byte_count.saturating_mul(8) / bits_per_frame
}

/// Convert interleaved PCM bytes to planar f32 channels.
///
/// Input:  [L, R, L, R, L, R, ...] (encoded)
/// Output: [[L, L, L, ...], [R, R, R, ...]]
pub fn deinterleave(bytes: &[u8], format: SampleFormat, channels: u16, frames: usize) -> Vec<Vec<f32>> {
    let num_channels = channels as usize;
    let sample_bytes = format.bytes_per_sample();
    let mut planar = vec![Vec::with_capacity(frames); num_channels];

    for frame in bytes.chunks_exact(format.frame_bytes(channels)).take(frames) {
        for (ch_idx, sample) in frame.chunks_exact(sample_bytes).enumerate() {
            planar[ch_idx].push(format.decode(sample));
        }
    }

    planar
}

/// Encode planar f32 channels into interleaved PCM bytes.
///
/// Writes `frames` frames starting at frame `start` of `planar` into `out`.
pub fn interleave_into(
    planar: &[Vec<f32>],
    start: usize,
    frames: usize,
    format: SampleFormat,
    out: &mut [u8],
) {
    let sample_bytes = format.bytes_per_sample();
    let frame_bytes = sample_bytes * planar.len();

    for (frame_idx, frame) in out.chunks_exact_mut(frame_bytes).take(frames).enumerate() {
        for (ch_idx, sample) in frame.chunks_exact_mut(sample_bytes).enumerate() {
            format.encode(planar[ch_idx][start + frame_idx], sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bits() {
        assert_eq!(SampleFormat::from_bits(8), Some(SampleFormat::U8));
        assert_eq!(SampleFormat::from_bits(16), Some(SampleFormat::S16));
        assert_eq!(SampleFormat::from_bits(24), Some(SampleFormat::S24));
        assert_eq!(SampleFormat::from_bits(32), Some(SampleFormat::S32));
        assert_eq!(SampleFormat::from_bits(12), None);
        assert_eq!(SampleFormat::from_bits(0), None);
        assert_eq!(SampleFormat::from_bits(-16), None);
    }

    #[test]
    fn test_frame_bytes() {
        assert_eq!(SampleFormat::S16.frame_bytes(2), 4);
        assert_eq!(SampleFormat::S24.frame_bytes(2), 6);
        assert_eq!(SampleFormat::U8.frame_bytes(1), 1);
    }

    #[test]
    fn test_u8_silence_is_midpoint() {
        assert_eq!(SampleFormat::U8.decode(&[128]), 0.0);

        let mut out = [0u8; 1];
        SampleFormat::U8.encode(0.0, &mut out);
        assert_eq!(out[0], 128);
    }

    #[test]
    fn test_s16_extremes() {
        assert_eq!(SampleFormat::S16.decode(&i16::MIN.to_le_bytes()), -1.0);

        let mut out = [0u8; 2];
        SampleFormat::S16.encode(1.5, &mut out);
        assert_eq!(i16::from_le_bytes(out), i16::MAX);
        SampleFormat::S16.encode(-1.0, &mut out);
        assert_eq!(i16::from_le_bytes(out), i16::MIN);
    }

    #[test]
    fn test_s24_sign_extension() {
        // -1 in 24-bit two's complement
        let decoded = SampleFormat::S24.decode(&[0xFF, 0xFF, 0xFF]);
        assert!(decoded < 0.0 && decoded > -0.001);

        let mut out = [0u8; 3];
        SampleFormat::S24.encode(-1.0, &mut out);
        assert_eq!(out, [0x00, 0x00, 0x80]);
    }

    #[test]
    fn test_integer_values_survive_f32() {
        for value in [-32768i16, -1234, 0, 1, 4321, 32767] {
            let bytes = value.to_le_bytes();
            let mut out = [0u8; 2];
            SampleFormat::S16.encode(SampleFormat::S16.decode(&bytes), &mut out);
            assert_eq!(i16::from_le_bytes(out), value);
        }
    }

    #[test]
    fn test_frames_in_bytes() {
        assert_eq!(frames_in_bytes(4, 2, 16), 1);
        assert_eq!(frames_in_bytes(100, 1, 8), 100);
        assert_eq!(frames_in_bytes(5, 2, 16), 1);
        assert_eq!(frames_in_bytes(1, 2, 16), 0);
    }

    #[test]
    fn test_deinterleave_stereo() {
        let mut bytes = Vec::new();
        for value in [100i16, -100, 200, -200] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        let planar = deinterleave(&bytes, SampleFormat::S16, 2, 2);
        assert_eq!(planar.len(), 2);
        assert_eq!(planar[0], vec![100.0 / 32768.0, 200.0 / 32768.0]);
        assert_eq!(planar[1], vec![-100.0 / 32768.0, -200.0 / 32768.0]);
    }

    #[test]
    fn test_interleave_into_offset() {
        let planar = vec![vec![0.0, 0.5], vec![0.0, -0.5]];
        let mut out = [0u8; 2];

        interleave_into(&planar, 1, 1, SampleFormat::U8, &mut out);
        assert_eq!(out, [192, 64]);
    }
}
