//! Audio resampling using rubato
//!
//! Converts speech PCM from the synthesizer's rate to the output device rate.
//! One linear resampler is cached and reused while the sample format and
//! channel count stay the same; only its ratio is retuned between calls.

use crate::audio::types::{deinterleave, interleave_into, SampleFormat};
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Input frames consumed per rubato call
pub const CHUNK_FRAMES: usize = 1024;

/// How far the ratio can be retuned in place, relative to the ratio the
/// instance was built with (in either direction)
pub const MAX_RELATIVE_RATIO: f64 = 8.0;

/// Zero chunks fed after the input to push out the delay line
const FLUSH_CHUNKS: usize = 2;

struct LinearState {
    engine: FastFixedIn<f32>,
    format: SampleFormat,
    channels: u16,
    rate_in: u32,
    rate_out: u32,
    /// Ratio at construction; retuning is bounded relative to it
    base_ratio: f64,
}

/// Cached linear resampler keyed by (format, channel count).
#[derive(Default)]
pub struct Resampler {
    state: Option<LinearState>,
    /// Instances built so far
    builds: u64,
}

impl Resampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the resampler ready for the given input shape and rate pair.
    ///
    /// - No instance, or a different format/channel count: rebuild.
    /// - Same shape and `rate_in == rate_out`: nothing to do (pass-through).
    /// - Same shape, different rates: retune the existing instance in place.
    pub fn ensure_ready(
        &mut self,
        format: SampleFormat,
        channels: u16,
        rate_in: u32,
        rate_out: u32,
    ) -> Result<()> {
        if rate_in == 0 || rate_out == 0 || channels == 0 {
            return Err(Error::Resampling(format!(
                "Invalid resampler parameters: channels={}, rate_in={}, rate_out={}",
                channels, rate_in, rate_out
            )));
        }

        let reusable = self
            .state
            .as_ref()
            .is_some_and(|state| state.format == format && state.channels == channels);

        if !reusable {
            self.rebuild(format, channels, rate_in, rate_out)?;
            return Ok(());
        }

        if rate_in == rate_out {
            return Ok(());
        }

        if let Some(state) = self.state.as_mut() {
            if state.rate_in == rate_in && state.rate_out == rate_out {
                return Ok(());
            }

            let ratio = rate_out as f64 / rate_in as f64;
            let relative = ratio / state.base_ratio;
            if relative < MAX_RELATIVE_RATIO && relative > 1.0 / MAX_RELATIVE_RATIO {
                state
                    .engine
                    .set_resample_ratio(ratio, false)
                    .map_err(|e| Error::Resampling(format!("Failed to set sample rate: {}", e)))?;
                state.rate_in = rate_in;
                state.rate_out = rate_out;
                debug!("Resampler retuned to {}Hz -> {}Hz", rate_in, rate_out);
                return Ok(());
            }

            debug!(
                "Ratio {}Hz -> {}Hz outside tunable range, rebuilding resampler",
                rate_in, rate_out
            );
        }

        self.rebuild(format, channels, rate_in, rate_out)
    }

    fn rebuild(&mut self, format: SampleFormat, channels: u16, rate_in: u32, rate_out: u32) -> Result<()> {
        self.state = Some(Self::build(format, channels, rate_in, rate_out)?);
        self.builds += 1;
        Ok(())
    }

    fn build(format: SampleFormat, channels: u16, rate_in: u32, rate_out: u32) -> Result<LinearState> {
        let ratio = rate_out as f64 / rate_in as f64;
        let engine = FastFixedIn::<f32>::new(
            ratio,
            MAX_RELATIVE_RATIO,
            PolynomialDegree::Linear,
            CHUNK_FRAMES,
            channels as usize,
        )
        .map_err(|e| Error::Resampling(format!("Failed to initialize resampler: {}", e)))?;

        debug!(
            "Created linear resampler: format={}, channels={}, {}Hz -> {}Hz",
            format, channels, rate_in, rate_out
        );

        Ok(LinearState {
            engine,
            format,
            channels,
            rate_in,
            rate_out,
            base_ratio: ratio,
        })
    }

    /// Whether a resampler instance exists
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Current (format, channels), if initialized
    pub fn shape(&self) -> Option<(SampleFormat, u16)> {
        self.state.as_ref().map(|state| (state.format, state.channels))
    }

    /// Number of resampler instances created; retuning does not count
    pub fn builds(&self) -> u64 {
        self.builds
    }

    /// Current (rate_in, rate_out), if initialized
    pub fn rates(&self) -> Option<(u32, u32)> {
        self.state.as_ref().map(|state| (state.rate_in, state.rate_out))
    }

    /// Upper bound on output frames for `frames_in` input frames.
    ///
    /// `ceil(frames_in * rate_out / rate_in)`; `process` never produces more.
    pub fn expected_output_frames(&self, frames_in: u64) -> Result<u64> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| Error::Resampling("Resampler is not initialized".to_string()))?;

        Ok(expected_frames(frames_in, state.rate_in, state.rate_out))
    }

    /// Resample `frames_in` frames of `src` into `dst`.
    ///
    /// `dst` is filled up to its length (rounded down to whole frames), which
    /// callers size from [`expected_output_frames`](Self::expected_output_frames).
    /// The filter's output delay is skipped and its tail flushed with silence,
    /// so output frame 0 lines up with input frame 0 and the end of one call
    /// does not spill into the next.
    ///
    /// # Returns
    /// Number of frames written to `dst`
    ///
    /// # Errors
    /// - Resampler not initialized
    /// - `src` shorter than `frames_in` frames
    /// - `dst` not a whole number of frames
    pub fn process(&mut self, frames_in: u64, src: &[u8], dst: &mut [u8]) -> Result<u64> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| Error::Resampling("Resampler is not initialized".to_string()))?;

        let frame_bytes = state.format.frame_bytes(state.channels);
        let frames_in = usize::try_from(frames_in)
            .map_err(|_| Error::Resampling(format!("Frame count {} too large", frames_in)))?;

        if src.len() < frames_in * frame_bytes {
            return Err(Error::Resampling(format!(
                "Source holds {} bytes, {} frames need {}",
                src.len(),
                frames_in,
                frames_in * frame_bytes
            )));
        }
        if dst.len() % frame_bytes != 0 {
            return Err(Error::Resampling(format!(
                "Destination size {} is not a multiple of the {}-byte frame",
                dst.len(),
                frame_bytes
            )));
        }
        if frames_in == 0 {
            return Ok(0);
        }

        let capacity = dst.len() / frame_bytes;
        let planar = deinterleave(&src[..frames_in * frame_bytes], state.format, state.channels, frames_in);

        let mut skip = state.engine.output_delay();
        let mut written = 0usize;
        let mut offset = 0usize;
        let mut flushed = 0usize;

        while written < capacity && flushed < FLUSH_CHUNKS {
            let chunk = state.engine.input_frames_next();
            let take = chunk.min(frames_in - offset);
            if take == 0 {
                flushed += 1;
            }

            // Short chunks are zero-padded up to the fixed input size
            let block: Vec<Vec<f32>> = planar
                .iter()
                .map(|channel| {
                    let mut samples = channel[offset..offset + take].to_vec();
                    samples.resize(chunk, 0.0);
                    samples
                })
                .collect();

            let output = state
                .engine
                .process(&block, None)
                .map_err(|e| Error::Resampling(format!("Failed to resample audio: {}", e)))?;

            let produced = output.first().map_or(0, Vec::len);
            let start = skip.min(produced);
            skip -= start;
            let keep = (produced - start).min(capacity - written);
            interleave_into(
                &output,
                start,
                keep,
                state.format,
                &mut dst[written * frame_bytes..(written + keep) * frame_bytes],
            );

            written += keep;
            offset += take;
        }

        debug!(
            "Resampled {} input frames to {} output frames ({}Hz -> {}Hz)",
            frames_in, written, state.rate_in, state.rate_out
        );

        Ok(written as u64)
    }
}

/// `ceil(frames_in * rate_out / rate_in)`, saturating at u64::MAX.
pub fn expected_frames(frames_in: u64, rate_in: u32, rate_out: u32) -> u64 {
    if rate_in == 0 {
        return 0;
    }
    let numerator = frames_in as u128 * rate_out as u128;
    let frames = numerator.div_ceil(rate_in as u128);
    u64::try_from(frames).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_expected_frames_proportional() {
        assert_eq!(expected_frames(100, 8000, 48000), 600);
        assert_eq!(expected_frames(1000, 48000, 44100), 919);
        assert_eq!(expected_frames(0, 22050, 48000), 0);
        assert_eq!(expected_frames(1, 48000, 8000), 1);
    }

    #[test]
    fn test_uninitialized_resampler_fails() {
        let mut resampler = Resampler::new();
        assert!(resampler.expected_output_frames(10).is_err());

        let mut dst = [0u8; 4];
        let err = resampler.process(1, &[0u8; 4], &mut dst).unwrap_err();
        assert!(matches!(err, Error::Resampling(_)));
    }

    #[test]
    fn test_reused_while_shape_matches() {
        let mut resampler = Resampler::new();
        resampler.ensure_ready(SampleFormat::S16, 1, 16000, 48000).unwrap();
        resampler.ensure_ready(SampleFormat::S16, 1, 22050, 48000).unwrap();
        resampler.ensure_ready(SampleFormat::S16, 1, 24000, 44100).unwrap();

        assert_eq!(resampler.shape(), Some((SampleFormat::S16, 1)));
        assert_eq!(resampler.rates(), Some((24000, 44100)));
        // Retuned in place, never recreated
        assert_eq!(resampler.builds(), 1);
        assert_eq!(resampler.expected_output_frames(24000).unwrap(), 44100);
    }

    #[test]
    fn test_retuned_instance_produces_new_ratio() {
        let mut resampler = Resampler::new();
        resampler.ensure_ready(SampleFormat::S16, 1, 16000, 48000).unwrap();
        resampler.ensure_ready(SampleFormat::S16, 1, 24000, 48000).unwrap();

        let src = s16_bytes(&[8000i16; 2000]);
        let mut dst = vec![0u8; 4000 * 2];
        let written = resampler.process(2000, &src, &mut dst).unwrap();

        assert_eq!(written, 4000);
        assert_eq!(resampler.builds(), 1);
    }

    #[test]
    fn test_equal_rates_keep_previous_tuning() {
        let mut resampler = Resampler::new();
        resampler.ensure_ready(SampleFormat::S16, 1, 16000, 48000).unwrap();
        resampler.ensure_ready(SampleFormat::S16, 1, 48000, 48000).unwrap();

        assert_eq!(resampler.rates(), Some((16000, 48000)));
    }

    #[test]
    fn test_rebuilt_on_shape_change() {
        let mut resampler = Resampler::new();
        resampler.ensure_ready(SampleFormat::S16, 1, 16000, 48000).unwrap();
        resampler.ensure_ready(SampleFormat::U8, 2, 48000, 48000).unwrap();

        assert_eq!(resampler.shape(), Some((SampleFormat::U8, 2)));
        assert_eq!(resampler.rates(), Some((48000, 48000)));
        assert_eq!(resampler.builds(), 2);
    }

    #[test]
    fn test_out_of_range_ratio_rebuilds() {
        let mut resampler = Resampler::new();
        resampler.ensure_ready(SampleFormat::S16, 1, 48000, 48000).unwrap();
        // 16x away from the base ratio
        resampler.ensure_ready(SampleFormat::S16, 1, 3000, 48000).unwrap();

        assert_eq!(resampler.rates(), Some((3000, 48000)));
        assert_eq!(resampler.expected_output_frames(10).unwrap(), 160);
        assert_eq!(resampler.builds(), 2);
    }

    #[test]
    fn test_rejects_zero_rates() {
        let mut resampler = Resampler::new();
        assert!(resampler.ensure_ready(SampleFormat::S16, 1, 0, 48000).is_err());
        assert!(resampler.ensure_ready(SampleFormat::S16, 0, 8000, 48000).is_err());
    }

    #[test]
    fn test_upsample_fills_expected_frames() {
        let mut resampler = Resampler::new();
        resampler.ensure_ready(SampleFormat::U8, 1, 8000, 48000).unwrap();

        let src = vec![128u8; 100];
        let expected = resampler.expected_output_frames(100).unwrap();
        assert_eq!(expected, 600);

        let mut dst = vec![0u8; expected as usize];
        let written = resampler.process(100, &src, &mut dst).unwrap();

        assert_eq!(written, 600);
        // Silence stays silence
        assert!(dst.iter().all(|&b| b == 128));
    }

    #[test]
    fn test_downsample_multi_chunk() {
        let mut resampler = Resampler::new();
        resampler.ensure_ready(SampleFormat::S16, 2, 48000, 24000).unwrap();

        let frames = 3000u64;
        let src = s16_bytes(&vec![1000i16; frames as usize * 2]);
        let expected = resampler.expected_output_frames(frames).unwrap();
        assert_eq!(expected, 1500);

        let mut dst = vec![0u8; expected as usize * 4];
        let written = resampler.process(frames, &src, &mut dst).unwrap();

        assert_eq!(written, expected);
    }

    #[test]
    fn test_utterances_do_not_bleed_into_each_other() {
        let mut resampler = Resampler::new();
        resampler.ensure_ready(SampleFormat::S16, 1, 24000, 48000).unwrap();

        let loud = s16_bytes(&[16000i16; 1024]);
        let mut first = vec![0u8; 2048 * 2];
        assert_eq!(resampler.process(1024, &loud, &mut first).unwrap(), 2048);

        // No leading silence from the filter delay
        let head = i16::from_le_bytes([first[0], first[1]]);
        assert!(head > 8000, "leading sample {}", head);

        let silent = vec![0u8; 1024 * 2];
        let mut second = vec![0xFFu8; 2048 * 2];
        assert_eq!(resampler.process(1024, &silent, &mut second).unwrap(), 2048);
        assert!(second.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_never_writes_past_destination() {
        let mut resampler = Resampler::new();
        resampler.ensure_ready(SampleFormat::S16, 1, 8000, 48000).unwrap();

        let src = s16_bytes(&[500i16; 10]);
        let mut dst = vec![0xAAu8; 20];
        let written = resampler.process(10, &src, &mut dst[..12]).unwrap();

        assert_eq!(written, 6);
        assert!(dst[12..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_short_source_rejected() {
        let mut resampler = Resampler::new();
        resampler.ensure_ready(SampleFormat::S16, 2, 8000, 48000).unwrap();

        let mut dst = vec![0u8; 64];
        let err = resampler.process(10, &[0u8; 8], &mut dst).unwrap_err();
        assert!(matches!(err, Error::Resampling(_)));
    }

    #[test]
    fn test_misaligned_destination_rejected() {
        let mut resampler = Resampler::new();
        resampler.ensure_ready(SampleFormat::S16, 2, 8000, 48000).unwrap();

        let mut dst = vec![0u8; 7];
        assert!(resampler.process(1, &[0u8; 4], &mut dst).is_err());
    }

    #[test]
    fn test_zero_input_frames_is_zero_output() {
        let mut resampler = Resampler::new();
        resampler.ensure_ready(SampleFormat::S16, 1, 8000, 48000).unwrap();

        assert_eq!(resampler.expected_output_frames(0).unwrap(), 0);
        let mut dst: Vec<u8> = Vec::new();
        assert_eq!(resampler.process(0, &[], &mut dst).unwrap(), 0);
    }
}
