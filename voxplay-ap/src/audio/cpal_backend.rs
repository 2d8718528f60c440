//! cpal implementation of [`AudioBackend`]
//!
//! Devices are identified by the name the host reports for them; cpal 0.15 has
//! no other identifier that survives re-enumeration.

use crate::audio::backend::{
    AudioBackend, DeviceId, DeviceIdentity, ErrorCallback, OpenedStream, OutputStream,
    RenderCallback, StreamRequest,
};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, Stream, StreamConfig};
use tracing::{debug, info, warn};

/// Output sample formats we can render into, most preferred first
const PREFERRED_FORMATS: [SampleFormat; 3] = [SampleFormat::F32, SampleFormat::I16, SampleFormat::U16];

/// Audio backend using a cpal host.
pub struct CpalBackend {
    host: Host,
    name: String,
}

impl CpalBackend {
    /// Open a cpal host.
    ///
    /// # Arguments
    /// - `host_name`: Host to use (e.g. "ALSA", "JACK"), matched case-insensitively.
    ///   None = platform default host.
    ///
    /// # Errors
    /// `Error::BackendInit` if the named host does not exist or is unavailable.
    pub fn new(host_name: Option<&str>) -> Result<Self> {
        let host = match host_name {
            None => cpal::default_host(),
            Some(wanted) => {
                let available = cpal::available_hosts();
                let host_id = available
                    .iter()
                    .copied()
                    .find(|id| id.name().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        let names: Vec<&str> = available.iter().map(|id| id.name()).collect();
                        Error::BackendInit(format!(
                            "Audio host '{}' is not available (available: {})",
                            wanted,
                            names.join(", ")
                        ))
                    })?;
                cpal::host_from_id(host_id)
                    .map_err(|e| Error::BackendInit(format!("Failed to open host '{}': {}", wanted, e)))?
            }
        };

        let name = host.id().name().to_string();
        info!("Using audio host: {}", name);
        Ok(Self { host, name })
    }

    fn find_device(&self, id: &DeviceId) -> Result<Device> {
        let mut devices = self
            .host
            .output_devices()
            .map_err(|e| Error::DeviceQuery(format!("Failed to enumerate devices: {}", e)))?;

        devices
            .find(|d| d.name().ok().as_deref() == Some(id.as_str()))
            .ok_or_else(|| Error::DeviceOpen(format!("Device '{}' not found", id)))
    }

    /// Get the best supported configuration for the request.
    ///
    /// Prefers the requested rate and channel count in f32, then i16, then u16.
    /// Falls back to the device default configuration.
    fn best_config(device: &Device, request: &StreamRequest) -> Result<(StreamConfig, SampleFormat)> {
        let supported: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::DeviceOpen(format!("Failed to get device configs: {}", e)))?
            .collect();

        for format in PREFERRED_FORMATS {
            let preferred = supported.iter().find(|config| {
                config.channels() == request.channels
                    && config.min_sample_rate().0 <= request.sample_rate
                    && config.max_sample_rate().0 >= request.sample_rate
                    && config.sample_format() == format
            });

            if let Some(range) = preferred {
                let config = range
                    .clone()
                    .with_sample_rate(cpal::SampleRate(request.sample_rate))
                    .config();
                return Ok((config, format));
            }
        }

        let fallback = device
            .default_output_config()
            .map_err(|e| Error::DeviceOpen(format!("Failed to get default config: {}", e)))?;
        warn!(
            "Device does not support {} Hz / {} channels, using its default {} Hz / {} channels",
            request.sample_rate,
            request.channels,
            fallback.sample_rate().0,
            fallback.channels()
        );

        let sample_format = fallback.sample_format();
        Ok((fallback.config(), sample_format))
    }

    fn build_stream(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        render: RenderCallback,
        on_error: ErrorCallback,
    ) -> Result<Stream> {
        let mut render = render;
        let mut on_error = on_error;
        let error_callback = move |err: cpal::StreamError| on_error(err.to_string());

        let stream = match sample_format {
            SampleFormat::F32 => device.build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| render(data),
                error_callback,
                None,
            ),
            SampleFormat::I16 => {
                let mut scratch: Vec<f32> = Vec::new();
                device.build_output_stream(
                    config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        scratch.resize(data.len(), 0.0);
                        render(&mut scratch);
                        for (out, sample) in data.iter_mut().zip(&scratch) {
                            *out = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                        }
                    },
                    error_callback,
                    None,
                )
            }
            SampleFormat::U16 => {
                let mut scratch: Vec<f32> = Vec::new();
                device.build_output_stream(
                    config,
                    move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                        scratch.resize(data.len(), 0.0);
                        render(&mut scratch);
                        // Convert from [-1.0, 1.0] to [0, 65535]
                        for (out, sample) in data.iter_mut().zip(&scratch) {
                            *out = ((sample.clamp(-1.0, 1.0) + 1.0) * 32767.5) as u16;
                        }
                    },
                    error_callback,
                    None,
                )
            }
            other => {
                return Err(Error::DeviceOpen(format!("Unsupported sample format: {:?}", other)));
            }
        };

        stream.map_err(|e| Error::DeviceOpen(format!("Failed to build stream: {}", e)))
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_devices(&self) -> Result<Vec<DeviceIdentity>> {
        let default_name = self.host.default_output_device().and_then(|d| d.name().ok());

        let devices = self
            .host
            .output_devices()
            .map_err(|e| Error::DeviceQuery(format!("Failed to enumerate devices: {}", e)))?;

        let identities: Vec<DeviceIdentity> = devices
            .filter_map(|device| match device.name() {
                Ok(name) => Some(DeviceIdentity {
                    id: DeviceId::new(name.clone()),
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    name,
                }),
                Err(e) => {
                    debug!("Skipping output device without a name: {}", e);
                    None
                }
            })
            .collect();

        debug!("Found {} output devices", identities.len());
        Ok(identities)
    }

    fn open_output_stream(
        &self,
        device: &DeviceId,
        request: &StreamRequest,
        render: RenderCallback,
        on_error: ErrorCallback,
    ) -> Result<OpenedStream> {
        let cpal_device = self.find_device(device)?;
        let (mut config, sample_format) = Self::best_config(&cpal_device, request)?;

        if let Some(size) = request.buffer_size {
            config.buffer_size = cpal::BufferSize::Fixed(size);
            debug!("Using requested buffer size: {} frames", size);
        }

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}, buffer_size={:?}",
            config.sample_rate.0, config.channels, sample_format, config.buffer_size
        );

        let stream = Self::build_stream(&cpal_device, &config, sample_format, render, on_error)?;

        Ok(OpenedStream {
            stream: Box::new(CpalStream(stream)),
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        })
    }
}

struct CpalStream(Stream);

impl OutputStream for CpalStream {
    fn play(&self) -> Result<()> {
        self.0
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))
    }

    fn pause(&self) -> Result<()> {
        self.0
            .pause()
            .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))
    }
}
