//! Deterministic audio backend for integration tests
//!
//! Stands in for cpal. The render callback handed to `open_output_stream` is
//! stored instead of being driven by hardware; tests call [`MockHost::pull`]
//! to run one audio callback on the test thread.

use std::sync::{Arc, Mutex, MutexGuard};

use voxplay_ap::audio::backend::{
    AudioBackend, DeviceId, DeviceIdentity, ErrorCallback, OpenedStream, OutputStream,
    RenderCallback, StreamRequest,
};
use voxplay_ap::audio::AudioContext;
use voxplay_ap::{Error, Result};

/// Native rate the mock devices run at unless changed
pub const MOCK_NATIVE_RATE: u32 = 48000;

struct MockState {
    devices: Vec<DeviceIdentity>,
    native_rate: u32,
    fail_enumeration: bool,
    fail_open: bool,
    /// Every device opened, in order
    opened: Vec<DeviceId>,
    /// Identifies the live stream; older streams are stale
    generation: u64,
    channels: u16,
    playing: bool,
    render: Option<RenderCallback>,
    on_error: Option<ErrorCallback>,
}

/// Test-side handle to the mock host. Cheap to clone.
#[derive(Clone)]
pub struct MockHost {
    state: Arc<Mutex<MockState>>,
}

impl MockHost {
    pub fn new(devices: Vec<DeviceIdentity>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                devices,
                native_rate: MOCK_NATIVE_RATE,
                fail_enumeration: false,
                fail_open: false,
                opened: Vec::new(),
                generation: 0,
                channels: 0,
                playing: false,
                render: None,
                on_error: None,
            })),
        }
    }

    /// Host with devices "dev0" and "dev1", where dev1 is the default.
    pub fn two_devices() -> Self {
        Self::new(vec![device("dev0", false), device("dev1", true)])
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Audio context backed by this host
    pub fn context(&self) -> AudioContext {
        AudioContext::with_backend(Box::new(MockBackend { host: self.clone() }))
    }

    pub fn set_devices(&self, devices: Vec<DeviceIdentity>) {
        self.lock().devices = devices;
    }

    pub fn set_native_rate(&self, rate: u32) {
        self.lock().native_rate = rate;
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.lock().fail_enumeration = fail;
    }

    pub fn fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    /// Devices opened so far, in order
    pub fn opened(&self) -> Vec<DeviceId> {
        self.lock().opened.clone()
    }

    pub fn open_count(&self) -> usize {
        self.lock().opened.len()
    }

    /// Whether a stream is open and playing
    pub fn is_playing(&self) -> bool {
        let state = self.lock();
        state.render.is_some() && state.playing
    }

    /// Run one audio callback of `frames` frames.
    ///
    /// Returns None when no stream is open and playing.
    pub fn pull(&self, frames: usize) -> Option<Vec<f32>> {
        let mut state = self.lock();
        if !state.playing {
            return None;
        }
        let channels = state.channels as usize;
        let render = state.render.as_mut()?;
        let mut out = vec![f32::NAN; frames * channels];
        render(&mut out);
        Some(out)
    }

    /// Pull callbacks until the mix has produced `frames` frames.
    pub fn pull_frames(&self, frames: usize, period: usize) -> usize {
        let mut pulled = 0;
        while pulled < frames {
            if self.pull(period).is_none() {
                break;
            }
            pulled += period;
        }
        pulled
    }

    /// Report a stream error, as a hot-unplugged device would.
    pub fn inject_stream_error(&self, message: &str) {
        if let Some(on_error) = self.lock().on_error.as_mut() {
            on_error(message.to_string());
        }
    }
}

pub fn device(name: &str, is_default: bool) -> DeviceIdentity {
    DeviceIdentity {
        id: DeviceId::new(name),
        name: name.to_string(),
        is_default,
    }
}

struct MockBackend {
    host: MockHost,
}

impl AudioBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn output_devices(&self) -> Result<Vec<DeviceIdentity>> {
        let state = self.host.lock();
        if state.fail_enumeration {
            return Err(Error::DeviceQuery("mock enumeration failure".to_string()));
        }
        Ok(state.devices.clone())
    }

    fn open_output_stream(
        &self,
        device: &DeviceId,
        request: &StreamRequest,
        render: RenderCallback,
        on_error: ErrorCallback,
    ) -> Result<OpenedStream> {
        let mut state = self.host.lock();
        if state.fail_open {
            return Err(Error::DeviceOpen(format!("mock cannot open '{}'", device)));
        }
        if !state.devices.iter().any(|d| &d.id == device) {
            return Err(Error::DeviceOpen(format!("Device '{}' not found", device)));
        }

        state.generation += 1;
        state.opened.push(device.clone());
        state.channels = request.channels;
        state.playing = false;
        state.render = Some(render);
        state.on_error = Some(on_error);

        Ok(OpenedStream {
            stream: Box::new(MockStream {
                host: self.host.clone(),
                generation: state.generation,
            }),
            sample_rate: state.native_rate,
            channels: request.channels,
        })
    }
}

struct MockStream {
    host: MockHost,
    generation: u64,
}

impl MockStream {
    fn is_current(&self, state: &MockState) -> bool {
        state.generation == self.generation
    }
}

impl OutputStream for MockStream {
    fn play(&self) -> Result<()> {
        let mut state = self.host.lock();
        if self.is_current(&state) {
            state.playing = true;
        }
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        let mut state = self.host.lock();
        if self.is_current(&state) {
            state.playing = false;
        }
        Ok(())
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        // Take the callbacks out first so the engine reference they hold is
        // released without the host lock held
        let released = {
            let mut state = self.host.lock();
            if !self.is_current(&state) {
                return;
            }
            state.playing = false;
            (state.render.take(), state.on_error.take())
        };
        drop(released);
    }
}
