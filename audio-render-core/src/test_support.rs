//! Scripted collaborators for exercising the lifecycle without hardware.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::RenderError;
use crate::models::format::{FormatConstraints, StreamFormat};
use crate::models::render_models::DeviceId;
use crate::models::state::StreamState;
use crate::traits::audio_driver::{AudioDriver, NativeStream, PullCallback};
use crate::traits::device_resolver::DeviceResolver;
use crate::traits::render_delegate::RenderDelegate;

pub fn mono_48k() -> StreamFormat {
    StreamFormat::pcm16_le(48000, 1)
}

/// Locator → device table the test edits to simulate plug and unplug.
#[derive(Default)]
pub struct ScriptedResolver {
    devices: Mutex<HashMap<String, DeviceId>>,
    constraints: Mutex<HashMap<DeviceId, FormatConstraints>>,
}

impl ScriptedResolver {
    pub fn with_device(locator: &str, id: &str) -> Arc<Self> {
        let resolver = Arc::new(Self::default());
        resolver.plug(locator, id);
        resolver
    }

    pub fn plug(&self, locator: &str, id: &str) {
        let id = DeviceId::new(id).expect("test device id");
        self.devices.lock().insert(locator.to_string(), id);
    }

    pub fn unplug(&self, locator: &str) {
        self.devices.lock().remove(locator);
    }

    pub fn constrain(&self, id: &str, constraints: FormatConstraints) {
        let id = DeviceId::new(id).expect("test device id");
        self.constraints.lock().insert(id, constraints);
    }
}

impl DeviceResolver for ScriptedResolver {
    fn resolve_device_id(&self, locator: &str) -> Option<DeviceId> {
        self.devices.lock().get(locator).cloned()
    }

    fn current_format_constraints(&self, device: &DeviceId) -> Option<FormatConstraints> {
        self.constraints.lock().get(device).copied()
    }
}

#[derive(Default)]
struct ManualState {
    callback: Mutex<Option<PullCallback>>,
    last_device: Mutex<Option<DeviceId>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_next_start: AtomicBool,
    in_flight_on_stop: AtomicBool,
}

/// Driver whose callback only fires when the test calls [`ManualDriver::pull`].
///
/// The callback stays reachable after stop so tests can probe late callbacks.
#[derive(Clone, Default)]
pub struct ManualDriver {
    state: Arc<ManualState>,
}

impl ManualDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke the callback on the calling thread, as the hardware would.
    pub fn pull(&self, len: usize) -> (Vec<u8>, usize) {
        let callback = self.callback().expect("stream was never started");
        let mut out = vec![0xEE; len];
        let copied = callback(&mut out[..]);
        (out, copied)
    }

    pub fn callback(&self) -> Option<PullCallback> {
        self.state.callback.lock().clone()
    }

    pub fn starts(&self) -> usize {
        self.state.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.state.stops.load(Ordering::SeqCst)
    }

    pub fn last_device(&self) -> Option<DeviceId> {
        self.state.last_device.lock().clone()
    }

    pub fn fail_next_start(&self) {
        self.state.fail_next_start.store(true, Ordering::SeqCst);
    }

    /// Make the native stop wait on a callback running on another thread.
    pub fn run_callback_during_stop(&self) {
        self.state.in_flight_on_stop.store(true, Ordering::SeqCst);
    }
}

impl AudioDriver for ManualDriver {
    fn name(&self) -> &str {
        "manual"
    }

    fn start_stream(
        &self,
        device: &DeviceId,
        _format: &StreamFormat,
        callback: PullCallback,
    ) -> Result<Box<dyn NativeStream>, RenderError> {
        if self.state.fail_next_start.swap(false, Ordering::SeqCst) {
            return Err(RenderError::DriverFailed("device busy".into()));
        }
        self.state.starts.fetch_add(1, Ordering::SeqCst);
        *self.state.last_device.lock() = Some(device.clone());
        *self.state.callback.lock() = Some(callback);
        Ok(Box::new(ManualStream {
            state: Arc::clone(&self.state),
        }))
    }
}

struct ManualStream {
    state: Arc<ManualState>,
}

impl NativeStream for ManualStream {
    fn stop(&mut self) -> Result<(), RenderError> {
        if self.state.in_flight_on_stop.load(Ordering::SeqCst) {
            if let Some(callback) = self.state.callback.lock().clone() {
                // Native stop returns only once the in-flight callback has.
                thread::spawn(move || {
                    let mut out = vec![0u8; 256];
                    callback(&mut out[..]);
                })
                .join()
                .map_err(|_| RenderError::DriverFailed("callback panicked".into()))?;
            }
        }
        self.state.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Driver that pulls `chunk` bytes every `period` on its own thread.
#[derive(Clone)]
pub struct ThreadedDriver {
    period: Duration,
    chunk: usize,
    rendered: Arc<Mutex<Vec<u8>>>,
}

impl ThreadedDriver {
    pub fn new(period: Duration, chunk: usize) -> Self {
        Self {
            period,
            chunk,
            rendered: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every byte the callback produced, silence included.
    pub fn rendered(&self) -> Vec<u8> {
        self.rendered.lock().clone()
    }
}

impl AudioDriver for ThreadedDriver {
    fn name(&self) -> &str {
        "threaded"
    }

    fn start_stream(
        &self,
        _device: &DeviceId,
        _format: &StreamFormat,
        callback: PullCallback,
    ) -> Result<Box<dyn NativeStream>, RenderError> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let rendered = Arc::clone(&self.rendered);
        let (period, chunk) = (self.period, self.chunk);

        let handle = thread::Builder::new()
            .name("test-driver".into())
            .spawn(move || {
                let mut out = vec![0u8; chunk];
                while flag.load(Ordering::SeqCst) {
                    callback(&mut out[..]);
                    rendered.lock().extend_from_slice(&out);
                    thread::sleep(period);
                }
            })
            .map_err(|e| RenderError::DriverFailed(e.to_string()))?;

        Ok(Box::new(ThreadedStream {
            running,
            handle: Some(handle),
        }))
    }
}

struct ThreadedStream {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl NativeStream for ThreadedStream {
    fn stop(&mut self) -> Result<(), RenderError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| RenderError::DriverFailed("driver thread panicked".into()))?;
        }
        Ok(())
    }
}

/// Delegate that records every notification.
#[derive(Default)]
pub struct RecordingDelegate {
    pub states: Mutex<Vec<StreamState>>,
    pub errors: Mutex<Vec<RenderError>>,
    pub drain_timeouts: Mutex<Vec<usize>>,
}

impl RenderDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: StreamState) {
        self.states.lock().push(state);
    }

    fn on_error(&self, error: &RenderError) {
        self.errors.lock().push(error.clone());
    }

    fn on_drain_timeout(&self, discarded_bytes: usize) {
        self.drain_timeouts.lock().push(discarded_bytes);
    }
}
