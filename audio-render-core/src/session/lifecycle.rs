use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::config::RenderConfiguration;
use crate::models::error::RenderError;
use crate::models::format::{self, StreamFormat};
use crate::models::render_models::{DeviceId, RenderDiagnostics, StreamSession};
use crate::models::state::StreamState;
use crate::processing::stream_buffer::{RetryReason, StreamBuffer, WriteOutcome};
use crate::traits::audio_driver::{AudioDriver, NativeStream, PullCallback};
use crate::traits::device_resolver::DeviceResolver;
use crate::traits::enumeration_observer::HotSwapSnapshot;
use crate::traits::gain_transform::GainTransform;
use crate::traits::render_delegate::RenderDelegate;

/// Everything the stream lock protects.
struct StreamInner {
    state: StreamState,
    locator: Option<String>,
    device: Option<DeviceId>,
    format: Option<StreamFormat>,
    buffer: Option<StreamBuffer>,
    native: Option<Box<dyn NativeStream>>,
    session: Option<StreamSession>,
}

impl StreamInner {
    fn new() -> Self {
        Self {
            state: StreamState::Closed,
            locator: None,
            device: None,
            format: None,
            buffer: None,
            native: None,
            session: None,
        }
    }

    fn pending_bytes(&self) -> usize {
        self.buffer.as_ref().map_or(0, StreamBuffer::pending_bytes)
    }
}

/// Counters the callback can bump without the lock.
#[derive(Default)]
struct RenderCounters {
    callback_count: AtomicU64,
    contended_callbacks: AtomicU64,
    underrun_callbacks: AtomicU64,
    bytes_accepted: AtomicU64,
    bytes_rendered: AtomicU64,
    silence_bytes: AtomicU64,
    backpressure_retries: AtomicU64,
    dropped_writes: AtomicU64,
    drain_timeouts: AtomicU64,
    buffer_grows: AtomicU64,
}

impl RenderCounters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// State shared between the application side and the driver callback.
///
/// Lock discipline: the callback only ever calls `try_lock`; every other
/// path uses a blocking `lock` and never holds it across the native stop.
struct StreamShared {
    inner: Mutex<StreamInner>,
    drained: Condvar,
    counters: RenderCounters,
}

/// How a `stop()` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The stream was not running; nothing happened.
    NotRunning,
    /// The native stream was stopped and the buffer released.
    Stopped {
        /// False when the drain timeout elapsed with audio still queued.
        drained: bool,
        discarded_bytes: usize,
        waited: Duration,
    },
}

impl StopOutcome {
    pub fn was_running(&self) -> bool {
        matches!(self, Self::Stopped { .. })
    }

    pub fn drained(&self) -> bool {
        matches!(self, Self::Stopped { drained: true, .. })
    }
}

/// How the lifecycle reacted after a device enumeration change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotSwapOutcome {
    /// The stream was not running before the change; nothing to restore.
    Idle,
    Restarted,
    /// Restart failed (device gone, driver error); the stream stays open.
    RestartFailed(RenderError),
}

/// Open/start/stop/close state machine for one output stream.
///
/// Owns the [`StreamBuffer`] and the native stream handle. All methods take
/// `&self`, so the lifecycle can be shared behind an `Arc` between the
/// producer, the application and a [`HotSwapCoordinator`].
///
/// ```text
/// [Producer] → write() → [StreamBuffer] → pull callback → [AudioDriver]
///                               ↑
///          start()/stop() ──────┘ (drain, then native stop without the lock)
/// ```
///
/// [`HotSwapCoordinator`]: crate::session::hot_swap::HotSwapCoordinator
pub struct StreamLifecycle {
    shared: Arc<StreamShared>,
    driver: Arc<dyn AudioDriver>,
    resolver: Arc<dyn DeviceResolver>,
    config: RenderConfiguration,
    gain: Option<Arc<dyn GainTransform>>,
    delegate: Option<Arc<dyn RenderDelegate>>,
}

impl StreamLifecycle {
    pub fn new(driver: Arc<dyn AudioDriver>, resolver: Arc<dyn DeviceResolver>) -> Self {
        Self {
            shared: Arc::new(StreamShared {
                inner: Mutex::new(StreamInner::new()),
                drained: Condvar::new(),
                counters: RenderCounters::default(),
            }),
            driver,
            resolver,
            config: RenderConfiguration::default(),
            gain: None,
            delegate: None,
        }
    }

    pub fn with_config(
        driver: Arc<dyn AudioDriver>,
        resolver: Arc<dyn DeviceResolver>,
        config: RenderConfiguration,
    ) -> Result<Self, RenderError> {
        config.validate().map_err(RenderError::ConfigurationFailed)?;
        let mut lifecycle = Self::new(driver, resolver);
        lifecycle.config = config;
        Ok(lifecycle)
    }

    pub fn with_gain(mut self, gain: Arc<dyn GainTransform>) -> Self {
        self.gain = Some(gain);
        self
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn RenderDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn config(&self) -> &RenderConfiguration {
        &self.config
    }

    pub fn state(&self) -> StreamState {
        self.shared.inner.lock().state
    }

    pub fn device_id(&self) -> Option<DeviceId> {
        self.shared.inner.lock().device.clone()
    }

    pub fn format(&self) -> Option<StreamFormat> {
        self.shared.inner.lock().format
    }

    /// Bytes written but not yet pulled by the driver.
    pub fn pending_bytes(&self) -> usize {
        self.shared.inner.lock().pending_bytes()
    }

    pub fn current_session(&self) -> Option<StreamSession> {
        self.shared.inner.lock().session.clone()
    }

    pub fn diagnostics(&self) -> RenderDiagnostics {
        let (buffer_capacity, pending_bytes) = {
            let inner = self.shared.inner.lock();
            let capacity = inner.buffer.as_ref().map_or(0, StreamBuffer::capacity);
            (capacity, inner.pending_bytes())
        };
        let c = &self.shared.counters;
        RenderDiagnostics {
            callback_count: c.callback_count.load(Ordering::Relaxed),
            contended_callbacks: c.contended_callbacks.load(Ordering::Relaxed),
            underrun_callbacks: c.underrun_callbacks.load(Ordering::Relaxed),
            bytes_accepted: c.bytes_accepted.load(Ordering::Relaxed),
            bytes_rendered: c.bytes_rendered.load(Ordering::Relaxed),
            silence_bytes: c.silence_bytes.load(Ordering::Relaxed),
            backpressure_retries: c.backpressure_retries.load(Ordering::Relaxed),
            dropped_writes: c.dropped_writes.load(Ordering::Relaxed),
            drain_timeouts: c.drain_timeouts.load(Ordering::Relaxed),
            buffer_grows: c.buffer_grows.load(Ordering::Relaxed),
            buffer_capacity,
            pending_bytes,
        }
    }

    /// Formats acceptable on the currently associated device.
    pub fn supported_formats(&self) -> Vec<StreamFormat> {
        let constraints = self
            .device_id()
            .and_then(|device| self.resolver.current_format_constraints(&device));
        format::supported_formats(constraints.as_ref())
    }

    /// Associate the stream with a device and format. Transitions: closed → open.
    ///
    /// Does nothing if the stream is already open.
    pub fn open(&self, locator: &str, format: Option<StreamFormat>) -> Result<(), RenderError> {
        let mut inner = self.shared.inner.lock();
        if inner.state.has_device() {
            log::debug!("open ignored: stream already {:?}", inner.state);
            return Ok(());
        }

        let device = self
            .resolver
            .resolve_device_id(locator)
            .ok_or(RenderError::NoDeviceSelected)?;
        let format = format
            .filter(StreamFormat::is_specified)
            .ok_or(RenderError::FormatUnset)?;
        format.validate().map_err(RenderError::UnsupportedFormat)?;
        self.check_device_supports(&device, &format)?;

        log::debug!("opened output stream on {} with {}", device, format);
        inner.locator = Some(locator.to_string());
        inner.device = Some(device);
        inner.format = Some(format);
        inner.state = StreamState::Open;
        drop(inner);

        self.notify_state(StreamState::Open);
        Ok(())
    }

    /// Start the native stream. Transitions: open → running.
    ///
    /// Re-resolves the device first; an unplugged device fails with
    /// `NoDeviceSelected` and leaves the stream open for a later retry.
    pub fn start(&self) -> Result<(), RenderError> {
        let mut inner = self.shared.inner.lock();
        match inner.state {
            StreamState::Running => return Ok(()),
            StreamState::Closed => {
                return Err(RenderError::InvalidState("start requires an open stream".into()))
            }
            StreamState::Stopping => {
                return Err(RenderError::InvalidState("stream is still stopping".into()))
            }
            StreamState::Open => {}
        }

        let locator = inner.locator.clone().unwrap_or_default();
        inner.device = self.resolver.resolve_device_id(&locator);
        let Some(device) = inner.device.clone() else {
            log::warn!("cannot start stream: '{}' does not resolve to a device", locator);
            return Err(RenderError::NoDeviceSelected);
        };
        let format = inner.format.ok_or(RenderError::FormatUnset)?;
        self.check_device_supports(&device, &format)?;

        // Callbacks fired before the state flips see `Open` and render silence.
        let native = self
            .driver
            .start_stream(&device, &format, pull_callback(&self.shared))
            .inspect_err(|e| {
                log::error!(
                    "{} failed to start stream on {}: {}",
                    self.driver.name(),
                    device,
                    e
                )
            })?;

        let session = StreamSession::new(device, format);
        log::info!(
            "stream {} started on {} ({}) via {}",
            session.id,
            session.device,
            format,
            self.driver.name()
        );
        inner.native = Some(native);
        inner.session = Some(session);
        inner.buffer = None;
        inner.state = StreamState::Running;
        drop(inner);

        self.notify_state(StreamState::Running);
        Ok(())
    }

    /// Queue PCM bytes for the driver. Never blocks on a full buffer.
    ///
    /// The gain hook runs on accepted bytes only.
    pub fn write(&self, bytes: &[u8]) -> Result<WriteOutcome, RenderError> {
        let counters = &self.shared.counters;
        let mut inner = self.shared.inner.lock();
        match inner.state {
            StreamState::Running => {}
            StreamState::Stopping => {
                RenderCounters::bump(&counters.backpressure_retries, 1);
                return Ok(WriteOutcome::Retry(RetryReason::Draining));
            }
            StreamState::Open | StreamState::Closed => {
                RenderCounters::bump(&counters.dropped_writes, 1);
                log::trace!("dropping {} bytes: stream is {:?}", bytes.len(), inner.state);
                return Ok(WriteOutcome::Dropped);
            }
        }

        let format = inner.format.ok_or(RenderError::FormatUnset)?;
        let ceiling = self.ceiling_for(&format);
        if bytes.len() > ceiling {
            return Err(RenderError::ChunkTooLarge {
                len: bytes.len(),
                ceiling,
            });
        }

        let headroom = self.config.headroom_chunks;
        let buffer = inner
            .buffer
            .get_or_insert_with(|| StreamBuffer::new(ceiling, headroom));
        let grows_before = buffer.grow_count();
        let outcome = buffer.write(bytes);

        match outcome {
            WriteOutcome::Accepted => {
                if let Some(ref gain) = self.gain {
                    gain.apply(buffer.unread_tail_mut(bytes.len()), &format);
                }
                RenderCounters::bump(&counters.bytes_accepted, bytes.len() as u64);
            }
            WriteOutcome::Retry(_) => RenderCounters::bump(&counters.backpressure_retries, 1),
            WriteOutcome::Dropped => {}
        }
        RenderCounters::bump(&counters.buffer_grows, buffer.grow_count() - grows_before);

        Ok(outcome)
    }

    /// `write` with sleep-and-retry on backpressure.
    ///
    /// Sleeps `retry_interval_ms` between attempts and gives up with
    /// `BackpressureTimeout` after `max_write_retries` retries.
    pub fn write_blocking(&self, bytes: &[u8]) -> Result<WriteOutcome, RenderError> {
        let mut retries = 0u32;
        loop {
            let outcome = self.write(bytes)?;
            if !outcome.is_retry() {
                return Ok(outcome);
            }

            retries += 1;
            if self.config.max_write_retries.is_some_and(|max| retries > max) {
                log::warn!(
                    "giving up on {}-byte chunk after {} retries",
                    bytes.len(),
                    retries - 1
                );
                return Err(RenderError::BackpressureTimeout);
            }
            thread::sleep(self.config.retry_interval());
        }
    }

    /// Drain and stop the native stream. Transitions: running → stopping → open.
    ///
    /// Waits at most `drain_timeout_ms` for the driver to consume queued
    /// audio, then stops regardless. The native stop runs without the stream
    /// lock so a callback it waits on can finish.
    pub fn stop(&self) -> StopOutcome {
        let mut inner = self.shared.inner.lock();
        if !inner.state.is_running() {
            log::debug!("stop ignored: stream is {:?}", inner.state);
            return StopOutcome::NotRunning;
        }
        inner.state = StreamState::Stopping;
        let session_id = inner
            .session
            .as_ref()
            .map(|s| s.id.clone())
            .unwrap_or_default();
        drop(inner);
        self.notify_state(StreamState::Stopping);

        let started = Instant::now();
        let deadline = started + self.config.drain_timeout();
        let mut inner = self.shared.inner.lock();
        while inner.pending_bytes() > 0 {
            if self.shared.drained.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }
        let discarded_bytes = inner.pending_bytes();
        let native = inner.native.take();
        drop(inner);
        let waited = started.elapsed();

        if discarded_bytes > 0 {
            log::warn!(
                "stream {}: drain timed out after {:?}, discarding {} bytes",
                session_id,
                waited,
                discarded_bytes
            );
            RenderCounters::bump(&self.shared.counters.drain_timeouts, 1);
            if let Some(ref delegate) = self.delegate {
                delegate.on_drain_timeout(discarded_bytes);
            }
        }

        if let Some(mut native) = native {
            if let Err(e) = native.stop() {
                log::warn!("stream {}: native stop failed: {}", session_id, e);
                self.notify_error(&e);
            }
        }

        {
            let mut inner = self.shared.inner.lock();
            inner.buffer = None;
            inner.session = None;
            inner.state = StreamState::Open;
        }
        log::info!("stream {} stopped", session_id);
        self.notify_state(StreamState::Open);

        StopOutcome::Stopped {
            drained: discarded_bytes == 0,
            discarded_bytes,
            waited,
        }
    }

    /// Release the device association. Transitions: open → closed.
    ///
    /// A running stream is stopped first.
    pub fn close(&self) -> Result<(), RenderError> {
        self.stop();

        let mut inner = self.shared.inner.lock();
        match inner.state {
            StreamState::Closed => return Ok(()),
            StreamState::Open => {}
            state => {
                return Err(RenderError::InvalidState(format!(
                    "cannot close a {:?} stream",
                    state
                )))
            }
        }
        inner.locator = None;
        inner.device = None;
        inner.format = None;
        inner.state = StreamState::Closed;
        drop(inner);

        log::debug!("closed output stream");
        self.notify_state(StreamState::Closed);
        Ok(())
    }

    /// Point the stream at another device, restarting it if it was running.
    pub fn switch_device(&self, locator: &str) -> Result<(), RenderError> {
        let (_, was_running) = self
            .update_while_open(|inner| {
                inner.locator = Some(locator.to_string());
                inner.device = self.resolver.resolve_device_id(locator);
                log::debug!("playback device now {:?}", inner.device);
            })
            .ok_or_else(|| {
                RenderError::InvalidState("switching device requires an open stream".into())
            })?;

        if was_running {
            self.start()
        } else {
            Ok(())
        }
    }

    /// First half of a device enumeration change: stop a running stream.
    pub fn will_change(&self) -> HotSwapSnapshot {
        let was_running = self.stop().was_running();
        let snapshot = HotSwapSnapshot {
            was_running,
            device: self.device_id(),
        };
        log::debug!("device list about to change: {:?}", snapshot);
        snapshot
    }

    /// Second half of a device enumeration change: re-resolve the device and
    /// restart if the stream was running before.
    pub fn did_change(&self, snapshot: HotSwapSnapshot) -> HotSwapOutcome {
        {
            let inner = self.shared.inner.lock();
            match inner.state {
                StreamState::Closed => return HotSwapOutcome::Idle,
                StreamState::Running => {
                    // Restarted by the application between the two hooks.
                    let locator = inner.locator.clone().unwrap_or_default();
                    let resolved = self.resolver.resolve_device_id(&locator);
                    if resolved.is_some() && resolved == inner.device {
                        log::debug!("stream already running on {:?}", resolved);
                        return if snapshot.was_running {
                            HotSwapOutcome::Restarted
                        } else {
                            HotSwapOutcome::Idle
                        };
                    }
                    log::warn!(
                        "output device {:?} changed under a running stream, stopping",
                        inner.device
                    );
                }
                StreamState::Open | StreamState::Stopping => {}
            }
        }

        let Some((device, stopped)) = self.update_while_open(|inner| {
            let locator = inner.locator.clone().unwrap_or_default();
            inner.device = self.resolver.resolve_device_id(&locator);
            inner.device.clone()
        }) else {
            return HotSwapOutcome::Idle;
        };

        if device != snapshot.device {
            log::info!(
                "output device changed from {:?} to {:?}",
                snapshot.device,
                device
            );
        }
        if !(snapshot.was_running || stopped) {
            return HotSwapOutcome::Idle;
        }

        match self.start() {
            Ok(()) => HotSwapOutcome::Restarted,
            Err(e) => {
                log::warn!("could not restart stream after device change: {}", e);
                self.notify_error(&e);
                HotSwapOutcome::RestartFailed(e)
            }
        }
    }

    /// Application-side view of state and device taken under one lock.
    #[cfg(test)]
    pub(crate) fn running_without_device(&self) -> bool {
        let inner = self.shared.inner.lock();
        inner.state.is_running() && inner.device.is_none()
    }

    // --- Internal helpers ---

    /// Run `update` under the lock once the stream is `Open`.
    ///
    /// A running stream is stopped first and a stopping one is waited out, so
    /// the device is never rewritten under a live native stream. Returns
    /// `None` for a closed stream, otherwise the result and whether this call
    /// stopped a running stream.
    fn update_while_open<R>(&self, update: impl FnOnce(&mut StreamInner) -> R) -> Option<(R, bool)> {
        let mut stopped = false;
        loop {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                StreamState::Closed => return None,
                StreamState::Open => return Some((update(&mut *inner), stopped)),
                StreamState::Running => {
                    drop(inner);
                    stopped |= self.stop().was_running();
                }
                StreamState::Stopping => {
                    drop(inner);
                    thread::sleep(self.config.retry_interval());
                }
            }
        }
    }

    fn ceiling_for(&self, format: &StreamFormat) -> usize {
        format.bytes_for(self.config.buffer_ceiling())
    }

    fn check_device_supports(&self, device: &DeviceId, format: &StreamFormat) -> Result<(), RenderError> {
        match self.resolver.current_format_constraints(device) {
            Some(constraints) if !constraints.supports(format) => Err(RenderError::UnsupportedFormat(
                format!("{} not supported by {}", format, device),
            )),
            _ => Ok(()),
        }
    }

    fn notify_state(&self, state: StreamState) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(state);
        }
    }

    fn notify_error(&self, error: &RenderError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(error);
        }
    }
}

impl Drop for StreamLifecycle {
    fn drop(&mut self) {
        if self.state().is_running() {
            self.stop();
        }
    }
}

/// Build the callback handed to the driver.
///
/// Holds a weak reference so a leaked native stream cannot keep the
/// lifecycle state alive.
fn pull_callback(shared: &Arc<StreamShared>) -> PullCallback {
    let shared: Weak<StreamShared> = Arc::downgrade(shared);
    Arc::new(move |destination: &mut [u8]| match shared.upgrade() {
        Some(shared) => service_pull(&shared, destination),
        None => {
            destination.fill(0);
            0
        }
    })
}

/// Driver-side pull. Bounded work, never waits for the lock.
fn service_pull(shared: &StreamShared, destination: &mut [u8]) -> usize {
    let counters = &shared.counters;
    RenderCounters::bump(&counters.callback_count, 1);

    // Held lock: stop() or a state change is in flight. Emit silence this cycle.
    let Some(mut inner) = shared.inner.try_lock() else {
        destination.fill(0);
        RenderCounters::bump(&counters.contended_callbacks, 1);
        RenderCounters::bump(&counters.silence_bytes, destination.len() as u64);
        return 0;
    };

    let pulled = if inner.state.services_pull() {
        inner.buffer.as_mut().map(|buffer| {
            let copied = buffer.pull(destination);
            (copied, buffer.is_empty())
        })
    } else {
        None
    };
    drop(inner);

    let (copied, drained) = match pulled {
        Some(result) => result,
        None => {
            destination.fill(0);
            (0, true)
        }
    };

    if copied < destination.len() {
        RenderCounters::bump(&counters.underrun_callbacks, 1);
    }
    RenderCounters::bump(&counters.bytes_rendered, copied as u64);
    RenderCounters::bump(&counters.silence_bytes, (destination.len() - copied) as u64);

    if drained {
        shared.drained.notify_all();
    }
    copied
}
