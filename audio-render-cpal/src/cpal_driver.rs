use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use audio_render_core::{
    AudioDriver, DeviceId, Endianness, NativeStream, PullCallback, RenderError, StreamFormat,
};
use cpal::traits::{DeviceTrait, StreamTrait};

use crate::device_resolver::find_output_device;

/// Audio the callback scratch buffer covers.
const SCRATCH_DURATION: Duration = Duration::from_millis(100);

/// Output driver backed by cpal's default host.
///
/// `cpal::Stream` is not `Send`, so each stream is built, played and dropped
/// on its own thread; the returned handle only carries a stop channel.
/// Only 16-bit PCM is rendered.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalDriver;

impl CpalDriver {
    pub fn new() -> Self {
        Self
    }
}

impl AudioDriver for CpalDriver {
    fn name(&self) -> &str {
        "cpal"
    }

    fn start_stream(
        &self,
        device: &DeviceId,
        format: &StreamFormat,
        callback: PullCallback,
    ) -> Result<Box<dyn NativeStream>, RenderError> {
        if format.bits_per_sample != 16 {
            return Err(RenderError::UnsupportedFormat(format!(
                "cpal backend renders 16-bit PCM only, got {}",
                format
            )));
        }

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), RenderError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let device_name = device.as_str().to_string();
        let format = *format;

        let handle = thread::Builder::new()
            .name("cpal-render".into())
            .spawn(move || {
                let stream = match build_stream(&device_name, &format, callback) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Wait for stop() or for the handle to be dropped.
                let _ = stop_rx.recv();
                if let Err(e) = stream.pause() {
                    log::warn!("failed to pause output stream on {}: {}", device_name, e);
                }
                drop(stream);
                log::debug!("output stream on {} released", device_name);
            })
            .map_err(|e| RenderError::DriverFailed(format!("failed to spawn render thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalStream {
                stop_tx: Some(stop_tx),
                handle: Some(handle),
            })),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(RenderError::DriverFailed(
                    "render thread exited before the stream started".into(),
                ))
            }
        }
    }
}

/// Handle to a stream living on the render thread.
struct CpalStream {
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl NativeStream for CpalStream {
    /// Blocks until cpal has stopped calling the data callback.
    fn stop(&mut self) -> Result<(), RenderError> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| RenderError::DriverFailed("render thread panicked".into()))?;
        }
        Ok(())
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("{}", e);
        }
    }
}

fn build_stream(
    device_name: &str,
    format: &StreamFormat,
    callback: PullCallback,
) -> Result<cpal::Stream, RenderError> {
    let host = cpal::default_host();
    let device = find_output_device(&host, device_name).ok_or(RenderError::NoDeviceSelected)?;

    let config = cpal::StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let endianness = format.endianness;
    // Whole frames, sized once here; the data callback never allocates.
    let mut scratch = vec![0u8; format.bytes_for(SCRATCH_DURATION)];

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                render_into(&callback, &mut scratch, data, endianness);
            },
            |err| log::error!("output stream error: {}", err),
            None,
        )
        .map_err(|e| RenderError::DriverFailed(format!("failed to build stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| RenderError::DriverFailed(format!("failed to play stream: {}", e)))?;
    log::debug!("playing {} on {}", format, device_name);
    Ok(stream)
}

/// Fill `out` from the pull callback through a fixed scratch buffer.
///
/// `scratch` holds whole frames, so requests larger than it are served in
/// frame-aligned pieces.
fn render_into(callback: &PullCallback, scratch: &mut [u8], out: &mut [i16], endianness: Endianness) {
    let samples_per_piece = (scratch.len() / 2).max(1);
    for piece in out.chunks_mut(samples_per_piece) {
        let needed = piece.len() * 2;
        callback(&mut scratch[..needed]);
        decode_samples(&scratch[..needed], piece, endianness);
    }
}

/// Convert interleaved PCM bytes into the samples cpal hands to the device.
fn decode_samples(bytes: &[u8], out: &mut [i16], endianness: Endianness) {
    for (sample, pair) in out.iter_mut().zip(bytes.chunks_exact(2)) {
        let raw = [pair[0], pair[1]];
        *sample = match endianness {
            Endianness::Little => i16::from_le_bytes(raw),
            Endianness::Big => i16::from_be_bytes(raw),
        };
    }
}
