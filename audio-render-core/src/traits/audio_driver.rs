use std::sync::Arc;

use crate::models::error::RenderError;
use crate::models::format::StreamFormat;
use crate::models::render_models::DeviceId;

/// Pull callback handed to the driver.
///
/// Parameters:
/// - `destination`: Bytes the hardware needs this cycle. Always fully written
///   (buffered audio first, silence for the rest).
///
/// Returns the number of audio bytes copied; the remainder is silence.
/// Never blocks and never panics into the driver.
pub type PullCallback = Arc<dyn Fn(&mut [u8]) -> usize + Send + Sync + 'static>;

/// Native audio output driver.
///
/// Implemented by:
/// - `CpalDriver` (macOS, Windows)
/// - test drivers that invoke the callback from the test thread
pub trait AudioDriver: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Open and start an output stream on `device`.
    ///
    /// The callback fires on a driver-owned real-time thread until the
    /// returned stream is stopped.
    fn start_stream(
        &self,
        device: &DeviceId,
        format: &StreamFormat,
        callback: PullCallback,
    ) -> Result<Box<dyn NativeStream>, RenderError>;
}

/// Handle to a running native stream.
pub trait NativeStream: Send {
    /// Stop the stream and release it.
    ///
    /// May block until an in-flight callback returns. Called without the
    /// stream lock held.
    fn stop(&mut self) -> Result<(), RenderError>;
}
