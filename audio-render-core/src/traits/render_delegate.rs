use crate::models::error::RenderError;
use crate::models::state::StreamState;

/// Event delegate for output stream notifications.
///
/// Called from whichever application thread drives the lifecycle, never from
/// the driver callback, and never with the stream lock held.
pub trait RenderDelegate: Send + Sync {
    /// Called after every state transition.
    fn on_state_changed(&self, state: StreamState);

    /// Called for non-fatal failures: native stop errors, restart failures.
    fn on_error(&self, error: &RenderError);

    /// Called when `stop()` gave up waiting for the driver to drain.
    fn on_drain_timeout(&self, discarded_bytes: usize) {
        let _ = discarded_bytes;
    }
}
