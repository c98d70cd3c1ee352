//! # audio-render-core
//!
//! Platform-agnostic audio render core library.
//!
//! Provides the byte buffer between a PCM producer and a pull-model output
//! driver, the stream lifecycle that owns it, and hot-swap handling for
//! device enumeration changes. Platform backends implement the `AudioDriver`
//! and `DeviceResolver` traits and plug into the generic `StreamLifecycle`.
//!
//! ## Architecture
//!
//! ```text
//! audio-render-core (this crate)
//! ├── traits/       ← AudioDriver, NativeStream, DeviceResolver, RenderDelegate, GainTransform
//! ├── models/       ← RenderError, StreamState, StreamFormat, RenderConfiguration, diagnostics
//! ├── processing/   ← StreamBuffer, LinearGain
//! └── session/      ← StreamLifecycle, HotSwapCoordinator, EnumerationNotifier
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use models::config::RenderConfiguration;
pub use models::error::RenderError;
pub use models::format::{Endianness, FormatConstraints, StreamFormat};
pub use models::render_models::{DeviceId, RenderDiagnostics, StreamSession};
pub use models::state::StreamState;
pub use processing::gain::LinearGain;
pub use processing::stream_buffer::{RetryReason, StreamBuffer, WriteOutcome};
pub use session::hot_swap::{EnumerationNotifier, HotSwapCoordinator, PendingEnumeration};
pub use session::lifecycle::{HotSwapOutcome, StopOutcome, StreamLifecycle};
pub use traits::audio_driver::{AudioDriver, NativeStream, PullCallback};
pub use traits::device_resolver::DeviceResolver;
pub use traits::enumeration_observer::{EnumerationObserver, HotSwapSnapshot};
pub use traits::gain_transform::GainTransform;
pub use traits::render_delegate::RenderDelegate;
