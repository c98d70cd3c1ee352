use thiserror::Error;

/// Errors reported by the render core.
///
/// Backpressure is not an error: a full buffer is reported through
/// [`WriteOutcome`](crate::processing::stream_buffer::WriteOutcome). Nothing in this
/// enum ever crosses the driver callback boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("no output device selected")]
    NoDeviceSelected,

    #[error("stream format not set")]
    FormatUnset,

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("chunk of {len} bytes can never fit under the {ceiling}-byte ceiling")]
    ChunkTooLarge { len: usize, ceiling: usize },

    #[error("buffer stayed full for every retry")]
    BackpressureTimeout,

    #[error("driver failed: {0}")]
    DriverFailed(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}

impl RenderError {
    /// Configuration errors stay until the caller supplies a valid device or format.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NoDeviceSelected
                | Self::FormatUnset
                | Self::UnsupportedFormat(_)
                | Self::ConfigurationFailed(_)
        )
    }
}
