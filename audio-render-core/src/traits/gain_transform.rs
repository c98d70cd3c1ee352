use crate::models::format::StreamFormat;

/// Volume hook applied to PCM bytes right before they enter the buffer.
///
/// Only runs on chunks the buffer accepts, so a retried chunk is never
/// scaled twice.
pub trait GainTransform: Send + Sync {
    fn apply(&self, pcm: &mut [u8], format: &StreamFormat);
}
