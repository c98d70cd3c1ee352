use std::sync::atomic::{AtomicU32, Ordering};

use crate::models::format::{Endianness, StreamFormat};
use crate::traits::gain_transform::GainTransform;

/// Linear volume scaling for signed 16-bit PCM.
///
/// The level can change while the stream runs. Samples are clamped to the
/// 16-bit range; other bit depths pass through untouched.
#[derive(Debug)]
pub struct LinearGain {
    level_bits: AtomicU32,
}

impl LinearGain {
    pub fn new(level: f32) -> Self {
        Self {
            level_bits: AtomicU32::new(Self::sanitize(level).to_bits()),
        }
    }

    pub fn level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }

    /// Set the gain factor (0.0 = mute, 1.0 = unity). Negative or NaN values mute.
    pub fn set_level(&self, level: f32) {
        self.level_bits
            .store(Self::sanitize(level).to_bits(), Ordering::Relaxed);
    }

    fn sanitize(level: f32) -> f32 {
        if level.is_nan() {
            0.0
        } else {
            level.max(0.0)
        }
    }
}

impl Default for LinearGain {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl GainTransform for LinearGain {
    fn apply(&self, pcm: &mut [u8], format: &StreamFormat) {
        if format.bits_per_sample != 16 {
            return;
        }
        let level = self.level();
        if (level - 1.0).abs() < f32::EPSILON {
            return;
        }

        for sample in pcm.chunks_exact_mut(2) {
            let bytes = [sample[0], sample[1]];
            let value = match format.endianness {
                Endianness::Little => i16::from_le_bytes(bytes),
                Endianness::Big => i16::from_be_bytes(bytes),
            };
            let scaled = (value as f32 * level).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            let out = match format.endianness {
                Endianness::Little => scaled.to_le_bytes(),
                Endianness::Big => scaled.to_be_bytes(),
            };
            sample.copy_from_slice(&out);
        }
    }
}
