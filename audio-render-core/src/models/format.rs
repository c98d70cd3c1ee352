use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sample rates the renderer accepts as input, in Hz.
///
/// Process-wide and read-only.
pub const SUPPORTED_SAMPLE_RATES: [u32; 7] = [8000, 11025, 16000, 22050, 32000, 44100, 48000];

/// Highest channel count the renderer negotiates, whatever the device offers.
pub const MAX_RENDER_CHANNELS: u16 = 2;

/// Bit depth used by the negotiated format table.
pub const DEFAULT_BITS_PER_SAMPLE: u16 = 16;

/// Byte order of multi-byte PCM samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    Little,
    Big,
}

/// Negotiated PCM format of an output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Bits per sample. Valid values: 8, 16, 24, 32.
    pub bits_per_sample: u16,
    pub endianness: Endianness,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: u16, bits_per_sample: u16, endianness: Endianness) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
            endianness,
        }
    }

    /// Signed 16-bit little-endian PCM, the format the table negotiates.
    pub fn pcm16_le(sample_rate: u32, channels: u16) -> Self {
        Self::new(sample_rate, channels, DEFAULT_BITS_PER_SAMPLE, Endianness::Little)
    }

    /// Whether every field carries a real value.
    pub fn is_specified(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0 && self.bits_per_sample > 0
    }

    pub fn validate(&self) -> Result<(), String> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(format!("unsupported sample rate: {}", self.sample_rate));
        }
        if !(1..=MAX_RENDER_CHANNELS).contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if ![8, 16, 24, 32].contains(&self.bits_per_sample) {
            return Err(format!("unsupported bit depth: {}", self.bits_per_sample));
        }
        Ok(())
    }

    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample as usize).div_ceil(8)
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    pub fn bytes_per_second(&self) -> usize {
        self.bytes_per_frame() * self.sample_rate as usize
    }

    /// Bytes of audio covering `duration`, rounded down to whole frames.
    ///
    /// Never less than one frame.
    pub fn bytes_for(&self, duration: Duration) -> usize {
        let frame = self.bytes_per_frame().max(1);
        let frames = (self.sample_rate as u128 * duration.as_millis() / 1000) as usize;
        frames.max(1) * frame
    }

    /// Duration represented by `bytes` of audio in this format.
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let per_second = self.bytes_per_second();
        if per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(bytes as f64 / per_second as f64)
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let endian = match self.endianness {
            Endianness::Little => "le",
            Endianness::Big => "be",
        };
        write!(
            f,
            "{}Hz/{}bit/{}ch/{}",
            self.sample_rate, self.bits_per_sample, self.channels, endian
        )
    }
}

/// Output capabilities reported by the device-selection collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatConstraints {
    pub min_rate: u32,
    pub max_rate: u32,
    pub max_channels: u16,
}

impl FormatConstraints {
    pub fn supports(&self, format: &StreamFormat) -> bool {
        format.sample_rate >= self.min_rate
            && format.sample_rate <= self.max_rate
            && format.channels <= self.max_channels
    }
}

/// Formats the renderer can accept on a device with `constraints`.
///
/// Without constraints (no device resolved yet) the whole table is offered
/// with an unspecified channel count resolved to mono and stereo.
pub fn supported_formats(constraints: Option<&FormatConstraints>) -> Vec<StreamFormat> {
    let max_channels = constraints
        .map(|c| c.max_channels.min(MAX_RENDER_CHANNELS))
        .unwrap_or(MAX_RENDER_CHANNELS);

    SUPPORTED_SAMPLE_RATES
        .iter()
        .filter(|&&rate| constraints.is_none_or(|c| rate >= c.min_rate && rate <= c.max_rate))
        .flat_map(|&rate| (1..=max_channels).map(move |channels| StreamFormat::pcm16_le(rate, channels)))
        .collect()
}
