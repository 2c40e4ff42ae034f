//! Audio format descriptors and the byte-rate arithmetic derived from them.

use serde::{Deserialize, Serialize};

/// Sample encoding of a PCM-ish audio stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// G.711 µ-law, 1 byte per sample.
    Mulaw8,
    /// Signed 16-bit linear PCM, 2 bytes per sample.
    Linear16,
}

impl AudioFormat {
    /// Bytes occupied by a single sample in this format.
    #[must_use]
    pub fn bytes_per_sample(self) -> u32 {
        match self {
            Self::Mulaw8 => 1,
            Self::Linear16 => 2,
        }
    }
}

/// Describes a native (transport-side) or canonical (internal) PCM stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate, in Hz.
    pub sample_rate_hz: u32,
    /// Sample encoding.
    pub format: AudioFormat,
    /// Channel count (1 = mono).
    pub channels: u8,
}

impl AudioConfig {
    /// The canonical internal format: linear16, 16 kHz, mono.
    pub const CANONICAL: Self = Self {
        sample_rate_hz: 16_000,
        format: AudioFormat::Linear16,
        channels: 1,
    };

    /// Bytes of audio corresponding to one millisecond of this stream.
    #[must_use]
    pub fn bytes_per_ms(&self) -> u32 {
        bytes_per_ms(Some(self))
    }
}

/// `BytesPerMs(cfg) = sampleRate * bytesPerSample(format) * channels / 1000`.
///
/// A `None` config yields `0`, matching the nil-config convention used when
/// deriving thresholds from an absent [`AudioConfig`].
#[must_use]
pub fn bytes_per_ms(cfg: Option<&AudioConfig>) -> u32 {
    match cfg {
        None => 0,
        Some(cfg) => {
            cfg.sample_rate_hz * cfg.format.bytes_per_sample() * u32::from(cfg.channels) / 1000
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mulaw_8k_mono_is_8_bytes_per_ms() {
        let cfg = AudioConfig {
            sample_rate_hz: 8000,
            format: AudioFormat::Mulaw8,
            channels: 1,
        };
        assert_eq!(cfg.bytes_per_ms(), 8);
    }

    #[test]
    fn linear16_16k_mono_is_32_bytes_per_ms() {
        assert_eq!(AudioConfig::CANONICAL.bytes_per_ms(), 32);
    }

    #[test]
    fn absent_config_is_zero() {
        assert_eq!(bytes_per_ms(None), 0);
    }
}
