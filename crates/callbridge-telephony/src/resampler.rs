//! The resample seam a [`TelephonyBase`](crate::TelephonyBase) calls
//! through on the way from a provider's native audio format to the
//! canonical internal one (§4.2). A trait rather than a bare function so
//! tests can substitute an identity/failing stub without touching rubato.

use callbridge_core::{audio, ResampleError};
use callbridge_proto::AudioConfig;

/// Converts a chunk of raw audio bytes from one [`AudioConfig`] to another.
pub trait AudioResampler: Send + Sync {
    fn resample(&self, bytes: &[u8], from: AudioConfig, to: AudioConfig) -> Result<Vec<u8>, ResampleError>;
}

/// The production resampler: G.711/linear16 codec conversion plus
/// rubato-based rate conversion, via [`callbridge_core::audio::convert`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultResampler;

impl AudioResampler for DefaultResampler {
    fn resample(&self, bytes: &[u8], from: AudioConfig, to: AudioConfig) -> Result<Vec<u8>, ResampleError> {
        audio::convert(bytes, from, to)
    }
}

#[cfg(test)]
mod tests {
    use callbridge_proto::AudioFormat;

    use super::*;

    #[test]
    fn mulaw_8k_resamples_to_canonical_linear16_16k() {
        let from = AudioConfig {
            sample_rate_hz: 8000,
            format: AudioFormat::Mulaw8,
            channels: 1,
        };
        let out = DefaultResampler
            .resample(&[0xFFu8; 160], from, AudioConfig::CANONICAL)
            .expect("mono conversion should succeed");
        assert!(!out.is_empty());
    }
}
