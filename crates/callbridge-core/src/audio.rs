//! Codec conversion (µ-law ↔ linear16) and sample-rate resampling shared
//! by every streamer that talks a provider-native format (§4.2, §4.3).

use callbridge_proto::{AudioConfig, AudioFormat};
use derive_more::Display;
use rubato::{FftFixedInOut, Resampler};

/// Failures from [`convert`]. Per the error handling design, an input
/// conversion failure is logged and the raw bytes are forwarded
/// unchanged; an output conversion failure is returned to the caller.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum ResampleError {
    /// Only mono audio is supported by this converter.
    #[display(fmt = "unsupported channel count: {} (only mono is supported)", _0)]
    UnsupportedChannels(u8),
    /// The underlying resampler failed to construct or process.
    #[display(fmt = "resampler error: {}", _0)]
    Backend(String),
}

impl std::error::Error for ResampleError {}

const ULAW_BIAS: i32 = 0x84;
const ULAW_CLIP: i32 = 8159;
const SEG_END: [i32; 8] = [0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF, 0x1FFF, 0x3FFF, 0x7FFF];

fn seg_search(val: i32) -> i32 {
    for (i, bound) in SEG_END.iter().enumerate() {
        if val <= *bound {
            return i as i32;
        }
    }
    8
}

/// Encodes one linear PCM sample to G.711 µ-law.
#[must_use]
pub fn mulaw_encode(pcm: i16) -> u8 {
    let mut pcm_val = i32::from(pcm) >> 2;
    let mask = if pcm_val < 0 {
        pcm_val = -pcm_val;
        0x7F
    } else {
        0xFF
    };
    if pcm_val > ULAW_CLIP {
        pcm_val = ULAW_CLIP;
    }
    pcm_val += ULAW_BIAS >> 2;

    let seg = seg_search(pcm_val);
    let uval = if seg >= 8 {
        0x7F ^ mask
    } else {
        ((seg << 4) | ((pcm_val >> (seg + 1)) & 0xF)) ^ mask
    };
    uval as u8
}

/// Decodes one G.711 µ-law byte to a linear PCM sample.
#[must_use]
pub fn mulaw_decode(byte: u8) -> i16 {
    let u_val = !byte as i32;
    let mut t = ((u_val & 0x0F) << 3) + ULAW_BIAS;
    t <<= (u_val & 0x70) >> 4;
    let sample = if u_val & 0x80 != 0 {
        ULAW_BIAS - t
    } else {
        t - ULAW_BIAS
    };
    sample as i16
}

fn linear16_le_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

fn samples_to_linear16_le(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Decodes a byte buffer in `format` to linear PCM samples.
#[must_use]
pub fn decode_to_samples(bytes: &[u8], format: AudioFormat) -> Vec<i16> {
    match format {
        AudioFormat::Mulaw8 => bytes.iter().map(|b| mulaw_decode(*b)).collect(),
        AudioFormat::Linear16 => linear16_le_to_samples(bytes),
    }
}

/// Encodes linear PCM samples to a byte buffer in `format`.
#[must_use]
pub fn encode_from_samples(samples: &[i16], format: AudioFormat) -> Vec<u8> {
    match format {
        AudioFormat::Mulaw8 => samples.iter().map(|s| mulaw_encode(*s)).collect(),
        AudioFormat::Linear16 => samples_to_linear16_le(samples),
    }
}

fn samples_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| f32::from(s) / 32768.0).collect()
}

fn f32_to_samples(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

/// Resamples mono `f32` PCM from `from_rate_hz` to `to_rate_hz` via
/// rubato's FFT-based fixed in/out resampler. Identity when the rates
/// already match.
pub fn resample_f32(
    samples: &[f32],
    from_rate_hz: u32,
    to_rate_hz: u32,
) -> Result<Vec<f32>, ResampleError> {
    if from_rate_hz == to_rate_hz || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = FftFixedInOut::<f32>::new(
        from_rate_hz as usize,
        to_rate_hz as usize,
        samples.len().min(1024),
        1,
    )
    .map_err(|e| ResampleError::Backend(e.to_string()))?;

    let input = vec![samples.to_vec()];
    let output = resampler
        .process(&input, None)
        .map_err(|e| ResampleError::Backend(e.to_string()))?;
    Ok(output.into_iter().next().unwrap_or_default())
}

/// Converts a raw audio byte buffer from one [`AudioConfig`] to another:
/// decode → resample (if rates differ) → re-encode. Both configs must be
/// mono.
pub fn convert(bytes: &[u8], from: AudioConfig, to: AudioConfig) -> Result<Vec<u8>, ResampleError> {
    if from.channels != 1 {
        return Err(ResampleError::UnsupportedChannels(from.channels));
    }
    if to.channels != 1 {
        return Err(ResampleError::UnsupportedChannels(to.channels));
    }

    let samples = decode_to_samples(bytes, from.format);
    if from.sample_rate_hz == to.sample_rate_hz {
        return Ok(encode_from_samples(&samples, to.format));
    }

    let floats = samples_to_f32(&samples);
    let resampled = resample_f32(&floats, from.sample_rate_hz, to.sample_rate_hz)?;
    let out_samples = f32_to_samples(&resampled);
    Ok(encode_from_samples(&out_samples, to.format))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mulaw_round_trip_is_close() {
        for pcm in [-30000i16, -1000, 0, 1000, 30000] {
            let encoded = mulaw_encode(pcm);
            let decoded = mulaw_decode(encoded);
            assert!(
                (i32::from(decoded) - i32::from(pcm)).abs() < 600,
                "pcm={pcm} decoded={decoded}"
            );
        }
    }

    #[test]
    fn mulaw_silence_round_trips_exactly() {
        assert_eq!(mulaw_decode(mulaw_encode(0)), 0);
    }

    #[test]
    fn identity_conversion_is_lossless_for_linear16() {
        let cfg = AudioConfig {
            sample_rate_hz: 16_000,
            format: AudioFormat::Linear16,
            channels: 1,
        };
        let samples: Vec<i16> = vec![100, -100, 32767, -32768, 0];
        let bytes = encode_from_samples(&samples, AudioFormat::Linear16);
        let out = convert(&bytes, cfg, cfg).unwrap();
        assert_eq!(decode_to_samples(&out, AudioFormat::Linear16), samples);
    }

    #[test]
    fn rejects_stereo() {
        let cfg = AudioConfig {
            sample_rate_hz: 16_000,
            format: AudioFormat::Linear16,
            channels: 2,
        };
        let err = convert(&[0, 0], cfg, AudioConfig::CANONICAL).unwrap_err();
        assert_eq!(err, ResampleError::UnsupportedChannels(2));
    }
}
