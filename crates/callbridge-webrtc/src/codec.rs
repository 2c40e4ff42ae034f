//! Opus encode/decode wrapper around the `opus` crate, fixed to this
//! bridge's negotiated parameters: 48 kHz, 2 encoding channels, 20 ms
//! frames (960 samples × 2 channels = 1920 bytes of PCM per frame, §4.3).

use derive_more::Display;
use opus::{Application, Channels};

/// Clock rate Opus is negotiated at, regardless of the caller's actual
/// voice being mono.
pub const OPUS_SAMPLE_RATE_HZ: u32 = 48_000;
/// Opus RTP always signals 2 channels here even for mono voice.
pub const OPUS_CHANNELS: u16 = 2;
/// One 20 ms frame at the negotiated rate/channels, in PCM bytes.
pub const OPUS_FRAME_BYTES: usize = 1920;
/// Samples per channel per 20 ms frame (960 × 2 byte samples = 1920 bytes).
pub const OPUS_FRAME_SAMPLES: usize = 960;
/// Negotiated dynamic RTP payload type.
pub const OPUS_PAYLOAD_TYPE: u8 = 111;

#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum CodecError {
    #[display(fmt = "opus error: {}", _0)]
    Opus(String),
}

impl std::error::Error for CodecError {}

impl From<opus::Error> for CodecError {
    fn from(e: opus::Error) -> Self {
        Self::Opus(e.to_string())
    }
}

/// Encodes 16-bit PCM frames to Opus. Not `Sync` (the underlying encoder
/// is stateful); callers hold it behind their own synchronization (a
/// single output-writer task, in this bridge).
pub struct OpusFrameEncoder {
    inner: opus::Encoder,
}

impl OpusFrameEncoder {
    pub fn new() -> Result<Self, CodecError> {
        let inner = opus::Encoder::new(OPUS_SAMPLE_RATE_HZ, Channels::Stereo, Application::Voip)?;
        Ok(Self { inner })
    }

    /// Encodes one 20 ms stereo-interleaved PCM frame (`OPUS_FRAME_BYTES`
    /// bytes, little-endian i16 samples) to an Opus packet.
    pub fn encode(&mut self, pcm: &[i16]) -> Result<Vec<u8>, CodecError> {
        let mut out = vec![0u8; 4000];
        let n = self.inner.encode(pcm, &mut out)?;
        out.truncate(n);
        Ok(out)
    }
}

/// Decodes Opus packets to 16-bit PCM frames.
pub struct OpusFrameDecoder {
    inner: opus::Decoder,
}

impl OpusFrameDecoder {
    pub fn new() -> Result<Self, CodecError> {
        let inner = opus::Decoder::new(OPUS_SAMPLE_RATE_HZ, Channels::Stereo)?;
        Ok(Self { inner })
    }

    /// Decodes one Opus packet to stereo-interleaved PCM samples.
    pub fn decode(&mut self, packet: &[u8]) -> Result<Vec<i16>, CodecError> {
        let mut out = vec![0i16; OPUS_FRAME_SAMPLES * 2];
        let n = self.inner.decode(packet, &mut out, false)?;
        out.truncate(n * 2);
        Ok(out)
    }
}

/// Downmixes interleaved stereo PCM to mono by averaging channel pairs.
#[must_use]
pub fn stereo_to_mono(stereo: &[i16]) -> Vec<i16> {
    stereo
        .chunks_exact(2)
        .map(|c| (((i32::from(c[0])) + i32::from(c[1])) / 2) as i16)
        .collect()
}

/// Upmixes mono PCM to interleaved stereo by duplicating each sample.
#[must_use]
pub fn mono_to_stereo(mono: &[i16]) -> Vec<i16> {
    let mut out = Vec::with_capacity(mono.len() * 2);
    for s in mono {
        out.push(*s);
        out.push(*s);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_mono_round_trip_is_identity_for_equal_channels() {
        let mono = vec![100i16, -200, 300];
        let stereo = mono_to_stereo(&mono);
        assert_eq!(stereo_to_mono(&stereo), mono);
    }

    #[test]
    fn encode_decode_round_trip_preserves_frame_length() {
        let mut enc = OpusFrameEncoder::new().unwrap();
        let mut dec = OpusFrameDecoder::new().unwrap();
        let pcm = vec![0i16; OPUS_FRAME_SAMPLES * 2];
        let packet = enc.encode(&pcm).unwrap();
        let decoded = dec.decode(&packet).unwrap();
        assert_eq!(decoded.len(), OPUS_FRAME_SAMPLES * 2);
    }
}
