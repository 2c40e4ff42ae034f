//! [`TelephonyBase`]: the audio-format and conversation-identity layer a
//! WebSocket or SIP telephony streamer composes on top of
//! [`BaseStreamer`] (§4.2).
//!
//! `BaseStreamer` knows nothing about audio formats — it buffers and
//! slices bytes. `TelephonyBase` is where the provider's native format
//! meets the canonical one: inbound audio is resampled to canonical
//! *before* it reaches `BufferAndSendInput` (so the 60ms input threshold
//! always means 60ms of canonical audio, regardless of provider), and
//! outbound audio is resampled to native *before* `BufferAndSendOutput`
//! (so the provider-facing frame size is native-format, ready to wire out
//! unchanged).

use std::sync::Arc;

use callbridge_core::BaseStreamer;
use callbridge_proto::{AudioConfig, InitializationPayload, InputMessage, StreamMode};
use slog::warn;

use crate::credential::ProviderCredential;
use crate::resampler::AudioResampler;

/// Identity, native audio format and resample seam shared by every
/// WebSocket/SIP telephony streamer.
pub struct TelephonyBase {
    base: Arc<BaseStreamer>,
    native_format: AudioConfig,
    resampler: Arc<dyn AudioResampler>,
    credential: ProviderCredential,
    assistant_id: String,
    conversation_id: String,
}

impl TelephonyBase {
    #[must_use]
    pub fn new(
        base: Arc<BaseStreamer>,
        native_format: AudioConfig,
        resampler: Arc<dyn AudioResampler>,
        credential: ProviderCredential,
        assistant_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            base,
            native_format,
            resampler,
            credential,
            assistant_id: assistant_id.into(),
            conversation_id: conversation_id.into(),
        }
    }

    #[must_use]
    pub fn base(&self) -> &Arc<BaseStreamer> {
        &self.base
    }

    #[must_use]
    pub fn native_format(&self) -> AudioConfig {
        self.native_format
    }

    #[must_use]
    pub fn credential(&self) -> &ProviderCredential {
        &self.credential
    }

    #[must_use]
    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Resamples one chunk of native-format inbound audio to canonical
    /// format and wraps it as a ready-to-buffer [`InputMessage::UserAudio`].
    ///
    /// A resample failure is logged and the raw native bytes are forwarded
    /// unchanged — matching `BaseStreamer`'s "absorb input failures"
    /// posture rather than dropping the chunk.
    #[must_use]
    pub fn create_voice_request(&self, native_bytes: &[u8]) -> InputMessage {
        match self
            .resampler
            .resample(native_bytes, self.native_format, AudioConfig::CANONICAL)
        {
            Ok(canonical) => InputMessage::UserAudio(canonical),
            Err(err) => {
                warn!(
                    self.base.logger(),
                    "inbound resample failed, forwarding raw bytes";
                    "error" => %err,
                );
                InputMessage::UserAudio(native_bytes.to_vec())
            }
        }
    }

    /// Resamples canonical assistant audio to this streamer's native
    /// format and hands it to `BufferAndSendOutput` for frame slicing.
    /// Returns the resample error to the caller (per the "an output
    /// conversion failure is returned to the caller" rule) rather than
    /// absorbing it.
    pub fn buffer_and_send_native_output(&self, canonical_bytes: &[u8]) -> Result<(), String> {
        let native = self
            .resampler
            .resample(canonical_bytes, AudioConfig::CANONICAL, self.native_format)
            .map_err(|e| e.to_string())?;
        self.base.buffer_and_send_output(&native);
        Ok(())
    }

    /// Builds the `ConversationInitialization`-style payload announcing
    /// this session, always in audio mode (a telephony leg has no
    /// text-only variant).
    #[must_use]
    pub fn create_connection_request(&self) -> InitializationPayload {
        InitializationPayload {
            conversation_id: self.conversation_id.clone(),
            assistant_id: self.assistant_id.clone(),
            stream_mode: StreamMode::Audio,
        }
    }
}

#[cfg(test)]
mod tests {
    use callbridge_proto::{AudioFormat, StreamerConfig};
    use slog::{o, Drain, Logger};

    use super::*;
    use crate::resampler::DefaultResampler;

    fn test_logger() -> Logger {
        Logger::root(slog::Discard.fuse(), o!())
    }

    fn mulaw_8k() -> AudioConfig {
        AudioConfig {
            sample_rate_hz: 8000,
            format: AudioFormat::Mulaw8,
            channels: 1,
        }
    }

    fn telephony_base() -> TelephonyBase {
        let cfg = StreamerConfig::builder()
            .input_audio_config(AudioConfig::CANONICAL)
            .output_audio_config(mulaw_8k())
            .build()
            .unwrap();
        let base = Arc::new(BaseStreamer::new(test_logger(), cfg));
        TelephonyBase::new(
            base,
            mulaw_8k(),
            Arc::new(DefaultResampler),
            ProviderCredential::new("acct", "secret"),
            "assistant-1",
            "conv-1",
        )
    }

    #[test]
    fn create_voice_request_resamples_to_canonical() {
        let tb = telephony_base();
        match tb.create_voice_request(&[0xFFu8; 160]) {
            InputMessage::UserAudio(bytes) => assert!(!bytes.is_empty()),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn create_connection_request_is_always_audio_mode() {
        let tb = telephony_base();
        let init = tb.create_connection_request();
        assert_eq!(init.assistant_id, "assistant-1");
        assert_eq!(init.conversation_id, "conv-1");
        assert_eq!(init.stream_mode, StreamMode::Audio);
    }

    #[test]
    fn buffer_and_send_native_output_resamples_canonical_to_native() {
        let tb = telephony_base();
        let canonical = vec![0i16; 320]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect::<Vec<u8>>();
        assert!(tb.buffer_and_send_native_output(&canonical).is_ok());
    }
}
