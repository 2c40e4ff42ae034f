//! Exotel Voice Streaming framing: JSON text frames shaped like Twilio's
//! but with snake_case keys and a top-level `stream_sid`.

use base64::Engine;
use serde_json::Value;

use crate::framing::{FramingError, ProviderEvent, ProviderFraming};

#[derive(Clone, Copy, Debug, Default)]
pub struct ExotelFraming;

impl ProviderFraming for ExotelFraming {
    fn decode_inbound(&self, text: &str) -> Result<ProviderEvent, FramingError> {
        let v: Value =
            serde_json::from_str(text).map_err(|e| FramingError::Malformed(e.to_string()))?;
        match v.get("event").and_then(Value::as_str) {
            Some("connected") => Ok(ProviderEvent::Unknown),
            Some("start") => {
                let channel_uuid = v
                    .get("stream_sid")
                    .and_then(Value::as_str)
                    .ok_or_else(|| FramingError::Malformed("missing stream_sid".into()))?
                    .to_string();
                Ok(ProviderEvent::Start { channel_uuid })
            }
            Some("media") => {
                let payload = v
                    .get("media")
                    .and_then(|m| m.get("payload"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| FramingError::Malformed("missing media.payload".into()))?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(payload)
                    .map_err(|e| FramingError::Malformed(e.to_string()))?;
                Ok(ProviderEvent::Media(bytes))
            }
            Some("stop") => Ok(ProviderEvent::Stop),
            _ => Ok(ProviderEvent::Unknown),
        }
    }

    fn encode_outbound(&self, channel_uuid: &str, native_audio: &[u8]) -> String {
        let payload = base64::engine::general_purpose::STANDARD.encode(native_audio);
        serde_json::json!({
            "event": "media",
            "stream_sid": channel_uuid,
            "media": { "payload": payload },
        })
        .to_string()
    }

    fn encode_clear(&self, _channel_uuid: &str) -> Option<String> {
        // Exotel's streaming API has no documented mid-call buffer-clear
        // signal; barge-in is handled purely on the bridge side.
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_start_from_stream_sid() {
        let text = r#"{"event":"start","stream_sid":"ex-42"}"#;
        assert_eq!(
            ExotelFraming.decode_inbound(text).unwrap(),
            ProviderEvent::Start {
                channel_uuid: "ex-42".into()
            }
        );
    }

    #[test]
    fn has_no_clear_frame() {
        assert_eq!(ExotelFraming.encode_clear("ex-42"), None);
    }
}
