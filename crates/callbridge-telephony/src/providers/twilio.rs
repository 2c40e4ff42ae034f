//! Twilio Media Streams framing: `{"event": "...", ...}` JSON text frames,
//! mulaw/8kHz payloads base64-encoded under `media.payload`.

use base64::Engine;
use serde_json::Value;

use crate::framing::{FramingError, ProviderEvent, ProviderFraming};

#[derive(Clone, Copy, Debug, Default)]
pub struct TwilioFraming;

impl ProviderFraming for TwilioFraming {
    fn decode_inbound(&self, text: &str) -> Result<ProviderEvent, FramingError> {
        let v: Value =
            serde_json::from_str(text).map_err(|e| FramingError::Malformed(e.to_string()))?;
        match v.get("event").and_then(Value::as_str) {
            Some("start") => {
                let channel_uuid = v
                    .get("start")
                    .and_then(|s| s.get("callSid"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| FramingError::Malformed("missing start.callSid".into()))?
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
            Some("dtmf") => {
                let digit = v
                    .get("dtmf")
                    .and_then(|d| d.get("digit"))
                    .and_then(Value::as_str)
                    .and_then(|s| s.chars().next())
                    .ok_or_else(|| FramingError::Malformed("missing dtmf.digit".into()))?;
                Ok(ProviderEvent::Dtmf(digit))
            }
            Some("stop") => Ok(ProviderEvent::Stop),
            _ => Ok(ProviderEvent::Unknown),
        }
    }

    fn encode_outbound(&self, channel_uuid: &str, native_audio: &[u8]) -> String {
        let payload = base64::engine::general_purpose::STANDARD.encode(native_audio);
        serde_json::json!({
            "event": "media",
            "streamSid": channel_uuid,
            "media": { "payload": payload },
        })
        .to_string()
    }

    fn encode_clear(&self, channel_uuid: &str) -> Option<String> {
        Some(
            serde_json::json!({
                "event": "clear",
                "streamSid": channel_uuid,
            })
            .to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_media_payload() {
        let payload = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]);
        let text = format!(r#"{{"event":"media","media":{{"payload":"{payload}"}}}}"#);
        assert_eq!(
            TwilioFraming.decode_inbound(&text).unwrap(),
            ProviderEvent::Media(vec![1, 2, 3])
        );
    }

    #[test]
    fn decodes_start_call_sid() {
        let text = r#"{"event":"start","start":{"callSid":"CA123"}}"#;
        assert_eq!(
            TwilioFraming.decode_inbound(text).unwrap(),
            ProviderEvent::Start {
                channel_uuid: "CA123".into()
            }
        );
    }

    #[test]
    fn encode_outbound_wraps_streamsid_and_payload() {
        let out = TwilioFraming.encode_outbound("CA123", &[9, 9]);
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["event"], "media");
        assert_eq!(v["streamSid"], "CA123");
    }
}
