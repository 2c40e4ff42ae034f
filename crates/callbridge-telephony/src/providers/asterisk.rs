//! Asterisk (ARI external media / WebSocket bridge) framing: a minimal
//! `{"type": "...", ...}` envelope, base64 payload under `audio`.

use base64::Engine;
use serde_json::Value;

use crate::framing::{FramingError, ProviderEvent, ProviderFraming};

#[derive(Clone, Copy, Debug, Default)]
pub struct AsteriskFraming;

impl ProviderFraming for AsteriskFraming {
    fn decode_inbound(&self, text: &str) -> Result<ProviderEvent, FramingError> {
        let v: Value =
            serde_json::from_str(text).map_err(|e| FramingError::Malformed(e.to_string()))?;
        match v.get("type").and_then(Value::as_str) {
            Some("start") => {
                let channel_uuid = v
                    .get("channel_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| FramingError::Malformed("missing channel_id".into()))?
                    .to_string();
                Ok(ProviderEvent::Start { channel_uuid })
            }
            Some("media") => {
                let payload = v
                    .get("audio")
                    .and_then(Value::as_str)
                    .ok_or_else(|| FramingError::Malformed("missing audio".into()))?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(payload)
                    .map_err(|e| FramingError::Malformed(e.to_string()))?;
                Ok(ProviderEvent::Media(bytes))
            }
            Some("dtmf") => {
                let digit = v
                    .get("digit")
                    .and_then(Value::as_str)
                    .and_then(|s| s.chars().next())
                    .ok_or_else(|| FramingError::Malformed("missing digit".into()))?;
                Ok(ProviderEvent::Dtmf(digit))
            }
            Some("stop") => Ok(ProviderEvent::Stop),
            _ => Ok(ProviderEvent::Unknown),
        }
    }

    fn encode_outbound(&self, channel_uuid: &str, native_audio: &[u8]) -> String {
        let payload = base64::engine::general_purpose::STANDARD.encode(native_audio);
        serde_json::json!({
            "type": "media",
            "channel_id": channel_uuid,
            "audio": payload,
        })
        .to_string()
    }

    fn encode_clear(&self, channel_uuid: &str) -> Option<String> {
        Some(serde_json::json!({ "type": "clear", "channel_id": channel_uuid }).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_dtmf_digit() {
        let text = r#"{"type":"dtmf","digit":"7"}"#;
        assert_eq!(
            AsteriskFraming.decode_inbound(text).unwrap(),
            ProviderEvent::Dtmf('7')
        );
    }

    #[test]
    fn encode_clear_carries_channel_id() {
        let out = AsteriskFraming.encode_clear("ch-1").unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["type"], "clear");
        assert_eq!(v["channel_id"], "ch-1");
    }
}
