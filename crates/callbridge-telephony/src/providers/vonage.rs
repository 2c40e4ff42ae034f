//! Vonage (Nexmo) Voice API WebSocket framing.
//!
//! Vonage's connector negotiates linear16 PCM and, after the initial
//! `{"event": "websocket:connected", ...}` control frame, streams media as
//! raw binary frames rather than JSON-wrapped text. `WsTransport` here
//! only models text frames, so the JSON envelope below is this bridge's
//! normalized view of a decoded binary frame, produced by the hosting
//! process before it reaches `decode_inbound`.

use base64::Engine;
use serde_json::Value;

use crate::framing::{FramingError, ProviderEvent, ProviderFraming};

#[derive(Clone, Copy, Debug, Default)]
pub struct VonageFraming;

impl ProviderFraming for VonageFraming {
    fn decode_inbound(&self, text: &str) -> Result<ProviderEvent, FramingError> {
        let v: Value =
            serde_json::from_str(text).map_err(|e| FramingError::Malformed(e.to_string()))?;
        match v.get("event").and_then(Value::as_str) {
            Some("websocket:connected") => {
                let channel_uuid = v
                    .get("uuid")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok(ProviderEvent::Start { channel_uuid })
            }
            Some("media") => {
                let payload = v
                    .get("payload")
                    .and_then(Value::as_str)
                    .ok_or_else(|| FramingError::Malformed("missing payload".into()))?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(payload)
                    .map_err(|e| FramingError::Malformed(e.to_string()))?;
                Ok(ProviderEvent::Media(bytes))
            }
            Some("hangup") => Ok(ProviderEvent::Stop),
            _ => Ok(ProviderEvent::Unknown),
        }
    }

    fn encode_outbound(&self, _channel_uuid: &str, native_audio: &[u8]) -> String {
        let payload = base64::engine::general_purpose::STANDARD.encode(native_audio);
        serde_json::json!({ "event": "media", "payload": payload }).to_string()
    }

    fn encode_clear(&self, _channel_uuid: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_connected_uuid_as_start() {
        let text = r#"{"event":"websocket:connected","uuid":"vg-1"}"#;
        assert_eq!(
            VonageFraming.decode_inbound(text).unwrap(),
            ProviderEvent::Start {
                channel_uuid: "vg-1".into()
            }
        );
    }

    #[test]
    fn decodes_hangup_as_stop() {
        let text = r#"{"event":"hangup"}"#;
        assert_eq!(VonageFraming.decode_inbound(text).unwrap(), ProviderEvent::Stop);
    }
}
