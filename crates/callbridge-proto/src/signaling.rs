//! The WebRTC signaling envelope exchanged over the bidirectional
//! signaling stream (§6 "WebRTC signaling envelope").

use serde::{Deserialize, Serialize};

use crate::message::{
    ConfigurationPayload, DisconnectionPayload, InitializationPayload,
    MetadataPayload, MetricPayload, UserContent,
};

/// Whether an [`SignalingPayload::Sdp`] carries an offer or an answer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// A trickled ICE candidate, mirroring the browser's `RTCIceCandidateInit`
/// shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
    pub username_fragment: Option<String>,
}

/// ICE server config pushed to the client as part of [`SignalingPayload::Config`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// One signaling-stream message, tagged by variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SignalingPayload {
    /// Pushed by the server right after creating a peer connection: ICE
    /// servers plus the negotiated codec metadata.
    Config {
        ice_servers: Vec<IceServerConfig>,
        codec: String,
        sample_rate_hz: u32,
    },
    /// An SDP offer or answer.
    Sdp { kind: SdpKind, sdp: String },
    /// A trickled ICE candidate.
    IceCandidate(IceCandidate),
    /// Sent once the peer connection reaches `Connected`.
    Ready(bool),
    /// Tells the client to drop any buffered/playing assistant audio
    /// (barge-in).
    Clear(bool),
    /// Either side signals an intent to tear down the signaling stream.
    Disconnect(bool),
    Initialization(InitializationPayload),
    Configuration(ConfigurationPayload),
    UserMessage(UserContent),
    Metadata(MetadataPayload),
    Metric(MetricPayload),
    Disconnection(DisconnectionPayload),
}

/// The envelope wrapping every [`SignalingPayload`] with the session it
/// belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalingEnvelope {
    pub session_id: String,
    pub payload: SignalingPayload,
}

impl SignalingEnvelope {
    #[must_use]
    pub fn new(session_id: impl Into<String>, payload: SignalingPayload) -> Self {
        Self {
            session_id: session_id.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_json() {
        let env = SignalingEnvelope::new(
            "sess-1",
            SignalingPayload::Sdp {
                kind: SdpKind::Offer,
                sdp: "v=0".into(),
            },
        );
        let json = serde_json::to_string(&env).unwrap();
        let back: SignalingEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(env, back);
    }
}
