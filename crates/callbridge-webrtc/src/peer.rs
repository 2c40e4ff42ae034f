//! Peer-connection construction and the handshake helpers the streamer's
//! state machine drives (§4.3 "Handshake").
//!
//! Grounded on the same `webrtc` crate API shape as other Opus/WebRTC
//! voice bridges in the corpus: a `MediaEngine` with Opus registered at
//! the negotiated rate/channels/payload type, default interceptors, a
//! `SettingEngine` for ICE timeouts, one outbound `TrackLocalStaticSample`,
//! and callback-driven ICE/connection-state propagation.

use std::sync::Arc;
use std::time::Duration;

use derive_more::Display;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::codec::{OPUS_PAYLOAD_TYPE, OPUS_SAMPLE_RATE_HZ};
use callbridge_proto::IceServerConfig;

#[derive(Clone, Debug, Display)]
pub enum PeerError {
    #[display(fmt = "webrtc error: {}", _0)]
    Backend(String),
}

impl std::error::Error for PeerError {}

impl From<webrtc::Error> for PeerError {
    fn from(e: webrtc::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

fn opus_capability() -> RTCRtpCodecCapability {
    RTCRtpCodecCapability {
        mime_type: "audio/opus".to_string(),
        clock_rate: OPUS_SAMPLE_RATE_HZ,
        channels: 2,
        sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
        rtcp_feedback: vec![],
    }
}

/// A live peer connection plus its one outbound audio track.
pub struct PeerHandle {
    pub pc: Arc<RTCPeerConnection>,
    pub local_track: Arc<TrackLocalStaticSample>,
}

impl PeerHandle {
    /// Builds a fresh peer connection with Opus registered, default
    /// interceptors, and the given ICE servers, wires the given
    /// callbacks, and adds the outbound audio track.
    pub async fn create(
        ice_servers: &[IceServerConfig],
        on_ice_candidate: impl Fn(RTCIceCandidate) + Send + Sync + 'static,
        on_state_change: impl Fn(RTCPeerConnectionState) + Send + Sync + 'static,
        on_remote_track: impl Fn(Arc<TrackRemote>) + Send + Sync + 'static,
    ) -> Result<Self, PeerError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_codec(
            RTCRtpCodecParameters {
                capability: opus_capability(),
                payload_type: OPUS_PAYLOAD_TYPE,
                stats_id: String::new(),
            },
            RTPCodecType::Audio,
        )?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let mut setting_engine = SettingEngine::default();
        setting_engine.set_ice_timeouts(
            Some(Duration::from_secs(5)),
            Some(Duration::from_secs(25)),
            Some(Duration::from_secs(2)),
        );

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .with_setting_engine(setting_engine)
            .build();

        let rtc_ice_servers: Vec<RTCIceServer> = ice_servers
            .iter()
            .map(|s| RTCIceServer {
                urls: s.urls.clone(),
                username: s.username.clone().unwrap_or_default(),
                credential: s.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        let pc = Arc::new(
            api.new_peer_connection(RTCConfiguration {
                ice_servers: rtc_ice_servers,
                ..Default::default()
            })
            .await?,
        );

        pc.on_ice_candidate(Box::new(move |candidate| {
            if let Some(c) = candidate {
                on_ice_candidate(c);
            }
            Box::pin(async {})
        }));

        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            on_state_change(state);
            Box::pin(async {})
        }));

        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            on_remote_track(track);
            Box::pin(async {})
        }));

        let local_track = Arc::new(TrackLocalStaticSample::new(
            opus_capability(),
            "audio".to_string(),
            "callbridge".to_string(),
        ));
        pc.add_track(local_track.clone() as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        Ok(Self { pc, local_track })
    }

    /// Creates an offer and sets it as the local description, returning
    /// its SDP body.
    pub async fn create_offer(&self) -> Result<String, PeerError> {
        let offer = self.pc.create_offer(None).await?;
        self.pc.set_local_description(offer.clone()).await?;
        Ok(offer.sdp)
    }

    /// Applies a remote SDP answer.
    pub async fn set_remote_answer(&self, sdp: String) -> Result<(), PeerError> {
        let answer = RTCSessionDescription::answer(sdp)?;
        self.pc.set_remote_description(answer).await?;
        Ok(())
    }

    /// Adds a trickled remote ICE candidate.
    pub async fn add_ice_candidate(&self, init: RTCIceCandidateInit) -> Result<(), PeerError> {
        self.pc.add_ice_candidate(init).await?;
        Ok(())
    }

    pub async fn close(&self) -> Result<(), PeerError> {
        self.pc.close().await?;
        Ok(())
    }
}
