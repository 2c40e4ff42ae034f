//! The `SignalingBridge.Connect` bidi-streaming RPC (§4.3): adapts the
//! generated `tonic` stream into a [`SignalingTransport`] and spawns a
//! [`WebRtcStreamer`] per call, mirroring the teacher's own
//! `Arbiter::spawn(async move { Server::builder()... })` hosting style
//! in `mock/control-api/src/callback/server.rs`.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use callbridge_core::{BaseStreamer, Streamer};
use callbridge_proto::{AudioConfig, SignalingEnvelope, SignalingPayload, StreamerConfig};
use callbridge_webrtc::{SignalingTransport, WebRtcStreamer, NATIVE_48K_MONO};
use futures::Stream;
use slog::{error, info, o};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use uuid::Uuid;

use crate::state::AppState;

pub mod proto {
    tonic::include_proto!("callbridge.signaling");
}

use proto::signaling_bridge_server::{SignalingBridge, SignalingBridgeServer};
use proto::Frame;

fn frame_to_envelope(frame: Frame) -> Option<SignalingEnvelope> {
    match serde_json::from_slice::<SignalingPayload>(&frame.payload_json) {
        Ok(payload) => Some(SignalingEnvelope {
            session_id: frame.session_id,
            payload,
        }),
        Err(_) => None,
    }
}

fn envelope_to_frame(envelope: SignalingEnvelope) -> Result<Frame, std::io::Error> {
    let payload_json = serde_json::to_vec(&envelope.payload)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(Frame {
        session_id: envelope.session_id,
        payload_json,
    })
}

/// Adapts a `tonic` bidi stream into a [`SignalingTransport`]: inbound
/// `Frame`s are pulled straight off the request stream, outbound ones go
/// through a channel feeding the response stream. Dropping `outbound_tx`
/// (on [`close`](SignalingTransport::close)) ends the response stream.
struct GrpcSignalingTransport {
    inbound: Streaming<Frame>,
    outbound_tx: Option<mpsc::Sender<Result<Frame, Status>>>,
    logger: slog::Logger,
}

#[async_trait]
impl SignalingTransport for GrpcSignalingTransport {
    async fn recv(&mut self) -> Option<SignalingEnvelope> {
        loop {
            match self.inbound.message().await {
                Ok(Some(frame)) => match frame_to_envelope(frame) {
                    Some(envelope) => return Some(envelope),
                    None => {
                        slog::warn!(self.logger, "dropping malformed signaling frame");
                        continue;
                    }
                },
                Ok(None) => return None,
                Err(err) => {
                    error!(self.logger, "signaling stream read error"; "error" => %err);
                    return None;
                }
            }
        }
    }

    async fn send(&mut self, envelope: SignalingEnvelope) -> std::io::Result<()> {
        let Some(tx) = &self.outbound_tx else {
            return Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "transport closed"));
        };
        let frame = envelope_to_frame(envelope)?;
        tx.send(Ok(frame))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::BrokenPipe, e.to_string()))
    }

    async fn close(&mut self) {
        self.outbound_tx = None;
    }
}

pub struct SignalingService {
    state: Arc<AppState>,
}

impl SignalingService {
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    #[must_use]
    pub fn into_server(self) -> SignalingBridgeServer<Self> {
        SignalingBridgeServer::new(self)
    }
}

type ConnectStream = Pin<Box<dyn Stream<Item = Result<Frame, Status>> + Send + 'static>>;

#[tonic::async_trait]
impl SignalingBridge for SignalingService {
    type ConnectStream = ConnectStream;

    async fn connect(
        &self,
        request: Request<Streaming<Frame>>,
    ) -> Result<Response<Self::ConnectStream>, Status> {
        let session_id = Uuid::new_v4().to_string();
        let logger = self.state.logger.new(o!("session_id" => session_id.clone()));
        info!(logger, "webrtc signaling connection opened");

        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let transport = Box::new(GrpcSignalingTransport {
            inbound: request.into_inner(),
            outbound_tx: Some(outbound_tx),
            logger: logger.clone(),
        });

        let cfg = StreamerConfig::builder()
            .input_audio_config(AudioConfig::CANONICAL)
            .output_audio_config(NATIVE_48K_MONO)
            .build()
            .map_err(|e| Status::internal(format!("failed to build streamer config: {e}")))?;
        let base = Arc::new(BaseStreamer::new(logger.clone(), cfg));
        let streamer = WebRtcStreamer::spawn(base, session_id, self.state.ice_servers(), transport);
        crate::supervisor::watch_external_cancellation(
            streamer as Arc<dyn Streamer>,
            self.state.shutdown.clone(),
            logger,
        );

        let response_stream = ReceiverStream::new(outbound_rx);
        Ok(Response::new(Box::pin(response_stream) as Self::ConnectStream))
    }
}
