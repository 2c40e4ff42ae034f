//! [`WebRtcStreamer`]: the peer-connection + signaling-stream streamer
//! (§4.3). A single combined task owns the signaling transport and
//! multiplexes signaling reads, paced Opus output, barge-in flushes, and
//! the peer connection's ICE/state callbacks. A second, mode-scoped task
//! (spawned and torn down by [`WebRtcStreamer::setup_audio_and_handshake`]
//! / [`WebRtcStreamer::reset_audio_session`]) reads remote RTP while the
//! session is in AUDIO mode.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use callbridge_core::audio::{convert, decode_to_samples, encode_from_samples};
use callbridge_core::{BaseStreamer, SendError, Streamer};
use callbridge_proto::{
    AudioConfig, AudioFormat, DirectiveKind, DisconnectionReason, IceCandidate, IceServerConfig,
    InputMessage, OutputMessage, SdpKind, SendMessage, SignalingEnvelope, SignalingPayload,
    UserContent,
};
use slog::{debug, info, warn, Logger};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::media::Sample;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::track::track_remote::TrackRemote;

use crate::codec::{mono_to_stereo, stereo_to_mono, OpusFrameDecoder, OpusFrameEncoder, OPUS_SAMPLE_RATE_HZ};
use crate::constants::{MAX_CONSECUTIVE_RTP_READ_ERRORS, OUTPUT_PACING_TICK};
use crate::mode::Mode;
use crate::peer::PeerHandle;
use crate::transport::SignalingTransport;

pub const NATIVE_48K_MONO: AudioConfig = AudioConfig {
    sample_rate_hz: OPUS_SAMPLE_RATE_HZ,
    format: AudioFormat::Linear16,
    channels: 1,
};

fn to_output_message(msg: SendMessage) -> Option<OutputMessage> {
    match msg {
        SendMessage::AssistantText(t) => Some(OutputMessage::AssistantText(t)),
        SendMessage::Configuration(c) => Some(OutputMessage::Configuration(c)),
        SendMessage::Initialization(i) => Some(OutputMessage::Initialization(i)),
        SendMessage::UserMessage(m) => Some(OutputMessage::UserMessage(m)),
        SendMessage::Metadata(m) => Some(OutputMessage::Metadata(m)),
        SendMessage::Metric(m) => Some(OutputMessage::Metric(m)),
        SendMessage::Error(e) => Some(OutputMessage::Error(e)),
        SendMessage::AssistantAudio(_)
        | SendMessage::Interruption(_)
        | SendMessage::Directive(_)
        | SendMessage::Disconnection(_) => None,
    }
}

/// Maps an outbound `OutputCh` message to its signaling-envelope wire
/// form. `AssistantAudio` never reaches here (it's paced separately);
/// `Error`, `Interruption` and `Directive` have no representation in
/// this minimal envelope and are dropped (logged at debug).
fn to_signaling_payload(msg: OutputMessage) -> Option<SignalingPayload> {
    match msg {
        OutputMessage::AssistantText(t) => Some(SignalingPayload::UserMessage(UserContent::Text(t))),
        OutputMessage::Configuration(c) => Some(SignalingPayload::Configuration(c)),
        OutputMessage::Initialization(i) => Some(SignalingPayload::Initialization(i)),
        OutputMessage::UserMessage(m) => Some(SignalingPayload::UserMessage(m)),
        OutputMessage::Metadata(m) => Some(SignalingPayload::Metadata(m)),
        OutputMessage::Metric(m) => Some(SignalingPayload::Metric(m)),
        OutputMessage::Disconnection(d) => Some(SignalingPayload::Disconnection(d)),
        OutputMessage::AssistantAudio(_)
        | OutputMessage::Error(_)
        | OutputMessage::Interruption(_)
        | OutputMessage::Directive(_) => None,
    }
}

/// The WebRTC peer-connection streamer.
pub struct WebRtcStreamer {
    base: Arc<BaseStreamer>,
    session_id: String,
    ice_servers: Vec<IceServerConfig>,
    mode: StdMutex<Mode>,
    peer: StdMutex<Option<Arc<PeerHandle>>>,
    audio_ctx: StdMutex<Option<CancellationToken>>,
    audio_task: StdMutex<Option<JoinHandle<()>>>,
    ice_tx: mpsc::UnboundedSender<RTCIceCandidate>,
    state_tx: mpsc::UnboundedSender<RTCPeerConnectionState>,
}

impl WebRtcStreamer {
    /// Builds the streamer and spawns its signaling-transport-owning
    /// task. Starts in TEXT mode; no peer connection exists until a
    /// `Configuration`/`Initialization` declaring AUDIO mode arrives.
    pub fn spawn(
        base: Arc<BaseStreamer>,
        session_id: String,
        ice_servers: Vec<IceServerConfig>,
        transport: Box<dyn SignalingTransport>,
    ) -> Arc<Self> {
        let (ice_tx, ice_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = mpsc::unbounded_channel();
        let this = Arc::new(Self {
            base,
            session_id,
            ice_servers,
            mode: StdMutex::new(Mode::Text),
            peer: StdMutex::new(None),
            audio_ctx: StdMutex::new(None),
            audio_task: StdMutex::new(None),
            ice_tx,
            state_tx,
        });
        tokio::spawn(this.clone().run(transport, ice_rx, state_rx));
        this
    }

    fn current_peer(&self) -> Option<Arc<PeerHandle>> {
        self.peer.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn run(
        self: Arc<Self>,
        mut transport: Box<dyn SignalingTransport>,
        mut ice_rx: mpsc::UnboundedReceiver<RTCIceCandidate>,
        mut state_rx: mpsc::UnboundedReceiver<RTCPeerConnectionState>,
    ) {
        let base = self.base.clone();
        let ctx = base.context();
        let logger = base.logger().clone();
        let mut ticker = tokio::time::interval(OUTPUT_PACING_TICK);
        let mut pending_audio: VecDeque<Vec<u8>> = VecDeque::new();
        let mut encoder = match OpusFrameEncoder::new() {
            Ok(e) => e,
            Err(err) => {
                warn!(logger, "failed to construct opus encoder"; "error" => %err);
                base.push_disconnection(DisconnectionReason::Unknown);
                return;
            }
        };

        loop {
            tokio::select! {
                biased;
                () = ctx.cancelled() => {
                    transport.close().await;
                    break;
                }
                envelope = transport.recv() => {
                    match envelope {
                        None => base.push_disconnection(DisconnectionReason::ClientDisconnect),
                        Some(env) => self.handle_inbound(env, &mut transport, &logger).await,
                    }
                }
                Some(candidate) = ice_rx.recv() => {
                    let ice = IceCandidate {
                        candidate: candidate.to_string(),
                        sdp_mid: Some("audio".to_string()),
                        sdp_mline_index: Some(0),
                        username_fragment: None,
                    };
                    let _ = transport
                        .send(SignalingEnvelope::new(self.session_id.clone(), SignalingPayload::IceCandidate(ice)))
                        .await;
                }
                Some(state) = state_rx.recv() => {
                    self.handle_state_change(state, &mut transport, &logger).await;
                }
                () = base.recv_flush() => {
                    pending_audio.clear();
                    let _ = transport
                        .send(SignalingEnvelope::new(self.session_id.clone(), SignalingPayload::Clear(true)))
                        .await;
                }
                out = base.recv_output() => {
                    match out {
                        Some(OutputMessage::AssistantAudio(native_frame)) => {
                            pending_audio.push_back(native_frame);
                        }
                        Some(other) => {
                            if let Some(payload) = to_signaling_payload(other) {
                                let _ = transport
                                    .send(SignalingEnvelope::new(self.session_id.clone(), payload))
                                    .await;
                            }
                        }
                        None => {}
                    }
                }
                _ = ticker.tick() => {
                    if let Some(frame) = pending_audio.pop_front() {
                        if let Err(err) = self.encode_and_write(&mut encoder, &frame).await {
                            warn!(logger, "failed to write assistant audio sample"; "error" => %err);
                        }
                        base.frame_pool().release(frame);
                    }
                }
            }

            if base.is_closed() {
                transport.close().await;
                break;
            }
        }
        info!(logger, "webrtc streamer task exiting");
    }

    async fn encode_and_write(&self, encoder: &mut OpusFrameEncoder, mono_frame: &[u8]) -> Result<(), String> {
        let Some(peer) = self.current_peer() else {
            return Ok(());
        };
        let mono_samples = decode_to_samples(mono_frame, AudioFormat::Linear16);
        let stereo_samples = mono_to_stereo(&mono_samples);
        let packet = encoder.encode(&stereo_samples).map_err(|e| e.to_string())?;
        let sample = Sample {
            data: packet.into(),
            duration: OUTPUT_PACING_TICK,
            ..Default::default()
        };
        peer.local_track
            .write_sample(&sample)
            .await
            .map_err(|e| e.to_string())
    }

    async fn handle_inbound(
        &self,
        envelope: SignalingEnvelope,
        transport: &mut Box<dyn SignalingTransport>,
        logger: &Logger,
    ) {
        match envelope.payload {
            SignalingPayload::Initialization(init) => {
                let mode = Mode::from(init.stream_mode);
                self.base.push_input(InputMessage::Initialization(init));
                self.handle_mode_change(mode, transport, logger).await;
            }
            SignalingPayload::Configuration(cfg) => {
                let mode = Mode::from(cfg.stream_mode);
                self.base.push_input(InputMessage::Configuration(cfg));
                self.handle_mode_change(mode, transport, logger).await;
            }
            SignalingPayload::UserMessage(UserContent::Text(text)) => {
                self.base.push_input(InputMessage::UserText(text));
            }
            SignalingPayload::UserMessage(UserContent::Audio(bytes)) => {
                self.base.push_input(InputMessage::UserAudio(bytes));
            }
            SignalingPayload::Metadata(m) => self.base.push_input(InputMessage::Metadata(m)),
            SignalingPayload::Metric(m) => self.base.push_input(InputMessage::Metric(m)),
            SignalingPayload::Disconnection(d) => self.base.push_disconnection(d.reason),
            SignalingPayload::Disconnect(true) => {
                self.base.push_disconnection(DisconnectionReason::ClientDisconnect);
            }
            SignalingPayload::Sdp { kind: SdpKind::Answer, sdp } => match self.current_peer() {
                Some(peer) => {
                    if let Err(err) = peer.set_remote_answer(sdp).await {
                        warn!(logger, "failed to apply remote answer"; "error" => %err);
                    }
                }
                None => warn!(logger, "received SDP answer with no peer connection"),
            },
            SignalingPayload::IceCandidate(c) => match self.current_peer() {
                Some(peer) => {
                    let init = RTCIceCandidateInit {
                        candidate: c.candidate,
                        sdp_mid: c.sdp_mid,
                        sdp_mline_index: c.sdp_mline_index,
                        username_fragment: c.username_fragment,
                    };
                    if let Err(err) = peer.add_ice_candidate(init).await {
                        warn!(logger, "failed to add remote ice candidate"; "error" => %err);
                    }
                }
                None => warn!(logger, "received ICE candidate with no peer connection"),
            },
            SignalingPayload::Sdp { kind: SdpKind::Offer, .. }
            | SignalingPayload::Config { .. }
            | SignalingPayload::Ready(_)
            | SignalingPayload::Clear(_)
            | SignalingPayload::Disconnect(false) => {
                debug!(logger, "ignoring server-originated signaling payload from client");
            }
        }
    }

    async fn handle_state_change(
        &self,
        state: RTCPeerConnectionState,
        transport: &mut Box<dyn SignalingTransport>,
        logger: &Logger,
    ) {
        match state {
            RTCPeerConnectionState::Connected => {
                let _ = transport
                    .send(SignalingEnvelope::new(self.session_id.clone(), SignalingPayload::Ready(true)))
                    .await;
            }
            RTCPeerConnectionState::Failed => {
                self.base.push_disconnection(DisconnectionReason::USER);
            }
            RTCPeerConnectionState::Disconnected => {
                self.reset_audio_session(logger).await;
            }
            _ => {}
        }
    }

    async fn handle_mode_change(
        &self,
        declared: Mode,
        transport: &mut Box<dyn SignalingTransport>,
        logger: &Logger,
    ) {
        let current = *self.mode.lock().unwrap_or_else(|e| e.into_inner());
        if declared == current {
            return;
        }
        match declared {
            Mode::Audio => self.setup_audio_and_handshake(transport, logger).await,
            Mode::Text => self.reset_audio_session(logger).await,
        }
    }

    async fn setup_audio_and_handshake(
        self: &Arc<Self>,
        transport: &mut Box<dyn SignalingTransport>,
        logger: &Logger,
    ) {
        self.reset_audio_session(logger).await;

        let audio_ctx = self.base.context().child_token();
        *self.audio_ctx.lock().unwrap_or_else(|e| e.into_inner()) = Some(audio_ctx.clone());

        let ice_tx = self.ice_tx.clone();
        let state_tx = self.state_tx.clone();
        let this_for_track = self.clone();
        let audio_ctx_for_track = audio_ctx.clone();

        let peer = match PeerHandle::create(
            &self.ice_servers,
            move |c| {
                let _ = ice_tx.send(c);
            },
            move |s| {
                let _ = state_tx.send(s);
            },
            move |track: Arc<TrackRemote>| {
                let this = this_for_track.clone();
                let audio_ctx = audio_ctx_for_track.clone();
                let handle = tokio::spawn(async move { this.run_remote_audio_reader(track, audio_ctx).await });
                *this_for_track.audio_task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
            },
        )
        .await
        {
            Ok(p) => Arc::new(p),
            Err(err) => {
                warn!(logger, "failed to create peer connection"; "error" => %err);
                self.base.push_disconnection(DisconnectionReason::ConnectionFailed);
                return;
            }
        };
        *self.peer.lock().unwrap_or_else(|e| e.into_inner()) = Some(peer.clone());
        *self.mode.lock().unwrap_or_else(|e| e.into_inner()) = Mode::Audio;

        let _ = transport
            .send(SignalingEnvelope::new(
                self.session_id.clone(),
                SignalingPayload::Config {
                    ice_servers: self.ice_servers.clone(),
                    codec: "opus".to_string(),
                    sample_rate_hz: OPUS_SAMPLE_RATE_HZ,
                },
            ))
            .await;

        match peer.create_offer().await {
            Ok(sdp) => {
                let _ = transport
                    .send(SignalingEnvelope::new(
                        self.session_id.clone(),
                        SignalingPayload::Sdp { kind: SdpKind::Offer, sdp },
                    ))
                    .await;
            }
            Err(err) => {
                warn!(logger, "failed to create sdp offer"; "error" => %err);
                self.base.push_disconnection(DisconnectionReason::ConnectionFailed);
            }
        }
    }

    async fn reset_audio_session(&self, logger: &Logger) {
        if let Some(ctx) = self.audio_ctx.lock().unwrap_or_else(|e| e.into_inner()).take() {
            ctx.cancel();
        }
        let handle = self.audio_task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        let peer = self.peer.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(peer) = peer {
            if let Err(err) = peer.close().await {
                warn!(logger, "error closing peer connection"; "error" => %err);
            }
        }
        *self.mode.lock().unwrap_or_else(|e| e.into_inner()) = Mode::Text;
    }

    async fn run_remote_audio_reader(self: Arc<Self>, track: Arc<TrackRemote>, audio_ctx: CancellationToken) {
        let logger = self.base.logger().clone();
        if !track.codec().capability.mime_type.eq_ignore_ascii_case("audio/opus") {
            warn!(logger, "rejecting non-opus remote track"; "mime_type" => track.codec().capability.mime_type);
            self.base.push_disconnection(DisconnectionReason::ConnectionFailed);
            return;
        }
        let mut decoder = match OpusFrameDecoder::new() {
            Ok(d) => d,
            Err(err) => {
                warn!(logger, "failed to construct opus decoder"; "error" => %err);
                return;
            }
        };

        let mut consecutive_errors = 0u32;
        loop {
            tokio::select! {
                biased;
                () = audio_ctx.cancelled() => break,
                result = track.read_rtp() => {
                    match result {
                        Ok((packet, _)) => {
                            consecutive_errors = 0;
                            if packet.payload.is_empty() {
                                continue;
                            }
                            match decoder.decode(&packet.payload) {
                                Ok(stereo_samples) => {
                                    let mono_samples = stereo_to_mono(&stereo_samples);
                                    let mono_bytes = encode_from_samples(&mono_samples, AudioFormat::Linear16);
                                    match convert(&mono_bytes, NATIVE_48K_MONO, AudioConfig::CANONICAL) {
                                        Ok(canonical) => self.base.buffer_and_send_input(&canonical),
                                        Err(err) => warn!(logger, "inbound resample failed, dropping frame"; "error" => %err),
                                    }
                                }
                                Err(err) => warn!(logger, "opus decode failed, dropping frame"; "error" => %err),
                            }
                        }
                        Err(err) => {
                            consecutive_errors += 1;
                            warn!(logger, "rtp read error"; "error" => %err, "consecutive" => consecutive_errors);
                            if consecutive_errors >= MAX_CONSECUTIVE_RTP_READ_ERRORS {
                                warn!(logger, "giving up after too many consecutive rtp read errors");
                                self.base.push_disconnection(DisconnectionReason::ConnectionFailed);
                                break;
                            }
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Streamer for WebRtcStreamer {
    async fn recv(&self) -> Option<InputMessage> {
        self.base.recv().await
    }

    async fn send(&self, msg: SendMessage) -> Result<(), SendError> {
        if self.base.is_closed() {
            return Err(SendError::Closed);
        }
        match msg {
            SendMessage::AssistantAudio(canonical) => {
                let native = convert(&canonical, AudioConfig::CANONICAL, NATIVE_48K_MONO)
                    .map_err(|e| SendError::ResampleFailed(e.to_string()))?;
                self.base.buffer_and_send_output(&native);
            }
            SendMessage::Interruption(kind) => {
                self.base.clear_input_buffer();
                self.base.clear_output_buffer();
                self.base.push_output(OutputMessage::Interruption(kind));
            }
            SendMessage::Directive(directive) => {
                let is_end = matches!(directive, DirectiveKind::EndConversation);
                self.base.push_output(OutputMessage::Directive(directive));
                if is_end {
                    self.base.push_disconnection(DisconnectionReason::TOOL_DIRECTIVE);
                }
            }
            SendMessage::Disconnection(payload) => {
                self.base.push_output(OutputMessage::Disconnection(payload));
            }
            other => {
                if let Some(out) = to_output_message(other) {
                    self.base.push_output(out);
                }
            }
        }
        Ok(())
    }

    fn context(&self) -> CancellationToken {
        self.base.context()
    }

    async fn close(&self) {
        self.base.push_disconnection(DisconnectionReason::USER);
        let logger = self.base.logger().clone();
        self.reset_audio_session(&logger).await;
        self.base.cancel();
    }
}
