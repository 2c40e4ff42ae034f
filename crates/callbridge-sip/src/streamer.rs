//! [`SipRtpStreamer`]: the SIP/RTP leg of the telephony streamer family
//! (§4.4 "SIP / Asterisk"). Unlike the WebSocket providers, framing is
//! raw RTP media payloads rather than a JSON envelope — the SIP server
//! owns the socket and handles signaling (INVITE/BYE/re-INVITE)
//! upstream of this streamer; once the streamer exists, the call is
//! already connected.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use callbridge_core::{SendError, Streamer};
use callbridge_proto::{DirectiveKind, DisconnectionReason, InputMessage, OutputMessage, SendMessage};
use slog::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use callbridge_telephony::TelephonyBase;

use crate::transport::RtpTransport;

fn to_output(msg: SendMessage) -> (Option<OutputMessage>, Option<Vec<u8>>) {
    match msg {
        SendMessage::AssistantAudio(bytes) => (None, Some(bytes)),
        SendMessage::AssistantText(t) => (Some(OutputMessage::AssistantText(t)), None),
        SendMessage::Configuration(c) => (Some(OutputMessage::Configuration(c)), None),
        SendMessage::Initialization(i) => (Some(OutputMessage::Initialization(i)), None),
        SendMessage::UserMessage(m) => (Some(OutputMessage::UserMessage(m)), None),
        SendMessage::Metadata(m) => (Some(OutputMessage::Metadata(m)), None),
        SendMessage::Metric(m) => (Some(OutputMessage::Metric(m)), None),
        SendMessage::Error(e) => (Some(OutputMessage::Error(e)), None),
        SendMessage::Interruption(k) => (Some(OutputMessage::Interruption(k)), None),
        SendMessage::Directive(_) | SendMessage::Disconnection(_) => (None, None),
    }
}

pub struct SipRtpStreamer {
    telephony: TelephonyBase,
}

impl SipRtpStreamer {
    /// Builds the streamer, announces the session (a SIP leg has no
    /// text-only variant), and spawns its transport-owning task.
    pub fn spawn(telephony: TelephonyBase, transport: Box<dyn RtpTransport>) -> Arc<Self> {
        telephony
            .base()
            .push_input(InputMessage::Initialization(telephony.create_connection_request()));
        let this = Arc::new(Self { telephony });
        tokio::spawn(this.clone().run(transport));
        this
    }

    fn frame_duration(&self) -> Duration {
        let bytes_per_ms = self.telephony.native_format().bytes_per_ms().max(1);
        let frame_size = self.telephony.base().config().output_frame_size() as u32;
        Duration::from_millis(u64::from(frame_size / bytes_per_ms))
    }

    async fn run(self: Arc<Self>, mut transport: Box<dyn RtpTransport>) {
        let base = self.telephony.base().clone();
        let ctx = base.context();
        let logger = base.logger().clone();
        let frame_duration = self.frame_duration();

        loop {
            tokio::select! {
                biased;
                () = ctx.cancelled() => {
                    transport.close().await;
                    break;
                }
                payload = transport.recv_payload() => {
                    match payload {
                        None => base.push_disconnection(DisconnectionReason::ClientDisconnect),
                        Some(native_bytes) => {
                            let msg = self.telephony.create_voice_request(&native_bytes);
                            if let InputMessage::UserAudio(canonical) = msg {
                                base.buffer_and_send_input(&canonical);
                            }
                        }
                    }
                }
                () = base.recv_flush() => {
                    // No wire-level "clear" exists for raw RTP; barge-in is
                    // realized purely by dropping queued output below.
                }
                out = base.recv_output() => {
                    match out {
                        Some(OutputMessage::AssistantAudio(native_frame)) => {
                            if let Err(err) = transport.send_payload(&native_frame).await {
                                warn!(logger, "failed to send rtp payload"; "error" => %err);
                            }
                            base.frame_pool().release(native_frame);
                            tokio::time::sleep(frame_duration).await;
                        }
                        Some(other) => {
                            debug!(logger, "dropping non-audio output on a voice-only rtp transport"; "type" => other.kind());
                        }
                        None => {}
                    }
                }
            }

            if base.is_closed() {
                transport.close().await;
                break;
            }
        }
        info!(logger, "sip/rtp streamer task exiting");
    }
}

#[async_trait]
impl Streamer for SipRtpStreamer {
    async fn recv(&self) -> Option<InputMessage> {
        self.telephony.base().recv().await
    }

    async fn send(&self, msg: SendMessage) -> Result<(), SendError> {
        let base = self.telephony.base();
        if base.is_closed() {
            return Err(SendError::Closed);
        }
        match msg {
            SendMessage::Interruption(kind) => {
                base.clear_input_buffer();
                base.clear_output_buffer();
                base.push_output(OutputMessage::Interruption(kind));
            }
            SendMessage::Directive(directive) => {
                let is_end = matches!(directive, DirectiveKind::EndConversation);
                base.push_output(OutputMessage::Directive(directive));
                if is_end {
                    base.push_disconnection(DisconnectionReason::TOOL_DIRECTIVE);
                }
            }
            SendMessage::Disconnection(payload) => {
                base.push_output(OutputMessage::Disconnection(payload));
            }
            other => {
                let (output, audio) = to_output(other);
                if let Some(bytes) = audio {
                    self.telephony
                        .buffer_and_send_native_output(&bytes)
                        .map_err(SendError::ResampleFailed)?;
                }
                if let Some(msg) = output {
                    base.push_output(msg);
                }
            }
        }
        Ok(())
    }

    fn context(&self) -> CancellationToken {
        self.telephony.base().context()
    }

    async fn close(&self) {
        self.telephony.base().push_disconnection(DisconnectionReason::USER);
        self.telephony.base().cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc as StdArc;

    use callbridge_core::BaseStreamer;
    use callbridge_proto::{AudioConfig, AudioFormat, StreamerConfig};
    use callbridge_telephony::{DefaultResampler, ProviderCredential};
    use slog::{o, Drain, Logger};
    use tokio::sync::mpsc;

    use super::*;

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

    struct MockRtpTransport {
        inbound: mpsc::Receiver<Vec<u8>>,
        outbound: mpsc::Sender<Vec<u8>>,
    }

    #[async_trait]
    impl RtpTransport for MockRtpTransport {
        async fn recv_payload(&mut self) -> Option<Vec<u8>> {
            self.inbound.recv().await
        }

        async fn send_payload(&mut self, bytes: &[u8]) -> std::io::Result<()> {
            let _ = self.outbound.send(bytes.to_vec()).await;
            Ok(())
        }

        async fn close(&mut self) {}
    }

    fn build_streamer() -> (StdArc<SipRtpStreamer>, mpsc::Sender<Vec<u8>>, mpsc::Receiver<Vec<u8>>) {
        let cfg = StreamerConfig::builder()
            .input_audio_config(AudioConfig::CANONICAL)
            .input_buffer_threshold(1)
            .output_audio_config(mulaw_8k())
            .build()
            .unwrap();
        let base = StdArc::new(BaseStreamer::new(test_logger(), cfg));
        let telephony = TelephonyBase::new(
            base,
            mulaw_8k(),
            StdArc::new(DefaultResampler),
            ProviderCredential::new("acct", "secret"),
            "assistant-1",
            "conv-1",
        );
        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        let (outbound_tx, outbound_rx) = mpsc::channel(16);
        let transport = Box::new(MockRtpTransport {
            inbound: inbound_rx,
            outbound: outbound_tx,
        });
        let streamer = SipRtpStreamer::spawn(telephony, transport);
        (streamer, inbound_tx, outbound_rx)
    }

    #[tokio::test]
    async fn spawn_announces_session_as_audio_initialization() {
        let (streamer, _inbound_tx, _outbound_rx) = build_streamer();
        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), streamer.recv())
            .await
            .expect("recv should not hang")
            .expect("expected a message");
        assert!(matches!(msg, InputMessage::Initialization(_)));
    }

    #[tokio::test]
    async fn inbound_rtp_payload_becomes_user_audio() {
        let (streamer, inbound_tx, _outbound_rx) = build_streamer();
        let _ = streamer.recv().await; // drain Initialization
        inbound_tx.send(vec![0xFFu8; 160]).await.unwrap();

        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), streamer.recv())
            .await
            .expect("recv should not hang")
            .expect("expected a message");
        assert!(matches!(msg, InputMessage::UserAudio(_)));
    }

    #[tokio::test]
    async fn assistant_audio_is_resampled_and_written_as_rtp_payload() {
        let (streamer, _inbound_tx, mut outbound_rx) = build_streamer();
        streamer
            .send(SendMessage::AssistantAudio(vec![0u8; 3200]))
            .await
            .unwrap();

        let payload = tokio::time::timeout(std::time::Duration::from_secs(1), outbound_rx.recv())
            .await
            .expect("should not hang")
            .expect("expected an rtp payload");
        assert!(!payload.is_empty());
    }

    #[tokio::test]
    async fn inbound_stream_end_pushes_client_disconnect() {
        let (streamer, inbound_tx, _outbound_rx) = build_streamer();
        let _ = streamer.recv().await; // drain Initialization
        drop(inbound_tx);

        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), streamer.recv())
            .await
            .expect("recv should not hang")
            .expect("expected a disconnection");
        assert!(matches!(
            msg,
            InputMessage::Disconnection(p) if p.reason == DisconnectionReason::ClientDisconnect
        ));
    }
}
