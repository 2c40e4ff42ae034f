//! [`WebSocketTelephonyStreamer`]: wires a [`TelephonyBase`], a
//! [`ProviderFraming`] and a [`WsTransport`] together into a concrete
//! [`Streamer`] (§4.4).
//!
//! A single background task owns the transport exclusively and multiplexes
//! three things with `tokio::select!`: inbound provider frames, the
//! output-buffer flush signal (barge-in → wire-level clear), and paced
//! delivery of sliced assistant-audio frames. `Streamer::recv`/`send`
//! themselves are thin delegations to the held [`BaseStreamer`]; all the
//! transport-facing work happens in that one task, spawned by
//! [`WebSocketTelephonyStreamer::spawn`].

use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use callbridge_core::{SendError, Streamer};
use callbridge_proto::{
    DirectiveKind, DisconnectionReason, InputMessage, OutputMessage, SendMessage,
};
use slog::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::base::TelephonyBase;
use crate::framing::{ProviderEvent, ProviderFraming};
use crate::transport::{WsFrame, WsTransport};

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

/// A WebSocket telephony streamer parameterized over its provider's wire
/// framing.
pub struct WebSocketTelephonyStreamer<F> {
    telephony: TelephonyBase,
    framing: F,
    channel_uuid: StdMutex<String>,
}

impl<F: ProviderFraming + 'static> WebSocketTelephonyStreamer<F> {
    /// Builds the streamer and spawns its transport-owning task.
    pub fn spawn(
        telephony: TelephonyBase,
        framing: F,
        channel_uuid: String,
        transport: Box<dyn WsTransport>,
    ) -> std::sync::Arc<Self> {
        let this = std::sync::Arc::new(Self {
            telephony,
            framing,
            channel_uuid: StdMutex::new(channel_uuid),
        });
        tokio::spawn(this.clone().run(transport));
        this
    }

    fn channel_uuid(&self) -> String {
        self.channel_uuid
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_channel_uuid(&self, id: String) {
        *self.channel_uuid.lock().unwrap_or_else(|e| e.into_inner()) = id;
    }

    /// One assistant-audio frame's wall-clock duration, for paced
    /// delivery, derived from the native output format.
    fn frame_duration(&self) -> Duration {
        let bytes_per_ms = self.telephony.native_format().bytes_per_ms().max(1);
        let frame_size = self.telephony.base().config().output_frame_size() as u32;
        Duration::from_millis(u64::from(frame_size / bytes_per_ms))
    }

    async fn run(self: std::sync::Arc<Self>, mut transport: Box<dyn WsTransport>) {
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
                frame = transport.recv() => {
                    match frame {
                        None => {
                            base.push_disconnection(DisconnectionReason::ClientDisconnect);
                        }
                        Some(WsFrame::Close) => {
                            base.push_disconnection(DisconnectionReason::ClientDisconnect);
                        }
                        Some(WsFrame::Text(text)) => {
                            self.handle_inbound_text(&base, &text, &logger);
                        }
                    }
                }
                () = base.recv_flush() => {
                    if let Some(clear) = self.framing.encode_clear(&self.channel_uuid()) {
                        if let Err(err) = transport.send_text(clear).await {
                            warn!(logger, "failed to send clear frame"; "error" => %err);
                        }
                    }
                }
                out = base.recv_output() => {
                    match out {
                        Some(OutputMessage::AssistantAudio(native_frame)) => {
                            let wire = self.framing.encode_outbound(&self.channel_uuid(), &native_frame);
                            if let Err(err) = transport.send_text(wire).await {
                                warn!(logger, "failed to send audio frame"; "error" => %err);
                            }
                            base.frame_pool().release(native_frame);
                            tokio::time::sleep(frame_duration).await;
                        }
                        Some(other) => {
                            debug!(logger, "dropping non-audio output on a voice-only transport"; "type" => other.kind());
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
        info!(logger, "telephony streamer task exiting");
    }

    fn handle_inbound_text(&self, base: &callbridge_core::BaseStreamer, text: &str, logger: &slog::Logger) {
        let event = match self.framing.decode_inbound(text) {
            Ok(e) => e,
            Err(err) => {
                warn!(logger, "malformed provider frame"; "error" => %err);
                return;
            }
        };
        match event {
            ProviderEvent::Start { channel_uuid } => {
                self.set_channel_uuid(channel_uuid.clone());
                base.push_input(InputMessage::Initialization(
                    self.telephony.create_connection_request(),
                ));
            }
            ProviderEvent::Media(native_bytes) => {
                let msg = self.telephony.create_voice_request(&native_bytes);
                if let InputMessage::UserAudio(canonical) = msg {
                    base.buffer_and_send_input(&canonical);
                }
            }
            ProviderEvent::Dtmf(digit) => {
                base.push_input(InputMessage::UserText(digit.to_string()));
            }
            ProviderEvent::Stop => {
                base.push_disconnection(DisconnectionReason::Normal);
            }
            ProviderEvent::Unknown => {}
        }
    }
}

#[async_trait]
impl<F: ProviderFraming + 'static> Streamer for WebSocketTelephonyStreamer<F> {
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
    use std::sync::Arc;

    use base64::Engine;
    use callbridge_core::BaseStreamer;
    use callbridge_proto::{AudioConfig, AudioFormat, StreamerConfig};
    use slog::{o, Drain, Logger};
    use tokio::sync::mpsc;

    use super::*;
    use crate::credential::ProviderCredential;
    use crate::providers::TwilioFraming;
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

    /// An in-memory transport driven by channels, standing in for a real
    /// socket in tests.
    struct MockTransport {
        inbound: mpsc::Receiver<WsFrame>,
        outbound: mpsc::Sender<String>,
    }

    #[async_trait]
    impl WsTransport for MockTransport {
        async fn recv(&mut self) -> Option<WsFrame> {
            self.inbound.recv().await
        }

        async fn send_text(&mut self, text: String) -> std::io::Result<()> {
            let _ = self.outbound.send(text).await;
            Ok(())
        }

        async fn close(&mut self) {}
    }

    fn build_streamer() -> (
        Arc<WebSocketTelephonyStreamer<TwilioFraming>>,
        mpsc::Sender<WsFrame>,
        mpsc::Receiver<String>,
    ) {
        let cfg = StreamerConfig::builder()
            .input_audio_config(AudioConfig::CANONICAL)
            .input_buffer_threshold(1)
            .output_audio_config(mulaw_8k())
            .build()
            .unwrap();
        let base = Arc::new(BaseStreamer::new(test_logger(), cfg));
        let telephony = TelephonyBase::new(
            base,
            mulaw_8k(),
            Arc::new(DefaultResampler),
            ProviderCredential::new("acct", "secret"),
            "assistant-1",
            "conv-1",
        );
        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        let (outbound_tx, outbound_rx) = mpsc::channel(16);
        let transport = Box::new(MockTransport {
            inbound: inbound_rx,
            outbound: outbound_tx,
        });
        let streamer =
            WebSocketTelephonyStreamer::spawn(telephony, TwilioFraming, "CA1".into(), transport);
        (streamer, inbound_tx, outbound_rx)
    }

    #[tokio::test]
    async fn inbound_media_becomes_user_audio() {
        let (streamer, inbound_tx, _outbound_rx) = build_streamer();
        let payload = base64::engine::general_purpose::STANDARD.encode([0xFFu8; 160]);
        let frame = format!(r#"{{"event":"media","media":{{"payload":"{payload}"}}}}"#);
        inbound_tx.send(WsFrame::Text(frame)).await.unwrap();

        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), streamer.recv())
            .await
            .expect("recv should not hang")
            .expect("expected a message");
        assert!(matches!(msg, InputMessage::UserAudio(_)));
    }

    #[tokio::test]
    async fn stop_event_pushes_normal_disconnection() {
        let (streamer, inbound_tx, _outbound_rx) = build_streamer();
        inbound_tx
            .send(WsFrame::Text(r#"{"event":"stop"}"#.into()))
            .await
            .unwrap();

        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), streamer.recv())
            .await
            .expect("recv should not hang")
            .expect("expected a disconnection");
        assert!(matches!(
            msg,
            InputMessage::Disconnection(p) if p.reason == DisconnectionReason::Normal
        ));
    }

    #[tokio::test]
    async fn assistant_audio_is_resampled_and_written_to_transport() {
        let (streamer, _inbound_tx, mut outbound_rx) = build_streamer();
        let canonical = vec![0u8; 3200];
        streamer
            .send(SendMessage::AssistantAudio(canonical))
            .await
            .unwrap();

        let wire = tokio::time::timeout(std::time::Duration::from_secs(1), outbound_rx.recv())
            .await
            .expect("should not hang")
            .expect("expected a wire frame");
        assert!(wire.contains("\"event\":\"media\""));
    }

    #[tokio::test]
    async fn interruption_clears_buffers_and_triggers_clear_frame() {
        let (streamer, _inbound_tx, mut outbound_rx) = build_streamer();
        streamer
            .send(SendMessage::AssistantAudio(vec![0u8; 100]))
            .await
            .unwrap();
        streamer
            .send(SendMessage::Interruption(
                callbridge_proto::InterruptionKind::Word,
            ))
            .await
            .unwrap();

        let wire = tokio::time::timeout(std::time::Duration::from_secs(1), outbound_rx.recv())
            .await
            .expect("should not hang")
            .expect("expected a clear frame");
        assert!(wire.contains("\"event\":\"clear\""));
    }
}
