//! The [`actix_web_actors`] WebSocket actor hosting a telephony
//! streamer, grounded on `mock/control-api/src/api/ws.rs`'s `WsSession`:
//! a `StreamHandler<ws::Message>` that forwards frames, except here the
//! counterpart is a tokio-spawned [`WebSocketTelephonyStreamer`] rather
//! than a broadcast list. Inbound frames cross into the tokio task via an
//! unbounded channel; outbound writes cross back via `Addr::do_send` of
//! an actor [`Message`], exactly the `Handler<Notification>` shape the
//! teacher uses.

use std::sync::Arc;

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, StreamHandler};
use actix_web_actors::ws;
use async_trait::async_trait;
use base64::Engine;
use callbridge_core::{BaseStreamer, Streamer};
use callbridge_proto::{AudioConfig, AudioFormat, StreamerConfig};
use callbridge_telephony::{
    providers::{AsteriskFraming, ExotelFraming, TwilioFraming, VonageFraming},
    DefaultResampler, ProviderCredential, TelephonyBase, WebSocketTelephonyStreamer, WsFrame,
    WsTransport,
};
use slog::Logger;
use tokio::sync::mpsc;

use crate::error::ServerError;
use crate::state::AppState;

/// Supported WebSocket telephony providers, each with its own wire
/// framing and native audio format (§4.4).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Provider {
    Twilio,
    Exotel,
    Vonage,
    Asterisk,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self, ServerError> {
        match name {
            "twilio" => Ok(Self::Twilio),
            "exotel" => Ok(Self::Exotel),
            "vonage" => Ok(Self::Vonage),
            "asterisk" => Ok(Self::Asterisk),
            other => Err(ServerError::UnknownProvider(other.to_string())),
        }
    }

    fn native_format(self) -> AudioConfig {
        match self {
            Self::Vonage => AudioConfig {
                sample_rate_hz: 16_000,
                format: AudioFormat::Linear16,
                channels: 1,
            },
            Self::Twilio | Self::Exotel | Self::Asterisk => AudioConfig {
                sample_rate_hz: 8_000,
                format: AudioFormat::Mulaw8,
                channels: 1,
            },
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Twilio => "twilio",
            Self::Exotel => "exotel",
            Self::Vonage => "vonage",
            Self::Asterisk => "asterisk",
        }
    }
}

#[derive(Message)]
#[rtype(result = "()")]
enum OutboundFrame {
    Text(String),
    Close,
}

/// Forwards inbound/outbound frames between the actix actor and the
/// tokio task that owns the provider streamer.
struct ActixWsTransport {
    inbound_rx: mpsc::UnboundedReceiver<WsFrame>,
    addr: actix::Addr<WsSession>,
}

#[async_trait]
impl WsTransport for ActixWsTransport {
    async fn recv(&mut self) -> Option<WsFrame> {
        self.inbound_rx.recv().await
    }

    async fn send_text(&mut self, text: String) -> std::io::Result<()> {
        self.addr.do_send(OutboundFrame::Text(text));
        Ok(())
    }

    async fn close(&mut self) {
        self.addr.do_send(OutboundFrame::Close);
    }
}

pub struct WsSession {
    state: Arc<AppState>,
    assistant_id: String,
    conversation_id: String,
    provider: Provider,
    credential: ProviderCredential,
    inbound_tx: Option<mpsc::UnboundedSender<WsFrame>>,
}

/// A `ProviderFraming` dispatching to the concrete provider chosen at
/// connection time; lets one `WsSession` type host all four providers.
#[derive(Clone, Copy)]
pub enum AnyFraming {
    Twilio(TwilioFraming),
    Exotel(ExotelFraming),
    Vonage(VonageFraming),
    Asterisk(AsteriskFraming),
}

impl callbridge_telephony::ProviderFraming for AnyFraming {
    fn decode_inbound(
        &self,
        text: &str,
    ) -> Result<callbridge_telephony::ProviderEvent, callbridge_telephony::FramingError> {
        match self {
            Self::Twilio(f) => f.decode_inbound(text),
            Self::Exotel(f) => f.decode_inbound(text),
            Self::Vonage(f) => f.decode_inbound(text),
            Self::Asterisk(f) => f.decode_inbound(text),
        }
    }

    fn encode_outbound(&self, channel_uuid: &str, native_audio: &[u8]) -> String {
        match self {
            Self::Twilio(f) => f.encode_outbound(channel_uuid, native_audio),
            Self::Exotel(f) => f.encode_outbound(channel_uuid, native_audio),
            Self::Vonage(f) => f.encode_outbound(channel_uuid, native_audio),
            Self::Asterisk(f) => f.encode_outbound(channel_uuid, native_audio),
        }
    }

    fn encode_clear(&self, channel_uuid: &str) -> Option<String> {
        match self {
            Self::Twilio(f) => f.encode_clear(channel_uuid),
            Self::Exotel(f) => f.encode_clear(channel_uuid),
            Self::Vonage(f) => f.encode_clear(channel_uuid),
            Self::Asterisk(f) => f.encode_clear(channel_uuid),
        }
    }
}

impl WsSession {
    #[must_use]
    pub fn new(
        state: Arc<AppState>,
        provider: Provider,
        assistant_id: String,
        conversation_id: String,
        credential: ProviderCredential,
    ) -> Self {
        Self {
            state,
            assistant_id,
            conversation_id,
            provider,
            credential,
            inbound_tx: None,
        }
    }

    fn logger(&self) -> Logger {
        self.state.logger.new(slog::o!(
            "provider" => self.provider.name().to_string(),
            "conversation_id" => self.conversation_id.clone(),
        ))
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        self.inbound_tx = Some(inbound_tx);

        let native_format = self.provider.native_format();
        let cfg = StreamerConfig::builder()
            .input_audio_config(AudioConfig::CANONICAL)
            .output_audio_config(native_format)
            .build()
            .expect("provider audio configs always yield a valid StreamerConfig");
        let base = Arc::new(BaseStreamer::new(self.logger(), cfg));
        let telephony = TelephonyBase::new(
            base,
            native_format,
            Arc::new(DefaultResampler),
            self.credential.clone(),
            self.assistant_id.clone(),
            self.conversation_id.clone(),
        );

        let framing = match self.provider {
            Provider::Twilio => AnyFraming::Twilio(TwilioFraming),
            Provider::Exotel => AnyFraming::Exotel(ExotelFraming),
            Provider::Vonage => AnyFraming::Vonage(VonageFraming),
            Provider::Asterisk => AnyFraming::Asterisk(AsteriskFraming),
        };

        let transport = Box::new(ActixWsTransport {
            inbound_rx,
            addr: ctx.address(),
        });
        let streamer = WebSocketTelephonyStreamer::spawn(telephony, framing, String::new(), transport);
        crate::supervisor::watch_external_cancellation(
            streamer as Arc<dyn Streamer>,
            self.state.shutdown.clone(),
            self.logger(),
        );
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(tx) = self.inbound_tx.take() {
            let _ = tx.send(WsFrame::Close);
        }
    }
}

impl Handler<OutboundFrame> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundFrame, ctx: &mut Self::Context) {
        match msg {
            OutboundFrame::Text(text) => ctx.text(text),
            OutboundFrame::Close => {
                ctx.close(None);
                ctx.stop();
            }
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let Some(tx) = &self.inbound_tx else { return };
        match msg {
            Ok(ws::Message::Ping(bytes)) => ctx.pong(&bytes),
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Text(text)) => {
                let _ = tx.send(WsFrame::Text(text.to_string()));
            }
            Ok(ws::Message::Binary(bytes)) => {
                if self.provider == Provider::Vonage {
                    let payload = base64::engine::general_purpose::STANDARD.encode(bytes.as_ref());
                    let envelope = serde_json::json!({ "event": "media", "payload": payload }).to_string();
                    let _ = tx.send(WsFrame::Text(envelope));
                } else {
                    slog::warn!(self.logger(), "binary frame on a text-framed provider, dropping");
                }
            }
            Ok(ws::Message::Close(reason)) => {
                let _ = tx.send(WsFrame::Close);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(err) => {
                slog::error!(self.logger(), "ws protocol error"; "error" => %err);
                let _ = tx.send(WsFrame::Close);
            }
        }
    }
}
