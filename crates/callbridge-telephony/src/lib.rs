//! Telephony base streamer (§4.2) plus the WebSocket-based provider
//! specializations — Twilio, Exotel, Vonage, Asterisk-style framing (§4.4)
//! — built on top of [`callbridge_core::BaseStreamer`].

#![forbid(unsafe_code)]

pub mod base;
pub mod credential;
pub mod framing;
pub mod providers;
pub mod resampler;
pub mod streamer;
pub mod transport;

pub use base::TelephonyBase;
pub use credential::ProviderCredential;
pub use framing::{FramingError, ProviderEvent, ProviderFraming};
pub use resampler::{AudioResampler, DefaultResampler};
pub use streamer::WebSocketTelephonyStreamer;
pub use transport::{WsFrame, WsTransport};
