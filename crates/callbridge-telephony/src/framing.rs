//! Provider wire framing (§4.4): each WebSocket telephony provider wraps
//! audio/control events in its own small JSON envelope. A
//! [`ProviderFraming`] implementation knows only how to parse that
//! envelope into a transport-agnostic [`ProviderEvent`] and how to wrap
//! outbound audio back into it — everything else (buffering, resampling,
//! disconnection handling) lives in [`TelephonyBase`](crate::TelephonyBase)
//! and is shared across providers.

use derive_more::Display;

/// A decoded inbound event, independent of which provider sent it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProviderEvent {
    /// The call leg has started; carries the provider's call/channel id.
    Start { channel_uuid: String },
    /// Base64-decoded inbound audio, still in the provider's native
    /// format.
    Media(Vec<u8>),
    /// A DTMF digit was pressed.
    Dtmf(char),
    /// The call leg has ended.
    Stop,
    /// An event this framing doesn't model; ignored by the streamer.
    Unknown,
}

/// Parse/encode errors from a [`ProviderFraming`] implementation.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum FramingError {
    #[display(fmt = "malformed provider frame: {}", _0)]
    Malformed(String),
}

impl std::error::Error for FramingError {}

/// The per-provider wire format seam.
pub trait ProviderFraming: Send + Sync {
    /// Parses one inbound WebSocket text frame.
    fn decode_inbound(&self, text: &str) -> Result<ProviderEvent, FramingError>;

    /// Wraps one outbound chunk of native-format audio in the provider's
    /// envelope, ready to send as a WebSocket text frame.
    fn encode_outbound(&self, channel_uuid: &str, native_audio: &[u8]) -> String;

    /// Wraps a `Clear`/barge-in signal in the provider's envelope, if it
    /// has one. Returns `None` when the provider has no such concept.
    fn encode_clear(&self, channel_uuid: &str) -> Option<String>;
}
