#![forbid(unsafe_code)]

pub mod sdp;
pub mod streamer;
pub mod transport;
pub mod uri;

pub use sdp::{negotiate_codec, ParsedSdp, RtpCodec, SdpError, PCMU, SUPPORTED_CODECS, TELEPHONE_EVENT_PAYLOAD_TYPE};
pub use streamer::SipRtpStreamer;
pub use transport::RtpTransport;
pub use uri::{parse_sip_uri, SipAuthError, SipCredential};
