#![forbid(unsafe_code)]

pub mod codec;
pub mod constants;
pub mod mode;
pub mod peer;
pub mod streamer;
pub mod transport;

pub use codec::{CodecError, OpusFrameDecoder, OpusFrameEncoder};
pub use mode::Mode;
pub use peer::{PeerError, PeerHandle};
pub use streamer::{WebRtcStreamer, NATIVE_48K_MONO};
pub use transport::SignalingTransport;
