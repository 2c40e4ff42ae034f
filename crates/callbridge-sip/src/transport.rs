//! The RTP media seam a [`crate::streamer::SipRtpStreamer`] drives.
//!
//! Unlike the WebSocket telephony providers, there is no JSON framing
//! here: the SIP server (outside this crate's scope — see §1 Non-goals)
//! owns the actual RTP socket, depacketizes incoming packets to raw
//! native-format audio payloads, and hands them to whatever implements
//! this trait.

use async_trait::async_trait;

/// One leg's raw RTP media stream, already depacketized to native-codec
/// audio bytes.
#[async_trait]
pub trait RtpTransport: Send {
    /// The next inbound payload's audio bytes, or `None` once the RTP
    /// session has ended.
    async fn recv_payload(&mut self) -> Option<Vec<u8>>;

    /// Sends one native-format audio payload to be packetized and sent.
    async fn send_payload(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Closes the underlying media session.
    async fn close(&mut self);
}
