//! The disconnection reason taxonomy. Exactly one reason is ever attached
//! to the single [`Disconnection`](crate::message::InputMessage) a session
//! emits before terminating.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Why a session ended.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectionReason {
    /// The session ended gracefully with no distinguishing cause.
    #[display(fmt = "normal")]
    Normal,
    /// A tool/function call ended the conversation.
    #[display(fmt = "tool")]
    Tool,
    /// The caller hung up or explicitly disconnected.
    #[display(fmt = "client_disconnect")]
    ClientDisconnect,
    /// Transport-level connection could not be established.
    #[display(fmt = "connection_failed")]
    ConnectionFailed,
    /// The remote peer (ICE/RTP) disconnected.
    #[display(fmt = "peer_disconnected")]
    PeerDisconnected,
    /// The gRPC signaling stream was closed by the peer.
    #[display(fmt = "grpc_closed")]
    GrpcClosed,
    /// The gRPC signaling stream errored.
    #[display(fmt = "grpc_error")]
    GrpcError,
    /// The session context was cancelled (caller-context watcher fired, or
    /// `Close()` was called directly).
    #[display(fmt = "context_cancelled")]
    ContextCancelled,
    /// Catch-all for causes that don't fit the above.
    #[display(fmt = "unknown")]
    Unknown,
}

impl DisconnectionReason {
    /// The reason used for a caller-initiated close or a transport read/
    /// write failure attributable to the caller side (`PushDisconnection`
    /// call sites referred to as `USER` in the component design).
    pub const USER: Self = Self::ClientDisconnect;

    /// The reason used when an `END_CONVERSATION` directive from the
    /// assistant service closes the session (referred to as `TOOL`).
    pub const TOOL_DIRECTIVE: Self = Self::Tool;
}
