//! The WebRTC signaling gRPC surface.

mod signaling;

pub use signaling::{proto, SignalingService};
