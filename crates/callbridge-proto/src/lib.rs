//! Shared wire and channel types for the streaming bridge.
//!
//! This crate has no I/O of its own. It defines the sum types that flow
//! through [`BaseStreamer`]'s channels, the config types that parameterize
//! buffering, and the WebRTC signaling envelope. Every other crate in this
//! workspace depends on it.
//!
//! [`BaseStreamer`]: https://docs.rs/callbridge-core

#![forbid(unsafe_code)]

pub mod audio;
pub mod config;
pub mod disconnect;
pub mod message;
pub mod signaling;

pub use audio::{AudioConfig, AudioFormat};
pub use config::{ConfigError, StreamerConfig};
pub use disconnect::DisconnectionReason;
pub use message::{
    ConfigurationPayload, DirectiveKind, DisconnectionPayload, ErrorPayload,
    InitializationPayload, InputMessage, InterruptionKind, MetadataPayload,
    MetricPayload, OutputMessage, SendMessage, StreamMode, UserContent,
};
pub use signaling::{
    IceCandidate, IceServerConfig, SdpKind, SignalingEnvelope, SignalingPayload,
};
