//! The transport-agnostic core of the streaming bridge: [`BaseStreamer`]
//! (buffer thresholds, frame slicing, channel discipline, interruption
//! signalling, disconnection idempotency), the process-wide [`FramePool`],
//! and the [`Streamer`] façade every concrete transport implements.

#![forbid(unsafe_code)]

pub mod audio;
pub mod frame_pool;
pub mod streamer;

pub use audio::ResampleError;
pub use frame_pool::FramePool;
pub use streamer::{BaseStreamer, SendError, Streamer};
