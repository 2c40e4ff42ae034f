//! Fixed constants for the WebRTC streamer (§4.3 "Fixed audio constants",
//! §5 "Cancellation and timeouts").

use std::time::Duration;

/// 100 ms at 16 kHz mono linear16 — input-side buffering, in the
/// canonical internal format.
pub const INPUT_BUFFER_THRESHOLD_BYTES: usize = 3200;
/// Assistant-audio pacing tick — matches one Opus frame's duration.
pub const OUTPUT_PACING_TICK: Duration = Duration::from_millis(20);
pub const INPUT_CHANNEL_CAPACITY: usize = 500;
pub const OUTPUT_CHANNEL_CAPACITY: usize = 1500;
pub const MAX_CONSECUTIVE_RTP_READ_ERRORS: u32 = 50;
pub const RTP_READ_BUFFER_BYTES: usize = 1500;
pub const HANDSHAKE_DIAL_TIMEOUT: Duration = Duration::from_secs(30);
