//! Text ↔ audio mode state (§4.3 "Mode switching").

use callbridge_proto::StreamMode;

/// Current negotiation state of the session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Text,
    Audio,
}

impl From<StreamMode> for Mode {
    fn from(m: StreamMode) -> Self {
        match m {
            StreamMode::Text => Self::Text,
            StreamMode::Audio => Self::Audio,
        }
    }
}

impl Mode {
    #[must_use]
    pub fn as_stream_mode(self) -> StreamMode {
        match self {
            Self::Text => StreamMode::Text,
            Self::Audio => StreamMode::Audio,
        }
    }
}
