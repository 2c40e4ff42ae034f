//! The sum-typed payloads carried on [`BaseStreamer`]'s channels and
//! accepted/returned by the [`Streamer`] façade.
//!
//! [`BaseStreamer`]: https://docs.rs/callbridge-core
//! [`Streamer`]: https://docs.rs/callbridge-core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::disconnect::DisconnectionReason;

/// Text/audio session mode, switchable mid-session without tearing down
/// the underlying transport.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// Text-only exchange; no peer connection / RTP is active.
    Text,
    /// Audio exchange; a peer connection / RTP path is active.
    Audio,
}

/// Content carried by a `UserMessage`: either transcribed/raw text or a
/// chunk of canonical-format audio.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserContent {
    /// Text content (e.g. an STT transcript, or a text-mode user turn).
    Text(String),
    /// Raw canonical (linear16/16kHz/mono) audio bytes.
    Audio(Vec<u8>),
}

/// `ConversationInitialization`-style payload establishing a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitializationPayload {
    pub conversation_id: String,
    pub assistant_id: String,
    pub stream_mode: StreamMode,
}

/// A runtime configuration change (e.g. a mode switch request).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationPayload {
    pub stream_mode: StreamMode,
}

/// Free-form key/value metadata, opaque to the bridge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataPayload {
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// A single numeric observation (latency, jitter, etc.), opaque to the
/// bridge beyond name/value/unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricPayload {
    pub name: String,
    pub value: f64,
    pub unit: Option<String>,
}

/// An error surfaced to the caller (as opposed to a local, absorbed
/// error — see the error handling design).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// What kind of barge-in interruption occurred.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionKind {
    /// Word-boundary interruption: flush buffers, emit `Clear`, forward.
    Word,
    /// VAD-detected interruption (voice activity, no buffer flush implied
    /// by this kind alone; forwarded as-is).
    Vad,
}

/// A directive from the assistant service instructing the bridge to take
/// an action beyond normal message relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectiveKind {
    /// End the conversation: forward, then push an idempotent
    /// [`DisconnectionReason::TOOL_DIRECTIVE`] disconnection.
    EndConversation,
    /// Any other directive, forwarded without special handling.
    Other(String),
}

/// A disconnection, carrying its reason and the time it was recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisconnectionPayload {
    pub reason: DisconnectionReason,
    pub at: DateTime<Utc>,
}

impl DisconnectionPayload {
    /// Builds a payload stamped with the given reason and the current
    /// time.
    #[must_use]
    pub fn new(reason: DisconnectionReason) -> Self {
        Self {
            reason,
            at: Utc::now(),
        }
    }
}

/// Messages that arrive on `InputCh` and are returned by `Recv()`.
///
/// This is the sum type referenced throughout the component design as
/// "a single sum-type message per element" — see the concurrency model's
/// ordering guarantees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum InputMessage {
    /// Emitted by `BufferAndSendInput` once the threshold is crossed, or
    /// directly by a transport reader for non-buffered providers.
    UserAudio(Vec<u8>),
    /// A text user turn (e.g. DTMF-derived, or forwarded verbatim from a
    /// signaling `UserMessage`).
    UserText(String),
    Initialization(InitializationPayload),
    Configuration(ConfigurationPayload),
    Metadata(MetadataPayload),
    Metric(MetricPayload),
    Interruption(InterruptionKind),
    /// The terminal message of a session. `Recv()` never returns anything
    /// after this.
    Disconnection(DisconnectionPayload),
}

impl InputMessage {
    /// The variant name, used in the WARN log line emitted when a push
    /// is dropped because the channel is full.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserAudio(_) => "UserAudio",
            Self::UserText(_) => "UserText",
            Self::Initialization(_) => "Initialization",
            Self::Configuration(_) => "Configuration",
            Self::Metadata(_) => "Metadata",
            Self::Metric(_) => "Metric",
            Self::Interruption(_) => "Interruption",
            Self::Disconnection(_) => "Disconnection",
        }
    }
}

/// Messages that arrive on `OutputCh`, consumed by a transport's output
/// writer task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutputMessage {
    /// Exactly `OutputFrameSize` bytes of canonical-format audio, sliced
    /// by `BufferAndSendOutput`.
    AssistantAudio(Vec<u8>),
    AssistantText(String),
    Configuration(ConfigurationPayload),
    Initialization(InitializationPayload),
    UserMessage(UserContent),
    Metadata(MetadataPayload),
    Metric(MetricPayload),
    Error(ErrorPayload),
    Interruption(InterruptionKind),
    Directive(DirectiveKind),
    Disconnection(DisconnectionPayload),
}

impl OutputMessage {
    /// The variant name, used in the WARN log line emitted when a push
    /// is dropped because the channel is full.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AssistantAudio(_) => "AssistantAudio",
            Self::AssistantText(_) => "AssistantText",
            Self::Configuration(_) => "Configuration",
            Self::Initialization(_) => "Initialization",
            Self::UserMessage(_) => "UserMessage",
            Self::Metadata(_) => "Metadata",
            Self::Metric(_) => "Metric",
            Self::Error(_) => "Error",
            Self::Interruption(_) => "Interruption",
            Self::Directive(_) => "Directive",
            Self::Disconnection(_) => "Disconnection",
        }
    }
}

/// The argument accepted by `Streamer::send`, before the dispatch rules
/// in the component design (resample + buffer for audio, direct forward
/// for everything else, buffer-clear + `Clear` signal for interruptions)
/// have been applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SendMessage {
    /// Raw canonical-format assistant audio; resampled to the transport's
    /// native rate and handed to `BufferAndSendOutput`.
    AssistantAudio(Vec<u8>),
    AssistantText(String),
    Configuration(ConfigurationPayload),
    Initialization(InitializationPayload),
    UserMessage(UserContent),
    Metadata(MetadataPayload),
    Metric(MetricPayload),
    Error(ErrorPayload),
    Interruption(InterruptionKind),
    Directive(DirectiveKind),
    Disconnection(DisconnectionPayload),
}
