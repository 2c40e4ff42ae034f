//! [`BaseStreamer`]: the buffer/channel/lifecycle primitive every concrete
//! transport composes by delegation (§4.1, §9 "embedded base with mixin
//! behavior" — modeled here as a struct concrete transports hold and
//! delegate to, not as a base class).

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use callbridge_proto::{
    DisconnectionPayload, DisconnectionReason, InputMessage, OutputMessage,
    SendMessage, StreamerConfig,
};
use derive_more::Display;
use slog::{warn, Logger};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::frame_pool::FramePool;

/// Errors `Streamer::send` can return. Per the error handling design,
/// runtime transport/codec failures are absorbed into a `Disconnection`
/// rather than returned here; this type exists for the one case the
/// design calls out explicitly — an output resample failure should
/// "return the error to `Send` so the caller can react".
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum SendError {
    /// Resampling assistant audio to the transport's native format
    /// failed.
    #[display(fmt = "resample failed: {}", _0)]
    ResampleFailed(String),
    /// The session is already closed; the message was not accepted.
    #[display(fmt = "streamer is closed")]
    Closed,
}

impl std::error::Error for SendError {}

/// The external façade the assistant service sees: `Recv`, `Send`,
/// `Context`, `Close` (§4.8, §6). All concrete streamers implement this
/// and delegate the hard parts to a held [`BaseStreamer`].
#[async_trait]
pub trait Streamer: Send + Sync {
    /// Reads the next input message, or `None` at end-of-stream.
    async fn recv(&self) -> Option<InputMessage>;

    /// Accepts a message bound for the caller.
    async fn send(&self, msg: SendMessage) -> Result<(), SendError>;

    /// The session-scoped cancellation handle.
    fn context(&self) -> CancellationToken;

    /// Idempotent teardown.
    async fn close(&self);
}

/// Transport-agnostic buffer/channel/lifecycle primitive (§4.1).
///
/// Owns two bounded typed channels, a single-capacity flush signal, two
/// pre-allocated byte buffers, a scoped cancellation handle, and a
/// latching closed flag. Never touches a transport directly.
#[derive(Debug)]
pub struct BaseStreamer {
    logger: Logger,
    config: StreamerConfig,
    ctx: CancellationToken,
    closed: StdMutex<bool>,

    input_tx: mpsc::Sender<InputMessage>,
    input_rx: AsyncMutex<mpsc::Receiver<InputMessage>>,
    output_tx: mpsc::Sender<OutputMessage>,
    output_rx: AsyncMutex<mpsc::Receiver<OutputMessage>>,
    flush_tx: mpsc::Sender<()>,
    flush_rx: AsyncMutex<mpsc::Receiver<()>>,

    input_buffer: StdMutex<Vec<u8>>,
    output_buffer: StdMutex<Vec<u8>>,

    frame_pool: Arc<FramePool>,
}

impl BaseStreamer {
    /// Builds a new `BaseStreamer` from its config, deriving channel
    /// capacities and pre-allocated buffer sizes from it.
    #[must_use]
    pub fn new(logger: Logger, config: StreamerConfig) -> Self {
        Self::with_frame_pool(
            logger,
            config,
            Arc::new(FramePool::new(config.output_frame_size())),
        )
    }

    /// Builds a new `BaseStreamer` sharing a caller-supplied frame pool
    /// (the process-wide pool, in production use).
    #[must_use]
    pub fn with_frame_pool(
        logger: Logger,
        config: StreamerConfig,
        frame_pool: Arc<FramePool>,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::channel(config.input_channel_size());
        let (output_tx, output_rx) = mpsc::channel(config.output_channel_size());
        let (flush_tx, flush_rx) = mpsc::channel(1);

        let input_capacity = if config.input_buffer_threshold() > 0 {
            config.input_buffer_threshold() * 2
        } else {
            4096
        };
        let output_capacity = if config.output_buffer_threshold() > 0 {
            config.output_buffer_threshold() + config.output_frame_size()
        } else {
            4096
        };

        Self {
            logger,
            config,
            ctx: CancellationToken::new(),
            closed: StdMutex::new(false),
            input_tx,
            input_rx: AsyncMutex::new(input_rx),
            output_tx,
            output_rx: AsyncMutex::new(output_rx),
            flush_tx,
            flush_rx: AsyncMutex::new(flush_rx),
            input_buffer: StdMutex::new(Vec::with_capacity(input_capacity)),
            output_buffer: StdMutex::new(Vec::with_capacity(output_capacity)),
            frame_pool,
        }
    }

    /// The streamer's config.
    #[must_use]
    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    /// The shared frame pool backing `BufferAndSendOutput`.
    #[must_use]
    pub fn frame_pool(&self) -> &Arc<FramePool> {
        &self.frame_pool
    }

    /// The session-scoped cancellation handle.
    #[must_use]
    pub fn context(&self) -> CancellationToken {
        self.ctx.clone()
    }

    /// Cancels the session-scoped context.
    pub fn cancel(&self) {
        self.ctx.cancel();
    }

    /// Whether `PushDisconnection` has already latched closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Non-blocking send to `InputCh`. Drops and logs a WARN on a full
    /// channel; never blocks.
    pub fn push_input(&self, msg: InputMessage) {
        let kind = msg.kind();
        if let Err(mpsc::error::TrySendError::Full(_)) = self.input_tx.try_send(msg) {
            warn!(self.logger, "dropping input message, channel full"; "type" => kind);
        }
    }

    /// Non-blocking send to `OutputCh`. Drops and logs a WARN on a full
    /// channel; never blocks.
    pub fn push_output(&self, msg: OutputMessage) {
        let kind = msg.kind();
        if let Err(mpsc::error::TrySendError::Full(_)) = self.output_tx.try_send(msg) {
            warn!(self.logger, "dropping output message, channel full"; "type" => kind);
        }
    }

    /// Reads the next input message. Returns `None` (end-of-stream) when
    /// either `InputCh` is closed or the scoped context is cancelled.
    ///
    /// A `Disconnection` queued just before cancellation is still
    /// delivered: the channel receive is polled with priority over the
    /// cancellation signal, so an already-available message always wins.
    pub async fn recv(&self) -> Option<InputMessage> {
        let mut rx = self.input_rx.lock().await;
        tokio::select! {
            biased;
            msg = rx.recv() => msg,
            () = self.ctx.cancelled() => {
                // A message may have been queued in the same instant the
                // context was cancelled; give it one last non-blocking
                // chance before declaring end-of-stream.
                match rx.try_recv() {
                    Ok(msg) => Some(msg),
                    Err(_) => None,
                }
            }
        }
    }

    /// Reads the next output message, or `None` once `OutputCh` is closed
    /// (i.e. this `BaseStreamer` has been dropped from the producer side)
    /// and no cancellation has occurred. Unlike `recv`, a cancelled
    /// context does not by itself end the output stream — buffered
    /// assistant audio queued before cancellation should still drain to
    /// the transport.
    pub async fn recv_output(&self) -> Option<OutputMessage> {
        let mut rx = self.output_rx.lock().await;
        rx.recv().await
    }

    /// Appends `bytes` to the input buffer. Once its length reaches
    /// `InputBufferThreshold`, the buffer is swapped for a fresh one and
    /// emitted as a single `UserAudio` message — no copy, the old buffer
    /// becomes the message's sole owner.
    pub fn buffer_and_send_input(&self, bytes: &[u8]) {
        let mut buf = self.input_buffer.lock().unwrap_or_else(|e| e.into_inner());
        buf.extend_from_slice(bytes);
        if buf.len() < self.config.input_buffer_threshold() {
            return;
        }
        let capacity = buf.capacity();
        let full = std::mem::replace(&mut *buf, Vec::with_capacity(capacity));
        drop(buf);
        self.push_input(InputMessage::UserAudio(full));
    }

    /// Appends `bytes` to the output buffer. Once its length reaches
    /// `OutputBufferThreshold`, slices off as many complete
    /// `OutputFrameSize` frames as possible and emits each as an
    /// `AssistantAudio` message, retaining any remainder.
    pub fn buffer_and_send_output(&self, bytes: &[u8]) {
        let mut buf = self.output_buffer.lock().unwrap_or_else(|e| e.into_inner());
        buf.extend_from_slice(bytes);
        if buf.len() < self.config.output_buffer_threshold() {
            return;
        }
        let frame_size = self.config.output_frame_size();
        let mut frames = Vec::new();
        while buf.len() >= frame_size {
            let mut frame = self.frame_pool.acquire();
            frame.copy_from_slice(&buf[..frame_size]);
            buf.drain(..frame_size);
            frames.push(frame);
        }
        drop(buf);
        for frame in frames {
            self.push_output(OutputMessage::AssistantAudio(frame));
        }
    }

    /// Resets the input buffer to empty, then drains `InputCh`
    /// non-blockingly.
    pub fn clear_input_buffer(&self) {
        self.input_buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        // Draining requires the receiver; try_lock avoids deadlocking
        // against a concurrent `recv()` that's merely awaiting a message
        // (try_lock just skips the drain that round, which is harmless —
        // nothing was queued for it to race against).
        if let Ok(mut rx) = self.input_rx.try_lock() {
            while rx.try_recv().is_ok() {}
        }
    }

    /// Resets the output buffer to empty. Signals the flush channel
    /// *before* draining `OutputCh`, so a racing consumer cannot dequeue
    /// a frame between the drain and the signal.
    pub fn clear_output_buffer(&self) {
        self.output_buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        let _ = self.flush_tx.try_send(());
        if let Ok(mut rx) = self.output_rx.try_lock() {
            while rx.try_recv().is_ok() {}
        }
    }

    /// Idempotent disconnection. Under the close-flag lock: a no-op if
    /// already closed; otherwise latches closed and pushes a
    /// `Disconnection` — so any message pushed before this call is
    /// received by the consumer before it.
    pub fn push_disconnection(&self, reason: DisconnectionReason) {
        let mut closed = self.closed.lock().unwrap_or_else(|e| e.into_inner());
        if *closed {
            return;
        }
        *closed = true;
        drop(closed);
        self.push_input(InputMessage::Disconnection(DisconnectionPayload::new(
            reason,
        )));
    }

    /// Scoped exclusive access to the input buffer.
    pub fn with_input_buffer<R>(&self, f: impl FnOnce(&mut Vec<u8>) -> R) -> R {
        let mut buf = self.input_buffer.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut buf)
    }

    /// Scoped exclusive access to the output buffer.
    pub fn with_output_buffer<R>(&self, f: impl FnOnce(&mut Vec<u8>) -> R) -> R {
        let mut buf = self.output_buffer.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut buf)
    }

    /// Waits for the next flush signal (coalesced — multiple signals
    /// before a receive collapse to one wakeup).
    pub async fn recv_flush(&self) {
        let mut rx = self.flush_rx.lock().await;
        rx.recv().await;
    }

    /// The streamer's base logger.
    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

#[cfg(test)]
mod tests {
    use callbridge_proto::{AudioConfig, AudioFormat};
    use slog::{o, Drain};

    use super::*;

    fn test_logger() -> Logger {
        Logger::root(slog::Discard.fuse(), o!())
    }

    fn mulaw_8k() -> AudioConfig {
        AudioConfig {
            sample_rate_hz: 8000,
            format: AudioFormat::Mulaw8,
            channels: 1,
        }
    }

    #[tokio::test]
    async fn threshold_flush_mulaw_8k() {
        let cfg = StreamerConfig::builder()
            .input_audio_config(mulaw_8k())
            .build()
            .unwrap();
        let bs = BaseStreamer::new(test_logger(), cfg);

        bs.buffer_and_send_input(&[1u8; 300]);
        assert!(bs.recv_try().is_none());

        bs.buffer_and_send_input(&[2u8; 300]);
        let msg = bs.recv_try().expect("expected a flushed message");
        match msg {
            InputMessage::UserAudio(bytes) => assert_eq!(bytes.len(), 600),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn output_frame_slicing() {
        let cfg = StreamerConfig::builder()
            .output_frame_size(160)
            .output_buffer_threshold(480)
            .build()
            .unwrap();
        let bs = BaseStreamer::new(test_logger(), cfg);

        bs.buffer_and_send_output(&vec![9u8; 500]);
        let mut frames = Vec::new();
        while let Some(OutputMessage::AssistantAudio(f)) = bs.output_try() {
            frames.push(f);
        }
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.len() == 160));
        let residual = bs.with_output_buffer(|b| b.len());
        assert_eq!(residual, 20);

        bs.buffer_and_send_output(&vec![9u8; 460]);
        let mut frames2 = Vec::new();
        while let Some(OutputMessage::AssistantAudio(f)) = bs.output_try() {
            frames2.push(f);
        }
        assert_eq!(frames2.len(), 3);
    }

    #[tokio::test]
    async fn push_disconnection_is_idempotent_under_concurrency() {
        let cfg = StreamerConfig::builder()
            .output_frame_size(160)
            .build()
            .unwrap();
        let bs = Arc::new(BaseStreamer::new(test_logger(), cfg));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let bs = bs.clone();
            handles.push(tokio::spawn(async move {
                bs.push_disconnection(DisconnectionReason::Normal);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let mut disconnections = 0;
        while let Some(msg) = bs.recv_try() {
            if matches!(msg, InputMessage::Disconnection(_)) {
                disconnections += 1;
            }
        }
        assert_eq!(disconnections, 1);
    }

    #[tokio::test]
    async fn clear_buffers_reset_length_and_drain_channel() {
        let cfg = StreamerConfig::builder()
            .output_frame_size(160)
            .output_buffer_threshold(0)
            .build()
            .unwrap();
        let bs = BaseStreamer::new(test_logger(), cfg);

        bs.buffer_and_send_output(&[1u8; 160]);
        bs.buffer_and_send_output(&[1u8; 10]);
        bs.clear_output_buffer();

        assert_eq!(bs.with_output_buffer(|b| b.len()), 0);
        assert!(bs.output_try().is_none());
    }

    #[tokio::test]
    async fn recv_returns_disconnection_queued_just_before_cancel() {
        let cfg = StreamerConfig::builder()
            .output_frame_size(160)
            .build()
            .unwrap();
        let bs = BaseStreamer::new(test_logger(), cfg);

        bs.push_input(InputMessage::Metric(callbridge_proto::MetricPayload {
            name: "x".into(),
            value: 1.0,
            unit: None,
        }));
        bs.push_disconnection(DisconnectionReason::ClientDisconnect);
        bs.cancel();

        assert!(matches!(bs.recv().await, Some(InputMessage::Metric(_))));
        assert!(matches!(
            bs.recv().await,
            Some(InputMessage::Disconnection(_))
        ));
        assert!(bs.recv().await.is_none());
    }

    impl BaseStreamer {
        /// Test helper: non-blocking single-shot recv from `InputCh`.
        fn recv_try(&self) -> Option<InputMessage> {
            self.input_rx.try_lock().ok()?.try_recv().ok()
        }

        /// Test helper: non-blocking single-shot recv from `OutputCh`.
        fn output_try(&self) -> Option<OutputMessage> {
            self.output_rx.try_lock().ok()?.try_recv().ok()
        }
    }
}
