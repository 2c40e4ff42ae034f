//! Per-session supervisor (§4.8): owns a streamer's lifetime, bridges an
//! external cancellation source to its graceful `Close()`, and runs a
//! session's initial setup tasks in parallel with fail-fast semantics.

use std::future::Future;
use std::sync::Arc;

use callbridge_core::Streamer;
use futures::future::try_join_all;
use slog::{info, Logger};
use tokio_util::sync::CancellationToken;

/// Spawns the caller-context watcher: when `external` is cancelled (HTTP
/// client disconnect, process shutdown, …), the streamer is closed.
/// `Close()` is idempotent, so this races harmlessly against a close
/// already in flight from the streamer's own transport loop.
pub fn watch_external_cancellation(streamer: Arc<dyn Streamer>, external: CancellationToken, logger: Logger) {
    tokio::spawn(async move {
        tokio::select! {
            () = external.cancelled() => {
                info!(logger, "external cancellation received, closing session");
                streamer.close().await;
            }
            () = streamer.context().cancelled() => {}
        }
    });
}

/// Runs a session's initial setup tasks concurrently, failing fast: the
/// first error cancels the remaining futures' results (they still run to
/// completion — `try_join_all` itself doesn't abort siblings, but the
/// caller treats any single error as fatal to session setup).
pub async fn run_setup<E, F>(tasks: Vec<F>) -> Result<(), E>
where
    F: Future<Output = Result<(), E>>,
{
    try_join_all(tasks).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use callbridge_core::{BaseStreamer, SendError};
    use callbridge_proto::{InputMessage, SendMessage, StreamerConfig};
    use async_trait::async_trait;
    use slog::{o, Drain};

    struct StubStreamer(Arc<BaseStreamer>);

    #[async_trait]
    impl Streamer for StubStreamer {
        async fn recv(&self) -> Option<InputMessage> {
            self.0.recv().await
        }
        async fn send(&self, _msg: SendMessage) -> Result<(), SendError> {
            Ok(())
        }
        fn context(&self) -> CancellationToken {
            self.0.context()
        }
        async fn close(&self) {
            self.0.cancel();
        }
    }

    fn test_logger() -> Logger {
        Logger::root(slog::Discard.fuse(), o!())
    }

    #[tokio::test]
    async fn external_cancellation_closes_the_streamer() {
        let base = Arc::new(BaseStreamer::new(
            test_logger(),
            StreamerConfig::builder().output_frame_size(160).build().unwrap(),
        ));
        let streamer: Arc<dyn Streamer> = Arc::new(StubStreamer(base.clone()));
        let external = CancellationToken::new();

        watch_external_cancellation(streamer.clone(), external.clone(), test_logger());
        external.cancel();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(base.context().is_cancelled());
    }

    #[tokio::test]
    async fn run_setup_propagates_first_error() {
        let tasks: Vec<std::pin::Pin<Box<dyn Future<Output = Result<(), &'static str>> + Send>>> = vec![
            Box::pin(async { Ok(()) }),
            Box::pin(async { Err("setup failed") }),
        ];
        let result = run_setup(tasks).await;
        assert_eq!(result, Err("setup failed"));
    }
}
