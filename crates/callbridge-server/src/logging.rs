//! Process-wide logger construction, following `mock/control-api`'s
//! `init_logger`: term decorator in development, JSON in production,
//! both wrapped in `slog_envlogger` (reads `RUST_LOG`) and `slog_async`.

use slog::{o, Drain};
use slog_scope::GlobalLoggerGuard;

/// Builds and installs the global `slog` logger, returning the guard that
/// must be kept alive for the process lifetime.
#[must_use]
pub fn init_logger(json: bool) -> GlobalLoggerGuard {
    let logger = if json {
        let drain = slog_json::Json::default(std::io::stdout()).fuse();
        let drain = slog_envlogger::new(drain).fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, o!())
    } else {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_envlogger::new(drain).fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, o!())
    };

    let scope_guard = slog_scope::set_global_logger(logger);
    slog_stdlog::init().ok();

    scope_guard
}
