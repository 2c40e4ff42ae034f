//! Server-level error type: wraps the failures that can occur wiring up
//! the HTTP/WebSocket/gRPC surfaces and the per-session supervisor.

use derive_more::Display;

use callbridge_context::ContextError;

#[derive(Debug, Display)]
pub enum ServerError {
    #[display(fmt = "configuration error: {}", _0)]
    Config(String),
    #[display(fmt = "call context error: {}", _0)]
    Context(String),
    #[display(fmt = "unknown provider: {}", _0)]
    UnknownProvider(String),
    #[display(fmt = "missing credential for provider: {}", _0)]
    MissingCredential(String),
}

impl std::error::Error for ServerError {}

impl From<ContextError> for ServerError {
    fn from(e: ContextError) -> Self {
        Self::Context(e.to_string())
    }
}
