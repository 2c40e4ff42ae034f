#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod rtp_pool;
pub mod store;

pub use error::ContextError;
pub use model::{CallContext, CallDirection, CallStatus, UPDATABLE_FIELDS};
pub use rtp_pool::{instance_id, RtpPoolConfig, RtpPortPool};
pub use store::CallContextStore;
