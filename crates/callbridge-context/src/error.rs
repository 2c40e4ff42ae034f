//! Errors the `CallContext` store and RTP port allocator can return.

use derive_more::Display;

#[derive(Debug, Display)]
pub enum ContextError {
    #[display(fmt = "redis error: {}", _0)]
    Redis(redis::RedisError),
    #[display(fmt = "redis pool error: {}", _0)]
    Pool(String),
    #[display(fmt = "no call context found for {}", _0)]
    NotFound(String),
    #[display(fmt = "call context {} is not claimable (not found, or already claimed)", _0)]
    NotClaimable(String),
    #[display(fmt = "field {:?} is not updatable", _0)]
    NotUpdatable(String),
    #[display(fmt = "stored call context is corrupt: {}", _0)]
    Corrupt(String),
}

impl std::error::Error for ContextError {}

impl From<redis::RedisError> for ContextError {
    fn from(e: redis::RedisError) -> Self {
        Self::Redis(e)
    }
}

impl From<deadpool_redis::PoolError> for ContextError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        Self::Pool(e.to_string())
    }
}
