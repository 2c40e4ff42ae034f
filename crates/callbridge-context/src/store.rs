//! The `CallContext` store (§4.5), Redis-backed: a hash per context id,
//! with `Claim`'s conditional transition done by a Lua script so the
//! database enforces "exactly one claim succeeds" rather than an
//! application-level lock.

use std::collections::HashMap;

use chrono::Utc;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use uuid::Uuid;

use crate::error::ContextError;
use crate::model::{CallContext, UPDATABLE_FIELDS};

const CLAIM_SCRIPT: &str = r"
local status = redis.call('HGET', KEYS[1], 'status')
if status == 'pending' or status == 'queued' then
  redis.call('HSET', KEYS[1], 'status', 'claimed', 'updated_at', ARGV[1])
  return 1
end
return 0
";

fn key(context_id: &str) -> String {
    format!("callcontext:{context_id}")
}

pub struct CallContextStore {
    pool: Pool,
}

impl CallContextStore {
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds a connection pool from a `redis://` URL and wraps it.
    pub fn connect(redis_url: &str) -> Result<Self, ContextError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ContextError::Pool(e.to_string()))?;
        Ok(Self::new(pool))
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, ContextError> {
        Ok(self.pool.get().await?)
    }

    /// Persists `cc`, assigning a UUID if `context_id` is empty.
    /// Returns the (possibly newly assigned) context id.
    pub async fn save(&self, mut cc: CallContext) -> Result<String, ContextError> {
        if cc.context_id.is_empty() {
            cc.context_id = Uuid::new_v4().to_string();
        }
        let mut conn = self.conn().await?;
        let pairs = cc.to_hash_fields();
        let _: () = conn.hset_multiple(key(&cc.context_id), &pairs).await?;
        Ok(cc.context_id)
    }

    /// Retrieves a call context regardless of status — asynchronous
    /// provider callbacks can arrive after the call has ended.
    pub async fn get(&self, context_id: &str) -> Result<CallContext, ContextError> {
        let mut conn = self.conn().await?;
        let fields: HashMap<String, String> = conn.hgetall(key(context_id)).await?;
        if fields.is_empty() {
            return Err(ContextError::NotFound(context_id.to_string()));
        }
        CallContext::from_hash_fields(context_id, &fields)
    }

    /// Atomically transitions `pending`/`queued` → `claimed`. Exactly one
    /// concurrent caller succeeds; the rest see [`ContextError::NotClaimable`].
    pub async fn claim(&self, context_id: &str) -> Result<CallContext, ContextError> {
        let mut conn = self.conn().await?;
        let script = redis::Script::new(CLAIM_SCRIPT);
        let claimed: i32 = script
            .key(key(context_id))
            .arg(Utc::now().to_rfc3339())
            .invoke_async(&mut conn)
            .await?;
        if claimed == 0 {
            return Err(ContextError::NotClaimable(context_id.to_string()));
        }
        self.get(context_id).await
    }

    /// Marks a context completed. The row remains for late callbacks.
    pub async fn complete(&self, context_id: &str) -> Result<(), ContextError> {
        let mut conn = self.conn().await?;
        let _: () = conn.hset(key(context_id), "status", "completed").await?;
        Ok(())
    }

    /// Updates a single whitelisted field.
    pub async fn update_field(&self, context_id: &str, field: &str, value: &str) -> Result<(), ContextError> {
        if !UPDATABLE_FIELDS.contains(&field) {
            return Err(ContextError::NotUpdatable(field.to_string()));
        }
        let mut conn = self.conn().await?;
        let _: () = conn.hset(key(context_id), field, value).await?;
        Ok(())
    }

    /// Removes the row. Intended only for TTL-driven garbage collection.
    pub async fn delete(&self, context_id: &str) -> Result<(), ContextError> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(key(context_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_field_rejects_non_whitelisted_names() {
        assert!(!UPDATABLE_FIELDS.contains(&"auth_token"));
        assert!(UPDATABLE_FIELDS.contains(&"channel_uuid"));
        assert!(UPDATABLE_FIELDS.contains(&"status"));
        assert!(UPDATABLE_FIELDS.contains(&"provider"));
    }

    // Store-level behavior (save/get/claim race/update/delete) requires a
    // running redis instance and is exercised in
    // `callbridge-server`'s integration tests against a test redis
    // container, not here.
}
