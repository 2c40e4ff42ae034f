//! The distributed RTP port allocator (§4.6): two Redis sets under a
//! shared hash tag — `available` and `allocated:<instanceID>` — with
//! allocate/release done by atomic scripts so the pool is safe to share
//! across SIP-handling processes.

use std::time::Duration;

use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;

use crate::error::ContextError;

/// Instance identifier: `<hostname>:<pid>`.
#[must_use]
pub fn instance_id() -> String {
    let hostname = hostname_or_unknown();
    format!("{hostname}:{}", std::process::id())
}

fn hostname_or_unknown() -> String {
    gethostname::gethostname()
        .into_string()
        .unwrap_or_else(|_| "unknown-host".to_string())
}

const ALLOCATE_SCRIPT: &str = r"
local port = redis.call('SPOP', KEYS[1])
if not port then
  return nil
end
redis.call('SADD', KEYS[2], port)
redis.call('EXPIRE', KEYS[2], ARGV[1])
return port
";

const RELEASE_SCRIPT: &str = r"
redis.call('SREM', KEYS[2], ARGV[1])
redis.call('SADD', KEYS[1], ARGV[1])
return 1
";

#[derive(Clone, Copy, Debug)]
pub struct RtpPoolConfig {
    pub start_port: u16,
    pub end_port: u16,
    /// TTL refreshed on every `Allocate`, so an abandoned instance's
    /// ports eventually return to `available` even without `ReleaseAll`.
    pub allocation_ttl: Duration,
}

impl Default for RtpPoolConfig {
    fn default() -> Self {
        Self {
            start_port: 30000,
            end_port: 40000,
            allocation_ttl: Duration::from_secs(600),
        }
    }
}

pub struct RtpPortPool {
    pool: Pool,
    config: RtpPoolConfig,
    instance_id: String,
    available_key: String,
}

impl RtpPortPool {
    #[must_use]
    pub fn new(pool: Pool, config: RtpPoolConfig) -> Self {
        Self {
            pool,
            config,
            instance_id: instance_id(),
            available_key: "{rtp_ports}:available".to_string(),
        }
    }

    pub fn connect(redis_url: &str, config: RtpPoolConfig) -> Result<Self, ContextError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ContextError::Pool(e.to_string()))?;
        Ok(Self::new(pool, config))
    }

    fn allocated_key(&self) -> String {
        format!("{{rtp_ports}}:allocated:{}", self.instance_id)
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, ContextError> {
        Ok(self.pool.get().await?)
    }

    /// Populates `available` with every even port in `[start, end)` if
    /// it doesn't already exist, then runs crash recovery for this
    /// instance id.
    pub async fn init(&self) -> Result<(), ContextError> {
        let mut conn = self.conn().await?;
        let exists: bool = conn.exists(&self.available_key).await?;
        if !exists {
            let ports: Vec<u32> = (self.config.start_port..self.config.end_port)
                .step_by(2)
                .map(u32::from)
                .collect();
            if !ports.is_empty() {
                let _: () = conn.sadd(&self.available_key, ports).await?;
            }
        }
        self.recover_crashed(&mut conn).await
    }

    /// Returns any ports left in this instance's `allocated` set from a
    /// previous crashed process sharing the same `<hostname>:<pid>` back
    /// to `available`. Best-effort; the TTL is the backstop for
    /// instances that never resume.
    async fn recover_crashed(&self, conn: &mut deadpool_redis::Connection) -> Result<(), ContextError> {
        let leftover: Vec<u32> = conn.smembers(self.allocated_key()).await?;
        for port in leftover {
            let _: () = conn.srem(self.allocated_key(), port).await?;
            let _: () = conn.sadd(&self.available_key, port).await?;
        }
        Ok(())
    }

    /// Pops one even port from `available` into this instance's
    /// allocated set, atomically, refreshing its TTL.
    pub async fn allocate(&self) -> Result<u16, ContextError> {
        let mut conn = self.conn().await?;
        let script = redis::Script::new(ALLOCATE_SCRIPT);
        let port: Option<u32> = script
            .key(&self.available_key)
            .key(self.allocated_key())
            .arg(self.config.allocation_ttl.as_secs())
            .invoke_async(&mut conn)
            .await?;
        port.map(|p| p as u16)
            .ok_or_else(|| ContextError::Pool("no ports available".to_string()))
    }

    /// Returns a port from this instance's allocated set back to
    /// `available`, atomically.
    pub async fn release(&self, port: u16) -> Result<(), ContextError> {
        let mut conn = self.conn().await?;
        let script = redis::Script::new(RELEASE_SCRIPT);
        let _: i32 = script
            .key(&self.available_key)
            .key(self.allocated_key())
            .arg(u32::from(port))
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Total even-port count in range minus how many are currently
    /// available.
    pub async fn in_use(&self) -> Result<usize, ContextError> {
        let mut conn = self.conn().await?;
        let total = usize::from(self.config.end_port - self.config.start_port) / 2;
        let available: usize = conn.scard(&self.available_key).await?;
        Ok(total.saturating_sub(available))
    }

    /// Releases every port this instance holds, then drops its
    /// allocated-set key. Called on graceful shutdown.
    pub async fn release_all(&self) -> Result<(), ContextError> {
        let mut conn = self.conn().await?;
        let held: Vec<u32> = conn.smembers(self.allocated_key()).await?;
        if !held.is_empty() {
            let _: () = conn.sadd(&self.available_key, &held).await?;
        }
        let _: () = conn.del(self.allocated_key()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_includes_pid() {
        let id = instance_id();
        assert!(id.contains(&std::process::id().to_string()));
    }

    #[test]
    fn default_config_covers_an_even_port_range() {
        let cfg = RtpPoolConfig::default();
        assert_eq!(cfg.start_port % 2, 0);
        assert!(cfg.end_port > cfg.start_port);
    }

    // Allocate/release/crash-recovery behavior requires a running redis
    // instance; exercised in `callbridge-server`'s integration tests.
}
