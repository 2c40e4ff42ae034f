//! Shared process state handed to every HTTP/WebSocket/gRPC handler:
//! configuration, the `CallContext` store, the RTP port pool and the
//! root logger.

use std::sync::Arc;

use callbridge_context::{CallContextStore, RtpPortPool};
use callbridge_proto::IceServerConfig;
use slog::Logger;
use tokio_util::sync::CancellationToken;

use crate::config::ServerSettings;
use crate::error::ServerError;

pub struct AppState {
    pub settings: ServerSettings,
    pub context_store: CallContextStore,
    pub rtp_pool: RtpPortPool,
    pub logger: Logger,
    /// Cancelled once on process shutdown; every session's caller-context
    /// watcher (§4.8) bridges this to its streamer's `Close()`.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub async fn new(settings: ServerSettings, logger: Logger) -> Result<Arc<Self>, ServerError> {
        let context_store = CallContextStore::connect(&settings.redis_url)
            .map_err(|e| ServerError::Config(e.to_string()))?;
        let rtp_pool_config = callbridge_context::RtpPoolConfig {
            start_port: settings.rtp_ports.start,
            end_port: settings.rtp_ports.end,
            allocation_ttl: settings.rtp_ports.allocation_ttl,
        };
        let rtp_pool = RtpPortPool::connect(&settings.redis_url, rtp_pool_config)
            .map_err(|e| ServerError::Config(e.to_string()))?;
        rtp_pool.init().await?;

        Ok(Arc::new(Self {
            settings,
            context_store,
            rtp_pool,
            logger,
            shutdown: CancellationToken::new(),
        }))
    }

    #[must_use]
    pub fn ice_servers(&self) -> Vec<IceServerConfig> {
        self.settings
            .ice_servers
            .iter()
            .map(|s| IceServerConfig {
                urls: s.urls.clone(),
                username: s.username.clone(),
                credential: s.credential.clone(),
            })
            .collect()
    }
}
