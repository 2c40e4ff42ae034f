//! Layered server configuration: defaults → file → environment, built on
//! the `config` crate the way the teacher's root `Cargo.toml` pulls in
//! `config`/`serde_yaml`/`humantime-serde`.

use std::collections::HashMap;
use std::time::Duration;

use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Display)]
pub enum ConfigLoadError {
    #[display(fmt = "failed to load configuration: {}", _0)]
    Source(String),
    #[display(fmt = "failed to deserialize configuration: {}", _0)]
    Deserialize(String),
}

impl std::error::Error for ConfigLoadError {}

impl From<config::ConfigError> for ConfigLoadError {
    fn from(e: config::ConfigError) -> Self {
        Self::Source(e.to_string())
    }
}

/// One ICE server entry, as loaded from config (`STREAMING_BRIDGE__ICE_SERVERS`
/// or the config file's `ice_servers` list).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IceServerSettings {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RtpPortRange {
    pub start: u16,
    pub end: u16,
    #[serde(with = "humantime_serde")]
    pub allocation_ttl: Duration,
}

impl Default for RtpPortRange {
    fn default() -> Self {
        Self {
            start: 30_000,
            end: 40_000,
            allocation_ttl: Duration::from_secs(600),
        }
    }
}

/// Per-provider WebSocket telephony credentials, keyed by provider name
/// (`twilio`, `exotel`, `vonage`, `asterisk`).
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ProviderSettings {
    #[serde(default)]
    pub credentials: HashMap<String, CredentialSettings>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialSettings {
    pub id: String,
    pub secret: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default)]
    pub rtp_ports: RtpPortRange,
    #[serde(default)]
    pub ice_servers: Vec<IceServerSettings>,
    #[serde(default)]
    pub providers: ProviderSettings,
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_grpc_addr() -> String {
    "0.0.0.0:8443".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

impl ServerSettings {
    /// Loads settings layered defaults → optional file → `STREAMING_BRIDGE`-
    /// prefixed environment variables (double-underscore nesting, e.g.
    /// `STREAMING_BRIDGE__RTP_PORTS__START=31000`).
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&Self::defaults())?,
        );
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("STREAMING_BRIDGE")
                .separator("__")
                .try_parsing(true),
        );
        builder
            .build()?
            .try_deserialize()
            .map_err(|e| ConfigLoadError::Deserialize(e.to_string()))
    }

    fn defaults() -> Self {
        Self {
            http_addr: default_http_addr(),
            grpc_addr: default_grpc_addr(),
            redis_url: default_redis_url(),
            rtp_ports: RtpPortRange::default(),
            ice_servers: Vec::new(),
            providers: ProviderSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_without_file_falls_back_to_defaults() {
        let settings = ServerSettings::load(None).unwrap();
        assert_eq!(settings.http_addr, "0.0.0.0:8080");
        assert_eq!(settings.rtp_ports.start, 30_000);
    }
}
