//! Configuration loading from environment.

use std::env;
use std::time::Duration;

use checkout_hex::outbound::GatewayConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub gateway: GatewayConfig,
    /// Secret for verifying gateway event checksums; unsigned events are
    /// accepted when unset.
    pub events_secret: Option<String>,
    pub rate_limit_per_minute: u32,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{key} environment variable is required"))
        };

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid PORT: {e}"))?;

        let timeout_secs: u64 = lookup("GATEWAY_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid GATEWAY_TIMEOUT_SECS: {e}"))?;

        let rate_limit_per_minute = lookup("RATE_LIMIT_PER_MINUTE")
            .unwrap_or_else(|| "100".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid RATE_LIMIT_PER_MINUTE: {e}"))?;

        Ok(Self {
            port,
            database_url: required("DATABASE_URL")?,
            gateway: GatewayConfig {
                base_url: required("GATEWAY_BASE_URL")?,
                private_key: required("GATEWAY_PRIVATE_KEY")?,
                integrity_secret: required("GATEWAY_INTEGRITY_SECRET")?,
                timeout: Duration::from_secs(timeout_secs),
            },
            events_secret: lookup("GATEWAY_EVENTS_SECRET").filter(|v| !v.is_empty()),
            rate_limit_per_minute,
        })
    }
}
