use std::time::Duration;

use crate::hub::{HubConfig, DEFAULT_QUEUE_CAPACITY};

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub hub: HubConfig,
}

const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

/// A session's close handshake may take a full write timeout, so shutdown has
/// to wait at least that long before it starts dropping sockets.
fn clamp_shutdown_timeout(mut hub: HubConfig) -> HubConfig {
    if hub.shutdown_timeout <= hub.write_timeout {
        let raised = hub.write_timeout + Duration::from_secs(1);
        tracing::warn!(
            shutdown_timeout = ?hub.shutdown_timeout,
            write_timeout = ?hub.write_timeout,
            "shutdown timeout must exceed write timeout, using {raised:?}"
        );
        hub.shutdown_timeout = raised;
    }
    hub
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let jwt_secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET is required to sign and verify tokens");

        let defaults = HubConfig::default();
        let hub = HubConfig {
            queue_capacity: env_parse::<usize>("RESTWS_SESSION_QUEUE")
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            write_timeout: env_parse::<u64>("RESTWS_WRITE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.write_timeout),
            shutdown_timeout: env_parse::<u64>("RESTWS_SHUTDOWN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            ..defaults
        };
        let hub = clamp_shutdown_timeout(hub);

        Self {
            port: env_parse("PORT").unwrap_or(5050),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:restws.db?mode=rwc".to_string()),
            jwt_secret,
            token_ttl_hours: env_parse::<i64>("RESTWS_TOKEN_TTL_HOURS")
                .filter(|h| *h > 0 && *h <= MAX_TOKEN_TTL_HOURS)
                .unwrap_or(48),
            hub,
        }
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }
}
