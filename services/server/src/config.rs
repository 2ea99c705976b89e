use std::env;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Process-wide configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub log_level: String,
    pub database_url: String,
    pub service_token: Option<String>,
    pub long_poll_timeout: Duration,
    pub cursor_interval_seconds: u64,
    pub cursor_epoch_unix_seconds: u64,
    pub producer_state_ttl: Duration,
    pub sse_heartbeat_interval: Duration,
    pub max_waiters_per_stream: usize,
    pub max_append_bytes: usize,
    pub auto_create_on_append: bool,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            log_level: env_or("LOG_LEVEL", "info"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            service_token: env::var("STREAM_SERVICE_TOKEN")
                .ok()
                .filter(|s| !s.is_empty()),
            long_poll_timeout: Duration::from_secs(env_secs("LONG_POLL_TIMEOUT", 30)),
            cursor_interval_seconds: env_secs("CURSOR_INTERVAL_SECONDS", 20),
            cursor_epoch_unix_seconds: env::var("CURSOR_EPOCH")
                .ok()
                .and_then(|s| s.parse::<DateTime<Utc>>().ok())
                .map(|dt| dt.timestamp().max(0) as u64)
                .unwrap_or(protocol::cursor::DEFAULT_EPOCH_UNIX_SECONDS),
            producer_state_ttl: Duration::from_secs(env_secs(
                "PRODUCER_STATE_TTL",
                7 * 24 * 3600,
            )),
            sse_heartbeat_interval: Duration::from_secs(env_secs("SSE_HEARTBEAT_INTERVAL", 15)),
            max_waiters_per_stream: env_usize("MAX_WAITERS_PER_STREAM", 10_000),
            max_append_bytes: env_usize("MAX_APPEND_BYTES", 1024 * 1024),
            auto_create_on_append: env::var("AUTO_CREATE_ON_APPEND")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            sweep_interval: Duration::from_secs(env_secs("SWEEP_INTERVAL_SECONDS", 60)),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_secs(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_secs_falls_back_to_default_on_missing_or_invalid() {
        assert_eq!(env_secs("DSS_TEST_DOES_NOT_EXIST", 42), 42);
    }
}
