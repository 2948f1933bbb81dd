/// file: src/config.rs
/// description: runtime configuration for both channel clients
use crate::backoff::RetryPolicy;
use crate::cli::Args;
use anyhow::Result;
use std::time::Duration;
use url::Url;

pub const DEFAULT_PUSH_URL: &str = "http://127.0.0.1:8080/api/events/stream";
pub const DEFAULT_DUPLEX_URL: &str = "ws://127.0.0.1:8080/api/ws";

pub const PUSH_URL_ENV: &str = "DRIFTWIRE_PUSH_URL";
pub const DUPLEX_URL_ENV: &str = "DRIFTWIRE_DUPLEX_URL";

#[derive(Debug, Clone)]
pub struct Config {
    pub push: PushChannelConfig,
    pub duplex: DuplexChannelConfig,
    pub metrics: MetricsConfig,
}

/// Unidirectional (server-push) channel settings.
#[derive(Debug, Clone)]
pub struct PushChannelConfig {
    pub url: Url,
    pub auto_connect: bool,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub buffer_capacity: usize,
}

/// Bidirectional (WebSocket) channel settings.
#[derive(Debug, Clone)]
pub struct DuplexChannelConfig {
    pub url: Url,
    pub auto_connect: bool,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub heartbeat_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl PushChannelConfig {
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.reconnect_delay, self.reconnect_attempts)
    }
}

impl DuplexChannelConfig {
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.reconnect_delay, self.reconnect_attempts)
    }
}

impl Default for PushChannelConfig {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_PUSH_URL).expect("default push url is valid"),
            auto_connect: true,
            reconnect_attempts: 10,
            reconnect_delay: Duration::from_millis(1000),
            buffer_capacity: 100,
        }
    }
}

impl Default for DuplexChannelConfig {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_DUPLEX_URL).expect("default duplex url is valid"),
            auto_connect: true,
            reconnect_attempts: 10,
            reconnect_delay: Duration::from_millis(1000),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

/// Flag value if given, otherwise the environment override, otherwise the
/// built-in default.
fn resolve_url(flag: &Option<String>, env_var: &str, fallback: &str) -> Result<Url> {
    let raw = match flag {
        Some(value) => value.clone(),
        None => std::env::var(env_var).unwrap_or_else(|_| fallback.to_string()),
    };
    Ok(Url::parse(&raw)?)
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self> {
        Ok(Config {
            push: PushChannelConfig {
                url: resolve_url(&args.push_url, PUSH_URL_ENV, DEFAULT_PUSH_URL)?,
                auto_connect: true,
                reconnect_attempts: args.reconnect_attempts,
                reconnect_delay: Duration::from_millis(args.reconnect_delay),
                buffer_capacity: args.buffer_capacity,
            },
            duplex: DuplexChannelConfig {
                url: resolve_url(&args.duplex_url, DUPLEX_URL_ENV, DEFAULT_DUPLEX_URL)?,
                auto_connect: true,
                reconnect_attempts: args.reconnect_attempts,
                reconnect_delay: Duration::from_millis(args.reconnect_delay),
                heartbeat_interval: Duration::from_millis(args.heartbeat_interval),
            },
            metrics: MetricsConfig {
                enabled: args.metrics,
                port: args.metrics_port,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_overrides_env_and_default() {
        let url = resolve_url(
            &Some("http://example.net/stream".to_string()),
            "DRIFTWIRE_TEST_UNSET",
            DEFAULT_PUSH_URL,
        )
        .unwrap();
        assert_eq!(url.as_str(), "http://example.net/stream");
    }

    #[test]
    fn falls_back_to_built_in_default() {
        let url = resolve_url(&None, "DRIFTWIRE_TEST_UNSET", DEFAULT_PUSH_URL).unwrap();
        assert_eq!(url.as_str(), DEFAULT_PUSH_URL);
    }

    #[test]
    fn invalid_urls_are_refused() {
        assert!(resolve_url(&Some("not a url".to_string()), "X", DEFAULT_PUSH_URL).is_err());
    }
}
