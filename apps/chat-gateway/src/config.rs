use std::time::Duration;

/// Chat gateway configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// How often the connector sweeps closed connections. Never zero.
    pub sweep_interval: Duration,
    /// Write timeout for a single outbound frame. Slower connections are dropped. Never zero.
    pub ws_send_timeout: Duration,
    /// Optional bound on live connections.
    pub max_connections: Option<usize>,
    /// Snowflake worker id for message ids.
    pub worker_id: u16,
    /// Serve `POST /dev/sessions` for issuing session tokens locally.
    pub dev_sessions: bool,
}

impl Config {
    /// Load configuration from environment variables. Every variable is
    /// optional; malformed or zero values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            port: lookup("PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("LOG_LEVEL")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.log_level),
            sweep_interval: parsed("SWEEP_INTERVAL_SECS")
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            ws_send_timeout: parsed("WS_SEND_TIMEOUT_MS")
                .filter(|n| *n > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.ws_send_timeout),
            max_connections: parsed("MAX_CONNECTIONS")
                .filter(|n| *n > 0)
                .and_then(|n| usize::try_from(n).ok()),
            worker_id: lookup("WORKER_ID")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.worker_id),
            dev_sessions: lookup("DEV_SESSIONS")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.dev_sessions),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            log_level: "info".to_string(),
            sweep_interval: Duration::from_secs(60),
            ws_send_timeout: Duration::from_millis(5000),
            max_connections: None,
            worker_id: 0,
            dev_sessions: false,
        }
    }
}
