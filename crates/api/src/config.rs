//! Application configuration loaded from environment variables.

use std::str::FromStr;

use notifications::NotifierConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `DATABASE_URL` — PostgreSQL URL; unset keeps everything in memory
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `NOTIFY_WORKERS` — concurrent notification deliveries (default: `4`)
/// - `NOTIFY_QUEUE_CAPACITY` — queued notifications before dropping (default: `1024`)
/// - `ADMIN_EMAIL` — recipient of new-order alerts (default: `"admin@localhost"`)
/// - `CLIENT_URL` — base of password reset links (default: `"http://localhost:3000"`)
/// - `ALLOWED_ORIGINS` — comma-separated CORS origins (default: any)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub notify_workers: usize,
    pub notify_queue_capacity: usize,
    pub admin_email: String,
    pub client_url: String,
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(lookup("PORT")).unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            database_max_connections: parse_var(lookup("DATABASE_MAX_CONNECTIONS"))
                .unwrap_or(defaults.database_max_connections),
            notify_workers: parse_var(lookup("NOTIFY_WORKERS")).unwrap_or(defaults.notify_workers),
            notify_queue_capacity: parse_var(lookup("NOTIFY_QUEUE_CAPACITY"))
                .unwrap_or(defaults.notify_queue_capacity),
            admin_email: lookup("ADMIN_EMAIL").unwrap_or(defaults.admin_email),
            client_url: lookup("CLIENT_URL").unwrap_or(defaults.client_url),
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Sizing for the notification worker pool.
    pub fn notifier(&self) -> NotifierConfig {
        NotifierConfig {
            workers: self.notify_workers,
            queue_capacity: self.notify_queue_capacity,
        }
    }
}

fn parse_var<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        let notifier = NotifierConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            notify_workers: notifier.workers,
            notify_queue_capacity: notifier.queue_capacity,
            admin_email: "admin@localhost".to_string(),
            client_url: "http://localhost:3000".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}
