//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8088";
const DEFAULT_DB_PATH: &str = "./db/fundflow.db";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    /// Empty means any origin
    pub cors_allow_origins: Vec<String>,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("FF_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .context("FF_LISTEN_ADDR must be a socket address such as 127.0.0.1:8088")?;

        let db_path = lookup("FF_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let cors_allow_origins = lookup("FF_CORS_ALLOW_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty() && origin != "*")
                    .collect()
            })
            .unwrap_or_default();

        let timeout_ms = match lookup("FF_REQUEST_TIMEOUT_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .context("FF_REQUEST_TIMEOUT_MS must be a whole number of milliseconds")?,
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        };

        let log_format = match lookup("FF_LOG_FORMAT").as_deref().map(str::trim) {
            Some("json") => LogFormat::Json,
            Some("pretty") | Some("") | None => LogFormat::Pretty,
            Some(other) => anyhow::bail!("FF_LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        };

        Ok(Self {
            listen_addr,
            db_path,
            cors_allow_origins,
            request_timeout: Duration::from_millis(timeout_ms),
            log_format,
        })
    }
}
