use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CONFIG_PATH: &str = "./config.json";
const DEFAULT_PUB_PATH: &str = "./pub";
const DEFAULT_CHECK_INTERVAL_MINUTES: u64 = 30;
const DEFAULT_CHECK_JITTER_SECS: u64 = 10;
const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// JSON file holding the chain list.
    pub config_path: PathBuf,
    /// Directory the per-chain documents are written to and served from.
    pub pub_path: PathBuf,
    pub check_interval: Duration,
    /// Upper bound of the random delay added to every interval.
    pub check_jitter: Duration,
    /// Producers verified in parallel per chain.
    pub concurrency: usize,
    /// Pushgateway base URL (None = metrics disabled)
    pub prometheus_endpoint: Option<String>,
    pub checker_host: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ServerConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(var("PORT"), "PORT", DEFAULT_PORT)?;
        let config_path = var("CONFIG_PATH").unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let pub_path = var("PUB_PATH").unwrap_or_else(|| DEFAULT_PUB_PATH.to_string());

        let interval_minutes: u64 = parse_or(
            var("CHECK_INTERVAL"),
            "CHECK_INTERVAL",
            DEFAULT_CHECK_INTERVAL_MINUTES,
        )?;
        if interval_minutes == 0 {
            return Err(ServerConfigError::Invalid {
                key: "CHECK_INTERVAL",
                value: "0".to_string(),
            });
        }
        let jitter_secs: u64 = parse_or(
            var("CHECK_JITTER_SECS"),
            "CHECK_JITTER_SECS",
            DEFAULT_CHECK_JITTER_SECS,
        )?;
        let concurrency: usize = parse_or(var("CONCURRENCY"), "CONCURRENCY", DEFAULT_CONCURRENCY)?;

        let prometheus_endpoint = var("PROMETHEUS_ENDPOINT");
        if let Some(ref endpoint) = prometheus_endpoint {
            url::Url::parse(endpoint)
                .map_err(|_| ServerConfigError::InvalidUrl(endpoint.clone()))?;
        }

        let checker_host = var("CHECKER_HOST")
            .or_else(|| var("HOSTNAME"))
            .unwrap_or_else(|| "localhost".to_string());

        Ok(Self {
            port,
            config_path: PathBuf::from(config_path),
            pub_path: PathBuf::from(pub_path),
            check_interval: Duration::from_secs(interval_minutes * 60),
            check_jitter: Duration::from_secs(jitter_secs),
            concurrency: concurrency.max(1),
            prometheus_endpoint,
            checker_host,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ServerConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ServerConfigError::Invalid { key, value: v }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}
