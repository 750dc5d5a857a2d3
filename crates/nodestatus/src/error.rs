use std::error::Error as _;

use thiserror::Error;

/// Failure of a single outbound HTTP operation.
///
/// The `Display` text is what ends up in report messages, so the variants
/// carry the short diagnostics operators expect ("Certificate error",
/// "Connection timed out") rather than the full `reqwest` chain.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Certificate error")]
    Certificate,

    #[error("Connection timed out")]
    Timeout,

    #[error("Response error: {status}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Transport(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl FetchError {
    /// Transport-level failures. Best-effort operations retry only these;
    /// critical operations retry every failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Timeout | FetchError::Transport(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return FetchError::Timeout;
        }
        if is_certificate_error(&e) {
            return FetchError::Certificate;
        }
        if let Some(status) = e.status() {
            return FetchError::Status {
                status: status.as_u16(),
                body: String::new(),
            };
        }
        FetchError::Transport(e.to_string())
    }
}

/// `reqwest` does not expose TLS failures as a kind, so walk the source chain
/// looking for the verifier's wording.
fn is_certificate_error(e: &reqwest::Error) -> bool {
    let mut source = e.source();
    while let Some(err) = source {
        let msg = err.to_string().to_lowercase();
        if msg.contains("certificate") || msg.contains("invalidcert") {
            return true;
        }
        source = err.source();
    }
    false
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("get_producers request failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("malformed get_producers response: {0}")]
    Malformed(String),
}

impl DiscoveryError {
    pub fn is_retryable(&self) -> bool {
        match self {
            DiscoveryError::Fetch(e) => e.is_retryable(),
            DiscoveryError::Malformed(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid bp.json: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading chain config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid chain config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid chain config: {0}")]
    Invalid(String),
}
