//! P2P reachability: a bare TCP connect, nothing protocol-level.

use tokio::net::TcpStream;

use super::Prober;
use crate::report::{ProducerReport, ServiceKind};
use crate::retry::{Operation, Retryable};

#[derive(Debug, thiserror::Error)]
pub enum P2pError {
    #[error("Invalid p2p host:port value {0}")]
    InvalidAddress(String),

    #[error("{0}")]
    Connect(#[from] std::io::Error),

    #[error("Connection timed out")]
    Timeout,
}

impl Retryable for P2pError {
    fn is_retryable(&self) -> bool {
        !matches!(self, P2pError::InvalidAddress(_))
    }
}

/// Split `host:port`. IPv6 hosts may be bracketed (`[::1]:9876`).
pub fn parse_host_port(value: &str) -> Result<(String, u16), P2pError> {
    let invalid = || P2pError::InvalidAddress(value.to_string());
    let (host, port) = value.trim().rsplit_once(':').ok_or_else(invalid)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() || host.contains('/') {
        return Err(invalid());
    }
    let port: u16 = port.parse().map_err(|_| invalid())?;
    Ok((host.to_string(), port))
}

impl Prober<'_> {
    pub async fn check_p2p(&self, endpoint: &str, report: &mut ProducerReport) {
        let (host, port) = match parse_host_port(endpoint) {
            Ok(parts) => parts,
            Err(e) => {
                report.endpoint_error(endpoint, e.to_string());
                return;
            }
        };

        let timeout = self.chain().timeout();
        let host = host.as_str();
        let result = self
            .retrier
            .run(Operation::P2p, move || async move {
                match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
                    Ok(Ok(_stream)) => Ok(()),
                    Ok(Err(e)) => Err(P2pError::Connect(e)),
                    Err(_) => Err(P2pError::Timeout),
                }
            })
            .await;

        match result {
            Ok(()) => {
                report.mark_healthy(ServiceKind::P2p, endpoint);
                report.endpoint_ok(endpoint, format!("P2P node {endpoint} is responding"));
            }
            Err(e) => report.endpoint_error(endpoint, format!("Error connecting to {endpoint}: {e}")),
        }
    }
}
