//! Bounded retry with fixed pacing.
//!
//! Every outbound call goes through [`Retrier::run`]. Each [`Operation`]
//! declares two things up front: how many attempts it gets, and its
//! [`Criticality`]. A critical operation retries on any failure and its final
//! error propagates to the caller. A best-effort operation retries only
//! transport failures; its final error is recorded at the probe boundary and
//! goes no further. Delays are fixed, never exponential, and a small throttle
//! precedes every attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::chain::ChainInfo;
use crate::error::{DiscoveryError, FetchError};

const DISCOVERY_ATTEMPTS: u32 = 3;
const CRITICAL_ATTEMPTS: u32 = 2;
const BEST_EFFORT_ATTEMPTS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// Later work depends on it; the final error is returned to the caller.
    Critical,
    /// Failure is recorded against the endpoint and goes no further.
    BestEffort,
}

impl Criticality {
    /// Whether a failed attempt that ended with `error` is tried again.
    pub fn retries<E: Retryable>(self, error: &E) -> bool {
        match self {
            Criticality::Critical => true,
            Criticality::BestEffort => error.is_retryable(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Discovery,
    RedirectTable,
    ManifestFetch,
    OnchainManifest,
    ChainApi,
    P2p,
    AccountQuery,
    HistoryV1,
    Indexer,
    Asset,
    ContentGateway,
    LightApi,
    ProxyShim,
}

impl Operation {
    pub fn criticality(self) -> Criticality {
        match self {
            Operation::Discovery | Operation::ManifestFetch => Criticality::Critical,
            _ => Criticality::BestEffort,
        }
    }

    pub fn attempts(self) -> u32 {
        match self {
            Operation::Discovery => DISCOVERY_ATTEMPTS,
            Operation::RedirectTable
            | Operation::ManifestFetch
            | Operation::OnchainManifest
            | Operation::ChainApi
            | Operation::P2p => CRITICAL_ATTEMPTS,
            _ => BEST_EFFORT_ATTEMPTS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::Discovery => "discovery",
            Operation::RedirectTable => "chains.json",
            Operation::ManifestFetch => "bp.json",
            Operation::OnchainManifest => "on-chain bp.json",
            Operation::ChainApi => "chain api",
            Operation::P2p => "p2p",
            Operation::AccountQuery => "account query",
            Operation::HistoryV1 => "history v1",
            Operation::Indexer => "indexer",
            Operation::Asset => "asset api",
            Operation::ContentGateway => "content gateway",
            Operation::LightApi => "light api",
            Operation::ProxyShim => "proxy shim",
        }
    }
}

/// Errors that know whether another attempt could help.
pub trait Retryable: Display {
    fn is_retryable(&self) -> bool;
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        FetchError::is_retryable(self)
    }
}

impl Retryable for DiscoveryError {
    fn is_retryable(&self) -> bool {
        DiscoveryError::is_retryable(self)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Retrier {
    throttle: Duration,
    delay: Duration,
}

impl Retrier {
    pub fn new(throttle: Duration, delay: Duration) -> Self {
        Self { throttle, delay }
    }

    pub fn for_chain(chain: &ChainInfo) -> Self {
        Self::new(chain.throttle(), chain.retry_delay())
    }

    /// Run `f` up to `op.attempts()` times. For best-effort operations a
    /// non-retryable error ends the loop immediately.
    pub async fn run<T, E, F, Fut>(&self, op: Operation, mut f: F) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = op.attempts();
        let criticality = op.criticality();
        let mut attempt = 1;
        loop {
            if !self.throttle.is_zero() {
                tokio::time::sleep(self.throttle).await;
            }
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && criticality.retries(&e) => {
                    tracing::warn!(
                        operation = op.name(),
                        attempt,
                        attempts,
                        error = %e,
                        "Retrying request"
                    );
                    attempt += 1;
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
                Err(e) => {
                    if criticality == Criticality::Critical {
                        tracing::warn!(operation = op.name(), attempts = attempt, error = %e, "Giving up");
                    }
                    return Err(e);
                }
            }
        }
    }
}
