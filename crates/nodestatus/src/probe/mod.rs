//! Probe strategies, one module per service type.
//!
//! Every strategy has the same shape: issue one or more bounded requests
//! through the [`Retrier`], judge the response, and record the verdict against
//! the endpoint in the [`ProducerReport`](crate::report::ProducerReport).
//! Strategies never return errors; the probe boundary is where failures turn
//! into messages.

mod asset;
mod chain_api;
mod content;
mod history;
mod indexer;
mod light_api;
mod p2p;

pub use asset::{evaluate_asset_health, ASSET_HEALTH_PATH};
pub use chain_api::{head_block_age, is_stale, GetInfo, PROBE_ACCOUNT};
pub use content::PROBE_CONTENT_ID;
pub use history::HISTORY_ACCOUNT;
pub use indexer::{evaluate_indexer_health, MissingBlocks, SEARCH_INDEX_SERVICE};
pub use light_api::LIGHT_API_STATUS_PATH;
pub use p2p::{parse_host_port, P2pError};

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::chain::ChainInfo;
use crate::error::FetchError;
use crate::retry::{Operation, Retrier};

/// Status, headers and body of a completed request.
#[derive(Debug, Clone)]
pub(crate) struct HttpReply {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpReply {
    /// Turn a non-2xx reply into [`FetchError::Status`].
    pub fn success(self) -> Result<Self, FetchError> {
        if (200..300).contains(&self.status) {
            Ok(self)
        } else {
            Err(FetchError::Status {
                status: self.status,
                body: self.body,
            })
        }
    }

    pub fn json(&self) -> Result<Value, FetchError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Runs the probe strategies for one chain.
pub struct Prober<'a> {
    http: &'a reqwest::Client,
    chain: &'a ChainInfo,
    retrier: Retrier,
}

impl<'a> Prober<'a> {
    pub fn new(http: &'a reqwest::Client, chain: &'a ChainInfo) -> Self {
        Self {
            http,
            chain,
            retrier: Retrier::for_chain(chain),
        }
    }

    pub fn chain(&self) -> &ChainInfo {
        self.chain
    }

    /// Send the request built by `build`, retried per `op`. Any status code
    /// is a reply; only transport failures are errors.
    pub(crate) async fn fetch<F>(&self, op: Operation, build: F) -> Result<HttpReply, FetchError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let build = &build;
        let http = self.http;
        let timeout = self.chain.timeout();
        self.retrier
            .run(op, move || async move {
                let resp = build(http).timeout(timeout).send().await?;
                let status = resp.status().as_u16();
                let headers = resp.headers().clone();
                let body = resp.text().await?;
                Ok::<_, FetchError>(HttpReply {
                    status,
                    headers,
                    body,
                })
            })
            .await
    }
}

/// Trim the trailing slash producers like to leave on endpoint URLs.
pub(crate) fn base(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Parse a chain timestamp. Nodes emit naive UTC (`2024-01-01T00:00:00.500`);
/// indexers sometimes add an offset.
pub fn parse_utc(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc()),
    }
}

/// Human phrasing of an elapsed number of seconds ("5 minutes").
pub fn natural_delta(secs: i64) -> String {
    let secs = secs.abs();
    match secs {
        0 => "a moment".to_string(),
        1 => "a second".to_string(),
        2..=59 => format!("{secs} seconds"),
        60..=119 => "a minute".to_string(),
        120..=3599 => format!("{} minutes", secs / 60),
        3600..=7199 => "an hour".to_string(),
        7200..=86_399 => format!("{} hours", secs / 3600),
        86_400..=172_799 => "a day".to_string(),
        _ => format!("{} days", secs / 86_400),
    }
}

/// Read an integer that may be encoded as a JSON number or a string.
pub(crate) fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
