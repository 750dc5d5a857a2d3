//! Chain API probe plus the two checks that ride on the same endpoint:
//! account lookup by authorizer and reverse-proxy shim detection.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{base, natural_delta, parse_utc, Prober};
use crate::report::{ProducerReport, ServiceKind};
use crate::retry::Operation;

/// Account used for lookups that need one.
pub const PROBE_ACCOUNT: &str = "ledgerwiseio";

const CORS_ERROR: &str =
    "Invalid value for CORS header access-control-allow-origin or header not present";

/// Patroneos rejects this shape with `INVALID_JSON`; a bare nodeos answers it.
const PROXY_SHIM_BODY: &str = r#"{"account_name": "ledgerwiseio"}"#;
const PROXY_SHIM_MARKER: &str = "INVALID_JSON";

#[derive(Debug, Clone, Deserialize)]
pub struct GetInfo {
    pub chain_id: String,
    pub head_block_time: String,
}

/// Seconds between the head block and `now`.
pub fn head_block_age(head_block_time: &str, now: DateTime<Utc>) -> Result<i64, chrono::ParseError> {
    let head = parse_utc(head_block_time)?;
    Ok((now - head).num_seconds())
}

/// Stale means strictly older than the window; an age equal to the
/// threshold still passes.
pub fn is_stale(age_secs: i64, threshold_secs: i64) -> bool {
    age_secs > threshold_secs
}

impl Prober<'_> {
    /// `GET /v1/chain/get_info`: status, CORS wildcard, chain id, freshness.
    ///
    /// A chain id mismatch marks the report wrong-chain; the caller stops
    /// probing this producer.
    pub async fn check_chain_api(&self, url: &str, report: &mut ProducerReport) {
        let api_url = format!("{}/v1/chain/get_info", base(url));
        let reply = match self
            .fetch(Operation::ChainApi, |http| http.get(&api_url))
            .await
            .and_then(|r| r.success())
        {
            Ok(reply) => reply,
            Err(e) => {
                report.endpoint_error(url, format!("Error connecting to {api_url}: {e}"));
                return;
            }
        };

        let mut healthy = true;
        let allow_origin = reply
            .headers
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok());
        if allow_origin == Some("*") {
            report.endpoint_ok(url, "CORS headers properly configured");
        } else {
            healthy = false;
            report.endpoint_error(url, CORS_ERROR);
        }

        let info: GetInfo = match serde_json::from_str(&reply.body) {
            Ok(info) => info,
            Err(e) => {
                report.endpoint_error(url, format!("Invalid get_info response from {url}: {e}"));
                return;
            }
        };

        if info.chain_id != self.chain().chain_id {
            report.endpoint_error(url, "Wrong chain id");
            report.mark_wrong_chain();
            return;
        }

        match head_block_age(&info.head_block_time, Utc::now()) {
            Ok(age) if is_stale(age, self.chain().api_staleness_secs) => {
                healthy = false;
                report.endpoint_error(url, format!("Last block synced {} ago", natural_delta(age)));
            }
            Ok(_) => {}
            Err(e) => {
                healthy = false;
                report.endpoint_error(
                    url,
                    format!("Invalid head_block_time {}: {e}", info.head_block_time),
                );
            }
        }

        if healthy {
            report.mark_healthy(ServiceKind::Api, url);
            report.endpoint_ok(url, format!("API node {url} is responding correctly"));
        }
    }

    /// Detect a Patroneos-style filtering proxy in front of the API. Only a
    /// positive signal is recorded; absence costs nothing.
    pub async fn check_proxy_shim(&self, url: &str, report: &mut ProducerReport) {
        let api_url = format!("{}/v1/chain/get_account", base(url));
        let reply = match self
            .fetch(Operation::ProxyShim, |http| {
                http.post(&api_url)
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .header(reqwest::header::ACCEPT, "text/plain")
                    .body(PROXY_SHIM_BODY)
            })
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!(url, error = %e, "Error verifying proxy shim");
                return;
            }
        };

        let message = reply
            .json()
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string));
        if message.as_deref() == Some(PROXY_SHIM_MARKER) {
            report.proxy_shim = true;
            report.endpoint_ok(url, format!("Patroneos ok for {url}"));
        } else {
            tracing::debug!(url, "Response doesn't look like patroneos");
        }
    }

    /// `POST /v1/chain/get_accounts_by_authorizers` for nodes declaring
    /// `account-query`.
    pub async fn check_account_query(&self, url: &str, report: &mut ProducerReport) {
        let api_url = format!("{}/v1/chain/get_accounts_by_authorizers", base(url));
        let body = serde_json::json!({ "json": true, "accounts": [PROBE_ACCOUNT] });
        match self
            .fetch(Operation::AccountQuery, |http| http.post(&api_url).json(&body))
            .await
            .and_then(|r| r.success())
        {
            Ok(_) => report.endpoint_ok(url, format!("Get authorizers from account is ok on {url}")),
            Err(e) => report.endpoint_error(
                url,
                format!("Error getting authorizers for account {PROBE_ACCOUNT} from {api_url}: {e}"),
            ),
        }
    }
}
