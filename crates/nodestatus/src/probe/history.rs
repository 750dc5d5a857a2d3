use serde_json::Value;

use super::{base, Prober};
use crate::error::FetchError;
use crate::report::{ProducerReport, ServiceKind};
use crate::retry::Operation;

/// Account whose action history every v1 history node should hold.
pub const HISTORY_ACCOUNT: &str = "eosio";

impl Prober<'_> {
    /// Legacy `/v1/history/get_actions`.
    ///
    /// History is optional infrastructure. A node that answers with an error
    /// status is noted as a warning and does not fail the producer; earlier
    /// revisions of this check either ignored that reply or failed on it.
    /// Transport failures and garbage bodies still count as endpoint errors.
    pub async fn check_history(&self, url: &str, report: &mut ProducerReport) {
        let api_url = format!("{}/v1/history/get_actions", base(url));
        let body = serde_json::json!({ "account_name": HISTORY_ACCOUNT, "pos": -1, "offset": -20 });
        let reply = match self
            .fetch(Operation::HistoryV1, |http| http.post(&api_url).json(&body))
            .await
            .and_then(|r| r.success())
        {
            Ok(reply) => reply,
            Err(e @ FetchError::Status { .. }) => {
                report.warning(format!("History v1 not available on {url}: {e}"));
                return;
            }
            Err(e) => {
                report.endpoint_error(url, format!("Error testing v1 history from {url}: {e}"));
                return;
            }
        };

        let actions = match reply.json() {
            Ok(v) => v.get("actions").and_then(Value::as_array).map(Vec::len),
            Err(e) => {
                report.endpoint_error(url, format!("Error testing v1 history from {url}: {e}"));
                return;
            }
        };
        match actions {
            None => tracing::info!(url, "No actions in history response"),
            Some(0) => tracing::info!(url, "0 actions returned for {HISTORY_ACCOUNT}"),
            Some(_) => {
                report.mark_healthy(ServiceKind::History, url);
                report.endpoint_ok(url, format!("History ok for {url}"));
            }
        }
    }
}
