//! Asset indexer (AtomicAssets API) probe.

use serde_json::Value;

use super::{as_int, base, Prober};
use crate::report::{ProducerReport, ServiceKind};
use crate::retry::Operation;

pub const ASSET_HEALTH_PATH: &str = "/health";

/// Problems found in the `data` object of an asset API health reply.
///
/// Every sub-service that reports a status must report `OK`, and the furthest
/// reader must be within `max_lag` blocks of the chain head.
pub fn evaluate_asset_health(data: &Value, max_lag: u64) -> Vec<String> {
    let mut problems = Vec::new();

    if let Some(services) = data.as_object() {
        for (name, entry) in services {
            if let Some(status) = entry.get("status").and_then(Value::as_str) {
                if status != "OK" {
                    problems.push(format!("Asset service {name} has status {status}"));
                }
            }
        }
    }

    let head_block = data.pointer("/chain/head_block").and_then(as_int);
    let last_indexed = data
        .pointer("/postgres/readers")
        .and_then(Value::as_array)
        .and_then(|readers| {
            readers
                .iter()
                .filter_map(|r| r.get("block_num").and_then(as_int))
                .max()
        });

    match (head_block, last_indexed) {
        (Some(head), Some(last)) => {
            if head.abs_diff(last) > max_lag {
                problems.push(format!(
                    "Asset API last indexed block {last} is behind head block {head}"
                ));
            }
        }
        (None, _) => problems.push("Asset API health has no chain head block".to_string()),
        (_, None) => problems.push("Asset API health has no indexing readers".to_string()),
    }

    problems
}

impl Prober<'_> {
    pub async fn check_asset(&self, url: &str, report: &mut ProducerReport) {
        let health_url = format!("{}{ASSET_HEALTH_PATH}", base(url));
        let health = match self
            .fetch(Operation::Asset, |http| http.get(&health_url))
            .await
            .and_then(|r| r.success())
            .and_then(|r| r.json())
        {
            Ok(v) => v,
            Err(e) => {
                report.endpoint_error(url, format!("Error getting asset API health from {health_url}: {e}"));
                return;
            }
        };

        let problems = evaluate_asset_health(
            health.get("data").unwrap_or(&Value::Null),
            self.chain().asset_lag_blocks,
        );
        if problems.is_empty() {
            report.mark_healthy(ServiceKind::Asset, url);
            report.endpoint_ok(url, format!("Asset API ok for {url}"));
        } else {
            for problem in problems {
                report.endpoint_error(url, problem);
            }
        }
    }
}
