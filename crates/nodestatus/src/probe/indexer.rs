//! Rich history indexer (Hyperion v2) probe.

use chrono::Utc;
use serde_json::Value;

use super::{as_int, base, natural_delta, parse_utc, Prober};
use crate::report::{ProducerReport, ServiceKind};
use crate::retry::Operation;

/// Sub-service whose block coverage is checked.
pub const SEARCH_INDEX_SERVICE: &str = "Elasticsearch";

/// How a health payload reports gaps in the search index.
///
/// Indexer versions disagree on the shape: newer ones report a direct
/// `missing_blocks` count, older ones only give `total_indexed_blocks` and
/// `last_indexed_block`, from which the gap is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingBlocks {
    Reported(i64),
    Derived { total_indexed: i64, last_indexed: i64 },
    Unreported,
}

impl MissingBlocks {
    pub fn from_service_data(data: &Value) -> Self {
        if let Some(missing) = data.get("missing_blocks").and_then(as_int) {
            return MissingBlocks::Reported(missing);
        }
        let total = data.get("total_indexed_blocks").and_then(as_int);
        let last = data.get("last_indexed_block").and_then(as_int);
        match (total, last) {
            (Some(total_indexed), Some(last_indexed)) => MissingBlocks::Derived {
                total_indexed,
                last_indexed,
            },
            _ => MissingBlocks::Unreported,
        }
    }

    /// Gap size. A negative reported count is treated as no gap.
    pub fn count(self) -> u64 {
        match self {
            MissingBlocks::Reported(n) => u64::try_from(n).unwrap_or(0),
            MissingBlocks::Derived {
                total_indexed,
                last_indexed,
            } => total_indexed.abs_diff(last_indexed),
            MissingBlocks::Unreported => 0,
        }
    }
}

/// Problems found in a `/v2/health` payload: every sub-service must report
/// `OK` and the search index must have no missing blocks.
pub fn evaluate_indexer_health(health: &Value) -> Vec<String> {
    let Some(services) = health.get("health").and_then(Value::as_array) else {
        return vec!["Indexer health response has no service list".to_string()];
    };

    let mut problems = Vec::new();
    for item in services {
        let service = item.get("service").and_then(Value::as_str).unwrap_or("unknown");
        let status = item.get("status").and_then(Value::as_str).unwrap_or("missing");
        if status != "OK" {
            problems.push(format!("Indexer service {service} has status {status}"));
        }
        if service == SEARCH_INDEX_SERVICE {
            let data = item.get("service_data").unwrap_or(&Value::Null);
            let missing = MissingBlocks::from_service_data(data).count();
            if missing > 0 {
                problems.push(format!("Indexer {service} missing {missing} blocks"));
            }
        }
    }
    problems
}

impl Prober<'_> {
    pub async fn check_indexer(&self, url: &str, report: &mut ProducerReport) {
        let mut healthy = true;

        let actions_url = format!("{}/v2/history/get_actions?limit=1", base(url));
        let latest = match self
            .fetch(Operation::Indexer, |http| http.get(&actions_url))
            .await
            .and_then(|r| r.success())
            .and_then(|r| r.json())
        {
            Ok(v) => v,
            Err(e) => {
                report.endpoint_error(url, format!("Error testing indexer at {actions_url}: {e}"));
                return;
            }
        };

        let timestamp = latest
            .pointer("/actions/0/timestamp")
            .and_then(Value::as_str);
        match timestamp.map(parse_utc) {
            Some(Ok(ts)) => {
                let age = (Utc::now() - ts).num_seconds();
                if age > self.chain().indexer_staleness_secs {
                    healthy = false;
                    report.endpoint_error(url, format!("Indexer last action {} ago", natural_delta(age)));
                }
            }
            Some(Err(e)) => {
                healthy = false;
                report.endpoint_error(url, format!("Indexer returned an unreadable action timestamp: {e}"));
            }
            None => {
                healthy = false;
                report.endpoint_error(url, "Indexer returned no actions");
            }
        }

        let health_url = format!("{}/v2/health", base(url));
        let health = match self
            .fetch(Operation::Indexer, |http| http.get(&health_url))
            .await
            .and_then(|r| r.success())
            .and_then(|r| r.json())
        {
            Ok(v) => v,
            Err(e) => {
                report.endpoint_error(url, format!("Error checking indexer health at {health_url}: {e}"));
                return;
            }
        };

        for problem in evaluate_indexer_health(&health) {
            healthy = false;
            report.endpoint_error(url, problem);
        }

        if healthy {
            report.mark_healthy(ServiceKind::Indexer, url);
            report.endpoint_ok(url, format!("Indexer history ok for {url}"));
        }
    }
}
