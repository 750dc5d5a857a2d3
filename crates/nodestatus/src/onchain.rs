//! Cross-check of the served bp.json against the copy stored in chain state.
//!
//! The comparison is structural: object key order and whitespace do not
//! matter, every changed, added or removed field does. The outcome is
//! advisory and never touches a producer's status.

use std::fmt;

use serde_json::Value;

use crate::chain::ChainInfo;
use crate::error::FetchError;
use crate::report::{OnchainCheck, ProducerReport};
use crate::retry::{Operation, Retrier};

/// One field-level difference between two JSON documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Difference {
    Changed {
        path: String,
        onchain: Value,
        served: Value,
    },
    /// Present in the served document only.
    Added { path: String, served: Value },
    /// Present on chain only.
    Removed { path: String, onchain: Value },
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difference::Changed {
                path,
                onchain,
                served,
            } => write!(f, "{path}: {onchain} -> {served}"),
            Difference::Added { path, served } => write!(f, "{path}: added {served}"),
            Difference::Removed { path, onchain } => write!(f, "{path}: removed {onchain}"),
        }
    }
}

/// Field-level diff of `onchain` against `served`. Paths use `$.key[i]`
/// notation.
pub fn json_diff(onchain: &Value, served: &Value) -> Vec<Difference> {
    let mut out = Vec::new();
    diff_at("$", onchain, served, &mut out);
    out
}

fn diff_at(path: &str, onchain: &Value, served: &Value, out: &mut Vec<Difference>) {
    match (onchain, served) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, av) in a {
                let child = format!("{path}.{key}");
                match b.get(key) {
                    Some(bv) => diff_at(&child, av, bv, out),
                    None => out.push(Difference::Removed {
                        path: child,
                        onchain: av.clone(),
                    }),
                }
            }
            for (key, bv) in b {
                if !a.contains_key(key) {
                    out.push(Difference::Added {
                        path: format!("{path}.{key}"),
                        served: bv.clone(),
                    });
                }
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            for (i, av) in a.iter().enumerate() {
                let child = format!("{path}[{i}]");
                match b.get(i) {
                    Some(bv) => diff_at(&child, av, bv, out),
                    None => out.push(Difference::Removed {
                        path: child,
                        onchain: av.clone(),
                    }),
                }
            }
            for (i, bv) in b.iter().enumerate().skip(a.len()) {
                out.push(Difference::Added {
                    path: format!("{path}[{i}]"),
                    served: bv.clone(),
                });
            }
        }
        (a, b) if a == b => {}
        (a, b) => out.push(Difference::Changed {
            path: path.to_string(),
            onchain: a.clone(),
            served: b.clone(),
        }),
    }
}

/// The table row stores the document as a JSON string in `data.json`. A row
/// without a document counts as no document.
fn stored_manifest(rows: &Value) -> Result<Option<Value>, FetchError> {
    let text = rows
        .get("rows")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(|row| row.pointer("/data/json"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if text.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str(text)? {
        Value::Null => Ok(None),
        stored => Ok(Some(stored)),
    }
}

async fn fetch_stored_manifest(
    http: &reqwest::Client,
    chain: &ChainInfo,
    owner: &str,
) -> Result<Option<Value>, FetchError> {
    let url = format!("{}/v1/chain/get_table_rows", chain.api_node.trim_end_matches('/'));
    let contract = chain.onchain_contract.as_str();
    let body = serde_json::json!({
        "json": true,
        "code": contract,
        "scope": contract,
        "table": contract,
        "lower_bound": owner,
        "upper_bound": owner,
        "index_position": 1,
        "key_type": "name",
        "limit": 1,
        "reverse": false,
    });
    let resp = http
        .post(&url)
        .json(&body)
        .timeout(chain.timeout())
        .send()
        .await?;
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    if !(200..300).contains(&status) {
        return Err(FetchError::Status { status, body: text });
    }
    stored_manifest(&serde_json::from_str(&text)?)
}

/// Compare the stored copy for `report.account` with `served`, recording the
/// outcome as an ok or a warning.
pub async fn cross_check(
    http: &reqwest::Client,
    chain: &ChainInfo,
    served: &Value,
    report: &mut ProducerReport,
) {
    let owner = report.account.clone();
    let stored = Retrier::for_chain(chain)
        .run(Operation::OnchainManifest, || {
            fetch_stored_manifest(http, chain, &owner)
        })
        .await;

    match stored {
        Err(e) => {
            tracing::error!(producer = %owner, error = %e, "Error getting bpjson on chain");
        }
        Ok(None) => {
            report.onchain = OnchainCheck::Missing;
            report.warning(format!("No bpjson on chain for producer {owner}"));
        }
        Ok(Some(stored)) => {
            let diff = json_diff(&stored, served);
            if diff.is_empty() {
                report.onchain = OnchainCheck::Matches;
                report.ok(format!("bpjson on chain for producer {owner} matches the one online"));
            } else {
                report.onchain = OnchainCheck::Differs;
                let detail: Vec<String> = diff.iter().map(ToString::to_string).collect();
                tracing::warn!(producer = %owner, diff = %detail.join("; "), "On-chain bpjson differs");
                report.warning(format!(
                    "bpjson on chain for producer {owner} doesnt match the one online"
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_is_not_a_difference() {
        let a: Value = serde_json::from_str(r#"{"org": {"a": 1, "b": 2}, "nodes": []}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"nodes": [], "org": {"b": 2, "a": 1}}"#).unwrap();
        assert!(json_diff(&a, &b).is_empty());
    }

    #[test]
    fn test_nested_changes_are_reported_by_path() {
        let onchain = json!({
            "org": {"candidate_name": "BP A", "website": "https://a.example"},
            "nodes": [{"node_type": "seed"}]
        });
        let served = json!({
            "org": {"candidate_name": "BP A2"},
            "nodes": [{"node_type": "seed"}, {"node_type": "query"}],
            "extra": true
        });
        let diff = json_diff(&onchain, &served);
        assert_eq!(diff.len(), 4);
        for expected in [
            Difference::Changed {
                path: "$.org.candidate_name".into(),
                onchain: json!("BP A"),
                served: json!("BP A2"),
            },
            Difference::Removed {
                path: "$.org.website".into(),
                onchain: json!("https://a.example"),
            },
            Difference::Added {
                path: "$.nodes[1]".into(),
                served: json!({"node_type": "query"}),
            },
            Difference::Added {
                path: "$.extra".into(),
                served: json!(true),
            },
        ] {
            assert!(diff.contains(&expected), "{expected}");
        }

        let changed = diff
            .iter()
            .find(|d| matches!(d, Difference::Changed { .. }))
            .unwrap();
        assert_eq!(changed.to_string(), r#"$.org.candidate_name: "BP A" -> "BP A2""#);
    }

    #[test]
    fn test_type_change_is_a_change() {
        let diff = json_diff(&json!({"n": 1}), &json!({"n": "1"}));
        assert_eq!(diff.len(), 1);
        assert!(matches!(diff[0], Difference::Changed { .. }));
    }

    #[test]
    fn test_stored_manifest_row_shapes() {
        assert_eq!(stored_manifest(&json!({"rows": [], "more": false})).unwrap(), None);
        let rows = json!({"rows": [{"owner": "bpa", "data": {"json": "{\"org\":{}}"}}]});
        assert_eq!(stored_manifest(&rows).unwrap(), Some(json!({"org": {}})));
        let garbage = json!({"rows": [{"data": {"json": "{not json"}}]});
        assert!(stored_manifest(&garbage).is_err());
    }

    #[test]
    fn test_row_without_document_is_missing() {
        assert_eq!(stored_manifest(&json!({"rows": [{"owner": "bpa"}]})).unwrap(), None);
        assert_eq!(stored_manifest(&json!({"rows": [{"owner": "bpa", "data": {}}]})).unwrap(), None);
        let empty = json!({"rows": [{"owner": "bpa", "data": {"json": "  "}}]});
        assert_eq!(stored_manifest(&empty).unwrap(), None);
        let null = json!({"rows": [{"owner": "bpa", "data": {"json": "null"}}]});
        assert_eq!(stored_manifest(&null).unwrap(), None);
    }
}
