//! Discovery feed: the ranked list of active producers for a chain.

use serde::Deserialize;
use serde_json::Value;

use crate::chain::ChainInfo;
use crate::error::{DiscoveryError, FetchError};
use crate::retry::{Operation, Retrier};

const PAGE_LIMIT: u32 = 200;
const MANIFEST_PATH: &str = "/bp.json";
const REDIRECT_TABLE_PATH: &str = "/chains.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerInfo {
    pub owner: String,
    pub url: String,
    /// Where the bp.json is fetched from. Patched once if the producer's
    /// chains.json redirects this chain elsewhere.
    pub manifest_url: String,
    pub redirect_table_url: String,
    /// 1-based rank in the discovery feed.
    pub position: usize,
    pub is_top_tier: bool,
}

impl ProducerInfo {
    pub fn new(owner: impl Into<String>, url: impl Into<String>, position: usize, is_top_tier: bool) -> Self {
        let url = url.into();
        Self {
            owner: owner.into(),
            manifest_url: join_url(&url, MANIFEST_PATH),
            redirect_table_url: join_url(&url, REDIRECT_TABLE_PATH),
            url,
            position,
            is_top_tier,
        }
    }
}

/// Resolve `path` against `base` the way a browser would. Producers publish
/// all kinds of broken urls; when `base` does not parse the two are simply
/// concatenated and the fetch fails later with a recorded error.
pub fn join_url(base: &str, path: &str) -> String {
    match url::Url::parse(base).and_then(|b| b.join(path)) {
        Ok(joined) => joined.to_string(),
        Err(_) => format!("{}{}", base.trim_end_matches('/'), path),
    }
}

#[derive(Debug, Deserialize)]
struct ProducerRow {
    owner: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    is_active: Value,
}

impl ProducerRow {
    fn active(&self) -> bool {
        match &self.is_active {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
            Value::String(s) => s != "0" && !s.is_empty(),
            // Chains without the flag only list registered producers.
            Value::Null => true,
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProducersPage {
    #[serde(default)]
    rows: Option<Vec<ProducerRow>>,
    /// FIO-style chains return `producers` instead of `rows`.
    #[serde(default)]
    producers: Option<Vec<ProducerRow>>,
    #[serde(default)]
    more: Value,
}

impl ProducersPage {
    fn next_cursor(&self) -> Option<String> {
        match &self.more {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

async fn fetch_page(
    http: &reqwest::Client,
    chain: &ChainInfo,
    lower_bound: Option<&str>,
) -> Result<ProducersPage, DiscoveryError> {
    let url = format!(
        "{}/v1/chain/get_producers",
        chain.api_node.trim_end_matches('/')
    );
    let mut body = serde_json::json!({ "json": true, "limit": PAGE_LIMIT });
    if let Some(bound) = lower_bound {
        body["lower_bound"] = Value::String(bound.to_string());
    }
    let resp = http
        .post(&url)
        .json(&body)
        .timeout(chain.timeout())
        .send()
        .await
        .map_err(FetchError::from)?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FetchError::Status {
            status: status.as_u16(),
            body,
        }
        .into());
    }
    let text = resp.text().await.map_err(FetchError::from)?;
    serde_json::from_str(&text).map_err(|e| DiscoveryError::Malformed(e.to_string()))
}

async fn fetch_all(
    http: &reqwest::Client,
    chain: &ChainInfo,
) -> Result<Vec<ProducerRow>, DiscoveryError> {
    let mut rows = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = fetch_page(http, chain, cursor.as_deref()).await?;
        let next = page.next_cursor();
        let page_rows = page
            .rows
            .or(page.producers)
            .ok_or_else(|| DiscoveryError::Malformed("neither rows nor producers present".into()))?;
        rows.extend(page_rows);
        match next {
            Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
            _ => break,
        }
    }
    Ok(rows)
}

fn rank(chain: &ChainInfo, rows: Vec<ProducerRow>) -> Vec<ProducerInfo> {
    let mut active: Vec<ProducerRow> = rows
        .into_iter()
        .filter(ProducerRow::active)
        .filter(|row| !chain.exclude.iter().any(|rule| rule.matches(&row.owner, &row.url)))
        .collect();
    if let Some(limit) = chain.limit {
        active.truncate(limit);
    }
    active
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            let position = i + 1;
            ProducerInfo::new(row.owner, row.url, position, position <= chain.top_tier_size)
        })
        .collect()
}

/// Fetch the active producers for `chain`, in feed order.
///
/// The whole paginated walk is one retried unit: a failure on page three
/// restarts from page one rather than publishing a partial list.
pub async fn discover_producers(
    http: &reqwest::Client,
    chain: &ChainInfo,
) -> Result<Vec<ProducerInfo>, DiscoveryError> {
    let retrier = Retrier::for_chain(chain);
    let rows = retrier
        .run(Operation::Discovery, || fetch_all(http, chain))
        .await?;
    let producers = rank(chain, rows);
    tracing::info!(
        chain = %chain.name,
        count = producers.len(),
        "Discovered active producers"
    );
    Ok(producers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ExclusionRule;

    fn row(owner: &str, url: &str, is_active: Value) -> ProducerRow {
        ProducerRow {
            owner: owner.into(),
            url: url.into(),
            is_active,
        }
    }

    #[test]
    fn test_derived_urls() {
        let p = ProducerInfo::new("bpa", "https://bp.example", 1, true);
        assert_eq!(p.manifest_url, "https://bp.example/bp.json");
        assert_eq!(p.redirect_table_url, "https://bp.example/chains.json");

        let p = ProducerInfo::new("bpa", "https://bp.example/team/", 1, true);
        assert_eq!(p.manifest_url, "https://bp.example/bp.json");
    }

    #[test]
    fn test_join_url_tolerates_garbage() {
        assert_eq!(join_url("bp.example", "/bp.json"), "bp.example/bp.json");
        assert_eq!(join_url("", "/bp.json"), "/bp.json");
    }

    #[test]
    fn test_rank_filters_and_positions() {
        let mut chain = ChainInfo::new("WAX", "aa", "https://api.example");
        chain.top_tier_size = 2;
        chain.exclude.push(ExclusionRule {
            url: "https://wax.io".into(),
            owner_suffix: ".wax".into(),
        });
        let rows = vec![
            row("bpa", "https://a.example", serde_json::json!(1)),
            row("guild.wax", "https://wax.io", serde_json::json!(1)),
            row("bpb", "https://b.example", serde_json::json!(0)),
            row("bpc", "https://c.example", serde_json::json!(true)),
            row("bpd", "https://d.example", serde_json::json!(1)),
        ];
        let ranked = rank(&chain, rows);
        let owners: Vec<_> = ranked.iter().map(|p| p.owner.as_str()).collect();
        assert_eq!(owners, vec!["bpa", "bpc", "bpd"]);
        assert_eq!(ranked[2].position, 3);
        assert!(ranked[1].is_top_tier);
        assert!(!ranked[2].is_top_tier);
    }

    #[test]
    fn test_rank_applies_limit_after_filtering() {
        let mut chain = ChainInfo::new("EOS", "aa", "https://api.example");
        chain.limit = Some(1);
        let rows = vec![
            row("bpa", "https://a.example", serde_json::json!(0)),
            row("bpb", "https://b.example", serde_json::json!(1)),
            row("bpc", "https://c.example", serde_json::json!(1)),
        ];
        let ranked = rank(&chain, rows);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].owner, "bpb");
        assert_eq!(ranked[0].position, 1);
    }

    #[test]
    fn test_page_shapes() {
        let eos: ProducersPage = serde_json::from_str(
            r#"{"rows": [{"owner": "bpa", "url": "https://a", "is_active": 1}], "total_producer_vote_weight": "1", "more": "bpb"}"#,
        )
        .unwrap();
        assert_eq!(eos.next_cursor().as_deref(), Some("bpb"));
        assert_eq!(eos.rows.unwrap().len(), 1);

        let fio: ProducersPage = serde_json::from_str(
            r#"{"producers": [{"owner": "bpa", "url": "https://a", "is_active": 1}], "more": ""}"#,
        )
        .unwrap();
        assert!(fio.next_cursor().is_none());
        assert_eq!(fio.producers.unwrap().len(), 1);
    }
}
