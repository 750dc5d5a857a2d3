//! Node manifest (bp.json) retrieval and model.
//!
//! Parsing is two-level: the document must be JSON with a
//! `nodes` array, but each node entry is decoded on its own so that one
//! malformed entry is recorded and skipped instead of rejecting the whole
//! manifest.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::chain::ChainInfo;
use crate::error::{FetchError, ManifestError};
use crate::producer::{join_url, ProducerInfo};
use crate::retry::{Operation, Retrier};

/// Some origins sit behind bot filters that reject anything not shaped like
/// a browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_10_1) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/39.0.2171.95 Safari/537.36";

/// Declared role of a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Producer,
    Query,
    Seed,
    Full,
    #[serde(other)]
    Other,
}

/// `node_type` as a set. Manifests give either a single string or an array;
/// both decode to the same set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeTypes(pub BTreeSet<NodeRole>);

impl NodeTypes {
    pub fn contains(&self, role: &NodeRole) -> bool {
        self.0.contains(role)
    }
}

impl<'de> Deserialize<'de> for NodeTypes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(NodeRole),
            Many(Vec<NodeRole>),
        }

        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(role) => NodeTypes(BTreeSet::from([role])),
            OneOrMany::Many(roles) => NodeTypes(roles.into_iter().collect()),
        })
    }
}

/// Capability flags a query node can declare.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    ChainApi,
    AccountQuery,
    HistoryV1,
    IndexerV2,
    AssetApi,
    ContentGateway,
    LightApi,
    Other(String),
}

impl FromStr for Feature {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "chain-api" => Feature::ChainApi,
            "account-query" => Feature::AccountQuery,
            "history-v1" => Feature::HistoryV1,
            "indexer-v2" | "hyperion-v2" => Feature::IndexerV2,
            "asset-api" | "atomic-assets-api" => Feature::AssetApi,
            "content-gateway" | "ipfs" => Feature::ContentGateway,
            "light-api" => Feature::LightApi,
            other => Feature::Other(other.to_string()),
        })
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::ChainApi => "chain-api",
            Feature::AccountQuery => "account-query",
            Feature::HistoryV1 => "history-v1",
            Feature::IndexerV2 => "indexer-v2",
            Feature::AssetApi => "asset-api",
            Feature::ContentGateway => "content-gateway",
            Feature::LightApi => "light-api",
            Feature::Other(name) => name,
        };
        f.write_str(name)
    }
}

impl<'de> Deserialize<'de> for Feature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap_or(Feature::Other(s)))
    }
}

/// Endpoint fields only count when they are non-empty strings.
fn lenient_endpoint<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

/// One `nodes[]` entry as written by the producer, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub node_type: Option<NodeTypes>,
    #[serde(default)]
    pub features: Option<BTreeSet<Feature>>,
    #[serde(default, deserialize_with = "lenient_endpoint")]
    pub api_endpoint: Option<String>,
    #[serde(default, deserialize_with = "lenient_endpoint")]
    pub ssl_endpoint: Option<String>,
    #[serde(default, deserialize_with = "lenient_endpoint")]
    pub p2p_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub enum NodeEntry {
    Parsed(RawNode),
    Malformed(String),
}

/// A node that passed structural validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredNode {
    /// 1-based position in the manifest.
    pub index: usize,
    pub roles: BTreeSet<NodeRole>,
    pub features: BTreeSet<Feature>,
    pub api_endpoint: Option<String>,
    pub ssl_endpoint: Option<String>,
    pub p2p_endpoint: Option<String>,
}

impl DeclaredNode {
    pub fn is_query(&self) -> bool {
        self.roles.contains(&NodeRole::Query)
    }

    pub fn is_seed(&self) -> bool {
        self.roles.contains(&NodeRole::Seed)
    }

    pub fn has_feature(&self, feature: &Feature) -> bool {
        self.features.contains(feature)
    }

    /// Plaintext then TLS API endpoint, whichever are declared.
    pub fn http_endpoints(&self) -> impl Iterator<Item = &str> {
        self.api_endpoint
            .as_deref()
            .into_iter()
            .chain(self.ssl_endpoint.as_deref())
    }
}

/// Organization block. Only the fields the checks read are decoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Org {
    #[serde(default)]
    pub candidate_name: Option<String>,
    #[serde(default)]
    pub github_user: Option<Value>,
}

impl Org {
    /// Whether the organization names a source-code identity.
    pub fn has_identity(&self) -> bool {
        match &self.github_user {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(_) => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeManifest {
    /// The document exactly as served, for publishing and the on-chain diff.
    pub raw: Value,
    pub org: Org,
    pub nodes: Vec<NodeEntry>,
}

pub fn parse_manifest(body: &str) -> Result<NodeManifest, ManifestError> {
    let raw: Value =
        serde_json::from_str(body).map_err(|e| ManifestError::Parse(e.to_string()))?;
    let Some(obj) = raw.as_object() else {
        return Err(ManifestError::Parse("document is not an object".into()));
    };
    let org = obj
        .get("org")
        .cloned()
        .map(serde_json::from_value::<Org>)
        .transpose()
        .unwrap_or_default()
        .unwrap_or_default();
    let nodes = obj
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| ManifestError::Parse("nodes missing or not an array".into()))?
        .iter()
        .map(|node| match serde_json::from_value::<RawNode>(node.clone()) {
            Ok(parsed) => NodeEntry::Parsed(parsed),
            Err(e) => NodeEntry::Malformed(e.to_string()),
        })
        .collect();
    Ok(NodeManifest { raw, org, nodes })
}

/// Shorten a server response for inclusion in a report message.
pub fn truncate_diagnostic(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}..")
    } else {
        text.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct RedirectTable {
    chains: std::collections::HashMap<String, String>,
}

async fn fetch_redirect_path(
    http: &reqwest::Client,
    chain: &ChainInfo,
    url: &str,
) -> Result<Option<String>, FetchError> {
    let resp = http.get(url).timeout(chain.timeout()).send().await?;
    if !resp.status().is_success() {
        return Err(FetchError::Status {
            status: resp.status().as_u16(),
            body: String::new(),
        });
    }
    let text = resp.text().await?;
    let table: RedirectTable = serde_json::from_str(&text)?;
    Ok(table.chains.get(&chain.chain_id).cloned())
}

/// Patch `producer.manifest_url` from the producer's chains.json, if it has an
/// entry for this chain. Every failure here is logged and ignored.
pub async fn resolve_manifest_url(
    http: &reqwest::Client,
    chain: &ChainInfo,
    producer: &mut ProducerInfo,
) {
    let retrier = Retrier::for_chain(chain);
    let url = producer.redirect_table_url.clone();
    match retrier
        .run(Operation::RedirectTable, || fetch_redirect_path(http, chain, &url))
        .await
    {
        Ok(Some(path)) => {
            producer.manifest_url = join_url(&producer.url, &path);
            tracing::info!(producer = %producer.owner, url = %producer.manifest_url, "bp.json redirected by chains.json");
        }
        Ok(None) => {
            tracing::debug!(producer = %producer.owner, "chains.json has no entry for this chain");
        }
        Err(e) => {
            tracing::debug!(producer = %producer.owner, error = %e, "Error getting chains.json");
        }
    }
}

/// Raw HTTP outcome of a bp.json fetch. Any status is returned; only
/// transport failures are errors.
#[derive(Debug, Clone)]
pub struct ManifestResponse {
    pub status: u16,
    pub elapsed: Duration,
    pub body: String,
}

async fn fetch_once(
    http: &reqwest::Client,
    chain: &ChainInfo,
    url: &str,
) -> Result<ManifestResponse, FetchError> {
    let started = tokio::time::Instant::now();
    let resp = http
        .get(url)
        .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
        .timeout(chain.timeout())
        .send()
        .await?;
    let elapsed = started.elapsed();
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    Ok(ManifestResponse {
        status,
        elapsed,
        body,
    })
}

/// Fetch a bp.json. Critical: the final transport error is returned so the
/// caller can stop this producer's verification.
pub async fn fetch_manifest(
    http: &reqwest::Client,
    chain: &ChainInfo,
    url: &str,
) -> Result<ManifestResponse, FetchError> {
    Retrier::for_chain(chain)
        .run(Operation::ManifestFetch, || fetch_once(http, chain, url))
        .await
}
