//! Per-producer accumulator and the chain-wide published document.
//!
//! A [`ProducerReport`] is created at the start of one producer's verification
//! and handed by `&mut` through the pipeline; nothing else holds it. Its coarse
//! [`Status`] can only move through [`ProducerReport::escalate`], so once a
//! check has failed the producer stays failed for the run.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::producer::ProducerInfo;

/// Coarse status of a producer's whole verification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    #[default]
    Ok,
    Failure,
}

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::Failure => 2,
        }
    }

    /// `max(self, other)`: commutative, idempotent, never moves back to `Ok`.
    pub fn escalate(&mut self, other: Status) {
        *self = (*self).max(other);
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(Status::Ok),
            2 => Ok(Status::Failure),
            other => Err(serde::de::Error::custom(format!(
                "unknown status code {other}"
            ))),
        }
    }
}

/// Service types whose healthy endpoints are rolled up network-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceKind {
    Api,
    P2p,
    History,
    Indexer,
    Asset,
    ContentGateway,
    LightApi,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 7] = [
        ServiceKind::Api,
        ServiceKind::P2p,
        ServiceKind::History,
        ServiceKind::Indexer,
        ServiceKind::Asset,
        ServiceKind::ContentGateway,
        ServiceKind::LightApi,
    ];
}

/// Messages accumulated against one endpoint URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub oks: Vec<String>,
    pub errors: Vec<String>,
}

/// Outcome of comparing the served bp.json with the on-chain copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnchainCheck {
    #[default]
    NotChecked,
    Missing,
    Matches,
    Differs,
}

#[derive(Debug, Clone)]
pub struct ProducerReport {
    pub account: String,
    pub org_name: String,
    pub position: usize,
    pub is_top_tier: bool,
    pub manifest_url: String,
    pub manifest: Option<serde_json::Value>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub oks: Vec<String>,
    pub endpoints: BTreeMap<String, EndpointRecord>,
    pub healthy: BTreeMap<ServiceKind, BTreeSet<String>>,
    pub onchain: OnchainCheck,
    pub proxy_shim: bool,
    status: Status,
    wrong_chain: bool,
}

impl ProducerReport {
    pub fn new(producer: &ProducerInfo) -> Self {
        Self {
            account: producer.owner.clone(),
            org_name: producer.owner.clone(),
            position: producer.position,
            is_top_tier: producer.is_top_tier,
            manifest_url: producer.manifest_url.clone(),
            manifest: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            oks: Vec::new(),
            endpoints: BTreeMap::new(),
            healthy: BTreeMap::new(),
            onchain: OnchainCheck::NotChecked,
            proxy_shim: false,
            status: Status::Ok,
            wrong_chain: false,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn escalate(&mut self, status: Status) {
        self.status.escalate(status);
    }

    pub fn is_wrong_chain(&self) -> bool {
        self.wrong_chain
    }

    /// An endpoint answered for another network. Nothing else is probed for
    /// this producer afterwards.
    pub fn mark_wrong_chain(&mut self) {
        self.wrong_chain = true;
        self.escalate(Status::Failure);
    }

    /// Allocate the record for `url` if it is not known yet.
    pub fn register_endpoint(&mut self, url: &str) {
        self.endpoints.entry(url.to_string()).or_default();
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::error!(producer = %self.account, "{msg}");
        self.errors.push(msg);
        self.escalate(Status::Failure);
    }

    pub fn warning(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::warn!(producer = %self.account, "{msg}");
        self.warnings.push(msg);
    }

    pub fn ok(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::info!(producer = %self.account, "{msg}");
        self.oks.push(msg);
    }

    pub fn endpoint_error(&mut self, url: &str, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::error!(producer = %self.account, url, "{msg}");
        self.endpoints.entry(url.to_string()).or_default().errors.push(msg);
        self.escalate(Status::Failure);
    }

    pub fn endpoint_ok(&mut self, url: &str, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::info!(producer = %self.account, url, "{msg}");
        self.endpoints.entry(url.to_string()).or_default().oks.push(msg);
    }

    pub fn mark_healthy(&mut self, kind: ServiceKind, url: &str) {
        self.healthy.entry(kind).or_default().insert(url.to_string());
    }

    pub fn healthy(&self, kind: ServiceKind) -> impl Iterator<Item = &str> {
        self.healthy
            .get(&kind)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn healthy_count(&self, kind: ServiceKind) -> usize {
        self.healthy.get(&kind).map_or(0, BTreeSet::len)
    }
}

/// Published projection of a [`ProducerReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerSummary {
    pub account: String,
    pub org_name: String,
    pub position: usize,
    pub top21: bool,
    pub status: Status,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub oks: Vec<String>,
    pub endpoint_errors: BTreeMap<String, Vec<String>>,
    pub endpoint_oks: BTreeMap<String, Vec<String>>,
    pub endpoints: Vec<String>,
    pub bp_json: String,
    pub bp_json_content: Option<serde_json::Value>,
    pub onchain_bp_json: OnchainCheck,
    pub patroneos: bool,
    pub api: usize,
    pub p2p: usize,
    pub history: usize,
    pub hyperion: usize,
    pub atomic: usize,
    pub ipfs: usize,
    pub light_api: usize,
}

impl From<&ProducerReport> for ProducerSummary {
    fn from(r: &ProducerReport) -> Self {
        Self {
            account: r.account.clone(),
            org_name: r.org_name.clone(),
            position: r.position,
            top21: r.is_top_tier,
            status: r.status(),
            errors: r.errors.clone(),
            warnings: r.warnings.clone(),
            oks: r.oks.clone(),
            endpoint_errors: r
                .endpoints
                .iter()
                .map(|(url, rec)| (url.clone(), rec.errors.clone()))
                .collect(),
            endpoint_oks: r
                .endpoints
                .iter()
                .map(|(url, rec)| (url.clone(), rec.oks.clone()))
                .collect(),
            endpoints: r.endpoints.keys().cloned().collect(),
            bp_json: r.manifest_url.clone(),
            bp_json_content: r.manifest.clone(),
            onchain_bp_json: r.onchain,
            patroneos: r.proxy_shim,
            api: r.healthy_count(ServiceKind::Api),
            p2p: r.healthy_count(ServiceKind::P2p),
            history: r.healthy_count(ServiceKind::History),
            hyperion: r.healthy_count(ServiceKind::Indexer),
            atomic: r.healthy_count(ServiceKind::Asset),
            ipfs: r.healthy_count(ServiceKind::ContentGateway),
            light_api: r.healthy_count(ServiceKind::LightApi),
        }
    }
}

/// The document published for one chain.
///
/// List order is not meaningful: producers and endpoint lists are shuffled
/// so no operator gets a stable first slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainReport {
    pub producers: Vec<ProducerSummary>,
    pub last_update: String,
    pub last_update_iso: String,
    pub healthy_api_endpoints: Vec<String>,
    pub healthy_p2p_endpoints: Vec<String>,
    pub healthy_history_endpoints: Vec<String>,
    pub healthy_hyperion_endpoints: Vec<String>,
    pub healthy_atomic_endpoints: Vec<String>,
    pub healthy_ipfs_endpoints: Vec<String>,
    pub healthy_light_api_endpoints: Vec<String>,
}

impl ChainReport {
    pub fn collect(reports: &[ProducerReport], now: DateTime<Utc>) -> Self {
        let mut union: BTreeMap<ServiceKind, BTreeSet<String>> = BTreeMap::new();
        for report in reports {
            for kind in ServiceKind::ALL {
                union
                    .entry(kind)
                    .or_default()
                    .extend(report.healthy(kind).map(str::to_string));
            }
        }

        let mut rng = rand::rng();
        let mut take = |kind: ServiceKind| {
            let mut list: Vec<String> = union.remove(&kind).unwrap_or_default().into_iter().collect();
            list.shuffle(&mut rng);
            list
        };
        let healthy_api_endpoints = take(ServiceKind::Api);
        let healthy_p2p_endpoints = take(ServiceKind::P2p);
        let healthy_history_endpoints = take(ServiceKind::History);
        let healthy_hyperion_endpoints = take(ServiceKind::Indexer);
        let healthy_atomic_endpoints = take(ServiceKind::Asset);
        let healthy_ipfs_endpoints = take(ServiceKind::ContentGateway);
        let healthy_light_api_endpoints = take(ServiceKind::LightApi);

        let mut producers: Vec<ProducerSummary> = reports.iter().map(Into::into).collect();
        producers.shuffle(&mut rand::rng());

        Self {
            producers,
            last_update: now.format("%d/%m/%y %H:%M:%S UTC").to_string(),
            last_update_iso: now.to_rfc3339(),
            healthy_api_endpoints,
            healthy_p2p_endpoints,
            healthy_history_endpoints,
            healthy_hyperion_endpoints,
            healthy_atomic_endpoints,
            healthy_ipfs_endpoints,
            healthy_light_api_endpoints,
        }
    }

    pub fn producer(&self, account: &str) -> Option<&ProducerSummary> {
        self.producers.iter().find(|p| p.account == account)
    }
}
