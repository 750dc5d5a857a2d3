//! The per-producer pipeline and the chain-wide collection around it.
//!
//! One [`ProducerReport`] per producer travels through
//! manifest fetch, classification, the optional on-chain cross-check and the
//! probes, owned by that producer's future alone. Producers run concurrently;
//! probes within a producer run one at a time in manifest order.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::chain::ChainInfo;
use crate::classify::classify;
use crate::error::DiscoveryError;
use crate::manifest::{
    fetch_manifest, parse_manifest, resolve_manifest_url, truncate_diagnostic, DeclaredNode,
    Feature, NodeManifest,
};
use crate::metrics::{ManifestSample, MetricsConfig, MetricsPusher};
use crate::onchain;
use crate::probe::Prober;
use crate::producer::{discover_producers, ProducerInfo};
use crate::report::{ChainReport, ProducerReport};

pub const DEFAULT_CONCURRENCY: usize = 4;
const DIAGNOSTIC_CHARS: usize = 75;

#[derive(Debug, Clone)]
pub struct Verifier {
    http: reqwest::Client,
    metrics: MetricsPusher,
    concurrency: usize,
}

impl Verifier {
    pub fn new(http: reqwest::Client, metrics: MetricsConfig) -> Self {
        Self {
            metrics: MetricsPusher::new(http.clone(), metrics),
            http,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Number of producers verified at the same time. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// HTTP client shared by every probe. Per-request timeouts come from the
    /// chain; this one only caps anything that forgot to set its own.
    pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
    }

    /// Discover, verify every producer and fold the results.
    ///
    /// Only a discovery failure is an error; a chain whose producers all fail
    /// every check still yields a complete report.
    pub async fn verify_chain(&self, chain: &ChainInfo) -> Result<ChainReport, DiscoveryError> {
        let producers = discover_producers(&self.http, chain).await?;
        let registered = self.testnet_registrations(chain).await;

        let reports: Vec<ProducerReport> = stream::iter(producers)
            .map(|producer| self.verify_registered(chain, producer, registered.as_ref()))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        tracing::info!(chain = %chain.name, producers = reports.len(), "Chain verification finished");
        Ok(ChainReport::collect(&reports, Utc::now()))
    }

    async fn verify_registered(
        &self,
        chain: &ChainInfo,
        producer: ProducerInfo,
        registered: Option<&HashSet<String>>,
    ) -> ProducerReport {
        let mut report = self.verify_producer(chain, producer).await;
        if let Some(registered) = registered {
            record_registration(&mut report, registered);
        }
        report
    }

    /// Owners registered on any of the chain's testnets. `None` when the chain
    /// has no testnets or one of them could not be read.
    async fn testnet_registrations(&self, chain: &ChainInfo) -> Option<HashSet<String>> {
        if chain.testnets.is_empty() {
            return None;
        }
        let mut owners = HashSet::new();
        for testnet in &chain.testnets {
            match discover_producers(&self.http, &chain.for_testnet(testnet)).await {
                Ok(producers) => owners.extend(producers.into_iter().map(|p| p.owner)),
                Err(e) => {
                    tracing::warn!(
                        chain = %chain.name,
                        testnet = %testnet.name,
                        error = %e,
                        "Skipping testnet registration check"
                    );
                    return None;
                }
            }
        }
        Some(owners)
    }

    pub async fn verify_producer(&self, chain: &ChainInfo, mut producer: ProducerInfo) -> ProducerReport {
        tracing::info!(chain = %chain.name, producer = %producer.owner, "Checking producer");
        resolve_manifest_url(&self.http, chain, &mut producer).await;
        let mut report = ProducerReport::new(&producer);

        let Some(manifest) = self.load_manifest(chain, &producer, &mut report).await else {
            return report;
        };

        record_org(&manifest, &mut report);
        report.manifest = Some(manifest.raw.clone());

        let classification = classify(&manifest.nodes);
        classification.apply(&mut report);

        if chain.onchain_manifest {
            onchain::cross_check(&self.http, chain, &manifest.raw, &mut report).await;
        }

        let prober = Prober::new(&self.http, chain);
        for node in &classification.probeable {
            probe_node(&prober, node, &mut report).await;
            if report.is_wrong_chain() {
                tracing::warn!(producer = %report.account, "Wrong chain id, skipping remaining checks");
                break;
            }
        }
        report
    }

    /// Fetch and parse the bp.json. Every failure is recorded on `report` and
    /// ends this producer's verification.
    async fn load_manifest(
        &self,
        chain: &ChainInfo,
        producer: &ProducerInfo,
        report: &mut ProducerReport,
    ) -> Option<NodeManifest> {
        let response = match fetch_manifest(&self.http, chain, &producer.manifest_url).await {
            Ok(response) => response,
            Err(e) => {
                report.error(format!(
                    "Error getting {} bp.json ({}): {e}",
                    producer.owner, producer.manifest_url
                ));
                self.metrics
                    .push(&chain.name, &producer.owner, ManifestSample::unreachable())
                    .await;
                return None;
            }
        };

        let mut sample = ManifestSample {
            accessible: false,
            status_code: Some(response.status),
            response_time: Some(response.elapsed),
        };

        let result = if response.status != 200 {
            report.error(format!(
                "Error getting bp.json: {} - {}",
                response.status,
                truncate_diagnostic(&response.body, DIAGNOSTIC_CHARS)
            ));
            None
        } else {
            match parse_manifest(&response.body) {
                Ok(manifest) => {
                    sample.accessible = true;
                    Some(manifest)
                }
                Err(e) => {
                    report.error(format!(
                        "Error getting {} bp.json ({}): {e}",
                        producer.owner, producer.manifest_url
                    ));
                    None
                }
            }
        };

        self.metrics.push(&chain.name, &producer.owner, sample).await;
        result
    }
}

fn record_org(manifest: &NodeManifest, report: &mut ProducerReport) {
    if manifest.org.has_identity() {
        report.ok("github_user present in bp.json");
    } else {
        report.warning("github_user missing in bp.json");
    }
    if let Some(name) = manifest.org.candidate_name.as_deref().filter(|n| !n.trim().is_empty()) {
        report.org_name = name.to_string();
    }
}

fn record_registration(report: &mut ProducerReport, registered: &HashSet<String>) {
    if registered.contains(&report.account) {
        let msg = format!("Producer name {} is registered as producer in testnet", report.account);
        report.ok(msg);
    } else {
        let msg = format!(
            "Producer {} might not be registered or registered with some other name in testnet",
            report.account
        );
        report.warning(msg);
    }
}

/// Run every probe the node's roles and features call for.
async fn probe_node(prober: &Prober<'_>, node: &DeclaredNode, report: &mut ProducerReport) {
    if node.is_query() {
        let urls: Vec<&str> = node.http_endpoints().collect();

        if node.has_feature(&Feature::ChainApi) {
            for url in &urls {
                prober.check_chain_api(url, report).await;
                if report.is_wrong_chain() {
                    return;
                }
                prober.check_proxy_shim(url, report).await;
            }
        }
        if node.has_feature(&Feature::AccountQuery) {
            for url in &urls {
                prober.check_account_query(url, report).await;
            }
        }
        if node.has_feature(&Feature::HistoryV1) {
            for url in &urls {
                prober.check_history(url, report).await;
            }
        }
        if node.has_feature(&Feature::IndexerV2) {
            for url in &urls {
                prober.check_indexer(url, report).await;
            }
        }
        if node.has_feature(&Feature::AssetApi) {
            for url in &urls {
                prober.check_asset(url, report).await;
            }
        }
        if node.has_feature(&Feature::ContentGateway) {
            for url in &urls {
                prober.check_content_gateway(url, report).await;
            }
        }
        if node.has_feature(&Feature::LightApi) {
            for url in &urls {
                prober.check_light_api(url, report).await;
            }
        }
    }

    if node.is_seed() {
        if let Some(endpoint) = node.p2p_endpoint.as_deref() {
            prober.check_p2p(endpoint, report).await;
        }
    }
}
