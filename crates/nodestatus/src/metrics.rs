//! Optional Pushgateway side channel for bp.json fetch outcomes.
//!
//! Without an endpoint every push is a no-op. A failed push is logged and
//! otherwise ignored; it never reaches a report.

use std::time::Duration;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

const JOB: &str = "nodestatus";
const LABELS: [&str; 4] = ["chain", "producer", "checker_host", "checker_ip"];

/// Who is doing the checking, attached to every sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Pushgateway base URL. `None` disables pushing.
    pub endpoint: Option<String>,
    pub checker_host: String,
    pub checker_ip: String,
}

impl MetricsConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Resolve `checker_host` to the address reported as `checker_ip`.
    /// Resolution failure leaves the label empty.
    pub async fn with_resolved_ip(endpoint: Option<String>, checker_host: String) -> Self {
        let checker_ip = match tokio::net::lookup_host((checker_host.as_str(), 0)).await {
            Ok(mut addrs) => addrs.next().map(|a| a.ip().to_string()).unwrap_or_default(),
            Err(e) => {
                tracing::debug!(host = %checker_host, error = %e, "Could not resolve checker host");
                String::new()
            }
        };
        Self {
            endpoint,
            checker_host,
            checker_ip,
        }
    }
}

/// One bp.json fetch as seen by the metrics channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManifestSample {
    pub accessible: bool,
    /// Absent when the request never produced a response.
    pub status_code: Option<u16>,
    pub response_time: Option<Duration>,
}

impl ManifestSample {
    pub fn unreachable() -> Self {
        Self {
            accessible: false,
            status_code: None,
            response_time: None,
        }
    }
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<GaugeVec, prometheus::Error> {
    let gauge = GaugeVec::new(Opts::new(format!("{JOB}_{name}"), help), &LABELS)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Text exposition for one sample, built in a throwaway registry so nothing
/// leaks between producers.
pub fn render(
    config: &MetricsConfig,
    chain: &str,
    producer: &str,
    sample: &ManifestSample,
) -> Result<String, prometheus::Error> {
    let registry = Registry::new();
    let labels = [
        chain,
        producer,
        config.checker_host.as_str(),
        config.checker_ip.as_str(),
    ];

    gauge(&registry, "bpjson_accessible", "BP json accessible")?
        .with_label_values(&labels)
        .set(if sample.accessible { 1.0 } else { 0.0 });
    if let Some(code) = sample.status_code {
        gauge(&registry, "bpjson_status_code", "BP json status code")?
            .with_label_values(&labels)
            .set(f64::from(code));
    }
    if let Some(elapsed) = sample.response_time {
        gauge(&registry, "bpjson_response_time", "BP json response time")?
            .with_label_values(&labels)
            .set(elapsed.as_secs_f64());
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Grouping key URL for one producer on one chain.
pub fn push_url(endpoint: &str, chain: &str, producer: &str) -> String {
    format!(
        "{}/metrics/job/{JOB}/chain/{chain}/producer/{producer}",
        endpoint.trim_end_matches('/')
    )
}

#[derive(Debug, Clone)]
pub struct MetricsPusher {
    http: reqwest::Client,
    config: MetricsConfig,
}

impl MetricsPusher {
    pub fn new(http: reqwest::Client, config: MetricsConfig) -> Self {
        Self { http, config }
    }

    pub async fn push(&self, chain: &str, producer: &str, sample: ManifestSample) {
        let Some(endpoint) = self.config.endpoint.as_deref() else {
            return;
        };
        let body = match render(&self.config, chain, producer, &sample) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(chain, producer, error = %e, "Failed to encode metrics");
                return;
            }
        };
        let url = push_url(endpoint, chain, producer);
        let result = self
            .http
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, TextEncoder::new().format_type())
            .body(body)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = result {
            tracing::warn!(chain, producer, url = %url, error = %e, "Failed to push metrics");
        }
    }
}
