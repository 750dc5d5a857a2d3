//! Scheduled verification runs.

use std::path::Path;
use std::time::Duration;

use nodestatus::{ChainInfo, Verifier};
use rand::Rng;

use crate::publish::publish_report;

/// Verify and publish every chain once. A chain that fails discovery or
/// publishing is logged and skipped; the others still run.
pub async fn run_once(verifier: &Verifier, chains: &[ChainInfo], pub_path: &Path) -> usize {
    let mut published = 0;
    for chain in chains {
        tracing::info!(chain = %chain.name, "Inspecting chain");
        let report = match verifier.verify_chain(chain).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(chain = %chain.name, error = %e, "Too many retries getting producers");
                continue;
            }
        };
        match publish_report(pub_path, &chain.chain_id, &report).await {
            Ok(path) => {
                published += 1;
                tracing::info!(chain = %chain.name, path = %path.display(), "Report published");
            }
            Err(e) => tracing::error!(chain = %chain.name, error = %e, "Failed to publish report"),
        }
    }
    published
}

/// Interval plus a random delay in `[0, jitter]`.
pub fn next_delay(interval: Duration, jitter: Duration) -> Duration {
    let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
    interval + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
}

/// Run immediately, then forever on the jittered interval.
pub async fn run_forever(
    verifier: Verifier,
    chains: Vec<ChainInfo>,
    pub_path: &Path,
    interval: Duration,
    jitter: Duration,
) {
    loop {
        let published = run_once(&verifier, &chains, pub_path).await;
        let delay = next_delay(interval, jitter);
        tracing::info!(published, next_run_secs = delay.as_secs(), "Check run finished");
        tokio::time::sleep(delay).await;
    }
}
