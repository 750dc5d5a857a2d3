use super::{base, Prober};
use crate::report::{ProducerReport, ServiceKind};
use crate::retry::Operation;

/// Small, widely pinned object every public gateway should serve.
pub const PROBE_CONTENT_ID: &str = "QmWnfdZkwWJxabDUbimrtaweYF8u9TaESDBM8xvRxxbQxv";

impl Prober<'_> {
    pub async fn check_content_gateway(&self, url: &str, report: &mut ProducerReport) {
        let object_url = format!("{}/ipfs/{PROBE_CONTENT_ID}", base(url));
        match self
            .fetch(Operation::ContentGateway, |http| http.get(&object_url))
            .await
            .and_then(|r| r.success())
        {
            Ok(_) => {
                report.mark_healthy(ServiceKind::ContentGateway, url);
                report.endpoint_ok(url, format!("IPFS is ok on {url}"));
            }
            Err(e) => report.endpoint_error(url, format!("Error getting IPFS object from {object_url}: {e}")),
        }
    }
}
