use super::{base, Prober};
use crate::report::{ProducerReport, ServiceKind};
use crate::retry::Operation;

pub const LIGHT_API_STATUS_PATH: &str = "/api/status";

impl Prober<'_> {
    /// Light API answers its status route with a 2xx once it is synced.
    pub async fn check_light_api(&self, url: &str, report: &mut ProducerReport) {
        let status_url = format!("{}{LIGHT_API_STATUS_PATH}", base(url));
        match self
            .fetch(Operation::LightApi, |http| http.get(&status_url))
            .await
            .and_then(|r| r.success())
        {
            Ok(_) => {
                report.mark_healthy(ServiceKind::LightApi, url);
                report.endpoint_ok(url, format!("Light API is ok on {url}"));
            }
            Err(e) => report.endpoint_error(url, format!("Error getting light API status from {status_url}: {e}")),
        }
    }
}
