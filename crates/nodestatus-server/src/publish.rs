use std::path::{Path, PathBuf};

use nodestatus::ChainReport;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Final location of a chain's document.
pub fn report_path(pub_path: &Path, chain_id: &str) -> PathBuf {
    pub_path.join(format!("{chain_id}.json"))
}

/// Write `{pub_path}/{chain_id}.json`. The document goes to a temporary file
/// in the same directory first and is renamed over the old one, so readers
/// never see a half-written report.
pub async fn publish_report(
    pub_path: &Path,
    chain_id: &str,
    report: &ChainReport,
) -> Result<PathBuf, PublishError> {
    let body = serde_json::to_vec_pretty(report)?;
    tokio::fs::create_dir_all(pub_path).await?;

    let target = report_path(pub_path, chain_id);
    let tmp = pub_path.join(format!(".{chain_id}.json.tmp"));
    tokio::fs::write(&tmp, &body).await?;
    if let Err(e) = tokio::fs::rename(&tmp, &target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(target)
}
