use crate::output::ConversionReport;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Append-only record of successful conversions, one line each:
/// `<RFC 3339 timestamp>: <report JSON>`.
#[derive(Debug, Clone)]
pub struct UsageLog {
    path: Option<PathBuf>,
}

impl UsageLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Failures are logged, never returned; a conversion that succeeded stays
    /// successful.
    pub async fn record(&self, report: &ConversionReport) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append(path, report).await {
            warn!("failed to write usage log {}: {:#}", path.display(), e);
        }
    }
}

async fn append(path: &Path, report: &ConversionReport) -> Result<()> {
    let json = serde_json::to_string(report).context("serializing usage record")?;
    let line = format!("{}: {}\n", Utc::now().to_rfc3339(), json);

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    file.write_all(line.as_bytes())
        .await
        .with_context(|| format!("appending to {}", path.display()))?;
    file.flush().await?;
    Ok(())
}
