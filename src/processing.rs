use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};
use url::Url;

use crate::export::{ExportOptions, ExportOutcome};
use crate::exporter::MediaUrlExporter;

/// Result of exporting one input of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReportEntry {
    pub source: String,
    pub status: ExportStatus,
    pub outcome: Option<ExportOutcome>,
    pub error_message: Option<String>,
    pub error_detail: Option<String>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportStatus {
    Completed,
    Failed,
}

/// Overall batch results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_time: Duration,
    pub entries: Vec<ExportReportEntry>,
}

impl BatchReport {
    /// Write the report as pretty JSON
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json_data = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json_data).await?;
        info!("💾 Report saved to: {}", path.display());
        Ok(())
    }

    pub fn success_rate(&self) -> f64 {
        if self.total > 0 {
            self.succeeded as f64 / self.total as f64 * 100.0
        } else {
            0.0
        }
    }
}

/// Exports many URLs with bounded concurrency
pub struct BatchExporter {
    exporter: Arc<MediaUrlExporter>,
    worker_semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl BatchExporter {
    pub fn new(exporter: Arc<MediaUrlExporter>, max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        info!("🔧 Initializing BatchExporter with {} workers", max_workers);

        Self {
            exporter,
            worker_semaphore: Arc::new(Semaphore::new(max_workers)),
            max_concurrent: max_workers,
        }
    }

    /// Export every URL; entries come back in input order.
    pub async fn export_all(&self, urls: Vec<Url>, options: &ExportOptions) -> BatchReport {
        let started_at = Utc::now();
        let start_time = Instant::now();
        let total = urls.len();

        if urls.is_empty() {
            warn!("Nothing to export");
        }

        let (tx, mut rx) = mpsc::channel(self.max_concurrent);

        for (index, url) in urls.into_iter().enumerate() {
            let exporter = Arc::clone(&self.exporter);
            let semaphore = Arc::clone(&self.worker_semaphore);
            let options = options.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let entry = match semaphore.acquire().await {
                    Ok(_permit) => {
                        info!("📦 Exporting {}/{}: {}", index + 1, total, url);
                        export_one(&exporter, url, &options).await
                    }
                    Err(e) => failed_entry(url.to_string(), e.to_string(), Duration::ZERO),
                };

                if let Err(e) = tx.send((index, entry)).await {
                    error!("Failed to send result: {}", e);
                }
            });
        }

        // Drop the original sender to close the channel when all tasks complete
        drop(tx);

        let mut indexed = Vec::with_capacity(total);
        while let Some((index, entry)) = rx.recv().await {
            match entry.status {
                ExportStatus::Completed => info!("✅ Exported: {}", entry.source),
                ExportStatus::Failed => warn!(
                    "❌ Failed: {} - {}",
                    entry.source,
                    entry.error_detail.as_deref().unwrap_or("Unknown error")
                ),
            }
            indexed.push((index, entry));
        }
        indexed.sort_by_key(|(index, _)| *index);

        let entries: Vec<ExportReportEntry> = indexed.into_iter().map(|(_, entry)| entry).collect();
        let succeeded = entries
            .iter()
            .filter(|e| e.status == ExportStatus::Completed)
            .count();

        BatchReport {
            started_at,
            total: entries.len(),
            succeeded,
            failed: entries.len() - succeeded,
            total_time: start_time.elapsed(),
            entries,
        }
    }
}

async fn export_one(exporter: &MediaUrlExporter, url: Url, options: &ExportOptions) -> ExportReportEntry {
    let start_time = Instant::now();
    match exporter.export_url(&url, options).await {
        Ok(outcome) => ExportReportEntry {
            source: url.to_string(),
            status: ExportStatus::Completed,
            outcome: Some(outcome),
            error_message: None,
            error_detail: None,
            elapsed: start_time.elapsed(),
        },
        Err(e) => {
            let mut entry = failed_entry(url.to_string(), e.to_string(), start_time.elapsed());
            entry.error_message = Some(e.description().to_string());
            entry
        }
    }
}

fn failed_entry(source: String, detail: String, elapsed: Duration) -> ExportReportEntry {
    ExportReportEntry {
        source,
        status: ExportStatus::Failed,
        outcome: None,
        error_message: Some(crate::error::EXPORT_FAILURE_MESSAGE.to_string()),
        error_detail: Some(detail),
        elapsed,
    }
}
