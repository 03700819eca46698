//! History client and row summaries

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::api::models::{GenerationMode, HistoryEntry, JobStatus};
use crate::api::StudioApi;
use crate::error::Result;
use crate::studio::form::{is_pro_model, SQUARE};

/// Read and delete access to the server's job history
#[derive(Clone)]
pub struct HistoryClient {
    api: Arc<dyn StudioApi>,
}

impl HistoryClient {
    pub fn new(api: Arc<dyn StudioApi>) -> Self {
        Self { api }
    }

    pub async fn list(&self) -> Result<Vec<HistoryEntry>> {
        self.api.list_history().await
    }

    pub async fn detail(&self, job_id: &str) -> Result<HistoryEntry> {
        self.api.history_detail(job_id).await
    }

    pub async fn delete(&self, job_id: &str) -> Result<()> {
        self.api.delete_history(job_id).await?;
        info!(job_id = %job_id, "History entry deleted");
        Ok(())
    }

    pub async fn delete_all(&self) -> Result<()> {
        self.api.delete_all_history().await?;
        info!("History cleared");
        Ok(())
    }
}

/// Reference images are not kept in history, so those jobs cannot be replayed
pub fn can_rerun(entry: &HistoryEntry) -> bool {
    !entry.has_reference
}

/// Display fields for one history row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub id: String,
    pub status_icon: &'static str,
    pub status: JobStatus,
    pub tier: &'static str,
    pub mode: &'static str,
    pub aspect_ratio: String,
    pub success_count: usize,
    pub total: usize,
    pub date: String,
    pub rerunnable: bool,
}

impl HistorySummary {
    pub fn from_entry(entry: &HistoryEntry) -> Self {
        Self {
            id: entry.id.clone(),
            status_icon: status_icon(entry.status),
            status: entry.status,
            tier: tier_label(&entry.model),
            mode: mode_label(entry.mode),
            aspect_ratio: entry
                .aspect_ratio
                .clone()
                .filter(|ratio| !ratio.is_empty())
                .unwrap_or_else(|| SQUARE.to_string()),
            success_count: entry.success_count,
            total: entry.total,
            date: entry
                .created_at
                .as_deref()
                .map(format_timestamp)
                .unwrap_or_default(),
            rerunnable: can_rerun(entry),
        }
    }
}

pub fn status_icon(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Completed => "✅",
        JobStatus::Error => "❌",
        JobStatus::Cancelled => "⏹",
        JobStatus::Processing => "🔄",
        JobStatus::Queued | JobStatus::Unknown => "⏳",
    }
}

pub fn tier_label(model: &str) -> &'static str {
    if is_pro_model(model) {
        "Pro"
    } else {
        "Fast"
    }
}

pub fn mode_label(mode: Option<GenerationMode>) -> &'static str {
    match mode.unwrap_or_default() {
        GenerationMode::Sequential => "Sequential",
        GenerationMode::Parallel => "Parallel",
    }
}

/// `YYYY-MM-DD HH:MM` for server timestamps; unparseable input is returned as-is
pub fn format_timestamp(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}
