//! Server-side storage cleanup

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::api::models::CleanupStatusResponse;
use crate::api::StudioApi;
use crate::error::Result;
use crate::studio::history::format_timestamp;

/// Flattened cleanup and storage figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupStatus {
    pub enabled: bool,
    pub cleanup_days: u32,
    pub last_cleanup: Option<String>,
    pub next_cleanup: Option<String>,
    pub files_deleted_last: u64,
    pub total_files: u64,
    pub total_size_mb: f64,
}

impl CleanupStatus {
    /// Last run for display; `Never` when cleanup has not run yet
    pub fn last_cleanup_display(&self) -> String {
        self.last_cleanup
            .as_deref()
            .map(format_timestamp)
            .unwrap_or_else(|| "Never".to_string())
    }

    pub fn next_cleanup_display(&self) -> String {
        self.next_cleanup
            .as_deref()
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string())
    }
}

impl From<CleanupStatusResponse> for CleanupStatus {
    fn from(response: CleanupStatusResponse) -> Self {
        Self {
            enabled: response.cleanup.enabled,
            cleanup_days: response.cleanup.cleanup_days,
            last_cleanup: response.cleanup.last_cleanup,
            next_cleanup: response.cleanup.next_cleanup,
            files_deleted_last: response.cleanup.files_deleted_last,
            total_files: response.storage.total_files,
            total_size_mb: response.storage.total_size_mb,
        }
    }
}

#[derive(Clone)]
pub struct CleanupClient {
    api: Arc<dyn StudioApi>,
}

impl CleanupClient {
    pub fn new(api: Arc<dyn StudioApi>) -> Self {
        Self { api }
    }

    pub async fn status(&self) -> Result<CleanupStatus> {
        Ok(self.api.cleanup_status().await?.into())
    }

    /// Run cleanup immediately and return the number of files deleted
    pub async fn run_now(&self) -> Result<u64> {
        let run = self.api.cleanup_now().await?;
        info!(deleted = run.deleted, "Cleanup finished");
        Ok(run.deleted)
    }
}
