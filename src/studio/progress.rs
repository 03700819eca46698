//! Progress reporting: pure mapping from a job snapshot to display state

use serde::Serialize;
use tracing::warn;

use crate::api::models::{JobSnapshot, JobStatus, ResultStatus};
use crate::response::AssetUrls;

/// Visual weight of a badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Secondary,
    Primary,
    Success,
    Danger,
    Warning,
}

/// Icon, label and severity shown for one prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub icon: &'static str,
    pub label: &'static str,
    pub severity: Severity,
}

/// Display status of a single prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeStatus {
    Pending,
    Generating,
    Completed,
    Failed,
    Cancelled,
}

impl BadgeStatus {
    pub fn badge(self) -> Badge {
        match self {
            BadgeStatus::Pending => Badge {
                icon: "⏳",
                label: "Pending",
                severity: Severity::Secondary,
            },
            BadgeStatus::Generating => Badge {
                icon: "🔄",
                label: "Generating...",
                severity: Severity::Primary,
            },
            BadgeStatus::Completed => Badge {
                icon: "✅",
                label: "Completed",
                severity: Severity::Success,
            },
            BadgeStatus::Failed => Badge {
                icon: "❌",
                label: "Failed",
                severity: Severity::Danger,
            },
            BadgeStatus::Cancelled => Badge {
                icon: "⏹",
                label: "Cancelled",
                severity: Severity::Warning,
            },
        }
    }
}

impl From<ResultStatus> for BadgeStatus {
    fn from(status: ResultStatus) -> Self {
        match status {
            ResultStatus::Pending => BadgeStatus::Pending,
            ResultStatus::Generating => BadgeStatus::Generating,
            ResultStatus::Completed => BadgeStatus::Completed,
            ResultStatus::Failed => BadgeStatus::Failed,
            ResultStatus::Cancelled => BadgeStatus::Cancelled,
            ResultStatus::Unknown => {
                warn!("Unrecognised result status, showing as pending");
                BadgeStatus::Pending
            }
        }
    }
}

/// `round(100 * completed / total)`, 0 for an empty job
pub fn percentage(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u32
}

/// One row of the prompt list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressItem {
    pub index: usize,
    pub prompt: String,
    pub status: BadgeStatus,
    pub badge: Badge,
    pub filename: Option<String>,
    pub error: Option<String>,
}

/// A finished image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryItem {
    pub index: usize,
    pub prompt: String,
    pub filename: String,
    pub url: String,
}

/// Counts, percentage and per-prompt badges for one job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressView {
    pub job_id: String,
    pub status: JobStatus,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// `completed - failed`; the server counts failures as completed
    pub succeeded: usize,
    pub pending: usize,
    pub percentage: u32,
    pub items: Vec<ProgressItem>,
}

impl ProgressView {
    /// View right after submission: every prompt pending
    pub fn initial(job_id: impl Into<String>, prompts: &[String]) -> Self {
        let items = prompts
            .iter()
            .enumerate()
            .map(|(index, prompt)| pending_item(index, prompt))
            .collect();

        Self {
            job_id: job_id.into(),
            status: JobStatus::Queued,
            total: prompts.len(),
            completed: 0,
            failed: 0,
            succeeded: 0,
            pending: prompts.len(),
            percentage: 0,
            items,
        }
    }

    /// Build the view for a snapshot.
    ///
    /// `submitted` is the locally known prompt list; rows the snapshot does
    /// not cover yet fall back to it as pending.
    pub fn from_snapshot(snapshot: &JobSnapshot, submitted: &[String]) -> Self {
        let prompts: &[String] = if submitted.is_empty() {
            &snapshot.prompts
        } else {
            submitted
        };
        let rows = prompts.len().max(snapshot.results.len());

        let mut items: Vec<ProgressItem> = (0..rows)
            .map(|index| match snapshot.results.get(index) {
                Some(result) => {
                    let status = BadgeStatus::from(result.status);
                    let prompt = if result.prompt.is_empty() {
                        prompts.get(index).cloned().unwrap_or_default()
                    } else {
                        result.prompt.clone()
                    };
                    ProgressItem {
                        index,
                        prompt,
                        status,
                        badge: status.badge(),
                        filename: result.filename.clone(),
                        error: result.error.clone(),
                    }
                }
                None => pending_item(index, prompts.get(index).map_or("", String::as_str)),
            })
            .collect();

        // In-flight items are not reported individually; the next one in line is
        if snapshot.status == JobStatus::Processing && snapshot.completed < snapshot.total {
            if let Some(item) = items.get_mut(snapshot.completed) {
                if !matches!(item.status, BadgeStatus::Completed | BadgeStatus::Failed) {
                    item.status = BadgeStatus::Generating;
                    item.badge = BadgeStatus::Generating.badge();
                }
            }
        }

        Self {
            job_id: snapshot.id.clone(),
            status: snapshot.status,
            total: snapshot.total,
            completed: snapshot.completed,
            failed: snapshot.failed,
            succeeded: snapshot.completed.saturating_sub(snapshot.failed),
            pending: snapshot.total.saturating_sub(snapshot.completed),
            percentage: percentage(snapshot.completed, snapshot.total),
            items,
        }
    }

    /// `"4 / 10 · 40%"`
    pub fn summary(&self) -> String {
        format!("{} / {} · {}%", self.completed, self.total, self.percentage)
    }

    /// Completed images, in prompt order
    pub fn gallery(&self, urls: &AssetUrls) -> Vec<GalleryItem> {
        self.items
            .iter()
            .filter(|item| item.status == BadgeStatus::Completed)
            .filter_map(|item| {
                item.filename.as_ref().map(|filename| GalleryItem {
                    index: item.index,
                    prompt: item.prompt.clone(),
                    filename: filename.clone(),
                    url: urls.image_url(filename),
                })
            })
            .collect()
    }

    /// Message shown when the gallery is empty
    pub fn empty_gallery_message(&self) -> &'static str {
        if self.status == JobStatus::Cancelled {
            "Cancelled. No images generated."
        } else {
            "No images generated."
        }
    }
}

fn pending_item(index: usize, prompt: &str) -> ProgressItem {
    ProgressItem {
        index,
        prompt: prompt.to_string(),
        status: BadgeStatus::Pending,
        badge: BadgeStatus::Pending.badge(),
        filename: None,
        error: None,
    }
}
