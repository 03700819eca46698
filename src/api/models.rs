//! Request and response models for the generation server's JSON API

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// How the server works through a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    #[default]
    Sequential,
    Parallel,
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationMode::Sequential => write!(f, "sequential"),
            GenerationMode::Parallel => write!(f, "parallel"),
        }
    }
}

impl FromStr for GenerationMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(GenerationMode::Sequential),
            "parallel" => Ok(GenerationMode::Parallel),
            other => Err(AppError::InvalidRequest(format!("Unknown mode '{}'", other))),
        }
    }
}

/// Classification tag for a reference image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    #[default]
    Person,
    Animal,
    Object,
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceType::Person => write!(f, "person"),
            ReferenceType::Animal => write!(f, "animal"),
            ReferenceType::Object => write!(f, "object"),
        }
    }
}

impl FromStr for ReferenceType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "person" => Ok(ReferenceType::Person),
            "animal" => Ok(ReferenceType::Animal),
            "object" => Ok(ReferenceType::Object),
            other => Err(AppError::InvalidRequest(format!(
                "Unknown reference type '{}'",
                other
            ))),
        }
    }
}

/// Overall job status as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum JobStatus {
    /// Accepted but not yet picked up; the server reports this as `pending`
    Queued,
    Processing,
    Completed,
    Error,
    Cancelled,
    /// Any status this client does not know about
    Unknown,
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "queued" | "pending" => JobStatus::Queued,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "error" => JobStatus::Error,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Unknown,
        }
    }
}

impl JobStatus {
    /// Polling stops once one of these is observed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Error | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Status of one prompt inside a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ResultStatus {
    Pending,
    Generating,
    Completed,
    Failed,
    Cancelled,
    Unknown,
}

impl From<String> for ResultStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => ResultStatus::Pending,
            "generating" => ResultStatus::Generating,
            "completed" => ResultStatus::Completed,
            "failed" => ResultStatus::Failed,
            "cancelled" => ResultStatus::Cancelled,
            _ => ResultStatus::Unknown,
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResultStatus::Pending => "pending",
            ResultStatus::Generating => "generating",
            ResultStatus::Completed => "completed",
            ResultStatus::Failed => "failed",
            ResultStatus::Cancelled => "cancelled",
            ResultStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// `POST validate-key` body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidateKeyRequest {
    pub api_key: String,
}

/// `POST validate-key` response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeyValidation {
    #[serde(default)]
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KeyValidation {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// `POST generate` body
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenerateRequest {
    pub api_key: String,
    pub prompts: Vec<String>,
    pub model: String,
    pub mode: GenerationMode,
    pub aspect_ratio: String,
    pub master_prompts: String,
    pub suffix: String,
    pub negative_prompts: String,
}

/// `POST generate-with-reference` body
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenerateWithReferenceRequest {
    #[serde(flatten)]
    pub base: GenerateRequest,
    /// Self-contained data URL of the reference image
    pub reference_image: String,
    pub reference_type: ReferenceType,
}

/// Successful `generate` / `generate-with-reference` / `rerun` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobStarted {
    pub job_id: String,
    #[serde(default)]
    pub total: Option<usize>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST analyze-reference-type` body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzeReferenceRequest {
    pub api_key: String,
    pub reference_image: String,
}

/// Successful `analyze-reference-type` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReferenceAnalysis {
    #[serde(rename = "type")]
    pub reference_type: ReferenceType,
}

/// One prompt's outcome inside a job snapshot
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JobResult {
    #[serde(default)]
    pub prompt: String,
    pub status: ResultStatus,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Job state returned by `GET status/{job_id}`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub completed: usize,
    #[serde(default)]
    pub failed: usize,
    #[serde(default)]
    pub results: Vec<JobResult>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub mode: Option<GenerationMode>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub prompts: Vec<String>,
    #[serde(default)]
    pub master_prompts: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub negative_prompts: String,
    #[serde(default)]
    pub has_reference: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusEnvelope {
    pub job: JobSnapshot,
}

/// A finished job as recorded in the server's history
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub mode: Option<GenerationMode>,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub completed: usize,
    #[serde(default)]
    pub failed: usize,
    #[serde(default)]
    pub prompts: Vec<String>,
    #[serde(default)]
    pub master_prompts: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub negative_prompts: String,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub success_count: usize,
    #[serde(default)]
    pub has_reference: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryList {
    #[serde(default)]
    pub jobs: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryDetail {
    pub job: HistoryEntry,
}

/// `POST rerun/{job_id}` body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerunRequest {
    pub api_key: String,
}

/// Server-side auto-cleanup state
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CleanupInfo {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub last_cleanup: Option<String>,
    #[serde(default)]
    pub next_cleanup: Option<String>,
    #[serde(default)]
    pub files_deleted_last: u64,
    #[serde(default = "default_cleanup_days")]
    pub cleanup_days: u32,
}

fn default_cleanup_days() -> u32 {
    7
}

/// Generated-image storage usage
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StorageInfo {
    #[serde(default)]
    pub total_files: u64,
    #[serde(default)]
    pub total_size_mb: f64,
}

/// `GET cleanup/status` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanupStatusResponse {
    #[serde(default)]
    pub cleanup: CleanupInfo,
    #[serde(default)]
    pub storage: StorageInfo,
}

/// `POST cleanup/now` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanupRun {
    #[serde(default)]
    pub deleted: u64,
}

/// Generic success response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SuccessResponse {
    #[serde(default)]
    pub message: Option<String>,
}
