//! HTTP client for the generation server

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::models::{
    AnalyzeReferenceRequest, CleanupRun, CleanupStatusResponse, GenerateRequest,
    GenerateWithReferenceRequest, HistoryDetail, HistoryEntry, HistoryList, JobSnapshot,
    JobStarted, KeyValidation, ReferenceAnalysis, ReferenceType, RerunRequest, StatusEnvelope,
    SuccessResponse, ValidateKeyRequest,
};
use crate::config::Settings;
use crate::error::{AppError, Result};

/// Every call the studio makes against the server.
///
/// `{"success": false, "error": ...}` bodies surface as [`AppError::Backend`]
/// and connection failures as [`AppError::Transport`].
#[async_trait]
pub trait StudioApi: Send + Sync {
    /// Check a credential; a wrong key is `Ok` with `valid == false`
    async fn validate_key(&self, api_key: &str) -> Result<KeyValidation>;

    async fn generate(&self, request: &GenerateRequest) -> Result<JobStarted>;

    async fn generate_with_reference(
        &self,
        request: &GenerateWithReferenceRequest,
    ) -> Result<JobStarted>;

    async fn analyze_reference_type(
        &self,
        api_key: &str,
        reference_image: &str,
    ) -> Result<ReferenceType>;

    async fn job_status(&self, job_id: &str) -> Result<JobSnapshot>;

    async fn cancel_job(&self, job_id: &str) -> Result<()>;

    /// ZIP archive of every completed image in a job
    async fn download_all(&self, job_id: &str) -> Result<Vec<u8>>;

    async fn delete_job(&self, job_id: &str) -> Result<()>;

    async fn list_history(&self) -> Result<Vec<HistoryEntry>>;

    async fn history_detail(&self, job_id: &str) -> Result<HistoryEntry>;

    async fn delete_history(&self, job_id: &str) -> Result<()>;

    async fn delete_all_history(&self) -> Result<()>;

    async fn rerun(&self, job_id: &str, api_key: &str) -> Result<JobStarted>;

    async fn cleanup_status(&self) -> Result<CleanupStatusResponse>;

    async fn cleanup_now(&self) -> Result<CleanupRun>;
}

/// reqwest implementation of [`StudioApi`]
pub struct HttpStudioClient {
    client: Client,
    api_base: String,
}

impl HttpStudioClient {
    /// Create a client for `api_base`, e.g. `http://localhost:5000/api`
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        Self::build(api_base.into(), None)
    }

    /// Create a client from settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::build(settings.api_base(), settings.request_timeout())
    }

    fn build(api_base: String, timeout: Option<std::time::Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!(%method, path = %path, "Sending request");
        self.client.request(method, self.url(path))
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        decode_envelope(response).await
    }

    async fn call_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.call(self.request(method, path).json(body)).await
    }
}

/// Decode a `{"success": bool, "error"?: string, ...}` body.
///
/// The server reports failures with non-2xx codes but still sends JSON, so
/// the body is read before the status code is considered.
async fn decode_envelope<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await?;

    let value: serde_json::Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            warn!(%status, error = %e, "Server returned a non-JSON body");
            return Err(AppError::Backend(format!("Server returned HTTP {}", status)));
        }
    };

    let success = value
        .get("success")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    if !success {
        let message = value
            .get("error")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with HTTP {}", status));
        return Err(AppError::Backend(message));
    }

    Ok(serde_json::from_value(value)?)
}

#[async_trait]
impl StudioApi for HttpStudioClient {
    async fn validate_key(&self, api_key: &str) -> Result<KeyValidation> {
        let response = self
            .request(Method::POST, "validate-key")
            .json(&ValidateKeyRequest {
                api_key: api_key.to_string(),
            })
            .send()
            .await?;

        // validate-key answers {valid, error?} rather than the success envelope
        let status = response.status();
        let text = response.text().await?;
        match serde_json::from_str::<KeyValidation>(&text) {
            Ok(validation) => Ok(validation),
            Err(_) => Ok(KeyValidation::invalid(format!(
                "Server returned HTTP {}",
                status
            ))),
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<JobStarted> {
        self.call_json(Method::POST, "generate", request).await
    }

    async fn generate_with_reference(
        &self,
        request: &GenerateWithReferenceRequest,
    ) -> Result<JobStarted> {
        self.call_json(Method::POST, "generate-with-reference", request)
            .await
    }

    async fn analyze_reference_type(
        &self,
        api_key: &str,
        reference_image: &str,
    ) -> Result<ReferenceType> {
        let body = AnalyzeReferenceRequest {
            api_key: api_key.to_string(),
            reference_image: reference_image.to_string(),
        };
        let analysis: ReferenceAnalysis = self
            .call_json(Method::POST, "analyze-reference-type", &body)
            .await?;
        Ok(analysis.reference_type)
    }

    async fn job_status(&self, job_id: &str) -> Result<JobSnapshot> {
        let envelope: StatusEnvelope = self
            .call(self.request(Method::GET, &format!("status/{}", job_id)))
            .await?;
        Ok(envelope.job)
    }

    async fn cancel_job(&self, job_id: &str) -> Result<()> {
        let _: SuccessResponse = self
            .call(self.request(Method::POST, &format!("cancel/{}", job_id)))
            .await?;
        Ok(())
    }

    async fn download_all(&self, job_id: &str) -> Result<Vec<u8>> {
        let response = self
            .request(Method::GET, &format!("download-all/{}", job_id))
            .send()
            .await?;

        if !response.status().is_success() {
            decode_envelope::<SuccessResponse>(response).await?;
            return Err(AppError::Backend("Download failed".to_string()));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn delete_job(&self, job_id: &str) -> Result<()> {
        let _: SuccessResponse = self
            .call(self.request(Method::DELETE, &format!("delete/{}", job_id)))
            .await?;
        Ok(())
    }

    async fn list_history(&self) -> Result<Vec<HistoryEntry>> {
        let list: HistoryList = self.call(self.request(Method::GET, "history")).await?;
        Ok(list.jobs)
    }

    async fn history_detail(&self, job_id: &str) -> Result<HistoryEntry> {
        let detail: HistoryDetail = self
            .call(self.request(Method::GET, &format!("history/{}", job_id)))
            .await?;
        Ok(detail.job)
    }

    async fn delete_history(&self, job_id: &str) -> Result<()> {
        let _: SuccessResponse = self
            .call(self.request(Method::DELETE, &format!("history/{}", job_id)))
            .await?;
        Ok(())
    }

    async fn delete_all_history(&self) -> Result<()> {
        let _: SuccessResponse = self
            .call(self.request(Method::DELETE, "history/all"))
            .await?;
        Ok(())
    }

    async fn rerun(&self, job_id: &str, api_key: &str) -> Result<JobStarted> {
        let body = RerunRequest {
            api_key: api_key.to_string(),
        };
        self.call_json(Method::POST, &format!("rerun/{}", job_id), &body)
            .await
    }

    async fn cleanup_status(&self) -> Result<CleanupStatusResponse> {
        self.call(self.request(Method::GET, "cleanup/status")).await
    }

    async fn cleanup_now(&self) -> Result<CleanupRun> {
        self.call(self.request(Method::POST, "cleanup/now")).await
    }
}
