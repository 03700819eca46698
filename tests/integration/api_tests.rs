//! HTTP client integration tests against a mock server

use batch_image_studio::api::models::{
    GenerateRequest, GenerationMode, JobStatus, ReferenceType, ResultStatus,
};
use batch_image_studio::api::{HttpStudioClient, StudioApi};
use batch_image_studio::config::Settings;
use batch_image_studio::AppError;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> HttpStudioClient {
    HttpStudioClient::new(format!("{}/api", server.uri())).unwrap()
}

fn request() -> GenerateRequest {
    GenerateRequest {
        api_key: "AIza-key".to_string(),
        prompts: vec!["a cat".to_string(), "a dog".to_string()],
        model: "gemini-2.5-flash-image".to_string(),
        mode: GenerationMode::Sequential,
        aspect_ratio: "1:1".to_string(),
        master_prompts: String::new(),
        suffix: String::new(),
        negative_prompts: String::new(),
    }
}

#[tokio::test]
async fn test_generate_posts_form_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(json!({
            "api_key": "AIza-key",
            "prompts": ["a cat", "a dog"],
            "model": "gemini-2.5-flash-image",
            "mode": "sequential",
            "aspect_ratio": "1:1",
            "master_prompts": "",
            "suffix": "",
            "negative_prompts": ""
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "job_id": "abc", "total": 2, "message": "Started"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let started = client(&server).generate(&request()).await.unwrap();
    assert_eq!(started.job_id, "abc");
    assert_eq!(started.total, Some(2));
}

#[tokio::test]
async fn test_backend_error_is_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false, "error": "Maximum 50 prompts"
        })))
        .mount(&server)
        .await;

    let err = client(&server).generate(&request()).await.unwrap_err();
    assert!(matches!(err, AppError::Backend(ref m) if m == "Maximum 50 prompts"));
}

#[tokio::test]
async fn test_non_json_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status/abc"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = client(&server).job_status("abc").await.unwrap_err();
    assert!(matches!(err, AppError::Backend(_)));
    assert!(err.to_string().contains("502"));
}

#[tokio::test]
async fn test_connection_refused_is_transport() {
    let client = HttpStudioClient::new("http://127.0.0.1:9/api").unwrap();
    let err = client.job_status("abc").await.unwrap_err();
    assert!(err.is_transport());
    assert!(err.to_string().starts_with("Connection error:"));
}

#[tokio::test]
async fn test_status_snapshot_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "job": {
                "id": "abc", "status": "processing", "total": 2, "completed": 1, "failed": 0,
                "model": "gemini-2.5-flash-image", "mode": "parallel",
                "results": [
                    {"prompt": "a cat", "status": "completed", "filename": "abc_0.png"},
                    {"prompt": "a dog", "status": "pending", "filename": null, "error": null}
                ]
            }
        })))
        .mount(&server)
        .await;

    let job = client(&server).job_status("abc").await.unwrap();
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.mode, Some(GenerationMode::Parallel));
    assert_eq!(job.results[0].status, ResultStatus::Completed);
    assert_eq!(job.results[1].filename, None);
}

#[tokio::test]
async fn test_validate_key_reads_400_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/validate-key"))
        .and(body_json(json!({"api_key": "bad"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "valid": false, "error": "API key not valid"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/validate-key"))
        .and(body_json(json!({"api_key": "good"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .mount(&server)
        .await;

    let api = client(&server);
    let bad = api.validate_key("bad").await.unwrap();
    assert!(!bad.valid);
    assert_eq!(bad.error.as_deref(), Some("API key not valid"));
    assert!(api.validate_key("good").await.unwrap().valid);
}

#[tokio::test]
async fn test_analyze_reference_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/analyze-reference-type"))
        .and(body_partial_json(json!({"reference_image": "data:image/png;base64,AAAA"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "type": "object"
        })))
        .mount(&server)
        .await;

    let kind = client(&server)
        .analyze_reference_type("k", "data:image/png;base64,AAAA")
        .await
        .unwrap();
    assert_eq!(kind, ReferenceType::Object);
}

#[tokio::test]
async fn test_cancel_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/cancel/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "message": "Cancellation requested"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/delete/abc"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false, "error": "Job not found"
        })))
        .mount(&server)
        .await;

    let api = client(&server);
    api.cancel_job("abc").await.unwrap();
    let err = api.delete_job("abc").await.unwrap_err();
    assert_eq!(err.to_string(), "Job not found");
}

#[tokio::test]
async fn test_download_all_returns_archive_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download-all/abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/zip")
                .set_body_bytes(b"PK\x03\x04zip".to_vec()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/download-all/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false, "error": "Job not found"
        })))
        .mount(&server)
        .await;

    let api = client(&server);
    assert_eq!(api.download_all("abc").await.unwrap(), b"PK\x03\x04zip".to_vec());
    let err = api.download_all("missing").await.unwrap_err();
    assert_eq!(err.to_string(), "Job not found");
}

#[tokio::test]
async fn test_history_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "jobs": [
                {"id": "j1", "status": "completed", "model": "gemini-3-pro-image-preview",
                 "total": 3, "completed": 3, "failed": 1, "success_count": 2,
                 "aspect_ratio": "4:3", "has_reference": false},
                {"id": "j2", "status": "cancelled", "has_reference": true}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/history/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/rerun/j1"))
        .and(body_json(json!({"api_key": "AIza-key"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "job_id": "j3", "total": 3
        })))
        .mount(&server)
        .await;

    let api = client(&server);
    let jobs = api.list_history().await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].success_count, 2);
    assert!(jobs[1].has_reference);

    api.delete_all_history().await.unwrap();
    assert_eq!(api.rerun("j1", "AIza-key").await.unwrap().job_id, "j3");
}

#[tokio::test]
async fn test_cleanup_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cleanup/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "cleanup": {"enabled": true, "last_cleanup": "2025-03-01T02:00:00",
                        "next_cleanup": "2025-03-02T02:00:00", "files_deleted_last": 5,
                        "cleanup_days": 7},
            "storage": {"total_files": 40, "total_size_mb": 12.5}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/cleanup/now"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "deleted": 9
        })))
        .mount(&server)
        .await;

    let api = client(&server);
    let status = api.cleanup_status().await.unwrap();
    assert_eq!(status.cleanup.files_deleted_last, 5);
    assert_eq!(status.storage.total_files, 40);
    assert_eq!(api.cleanup_now().await.unwrap().deleted, 9);
}

#[tokio::test]
async fn test_client_from_settings() {
    let mut settings = Settings::default();
    settings.server.base_url = "http://studio.local:8000/".to_string();
    settings.server.timeout_ms = 1500;

    let client = HttpStudioClient::from_settings(&settings).unwrap();
    assert_eq!(client.api_base(), "http://studio.local:8000/api");
}
