//! Session behaviour against a scripted server

#[path = "../common/mod.rs"]
mod common;

use batch_image_studio::api::models::{GenerationMode, ReferenceType};
use batch_image_studio::api::HttpStudioClient;
use batch_image_studio::storage::{CredentialStore, PresetFields};
use batch_image_studio::studio::form::MODEL_PRO;
use batch_image_studio::studio::{NoticeLevel, ReferenceImage};
use batch_image_studio::AppError;
use common::{history_entry, session_with, FakeApi, TEST_KEY};
use serde_json::json;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_blank_prompts_send_no_request() {
    let api = FakeApi::new();
    let (mut session, notifier, _) = session_with(api.clone(), true);
    session.form_mut().set_prompts(["", "   ", "\t"]);

    let err = session.submit().await.unwrap_err();
    assert!(err.is_precondition());
    assert!(api.calls().is_empty());
    assert_eq!(notifier.count(NoticeLevel::Warning), 1);
    assert!(session.current_job_id().is_none());
    assert!(!session.is_polling());
}

#[tokio::test]
async fn test_missing_key_blocks_submit() {
    let api = FakeApi::new();
    let (mut session, notifier, _) = session_with(api.clone(), false);
    session.form_mut().set_prompts(["a red fox"]);

    let err = session.submit().await.unwrap_err();
    assert!(err.is_precondition());
    assert!(api.calls().is_empty());
    assert_eq!(notifier.last().unwrap().message, "Please enter API key first");
}

#[tokio::test]
async fn test_reference_mode_without_image_is_rejected() {
    let api = FakeApi::new();
    let (mut session, notifier, _) = session_with(api.clone(), true);
    session.form_mut().set_prompts(["one", "two", "three"]);
    session.form_mut().reference_mode = true;

    assert!(session.submit().await.unwrap_err().is_precondition());
    assert!(api.calls().is_empty());
    assert_eq!(notifier.count(NoticeLevel::Warning), 1);
}

#[tokio::test]
async fn test_submit_builds_request_from_form() {
    let api = FakeApi::new();
    let (mut session, notifier, _) = session_with(api.clone(), true);
    session.form_mut().set_prompts([" a cat ", "", "a dog"]);
    session.select_model(MODEL_PRO);
    session.set_aspect_ratio("16:9").unwrap();
    session.form_mut().mode = GenerationMode::Parallel;
    session.form_mut().templates = PresetFields {
        master_prompts: " watercolor ".to_string(),
        suffix: ", soft light".to_string(),
        negative_prompts: "text".to_string(),
    };

    let job_id = assert_ok!(session.submit().await);
    assert_eq!(job_id, "job-1");
    assert_eq!(session.current_job_id().as_deref(), Some("job-1"));
    assert!(session.is_polling());

    let requests = api.generate_requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.api_key, TEST_KEY);
    assert_eq!(request.prompts, vec!["a cat", "a dog"]);
    assert_eq!(request.model, MODEL_PRO);
    assert_eq!(request.aspect_ratio, "16:9");
    assert_eq!(request.mode, GenerationMode::Parallel);
    assert_eq!(request.master_prompts, "watercolor");
    assert_eq!(request.suffix, ", soft light");

    let view = session.last_view().unwrap();
    assert_eq!(view.items.len(), 2);
    assert_eq!(view.pending, 2);
    assert_eq!(
        notifier.last().unwrap().message,
        "Generating 2 images..."
    );

    session.dispose();
    assert!(!session.is_polling());
}

#[tokio::test]
async fn test_reference_submission_routes_to_reference_endpoint() {
    let api = FakeApi::new();
    let (mut session, _, _) = session_with(api.clone(), true);
    session.form_mut().set_prompts(["on a beach"]);
    session.form_mut().reference_mode = true;
    session.form_mut().set_reference(
        ReferenceImage::from_bytes(b"\x89PNG", "image/png", ReferenceType::Person).unwrap(),
    );

    let kind = session.analyze_reference().await.unwrap();
    assert_eq!(kind, ReferenceType::Animal);

    session.submit().await.unwrap();
    assert_eq!(api.count("generate"), 0);
    let requests = api.reference_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].reference_type, ReferenceType::Animal);
    assert_eq!(requests[0].reference_image, "data:image/png;base64,iVBORw==");
    session.dispose();
}

#[tokio::test]
async fn test_backend_failure_leaves_no_job() {
    let api = FakeApi::new();
    let (mut session, notifier, _) = session_with(api.clone(), true);
    session.form_mut().set_prompts(["a cat"]);
    api.fail_next("Quota exceeded");

    let err = assert_err!(session.submit().await);
    assert!(matches!(err, AppError::Backend(ref m) if m == "Quota exceeded"));
    assert!(session.current_job_id().is_none());
    assert!(!session.is_polling());
    assert_eq!(notifier.last().unwrap().message, "Error: Quota exceeded");

    // retry is side-effect free
    let job_id = session.submit().await.unwrap();
    assert_eq!(job_id, "job-1");
    session.dispose();
}

#[tokio::test]
async fn test_stop_polling_twice() {
    let api = FakeApi::new();
    let (mut session, _, _) = session_with(api.clone(), true);
    session.stop_polling();

    session.form_mut().set_prompts(["a cat"]);
    session.submit().await.unwrap();
    assert!(session.is_polling());

    session.stop_polling();
    session.stop_polling();
    assert!(!session.is_polling());
    session.dispose();
    session.dispose();
}

#[tokio::test]
async fn test_rerun_of_reference_job_is_unavailable() {
    let api = FakeApi::new();
    let entry = history_entry(json!({
        "id": "old-1", "status": "completed", "total": 2,
        "prompts": ["a", "b"], "has_reference": true
    }));
    api.set_history(vec![entry.clone()]);
    let (mut session, notifier, _) = session_with(api.clone(), true);

    let err = assert_err!(session.rerun(&entry).await);
    assert!(matches!(err, AppError::RerunUnavailable(_)));
    assert_eq!(api.count("rerun"), 0);
    assert_eq!(notifier.count(NoticeLevel::Warning), 1);
}

#[tokio::test]
async fn test_rerun_starts_polling_with_entry_prompts() {
    let api = FakeApi::new();
    api.set_history(vec![history_entry(json!({
        "id": "old-1", "status": "completed", "total": 2, "prompts": ["a", "b"]
    }))]);
    let (mut session, notifier, _) = session_with(api.clone(), true);

    let job_id = session.rerun_by_id("old-1").await.unwrap();
    assert_eq!(job_id, "job-1");
    assert!(session.is_polling());
    let view = session.last_view().unwrap();
    assert_eq!(view.items[1].prompt, "b");
    assert_eq!(notifier.last().unwrap().message, "Rerunning 2 images...");
    session.dispose();
}

#[tokio::test]
async fn test_validate_key_saves_only_valid_keys() {
    let api = FakeApi::new();
    let (session, notifier, store) = session_with(api.clone(), false);
    let credentials = CredentialStore::new(store);

    assert!(session.validate_and_save_key("   ").await.unwrap_err().is_precondition());
    assert_eq!(api.count("validate-key"), 0);

    let rejected = session.validate_and_save_key("wrong").await.unwrap();
    assert!(!rejected.valid);
    assert!(credentials.get().unwrap().is_none());
    assert_eq!(notifier.last().unwrap().level, NoticeLevel::Error);

    let accepted = session.validate_and_save_key("  AIza-good ").await.unwrap();
    assert!(accepted.valid);
    assert_eq!(credentials.get().unwrap().as_deref(), Some("AIza-good"));
}

#[tokio::test]
async fn test_validate_key_transport_failure() {
    let api = Arc::new(HttpStudioClient::new("http://127.0.0.1:9/api").unwrap());
    let (session, _, store) = session_with(api, false);

    let validation = session.validate_and_save_key("AIza-anything").await.unwrap();
    assert!(!validation.valid);
    assert!(validation
        .error
        .unwrap()
        .starts_with("Cannot connect to server:"));
    assert!(CredentialStore::new(store).get().unwrap().is_none());
}

#[tokio::test]
async fn test_preset_roundtrip_through_form() {
    let api = FakeApi::new();
    let (mut session, _, _) = session_with(api, false);
    let templates = PresetFields {
        master_prompts: "oil painting".to_string(),
        suffix: ", 4k".to_string(),
        negative_prompts: "blurry".to_string(),
    };
    session.form_mut().templates = templates.clone();
    assert!(session.save_preset("classic").unwrap());
    assert!(!session.save_preset("  ").unwrap());

    session.form_mut().clear_templates();
    assert!(!session.load_preset(""));
    assert!(!session.load_preset("missing"));
    assert!(session.load_preset("classic"));
    assert_eq!(session.form().templates, templates);

    session.delete_preset("classic").unwrap();
    assert_eq!(session.form().templates, PresetFields::default());
    assert!(session.presets().list().is_empty());
}

#[tokio::test]
async fn test_remove_last_prompt_row_warns() {
    let api = FakeApi::new();
    let (mut session, notifier, _) = session_with(api, false);

    assert!(session.remove_prompt_row(0).is_err());
    assert_eq!(session.form().prompt_rows().len(), 1);
    assert_eq!(notifier.last().unwrap().message, "At least 1 prompt is required");
}

#[tokio::test]
async fn test_fast_model_switch_warns() {
    let api = FakeApi::new();
    let (mut session, notifier, _) = session_with(api, false);
    session.select_model(MODEL_PRO);
    session.set_aspect_ratio("9:16").unwrap();

    session.select_model("gemini-2.5-flash-image");
    assert_eq!(session.form().aspect_ratio(), "1:1");
    assert_eq!(
        notifier.last().unwrap().message,
        "Aspect ratio other than 1:1 only works with Pro model. Switching to 1:1."
    );
}

#[tokio::test]
async fn test_init_reports_credential() {
    let api = FakeApi::new();
    let (mut without, _, _) = session_with(api.clone(), false);
    assert!(!without.init().unwrap());

    let (mut with, _, _) = session_with(api, true);
    assert!(with.init().unwrap());
}

#[tokio::test]
async fn test_history_and_cleanup_clients() {
    let api = FakeApi::new();
    api.set_history(vec![
        history_entry(json!({"id": "a", "status": "completed"})),
        history_entry(json!({"id": "b", "status": "error"})),
    ]);
    let (session, _, _) = session_with(api.clone(), false);

    let history = session.history();
    assert_eq!(history.list().await.unwrap().len(), 2);
    assert_eq!(history.detail("b").await.unwrap().id, "b");
    history.delete("a").await.unwrap();
    assert_eq!(history.list().await.unwrap().len(), 1);
    history.delete_all().await.unwrap();
    assert!(history.list().await.unwrap().is_empty());

    let cleanup = session.cleanup();
    let status = cleanup.status().await.unwrap();
    assert!(status.enabled);
    assert_eq!(status.total_files, 4);
    assert_eq!(cleanup.run_now().await.unwrap(), 3);
}
