//! Studio session: form, stores, current job and its poll task

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::api::models::{
    GenerateRequest, GenerateWithReferenceRequest, HistoryEntry, KeyValidation, ReferenceType,
};
use crate::api::{HttpStudioClient, StudioApi};
use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::response::AssetUrls;
use crate::storage::{CredentialStore, FileStore, KeyValueStore, PresetStore, ThemeStore};
use crate::studio::cleanup::CleanupClient;
use crate::studio::form::FormState;
use crate::studio::history::{can_rerun, HistoryClient};
use crate::studio::notify::{Notification, Notifier, TracingNotifier};
use crate::studio::poller::{
    start_polling, ActiveJob, JobEvent, JobState, PollContext, PollHandle, EVENT_CAPACITY,
};
use crate::studio::progress::ProgressView;

/// One user's studio: owns the form and at most one poll task
pub struct StudioSession {
    api: Arc<dyn StudioApi>,
    credentials: CredentialStore,
    presets: PresetStore,
    theme: ThemeStore,
    notifier: Arc<dyn Notifier>,
    urls: AssetUrls,
    poll_interval: Duration,
    form: FormState,
    state: Arc<Mutex<JobState>>,
    poll: Option<PollHandle>,
    events: broadcast::Sender<JobEvent>,
}

impl StudioSession {
    pub fn new(
        api: Arc<dyn StudioApi>,
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
        settings: &Settings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api,
            credentials: CredentialStore::new(store.clone()),
            presets: PresetStore::new(store.clone()),
            theme: ThemeStore::new(store),
            notifier,
            urls: AssetUrls::new(settings.static_base(), settings.api_base()),
            poll_interval: settings.poll_interval(),
            form: FormState::new(&settings.generation),
            state: Arc::new(Mutex::new(JobState::default())),
            poll: None,
            events,
        }
    }

    /// HTTP client, file-backed store and log notifications
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api = Arc::new(HttpStudioClient::from_settings(settings)?);
        let store = Arc::new(FileStore::new(settings.store_path()));
        Ok(Self::new(api, store, Arc::new(TracingNotifier), settings))
    }

    /// Load persisted state. Returns whether a credential is stored.
    pub fn init(&mut self) -> Result<bool> {
        let has_key = self.credentials.is_set()?;
        info!(
            theme = %self.theme.get(),
            presets = self.presets.list().len(),
            has_key,
            "Session initialised"
        );
        if !has_key {
            warn!("No API key stored");
        }
        Ok(has_key)
    }

    /// Tear down: the poll task is stopped unconditionally
    pub fn dispose(&mut self) {
        self.stop_polling();
        debug!("Session disposed");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormState {
        &mut self.form
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn presets(&self) -> &PresetStore {
        &self.presets
    }

    pub fn theme(&self) -> &ThemeStore {
        &self.theme
    }

    pub fn urls(&self) -> &AssetUrls {
        &self.urls
    }

    pub fn history(&self) -> HistoryClient {
        HistoryClient::new(self.api.clone())
    }

    pub fn cleanup(&self) -> CleanupClient {
        CleanupClient::new(self.api.clone())
    }

    pub fn current_job_id(&self) -> Option<String> {
        self.state.lock().current_id().map(str::to_string)
    }

    pub fn last_view(&self) -> Option<ProgressView> {
        self.state.lock().last_view.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.poll
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Cancel is offered while a job runs and no cancel is pending
    pub fn cancel_available(&self) -> bool {
        let state = self.state.lock();
        state.current.is_some() && !state.cancel_pending && !state.is_finished()
    }

    // ---- credential ----

    /// Validate a candidate key against the server and store it when valid
    pub async fn validate_and_save_key(&self, candidate: &str) -> Result<KeyValidation> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Err(self.reject("Please enter API key"));
        }

        let validation = match self.api.validate_key(candidate).await {
            Ok(validation) => validation,
            Err(AppError::Transport(e)) => {
                KeyValidation::invalid(format!("Cannot connect to server: {}", e))
            }
            Err(e) => KeyValidation::invalid(e.to_string()),
        };

        if validation.valid {
            self.credentials.set(candidate)?;
            info!("API key validated and saved");
            self.notifier
                .notify(Notification::success("API key saved successfully"));
        } else {
            let reason = validation.error.as_deref().unwrap_or("Invalid API key");
            warn!(reason = %reason, "API key rejected");
            self.notifier.notify(Notification::error(reason));
        }
        Ok(validation)
    }

    // ---- form helpers that notify ----

    pub fn select_model(&mut self, model: &str) {
        if let Some(warning) = self.form.select_model(model) {
            self.notifier.notify(Notification::warning(warning));
        }
    }

    pub fn set_aspect_ratio(&mut self, ratio: &str) -> Result<()> {
        self.form.set_aspect_ratio(ratio).map_err(|e| {
            self.notifier.notify(Notification::warning(e.to_string()));
            e
        })
    }

    pub fn remove_prompt_row(&mut self, index: usize) -> Result<()> {
        self.form.remove_prompt_row(index).map_err(|e| {
            self.notifier.notify(Notification::warning(e.to_string()));
            e
        })
    }

    // ---- job submission ----

    /// Submit the form as a new job and start polling it
    pub async fn submit(&mut self) -> Result<String> {
        let api_key = self.require_key()?;

        let prompts = self.form.prompts();
        if prompts.is_empty() {
            return Err(self.reject("Please enter at least 1 prompt"));
        }

        let reference = if self.form.reference_mode {
            match self.form.reference() {
                Some(image) => Some(image.clone()),
                None => return Err(self.reject("Please upload a reference image")),
            }
        } else {
            None
        };

        let templates = self.form.templates.trimmed();
        let base = GenerateRequest {
            api_key,
            prompts: prompts.clone(),
            model: self.form.model().to_string(),
            mode: self.form.mode,
            aspect_ratio: self.form.aspect_ratio().to_string(),
            master_prompts: templates.master_prompts,
            suffix: templates.suffix,
            negative_prompts: templates.negative_prompts,
        };

        info!(
            prompts = prompts.len(),
            model = %base.model,
            mode = %base.mode,
            aspect_ratio = %base.aspect_ratio,
            reference = reference.is_some(),
            "Submitting job"
        );

        let result = match reference {
            Some(image) => {
                let request = GenerateWithReferenceRequest {
                    base,
                    reference_image: image.data_url().to_string(),
                    reference_type: image.kind,
                };
                self.api.generate_with_reference(&request).await
            }
            None => self.api.generate(&base).await,
        };

        match result {
            Ok(started) => {
                let message = format!("Generating {} images...", prompts.len());
                self.begin_job(started.job_id.clone(), prompts, message);
                Ok(started.job_id)
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }

    /// Ask the server to classify the current reference image and keep the tag
    pub async fn analyze_reference(&mut self) -> Result<ReferenceType> {
        let api_key = self.require_key()?;
        let data_url = match self.form.reference() {
            Some(image) => image.data_url().to_string(),
            None => return Err(self.reject("Please upload a reference image")),
        };

        match self.api.analyze_reference_type(&api_key, &data_url).await {
            Ok(kind) => {
                if let Some(image) = self.form.reference_mut() {
                    image.kind = kind;
                }
                info!(reference_type = %kind, "Reference image analysed");
                Ok(kind)
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }

    /// Request cancellation of the current job. Polling continues until the
    /// server reports a terminal status.
    pub async fn cancel(&self) -> Result<()> {
        let claimed = {
            let mut state = self.state.lock();
            match state.current_id().map(str::to_string) {
                None => Err("No job is running"),
                Some(_) if state.cancel_pending || state.is_finished() => {
                    Err("Cancellation is not available")
                }
                Some(id) => {
                    state.cancel_pending = true;
                    Ok(id)
                }
            }
        };
        let job_id = claimed.map_err(|message| self.reject(message))?;

        match self.api.cancel_job(&job_id).await {
            Ok(()) => {
                info!(job_id = %job_id, "Cancellation requested");
                self.notifier.notify(Notification::info(
                    "Cancellation requested (wait up to ~5 seconds)",
                ));
                Ok(())
            }
            Err(e) => {
                let mut state = self.state.lock();
                if state.is_current(&job_id) {
                    state.cancel_pending = false;
                }
                drop(state);
                match &e {
                    AppError::Backend(message) => {
                        warn!(job_id = %job_id, error = %message, "Cancellation refused");
                        let text = if message.trim().is_empty() {
                            "Cancellation failed"
                        } else {
                            message.as_str()
                        };
                        self.notifier.notify(Notification::error(text));
                    }
                    _ => self.report(&e),
                }
                Err(e)
            }
        }
    }

    // ---- history ----

    /// Replay a history entry's prompts as a new job
    pub async fn rerun(&mut self, entry: &HistoryEntry) -> Result<String> {
        if !can_rerun(entry) {
            let e = AppError::RerunUnavailable(entry.id.clone());
            self.report(&e);
            return Err(e);
        }
        let api_key = self.require_key()?;

        match self.api.rerun(&entry.id, &api_key).await {
            Ok(started) => {
                let total = started.total.unwrap_or(entry.total);
                info!(source_job = %entry.id, job_id = %started.job_id, total, "Rerun started");
                let message = format!("Rerunning {} images...", total);
                self.begin_job(started.job_id.clone(), entry.prompts.clone(), message);
                Ok(started.job_id)
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }

    /// Fetch a history entry by id and rerun it
    pub async fn rerun_by_id(&mut self, job_id: &str) -> Result<String> {
        let entry = match self.api.history_detail(job_id).await {
            Ok(entry) => entry,
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };
        self.rerun(&entry).await
    }

    // ---- current-job actions ----

    /// Stop the poll task; safe to call when nothing is polling
    pub fn stop_polling(&mut self) {
        if let Some(handle) = self.poll.take() {
            handle.stop();
        }
    }

    /// Reset the form and forget the current job
    pub fn clear_form(&mut self) {
        self.stop_polling();
        self.forget_job();
        self.form.clear();
    }

    pub fn download_all_url(&self) -> Option<String> {
        self.current_job_id()
            .map(|job_id| self.urls.download_all_url(&job_id))
    }

    /// ZIP archive of the current job's completed images
    pub async fn download_all(&self) -> Result<Vec<u8>> {
        let job_id = match self.current_job_id() {
            Some(id) => id,
            None => return Err(self.reject("No job to download")),
        };
        match self.api.download_all(&job_id).await {
            Ok(bytes) => {
                info!(job_id = %job_id, bytes = bytes.len(), "Archive downloaded");
                Ok(bytes)
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }

    /// Delete the current job's images on the server and forget the job
    pub async fn delete_current_job(&mut self) -> Result<()> {
        let job_id = match self.current_job_id() {
            Some(id) => id,
            None => return Err(self.reject("No job to delete")),
        };
        if let Err(e) = self.api.delete_job(&job_id).await {
            self.report(&e);
            return Err(e);
        }
        self.stop_polling();
        self.forget_job();
        info!(job_id = %job_id, "Job deleted");
        self.notifier.notify(Notification::success("All images deleted"));
        Ok(())
    }

    // ---- presets ----

    /// Save the form's templates under `name`
    pub fn save_preset(&mut self, name: &str) -> Result<bool> {
        let saved = self.presets.save(name, &self.form.templates)?;
        if saved {
            self.form.selected_preset = Some(name.trim().to_string());
            self.notifier.notify(Notification::success("Preset saved"));
        } else {
            self.notifier
                .notify(Notification::warning("Please enter a preset name"));
        }
        Ok(saved)
    }

    /// Copy a stored preset into the form; unknown or empty names are a no-op
    pub fn load_preset(&mut self, name: &str) -> bool {
        if name.trim().is_empty() {
            return false;
        }
        match self.presets.get(name) {
            Some(preset) => {
                self.form.apply_preset(&preset);
                debug!(preset = %preset.name, "Preset loaded");
                true
            }
            None => false,
        }
    }

    /// Delete a preset; deleting the loaded one also clears the templates
    pub fn delete_preset(&mut self, name: &str) -> Result<()> {
        self.presets.delete(name)?;
        if self.form.selected_preset.as_deref() == Some(name) {
            self.form.clear_templates();
        }
        self.notifier.notify(Notification::info("Preset deleted"));
        Ok(())
    }

    // ---- internals ----

    fn poll_context(&self) -> PollContext {
        PollContext {
            api: self.api.clone(),
            state: self.state.clone(),
            notifier: self.notifier.clone(),
            urls: self.urls.clone(),
            events: self.events.clone(),
            interval: self.poll_interval,
        }
    }

    fn begin_job(&mut self, job_id: String, prompts: Vec<String>, message: String) {
        self.stop_polling();

        let view = ProgressView::initial(job_id.clone(), &prompts);
        {
            let mut state = self.state.lock();
            state.current = Some(ActiveJob {
                id: job_id.clone(),
                prompts,
            });
            state.cancel_pending = false;
            state.last_view = Some(view.clone());
        }

        let _ = self.events.send(JobEvent::Started {
            job_id: job_id.clone(),
            view,
        });
        self.poll = Some(start_polling(self.poll_context(), job_id));
        self.notifier.notify(Notification::info(message));
    }

    fn forget_job(&self) {
        let mut state = self.state.lock();
        state.current = None;
        state.cancel_pending = false;
        state.last_view = None;
    }

    fn require_key(&self) -> Result<String> {
        match self.credentials.get()? {
            Some(key) => Ok(key),
            None => Err(self.reject("Please enter API key first")),
        }
    }

    /// Warn the user and build the matching precondition error
    fn reject(&self, message: &str) -> AppError {
        warn!(reason = %message, "Request blocked");
        self.notifier.notify(Notification::warning(message));
        AppError::precondition(message)
    }

    /// Turn an error into a user notification
    fn report(&self, error: &AppError) {
        let notification = match error {
            AppError::Precondition(_) | AppError::RerunUnavailable(_) => {
                Notification::warning(error.to_string())
            }
            AppError::Backend(message) => Notification::error(format!("Error: {}", message)),
            _ => Notification::error(error.to_string()),
        };
        warn!(error = %error, "Operation failed");
        self.notifier.notify(notification);
    }
}

impl Drop for StudioSession {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
