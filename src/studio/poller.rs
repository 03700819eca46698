//! Job polling: one cancellable background task per active job

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::models::JobStatus;
use crate::api::StudioApi;
use crate::response::AssetUrls;
use crate::studio::notify::{Notification, Notifier};
use crate::studio::progress::{BadgeStatus, GalleryItem, ProgressView};

/// Capacity of the session's event channel
pub const EVENT_CAPACITY: usize = 64;

/// Events published to session subscribers
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// A job was accepted; every prompt starts as pending
    Started { job_id: String, view: ProgressView },
    Progress(ProgressView),
    /// Terminal status observed; polling has stopped
    Finished {
        job_id: String,
        status: JobStatus,
        view: ProgressView,
        gallery: Vec<GalleryItem>,
    },
}

/// The job the session is currently tracking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveJob {
    pub id: String,
    pub prompts: Vec<String>,
}

/// Current-job state shared between the session and its poll task
#[derive(Debug, Default)]
pub struct JobState {
    pub current: Option<ActiveJob>,
    /// A cancel request is outstanding or has already been accepted
    pub cancel_pending: bool,
    pub last_view: Option<ProgressView>,
}

impl JobState {
    pub fn current_id(&self) -> Option<&str> {
        self.current.as_ref().map(|job| job.id.as_str())
    }

    pub fn is_current(&self, job_id: &str) -> bool {
        self.current_id() == Some(job_id)
    }

    /// Whether the last observed status is terminal
    pub fn is_finished(&self) -> bool {
        self.last_view
            .as_ref()
            .map(|view| view.status.is_terminal())
            .unwrap_or(false)
    }
}

/// Everything a poll task needs
#[derive(Clone)]
pub struct PollContext {
    pub api: Arc<dyn StudioApi>,
    pub state: Arc<Mutex<JobState>>,
    pub notifier: Arc<dyn Notifier>,
    pub urls: AssetUrls,
    pub events: broadcast::Sender<JobEvent>,
    pub interval: Duration,
}

/// Owner of a running poll task; dropping or stopping it aborts the task
#[derive(Debug)]
pub struct PollHandle {
    job_id: String,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// The task exited on its own (terminal status or superseded job)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn stop(self) {
        debug!(job_id = %self.job_id, "Stopping poll task");
        self.task.abort();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum Step {
    Continue,
    Exit,
}

/// Spawn the poll loop for `job_id`. The first status request goes out one
/// interval after the call.
pub fn start_polling(ctx: PollContext, job_id: impl Into<String>) -> PollHandle {
    let job_id = job_id.into();
    info!(job_id = %job_id, interval_ms = ctx.interval.as_millis() as u64, "Polling started");

    let task_job_id = job_id.clone();
    let task = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + ctx.interval, ctx.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reported = HashSet::new();

        loop {
            ticker.tick().await;
            match poll_once(&ctx, &task_job_id, &mut reported).await {
                Step::Continue => {}
                Step::Exit => break,
            }
        }
        debug!(job_id = %task_job_id, "Poll task exited");
    });

    PollHandle { job_id, task }
}

async fn poll_once(ctx: &PollContext, job_id: &str, reported: &mut HashSet<usize>) -> Step {
    let prompts = {
        let state = ctx.state.lock();
        match &state.current {
            None => return Step::Continue,
            Some(job) if job.id != job_id => return Step::Exit,
            Some(job) => job.prompts.clone(),
        }
    };

    let snapshot = match ctx.api.job_status(job_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "Status request failed, retrying next tick");
            return Step::Continue;
        }
    };

    let view = ProgressView::from_snapshot(&snapshot, &prompts);

    for item in &view.items {
        if item.status == BadgeStatus::Failed && reported.insert(item.index) {
            warn!(
                job_id = %job_id,
                index = item.index,
                prompt = %item.prompt,
                error = item.error.as_deref().unwrap_or("unknown error"),
                "Prompt failed"
            );
        }
    }

    let terminal = view.status.is_terminal();
    {
        let mut state = ctx.state.lock();
        if !state.is_current(job_id) {
            debug!(job_id = %job_id, "Job superseded, dropping snapshot");
            return Step::Exit;
        }
        state.last_view = Some(view.clone());
        if terminal {
            state.cancel_pending = false;
        }
    }

    if !terminal {
        let _ = ctx.events.send(JobEvent::Progress(view));
        return Step::Continue;
    }

    info!(
        job_id = %job_id,
        status = %view.status,
        completed = view.completed,
        failed = view.failed,
        "Job finished"
    );
    if let Some(notification) = terminal_notification(view.status) {
        ctx.notifier.notify(notification);
    }

    let gallery = view.gallery(&ctx.urls);
    let _ = ctx.events.send(JobEvent::Finished {
        job_id: job_id.to_string(),
        status: view.status,
        view,
        gallery,
    });
    Step::Exit
}

fn terminal_notification(status: JobStatus) -> Option<Notification> {
    match status {
        JobStatus::Completed => Some(Notification::success("Image generation complete!")),
        JobStatus::Cancelled => Some(Notification::warning(
            "Cancelled. Showing completed images.",
        )),
        JobStatus::Error => Some(Notification::error("Error generating images")),
        _ => None,
    }
}
