//! Studio front end: form state, job lifecycle, history and cleanup

pub mod cleanup;
pub mod form;
pub mod history;
pub mod notify;
pub mod poller;
pub mod progress;
pub mod reference;
pub mod session;

pub use cleanup::{CleanupClient, CleanupStatus};
pub use form::FormState;
pub use history::{HistoryClient, HistorySummary};
pub use notify::{NoticeLevel, Notification, Notifier, RecordingNotifier, TracingNotifier};
pub use poller::{JobEvent, PollHandle};
pub use progress::{BadgeStatus, GalleryItem, ProgressView};
pub use reference::ReferenceImage;
pub use session::StudioSession;
