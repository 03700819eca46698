//! Command-line front end for Batch Image Studio

use anyhow::{bail, Context, Result};
use batch_image_studio::{
    api::{HttpStudioClient, StudioApi},
    config::Settings,
    storage::{credential::mask, FileStore, PresetFields, Theme},
    studio::{
        progress::ProgressView, HistorySummary, JobEvent, Notification, Notifier,
        ReferenceImage, StudioSession,
    },
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "batch-studio")]
#[command(about = "Batch image generation client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (YAML or TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Submit a batch of prompts and follow its progress
    Generate {
        /// Prompts, one image each
        prompts: Vec<String>,

        /// Read additional prompts from a file, one per line
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,

        #[arg(long)]
        model: Option<String>,

        /// sequential or parallel
        #[arg(long)]
        mode: Option<String>,

        #[arg(long)]
        aspect_ratio: Option<String>,

        /// Load templates from a saved preset
        #[arg(long)]
        preset: Option<String>,

        #[arg(long)]
        master_prompts: Option<String>,

        #[arg(long)]
        suffix: Option<String>,

        #[arg(long)]
        negative_prompts: Option<String>,

        /// Reference image for subject-consistent generation
        #[arg(long)]
        reference: Option<PathBuf>,

        /// person, animal or object
        #[arg(long, default_value = "person")]
        reference_type: String,

        /// Let the server classify the reference image
        #[arg(long)]
        analyze_reference: bool,

        /// Write the ZIP of completed images into this directory
        #[arg(long)]
        download: Option<PathBuf>,
    },

    /// Show a job's progress
    Status { job_id: String },

    /// Request cancellation of a running job
    Cancel { job_id: String },

    /// Browse and manage job history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Server-side storage cleanup
    Cleanup {
        #[command(subcommand)]
        action: CleanupAction,
    },

    /// Manage prompt-template presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },

    /// Show or change the theme preference
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum KeyAction {
    /// Validate a key with the server and store it
    Set { key: String },
    Clear,
    Status,
}

#[derive(Subcommand)]
enum HistoryAction {
    List,
    Show { job_id: String },
    Delete { job_id: String },
    /// Delete every history entry
    Clear,
    /// Run a past job's prompts again
    Rerun {
        job_id: String,

        #[arg(long)]
        download: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CleanupAction {
    Status,
    /// Delete old files now
    Now,
}

#[derive(Subcommand)]
enum PresetAction {
    List,
    Show {
        name: String,
    },
    Save {
        name: String,

        #[arg(long, default_value = "")]
        master_prompts: String,

        #[arg(long, default_value = "")]
        suffix: String,

        #[arg(long, default_value = "")]
        negative_prompts: String,
    },
    Delete {
        name: String,
    },
}

#[derive(Subcommand)]
enum ThemeAction {
    Get,
    /// light or dark
    Set { theme: String },
}

/// Prints notifications to stderr
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        eprintln!("[{}] {}", notification.level, notification.message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from_path(path)?,
        None => Settings::load()?,
    };

    init_logging(&settings, cli.verbose);
    info!(api = %settings.api_base(), "Loaded configuration");

    let api: Arc<dyn StudioApi> = Arc::new(HttpStudioClient::from_settings(&settings)?);
    let store = Arc::new(FileStore::new(settings.store_path()));
    let mut session = StudioSession::new(api.clone(), store, Arc::new(ConsoleNotifier), &settings);
    session.init()?;

    let result = match cli.command {
        Commands::Key { action } => key_command(&session, action).await,
        Commands::Generate {
            prompts,
            file,
            model,
            mode,
            aspect_ratio,
            preset,
            master_prompts,
            suffix,
            negative_prompts,
            reference,
            reference_type,
            analyze_reference,
            download,
        } => {
            let mut all_prompts = prompts;
            if let Some(path) = file {
                all_prompts.extend(read_prompt_file(&path)?);
            }
            session.form_mut().set_prompts(all_prompts);

            if let Some(model) = model {
                session.select_model(&model);
            }
            if let Some(mode) = mode {
                session.form_mut().mode = mode.parse()?;
            }
            if let Some(ratio) = aspect_ratio {
                session.set_aspect_ratio(&ratio)?;
            }
            if let Some(name) = preset {
                if !session.load_preset(&name) {
                    bail!("Preset '{}' not found", name);
                }
            }
            let templates = &mut session.form_mut().templates;
            if let Some(value) = master_prompts {
                templates.master_prompts = value;
            }
            if let Some(value) = suffix {
                templates.suffix = value;
            }
            if let Some(value) = negative_prompts {
                templates.negative_prompts = value;
            }

            if let Some(path) = reference {
                let image = ReferenceImage::from_file(&path, reference_type.parse()?)?;
                info!(bytes = image.encoded_len(), "Reference image loaded");
                session.form_mut().set_reference(image);
                session.form_mut().reference_mode = true;
                if analyze_reference {
                    let kind = session.analyze_reference().await?;
                    println!("Reference type: {}", kind);
                }
            }

            let mut events = session.subscribe();
            let job_id = session.submit().await?;
            println!("Job {}", job_id);
            follow_job(&mut session, &mut events, download.as_deref()).await
        }
        Commands::Status { job_id } => {
            let snapshot = api.job_status(&job_id).await?;
            let view = ProgressView::from_snapshot(&snapshot, &[]);
            print_view(&view);
            Ok(())
        }
        Commands::Cancel { job_id } => {
            api.cancel_job(&job_id).await?;
            println!("Cancellation requested (wait up to ~5 seconds)");
            Ok(())
        }
        Commands::History { action } => history_command(&mut session, action).await,
        Commands::Cleanup { action } => cleanup_command(&session, action).await,
        Commands::Preset { action } => preset_command(&mut session, action),
        Commands::Config => {
            print!("{}", settings.to_yaml()?);
            Ok(())
        }
        Commands::Theme { action } => match action {
            ThemeAction::Get => {
                println!("{}", session.theme().get());
                Ok(())
            }
            ThemeAction::Set { theme } => {
                let theme: Theme = theme.parse()?;
                session.theme().set(theme)?;
                println!("Theme set to {}", theme);
                Ok(())
            }
        },
    };

    session.dispose();
    result
}

fn init_logging(settings: &Settings, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        settings.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if settings.logging.format == "pretty" {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    }
}

fn read_prompt_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompt file {}", path.display()))?;
    Ok(content.lines().map(str::to_string).collect())
}

/// What a Ctrl-C means while a job is being followed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Ask the server to cancel and keep following
    Cancel,
    /// Stop polling and exit
    Abort,
}

/// The first Ctrl-C cancels, any later one aborts, whether or not the
/// cancel request got through.
#[derive(Debug, Default)]
struct InterruptState {
    cancel_sent: bool,
}

impl InterruptState {
    fn next(&mut self) -> Interrupt {
        if self.cancel_sent {
            Interrupt::Abort
        } else {
            self.cancel_sent = true;
            Interrupt::Cancel
        }
    }
}

/// Print progress until the job finishes. The first Ctrl-C sends a cancel
/// request and keeps following the job, a second one stops polling.
async fn follow_job(
    session: &mut StudioSession,
    events: &mut tokio::sync::broadcast::Receiver<JobEvent>,
    download: Option<&Path>,
) -> Result<()> {
    let mut interrupts = InterruptState::default();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(JobEvent::Started { view, .. }) | Ok(JobEvent::Progress(view)) => {
                    println!("{}", view.summary());
                }
                Ok(JobEvent::Finished { job_id, status, view, gallery }) => {
                    print_view(&view);
                    if gallery.is_empty() {
                        println!("{}", view.empty_gallery_message());
                    }
                    for item in &gallery {
                        println!("#{} {}", item.index + 1, item.url);
                    }
                    info!(job_id = %job_id, status = %status, images = gallery.len(), "Job done");
                    break;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Progress events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => match interrupts.next() {
                Interrupt::Cancel => {
                    if let Err(e) = session.cancel().await {
                        warn!(error = %e, "Cancel request failed");
                    }
                    eprintln!("Press Ctrl-C again to stop following the job");
                }
                Interrupt::Abort => {
                    session.dispose();
                    bail!("Interrupted before the job finished");
                }
            },
        }
    }

    if let Some(dir) = download {
        write_archive(session, dir).await?;
    }
    Ok(())
}

async fn write_archive(session: &StudioSession, dir: &Path) -> Result<()> {
    let job_id = match session.current_job_id() {
        Some(id) => id,
        None => bail!("No job to download"),
    };
    let bytes = session.download_all().await?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.zip", job_id));
    std::fs::write(&path, bytes)?;
    println!("Saved {}", path.display());
    Ok(())
}

fn print_view(view: &ProgressView) {
    println!(
        "{} [{}] succeeded {} · failed {} · pending {}",
        view.summary(),
        view.status,
        view.succeeded,
        view.failed,
        view.pending
    );
    for item in &view.items {
        let badge = item.status.badge();
        match &item.error {
            Some(error) => println!(
                "  {} {:<14} {}  ({})",
                badge.icon, badge.label, item.prompt, error
            ),
            None => println!("  {} {:<14} {}", badge.icon, badge.label, item.prompt),
        }
    }
}

async fn key_command(session: &StudioSession, action: KeyAction) -> Result<()> {
    match action {
        KeyAction::Set { key } => {
            let validation = session.validate_and_save_key(&key).await?;
            if !validation.valid {
                bail!(validation
                    .error
                    .unwrap_or_else(|| "Invalid API key".to_string()));
            }
            println!("API key saved");
        }
        KeyAction::Clear => {
            session.credentials().clear()?;
            println!("API key removed");
        }
        KeyAction::Status => match session.credentials().get()? {
            Some(key) => println!("API key set: {}", mask(&key)),
            None => println!("No API key stored"),
        },
    }
    Ok(())
}

async fn history_command(session: &mut StudioSession, action: HistoryAction) -> Result<()> {
    let history = session.history();
    match action {
        HistoryAction::List => {
            let entries = history.list().await?;
            if entries.is_empty() {
                println!("No history");
            }
            for entry in &entries {
                let row = HistorySummary::from_entry(entry);
                println!(
                    "{} {}  {}  {} · {} · {}  {}/{}{}",
                    row.status_icon,
                    row.id,
                    row.date,
                    row.tier,
                    row.mode,
                    row.aspect_ratio,
                    row.success_count,
                    row.total,
                    if row.rerunnable { "" } else { "  (reference)" }
                );
            }
        }
        HistoryAction::Show { job_id } => {
            let entry = history.detail(&job_id).await?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        HistoryAction::Delete { job_id } => {
            history.delete(&job_id).await?;
            println!("Job deleted from history");
        }
        HistoryAction::Clear => {
            history.delete_all().await?;
            println!("All history deleted");
        }
        HistoryAction::Rerun { job_id, download } => {
            let mut events = session.subscribe();
            let new_id = session.rerun_by_id(&job_id).await?;
            println!("Job {}", new_id);
            follow_job(session, &mut events, download.as_deref()).await?;
        }
    }
    Ok(())
}

async fn cleanup_command(session: &StudioSession, action: CleanupAction) -> Result<()> {
    let cleanup = session.cleanup();
    match action {
        CleanupAction::Status => {
            let status = cleanup.status().await?;
            println!(
                "Auto cleanup: {} (files older than {} days)",
                if status.enabled { "on" } else { "off" },
                status.cleanup_days
            );
            println!("Last run: {}", status.last_cleanup_display());
            println!("Next run: {}", status.next_cleanup_display());
            println!("Deleted last run: {}", status.files_deleted_last);
            println!(
                "Storage: {} files, {:.2} MB",
                status.total_files, status.total_size_mb
            );
        }
        CleanupAction::Now => {
            let deleted = cleanup.run_now().await?;
            println!("Deleted {} old files", deleted);
        }
    }
    Ok(())
}

fn preset_command(session: &mut StudioSession, action: PresetAction) -> Result<()> {
    match action {
        PresetAction::List => {
            for preset in session.presets().list() {
                println!("{}", preset.name);
            }
        }
        PresetAction::Show { name } => match session.presets().get(&name) {
            Some(preset) => println!("{}", serde_json::to_string_pretty(&preset)?),
            None => bail!("Preset '{}' not found", name),
        },
        PresetAction::Save {
            name,
            master_prompts,
            suffix,
            negative_prompts,
        } => {
            session.form_mut().templates = PresetFields {
                master_prompts,
                suffix,
                negative_prompts,
            };
            if !session.save_preset(&name)? {
                bail!("Preset name cannot be empty");
            }
        }
        PresetAction::Delete { name } => session.delete_preset(&name)?,
    }
    Ok(())
}
