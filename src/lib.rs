//! Batch Image Studio
//!
//! Client for a batch image-generation server: submits prompt batches,
//! polls job progress, and manages the local credential, prompt presets,
//! theme, server-side history and storage cleanup.

pub mod api;
pub mod config;
pub mod error;
pub mod response;
pub mod storage;
pub mod studio;

pub use error::{AppError, Result};
pub use studio::StudioSession;
