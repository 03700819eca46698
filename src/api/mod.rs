//! API module - server models and the HTTP client

pub mod client;
pub mod models;

pub use client::{HttpStudioClient, StudioApi};
