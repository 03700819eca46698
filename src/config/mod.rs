//! Configuration module

pub mod settings;

pub use settings::{
    GenerationDefaults, LoggingConfig, PollingConfig, ServerConfig, Settings, StorageConfig,
};
