//! Single API credential held in the local store

use std::sync::Arc;

use super::{KeyValueStore, API_KEY_STORAGE_KEY};
use crate::error::Result;

/// Wraps the local store to hold one opaque credential
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current credential; blank values read as absent
    pub fn get(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get(API_KEY_STORAGE_KEY)?
            .filter(|key| !key.trim().is_empty()))
    }

    /// Store a credential, replacing any previous one
    pub fn set(&self, value: &str) -> Result<()> {
        self.store.set(API_KEY_STORAGE_KEY, value)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(API_KEY_STORAGE_KEY)
    }

    pub fn is_set(&self) -> Result<bool> {
        Ok(self.get()?.is_some())
    }
}

/// Mask a credential for display, keeping the first few characters
pub fn mask(credential: &str) -> String {
    let visible: String = credential.chars().take(6).collect();
    if credential.chars().count() <= 6 {
        "*".repeat(credential.chars().count())
    } else {
        format!("{}...", visible)
    }
}
