//! Registry of in-flight model downloads
//!
//! At most one download per model id may be active. [`DownloadRegistry::try_register`]
//! performs the check and the insert as one atomic step on the map entry, so
//! two concurrent pulls of the same model cannot both get through.
//!
//! The registry keeps each download's cancellation token. The relay holds a
//! [`DownloadHandle`] lease; dropping the lease releases the entry. Every
//! registration carries a generation number so that a stale lease (its entry
//! was cancelled and the model registered again) never removes the newer entry.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use dashmap::{mapref::entry::Entry, DashMap};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{error::RelayError, Result};

#[derive(Debug)]
struct Registration {
    generation: u64,
    token: CancellationToken,
}

/// Process-wide table of active downloads, keyed by model id
#[derive(Debug, Clone, Default)]
pub struct DownloadRegistry {
    entries: Arc<DashMap<String, Registration>>,
    generations: Arc<AtomicU64>,
}

impl DownloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a download with a fresh cancellation token
    pub fn try_register(&self, model_id: &str) -> Result<DownloadHandle> {
        self.try_register_with(model_id, &CancellationToken::new())
    }

    /// Register a download whose token is a child of `parent`, so cancelling
    /// the caller's token also cancels the download.
    pub fn try_register_with(
        &self,
        model_id: &str,
        parent: &CancellationToken,
    ) -> Result<DownloadHandle> {
        match self.entries.entry(model_id.to_string()) {
            Entry::Occupied(_) => {
                debug!(model = %model_id, "Download already registered");
                Err(RelayError::AlreadyInProgress(model_id.to_string()))
            }
            Entry::Vacant(vacant) => {
                let generation = self.generations.fetch_add(1, Ordering::Relaxed);
                let token = parent.child_token();
                vacant.insert(Registration {
                    generation,
                    token: token.clone(),
                });
                debug!(model = %model_id, generation, "Download registered");

                Ok(DownloadHandle {
                    model_id: model_id.to_string(),
                    generation,
                    token,
                    registry: self.clone(),
                })
            }
        }
    }

    /// Remove the entry for `model_id` without cancelling it.
    /// Returns false when nothing was registered.
    pub fn release(&self, model_id: &str) -> bool {
        let removed = self.entries.remove(model_id).is_some();
        if removed {
            debug!(model = %model_id, "Download released");
        }
        removed
    }

    /// Remove the entry only if it still belongs to `generation`
    pub(crate) fn release_generation(&self, model_id: &str, generation: u64) -> bool {
        let removed = self
            .entries
            .remove_if(model_id, |_, registration| registration.generation == generation)
            .is_some();
        if removed {
            debug!(model = %model_id, generation, "Download released");
        }
        removed
    }

    /// Cancel the download for `model_id` and remove its entry.
    /// Returns false when no download was active.
    pub fn cancel(&self, model_id: &str) -> bool {
        match self.entries.remove(model_id) {
            Some((_, registration)) => {
                registration.token.cancel();
                debug!(model = %model_id, "Download cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, model_id: &str) -> bool {
        self.entries.contains_key(model_id)
    }

    /// Model ids with an active download, sorted
    pub fn active(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lease on a registry entry, held by the relay driving the download
///
/// Dropping the handle releases its entry.
#[derive(Debug)]
pub struct DownloadHandle {
    model_id: String,
    generation: u64,
    token: CancellationToken,
    registry: DownloadRegistry,
}

impl DownloadHandle {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Token fired when this download is cancelled
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Release the entry now
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for DownloadHandle {
    fn drop(&mut self) {
        self.registry
            .release_generation(&self.model_id, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_exclusive_per_model() {
        let registry = DownloadRegistry::new();
        let handle = registry.try_register("llama3").unwrap();

        assert!(matches!(
            registry.try_register("llama3"),
            Err(RelayError::AlreadyInProgress(ref model)) if model == "llama3"
        ));
        assert!(registry.try_register("phi3").is_ok());

        drop(handle);
        assert!(registry.try_register("llama3").is_ok());
    }

    #[test]
    fn test_handle_drop_releases_entry() {
        let registry = DownloadRegistry::new();
        {
            let _handle = registry.try_register("mistral").unwrap();
            assert!(registry.is_active("mistral"));
        }
        assert!(!registry.is_active("mistral"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_fires_token_and_removes() {
        let registry = DownloadRegistry::new();
        let handle = registry.try_register("llama3").unwrap();

        assert!(registry.cancel("llama3"));
        assert!(handle.is_cancelled());
        assert!(!registry.is_active("llama3"));

        assert!(!registry.cancel("llama3"));
        assert!(!registry.cancel("never-registered"));
    }

    #[test]
    fn test_stale_handle_does_not_release_new_registration() {
        let registry = DownloadRegistry::new();
        let stale = registry.try_register("llama3").unwrap();
        registry.cancel("llama3");

        let fresh = registry.try_register("llama3").unwrap();
        drop(stale);

        assert!(registry.is_active("llama3"));
        assert!(!fresh.is_cancelled());
        fresh.release();
        assert!(!registry.is_active("llama3"));
    }

    #[test]
    fn test_parent_token_cancels_download() {
        let registry = DownloadRegistry::new();
        let parent = CancellationToken::new();
        let handle = registry.try_register_with("llama3", &parent).unwrap();

        parent.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_release_without_cancel() {
        let registry = DownloadRegistry::new();
        let handle = registry.try_register("llama3").unwrap();

        assert!(registry.release("llama3"));
        assert!(!handle.is_cancelled());
        assert!(!registry.release("llama3"));
    }

    #[test]
    fn test_active_is_sorted() {
        let registry = DownloadRegistry::new();
        let _b = registry.try_register("phi3").unwrap();
        let _a = registry.try_register("gemma").unwrap();
        assert_eq!(registry.active(), vec!["gemma", "phi3"]);
        assert_eq!(registry.len(), 2);
    }
}
