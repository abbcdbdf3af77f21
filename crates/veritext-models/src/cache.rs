//! Lazily populated, process-wide model cache

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use veritext_core::Result;

/// Cache of loaded models keyed by model identifier.
///
/// Each key loads at most once: concurrent callers asking for the same key
/// wait for a single in-flight load. A failed load leaves the slot empty so
/// the next request retries it.
pub struct ModelCache<M> {
    slots: Mutex<HashMap<String, Arc<OnceCell<Arc<M>>>>>,
}

impl<M> ModelCache<M> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached model for `key`, running `load` if it is not yet
    /// loaded
    pub async fn get_or_try_load<F, Fut>(&self, key: &str, load: F) -> Result<Arc<M>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<M>>,
    {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        slot.get_or_try_init(|| async { load().await.map(Arc::new) })
            .await
            .map(Arc::clone)
    }

    /// Cached model for `key`, without loading
    pub fn get(&self, key: &str) -> Option<Arc<M>> {
        let slots = self.slots.lock();
        slots.get(key).and_then(|slot| slot.get().cloned())
    }

    pub fn is_loaded(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Keys whose model finished loading, sorted
    pub fn loaded_keys(&self) -> Vec<String> {
        let slots = self.slots.lock();
        let mut keys: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl<M> Default for ModelCache<M> {
    fn default() -> Self {
        Self::new()
    }
}
