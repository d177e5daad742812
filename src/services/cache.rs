//! Bounded LRU caches for model handles and generated responses.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, OnceCell};

use crate::domain::ports::model_runtime::{
    ModelHandle, ModelRuntime, RuntimeResult, TokenId,
};

/// A generated response retained for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub text: String,
    pub tokens: Vec<TokenId>,
}

/// Per-worker response cache keyed by the exact rendered prompt text.
///
/// Capacity zero disables caching entirely.
#[derive(Debug)]
pub struct ResponseCache {
    inner: Option<LruCache<String, CachedResponse>>,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    pub fn get(&mut self, prompt: &str) -> Option<&CachedResponse> {
        self.inner.as_mut().and_then(|cache| cache.get(prompt))
    }

    pub fn put(&mut self, prompt: String, response: CachedResponse) {
        if let Some(cache) = self.inner.as_mut() {
            cache.put(prompt, response);
        }
    }
}

/// Process-wide model handle cache keyed by checkpoint name.
///
/// Each slot holds a `OnceCell` so that concurrent requests for the same
/// checkpoint trigger a single load; late arrivals wait on the cell instead
/// of loading again. Capacity zero disables caching and every request loads
/// directly.
pub struct ModelCache {
    slots: Mutex<Option<LruCache<String, Arc<OnceCell<ModelHandle>>>>>,
}

impl ModelCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(NonZeroUsize::new(capacity).map(LruCache::new)),
        }
    }

    /// Return a handle for `checkpoint`, loading it through `runtime` if it
    /// is not resident. Eviction drops the least recently used handle.
    pub async fn get_or_load(
        &self,
        runtime: &dyn ModelRuntime,
        checkpoint: &str,
    ) -> RuntimeResult<ModelHandle> {
        let cell = {
            let mut guard = self.slots.lock().await;
            match guard.as_mut() {
                None => None,
                Some(cache) => {
                    if let Some(cell) = cache.get(checkpoint) {
                        Some(Arc::clone(cell))
                    } else {
                        let cell = Arc::new(OnceCell::new());
                        cache.push(checkpoint.to_string(), Arc::clone(&cell));
                        Some(cell)
                    }
                }
            }
        };

        match cell {
            None => runtime.load(checkpoint).await,
            Some(cell) => {
                let handle = cell
                    .get_or_try_init(|| runtime.load(checkpoint))
                    .await?;
                Ok(handle.clone())
            }
        }
    }
}
