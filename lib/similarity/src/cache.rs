use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::features::ImageFeatures;

/// Bounded per-URL cache of extracted features.
///
/// Least recently used entries are evicted first. Entries never expire, so
/// an image changed behind the same URL keeps its old features until evicted.
pub struct FeatureCache {
    entries: Mutex<LruCache<String, Arc<ImageFeatures>>>,
}

impl FeatureCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, url: &str) -> Option<Arc<ImageFeatures>> {
        self.entries.lock().get(url).cloned()
    }

    pub fn insert(&self, url: &str, features: Arc<ImageFeatures>) {
        self.entries.lock().put(url.to_string(), features);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl std::fmt::Debug for FeatureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureCache")
            .field("len", &self.len())
            .finish()
    }
}
