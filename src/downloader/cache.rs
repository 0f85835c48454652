use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::api::VideoMetadata;

/// Metadata fetched during the current session, keyed by source URL.
/// Lives in memory only.
#[derive(Debug, Clone, Default)]
pub struct MetadataCache {
    cache: Arc<RwLock<HashMap<String, VideoMetadata>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, source_url: &str) -> Option<VideoMetadata> {
        let cache = self.cache.read().await;
        cache.get(source_url).cloned()
    }

    pub async fn set(&self, source_url: String, metadata: VideoMetadata) {
        let mut cache = self.cache.write().await;
        cache.insert(source_url, metadata);
    }

    pub async fn remove(&self, source_url: &str) {
        let mut cache = self.cache.write().await;
        cache.remove(source_url);
    }
}
