//! Tool catalog and resource caches with TTL and LRU eviction
//!
//! Caches TIP tool definitions and resource contents to reduce round
//! trips. Entries expire by TTL only; there is no push invalidation.

use lru::LruCache;
use mesh_core::ToolDefinition;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CatalogCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Cached tool entry with TTL
#[derive(Debug, Clone)]
struct CachedTool {
    definition: ToolDefinition,
    cached_at: Instant,
    access_count: u64,
}

impl CachedTool {
    fn new(definition: ToolDefinition) -> Self {
        Self {
            definition,
            cached_at: Instant::now(),
            access_count: 0,
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }

    fn touch(&mut self) {
        self.access_count += 1;
    }
}

/// Tool definition cache keyed by tool name
pub struct ToolCatalogCache {
    cache: RwLock<LruCache<String, CachedTool>>,
    ttl: Duration,
    stats: RwLock<CatalogCacheStats>,
}

impl ToolCatalogCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::new(1000).unwrap());
        Self {
            cache: RwLock::new(LruCache::new(capacity)),
            ttl,
            stats: RwLock::new(CatalogCacheStats::default()),
        }
    }

    /// Get a fresh tool definition from cache
    pub async fn get(&self, name: &str) -> Option<ToolDefinition> {
        let mut cache = self.cache.write().await;

        if let Some(entry) = cache.get_mut(name) {
            if entry.is_expired(self.ttl) {
                cache.pop(name);
                let mut stats = self.stats.write().await;
                stats.misses += 1;
                stats.evictions += 1;
                return None;
            }

            entry.touch();
            let mut stats = self.stats.write().await;
            stats.hits += 1;
            return Some(entry.definition.clone());
        }

        let mut stats = self.stats.write().await;
        stats.misses += 1;
        None
    }

    /// Insert or update a tool definition
    pub async fn insert(&self, definition: ToolDefinition) {
        let name = definition.name.clone();
        let mut cache = self.cache.write().await;
        cache.put(name, CachedTool::new(definition));
    }

    /// Insert a batch of tool definitions from one TIP listing
    pub async fn insert_batch(&self, definitions: Vec<ToolDefinition>) {
        let mut cache = self.cache.write().await;
        for definition in definitions {
            let name = definition.name.clone();
            cache.put(name, CachedTool::new(definition));
        }
        debug!("Tool catalog cached ({} entries)", cache.len());
    }

    /// All unexpired tool definitions
    pub async fn list_all(&self) -> Vec<ToolDefinition> {
        let cache = self.cache.read().await;
        cache
            .iter()
            .filter(|(_, entry)| !entry.is_expired(self.ttl))
            .map(|(_, entry)| entry.definition.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Drop all cached entries
    pub async fn clear(&self) {
        self.cache.write().await.clear();
        info!("Tool catalog cache cleared");
    }

    /// Evict expired entries, returning how many were removed
    pub async fn evict_expired(&self) -> usize {
        let mut cache = self.cache.write().await;
        let mut stats = self.stats.write().await;

        let to_remove: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .map(|(name, _)| name.clone())
            .collect();

        let count = to_remove.len();
        for name in to_remove {
            cache.pop(&name);
            stats.evictions += 1;
        }

        if count > 0 {
            debug!("Evicted {} expired tool definitions", count);
        }

        count
    }

    pub async fn stats(&self) -> CatalogCacheStats {
        self.stats.read().await.clone()
    }
}

/// Cached resource content keyed by URI.
///
/// Invalidated by TTL only, never by explicit push invalidation.
pub struct ResourceCache {
    cache: RwLock<LruCache<String, ResourceEntry>>,
    ttl: Duration,
    stats: RwLock<CatalogCacheStats>,
}

#[derive(Debug, Clone)]
struct ResourceEntry {
    content: Value,
    fetched_at: Instant,
}

impl ResourceCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::new(1000).unwrap());
        Self {
            cache: RwLock::new(LruCache::new(capacity)),
            ttl,
            stats: RwLock::new(CatalogCacheStats::default()),
        }
    }

    /// Get unexpired content for a URI
    pub async fn get(&self, uri: &str) -> Option<Value> {
        let mut cache = self.cache.write().await;

        if let Some(entry) = cache.get(uri) {
            if entry.fetched_at.elapsed() > self.ttl {
                cache.pop(uri);
                let mut stats = self.stats.write().await;
                stats.misses += 1;
                stats.evictions += 1;
                return None;
            }

            let content = entry.content.clone();
            let mut stats = self.stats.write().await;
            stats.hits += 1;
            return Some(content);
        }

        let mut stats = self.stats.write().await;
        stats.misses += 1;
        None
    }

    /// Store freshly fetched content
    pub async fn insert(&self, uri: &str, content: Value) {
        let mut cache = self.cache.write().await;
        cache.put(
            uri.to_string(),
            ResourceEntry {
                content,
                fetched_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    pub async fn stats(&self) -> CatalogCacheStats {
        self.stats.read().await.clone()
    }
}

/// Background maintenance task sweeping expired catalog entries
pub async fn catalog_maintenance_loop(cache: Arc<ToolCatalogCache>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        let evicted = cache.evict_expired().await;
        if evicted > 0 {
            debug!("Catalog maintenance: evicted {} entries", evicted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_tool(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: "Test tool".to_string(),
            input_schema: json!({}),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_catalog_insert_and_get() {
        let cache = ToolCatalogCache::new(100, Duration::from_secs(300));
        cache.insert(make_tool("transcode")).await;

        let definition = cache.get("transcode").await;
        assert!(definition.is_some());
        assert_eq!(definition.unwrap().name, "transcode");
    }

    #[tokio::test]
    async fn test_catalog_expiry() {
        let cache = ToolCatalogCache::new(100, Duration::from_millis(10));
        cache.insert(make_tool("transcode")).await;

        assert!(cache.get("transcode").await.is_some());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("transcode").await.is_none());
    }

    #[tokio::test]
    async fn test_catalog_stats() {
        let cache = ToolCatalogCache::new(100, Duration::from_secs(300));
        cache.insert(make_tool("transcode")).await;

        cache.get("transcode").await;
        cache.get("nonexistent").await;

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_catalog_evict_expired() {
        let cache = ToolCatalogCache::new(100, Duration::from_millis(10));
        cache.insert_batch(vec![make_tool("a"), make_tool("b")]).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.evict_expired().await, 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_resource_cache_roundtrip() {
        let cache = ResourceCache::new(100, Duration::from_secs(300));
        cache.insert("mem://notes/1", json!({"body": "hi"})).await;

        assert_eq!(
            cache.get("mem://notes/1").await,
            Some(json!({"body": "hi"}))
        );
        assert_eq!(cache.get("mem://notes/2").await, None);
    }

    #[tokio::test]
    async fn test_resource_cache_ttl_only_invalidation() {
        let cache = ResourceCache::new(100, Duration::from_millis(10));
        cache.insert("mem://notes/1", json!(1)).await;

        assert!(cache.get("mem://notes/1").await.is_some());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("mem://notes/1").await.is_none());
    }
}
