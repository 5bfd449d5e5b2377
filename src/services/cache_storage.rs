// src/services/cache_storage.rs
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::network::Response;

/// Versioned store names. Bumping the version orphans every store of the
/// previous version, which activation then deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    pub precache: String,
    pub runtime: String,
}

impl CacheNames {
    pub fn new(prefix: &str, version: &str) -> Self {
        CacheNames {
            precache: format!("{}-cache-{}", prefix, version),
            runtime: format!("{}-runtime-{}", prefix, version),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.precache == name || self.runtime == name
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: Response,
    cached_at: DateTime<Utc>,
}

type Store = HashMap<String, CacheEntry>;

/// Named response stores shared by every in-flight request.
#[derive(Debug, Clone, Default)]
pub struct CacheStorage {
    stores: Arc<RwLock<HashMap<String, Store>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self, cache_name: &str) {
        self.stores
            .write()
            .await
            .entry(cache_name.to_string())
            .or_default();
    }

    pub async fn put(&self, cache_name: &str, key: String, response: Response) {
        debug!("Caching {} in {}", key, cache_name);
        self.stores
            .write()
            .await
            .entry(cache_name.to_string())
            .or_default()
            .insert(key, CacheEntry { response, cached_at: Utc::now() });
    }

    /// Writes every entry under one lock so readers never see a partial set.
    pub async fn put_all(&self, cache_name: &str, entries: Vec<(String, Response)>) {
        let now = Utc::now();
        let mut stores = self.stores.write().await;
        let store = stores.entry(cache_name.to_string()).or_default();
        for (key, response) in entries {
            store.insert(key, CacheEntry { response, cached_at: now });
        }
    }

    pub async fn match_in(&self, cache_name: &str, key: &str) -> Option<Response> {
        let stores = self.stores.read().await;
        let hit = stores
            .get(cache_name)
            .and_then(|store| store.get(key))
            .map(|entry| entry.response.clone());
        debug!(
            "Cache {} for {} in {}",
            if hit.is_some() { "hit" } else { "miss" },
            key,
            cache_name
        );
        hit
    }

    /// Looks the key up in every store, in name order.
    pub async fn match_any(&self, key: &str) -> Option<Response> {
        let stores = self.stores.read().await;
        let mut names: Vec<&String> = stores.keys().collect();
        names.sort();
        names
            .into_iter()
            .find_map(|name| stores[name].get(key))
            .map(|entry| entry.response.clone())
    }

    /// When the most recent entry of a store was written.
    pub async fn last_updated(&self, cache_name: &str) -> Option<DateTime<Utc>> {
        let stores = self.stores.read().await;
        stores.get(cache_name)?.values().map(|entry| entry.cached_at).max()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn has(&self, cache_name: &str) -> bool {
        self.stores.read().await.contains_key(cache_name)
    }

    pub async fn delete(&self, cache_name: &str) -> bool {
        self.stores.write().await.remove(cache_name).is_some()
    }

    pub async fn entry_count(&self, cache_name: &str) -> usize {
        self.stores
            .read()
            .await
            .get(cache_name)
            .map_or(0, |store| store.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn page(body: &'static str) -> Response {
        Response::new(StatusCode::OK, body)
    }

    #[test]
    fn names_carry_the_version() {
        let names = CacheNames::new("giggatek", "v2");
        assert_eq!(names.precache, "giggatek-cache-v2");
        assert_eq!(names.runtime, "giggatek-runtime-v2");
        assert!(names.contains("giggatek-runtime-v2"));
        assert!(!names.contains("giggatek-runtime-v1"));
    }

    #[tokio::test]
    async fn put_replaces_existing_entry() {
        let caches = CacheStorage::new();
        caches.put("runtime", "https://shop.test/".into(), page("old")).await;
        caches.put("runtime", "https://shop.test/".into(), page("new")).await;

        let hit = caches.match_in("runtime", "https://shop.test/").await.unwrap();
        assert_eq!(hit.body, "new");
        assert_eq!(caches.entry_count("runtime").await, 1);
    }

    #[tokio::test]
    async fn last_updated_tracks_the_newest_write() {
        let caches = CacheStorage::new();
        caches.open("runtime").await;
        assert_eq!(caches.last_updated("runtime").await, None);
        assert_eq!(caches.last_updated("missing").await, None);

        caches.put("runtime", "https://shop.test/a".into(), page("a")).await;
        let first = caches.last_updated("runtime").await.unwrap();
        caches.put("runtime", "https://shop.test/b".into(), page("b")).await;
        let second = caches.last_updated("runtime").await.unwrap();
        assert!(second >= first);
    }

    #[tokio::test]
    async fn lookups_are_scoped_to_a_store() {
        let caches = CacheStorage::new();
        caches.put("precache", "https://shop.test/offline.html".into(), page("offline")).await;

        assert!(caches.match_in("runtime", "https://shop.test/offline.html").await.is_none());
        let any = caches.match_any("https://shop.test/offline.html").await.unwrap();
        assert_eq!(any.body, "offline");
    }

    #[tokio::test]
    async fn delete_drops_the_whole_store() {
        let caches = CacheStorage::new();
        caches.open("a").await;
        caches.put_all("b", vec![("k".into(), page("1")), ("j".into(), page("2"))]).await;
        assert_eq!(caches.keys().await, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(caches.entry_count("b").await, 2);

        assert!(caches.delete("b").await);
        assert!(!caches.delete("b").await);
        assert!(!caches.has("b").await);
        assert!(caches.has("a").await);
    }
}
