//! In-process TTL cache fallback, keyed exactly like the Redis backend so a
//! caller cannot observe which one is mounted.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{anno_status_key, sim_status_key, vocab_status_key, Cache, SITE_MAP_KEY};
use crate::error::BtsResult;
use crate::model::{AnnotationStatus, Prefix, SimilarityStatus, VocabularyStatus};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, key: String, value: String, ttl_secs: u64) {
        let expires_at = if ttl_secs > 0 {
            Some(Instant::now() + Duration::from_secs(ttl_secs))
        } else {
            None
        };
        self.entries.lock().unwrap().insert(key, Entry { value, expires_at });
    }

    fn get(&self, key: &str) -> Option<String> {
        let mut guard = self.entries.lock().unwrap();
        match guard.get(key) {
            Some(entry) => {
                if let Some(expires_at) = entry.expires_at {
                    if Instant::now() >= expires_at {
                        guard.remove(key);
                        return None;
                    }
                }
                Some(entry.value.clone())
            }
            None => None,
        }
    }

    fn delete(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn save_vocabulary_status(&self, status: &VocabularyStatus, ttl_secs: u64) -> BtsResult<()> {
        let json = serde_json::to_string(status)?;
        self.set(vocab_status_key(status.prefix), json, ttl_secs);
        Ok(())
    }

    async fn get_vocabulary_status(&self, prefix: Prefix) -> BtsResult<Option<VocabularyStatus>> {
        let key = vocab_status_key(prefix);
        match self.get(&key) {
            Some(value) => match serde_json::from_str(&value) {
                Ok(status) => Ok(Some(status)),
                Err(_) => {
                    self.delete(&key);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn save_annotation_status(&self, status: &AnnotationStatus) -> BtsResult<()> {
        let json = serde_json::to_string(status)?;
        self.set(anno_status_key(status.prefix_a, status.prefix_b), json, 0);
        Ok(())
    }

    async fn get_annotation_status(&self, prefix_1: Prefix, prefix_2: Prefix) -> BtsResult<Option<AnnotationStatus>> {
        let key = anno_status_key(prefix_1, prefix_2);
        match self.get(&key) {
            Some(value) => match serde_json::from_str(&value) {
                Ok(status) => Ok(Some(status)),
                Err(_) => {
                    self.delete(&key);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn save_similarity_status(&self, status: &SimilarityStatus) -> BtsResult<()> {
        let json = serde_json::to_string(status)?;
        self.set(sim_status_key(status.prefix), json, 0);
        Ok(())
    }

    async fn get_similarity_status(&self, prefix: Prefix) -> BtsResult<Option<SimilarityStatus>> {
        let key = sim_status_key(prefix);
        match self.get(&key) {
            Some(value) => match serde_json::from_str(&value) {
                Ok(status) => Ok(Some(status)),
                Err(_) => {
                    self.delete(&key);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn save_site_map(&self, site_map: &str, ttl_secs: u64) -> BtsResult<()> {
        self.set(SITE_MAP_KEY.to_string(), site_map.to_string(), ttl_secs);
        Ok(())
    }

    async fn get_site_map(&self) -> BtsResult<Option<String>> {
        Ok(self.get(SITE_MAP_KEY))
    }

    async fn delete_key(&self, key: &str) -> BtsResult<()> {
        self.delete(key);
        Ok(())
    }

    async fn purge(&self) -> BtsResult<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn vocabulary_status_round_trips() {
        let cache = MemoryCache::new();
        let status = VocabularyStatus::absent(Prefix::Hpo);
        cache.save_vocabulary_status(&status, 3600).await.unwrap();
        let fetched = cache.get_vocabulary_status(Prefix::Hpo).await.unwrap();
        assert_eq!(fetched, Some(status));
    }

    #[tokio::test]
    async fn expired_entry_is_absent() {
        let cache = MemoryCache::new();
        let status = VocabularyStatus::absent(Prefix::Hpo);
        cache.set(vocab_status_key(Prefix::Hpo), serde_json::to_string(&status).unwrap(), 0);
        // ttl_secs=0 means no expiry in `set`; verify explicit expiry instead.
        cache.entries.lock().unwrap().get_mut(&vocab_status_key(Prefix::Hpo)).unwrap().expires_at =
            Some(Instant::now() - Duration::from_secs(1));
        assert_eq!(cache.get_vocabulary_status(Prefix::Hpo).await.unwrap(), None);
    }

    #[tokio::test]
    async fn purge_clears_all_keys() {
        let cache = MemoryCache::new();
        cache.save_site_map("<xml/>", 86400).await.unwrap();
        cache.purge().await.unwrap();
        assert_eq!(cache.get_site_map().await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_payload_is_deleted_on_read() {
        let cache = MemoryCache::new();
        cache.set(vocab_status_key(Prefix::Hpo), "not json".to_string(), 3600);
        assert_eq!(cache.get_vocabulary_status(Prefix::Hpo).await.unwrap(), None);
        assert!(cache.get(&vocab_status_key(Prefix::Hpo)).is_none());
    }
}
