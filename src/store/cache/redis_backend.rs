//! Primary cache backend: Redis via `redis::aio::ConnectionManager`.
//! Grounded in `original_source/.../redis_cache.py` — `setex`/`set` for
//! TTL-or-forever writes, `model_validate_json` failure triggers a `delete`
//! on read, `flushdb` backs `purge`.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{anno_status_key, sim_status_key, vocab_status_key, Cache, SITE_MAP_KEY};
use crate::error::{BtsError, BtsResult};
use crate::model::{AnnotationStatus, Prefix, SimilarityStatus, VocabularyStatus};

pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> BtsResult<Self> {
        let client = redis::Client::open(url).map_err(|e| BtsError::Storage(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        Ok(Self { conn })
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> BtsResult<()> {
        let mut conn = self.conn.clone();
        if ttl_secs > 0 {
            conn.set_ex::<_, _, ()>(key, value, ttl_secs)
                .await
                .map_err(|e| BtsError::TransientStoreError(e.to_string()))?;
        } else {
            conn.set::<_, _, ()>(key, value)
                .await
                .map_err(|e| BtsError::TransientStoreError(e.to_string()))?;
        }
        Ok(())
    }

    async fn get_and_validate<T: serde::de::DeserializeOwned>(&self, key: &str) -> BtsResult<Option<T>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| BtsError::TransientStoreError(e.to_string()))?;
        match value {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(parsed) => Ok(Some(parsed)),
                Err(_) => {
                    let _: () = conn
                        .del(key)
                        .await
                        .map_err(|e| BtsError::TransientStoreError(e.to_string()))?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn save_vocabulary_status(&self, status: &VocabularyStatus, ttl_secs: u64) -> BtsResult<()> {
        let json = serde_json::to_string(status)?;
        self.set(&vocab_status_key(status.prefix), &json, ttl_secs).await
    }

    async fn get_vocabulary_status(&self, prefix: Prefix) -> BtsResult<Option<VocabularyStatus>> {
        self.get_and_validate(&vocab_status_key(prefix)).await
    }

    async fn save_annotation_status(&self, status: &AnnotationStatus) -> BtsResult<()> {
        let json = serde_json::to_string(status)?;
        self.set(&anno_status_key(status.prefix_a, status.prefix_b), &json, 0).await
    }

    async fn get_annotation_status(&self, prefix_1: Prefix, prefix_2: Prefix) -> BtsResult<Option<AnnotationStatus>> {
        self.get_and_validate(&anno_status_key(prefix_1, prefix_2)).await
    }

    async fn save_similarity_status(&self, status: &SimilarityStatus) -> BtsResult<()> {
        let json = serde_json::to_string(status)?;
        self.set(&sim_status_key(status.prefix), &json, 0).await
    }

    async fn get_similarity_status(&self, prefix: Prefix) -> BtsResult<Option<SimilarityStatus>> {
        self.get_and_validate(&sim_status_key(prefix)).await
    }

    async fn save_site_map(&self, site_map: &str, ttl_secs: u64) -> BtsResult<()> {
        self.set(SITE_MAP_KEY, site_map, ttl_secs).await
    }

    async fn get_site_map(&self) -> BtsResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(SITE_MAP_KEY)
            .await
            .map_err(|e| BtsError::TransientStoreError(e.to_string()))
    }

    async fn delete_key(&self, key: &str) -> BtsResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| BtsError::TransientStoreError(e.to_string()))
    }

    async fn purge(&self) -> BtsResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("FLUSHDB")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| BtsError::TransientStoreError(e.to_string()))
    }
}
