//! Cache: advisory, reconstructible-from-stores lookup of status summaries
//! and the site map asset (spec §4.9). Grounded in
//! `original_source/.../redis_cache.py` — the key scheme
//! (`vocab_status:{prefix}`, `anno_status:{p1}:{p2}`, `sim_status:{prefix}`,
//! `assets:site_map`) and the "delete on schema drift" read path are carried
//! over directly.

mod memory;
#[cfg(feature = "redis-cache")]
mod redis_backend;

pub use memory::MemoryCache;
#[cfg(feature = "redis-cache")]
pub use redis_backend::RedisCache;

use async_trait::async_trait;

use crate::error::BtsResult;
use crate::model::{AnnotationStatus, Prefix, SimilarityStatus, VocabularyStatus};

/// Default TTL (seconds) for vocabulary/annotation status keys.
pub const STATUS_TTL_SECS: u64 = 3600;
/// Default TTL (seconds) for the site map asset.
pub const SITE_MAP_TTL_SECS: u64 = 86_400;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn save_vocabulary_status(&self, status: &VocabularyStatus, ttl_secs: u64) -> BtsResult<()>;
    async fn get_vocabulary_status(&self, prefix: Prefix) -> BtsResult<Option<VocabularyStatus>>;

    async fn save_annotation_status(&self, status: &AnnotationStatus) -> BtsResult<()>;
    async fn get_annotation_status(&self, prefix_1: Prefix, prefix_2: Prefix) -> BtsResult<Option<AnnotationStatus>>;

    async fn save_similarity_status(&self, status: &SimilarityStatus) -> BtsResult<()>;
    async fn get_similarity_status(&self, prefix: Prefix) -> BtsResult<Option<SimilarityStatus>>;

    async fn save_site_map(&self, site_map: &str, ttl_secs: u64) -> BtsResult<()>;
    async fn get_site_map(&self) -> BtsResult<Option<String>>;

    /// Remove a single key, used by the orchestrator to invalidate a
    /// status summary after a write makes it stale (spec §4.9 "may be
    /// invalidated at any time without data loss").
    async fn delete_key(&self, key: &str) -> BtsResult<()>;

    async fn purge(&self) -> BtsResult<()>;

    async fn invalidate_vocabulary(&self, prefix: Prefix) -> BtsResult<()> {
        self.delete_key(&vocab_status_key(prefix)).await
    }

    async fn invalidate_annotation(&self, prefix_1: Prefix, prefix_2: Prefix) -> BtsResult<()> {
        self.delete_key(&anno_status_key(prefix_1, prefix_2)).await
    }

    async fn invalidate_similarity(&self, prefix: Prefix) -> BtsResult<()> {
        self.delete_key(&sim_status_key(prefix)).await
    }
}

pub(crate) fn vocab_status_key(prefix: Prefix) -> String {
    format!("vocab_status:{}", prefix.as_str())
}

pub(crate) fn anno_status_key(prefix_1: Prefix, prefix_2: Prefix) -> String {
    format!("anno_status:{}:{}", prefix_1.as_str(), prefix_2.as_str())
}

pub(crate) fn sim_status_key(prefix: Prefix) -> String {
    format!("sim_status:{}", prefix.as_str())
}

pub(crate) const SITE_MAP_KEY: &str = "assets:site_map";
