//! Document store: prefix-sharded concept records, n-gram/search-text
//! indices, auto-complete, and the administrative user repository
//! (spec §4.4).

mod memory;
mod sqlite;
#[cfg(feature = "mongo")]
mod mongo;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;
#[cfg(feature = "mongo")]
pub use mongo::MongoDocumentStore;

use async_trait::async_trait;

use crate::error::BtsResult;
use crate::model::{ApiKey, Concept, Prefix, User};

/// One bulk-save failure: the term's id plus why it was rejected. A batch
/// continues past individual failures (spec §4.4 "duplicates ... fail the
/// record but not the batch").
#[derive(Debug, Clone)]
pub struct SaveTermFailure {
    pub concept_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct SaveTermsOutcome {
    pub saved: usize,
    pub failures: Vec<SaveTermFailure>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_index(
        &self,
        prefix: Prefix,
        field: &str,
        unique: bool,
        overwrite: bool,
    ) -> BtsResult<()>;

    async fn save_terms(&self, prefix: Prefix, terms: Vec<Concept>) -> BtsResult<SaveTermsOutcome>;

    async fn count_terms(&self, prefix: Prefix) -> BtsResult<u64>;

    /// Drops and recreates the shard for `prefix`.
    async fn delete_all_for_prefix(&self, prefix: Prefix) -> BtsResult<()>;

    async fn get_terms(&self, prefix: Prefix, limit: Option<usize>) -> BtsResult<Vec<Concept>>;

    async fn get_terms_by_ids(&self, prefix: Prefix, ids: &[String]) -> BtsResult<Vec<Concept>>;

    async fn auto_complete(
        &self,
        prefix: Prefix,
        query: &str,
        limit: usize,
    ) -> BtsResult<Vec<Concept>>;

    /// Bulk upsert of the `vectorId` field.
    async fn update_vector_mapping(
        &self,
        prefix: Prefix,
        mapping: Vec<(String, String)>,
    ) -> BtsResult<()>;

    // --- administrative user repository ---

    async fn save_user(&self, user: User) -> BtsResult<()>;
    async fn get_user(&self, username: &str) -> BtsResult<Option<User>>;
    async fn save_api_key(&self, key: ApiKey) -> BtsResult<()>;
    async fn find_by_api_key_hash(&self, key_hash: &str) -> BtsResult<Option<ApiKey>>;
}
