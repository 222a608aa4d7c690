//! In-process document store fallback, used by unit tests and single-node
//! deployments that set `DOC_STORE_DRIVER=sqlite` are expected to reach
//! [`super::SqliteDocumentStore`] instead; this backend exists purely for
//! tests that want a zero-setup store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::RwLock;

use super::{DocumentStore, SaveTermFailure, SaveTermsOutcome};
use crate::autocomplete::{self, IndexedTerm};
use crate::error::{BtsError, BtsResult};
use crate::model::{ApiKey, Concept, Prefix, User};

#[derive(Default)]
pub struct MemoryDocumentStore {
    shards: DashMap<Prefix, RwLock<Vec<IndexedTerm>>>,
    users: DashMap<String, User>,
    api_keys: DashMap<String, ApiKey>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create_index(
        &self,
        prefix: Prefix,
        _field: &str,
        _unique: bool,
        _overwrite: bool,
    ) -> BtsResult<()> {
        self.shards.entry(prefix).or_insert_with(|| RwLock::new(Vec::new()));
        Ok(())
    }

    async fn save_terms(&self, prefix: Prefix, terms: Vec<Concept>) -> BtsResult<SaveTermsOutcome> {
        let indexed = autocomplete::index_terms(terms);
        let shard = self
            .shards
            .entry(prefix)
            .or_insert_with(|| RwLock::new(Vec::new()));
        let mut guard = shard.write().unwrap();

        let mut outcome = SaveTermsOutcome::default();
        let mut seen: std::collections::HashSet<String> =
            guard.iter().map(|t| t.concept.concept_id.clone()).collect();

        for term in indexed {
            if seen.contains(&term.concept.concept_id) {
                outcome.failures.push(SaveTermFailure {
                    concept_id: term.concept.concept_id.clone(),
                    reason: "duplicate concept_id within prefix".to_string(),
                });
                continue;
            }
            seen.insert(term.concept.concept_id.clone());
            outcome.saved += 1;
            guard.push(term);
        }
        Ok(outcome)
    }

    async fn count_terms(&self, prefix: Prefix) -> BtsResult<u64> {
        Ok(self
            .shards
            .get(&prefix)
            .map(|s| s.read().unwrap().len() as u64)
            .unwrap_or(0))
    }

    async fn delete_all_for_prefix(&self, prefix: Prefix) -> BtsResult<()> {
        self.shards.insert(prefix, RwLock::new(Vec::new()));
        Ok(())
    }

    async fn get_terms(&self, prefix: Prefix, limit: Option<usize>) -> BtsResult<Vec<Concept>> {
        let Some(shard) = self.shards.get(&prefix) else {
            return Ok(Vec::new());
        };
        let guard = shard.read().unwrap();
        let iter = guard.iter().map(|t| t.concept.clone());
        Ok(match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        })
    }

    async fn get_terms_by_ids(&self, prefix: Prefix, ids: &[String]) -> BtsResult<Vec<Concept>> {
        let Some(shard) = self.shards.get(&prefix) else {
            return Ok(Vec::new());
        };
        let guard = shard.read().unwrap();
        Ok(guard
            .iter()
            .filter(|t| ids.contains(&t.concept.concept_id))
            .map(|t| t.concept.clone())
            .collect())
    }

    async fn auto_complete(
        &self,
        prefix: Prefix,
        query: &str,
        limit: usize,
    ) -> BtsResult<Vec<Concept>> {
        let Some(shard) = self.shards.get(&prefix) else {
            return Ok(Vec::new());
        };
        let guard = shard.read().unwrap();
        Ok(autocomplete::auto_complete(&guard, query, limit)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn update_vector_mapping(
        &self,
        prefix: Prefix,
        mapping: Vec<(String, String)>,
    ) -> BtsResult<()> {
        let Some(shard) = self.shards.get(&prefix) else {
            return Err(BtsError::VocabularyNotLoaded(prefix.to_string()));
        };
        let mut guard = shard.write().unwrap();
        for (concept_id, vector_id) in mapping {
            if let Some(term) = guard.iter_mut().find(|t| t.concept.concept_id == concept_id) {
                term.concept.vector_id = Some(vector_id);
            }
        }
        Ok(())
    }

    async fn save_user(&self, user: User) -> BtsResult<()> {
        self.users.insert(user.username.clone(), user);
        Ok(())
    }

    async fn get_user(&self, username: &str) -> BtsResult<Option<User>> {
        Ok(self.users.get(username).map(|u| u.clone()))
    }

    async fn save_api_key(&self, key: ApiKey) -> BtsResult<()> {
        self.api_keys.insert(key.key_hash.clone(), key);
        Ok(())
    }

    async fn find_by_api_key_hash(&self, key_hash: &str) -> BtsResult<Option<ApiKey>> {
        Ok(self.api_keys.get(key_hash).map(|k| k.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hpo_concept(id: &str, label: &str) -> Concept {
        let mut c = Concept::new(Prefix::Hpo, id);
        c.label = Some(label.to_string());
        c
    }

    #[tokio::test]
    async fn save_and_count_round_trips() {
        let store = MemoryDocumentStore::new();
        store.create_index(Prefix::Hpo, "nGrams", false, true).await.unwrap();
        let outcome = store
            .save_terms(Prefix::Hpo, vec![hpo_concept("0001250", "Seizure")])
            .await
            .unwrap();
        assert_eq!(outcome.saved, 1);
        assert_eq!(store.count_terms(Prefix::Hpo).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_concept_id_fails_record_not_batch() {
        let store = MemoryDocumentStore::new();
        store
            .save_terms(Prefix::Hpo, vec![hpo_concept("0001250", "Seizure")])
            .await
            .unwrap();
        let outcome = store
            .save_terms(
                Prefix::Hpo,
                vec![hpo_concept("0001250", "Seizure"), hpo_concept("0002373", "Febrile seizure")],
            )
            .await
            .unwrap();
        assert_eq!(outcome.saved, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(store.count_terms(Prefix::Hpo).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn delete_all_for_prefix_clears_shard() {
        let store = MemoryDocumentStore::new();
        store
            .save_terms(Prefix::Hpo, vec![hpo_concept("0001250", "Seizure")])
            .await
            .unwrap();
        store.delete_all_for_prefix(Prefix::Hpo).await.unwrap();
        assert_eq!(store.count_terms(Prefix::Hpo).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_vector_mapping_backfills_vector_id() {
        let store = MemoryDocumentStore::new();
        store
            .save_terms(Prefix::Hpo, vec![hpo_concept("0001250", "Seizure")])
            .await
            .unwrap();
        store
            .update_vector_mapping(Prefix::Hpo, vec![("0001250".to_string(), "pt-1".to_string())])
            .await
            .unwrap();
        let terms = store.get_terms(Prefix::Hpo, None).await.unwrap();
        assert_eq!(terms[0].vector_id.as_deref(), Some("pt-1"));
    }

    #[tokio::test]
    async fn auto_complete_surfaces_exact_match_first() {
        let store = MemoryDocumentStore::new();
        store
            .save_terms(
                Prefix::Hpo,
                vec![hpo_concept("0001250", "Seizure"), hpo_concept("0002373", "Febrile seizure")],
            )
            .await
            .unwrap();
        let results = store.auto_complete(Prefix::Hpo, "seizure", 5).await.unwrap();
        assert_eq!(results[0].concept_id, "0001250");
    }
}
