//! Brute-force cosine-similarity fallback, grounded in the teacher's
//! `SqliteVecStore` test module (`store`/`has`/`find_similar` shape, L2
//! normalization before comparison).

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use super::{l2_normalize, EmbeddingModel, VectorStore};
use crate::error::BtsResult;
use crate::model::{Concept, Prefix};

#[derive(Default)]
pub struct MemoryVectorStore {
    points: DashMap<Prefix, RwLock<Vec<(String, String, Vec<f32>)>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert_concepts(
        &self,
        prefix: Prefix,
        concepts: &[Concept],
        model: &dyn EmbeddingModel,
        batch_size: usize,
    ) -> BtsResult<HashMap<String, String>> {
        let mut mapping = HashMap::new();
        let shard = self.points.entry(prefix).or_default();

        for batch in concepts.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch
                .iter()
                .map(|c| c.label.clone().unwrap_or_else(|| c.concept_id.clone()))
                .collect();
            let vectors = model.embed_batch(&texts).await?;

            let mut guard = shard.write().unwrap();
            for (concept, mut vector) in batch.iter().zip(vectors.into_iter()) {
                l2_normalize(&mut vector);
                let point_id = Uuid::new_v4().to_string();
                guard.push((point_id.clone(), concept.concept_id.clone(), vector));
                mapping.insert(concept.concept_id.clone(), point_id);
            }
        }
        Ok(mapping)
    }

    async fn get_vectors_for_prefix(&self, prefix: Prefix) -> BtsResult<Vec<(String, Vec<f32>)>> {
        match self.points.get(&prefix) {
            Some(shard) => Ok(shard
                .read()
                .unwrap()
                .iter()
                .map(|(_, concept_id, vector)| (concept_id.clone(), vector.clone()))
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn delete_vectors_for_prefix(&self, prefix: Prefix) -> BtsResult<()> {
        self.points.remove(&prefix);
        Ok(())
    }

    async fn find_similar(
        &self,
        prefix: Prefix,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> BtsResult<Vec<(String, f32)>> {
        let mut normalized_query = query.to_vec();
        l2_normalize(&mut normalized_query);

        let shard = match self.points.get(&prefix) {
            Some(shard) => shard,
            None => return Ok(Vec::new()),
        };

        let mut scored: Vec<(String, f32)> = shard
            .read()
            .unwrap()
            .iter()
            .map(|(_, concept_id, vector)| (concept_id.clone(), dot(&normalized_query, vector)))
            .filter(|(_, score)| *score >= threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::vector::FakeEmbeddingModel;

    fn concept(id: &str, label: &str) -> Concept {
        let mut c = Concept::new(Prefix::Hpo, id);
        c.label = Some(label.to_string());
        c
    }

    #[tokio::test]
    async fn insert_then_find_similar_returns_self() {
        let store = MemoryVectorStore::new();
        let model = FakeEmbeddingModel::new(16);
        let concepts = vec![concept("0001250", "Seizure")];
        let mapping = store
            .insert_concepts(Prefix::Hpo, &concepts, &model, 32)
            .await
            .unwrap();
        assert_eq!(mapping.len(), 1);

        let vectors = store.get_vectors_for_prefix(Prefix::Hpo).await.unwrap();
        let (_, query_vector) = vectors.into_iter().next().unwrap();

        let results = store
            .find_similar(Prefix::Hpo, &query_vector, 0.99, 10)
            .await
            .unwrap();
        assert_eq!(results[0].0, "0001250");
    }

    #[tokio::test]
    async fn delete_vectors_for_prefix_clears_shard() {
        let store = MemoryVectorStore::new();
        let model = FakeEmbeddingModel::new(8);
        let concepts = vec![concept("0001250", "Seizure")];
        store
            .insert_concepts(Prefix::Hpo, &concepts, &model, 32)
            .await
            .unwrap();
        store.delete_vectors_for_prefix(Prefix::Hpo).await.unwrap();
        assert!(store.get_vectors_for_prefix(Prefix::Hpo).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_similar_respects_prefix_isolation() {
        let store = MemoryVectorStore::new();
        let model = FakeEmbeddingModel::new(8);
        store
            .insert_concepts(Prefix::Hpo, &[concept("0001250", "Seizure")], &model, 32)
            .await
            .unwrap();
        let other_prefix_vectors = store.get_vectors_for_prefix(Prefix::Ordo).await.unwrap();
        assert!(other_prefix_vectors.is_empty());
    }
}
