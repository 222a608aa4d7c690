//! Vector store: one collection per prefix, fixed-dimension embeddings under
//! cosine distance (spec §4.6). Vectors are L2-normalized on insert, the way
//! the teacher's `SqliteVecStore` normalizes before writing to its `vec0`
//! virtual table, so that a dot product is a cosine similarity.

mod memory;
#[cfg(feature = "qdrant")]
mod qdrant;

pub use memory::MemoryVectorStore;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::BtsResult;
use crate::model::{Concept, Prefix};

/// Default batch size for the `insertConcepts` embedding pipeline.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;

/// Injected embedding model. Out of scope to implement a real model; the
/// batching/buffering contract around this trait is what's under test.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> BtsResult<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;
}

/// A deterministic fake embedder for tests: hashes each text into a vector
/// of the configured dimensionality so that identical inputs produce
/// identical (and distinct texts produce distinct) vectors.
pub struct FakeEmbeddingModel {
    dimensions: usize,
}

impl FakeEmbeddingModel {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingModel for FakeEmbeddingModel {
    async fn embed_batch(&self, texts: &[String]) -> BtsResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_to_vector(t, self.dimensions)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn hash_to_vector(text: &str, dimensions: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut out = Vec::with_capacity(dimensions);
    for i in 0..dimensions {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        i.hash(&mut hasher);
        let bits = hasher.finish();
        // Map to [-1.0, 1.0).
        out.push(((bits % 2000) as f32 / 1000.0) - 1.0);
    }
    out
}

pub(crate) fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Buffers `concepts` in groups of `batch_size`, embeds each group via
    /// `model`, and upserts one point per concept with payload
    /// `{conceptId}`. Returns `conceptId → pointId`.
    async fn insert_concepts(
        &self,
        prefix: Prefix,
        concepts: &[Concept],
        model: &dyn EmbeddingModel,
        batch_size: usize,
    ) -> BtsResult<HashMap<String, String>>;

    async fn get_vectors_for_prefix(&self, prefix: Prefix) -> BtsResult<Vec<(String, Vec<f32>)>>;

    async fn delete_vectors_for_prefix(&self, prefix: Prefix) -> BtsResult<()>;

    async fn find_similar(
        &self,
        prefix: Prefix,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> BtsResult<Vec<(String, f32)>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_embedder_is_deterministic() {
        let model = FakeEmbeddingModel::new(8);
        let a = model.embed_batch(&["seizure".to_string()]).await.unwrap();
        let b = model.embed_batch(&["seizure".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn fake_embedder_distinguishes_distinct_text() {
        let model = FakeEmbeddingModel::new(8);
        let a = model.embed_batch(&["seizure".to_string()]).await.unwrap();
        let b = model.embed_batch(&["tremor".to_string()]).await.unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn l2_normalize_yields_unit_vector() {
        let mut v = vec![3.0f32, 4.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }
}
