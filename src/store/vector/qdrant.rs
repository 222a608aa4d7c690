//! Primary vector store backend: one Qdrant collection per prefix, cosine
//! distance, `conceptId` kept as point payload. Grounded in
//! `original_source/.../qdrant_vector_db.py` (`insert_concepts` batches
//! through an embedder then `upsert`s; `get_vectors_for_prefix_iter` scrolls
//! with `limit=100`; `delete_vectors_for_prefix` drops the collection).

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    Distance, PointStruct, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use uuid::Uuid;

use super::{l2_normalize, EmbeddingModel, VectorStore};
use crate::error::{BtsError, BtsResult};
use crate::model::{Concept, Prefix};

const SCROLL_PAGE_SIZE: u32 = 100;

pub struct QdrantVectorStore {
    client: Qdrant,
    dimensions: u64,
}

impl QdrantVectorStore {
    pub fn connect(url: &str, dimensions: u64) -> BtsResult<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        Ok(Self { client, dimensions })
    }

    async fn ensure_collection(&self, collection_name: &str) -> BtsResult<()> {
        let exists = self
            .client
            .collection_exists(collection_name)
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        if !exists {
            self.client
                .create_collection(
                    qdrant_client::qdrant::CreateCollectionBuilder::new(collection_name)
                        .vectors_config(VectorParamsBuilder::new(self.dimensions, Distance::Cosine)),
                )
                .await
                .map_err(|e| BtsError::IndexCreationError(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn insert_concepts(
        &self,
        prefix: Prefix,
        concepts: &[Concept],
        model: &dyn EmbeddingModel,
        batch_size: usize,
    ) -> BtsResult<HashMap<String, String>> {
        if concepts.is_empty() {
            return Ok(HashMap::new());
        }
        let collection_name = prefix.as_str();
        self.ensure_collection(collection_name).await?;

        let mut mapping = HashMap::new();
        for batch in concepts.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch
                .iter()
                .map(|c| c.label.clone().unwrap_or_else(|| c.concept_id.clone()))
                .collect();
            let vectors = model.embed_batch(&texts).await?;

            let points: Vec<PointStruct> = batch
                .iter()
                .zip(vectors.into_iter())
                .map(|(concept, mut vector)| {
                    l2_normalize(&mut vector);
                    let point_id = Uuid::new_v4().to_string();
                    mapping.insert(concept.concept_id.clone(), point_id.clone());
                    PointStruct::new(
                        point_id,
                        vector,
                        [("conceptId", concept.concept_id.clone().into())]
                            .into_iter()
                            .collect::<std::collections::HashMap<_, _>>(),
                    )
                })
                .collect();

            self.client
                .upsert_points(UpsertPointsBuilder::new(collection_name, points))
                .await
                .map_err(|e| BtsError::TransientStoreError(e.to_string()))?;
        }
        Ok(mapping)
    }

    async fn get_vectors_for_prefix(&self, prefix: Prefix) -> BtsResult<Vec<(String, Vec<f32>)>> {
        let collection_name = prefix.as_str();
        let exists = self
            .client
            .collection_exists(collection_name)
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        if !exists {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        let mut offset = None;
        loop {
            let mut builder = ScrollPointsBuilder::new(collection_name)
                .limit(SCROLL_PAGE_SIZE)
                .with_vectors(true)
                .with_payload(true);
            if let Some(id) = offset.clone() {
                builder = builder.offset(id);
            }
            let response = self
                .client
                .scroll(builder)
                .await
                .map_err(|e| BtsError::Storage(e.to_string()))?;

            if response.result.is_empty() {
                break;
            }
            for point in &response.result {
                let concept_id = point
                    .payload
                    .get("conceptId")
                    .and_then(|v| v.as_str().map(str::to_string));
                if let (Some(concept_id), Some(vectors)) = (concept_id, point.vectors.clone()) {
                    if let Some(dense) = vectors.vectors_options {
                        if let qdrant_client::qdrant::vectors::VectorsOptions::Vector(v) = dense {
                            out.push((concept_id, v.data));
                        }
                    }
                }
            }

            match response.next_page_offset {
                Some(next) if Some(&next) != offset.as_ref() => offset = Some(next),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn delete_vectors_for_prefix(&self, prefix: Prefix) -> BtsResult<()> {
        let collection_name = prefix.as_str();
        let exists = self
            .client
            .collection_exists(collection_name)
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        if !exists {
            return Ok(());
        }
        self.client
            .delete_collection(collection_name)
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn find_similar(
        &self,
        prefix: Prefix,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> BtsResult<Vec<(String, f32)>> {
        let collection_name = prefix.as_str();
        let mut normalized_query = query.to_vec();
        l2_normalize(&mut normalized_query);

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection_name, normalized_query, limit as u64)
                    .with_payload(true)
                    .score_threshold(threshold),
            )
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|scored| {
                scored
                    .payload
                    .get("conceptId")
                    .and_then(|v| v.as_str().map(str::to_string))
                    .map(|concept_id| (concept_id, scored.score))
            })
            .collect())
    }
}
