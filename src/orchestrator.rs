//! Ingest orchestrator: drives download → parse → index-create → bulk-load
//! → post-load invariants per vocabulary, and the analogous flow per
//! annotation pair and per similarity run (spec §4.7).
//!
//! Per-prefix ingest serialization ("no two ingests for the same prefix may
//! run concurrently", spec §5) is implemented with a `DashMap<Prefix,
//! tokio::sync::Mutex<()>>` lock table, mirroring the teacher's
//! `DashMap`-centric concurrency style in `graph/engine.rs`.

use dashmap::DashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{BtsError, BtsResult};
use crate::loader::annotation::{annotation_loader, AnnotationLoader};
use crate::loader::{vocabulary_loader, VocabularyLoader};
use crate::model::{
    AnnotationStatus, Prefix, SimilarityMethod, SimilarityStatus, VocabularyStage, VocabularyStatus,
};
use crate::similarity;
use crate::store::cache::Cache;
use crate::store::document::DocumentStore;
use crate::store::graph::GraphStore;
use crate::store::vector::{EmbeddingModel, VectorStore};

/// Everything the orchestrator needs to talk to the data plane, bundled so
/// callers (the CLI harness, tests) construct it once.
pub struct IngestOrchestrator {
    pub config: Config,
    pub documents: Arc<dyn DocumentStore>,
    pub graph: Arc<dyn GraphStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub cache: Arc<dyn Cache>,
    http: reqwest::Client,
    /// Serializes ingests for the same prefix (spec §5).
    locks: DashMap<Prefix, Arc<tokio::sync::Mutex<()>>>,
}

impl IngestOrchestrator {
    pub fn new(
        config: Config,
        documents: Arc<dyn DocumentStore>,
        graph: Arc<dyn GraphStore>,
        vectors: Arc<dyn VectorStore>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self {
            config,
            documents,
            graph,
            vectors,
            cache,
            http: reqwest::Client::new(),
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, prefix: Prefix) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.entry(prefix).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))).clone()
    }

    #[tracing::instrument(skip(self), fields(prefix = %prefix))]
    pub async fn download(&self, prefix: Prefix, redownload: bool) -> BtsResult<()> {
        let lock = self.lock_for(prefix);
        let _guard = lock.lock().await;
        let loader = vocabulary_loader(prefix);
        if redownload {
            let meta = loader.metadata();
            for path in &meta.file_paths {
                let full = self.config.data_dir.join(path);
                let _ = tokio::fs::remove_file(full).await;
            }
        }
        loader.download(&self.http, &self.config).await
    }

    /// `load(P, dropExisting)` = optionally `deleteVocabulary(P)` →
    /// `createIndex` → loader.`loadFromFile`.
    #[tracing::instrument(skip(self), fields(prefix = %prefix, drop_existing))]
    pub async fn load(&self, prefix: Prefix, drop_existing: bool) -> BtsResult<usize> {
        let lock = self.lock_for(prefix);
        let _guard = lock.lock().await;

        if drop_existing {
            self.delete_vocabulary_locked(prefix).await?;
        }

        self.documents.create_index(prefix, "nGrams", false, true).await?;
        self.documents.create_index(prefix, "conceptId", true, true).await?;

        let loader = vocabulary_loader(prefix);
        let parsed = loader.parse(&self.config.data_dir)?;

        if !parsed.graph.is_a_subgraph_is_acyclic() {
            return Err(BtsError::ValidationError(format!(
                "IS_A subgraph of {} contains a cycle",
                prefix
            )));
        }

        let outcome = self.documents.save_terms(prefix, parsed.concepts.clone()).await?;
        self.graph.save_vocabulary_graph(&parsed.concepts, &parsed.graph).await?;

        if !parsed.cross_annotations.is_empty() {
            self.graph.save_annotations(&parsed.cross_annotations).await?;
        }

        self.cache.invalidate_vocabulary(prefix).await?;

        Ok(outcome.saved)
    }

    /// `embed(P)` = iterate documents → vector insert → `updateVectorMapping`.
    #[tracing::instrument(skip(self, model), fields(prefix = %prefix))]
    pub async fn embed(&self, prefix: Prefix, model: &dyn EmbeddingModel) -> BtsResult<usize> {
        let lock = self.lock_for(prefix);
        let _guard = lock.lock().await;

        let concepts = self.documents.get_terms(prefix, None).await?;
        if concepts.is_empty() {
            return Ok(0);
        }
        let mapping = self
            .vectors
            .insert_concepts(prefix, &concepts, model, self.config.embedding_batch_size)
            .await?;
        let count = mapping.len();
        self.documents
            .update_vector_mapping(prefix, mapping.into_iter().collect())
            .await?;
        self.cache.invalidate_vocabulary(prefix).await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(prefix = %prefix))]
    pub async fn delete_vocabulary(&self, prefix: Prefix) -> BtsResult<()> {
        let lock = self.lock_for(prefix);
        let _guard = lock.lock().await;
        self.delete_vocabulary_locked(prefix).await
    }

    async fn delete_vocabulary_locked(&self, prefix: Prefix) -> BtsResult<()> {
        self.documents.delete_all_for_prefix(prefix).await?;
        self.graph.delete_vocabulary_graph(prefix).await?;
        self.vectors.delete_vectors_for_prefix(prefix).await?;
        self.cache.invalidate_vocabulary(prefix).await?;
        Ok(())
    }

    /// `status()` returns the `Absent → Downloaded → Loaded → Embedded`
    /// stage plus concept/relationship counts (spec §4.7).
    #[tracing::instrument(skip(self), fields(prefix = %prefix))]
    pub async fn vocabulary_status(&self, prefix: Prefix) -> BtsResult<VocabularyStatus> {
        if let Some(cached) = self.cache.get_vocabulary_status(prefix).await? {
            return Ok(cached);
        }

        let concept_count = self.graph.count_terms(prefix).await?;
        let loader = vocabulary_loader(prefix);
        let meta = loader.metadata();
        let downloaded = crate::download::all_files_exist(
            &self.config.data_dir,
            &meta.file_paths.iter().map(String::as_str).collect::<Vec<_>>(),
        );

        let stage = if concept_count > 0 {
            let embedded = self
                .documents
                .get_terms(prefix, Some(1))
                .await?
                .iter()
                .any(|c| c.vector_id.is_some());
            if embedded {
                VocabularyStage::Embedded
            } else {
                VocabularyStage::Loaded
            }
        } else if downloaded {
            VocabularyStage::Downloaded
        } else {
            VocabularyStage::Absent
        };

        let status = VocabularyStatus {
            prefix,
            stage,
            downloaded_at: None,
            loaded_at: None,
            embedded_at: None,
            concept_count: Some(concept_count),
        };
        self.cache
            .save_vocabulary_status(&status, crate::store::cache::STATUS_TTL_SECS)
            .await?;
        Ok(status)
    }

    // --- annotations ---

    fn require_annotation_loader(&self, pair: (Prefix, Prefix)) -> BtsResult<Box<dyn AnnotationLoader>> {
        annotation_loader(pair)
            .ok_or_else(|| BtsError::ValidationError(format!("no annotation loader registered for {:?}", pair)))
    }

    /// Pre-condition: both source vocabularies must already have terms in
    /// the graph store, else `VocabularyNotLoaded` (spec §4.2).
    async fn assert_vocabularies_loaded(&self, p1: Prefix, p2: Prefix) -> BtsResult<()> {
        let count1 = self.graph.count_terms(p1).await?;
        if count1 == 0 {
            return Err(BtsError::VocabularyNotLoaded(p1.to_string()));
        }
        let count2 = self.graph.count_terms(p2).await?;
        if count2 == 0 {
            return Err(BtsError::VocabularyNotLoaded(p2.to_string()));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(p1 = %pair.0, p2 = %pair.1))]
    pub async fn download_annotation(&self, pair: (Prefix, Prefix), redownload: bool) -> BtsResult<()> {
        let loader = self.require_annotation_loader(pair)?;
        if redownload {
            let meta = loader.metadata();
            for path in &meta.file_paths {
                let full = self.config.data_dir.join(path);
                let _ = tokio::fs::remove_file(full).await;
            }
        }
        loader.download(&self.http, &self.config).await
    }

    /// `load(overwrite)`: idempotent unless `overwrite` — if the pair
    /// already has annotations and `overwrite` is false, returns
    /// immediately; otherwise deletes then inserts afresh (spec §4.2).
    #[tracing::instrument(skip(self), fields(p1 = %pair.0, p2 = %pair.1, overwrite))]
    pub async fn load_annotation(&self, pair: (Prefix, Prefix), overwrite: bool) -> BtsResult<usize> {
        let (p1, p2) = crate::model::annotation::unordered_pair(pair.0, pair.1);
        self.assert_vocabularies_loaded(p1, p2).await?;

        let existing = self.graph.count_annotations(p1, p2).await?;
        if existing > 0 && !overwrite {
            return Ok(existing as usize);
        }

        let loader = self.require_annotation_loader((p1, p2))?;
        if existing > 0 {
            self.graph.delete_annotations(p1, p2).await?;
        }

        let annotations = loader.parse(&self.config.data_dir)?;
        let outcome = self.graph.save_annotations(&annotations).await?;
        self.cache.invalidate_annotation(p1, p2).await?;
        Ok(outcome.saved)
    }

    #[tracing::instrument(skip(self), fields(p1 = %pair.0, p2 = %pair.1))]
    pub async fn delete_annotation(&self, pair: (Prefix, Prefix)) -> BtsResult<()> {
        let (p1, p2) = crate::model::annotation::unordered_pair(pair.0, pair.1);
        self.graph.delete_annotations(p1, p2).await?;
        self.cache.invalidate_annotation(p1, p2).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(p1 = %pair.0, p2 = %pair.1))]
    pub async fn annotation_status(&self, pair: (Prefix, Prefix)) -> BtsResult<AnnotationStatus> {
        let (p1, p2) = crate::model::annotation::unordered_pair(pair.0, pair.1);
        if let Some(cached) = self.cache.get_annotation_status(p1, p2).await? {
            return Ok(cached);
        }
        let count = self.graph.count_annotations(p1, p2).await?;
        let status = AnnotationStatus {
            prefix_a: p1,
            prefix_b: p2,
            loaded: count > 0,
            loaded_at: None,
            annotation_count: Some(count),
        };
        self.cache.save_annotation_status(&status).await?;
        Ok(status)
    }

    // --- similarity ---

    /// `calculate(method, targetPrefix, corpusPrefix?, threshold?)` (spec
    /// §4.7, §4.8).
    #[tracing::instrument(skip(self), fields(prefix = %target_prefix, method = ?method))]
    pub async fn calculate_similarity(
        &self,
        method: SimilarityMethod,
        target_prefix: Prefix,
        corpus_prefix: Option<Prefix>,
        threshold: Option<f64>,
    ) -> BtsResult<usize> {
        let count = self.graph.count_terms(target_prefix).await?;
        if count == 0 {
            return Err(BtsError::VocabularyNotLoaded(target_prefix.to_string()));
        }

        let edges = similarity::calculate_similarity(
            self.graph.as_ref(),
            method,
            target_prefix,
            corpus_prefix,
            threshold.unwrap_or(0.0),
            self.config.process_limit,
        )
        .await?;

        let status = SimilarityStatus {
            prefix: target_prefix,
            method,
            corpus_prefix,
            completed: true,
            completed_at: None,
            edge_count: Some(edges as u64),
        };
        self.cache.save_similarity_status(&status).await?;
        Ok(edges)
    }

    #[tracing::instrument(skip(self), fields(prefix = %prefix))]
    pub async fn similarity_status(
        &self,
        prefix: Prefix,
        method: SimilarityMethod,
        corpus_prefix: Option<Prefix>,
    ) -> BtsResult<SimilarityStatus> {
        if let Some(cached) = self.cache.get_similarity_status(prefix).await? {
            if cached.method == method && cached.corpus_prefix == corpus_prefix {
                return Ok(cached);
            }
        }
        let configurations = [(method, corpus_prefix)];
        let edge_count = self
            .graph
            .count_similarity_relationships(prefix, prefix, &configurations)
            .await?;
        Ok(SimilarityStatus {
            prefix,
            method,
            corpus_prefix,
            completed: edge_count > 0,
            completed_at: None,
            edge_count: Some(edge_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheDriver, DocStoreDriver, GraphStoreDriver, VectorStoreDriver};
    use crate::store::cache::MemoryCache;
    use crate::store::document::MemoryDocumentStore;
    use crate::store::graph::MemoryGraphStore;
    use crate::store::vector::MemoryVectorStore;

    fn test_config() -> Config {
        let dir = tempfile::tempdir().unwrap();
        Config {
            process_limit: 2,
            auto_complete_min_length: 3,
            data_dir: dir.into_path(),
            doc_store_driver: DocStoreDriver::Sqlite,
            mongo_uri: None,
            mongo_db_name: "bioterms".into(),
            sqlite_db_path: "./test.sqlite3".into(),
            graph_store_driver: GraphStoreDriver::Memory,
            neo4j_uri: None,
            neo4j_username: None,
            neo4j_password: None,
            neo4j_db_name: "neo4j".into(),
            vector_store_driver: VectorStoreDriver::Memory,
            qdrant_uri: None,
            embedding_model_name: "fake".into(),
            embedding_batch_size: 8,
            embedding_dimensions: 8,
            torch_device: "cpu".into(),
            cache_driver: CacheDriver::Memory,
            redis_host: "localhost".into(),
            redis_port: 6379,
            redis_db: 0,
            nhs_trud_api_key: None,
            bioportal_api_key: None,
            nih_umls_api_key: None,
            verbose_print: false,
            disable_progress_bar: true,
        }
    }

    fn test_orchestrator() -> IngestOrchestrator {
        IngestOrchestrator::new(
            test_config(),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryGraphStore::new()),
            Arc::new(MemoryVectorStore::new()),
            Arc::new(MemoryCache::new()),
        )
    }

    #[tokio::test]
    async fn loading_annotation_before_vocabularies_fails() {
        let orch = test_orchestrator();
        let result = orch
            .load_annotation((Prefix::Hpo, Prefix::HgncSymbol), false)
            .await;
        assert!(matches!(result, Err(BtsError::VocabularyNotLoaded(_))));
    }

    #[tokio::test]
    async fn deleting_an_unloaded_vocabulary_is_a_no_op() {
        let orch = test_orchestrator();
        assert!(orch.delete_vocabulary(Prefix::Hpo).await.is_ok());
    }

    #[tokio::test]
    async fn vocabulary_status_starts_absent() {
        let orch = test_orchestrator();
        let status = orch.vocabulary_status(Prefix::Hpo).await.unwrap();
        assert_eq!(status.stage, VocabularyStage::Absent);
        assert_eq!(status.concept_count, Some(0));
    }

    #[tokio::test]
    async fn calculating_similarity_for_empty_vocabulary_fails() {
        let orch = test_orchestrator();
        let result = orch
            .calculate_similarity(SimilarityMethod::Relevance, Prefix::Hpo, None, None)
            .await;
        assert!(matches!(result, Err(BtsError::VocabularyNotLoaded(_))));
    }
}
