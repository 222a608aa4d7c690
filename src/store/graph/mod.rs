//! Graph store: the labeled property graph of concept nodes, internal
//! relationships, cross-vocabulary annotations, and similarity edges
//! (spec §4.5).

mod memory;
#[cfg(feature = "neo4j")]
mod neo4j;

pub use memory::MemoryGraphStore;
#[cfg(feature = "neo4j")]
pub use neo4j::Neo4jGraphStore;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::BtsResult;
use crate::model::{
    Annotation, Concept, ExpansionResult, InternalGraph, Prefix, ScoredConcept,
    SimilarConceptGroup, SimilarTermResult, SimilarityMethod, TranslatedTerm,
};

#[derive(Debug, Clone, Default)]
pub struct AnnotationCounts {
    pub saved: usize,
}

/// Filter applied by `get_similar_terms` (spec §4.5 `getSimilarTermsIter`).
#[derive(Debug, Clone, Default)]
pub struct SimilarityFilter {
    pub method: Option<SimilarityMethod>,
    pub corpus_prefix: Option<Prefix>,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Idempotent upsert of nodes (secondary labels from `conceptTypes`)
    /// followed by upsert of edges (default label `related_to`). Retries
    /// transient failures per [`crate::error::retry_transient`].
    async fn save_vocabulary_graph(&self, concepts: &[Concept], graph: &InternalGraph) -> BtsResult<()>;

    async fn get_vocabulary_graph(&self, prefix: Prefix) -> BtsResult<InternalGraph>;

    async fn delete_vocabulary_graph(&self, prefix: Prefix) -> BtsResult<()>;

    async fn count_terms(&self, prefix: Prefix) -> BtsResult<u64>;

    async fn count_internal_relationships(&self, prefix: Prefix) -> BtsResult<u64>;

    /// Merges edges by `(source, target, type)`, replacing properties.
    async fn save_annotations(&self, annotations: &[Annotation]) -> BtsResult<AnnotationCounts>;

    async fn get_annotation_graph(&self, p1: Prefix, p2: Prefix) -> BtsResult<Vec<Annotation>>;

    async fn delete_annotations(&self, p1: Prefix, p2: Prefix) -> BtsResult<()>;

    async fn count_annotations(&self, p1: Prefix, p2: Prefix) -> BtsResult<u64>;

    /// Writes/merges a `similar_to` edge per pair, setting property key
    /// `method` or `method:corpusPrefix` to the score. Batched (1000).
    async fn save_similarity_scores(
        &self,
        prefix_from: Prefix,
        prefix_to: Prefix,
        scores: Vec<(String, String, f64)>,
        method: SimilarityMethod,
        corpus_prefix: Option<Prefix>,
    ) -> BtsResult<()>;

    async fn count_similarity_relationships(
        &self,
        prefix_from: Prefix,
        prefix_to: Prefix,
        configurations: &[(SimilarityMethod, Option<Prefix>)],
    ) -> BtsResult<u64>;

    /// Descendants following IS_A child→parent edges in reverse. BFS with
    /// global node-uniqueness per root; truncates each root's result to
    /// `limit`. `max_depth = None` returns the full transitive set.
    async fn expand_terms(
        &self,
        prefix: Prefix,
        concept_ids: &[String],
        max_depth: Option<usize>,
        limit: Option<usize>,
    ) -> BtsResult<Vec<ExpansionResult>>;

    async fn get_similar_terms(
        &self,
        prefix: Prefix,
        concept_ids: &[String],
        threshold: f64,
        same_prefix: bool,
        filter: SimilarityFilter,
        limit: Option<usize>,
    ) -> BtsResult<Vec<SimilarTermResult>>;

    async fn translate_terms(
        &self,
        original_ids: &[String],
        original_prefix: Prefix,
        constraint_ids: &HashMap<Prefix, Vec<String>>,
        threshold: f64,
        limit: Option<usize>,
    ) -> BtsResult<Vec<TranslatedTerm>>;
}

/// Shared helper: order a `ScoredConcept` vector by score descending and
/// truncate, used by every `GraphStore` implementation's
/// `get_similar_terms`.
pub(crate) fn rank_scored_concepts(mut concepts: Vec<ScoredConcept>, limit: Option<usize>) -> Vec<ScoredConcept> {
    concepts.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    if let Some(n) = limit {
        concepts.truncate(n);
    }
    concepts
}

pub(crate) fn group_by_prefix(groups: HashMap<Prefix, Vec<ScoredConcept>>) -> Vec<SimilarConceptGroup> {
    groups
        .into_iter()
        .map(|(prefix, similar_concepts)| SimilarConceptGroup {
            prefix,
            similar_concepts,
        })
        .collect()
}
