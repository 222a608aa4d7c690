//! Query surface: auto-complete, descendant expansion, similar-term
//! search, and translation (spec §4.3, §6). The HTTP/GraphQL transport is
//! out of scope (spec §1); this module is the plain async Rust API a
//! collaborator transport would wrap, returning records in the same field
//! shapes spec §6 describes for each versioned endpoint. Results are
//! already in source-iterator order (spec §5 "streaming endpoints
//! preserve source iterator order") — a transport turns the returned
//! `Vec` into a JSON array or newline-delimited body as it sees fit.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::BtsResult;
use crate::model::{Concept, ExpansionResult, Prefix, SimilarTermResult, SimilarityMethod, TranslatedTerm};
use crate::store::document::DocumentStore;
use crate::store::graph::{GraphStore, SimilarityFilter};

/// An advisory, non-error response for a too-short auto-complete query
/// (spec §6 "auto-complete v1 ... never returns HTTP 400").
pub const QUERY_TOO_SHORT_MESSAGE: &str = "query must be at least the configured minimum length";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AutoCompleteV1Response {
    Results(Vec<String>),
    Advisory(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoCompleteV2Item {
    pub term_id: String,
    pub label: Option<String>,
    pub definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandV1Item {
    pub term_id: String,
    pub children: Vec<String>,
    pub depth: Option<usize>,
}

/// Spec §9 open question: the v1 response mixes a similarity cutoff and a
/// result-count cap under the same field name in the original; here they
/// are two distinct, separately named fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityV1Item {
    pub term_id: String,
    pub similar_ids: Vec<String>,
    pub similarity_threshold: f64,
    pub result_limit_threshold: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateV1Item {
    pub term_id: String,
    pub score: f64,
}

pub struct QuerySurface {
    documents: Arc<dyn DocumentStore>,
    graph: Arc<dyn GraphStore>,
    min_query_length: usize,
}

impl QuerySurface {
    pub fn new(documents: Arc<dyn DocumentStore>, graph: Arc<dyn GraphStore>, min_query_length: usize) -> Self {
        Self {
            documents,
            graph,
            min_query_length,
        }
    }

    // --- auto-complete ---

    /// Auto-complete v1: legacy string-list output, never 400 (spec §6).
    pub async fn auto_complete_v1(&self, prefix: Prefix, query: &str, limit: usize) -> BtsResult<AutoCompleteV1Response> {
        if query.len() < self.min_query_length {
            return Ok(AutoCompleteV1Response::Advisory(QUERY_TOO_SHORT_MESSAGE.to_string()));
        }
        let concepts = self.documents.auto_complete(prefix, query, limit).await?;
        Ok(AutoCompleteV1Response::Results(
            concepts.into_iter().map(|c| c.concept_id).collect(),
        ))
    }

    /// Auto-complete v2: structured `{termId, label, definition?}` list.
    pub async fn auto_complete_v2(&self, prefix: Prefix, query: &str, limit: usize) -> BtsResult<Vec<AutoCompleteV2Item>> {
        if query.len() < self.min_query_length {
            return Ok(Vec::new());
        }
        let concepts = self.documents.auto_complete(prefix, query, limit).await?;
        Ok(concepts
            .into_iter()
            .map(|c| AutoCompleteV2Item {
                term_id: c.concept_id,
                label: c.label,
                definition: c.definition,
            })
            .collect())
    }

    /// Auto-complete v3: full Concept records, in ranked order.
    pub async fn auto_complete_v3(&self, prefix: Prefix, query: &str, limit: usize) -> BtsResult<Vec<Concept>> {
        if query.len() < self.min_query_length {
            return Ok(Vec::new());
        }
        self.documents.auto_complete(prefix, query, limit).await
    }

    // --- expansion ---

    /// Expand v1 (legacy): `{termId, children[], depth}` per root, `depth`
    /// always `Some(max_depth)` (the legacy shape carries the requested
    /// depth back, not a per-descendant level).
    pub async fn expand_v1(
        &self,
        prefix: Prefix,
        term_ids: &[String],
        depth: Option<usize>,
        limit: Option<usize>,
    ) -> BtsResult<Vec<ExpandV1Item>> {
        let results = self.graph.expand_terms(prefix, term_ids, depth, limit).await?;
        Ok(results
            .into_iter()
            .map(|r| ExpandV1Item {
                term_id: r.concept_id,
                children: r.descendants,
                depth,
            })
            .collect())
    }

    /// Expand v2: `{conceptId, descendants[]}` per root.
    pub async fn expand_v2(
        &self,
        prefix: Prefix,
        concept_ids: &[String],
        max_depth: Option<usize>,
        limit: Option<usize>,
    ) -> BtsResult<Vec<ExpansionResult>> {
        self.graph.expand_terms(prefix, concept_ids, max_depth, limit).await
    }

    // --- similarity ---

    /// Similarity v1: `{termIds, threshold}` in, `{termId, similarIds[],
    /// similarityThreshold, threshold?}` out (spec §6, §9 open question).
    pub async fn similarity_v1(
        &self,
        prefix: Prefix,
        term_ids: &[String],
        threshold: f64,
        same_prefix: bool,
        limit: Option<usize>,
    ) -> BtsResult<Vec<SimilarityV1Item>> {
        let results = self
            .graph
            .get_similar_terms(prefix, term_ids, threshold, same_prefix, SimilarityFilter::default(), limit)
            .await?;
        Ok(results
            .into_iter()
            .map(|r| {
                let similar_ids: Vec<String> = r
                    .groups
                    .into_iter()
                    .flat_map(|g| g.similar_concepts.into_iter().map(|sc| sc.concept_id))
                    .collect();
                SimilarityV1Item {
                    term_id: r.concept_id,
                    similar_ids,
                    similarity_threshold: threshold,
                    result_limit_threshold: limit,
                }
            })
            .collect())
    }

    /// Similarity v2: structured `SimilarTermResult` records, grouped by
    /// target prefix.
    pub async fn similarity_v2(
        &self,
        prefix: Prefix,
        concept_ids: &[String],
        threshold: f64,
        same_prefix: bool,
        method: Option<SimilarityMethod>,
        corpus_prefix: Option<Prefix>,
        limit: Option<usize>,
    ) -> BtsResult<Vec<SimilarTermResult>> {
        let filter = SimilarityFilter { method, corpus_prefix };
        self.graph
            .get_similar_terms(prefix, concept_ids, threshold, same_prefix, filter, limit)
            .await
    }

    // --- translation ---

    /// Translate v1/v2: `{termId, prefix, score}` per translated concept
    /// (the v1/v2 distinction is transport-level — GET vs POST, and
    /// `prefix:id` vs JSON constraint encoding — both resolve to the same
    /// query here).
    pub async fn translate(
        &self,
        original_ids: &[String],
        original_prefix: Prefix,
        constraint_ids: &HashMap<Prefix, Vec<String>>,
        threshold: f64,
        limit: Option<usize>,
    ) -> BtsResult<Vec<TranslatedTerm>> {
        self.graph
            .translate_terms(original_ids, original_prefix, constraint_ids, threshold, limit)
            .await
    }

    /// Translate v1's flattened `{termId, score}` shape, one row per
    /// translated concept (drops the target prefix, which v1 callers
    /// already know from their constraint set).
    pub async fn translate_v1(
        &self,
        original_ids: &[String],
        original_prefix: Prefix,
        constraint_ids: &HashMap<Prefix, Vec<String>>,
        threshold: f64,
        limit: Option<usize>,
    ) -> BtsResult<Vec<TranslateV1Item>> {
        let results = self
            .translate(original_ids, original_prefix, constraint_ids, threshold, limit)
            .await?;
        Ok(results
            .into_iter()
            .map(|t| TranslateV1Item {
                term_id: t.concept_id,
                score: t.score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Concept, ConceptStatus, InternalGraph, RelationshipLabel};
    use crate::store::document::MemoryDocumentStore;
    use crate::store::graph::MemoryGraphStore;

    async fn seeded_surface() -> QuerySurface {
        let documents = Arc::new(MemoryDocumentStore::new());
        let graph = Arc::new(MemoryGraphStore::new());

        let mut seizure = Concept::new(Prefix::Hpo, "0001250");
        seizure.label = Some("Seizure".to_string());
        seizure.status = ConceptStatus::Active;
        let mut febrile = Concept::new(Prefix::Hpo, "0002373");
        febrile.label = Some("Febrile seizure".to_string());

        documents
            .save_terms(Prefix::Hpo, vec![seizure.clone(), febrile.clone()])
            .await
            .unwrap();

        let mut internal = InternalGraph::new();
        internal.add_edge("0002373", "0001250", RelationshipLabel::IsA);
        graph.save_vocabulary_graph(&[seizure, febrile], &internal).await.unwrap();

        QuerySurface::new(documents, graph, 3)
    }

    #[tokio::test]
    async fn auto_complete_v1_is_advisory_for_short_queries() {
        let surface = seeded_surface().await;
        let response = surface.auto_complete_v1(Prefix::Hpo, "se", 5).await.unwrap();
        assert!(matches!(response, AutoCompleteV1Response::Advisory(_)));
    }

    #[tokio::test]
    async fn auto_complete_v1_returns_exact_match_first() {
        let surface = seeded_surface().await;
        let response = surface.auto_complete_v1(Prefix::Hpo, "seizure", 5).await.unwrap();
        match response {
            AutoCompleteV1Response::Results(ids) => assert_eq!(ids.first().map(String::as_str), Some("0001250")),
            _ => panic!("expected results"),
        }
    }

    #[tokio::test]
    async fn auto_complete_v2_carries_label() {
        let surface = seeded_surface().await;
        let items = surface.auto_complete_v2(Prefix::Hpo, "seizure", 5).await.unwrap();
        assert!(items.iter().any(|i| i.label.as_deref() == Some("Seizure")));
    }

    #[tokio::test]
    async fn expand_v1_returns_direct_child() {
        let surface = seeded_surface().await;
        let items = surface
            .expand_v1(Prefix::Hpo, &["0001250".to_string()], Some(1), None)
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].children.contains(&"0002373".to_string()));
        assert_eq!(items[0].depth, Some(1));
    }

    #[tokio::test]
    async fn expand_v2_matches_v1_descendants() {
        let surface = seeded_surface().await;
        let items = surface
            .expand_v2(Prefix::Hpo, &["0001250".to_string()], None, None)
            .await
            .unwrap();
        assert_eq!(items[0].descendants, vec!["0002373".to_string()]);
    }
}
