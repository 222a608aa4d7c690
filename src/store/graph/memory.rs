//! In-process graph store fallback, modeled on the teacher's
//! `PlexusEngine` (`DashMap`-backed in-memory graph cache). Used by unit
//! tests and single-node deployments with `GRAPH_STORE_DRIVER=memory`.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use super::{group_by_prefix, rank_scored_concepts, AnnotationCounts, GraphStore, SimilarityFilter};
use crate::error::BtsResult;
use crate::model::{
    similarity_property_key, Annotation, Concept, ExpansionResult, InternalGraph,
    RelationshipLabel, ScoredConcept, SimilarTermResult, SimilarityMethod, TranslatedTerm,
};
use crate::model::Prefix;

type ConceptKey = (Prefix, String);

fn normalize_pair(a: ConceptKey, b: ConceptKey) -> (ConceptKey, ConceptKey) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Default)]
pub struct MemoryGraphStore {
    concept_types: DashMap<Prefix, RwLock<HashMap<String, Vec<String>>>>,
    graphs: DashMap<Prefix, RwLock<InternalGraph>>,
    annotations: DashMap<(Prefix, Prefix), RwLock<Vec<Annotation>>>,
    similarity: DashMap<(ConceptKey, ConceptKey), RwLock<HashMap<String, f64>>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Children of `parent_id` under IS_A, i.e. nodes whose IS_A edge
    /// points at `parent_id` — the reverse of the canonical child→parent
    /// storage direction (spec §9 redesign flag).
    fn children_of<'a>(graph: &'a InternalGraph, parent_id: &str) -> Vec<&'a str> {
        graph
            .edges
            .iter()
            .filter(|e| e.label == RelationshipLabel::IsA && e.to_concept_id == parent_id)
            .map(|e| e.from_concept_id.as_str())
            .collect()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn save_vocabulary_graph(&self, concepts: &[Concept], graph: &InternalGraph) -> BtsResult<()> {
        for concept in concepts {
            let shard = self
                .concept_types
                .entry(concept.prefix)
                .or_insert_with(|| RwLock::new(HashMap::new()));
            shard
                .write()
                .unwrap()
                .insert(concept.concept_id.clone(), concept.concept_types.clone());
        }
        if let Some(prefix) = concepts.first().map(|c| c.prefix) {
            let entry = self.graphs.entry(prefix).or_insert_with(|| RwLock::new(InternalGraph::new()));
            entry.write().unwrap().edges.extend(graph.edges.iter().cloned());
        }
        Ok(())
    }

    async fn get_vocabulary_graph(&self, prefix: Prefix) -> BtsResult<InternalGraph> {
        Ok(self
            .graphs
            .get(&prefix)
            .map(|g| g.read().unwrap().clone())
            .unwrap_or_default())
    }

    async fn delete_vocabulary_graph(&self, prefix: Prefix) -> BtsResult<()> {
        self.concept_types.remove(&prefix);
        self.graphs.remove(&prefix);
        Ok(())
    }

    async fn count_terms(&self, prefix: Prefix) -> BtsResult<u64> {
        Ok(self
            .concept_types
            .get(&prefix)
            .map(|s| s.read().unwrap().len() as u64)
            .unwrap_or(0))
    }

    async fn count_internal_relationships(&self, prefix: Prefix) -> BtsResult<u64> {
        Ok(self
            .graphs
            .get(&prefix)
            .map(|g| g.read().unwrap().edges.len() as u64)
            .unwrap_or(0))
    }

    async fn save_annotations(&self, annotations: &[Annotation]) -> BtsResult<AnnotationCounts> {
        let mut saved = 0;
        for annotation in annotations {
            let key = annotation.unordered_pair();
            let entry = self
                .annotations
                .entry(key)
                .or_insert_with(|| RwLock::new(Vec::new()));
            let mut guard = entry.write().unwrap();
            guard.retain(|existing| {
                !(existing.prefix_from == annotation.prefix_from
                    && existing.concept_id_from == annotation.concept_id_from
                    && existing.prefix_to == annotation.prefix_to
                    && existing.concept_id_to == annotation.concept_id_to
                    && existing.annotation_type == annotation.annotation_type)
            });
            guard.push(annotation.clone());
            saved += 1;
        }
        Ok(AnnotationCounts { saved })
    }

    async fn get_annotation_graph(&self, p1: Prefix, p2: Prefix) -> BtsResult<Vec<Annotation>> {
        let key = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
        Ok(self
            .annotations
            .get(&key)
            .map(|a| a.read().unwrap().clone())
            .unwrap_or_default())
    }

    async fn delete_annotations(&self, p1: Prefix, p2: Prefix) -> BtsResult<()> {
        let key = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
        self.annotations.remove(&key);
        Ok(())
    }

    async fn count_annotations(&self, p1: Prefix, p2: Prefix) -> BtsResult<u64> {
        let key = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
        Ok(self
            .annotations
            .get(&key)
            .map(|a| a.read().unwrap().len() as u64)
            .unwrap_or(0))
    }

    async fn save_similarity_scores(
        &self,
        prefix_from: Prefix,
        prefix_to: Prefix,
        scores: Vec<(String, String, f64)>,
        method: SimilarityMethod,
        corpus_prefix: Option<Prefix>,
    ) -> BtsResult<()> {
        let property_key = similarity_property_key(method, corpus_prefix);
        for (from_id, to_id, score) in scores {
            let key = normalize_pair((prefix_from, from_id), (prefix_to, to_id));
            let entry = self
                .similarity
                .entry(key)
                .or_insert_with(|| RwLock::new(HashMap::new()));
            entry.write().unwrap().insert(property_key.clone(), score);
        }
        Ok(())
    }

    async fn count_similarity_relationships(
        &self,
        prefix_from: Prefix,
        prefix_to: Prefix,
        configurations: &[(SimilarityMethod, Option<Prefix>)],
    ) -> BtsResult<u64> {
        let keys: Vec<String> = configurations
            .iter()
            .map(|(m, c)| similarity_property_key(*m, *c))
            .collect();
        let count = self
            .similarity
            .iter()
            .filter(|entry| {
                let ((p1, _), (p2, _)) = entry.key();
                let endpoints_match = (*p1 == prefix_from && *p2 == prefix_to) || (*p1 == prefix_to && *p2 == prefix_from);
                endpoints_match && entry.value().read().unwrap().keys().any(|k| keys.contains(k))
            })
            .count();
        Ok(count as u64)
    }

    async fn expand_terms(
        &self,
        prefix: Prefix,
        concept_ids: &[String],
        max_depth: Option<usize>,
        limit: Option<usize>,
    ) -> BtsResult<Vec<ExpansionResult>> {
        let Some(graph) = self.graphs.get(&prefix) else {
            return Ok(concept_ids
                .iter()
                .map(|id| ExpansionResult {
                    concept_id: id.clone(),
                    descendants: Vec::new(),
                })
                .collect());
        };
        let graph = graph.read().unwrap();

        let mut results = Vec::new();
        for root in concept_ids {
            let mut visited: HashSet<String> = HashSet::new();
            visited.insert(root.clone());
            let mut queue: VecDeque<(String, usize)> = VecDeque::new();
            queue.push_back((root.clone(), 0));
            let mut descendants = Vec::new();

            while let Some((current, depth)) = queue.pop_front() {
                if let Some(max) = max_depth {
                    if depth >= max {
                        continue;
                    }
                }
                for child in MemoryGraphStore::children_of(&graph, &current) {
                    if visited.insert(child.to_string()) {
                        descendants.push(child.to_string());
                        queue.push_back((child.to_string(), depth + 1));
                        if let Some(n) = limit {
                            if descendants.len() >= n {
                                break;
                            }
                        }
                    }
                }
                if let Some(n) = limit {
                    if descendants.len() >= n {
                        break;
                    }
                }
            }
            if let Some(n) = limit {
                descendants.truncate(n);
            }
            results.push(ExpansionResult {
                concept_id: root.clone(),
                descendants,
            });
        }
        Ok(results)
    }

    async fn get_similar_terms(
        &self,
        prefix: Prefix,
        concept_ids: &[String],
        threshold: f64,
        same_prefix: bool,
        filter: SimilarityFilter,
        limit: Option<usize>,
    ) -> BtsResult<Vec<SimilarTermResult>> {
        let mut results = Vec::new();
        for concept_id in concept_ids {
            let source_key = (prefix, concept_id.clone());
            let mut by_prefix: HashMap<Prefix, Vec<ScoredConcept>> = HashMap::new();

            for entry in self.similarity.iter() {
                let (a, b) = entry.key();
                let other = if *a == source_key {
                    Some(b)
                } else if *b == source_key {
                    Some(a)
                } else {
                    None
                };
                let Some((other_prefix, other_id)) = other else { continue };
                if same_prefix && *other_prefix != prefix {
                    continue;
                }

                let props = entry.value().read().unwrap();
                let best = props
                    .iter()
                    .filter(|(key, value)| {
                        **value >= threshold && key_matches(key, filter.method, filter.corpus_prefix)
                    })
                    .map(|(_, v)| *v)
                    .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

                if let Some(score) = best {
                    by_prefix.entry(*other_prefix).or_default().push(ScoredConcept {
                        concept_id: other_id.clone(),
                        score,
                    });
                }
            }

            let groups = by_prefix
                .into_iter()
                .map(|(p, concepts)| (p, rank_scored_concepts(concepts, limit)))
                .collect();
            results.push(SimilarTermResult {
                concept_id: concept_id.clone(),
                groups: group_by_prefix(groups),
            });
        }
        Ok(results)
    }

    async fn translate_terms(
        &self,
        original_ids: &[String],
        original_prefix: Prefix,
        constraint_ids: &HashMap<Prefix, Vec<String>>,
        threshold: f64,
        limit: Option<usize>,
    ) -> BtsResult<Vec<TranslatedTerm>> {
        let mut out = Vec::new();
        for concept_id in original_ids {
            let source_key = (original_prefix, concept_id.clone());
            let mut candidates: Vec<TranslatedTerm> = Vec::new();

            for entry in self.similarity.iter() {
                let (a, b) = entry.key();
                let other = if *a == source_key {
                    Some(b)
                } else if *b == source_key {
                    Some(a)
                } else {
                    None
                };
                let Some((other_prefix, other_id)) = other else { continue };
                let Some(allowed) = constraint_ids.get(other_prefix) else { continue };
                if !allowed.contains(other_id) {
                    continue;
                }

                let props = entry.value().read().unwrap();
                let best = props.values().cloned().fold(None, |acc: Option<f64>, v| {
                    Some(acc.map_or(v, |a| a.max(v)))
                });
                if let Some(score) = best {
                    if score >= threshold {
                        candidates.push(TranslatedTerm {
                            concept_id: other_id.clone(),
                            prefix: *other_prefix,
                            score,
                        });
                    }
                }
            }

            candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            if let Some(n) = limit {
                candidates.truncate(n);
            }
            out.extend(candidates);
        }
        Ok(out)
    }
}

/// Matches a stored similarity property key against an optional method
/// and/or corpus-prefix filter (spec §4.5 `getSimilarTermsIter`).
fn key_matches(key: &str, method: Option<SimilarityMethod>, corpus_prefix: Option<Prefix>) -> bool {
    match (method, corpus_prefix) {
        (None, None) => true,
        (Some(m), None) => key == m.as_str() || key.starts_with(&format!("{}:", m.as_str())),
        (None, Some(c)) => key.ends_with(&format!(":{}", c.as_str())),
        (Some(m), Some(c)) => key == format!("{}:{}", m.as_str(), c.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Concept;

    fn hpo_concept(id: &str) -> Concept {
        Concept::new(Prefix::Hpo, id)
    }

    #[tokio::test]
    async fn expand_terms_returns_direct_children() {
        let store = MemoryGraphStore::new();
        let mut graph = InternalGraph::new();
        graph.add_edge("0000707", "0000118", RelationshipLabel::IsA);
        store
            .save_vocabulary_graph(&[hpo_concept("0000118"), hpo_concept("0000707")], &graph)
            .await
            .unwrap();

        let result = store
            .expand_terms(Prefix::Hpo, &["0000118".to_string()], Some(1), None)
            .await
            .unwrap();
        assert_eq!(result[0].descendants, vec!["0000707".to_string()]);
        assert!(!result[0].descendants.contains(&"0000118".to_string()));
    }

    #[tokio::test]
    async fn expand_terms_is_transitive_without_max_depth() {
        let store = MemoryGraphStore::new();
        let mut graph = InternalGraph::new();
        graph.add_edge("child", "parent", RelationshipLabel::IsA);
        graph.add_edge("grandchild", "child", RelationshipLabel::IsA);
        store
            .save_vocabulary_graph(
                &[hpo_concept("parent"), hpo_concept("child"), hpo_concept("grandchild")],
                &graph,
            )
            .await
            .unwrap();

        let result = store
            .expand_terms(Prefix::Hpo, &["parent".to_string()], None, None)
            .await
            .unwrap();
        let mut descendants = result[0].descendants.clone();
        descendants.sort();
        assert_eq!(descendants, vec!["child".to_string(), "grandchild".to_string()]);
    }

    #[tokio::test]
    async fn save_and_delete_vocabulary_graph_round_trip() {
        let store = MemoryGraphStore::new();
        let mut graph = InternalGraph::new();
        graph.add_edge("a", "b", RelationshipLabel::IsA);
        store
            .save_vocabulary_graph(&[hpo_concept("a"), hpo_concept("b")], &graph)
            .await
            .unwrap();
        assert_eq!(store.count_terms(Prefix::Hpo).await.unwrap(), 2);
        store.delete_vocabulary_graph(Prefix::Hpo).await.unwrap();
        assert_eq!(store.count_terms(Prefix::Hpo).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn similarity_scores_merge_by_method_without_duplication() {
        let store = MemoryGraphStore::new();
        store
            .save_similarity_scores(
                Prefix::Hpo,
                Prefix::Hpo,
                vec![("a".to_string(), "b".to_string(), 0.8)],
                SimilarityMethod::Relevance,
                None,
            )
            .await
            .unwrap();
        store
            .save_similarity_scores(
                Prefix::Hpo,
                Prefix::Hpo,
                vec![("a".to_string(), "b".to_string(), 0.5)],
                SimilarityMethod::CoAnnotation,
                None,
            )
            .await
            .unwrap();

        let results = store
            .get_similar_terms(
                Prefix::Hpo,
                &["a".to_string()],
                0.0,
                true,
                SimilarityFilter::default(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(results[0].groups[0].similar_concepts.len(), 1);
        assert_eq!(results[0].groups[0].similar_concepts[0].score, 0.8);
    }

    #[tokio::test]
    async fn translate_terms_restricts_to_constraint_set() {
        let store = MemoryGraphStore::new();
        store
            .save_similarity_scores(
                Prefix::Ordo,
                Prefix::Hpo,
                vec![
                    ("A".to_string(), "h1".to_string(), 0.9),
                    ("A".to_string(), "h2".to_string(), 0.2),
                ],
                SimilarityMethod::Relevance,
                None,
            )
            .await
            .unwrap();

        let mut constraints = HashMap::new();
        constraints.insert(Prefix::Hpo, vec!["h1".to_string(), "h2".to_string(), "h3".to_string()]);

        let results = store
            .translate_terms(&["A".to_string()], Prefix::Ordo, &constraints, 0.5, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].concept_id, "h1");
    }
}
