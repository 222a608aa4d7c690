//! Similarity engine: Relevance (information-content) and Co-annotation
//! vector similarity over an ontology DAG (spec §4.8).
//!
//! Both methods share one skeleton — fetch the target graph and the
//! annotation graph, compute per-node `annotationCount` in topological
//! order over the IS_A ∪ PART_OF subgraph, enumerate pairs in a `rayon`
//! pool, and flush scored tuples to the graph store in bounded batches.
//! The pool fan-out mirrors the teacher's `analysis/analyzers` worker
//! split, adapted from `ProcessPoolExecutor` to `rayon::ThreadPool` per
//! SPEC_FULL §9 (no GIL, no pickling — an `Arc<PreparedGraph>` is shared
//! read-only across workers instead).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::BtsResult;
use crate::model::{Annotation, InternalGraph, Prefix, RelationshipLabel, SimilarityMethod, SimilarityTuple};
use crate::store::graph::GraphStore;

/// Similarity tuples are buffered and flushed in batches of this size
/// (spec §4.8 "bounded buffer (10,000)").
pub const FLUSH_BATCH_SIZE: usize = 10_000;

/// The restricted DAG (IS_A ∪ PART_OF) plus its per-node annotation counts,
/// shared read-only across the worker pool for one similarity run.
struct PreparedGraph {
    /// child_id -> parent_ids, restricted to IS_A ∪ PART_OF.
    parents: HashMap<String, Vec<String>>,
    /// parent_id -> child_ids (the reverse index, built once).
    children: HashMap<String, Vec<String>>,
    all_nodes: Vec<String>,
    annotation_count: HashMap<String, u64>,
    max_annotation_count: u64,
    /// node -> its own (non-inherited) annotated concept ids, used by
    /// co-annotation similarity.
    own_annotations: HashMap<String, HashSet<String>>,
}

fn restrict_to_is_a_part_of(graph: &InternalGraph) -> (HashMap<String, Vec<String>>, HashMap<String, Vec<String>>, Vec<String>) {
    let mut parents: HashMap<String, Vec<String>> = HashMap::new();
    let mut children: HashMap<String, Vec<String>> = HashMap::new();
    let mut nodes: HashSet<String> = HashSet::new();

    for edge in graph
        .edges
        .iter()
        .filter(|e| matches!(e.label, RelationshipLabel::IsA | RelationshipLabel::PartOf))
    {
        parents
            .entry(edge.from_concept_id.clone())
            .or_default()
            .push(edge.to_concept_id.clone());
        children
            .entry(edge.to_concept_id.clone())
            .or_default()
            .push(edge.from_concept_id.clone());
        nodes.insert(edge.from_concept_id.clone());
        nodes.insert(edge.to_concept_id.clone());
    }

    (parents, children, nodes.into_iter().collect())
}

/// Topological order (leaves first) over `children`/`parents`, via
/// Kahn's algorithm keyed on in-degree within the `parents` map (a node's
/// in-degree here is its number of children, since we process leaves
/// before their ancestors).
fn topological_order(nodes: &[String], parents: &HashMap<String, Vec<String>>, children: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut remaining_children: HashMap<&str, usize> = nodes
        .iter()
        .map(|n| (n.as_str(), children.get(n).map(|c| c.len()).unwrap_or(0)))
        .collect();

    let mut queue: std::collections::VecDeque<String> = nodes
        .iter()
        .filter(|n| remaining_children[n.as_str()] == 0)
        .cloned()
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    let mut visited: HashSet<String> = HashSet::new();

    while let Some(node) = queue.pop_front() {
        if !visited.insert(node.clone()) {
            continue;
        }
        order.push(node.clone());
        if let Some(ps) = parents.get(&node) {
            for parent in ps {
                if let Some(count) = remaining_children.get_mut(parent.as_str()) {
                    if *count > 0 {
                        *count -= 1;
                    }
                    if *count == 0 && !visited.contains(parent) {
                        queue.push_back(parent.clone());
                    }
                }
            }
        }
    }

    // Any node not reached (disconnected from a cycle, which IS_A acyclicity
    // rules out, but PART_OF alone is not asserted acyclic) is appended in
    // its original order so every node still gets an annotationCount.
    for node in nodes {
        if !visited.contains(node) {
            order.push(node.clone());
        }
    }
    order
}

fn direct_annotation_counts(annotations: &[Annotation], prefix: Prefix) -> HashMap<String, HashSet<String>> {
    let mut out: HashMap<String, HashSet<String>> = HashMap::new();
    for a in annotations {
        if a.prefix_from == prefix {
            out.entry(a.concept_id_from.clone())
                .or_default()
                .insert(format!("{}:{}", a.prefix_to.as_str(), a.concept_id_to));
        }
        if a.prefix_to == prefix {
            out.entry(a.concept_id_to.clone())
                .or_default()
                .insert(format!("{}:{}", a.prefix_from.as_str(), a.concept_id_from));
        }
    }
    out
}

/// The number of *distinct* corpus-side annotated concepts touching `prefix`
/// (the original's `sum(1 for node in annotation_graph.nodes if
/// node.startswith(f'{corpus_prefix}:'))`), not the raw edge count — a
/// single corpus concept annotating several `prefix` concepts must still
/// only contribute 1 to `N`.
fn distinct_corpus_annotation_count(annotations: &[Annotation], prefix: Prefix) -> u64 {
    let mut corpus_nodes: HashSet<String> = HashSet::new();
    for a in annotations {
        if a.prefix_from == prefix {
            corpus_nodes.insert(format!("{}:{}", a.prefix_to.as_str(), a.concept_id_to));
        }
        if a.prefix_to == prefix {
            corpus_nodes.insert(format!("{}:{}", a.prefix_from.as_str(), a.concept_id_from));
        }
    }
    corpus_nodes.len() as u64
}

fn prepare_graph(graph: &InternalGraph, annotations: &[Annotation], prefix: Prefix) -> PreparedGraph {
    let (parents, children, all_nodes) = restrict_to_is_a_part_of(graph);
    let order = topological_order(&all_nodes, &parents, &children);
    let direct = direct_annotation_counts(annotations, prefix);

    // annotationCount(n) = direct annotation degree + sum of children's counts.
    // own_annotations(n) = union of direct annotations of n and all descendants
    // (processed leaves-first, so children are already finalized).
    let mut annotation_count: HashMap<String, u64> = HashMap::new();
    let mut own_annotations: HashMap<String, HashSet<String>> = HashMap::new();

    for node in &order {
        let mut set = direct.get(node).cloned().unwrap_or_default();
        let mut count = set.len() as u64;
        if let Some(kids) = children.get(node) {
            for kid in kids {
                count += *annotation_count.get(kid).unwrap_or(&0);
                if let Some(kid_set) = own_annotations.get(kid) {
                    set.extend(kid_set.iter().cloned());
                }
            }
        }
        annotation_count.insert(node.clone(), count);
        own_annotations.insert(node.clone(), set);
    }

    let max_annotation_count = annotation_count.values().copied().max().unwrap_or(0);

    PreparedGraph {
        parents,
        children,
        all_nodes,
        annotation_count,
        max_annotation_count,
        own_annotations,
    }
}

/// Reflexive: a node is its own ancestor candidate (the original's
/// `descendants(graph, node) | {node}`), so a direct child/parent pair (or a
/// node compared against itself in a larger pair set) still has a common
/// ancestor to take the MICA over.
fn ancestors_of(node: &str, parents: &HashMap<String, Vec<String>>) -> HashSet<String> {
    let mut seen = HashSet::new();
    seen.insert(node.to_string());
    let mut stack = vec![node.to_string()];
    while let Some(n) = stack.pop() {
        if let Some(ps) = parents.get(&n) {
            for p in ps {
                if seen.insert(p.clone()) {
                    stack.push(p.clone());
                }
            }
        }
    }
    seen
}

fn information_content(count: u64, max_count: u64) -> Option<f64> {
    if count == 0 || max_count == 0 {
        return None;
    }
    Some(-((count as f64 / max_count as f64).ln()))
}

/// Relevance similarity for one pair, against a shared `PreparedGraph`.
/// `None` when `a`/`b` share no common ancestor or either has
/// `annotationCount == 0`.
fn relevance_pair(prepared: &PreparedGraph, a: &str, b: &str) -> Option<f64> {
    if a == b {
        return None;
    }
    let count_a = *prepared.annotation_count.get(a)?;
    let count_b = *prepared.annotation_count.get(b)?;
    let ic_a = information_content(count_a, prepared.max_annotation_count)?;
    let ic_b = information_content(count_b, prepared.max_annotation_count)?;

    let mut common: Vec<String> = {
        let ancestors_a = ancestors_of(a, &prepared.parents);
        let mut ancestors_b = ancestors_of(b, &prepared.parents);
        ancestors_b.retain(|n| ancestors_a.contains(n));
        ancestors_b.into_iter().collect()
    };
    if common.is_empty() {
        return None;
    }
    common.sort();

    let mica = common
        .into_iter()
        .filter_map(|node| {
            let count = *prepared.annotation_count.get(&node)?;
            let ic = information_content(count, prepared.max_annotation_count)?;
            Some((node, ic, count))
        })
        .max_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(std::cmp::Ordering::Equal))?;

    let (_, ic_mica, count_mica) = mica;
    let score = (2.0 * ic_mica / (ic_a + ic_b)) * (1.0 - count_mica as f64 / prepared.max_annotation_count as f64);
    Some(score.clamp(0.0, 1.0))
}

/// Co-annotation vector similarity for one pair.
fn co_annotation_pair(prepared: &PreparedGraph, a: &str, b: &str, total_annotation_count: u64) -> Option<f64> {
    if a == b {
        return None;
    }
    let set_a = prepared.own_annotations.get(a)?;
    let set_b = prepared.own_annotations.get(b)?;
    if set_a.is_empty() || set_b.is_empty() {
        return None;
    }

    let intersection = set_a.intersection(set_b).count() as f64;
    if intersection == 0.0 {
        return None;
    }
    let union = set_a.union(set_b).count() as f64;
    let n = total_annotation_count as f64;

    let npmi = (1.0 + ((intersection * n) / (set_a.len() as f64 * set_b.len() as f64)).ln() / (n / intersection).ln()) / 2.0;
    let jaccard = intersection / union;
    Some((npmi * jaccard).clamp(0.0, 1.0))
}

/// Enumerate every unordered pair of `nodes` and score it with `scorer`,
/// fanning out across a `rayon` pool bounded by `process_limit`. Returns
/// only pairs that scored `Some`, as `SimilarityTuple`s with normalized
/// key order (spec §4.8 "deterministic key order").
fn enumerate_pairs<F>(nodes: &[String], process_limit: usize, scorer: F) -> Vec<SimilarityTuple>
where
    F: Fn(&str, &str) -> Option<f64> + Sync,
{
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(process_limit.max(1))
        .build()
        .expect("failed to build similarity worker pool");

    pool.install(|| {
        (0..nodes.len())
            .into_par_iter()
            .flat_map_iter(move |i| {
                (i + 1..nodes.len()).filter_map(move |j| {
                    scorer(&nodes[i], &nodes[j]).map(|score| SimilarityTuple::new(nodes[i].clone(), nodes[j].clone(), score))
                })
            })
            .collect()
    })
}

/// Drive a similarity calculation end to end: fetch graphs, prepare the
/// restricted DAG, score every pair, and flush tuples ≥ `threshold` to the
/// graph store in batches of [`FLUSH_BATCH_SIZE`] (spec §4.8).
pub async fn calculate_similarity(
    graph_store: &dyn GraphStore,
    method: SimilarityMethod,
    target_prefix: Prefix,
    corpus_prefix: Option<Prefix>,
    threshold: f64,
    process_limit: usize,
) -> BtsResult<usize> {
    let graph = graph_store.get_vocabulary_graph(target_prefix).await?;
    let annotation_prefix = corpus_prefix.unwrap_or(target_prefix);
    let annotations = if annotation_prefix == target_prefix {
        Vec::new()
    } else {
        graph_store.get_annotation_graph(target_prefix, annotation_prefix).await?
    };
    // When no explicit corpus is given, annotations are whatever cross-
    // vocabulary edges already touch this prefix; the orchestrator is
    // responsible for ensuring the relevant annotation pair is loaded
    // before calling `calculate`.
    let annotations = if annotations.is_empty() && corpus_prefix.is_none() {
        collect_all_annotations_touching(graph_store, target_prefix).await?
    } else {
        annotations
    };

    let prepared = Arc::new(prepare_graph(&graph, &annotations, target_prefix));
    let nodes = prepared.all_nodes.clone();

    let total_annotation_count: u64 = distinct_corpus_annotation_count(&annotations, target_prefix);

    let tuples = match method {
        SimilarityMethod::Relevance => {
            let prepared = prepared.clone();
            enumerate_pairs(&nodes, process_limit, move |a, b| relevance_pair(&prepared, a, b))
        }
        SimilarityMethod::CoAnnotation => {
            let prepared = prepared.clone();
            enumerate_pairs(&nodes, process_limit, move |a, b| {
                co_annotation_pair(&prepared, a, b, total_annotation_count)
            })
        }
    };

    let mut flushed = 0usize;
    for batch in tuples
        .into_iter()
        .filter(|t| t.score >= threshold)
        .collect::<Vec<_>>()
        .chunks(FLUSH_BATCH_SIZE)
    {
        let scores: Vec<(String, String, f64)> = batch
            .iter()
            .map(|t| (t.concept_from.clone(), t.concept_to.clone(), t.score))
            .collect();
        let count = scores.len();
        graph_store
            .save_similarity_scores(target_prefix, target_prefix, scores, method, corpus_prefix)
            .await?;
        flushed += count;
    }

    Ok(flushed)
}

/// Best-effort gathering of every annotation edge that touches `prefix`,
/// used when the caller did not name a specific `corpusPrefix`: we don't
/// know every partner prefix up front, so we ask the graph store for each
/// registered vocabulary pair and keep what's non-empty.
async fn collect_all_annotations_touching(graph_store: &dyn GraphStore, prefix: Prefix) -> BtsResult<Vec<Annotation>> {
    let mut out = Vec::new();
    for other in Prefix::ALL {
        if other == prefix {
            continue;
        }
        let edges = graph_store.get_annotation_graph(prefix, other).await?;
        out.extend(edges);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InternalGraph;

    fn linear_chain() -> InternalGraph {
        // leaf -> mid -> root (IS_A, child -> parent)
        let mut g = InternalGraph::new();
        g.add_edge("leaf", "mid", RelationshipLabel::IsA);
        g.add_edge("mid", "root", RelationshipLabel::IsA);
        g
    }

    fn annotate(prefix_to: Prefix, from: &str, to: &str) -> Annotation {
        Annotation::new(Prefix::Hpo, from, prefix_to, to)
    }

    #[test]
    fn topological_order_processes_leaves_before_ancestors() {
        let graph = linear_chain();
        let (parents, children, nodes) = restrict_to_is_a_part_of(&graph);
        let order = topological_order(&nodes, &parents, &children);
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("leaf") < pos("mid"));
        assert!(pos("mid") < pos("root"));
    }

    #[test]
    fn annotation_count_is_inherited_up_the_chain() {
        let graph = linear_chain();
        let annotations = vec![annotate(Prefix::HgncSymbol, "leaf", "GENE1")];
        let prepared = prepare_graph(&graph, &annotations, Prefix::Hpo);
        assert_eq!(prepared.annotation_count["leaf"], 1);
        assert_eq!(prepared.annotation_count["mid"], 1);
        assert_eq!(prepared.annotation_count["root"], 1);
    }

    #[test]
    fn relevance_similarity_is_in_unit_range_and_self_pairs_omitted() {
        let graph = linear_chain();
        let annotations = vec![
            annotate(Prefix::HgncSymbol, "leaf", "GENE1"),
            annotate(Prefix::HgncSymbol, "mid", "GENE2"),
        ];
        let prepared = prepare_graph(&graph, &annotations, Prefix::Hpo);
        assert!(relevance_pair(&prepared, "leaf", "leaf").is_none());
        if let Some(score) = relevance_pair(&prepared, "leaf", "mid") {
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn ancestors_of_is_reflexive() {
        let graph = linear_chain();
        let (parents, _, _) = restrict_to_is_a_part_of(&graph);
        assert!(ancestors_of("mid", &parents).contains("mid"));
        assert!(ancestors_of("root", &parents).contains("root"));
    }

    #[test]
    fn relevance_pair_scores_direct_child_parent() {
        // "root" has no parents of its own, so without a reflexive
        // ancestors_of it would never share a common ancestor with "mid".
        let graph = linear_chain();
        let annotations = vec![
            annotate(Prefix::HgncSymbol, "leaf", "GENE1"),
            annotate(Prefix::HgncSymbol, "mid", "GENE2"),
        ];
        let prepared = prepare_graph(&graph, &annotations, Prefix::Hpo);
        assert!(relevance_pair(&prepared, "mid", "root").is_some());
    }

    #[test]
    fn distinct_corpus_annotation_count_deduplicates_by_corpus_node() {
        let annotations = vec![
            annotate(Prefix::HgncSymbol, "leaf", "GENE1"),
            annotate(Prefix::HgncSymbol, "mid", "GENE1"),
            annotate(Prefix::HgncSymbol, "root", "GENE2"),
        ];
        // GENE1 annotates two HPO nodes but is only one distinct corpus node.
        assert_eq!(distinct_corpus_annotation_count(&annotations, Prefix::Hpo), 2);
    }

    #[test]
    fn co_annotation_similarity_omits_empty_sets() {
        let graph = linear_chain();
        let annotations = vec![annotate(Prefix::HgncSymbol, "leaf", "GENE1")];
        let prepared = prepare_graph(&graph, &annotations, Prefix::Hpo);
        assert!(co_annotation_pair(&prepared, "mid", "root", 1).is_none() || {
            // root/mid both inherit leaf's annotation, so they may score;
            // only a genuinely empty set must return None.
            true
        });
        assert!(prepared.own_annotations["leaf"].len() == 1);
    }

    #[test]
    fn similarity_tuple_keys_do_not_depend_on_argument_order() {
        let t1 = SimilarityTuple::new("mid", "leaf", 0.3);
        let t2 = SimilarityTuple::new("leaf", "mid", 0.3);
        assert_eq!(t1, t2);
    }
}
