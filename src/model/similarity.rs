//! Similarity edges and query result shapes (spec §3, §4.8).

use serde::{Deserialize, Serialize};

use super::concept::Prefix;

/// Name of a similarity method, used as (part of) the property key on a
/// `similar_to` edge: `method` or `method:corpus_prefix`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimilarityMethod {
    Relevance,
    CoAnnotation,
}

impl SimilarityMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMethod::Relevance => "relevance",
            SimilarityMethod::CoAnnotation => "co_annotation",
        }
    }
}

/// Build the graph-store property key for a (method, corpus) pair, per
/// spec §4.5 `saveSimilarityScores`: `method` or `method:corpusPrefix`.
pub fn similarity_property_key(method: SimilarityMethod, corpus_prefix: Option<Prefix>) -> String {
    match corpus_prefix {
        Some(p) => format!("{}:{}", method.as_str(), p.as_str()),
        None => method.as_str().to_string(),
    }
}

/// A single scored similarity tuple produced by the similarity engine,
/// before it is batched and flushed to the graph store. Key order is
/// normalized so `(a, b)` and `(b, a)` never both appear (spec §4.8).
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityTuple {
    pub concept_from: String,
    pub concept_to: String,
    pub score: f64,
}

impl SimilarityTuple {
    pub fn new(a: impl Into<String>, b: impl Into<String>, score: f64) -> Self {
        let a = a.into();
        let b = b.into();
        if a <= b {
            Self {
                concept_from: a,
                concept_to: b,
                score,
            }
        } else {
            Self {
                concept_from: b,
                concept_to: a,
                score,
            }
        }
    }
}

/// `(conceptId, descendants)` — the result of a hierarchical expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionResult {
    pub concept_id: String,
    pub descendants: Vec<String>,
}

/// One (prefix, scored concepts) bucket within a `SimilarTermResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarConceptGroup {
    pub prefix: Prefix,
    pub similar_concepts: Vec<ScoredConcept>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredConcept {
    pub concept_id: String,
    pub score: f64,
}

/// `(conceptId, groups)` — the result of a similar-term search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarTermResult {
    pub concept_id: String,
    pub groups: Vec<SimilarConceptGroup>,
}

/// `(conceptId, prefix, score)` — a single translated term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedTerm {
    pub concept_id: String,
    pub prefix: Prefix,
    pub score: f64,
}
