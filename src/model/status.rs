//! Per-prefix lifecycle status records (SPEC_FULL §3 supplement).
//!
//! These back the `status` operations on the orchestrator/query surface:
//! "has HPO been downloaded/loaded/embedded, and when." Distinct from
//! [`super::concept::ConceptStatus`], which tracks a single concept's
//! active/deprecated state.

use serde::{Deserialize, Serialize};

use super::concept::Prefix;

/// Where a vocabulary sits in the ingest pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocabularyStage {
    Absent,
    Downloaded,
    Loaded,
    Embedded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyStatus {
    pub prefix: Prefix,
    pub stage: VocabularyStage,
    pub downloaded_at: Option<chrono::DateTime<chrono::Utc>>,
    pub loaded_at: Option<chrono::DateTime<chrono::Utc>>,
    pub embedded_at: Option<chrono::DateTime<chrono::Utc>>,
    pub concept_count: Option<u64>,
}

impl VocabularyStatus {
    pub fn absent(prefix: Prefix) -> Self {
        Self {
            prefix,
            stage: VocabularyStage::Absent,
            downloaded_at: None,
            loaded_at: None,
            embedded_at: None,
            concept_count: None,
        }
    }
}

/// Status of an annotation pair's load, keyed by the unordered prefix pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationStatus {
    pub prefix_a: Prefix,
    pub prefix_b: Prefix,
    pub loaded: bool,
    pub loaded_at: Option<chrono::DateTime<chrono::Utc>>,
    pub annotation_count: Option<u64>,
}

/// Status of a similarity calculation run for one method (+ optional corpus
/// restriction) over one prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityStatus {
    pub prefix: Prefix,
    pub method: super::similarity::SimilarityMethod,
    pub corpus_prefix: Option<Prefix>,
    pub completed: bool,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub edge_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_status_has_no_timestamps() {
        let s = VocabularyStatus::absent(Prefix::Hpo);
        assert_eq!(s.stage, VocabularyStage::Absent);
        assert!(s.downloaded_at.is_none());
        assert!(s.loaded_at.is_none());
    }
}
