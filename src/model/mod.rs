//! Core data model shared by the loader, store, similarity, and query layers.

pub mod annotation;
pub mod concept;
pub mod relationship;
pub mod similarity;
pub mod status;
pub mod user;

pub use annotation::{Annotation, ANNOTATION_TYPE_HAS_SYMBOL};
pub use concept::{Concept, ConceptStatus, ConceptType, EnsemblFeature, Prefix, VocabularyExtra};
pub use relationship::{InternalGraph, InternalRelationship, RelationshipLabel};
pub use similarity::{
    similarity_property_key, ExpansionResult, ScoredConcept, SimilarConceptGroup,
    SimilarTermResult, SimilarityMethod, SimilarityTuple, TranslatedTerm,
};
pub use status::{AnnotationStatus, SimilarityStatus, VocabularyStage, VocabularyStatus};
pub use user::{ApiKey, User};
