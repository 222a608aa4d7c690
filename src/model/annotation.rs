//! Cross-vocabulary annotation model (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::concept::Prefix;

/// Well-known annotation types. Loaders are free to pass `None` when the
/// pair has no finer-grained classification.
pub const ANNOTATION_TYPE_HAS_SYMBOL: &str = "HAS_SYMBOL";

/// A directed edge between two concepts of *different* prefixes. Uniquely
/// identified by `(prefix_from, concept_id_from, prefix_to, concept_id_to,
/// annotation_type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub prefix_from: Prefix,
    pub concept_id_from: String,
    pub prefix_to: Prefix,
    pub concept_id_to: String,
    pub annotation_type: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl Annotation {
    pub fn new(
        prefix_from: Prefix,
        concept_id_from: impl Into<String>,
        prefix_to: Prefix,
        concept_id_to: impl Into<String>,
    ) -> Self {
        Self {
            prefix_from,
            concept_id_from: concept_id_from.into(),
            prefix_to,
            concept_id_to: concept_id_to.into(),
            annotation_type: None,
            properties: HashMap::new(),
        }
    }

    pub fn with_type(mut self, annotation_type: impl Into<String>) -> Self {
        self.annotation_type = Some(annotation_type.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The unordered pair of prefixes this annotation connects, normalized
    /// so `(HPO, HGNC_SYMBOL)` and `(HGNC_SYMBOL, HPO)` compare equal.
    pub fn unordered_pair(&self) -> (Prefix, Prefix) {
        unordered_pair(self.prefix_from, self.prefix_to)
    }
}

/// Normalize an unordered prefix pair for use as a registry/store key.
pub fn unordered_pair(a: Prefix, b: Prefix) -> (Prefix, Prefix) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unordered_pair_normalizes_order() {
        assert_eq!(
            unordered_pair(Prefix::Hpo, Prefix::HgncSymbol),
            unordered_pair(Prefix::HgncSymbol, Prefix::Hpo)
        );
    }

    #[test]
    fn annotation_builder_sets_type_and_properties() {
        let a = Annotation::new(Prefix::HgncSymbol, "BRCA1", Prefix::Hpo, "0003002")
            .with_type(ANNOTATION_TYPE_HAS_SYMBOL)
            .with_property("frequency", "HP:0040283");
        assert_eq!(a.annotation_type.as_deref(), Some(ANNOTATION_TYPE_HAS_SYMBOL));
        assert_eq!(a.properties.get("frequency"), Some(&"HP:0040283".to_string()));
    }
}
