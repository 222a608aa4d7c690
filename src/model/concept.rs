//! Concept model (spec §3).
//!
//! Heterogeneous per-vocabulary fields are modeled as a discriminated union
//! (`VocabularyExtra`) rather than subclassing (spec §9 redesign flag):
//! common fields live on `Concept`, prefix-specific fields live on the
//! matching `VocabularyExtra` variant, and the discriminator round-trips
//! through serialization via `#[serde(tag = "kind")]`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Enumerated vocabulary tag. `(prefix, concept_id)` is a concept's primary
/// key and must be globally unique within the document and graph stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Prefix {
    Hpo,
    Ordo,
    Snomed,
    Ncit,
    Omim,
    Hgnc,
    HgncSymbol,
    Ctv3,
    Ensembl,
    Reactome,
}

impl Prefix {
    pub const ALL: [Prefix; 10] = [
        Prefix::Hpo,
        Prefix::Ordo,
        Prefix::Snomed,
        Prefix::Ncit,
        Prefix::Omim,
        Prefix::Hgnc,
        Prefix::HgncSymbol,
        Prefix::Ctv3,
        Prefix::Ensembl,
        Prefix::Reactome,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Prefix::Hpo => "HPO",
            Prefix::Ordo => "ORDO",
            Prefix::Snomed => "SNOMED",
            Prefix::Ncit => "NCIT",
            Prefix::Omim => "OMIM",
            Prefix::Hgnc => "HGNC",
            Prefix::HgncSymbol => "HGNC_SYMBOL",
            Prefix::Ctv3 => "CTV3",
            Prefix::Ensembl => "ENSEMBL",
            Prefix::Reactome => "REACTOME",
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Prefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HPO" => Ok(Prefix::Hpo),
            "ORDO" => Ok(Prefix::Ordo),
            "SNOMED" => Ok(Prefix::Snomed),
            "NCIT" => Ok(Prefix::Ncit),
            "OMIM" => Ok(Prefix::Omim),
            "HGNC" => Ok(Prefix::Hgnc),
            "HGNC_SYMBOL" => Ok(Prefix::HgncSymbol),
            "CTV3" => Ok(Prefix::Ctv3),
            "ENSEMBL" => Ok(Prefix::Ensembl),
            "REACTOME" => Ok(Prefix::Reactome),
            other => Err(format!("unknown prefix: {other}")),
        }
    }
}

/// A concept's life-cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConceptStatus {
    Active,
    Deprecated,
}

/// A free-form, vocabulary-defined node/class type tag (e.g. "Class",
/// "gene", "pathway", "reaction"). Not a closed enum: each vocabulary loader
/// assigns the tags meaningful to it.
pub type ConceptType = String;

/// Ensembl feature kind, distinguishing the four node types the GTF loader
/// produces (spec §4.1 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsemblFeature {
    Gene,
    Transcript,
    Exon,
    Protein,
}

/// Prefix-specific fields, modeled as a discriminated union (spec §9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum VocabularyExtra {
    /// Vocabularies with no extra fields (HPO, ORDO, NCIT, OMIM, HGNC,
    /// HGNC_SYMBOL).
    None,
    Snomed {
        fully_defined: bool,
    },
    Reactome {
        inferred: bool,
    },
    Ensembl {
        feature: EnsemblFeature,
        chromosome: Option<String>,
        start: Option<u64>,
        end: Option<u64>,
        strand: Option<i8>,
    },
    Ctv3 {
        term_status: String,
    },
}

impl Default for VocabularyExtra {
    fn default() -> Self {
        VocabularyExtra::None
    }
}

/// A term within a vocabulary, keyed by `(prefix, concept_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub prefix: Prefix,
    pub concept_id: String,
    pub concept_types: Vec<ConceptType>,
    pub label: Option<String>,
    /// `None` and `Some(vec![])` both round-trip through the document
    /// store; loaders that never populate synonyms use `None` (see
    /// DESIGN.md open question).
    pub synonyms: Option<Vec<String>>,
    pub definition: Option<String>,
    pub comment: Option<String>,
    pub status: ConceptStatus,
    pub vector_id: Option<String>,
    #[serde(default)]
    pub extra: VocabularyExtra,
}

impl Concept {
    pub fn new(prefix: Prefix, concept_id: impl Into<String>) -> Self {
        Self {
            prefix,
            concept_id: concept_id.into(),
            concept_types: Vec::new(),
            label: None,
            synonyms: None,
            definition: None,
            comment: None,
            status: ConceptStatus::Active,
            vector_id: None,
            extra: VocabularyExtra::None,
        }
    }

    /// All text the auto-complete and search-text generators draw from:
    /// the concept id, the label, and every synonym.
    pub fn text_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.concept_id.as_str()];
        if let Some(label) = &self.label {
            fields.push(label.as_str());
        }
        if let Some(syns) = &self.synonyms {
            fields.extend(syns.iter().map(String::as_str));
        }
        fields
    }
}
