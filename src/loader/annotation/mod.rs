//! Cross-vocabulary annotation loaders (spec §4.2).
//!
//! Mirrors [`super::VocabularyLoader`]'s shape but for edges between two
//! different prefixes: `download` fetches the mapping file(s), `parse` is
//! a pure file → `Vec<Annotation>` transform. The orchestrator is
//! responsible for the prerequisite check (`assertVocabularyLoaded`: both
//! prefixes' graphs must already have terms) before calling either.

mod ctv3_snomed;
mod gene_hpo;
mod gene_ncit;
mod gene_omim;
mod gene_ordo;
mod hpo_ordo;
mod omim_ordo;
mod ordo_snomed;

use async_trait::async_trait;
use std::path::Path;

use crate::config::Config;
use crate::error::BtsResult;
use crate::model::{Annotation, Prefix};

#[derive(Debug, Clone)]
pub struct AnnotationLoaderMetadata {
    pub pair: (Prefix, Prefix),
    pub name: &'static str,
    pub file_paths: Vec<String>,
}

#[async_trait]
pub trait AnnotationLoader: Send + Sync {
    fn metadata(&self) -> AnnotationLoaderMetadata;
    async fn download(&self, client: &reqwest::Client, config: &Config) -> BtsResult<()>;
    fn parse(&self, data_dir: &Path) -> BtsResult<Vec<Annotation>>;
}

/// Compile-time registry keyed by the unordered prefix pair, mirroring
/// [`super::vocabulary_loader`].
pub fn annotation_loader(pair: (Prefix, Prefix)) -> Option<Box<dyn AnnotationLoader>> {
    let normalized = crate::model::annotation::unordered_pair(pair.0, pair.1);
    match normalized {
        (Prefix::HgncSymbol, Prefix::Hpo) => Some(Box::new(gene_hpo::GeneHpoLoader)),
        (Prefix::HgncSymbol, Prefix::Ncit) => Some(Box::new(gene_ncit::GeneNcitLoader)),
        (Prefix::HgncSymbol, Prefix::Omim) => Some(Box::new(gene_omim::GeneOmimLoader)),
        (Prefix::HgncSymbol, Prefix::Ordo) => Some(Box::new(gene_ordo::GeneOrdoLoader)),
        (Prefix::Hpo, Prefix::Ordo) => Some(Box::new(hpo_ordo::HpoOrdoLoader)),
        (Prefix::Omim, Prefix::Ordo) => Some(Box::new(omim_ordo::OmimOrdoLoader)),
        (Prefix::Ordo, Prefix::Snomed) => Some(Box::new(ordo_snomed::OrdoSnomedLoader)),
        (Prefix::Ctv3, Prefix::Snomed) => Some(Box::new(ctv3_snomed::Ctv3SnomedLoader)),
        _ => None,
    }
}

/// Every `(prefix, prefix)` pair with a registered loader, normalized.
pub fn all_pairs() -> Vec<(Prefix, Prefix)> {
    vec![
        (Prefix::HgncSymbol, Prefix::Hpo),
        (Prefix::HgncSymbol, Prefix::Ncit),
        (Prefix::HgncSymbol, Prefix::Omim),
        (Prefix::HgncSymbol, Prefix::Ordo),
        (Prefix::Hpo, Prefix::Ordo),
        (Prefix::Omim, Prefix::Ordo),
        (Prefix::Ordo, Prefix::Snomed),
        (Prefix::Ctv3, Prefix::Snomed),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_registered_pair_resolves_regardless_of_order() {
        for (a, b) in all_pairs() {
            assert!(annotation_loader((a, b)).is_some());
            assert!(annotation_loader((b, a)).is_some());
        }
    }
}
