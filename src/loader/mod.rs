//! Vocabulary and annotation loaders (spec §4.1, §4.2).
//!
//! Each vocabulary loader is a small zero-sized type implementing
//! [`VocabularyLoader`], selected through a compile-time match in
//! [`vocabulary_loader`] rather than the original's dynamic
//! `vocabulary.{name}` module lookup (spec §9 redesign flag).

mod ctv3;
mod ensembl;
mod hgnc;
mod hgnc_symbol;
mod hpo;
mod ncit;
mod omim;
mod ordo;
mod owl;
mod reactome;
mod rf2;
mod snomed;

pub mod annotation;

use async_trait::async_trait;
use std::path::Path;

use crate::config::Config;
use crate::error::BtsResult;
use crate::model::{Annotation, Concept, InternalGraph, Prefix, SimilarityMethod};

/// Static description of a vocabulary loader: what it downloads, what
/// annotations and similarity methods it participates in.
#[derive(Debug, Clone)]
pub struct LoaderMetadata {
    pub prefix: Prefix,
    pub name: &'static str,
    /// Files expected under `Config::data_dir`, relative paths.
    pub file_paths: Vec<String>,
    pub annotations: Vec<Prefix>,
    pub similarity_methods: Vec<SimilarityMethod>,
}

/// Output of a loader's parse step: ready to hand to the document store
/// (`concepts`) and the graph store (`graph`, `cross_annotations`).
#[derive(Debug, Clone, Default)]
pub struct ParsedVocabulary {
    pub concepts: Vec<Concept>,
    pub graph: InternalGraph,
    pub cross_annotations: Vec<Annotation>,
}

#[async_trait]
pub trait VocabularyLoader: Send + Sync {
    fn metadata(&self) -> LoaderMetadata;

    /// Idempotent: a no-op when every file in `metadata().file_paths`
    /// already exists under `config.data_dir`.
    async fn download(&self, client: &reqwest::Client, config: &Config) -> BtsResult<()>;

    /// Pure transform from files on disk to `(concepts, graph,
    /// crossAnnotations)`. Never touches a store.
    fn parse(&self, data_dir: &Path) -> BtsResult<ParsedVocabulary>;
}

/// Compile-time loader registry (spec §9 redesign flag).
pub fn vocabulary_loader(prefix: Prefix) -> Box<dyn VocabularyLoader> {
    match prefix {
        Prefix::Hpo => Box::new(hpo::HpoLoader),
        Prefix::Ordo => Box::new(ordo::OrdoLoader),
        Prefix::Snomed => Box::new(snomed::SnomedLoader),
        Prefix::Ncit => Box::new(ncit::NcitLoader),
        Prefix::Omim => Box::new(omim::OmimLoader),
        Prefix::Hgnc => Box::new(hgnc::HgncLoader),
        Prefix::HgncSymbol => Box::new(hgnc_symbol::HgncSymbolLoader),
        Prefix::Ctv3 => Box::new(ctv3::Ctv3Loader),
        Prefix::Ensembl => Box::new(ensembl::EnsemblLoader),
        Prefix::Reactome => Box::new(reactome::ReactomeLoader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_prefix() {
        for prefix in Prefix::ALL {
            let loader = vocabulary_loader(prefix);
            assert_eq!(loader.metadata().prefix, prefix);
        }
    }
}
