//! Derived HGNC_SYMBOL vocabulary (spec §4.1).
//!
//! Not an independent download: reuses the HGNC symbol/withdrawn files.
//! The vocabulary is the set of approved symbols plus every alias symbol
//! that isn't itself a withdrawn symbol; withdrawn symbols appear as
//! deprecated concepts. No internal edges — HGNC_SYMBOL is flat.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;

use super::hgnc::{download_shared, SYMBOL_FILE, WITHDRAWN_FILE};
use super::{LoaderMetadata, ParsedVocabulary, VocabularyLoader};
use crate::config::Config;
use crate::error::BtsResult;
use crate::model::{Concept, ConceptStatus, InternalGraph, Prefix, SimilarityMethod};

pub struct HgncSymbolLoader;

#[async_trait]
impl VocabularyLoader for HgncSymbolLoader {
    fn metadata(&self) -> LoaderMetadata {
        LoaderMetadata {
            prefix: Prefix::HgncSymbol,
            name: "hgnc_symbol",
            file_paths: vec![SYMBOL_FILE.to_string(), WITHDRAWN_FILE.to_string()],
            annotations: vec![
                Prefix::Hgnc,
                Prefix::Hpo,
                Prefix::Ncit,
                Prefix::Omim,
                Prefix::Ordo,
                Prefix::Ensembl,
                Prefix::Reactome,
            ],
            similarity_methods: vec![SimilarityMethod::CoAnnotation],
        }
    }

    async fn download(&self, client: &reqwest::Client, config: &Config) -> BtsResult<()> {
        download_shared(client, config).await
    }

    fn parse(&self, data_dir: &Path) -> BtsResult<ParsedVocabulary> {
        let mut active: BTreeSet<String> = BTreeSet::new();
        let mut withdrawn: BTreeSet<String> = BTreeSet::new();

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(data_dir.join(SYMBOL_FILE))?;
        let headers = reader.headers()?.clone();
        let symbol_idx = col(&headers, "symbol")?;
        let alias_symbol_idx = headers.iter().position(|h| h == "alias_symbol");

        for result in reader.records() {
            let record = result?;
            let symbol = record.get(symbol_idx).unwrap_or("");
            if !symbol.is_empty() {
                active.insert(symbol.to_string());
            }
            if let Some(idx) = alias_symbol_idx {
                for alias in record.get(idx).unwrap_or("").split('|') {
                    if !alias.is_empty() {
                        active.insert(alias.to_string());
                    }
                }
            }
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(data_dir.join(WITHDRAWN_FILE))?;
        let headers = reader.headers()?.clone();
        let symbol_idx = col(&headers, "symbol")?;
        let status_idx = col(&headers, "status")?;

        for result in reader.records() {
            let record = result?;
            if record.get(status_idx) == Some("Entry Withdrawn") {
                continue;
            }
            let symbol = record.get(symbol_idx).unwrap_or("");
            if !symbol.is_empty() {
                withdrawn.insert(symbol.to_string());
            }
        }

        let mut concepts = Vec::new();
        for symbol in active.difference(&withdrawn) {
            let mut concept = Concept::new(Prefix::HgncSymbol, symbol.clone());
            concept.concept_types = vec!["gene_symbol".to_string()];
            concept.label = Some(symbol.clone());
            concept.status = ConceptStatus::Active;
            concepts.push(concept);
        }
        for symbol in &withdrawn {
            let mut concept = Concept::new(Prefix::HgncSymbol, symbol.clone());
            concept.concept_types = vec!["gene_symbol".to_string()];
            concept.label = Some(symbol.clone());
            concept.status = ConceptStatus::Deprecated;
            concepts.push(concept);
        }

        Ok(ParsedVocabulary {
            concepts,
            graph: InternalGraph::new(),
            cross_annotations: Vec::new(),
        })
    }
}

fn col(headers: &csv::StringRecord, name: &str) -> BtsResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| crate::error::BtsError::ParseError {
            file: "hgnc_symbol".to_string(),
            line: 0,
            message: format!("missing column {name}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_files(dir: &Path) {
        std::fs::create_dir_all(dir.join("hgnc")).unwrap();
        let mut symbol = std::fs::File::create(dir.join(SYMBOL_FILE)).unwrap();
        writeln!(symbol, "hgnc_id\tsymbol\talias_symbol").unwrap();
        writeln!(symbol, "HGNC:5\tBRCA1\tBRCC1").unwrap();

        let mut withdrawn = std::fs::File::create(dir.join(WITHDRAWN_FILE)).unwrap();
        writeln!(withdrawn, "hgnc_id\tsymbol\tstatus").unwrap();
        writeln!(withdrawn, "HGNC:99\tBRCC1\tMerged/Split").unwrap();
    }

    #[test]
    fn withdrawn_symbol_excluded_from_active_set() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path());

        let parsed = HgncSymbolLoader.parse(dir.path()).unwrap();
        let brca1 = parsed
            .concepts
            .iter()
            .find(|c| c.concept_id == "BRCA1")
            .unwrap();
        assert_eq!(brca1.status, ConceptStatus::Active);

        let brcc1 = parsed
            .concepts
            .iter()
            .find(|c| c.concept_id == "BRCC1")
            .unwrap();
        assert_eq!(brcc1.status, ConceptStatus::Deprecated);
    }
}
