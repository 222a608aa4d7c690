//! HGNC gene nomenclature loader (spec §4.1).
//!
//! Flat, no IS_A hierarchy: every row is a gene concept keyed by its
//! numeric HGNC id. `alias_symbol` entries become both synonyms and
//! HAS_SYMBOL annotations to HGNC_SYMBOL; `alias_name` entries are
//! synonyms only. Withdrawn ids become deprecated concepts with a
//! REPLACED_BY edge to whatever they were merged into, plus a
//! self-referential HAS_SYMBOL annotation for the withdrawn symbol
//! (duplicates the surviving gene's own annotation; the graph store's
//! merge-on-insert semantics collapse the overlap).

use std::path::Path;

use async_trait::async_trait;

use super::{LoaderMetadata, ParsedVocabulary, VocabularyLoader};
use crate::config::Config;
use crate::download;
use crate::error::BtsResult;
use crate::model::{
    Annotation, Concept, ConceptStatus, InternalGraph, Prefix, RelationshipLabel,
    SimilarityMethod, ANNOTATION_TYPE_HAS_SYMBOL,
};

const HGNC_SYMBOL_URL: &str =
    "https://storage.googleapis.com/public-download-files/hgnc/tsv/tsv/hgnc_complete_set.txt";
const HGNC_WITHDRAWN_URL: &str =
    "https://storage.googleapis.com/public-download-files/hgnc/tsv/tsv/withdrawn.txt";

pub(super) const SYMBOL_FILE: &str = "hgnc/symbol.txt";
pub(super) const WITHDRAWN_FILE: &str = "hgnc/withdrawn.txt";

pub struct HgncLoader;

pub(super) async fn download_shared(client: &reqwest::Client, config: &Config) -> BtsResult<()> {
    if !config.data_dir.join(SYMBOL_FILE).exists() {
        download::download_file(client, HGNC_SYMBOL_URL, &config.data_dir, SYMBOL_FILE, None)
            .await?;
    }
    if !config.data_dir.join(WITHDRAWN_FILE).exists() {
        download::download_file(
            client,
            HGNC_WITHDRAWN_URL,
            &config.data_dir,
            WITHDRAWN_FILE,
            None,
        )
        .await?;
    }
    Ok(())
}

#[async_trait]
impl VocabularyLoader for HgncLoader {
    fn metadata(&self) -> LoaderMetadata {
        LoaderMetadata {
            prefix: Prefix::Hgnc,
            name: "hgnc",
            file_paths: vec![SYMBOL_FILE.to_string(), WITHDRAWN_FILE.to_string()],
            annotations: vec![Prefix::HgncSymbol],
            similarity_methods: vec![],
        }
    }

    async fn download(&self, client: &reqwest::Client, config: &Config) -> BtsResult<()> {
        download_shared(client, config).await
    }

    fn parse(&self, data_dir: &Path) -> BtsResult<ParsedVocabulary> {
        let mut concepts = Vec::new();
        let graph = InternalGraph::new();
        let mut cross_annotations = Vec::new();

        parse_symbol_file(data_dir, &mut concepts, &mut cross_annotations)?;
        let mut graph = graph;
        parse_withdrawn_file(data_dir, &mut concepts, &mut graph, &mut cross_annotations)?;

        Ok(ParsedVocabulary {
            concepts,
            graph,
            cross_annotations,
        })
    }
}

fn parse_symbol_file(
    data_dir: &Path,
    concepts: &mut Vec<Concept>,
    cross_annotations: &mut Vec<Annotation>,
) -> BtsResult<()> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(data_dir.join(SYMBOL_FILE))?;
    let headers = reader.headers()?.clone();
    let hgnc_id_idx = col(&headers, "hgnc_id")?;
    let symbol_idx = col(&headers, "symbol")?;
    let name_idx = headers.iter().position(|h| h == "name");
    let alias_symbol_idx = headers.iter().position(|h| h == "alias_symbol");
    let alias_name_idx = headers.iter().position(|h| h == "alias_name");

    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(|e| crate::error::BtsError::ParseError {
            file: SYMBOL_FILE.to_string(),
            line: line + 2,
            message: e.to_string(),
        })?;

        let Some(id) = hgnc_number(record.get(hgnc_id_idx).unwrap_or("")) else {
            continue;
        };
        let symbol = record.get(symbol_idx).unwrap_or("").to_string();
        if symbol.is_empty() {
            continue;
        }

        let mut synonyms = Vec::new();
        if let Some(idx) = alias_symbol_idx {
            for alias in record.get(idx).unwrap_or("").split('|') {
                if !alias.is_empty() {
                    synonyms.push(alias.to_string());
                    cross_annotations.push(
                        Annotation::new(Prefix::Hgnc, id.clone(), Prefix::HgncSymbol, alias)
                            .with_type(ANNOTATION_TYPE_HAS_SYMBOL),
                    );
                }
            }
        }
        if let Some(idx) = alias_name_idx {
            for alias in record.get(idx).unwrap_or("").split('|') {
                if !alias.is_empty() {
                    synonyms.push(alias.to_string());
                }
            }
        }

        let mut concept = Concept::new(Prefix::Hgnc, id.clone());
        concept.concept_types = vec!["gene".to_string()];
        concept.label = Some(symbol.clone());
        if let Some(idx) = name_idx {
            concept.definition = record
                .get(idx)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        }
        if !synonyms.is_empty() {
            concept.synonyms = Some(synonyms);
        }
        concept.status = ConceptStatus::Active;
        concepts.push(concept);

        cross_annotations.push(
            Annotation::new(Prefix::Hgnc, id, Prefix::HgncSymbol, symbol)
                .with_type(ANNOTATION_TYPE_HAS_SYMBOL),
        );
    }
    Ok(())
}

fn parse_withdrawn_file(
    data_dir: &Path,
    concepts: &mut Vec<Concept>,
    graph: &mut InternalGraph,
    cross_annotations: &mut Vec<Annotation>,
) -> BtsResult<()> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(data_dir.join(WITHDRAWN_FILE))?;
    let headers = reader.headers()?.clone();
    let hgnc_id_idx = col(&headers, "hgnc_id")?;
    let symbol_idx = col(&headers, "symbol")?;
    let status_idx = col(&headers, "status")?;
    let merged_into_idx = headers.iter().position(|h| h == "merged_into_report");

    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(|e| crate::error::BtsError::ParseError {
            file: WITHDRAWN_FILE.to_string(),
            line: line + 2,
            message: e.to_string(),
        })?;

        if record.get(status_idx) == Some("Entry Withdrawn") {
            continue;
        }

        let Some(id) = hgnc_number(record.get(hgnc_id_idx).unwrap_or("")) else {
            continue;
        };
        let symbol = record.get(symbol_idx).unwrap_or("").to_string();

        let mut concept = Concept::new(Prefix::Hgnc, id.clone());
        concept.concept_types = vec!["gene".to_string()];
        concept.label = Some(symbol.clone());
        concept.status = ConceptStatus::Deprecated;
        concepts.push(concept);

        cross_annotations.push(
            Annotation::new(Prefix::Hgnc, id.clone(), Prefix::HgncSymbol, symbol)
                .with_type(ANNOTATION_TYPE_HAS_SYMBOL),
        );

        if let Some(idx) = merged_into_idx {
            for merged in record.get(idx).unwrap_or("").split('|') {
                if let Some(new_id) = hgnc_number(merged) {
                    graph.add_edge(id.clone(), new_id, RelationshipLabel::ReplacedBy);
                }
            }
        }
    }
    Ok(())
}

/// `HGNC:5` -> `5`.
fn hgnc_number(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        trimmed
            .strip_prefix("HGNC:")
            .unwrap_or(trimmed)
            .to_string(),
    )
}

fn col(headers: &csv::StringRecord, name: &str) -> BtsResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| crate::error::BtsError::ParseError {
            file: "hgnc".to_string(),
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
        writeln!(symbol, "hgnc_id\tsymbol\tname\talias_symbol\talias_name").unwrap();
        writeln!(symbol, "HGNC:5\tBRCA1\tBRCA1 DNA repair\tBRCC1|IRIS\t").unwrap();

        let mut withdrawn = std::fs::File::create(dir.join(WITHDRAWN_FILE)).unwrap();
        writeln!(withdrawn, "hgnc_id\tsymbol\tstatus\tmerged_into_report").unwrap();
        writeln!(withdrawn, "HGNC:99999\tOLDSYM\tMerged/Split\tHGNC:5").unwrap();
        writeln!(withdrawn, "HGNC:88888\tGONE\tEntry Withdrawn\t").unwrap();
    }

    #[test]
    fn active_gene_gets_self_and_alias_annotations() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path());

        let parsed = HgncLoader.parse(dir.path()).unwrap();
        let brca1 = parsed.concepts.iter().find(|c| c.concept_id == "5").unwrap();
        assert_eq!(brca1.label.as_deref(), Some("BRCA1"));
        assert_eq!(
            brca1.synonyms,
            Some(vec!["BRCC1".to_string(), "IRIS".to_string()])
        );

        let symbol_annotations: Vec<_> = parsed
            .cross_annotations
            .iter()
            .filter(|a| a.concept_id_from == "5")
            .map(|a| a.concept_id_to.as_str())
            .collect();
        assert!(symbol_annotations.contains(&"BRCA1"));
        assert!(symbol_annotations.contains(&"BRCC1"));
    }

    #[test]
    fn withdrawn_entry_is_skipped_and_merged_becomes_replaced_by() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path());

        let parsed = HgncLoader.parse(dir.path()).unwrap();
        assert!(!parsed.concepts.iter().any(|c| c.concept_id == "88888"));

        let old = parsed.concepts.iter().find(|c| c.concept_id == "99999").unwrap();
        assert_eq!(old.status, ConceptStatus::Deprecated);
        assert!(parsed.graph.edges.iter().any(|e| e.from_concept_id == "99999"
            && e.to_concept_id == "5"
            && e.label == RelationshipLabel::ReplacedBy));
    }
}
