//! OMIM (via BioPortal) loader (spec §4.1).
//!
//! BioPortal's OMIM export is a CSV with IRI-shaped `Class ID`/`Parents`
//! columns; the OMIM number is the final path segment. `Moved from` lists
//! superseded numbers that now redirect to this row, becoming REPLACED_BY
//! edges old → new.

use std::path::Path;

use async_trait::async_trait;

use super::{LoaderMetadata, ParsedVocabulary, VocabularyLoader};
use crate::config::Config;
use crate::download;
use crate::error::{BtsError, BtsResult};
use crate::model::{Concept, ConceptStatus, InternalGraph, Prefix, RelationshipLabel, SimilarityMethod};

const OMIM_CSV_URL: &str = "https://data.bioontology.org/ontologies/OMIM/submissions/latest/download";

pub struct OmimLoader;

#[async_trait]
impl VocabularyLoader for OmimLoader {
    fn metadata(&self) -> LoaderMetadata {
        LoaderMetadata {
            prefix: Prefix::Omim,
            name: "omim",
            file_paths: vec!["omim/omim.csv".to_string()],
            annotations: vec![Prefix::HgncSymbol, Prefix::Ordo],
            similarity_methods: vec![SimilarityMethod::Relevance, SimilarityMethod::CoAnnotation],
        }
    }

    async fn download(&self, client: &reqwest::Client, config: &Config) -> BtsResult<()> {
        let meta = self.metadata();
        if download::all_files_exist(
            &config.data_dir,
            &meta.file_paths.iter().map(String::as_str).collect::<Vec<_>>(),
        ) {
            return Ok(());
        }
        let api_key = config
            .bioportal_api_key
            .as_ref()
            .ok_or_else(|| BtsError::MissingCredential("bioportal_api_key".to_string()))?;

        download::download_file(
            client,
            OMIM_CSV_URL,
            &config.data_dir,
            "omim/omim.csv",
            Some(vec![("Authorization", format!("apikey token={api_key}"))]),
        )
        .await
    }

    fn parse(&self, data_dir: &Path) -> BtsResult<ParsedVocabulary> {
        let mut reader = csv::ReaderBuilder::new().from_path(data_dir.join("omim/omim.csv"))?;

        let headers = reader.headers()?.clone();
        let class_id_idx = col(&headers, "Class ID")?;
        let label_idx = col(&headers, "Preferred Label")?;
        let synonyms_idx = headers.iter().position(|h| h == "Synonyms");
        let definition_idx = headers.iter().position(|h| h == "Definitions");
        let parents_idx = col(&headers, "Parents")?;
        let moved_from_idx = headers.iter().position(|h| h == "Moved from");

        let mut concepts = Vec::new();
        let mut graph = InternalGraph::new();

        for (line, result) in reader.records().enumerate() {
            let record = result.map_err(|e| BtsError::ParseError {
                file: "omim/omim.csv".to_string(),
                line: line + 2,
                message: e.to_string(),
            })?;

            let Some(id) = omim_number(record.get(class_id_idx).unwrap_or("")) else {
                continue;
            };

            let mut concept = Concept::new(Prefix::Omim, id.clone());
            concept.concept_types = vec!["Class".to_string()];
            concept.label = record
                .get(label_idx)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            if let Some(idx) = synonyms_idx {
                let syns: Vec<String> = record
                    .get(idx)
                    .unwrap_or("")
                    .split('|')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                if !syns.is_empty() {
                    concept.synonyms = Some(syns);
                }
            }
            if let Some(idx) = definition_idx {
                concept.definition = record
                    .get(idx)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
            }
            concept.status = ConceptStatus::Active;
            concepts.push(concept);

            for parent in record.get(parents_idx).unwrap_or("").split('|') {
                if let Some(parent_id) = omim_number(parent) {
                    graph.add_edge(id.clone(), parent_id, RelationshipLabel::IsA);
                }
            }

            if let Some(idx) = moved_from_idx {
                for old in record.get(idx).unwrap_or("").split('|') {
                    if let Some(old_id) = omim_number(old) {
                        graph.add_edge(old_id, id.clone(), RelationshipLabel::ReplacedBy);
                    }
                }
            }
        }

        Ok(ParsedVocabulary {
            concepts,
            graph,
            cross_annotations: Vec::new(),
        })
    }
}

/// `http://purl.bioontology.org/ontology/OMIM/269700` -> `269700`. Also
/// accepts a bare number.
fn omim_number(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        trimmed
            .rsplit('/')
            .next()
            .unwrap_or(trimmed)
            .to_string(),
    )
}

fn col(headers: &csv::StringRecord, name: &str) -> BtsResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| BtsError::ParseError {
            file: "omim/omim.csv".to_string(),
            line: 0,
            message: format!("missing column {name}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path) {
        std::fs::create_dir_all(dir.join("omim")).unwrap();
        let mut f = std::fs::File::create(dir.join("omim/omim.csv")).unwrap();
        writeln!(f, "Class ID,Preferred Label,Synonyms,Definitions,Parents,Moved from").unwrap();
        writeln!(
            f,
            "http://purl.bioontology.org/ontology/OMIM/269700,Meckel syndrome,Dysencephalia splanchnocystica,A rare disease.,http://purl.bioontology.org/ontology/OMIM/100000,http://purl.bioontology.org/ontology/OMIM/249000"
        )
        .unwrap();
    }

    #[test]
    fn parses_concept_with_is_a_and_replaced_by_edges() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path());

        let parsed = OmimLoader.parse(dir.path()).unwrap();
        assert_eq!(parsed.concepts.len(), 1);
        assert_eq!(parsed.concepts[0].concept_id, "269700");
        assert_eq!(parsed.concepts[0].label.as_deref(), Some("Meckel syndrome"));

        assert!(parsed
            .graph
            .edges
            .iter()
            .any(|e| e.from_concept_id == "269700"
                && e.to_concept_id == "100000"
                && e.label == RelationshipLabel::IsA));
        assert!(parsed
            .graph
            .edges
            .iter()
            .any(|e| e.from_concept_id == "249000"
                && e.to_concept_id == "269700"
                && e.label == RelationshipLabel::ReplacedBy));
    }
}
