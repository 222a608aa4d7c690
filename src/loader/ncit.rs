//! NCI Thesaurus loader (spec §4.1).
//!
//! The NCIt flat file is tab-delimited with no header row and a fixed
//! nine-column layout: code, pipe-separated parent codes, pipe-separated
//! synonyms (first entry is the preferred name), definition, display
//! name, concept status, semantic type, concept-in-subset flag, and a
//! trailing unused column.

use std::path::Path;

use async_trait::async_trait;

use super::{LoaderMetadata, ParsedVocabulary, VocabularyLoader};
use crate::config::Config;
use crate::download;
use crate::error::BtsResult;
use crate::model::{Concept, ConceptStatus, InternalGraph, Prefix, RelationshipLabel, SimilarityMethod};

const NCIT_URL: &str =
    "https://evs.nci.nih.gov/ftp1/NCI_Thesaurus/Thesaurus.FLAT.zip";
const OBSOLETE_STATUS: &str = "Obsolete_Concept";

const COL_CODE: usize = 0;
const COL_PARENTS: usize = 1;
const COL_SYNONYMS: usize = 2;
const COL_DEFINITION: usize = 3;
const COL_STATUS: usize = 5;

pub struct NcitLoader;

#[async_trait]
impl VocabularyLoader for NcitLoader {
    fn metadata(&self) -> LoaderMetadata {
        LoaderMetadata {
            prefix: Prefix::Ncit,
            name: "ncit",
            file_paths: vec!["ncit/Thesaurus.txt".to_string()],
            annotations: vec![Prefix::HgncSymbol],
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
        download::download_and_extract_zip(
            client,
            NCIT_URL,
            &config.data_dir,
            &[("Thesaurus.txt", "ncit/Thesaurus.txt")],
        )
        .await
    }

    fn parse(&self, data_dir: &Path) -> BtsResult<ParsedVocabulary> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_path(data_dir.join("ncit/Thesaurus.txt"))?;

        let mut concepts = Vec::new();
        let mut graph = InternalGraph::new();

        for (line, result) in reader.records().enumerate() {
            let record = result.map_err(|e| crate::error::BtsError::ParseError {
                file: "ncit/Thesaurus.txt".to_string(),
                line: line + 1,
                message: e.to_string(),
            })?;

            let code = record.get(COL_CODE).unwrap_or("").to_string();
            if code.is_empty() {
                continue;
            }

            let synonyms: Vec<String> = record
                .get(COL_SYNONYMS)
                .unwrap_or("")
                .split('|')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();

            let mut concept = Concept::new(Prefix::Ncit, code.clone());
            concept.concept_types = vec!["Class".to_string()];
            if !synonyms.is_empty() {
                concept.label = Some(synonyms[0].clone());
            }
            concept.synonyms = Some(synonyms.iter().skip(1).cloned().collect());
            let definition = record.get(COL_DEFINITION).unwrap_or("");
            if !definition.is_empty() {
                concept.definition = Some(definition.to_string());
            }
            concept.status = if record.get(COL_STATUS) == Some(OBSOLETE_STATUS) {
                ConceptStatus::Deprecated
            } else {
                ConceptStatus::Active
            };
            concepts.push(concept);

            for parent in record.get(COL_PARENTS).unwrap_or("").split('|') {
                if !parent.is_empty() {
                    graph.add_edge(code.clone(), parent.to_string(), RelationshipLabel::IsA);
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_thesaurus(dir: &Path) {
        std::fs::create_dir_all(dir.join("ncit")).unwrap();
        let mut f = std::fs::File::create(dir.join("ncit/Thesaurus.txt")).unwrap();
        write!(
            f,
            "C9999\tC0001\tNeoplasm|Tumor|Growth\tAn abnormal mass of tissue.\tNeoplasm\t\tTY1\tNo\t\n\
             C0001\t\tAnatomic Structure\t\tAnatomic Structure\t\tTY1\tNo\t\n\
             C8888\tC0001\tOld Term\t\tOld Term\tObsolete_Concept\tTY1\tNo\t\n"
        )
        .unwrap();
    }

    #[test]
    fn parses_label_synonyms_and_is_a_edges() {
        let dir = tempfile::tempdir().unwrap();
        write_thesaurus(dir.path());

        let parsed = NcitLoader.parse(dir.path()).unwrap();
        let neoplasm = parsed.concepts.iter().find(|c| c.concept_id == "C9999").unwrap();
        assert_eq!(neoplasm.label.as_deref(), Some("Neoplasm"));
        assert_eq!(
            neoplasm.synonyms,
            Some(vec!["Tumor".to_string(), "Growth".to_string()])
        );
        assert!(parsed
            .graph
            .edges
            .iter()
            .any(|e| e.from_concept_id == "C9999" && e.to_concept_id == "C0001"));
    }

    #[test]
    fn obsolete_status_marks_concept_deprecated() {
        let dir = tempfile::tempdir().unwrap();
        write_thesaurus(dir.path());

        let parsed = NcitLoader.parse(dir.path()).unwrap();
        let old = parsed.concepts.iter().find(|c| c.concept_id == "C8888").unwrap();
        assert_eq!(old.status, ConceptStatus::Deprecated);
    }
}
