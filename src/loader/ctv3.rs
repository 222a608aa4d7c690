//! CTV3 (Read Code Version 3) loader (spec §4.1).
//!
//! Five pipe-delimited, headerless files: `concept.v3` (status),
//! `term.v3` (term text in three max-length variants, longest preferred),
//! `description.v3` (links a concept to its terms, marking exactly one
//! preferred per concept when present), `hierarchy.v3` (child|parent,
//! already canonical direction) and `redundancy.map` (old|current,
//! becomes REPLACED_BY old → current). `hierarchy.v3`/`redundancy.map`
//! can reference concept ids with no `concept.v3`/`description.v3` row;
//! those get bare, label-less concepts rather than being dropped.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use super::{LoaderMetadata, ParsedVocabulary, VocabularyLoader};
use crate::config::Config;
use crate::download;
use crate::error::BtsResult;
use crate::model::{
    Concept, ConceptStatus, InternalGraph, Prefix, RelationshipLabel, SimilarityMethod,
    VocabularyExtra,
};

const NHS_TRUD_CTV3_ITEM: &str = "100";
const TRUD_RELEASE_API: &str = "https://isd.digital.nhs.uk/trud/api/v1/keys";

pub struct Ctv3Loader;

#[async_trait]
impl VocabularyLoader for Ctv3Loader {
    fn metadata(&self) -> LoaderMetadata {
        LoaderMetadata {
            prefix: Prefix::Ctv3,
            name: "ctv3",
            file_paths: vec![
                "ctv3/concept.v3".to_string(),
                "ctv3/term.v3".to_string(),
                "ctv3/description.v3".to_string(),
                "ctv3/hierarchy.v3".to_string(),
                "ctv3/redundancy.map".to_string(),
            ],
            annotations: vec![Prefix::Snomed],
            similarity_methods: vec![],
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
            .nhs_trud_api_key
            .as_ref()
            .ok_or_else(|| crate::error::BtsError::MissingCredential(
                "nhs_trud_api_key".to_string(),
            ))?;

        let resource_url =
            format!("{TRUD_RELEASE_API}/{api_key}/items/{NHS_TRUD_CTV3_ITEM}/releases?latest");
        let archive_url = download::trud_release_url(client, &resource_url).await?;

        download::download_and_extract_zip(
            client,
            &archive_url,
            &config.data_dir,
            &[
                ("*/Concept.v3", "ctv3/concept.v3"),
                ("*/Term.v3", "ctv3/term.v3"),
                ("*/Description.v3", "ctv3/description.v3"),
                ("*/Hierarchy.v3", "ctv3/hierarchy.v3"),
                ("*/Redundancy.map", "ctv3/redundancy.map"),
            ],
        )
        .await
    }

    fn parse(&self, data_dir: &Path) -> BtsResult<ParsedVocabulary> {
        let terms = parse_term_file(&data_dir.join("ctv3/term.v3"))?;
        let descriptions = parse_description_file(&data_dir.join("ctv3/description.v3"), &terms)?;
        let statuses = parse_concept_file(&data_dir.join("ctv3/concept.v3"))?;

        let mut graph = InternalGraph::new();
        let mut all_ids: HashMap<String, ()> = HashMap::new();
        for id in statuses.keys() {
            all_ids.insert(id.clone(), ());
        }
        for id in descriptions.keys() {
            all_ids.insert(id.clone(), ());
        }

        for (line, result) in lines(&data_dir.join("ctv3/hierarchy.v3"))?.into_iter().enumerate() {
            let mut parts = result.split('|');
            let child = parts.next().unwrap_or("").to_string();
            let parent = parts.next().unwrap_or("").to_string();
            if child.is_empty() || parent.is_empty() {
                continue;
            }
            let _ = line;
            all_ids.insert(child.clone(), ());
            all_ids.insert(parent.clone(), ());
            graph.add_edge(child, parent, RelationshipLabel::IsA);
        }

        for result in lines(&data_dir.join("ctv3/redundancy.map"))? {
            let mut parts = result.split('|');
            let old = parts.next().unwrap_or("").to_string();
            let current = parts.next().unwrap_or("").to_string();
            if old.is_empty() || current.is_empty() {
                continue;
            }
            all_ids.insert(old.clone(), ());
            all_ids.insert(current.clone(), ());
            graph.add_edge(old, current, RelationshipLabel::ReplacedBy);
        }

        let mut concepts = Vec::new();
        for id in all_ids.keys() {
            let mut concept = Concept::new(Prefix::Ctv3, id.clone());
            concept.concept_types = vec!["Class".to_string()];
            concept.status = statuses.get(id).copied().unwrap_or(ConceptStatus::Active);

            if let Some(rows) = descriptions.get(id) {
                if let Some(preferred) = rows.iter().find(|(_, is_preferred)| *is_preferred) {
                    concept.label = Some(preferred.0.clone());
                    let synonyms: Vec<String> = rows
                        .iter()
                        .filter(|(text, is_preferred)| !*is_preferred && text != &preferred.0)
                        .map(|(text, _)| text.clone())
                        .collect();
                    concept.synonyms = Some(synonyms);
                } else if let Some((first_text, _)) = rows.first() {
                    concept.label = Some(first_text.clone());
                    concept.synonyms = Some(rows.iter().map(|(t, _)| t.clone()).collect());
                }
            }
            concept.extra = VocabularyExtra::Ctv3 {
                term_status: if concept.status == ConceptStatus::Active {
                    "C".to_string()
                } else {
                    "R".to_string()
                },
            };
            concepts.push(concept);
        }

        Ok(ParsedVocabulary {
            concepts,
            graph,
            cross_annotations: Vec::new(),
        })
    }
}

fn lines(path: &Path) -> BtsResult<Vec<String>> {
    Ok(std::fs::read_to_string(path)?
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// TermID -> longest non-empty text variant, preferring the 198-char form.
fn parse_term_file(path: &Path) -> BtsResult<HashMap<String, String>> {
    let mut terms = HashMap::new();
    for line in lines(path)? {
        let mut parts = line.split('|');
        let term_id = parts.next().unwrap_or("").to_string();
        let term_198 = parts.next().unwrap_or("");
        let term_60 = parts.next().unwrap_or("");
        let term_30 = parts.next().unwrap_or("");
        if term_id.is_empty() {
            continue;
        }
        let text = [term_198, term_60, term_30]
            .into_iter()
            .find(|t| !t.is_empty())
            .unwrap_or("")
            .to_string();
        terms.insert(term_id, text);
    }
    Ok(terms)
}

/// ConceptID -> Vec<(text, is_preferred)>.
fn parse_description_file(
    path: &Path,
    terms: &HashMap<String, String>,
) -> BtsResult<HashMap<String, Vec<(String, bool)>>> {
    let mut descriptions: HashMap<String, Vec<(String, bool)>> = HashMap::new();
    for line in lines(path)? {
        let mut parts = line.split('|');
        let _description_id = parts.next().unwrap_or("");
        let concept_id = parts.next().unwrap_or("").to_string();
        let term_id = parts.next().unwrap_or("");
        let description_type = parts.next().unwrap_or("");
        if concept_id.is_empty() {
            continue;
        }
        let Some(text) = terms.get(term_id) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        descriptions
            .entry(concept_id)
            .or_default()
            .push((text.clone(), description_type == "P"));
    }
    Ok(descriptions)
}

fn parse_concept_file(path: &Path) -> BtsResult<HashMap<String, ConceptStatus>> {
    let mut statuses = HashMap::new();
    for line in lines(path)? {
        let mut parts = line.split('|');
        let concept_id = parts.next().unwrap_or("").to_string();
        let status = parts.next().unwrap_or("");
        if concept_id.is_empty() {
            continue;
        }
        statuses.insert(
            concept_id,
            if status == "C" {
                ConceptStatus::Active
            } else {
                ConceptStatus::Deprecated
            },
        );
    }
    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_files(dir: &Path) {
        std::fs::create_dir_all(dir.join("ctv3")).unwrap();
        std::fs::write(dir.join("ctv3/concept.v3"), "X1234|C\nX5678|R\n").unwrap();
        let mut term = std::fs::File::create(dir.join("ctv3/term.v3")).unwrap();
        writeln!(term, "T1|Diabetes mellitus type 2|Diabetes T2|DM2").unwrap();
        writeln!(term, "T2|Type 2 diabetes|T2 diabetes|T2DM").unwrap();
        writeln!(term, "T3|Bare synonym only||").unwrap();
        std::fs::write(
            dir.join("ctv3/description.v3"),
            "D1|X1234|T1|P\nD2|X1234|T2|S\nD3|X9999|T3|S\n",
        )
        .unwrap();
        std::fs::write(dir.join("ctv3/hierarchy.v3"), "X1234|X0001\n").unwrap();
        std::fs::write(dir.join("ctv3/redundancy.map"), "X5678|X1234\n").unwrap();
    }

    #[test]
    fn preferred_description_becomes_label_others_become_synonyms() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path());

        let parsed = Ctv3Loader.parse(dir.path()).unwrap();
        let concept = parsed.concepts.iter().find(|c| c.concept_id == "X1234").unwrap();
        assert_eq!(concept.label.as_deref(), Some("Diabetes mellitus type 2"));
        assert_eq!(concept.synonyms, Some(vec!["Type 2 diabetes".to_string()]));
    }

    #[test]
    fn no_preferred_row_promotes_first_synonym_as_label_and_keeps_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path());

        let parsed = Ctv3Loader.parse(dir.path()).unwrap();
        let concept = parsed.concepts.iter().find(|c| c.concept_id == "X9999").unwrap();
        assert_eq!(concept.label.as_deref(), Some("Bare synonym only"));
        assert_eq!(
            concept.synonyms,
            Some(vec!["Bare synonym only".to_string()])
        );
    }

    #[test]
    fn hierarchy_and_redundancy_produce_bare_concepts_for_unseen_ids() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path());

        let parsed = Ctv3Loader.parse(dir.path()).unwrap();
        assert!(parsed.concepts.iter().any(|c| c.concept_id == "X0001" && c.label.is_none()));
        assert!(parsed.graph.edges.iter().any(|e| e.from_concept_id == "X1234"
            && e.to_concept_id == "X0001"
            && e.label == RelationshipLabel::IsA));
        assert!(parsed.graph.edges.iter().any(|e| e.from_concept_id == "X5678"
            && e.to_concept_id == "X1234"
            && e.label == RelationshipLabel::ReplacedBy));
    }
}
