//! SNOMED CT loader (spec §4.1).
//!
//! Three independent TRUD releases — international edition, UK clinical
//! extension, UK drug extension — are downloaded separately but merged
//! into a single vocabulary: later releases override earlier ones on
//! concept id collision (international, then uk_clinical, then uk_drug).
//! Concept/Description/Relationship snapshot files are RF2 and must be
//! deduplicated by max `effectiveTime` before use.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use super::rf2;
use super::{LoaderMetadata, ParsedVocabulary, VocabularyLoader};
use crate::config::Config;
use crate::download;
use crate::error::{BtsError, BtsResult};
use crate::model::{Concept, ConceptStatus, InternalGraph, Prefix, RelationshipLabel, SimilarityMethod, VocabularyExtra};

const TRUD_RELEASE_API: &str = "https://isd.digital.nhs.uk/trud/api/v1/keys";

const FULLY_DEFINED_ID: &str = "900000000000073002";
const IS_A_TYPE_ID: &str = "116680003";
const REPLACED_BY_TYPE_ID: &str = "370124000";

struct Release {
    name: &'static str,
    trud_item_id: &'static str,
}

const RELEASES: [Release; 3] = [
    Release {
        name: "international",
        trud_item_id: "4",
    },
    Release {
        name: "uk_clinical",
        trud_item_id: "101",
    },
    Release {
        name: "uk_drug",
        trud_item_id: "105",
    },
];

pub struct SnomedLoader;

#[async_trait]
impl VocabularyLoader for SnomedLoader {
    fn metadata(&self) -> LoaderMetadata {
        LoaderMetadata {
            prefix: Prefix::Snomed,
            name: "snomed",
            file_paths: RELEASES
                .iter()
                .flat_map(|r| {
                    [
                        format!("snomed/{}/concept.txt", r.name),
                        format!("snomed/{}/description.txt", r.name),
                        format!("snomed/{}/relationship.txt", r.name),
                    ]
                })
                .collect(),
            annotations: vec![Prefix::Ctv3, Prefix::Ordo],
            similarity_methods: vec![SimilarityMethod::Relevance, SimilarityMethod::CoAnnotation],
        }
    }

    async fn download(&self, client: &reqwest::Client, config: &Config) -> BtsResult<()> {
        let api_key = config
            .nhs_trud_api_key
            .as_ref()
            .ok_or_else(|| BtsError::MissingCredential("nhs_trud_api_key".to_string()))?;

        for release in &RELEASES {
            let file_mapping = [
                ("sct2_Concept_Snapshot_*.txt", "concept.txt"),
                ("sct2_Description_Snapshot-en_*.txt", "description.txt"),
                ("sct2_Relationship_Snapshot_*.txt", "relationship.txt"),
            ];
            let dest_dir = config.data_dir.join("snomed").join(release.name);
            let already_present = file_mapping
                .iter()
                .all(|(_, dest)| dest_dir.join(dest).exists());
            if already_present {
                continue;
            }

            let resource_url = format!(
                "{TRUD_RELEASE_API}/{api_key}/items/{}/releases?latest",
                release.trud_item_id
            );
            let archive_url = download::trud_release_url(client, &resource_url).await?;

            let mapping: Vec<(&str, &str)> = file_mapping
                .iter()
                .map(|(pattern, dest)| {
                    (
                        *pattern,
                        Box::leak(
                            format!("snomed/{}/{}", release.name, dest).into_boxed_str(),
                        ) as &str,
                    )
                })
                .collect();

            download::download_and_extract_zip(client, &archive_url, &config.data_dir, &mapping)
                .await?;
        }
        Ok(())
    }

    fn parse(&self, data_dir: &Path) -> BtsResult<ParsedVocabulary> {
        let mut merged: HashMap<String, Concept> = HashMap::new();
        let mut graph = InternalGraph::new();

        for release in &RELEASES {
            let dir = data_dir.join("snomed").join(release.name);
            if !dir.join("concept.txt").exists() {
                continue;
            }
            parse_release(&dir, &mut merged, &mut graph)?;
        }

        Ok(ParsedVocabulary {
            concepts: merged.into_values().collect(),
            graph,
            cross_annotations: Vec::new(),
        })
    }
}

fn parse_release(
    dir: &Path,
    merged: &mut HashMap<String, Concept>,
    graph: &mut InternalGraph,
) -> BtsResult<()> {
    let (concept_headers, concept_rows) = rf2::read_deduplicated(&dir.join("concept.txt"))?;
    let active_idx = col(&concept_headers, "active")?;
    let id_idx = col(&concept_headers, "id")?;
    let def_status_idx = col(&concept_headers, "definitionStatusId")?;

    for row in &concept_rows {
        let id = row.get(id_idx).unwrap_or("").to_string();
        let active = row.get(active_idx).unwrap_or("0") == "1";
        let fully_defined = row.get(def_status_idx).unwrap_or("") == FULLY_DEFINED_ID;

        let mut concept = Concept::new(Prefix::Snomed, id.clone());
        concept.concept_types = vec!["Class".to_string()];
        concept.status = if active {
            ConceptStatus::Active
        } else {
            ConceptStatus::Deprecated
        };
        concept.extra = VocabularyExtra::Snomed { fully_defined };
        merged.insert(id, concept);
    }

    let (desc_headers, desc_rows) = rf2::read_deduplicated(&dir.join("description.txt"))?;
    let desc_concept_idx = col(&desc_headers, "conceptId")?;
    let desc_term_idx = col(&desc_headers, "term")?;
    let desc_type_idx = col(&desc_headers, "typeId")?;
    let desc_active_idx = col(&desc_headers, "active")?;

    const FSN_TYPE_ID: &str = "900000000000003001";
    const SYNONYM_TYPE_ID: &str = "900000000000013009";

    for row in &desc_rows {
        if row.get(desc_active_idx).unwrap_or("0") != "1" {
            continue;
        }
        let concept_id = row.get(desc_concept_idx).unwrap_or("");
        let term = row.get(desc_term_idx).unwrap_or("").to_string();
        let type_id = row.get(desc_type_idx).unwrap_or("");

        if let Some(concept) = merged.get_mut(concept_id) {
            if type_id == FSN_TYPE_ID && concept.label.is_none() {
                concept.label = Some(term);
            } else if type_id == SYNONYM_TYPE_ID {
                concept.synonyms.get_or_insert_with(Vec::new).push(term);
            }
        }
    }

    let (rel_headers, rel_rows) = rf2::read_deduplicated(&dir.join("relationship.txt"))?;
    let rel_active_idx = col(&rel_headers, "active")?;
    let rel_source_idx = col(&rel_headers, "sourceId")?;
    let rel_dest_idx = col(&rel_headers, "destinationId")?;
    let rel_type_idx = col(&rel_headers, "typeId")?;

    for row in &rel_rows {
        if row.get(rel_active_idx).unwrap_or("0") != "1" {
            continue;
        }
        let source = row.get(rel_source_idx).unwrap_or("").to_string();
        let dest = row.get(rel_dest_idx).unwrap_or("").to_string();
        let type_id = row.get(rel_type_idx).unwrap_or("");

        if type_id == IS_A_TYPE_ID {
            graph.add_edge(source, dest, RelationshipLabel::IsA);
        } else if type_id == REPLACED_BY_TYPE_ID {
            graph.add_edge(source, dest, RelationshipLabel::ReplacedBy);
        }
    }

    Ok(())
}

fn col(headers: &csv::StringRecord, name: &str) -> BtsResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| BtsError::ParseError {
            file: "snomed".to_string(),
            line: 0,
            message: format!("missing column {name}"),
        })
}
