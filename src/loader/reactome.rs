//! Reactome pathway database loader (spec §4.1).
//!
//! Reads eight pre-exported CSVs rather than Reactome's graph database
//! directly: `pathway.csv`, `reaction.csv`, `gene.csv` (concepts),
//! `pathway_hierarchy.csv` (pathway PART_OF pathway), `reaction_pathway.csv`
//! (reaction PART_OF pathway), `reaction_order.csv` (later reaction
//! PRECEDED_BY earlier reaction), `gene_reaction.csv` (gene↔reaction edge,
//! labeled by the CSV's own `relationship` column rather than a fixed
//! PART_OF), and `gene_mapping.csv` (gene → HGNC_SYMBOL annotation).

use std::path::Path;

use async_trait::async_trait;

use super::{LoaderMetadata, ParsedVocabulary, VocabularyLoader};
use crate::config::Config;
use crate::error::BtsResult;
use crate::model::{
    Annotation, Concept, ConceptStatus, InternalGraph, Prefix, RelationshipLabel,
    SimilarityMethod, VocabularyExtra, ANNOTATION_TYPE_HAS_SYMBOL,
};

pub struct ReactomeLoader;

#[async_trait]
impl VocabularyLoader for ReactomeLoader {
    fn metadata(&self) -> LoaderMetadata {
        LoaderMetadata {
            prefix: Prefix::Reactome,
            name: "reactome",
            file_paths: vec![
                "reactome/pathway.csv".to_string(),
                "reactome/reaction.csv".to_string(),
                "reactome/gene.csv".to_string(),
                "reactome/pathway_hierarchy.csv".to_string(),
                "reactome/reaction_pathway.csv".to_string(),
                "reactome/reaction_order.csv".to_string(),
                "reactome/gene_reaction.csv".to_string(),
                "reactome/gene_mapping.csv".to_string(),
            ],
            annotations: vec![Prefix::HgncSymbol],
            similarity_methods: vec![],
        }
    }

    async fn download(&self, _client: &reqwest::Client, _config: &Config) -> BtsResult<()> {
        // Reactome is ingested from a curated CSV export rather than a
        // network resource this loader fetches itself; the files are
        // expected to already be present under `data_dir/reactome/`.
        Ok(())
    }

    fn parse(&self, data_dir: &Path) -> BtsResult<ParsedVocabulary> {
        let base = data_dir.join("reactome");
        let mut concepts = Vec::new();
        let mut graph = InternalGraph::new();
        let mut cross_annotations = Vec::new();

        parse_node_csv(&base.join("pathway.csv"), "pathway", &mut concepts)?;
        parse_reaction_csv(&base.join("reaction.csv"), &mut concepts)?;
        parse_node_csv(&base.join("gene.csv"), "gene", &mut concepts)?;

        parse_edge_csv(
            &base.join("pathway_hierarchy.csv"),
            RelationshipLabel::PartOf,
            &mut graph,
        )?;
        parse_edge_csv(
            &base.join("reaction_pathway.csv"),
            RelationshipLabel::PartOf,
            &mut graph,
        )?;

        let mut reader = csv::Reader::from_path(base.join("reaction_order.csv"))?;
        for result in reader.records() {
            let record = result?;
            let earlier = record.get(0).unwrap_or("").to_string();
            let later = record.get(1).unwrap_or("").to_string();
            if !earlier.is_empty() && !later.is_empty() {
                graph.add_edge(later, earlier, RelationshipLabel::PrecededBy);
            }
        }

        let mut reader = csv::Reader::from_path(base.join("gene_reaction.csv"))?;
        for result in reader.records() {
            let record = result?;
            let gene_id = record.get(0).unwrap_or("").to_string();
            let reaction_id = record.get(1).unwrap_or("").to_string();
            let relationship = record.get(2).unwrap_or("");
            if gene_id.is_empty() || reaction_id.is_empty() {
                continue;
            }
            let label = relationship_from_str(relationship);
            graph.add_edge(gene_id, reaction_id, label);
        }

        let mut reader = csv::Reader::from_path(base.join("gene_mapping.csv"))?;
        for result in reader.records() {
            let record = result?;
            let gene_id = record.get(0).unwrap_or("");
            let symbol = record.get(1).unwrap_or("");
            if gene_id.is_empty() || symbol.is_empty() {
                continue;
            }
            cross_annotations.push(
                Annotation::new(Prefix::Reactome, gene_id, Prefix::HgncSymbol, symbol)
                    .with_type(ANNOTATION_TYPE_HAS_SYMBOL),
            );
        }

        Ok(ParsedVocabulary {
            concepts,
            graph,
            cross_annotations,
        })
    }
}

fn relationship_from_str(s: &str) -> RelationshipLabel {
    match s.to_ascii_uppercase().as_str() {
        "IS_A" => RelationshipLabel::IsA,
        "PART_OF" => RelationshipLabel::PartOf,
        "PRECEDED_BY" => RelationshipLabel::PrecededBy,
        "REPLACED_BY" => RelationshipLabel::ReplacedBy,
        _ => RelationshipLabel::RelatedTo,
    }
}

/// `["Name One","Name Two"]` -> synonyms with the concept's own label
/// removed.
fn parse_synonyms(raw: &str, label: Option<&str>) -> Vec<String> {
    let values: Vec<String> = serde_json::from_str(raw).unwrap_or_default();
    values
        .into_iter()
        .filter(|v| Some(v.as_str()) != label)
        .collect()
}

fn parse_node_csv(path: &Path, concept_type: &str, concepts: &mut Vec<Concept>) -> BtsResult<()> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let id_idx = col(&headers, "id")?;
    let name_idx = col(&headers, "name")?;
    let synonyms_idx = headers.iter().position(|h| h == "synonyms");

    for result in reader.records() {
        let record = result?;
        let id = record.get(id_idx).unwrap_or("").to_string();
        if id.is_empty() {
            continue;
        }
        let label = record.get(name_idx).filter(|s| !s.is_empty()).map(str::to_string);

        let mut concept = Concept::new(Prefix::Reactome, id);
        concept.concept_types = vec![concept_type.to_string()];
        concept.status = ConceptStatus::Active;
        if let Some(idx) = synonyms_idx {
            let raw = record.get(idx).unwrap_or("");
            if !raw.is_empty() {
                concept.synonyms = Some(parse_synonyms(raw, label.as_deref()));
            }
        }
        concept.label = label;
        concepts.push(concept);
    }
    Ok(())
}

fn parse_reaction_csv(path: &Path, concepts: &mut Vec<Concept>) -> BtsResult<()> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let id_idx = col(&headers, "id")?;
    let name_idx = col(&headers, "name")?;
    let synonyms_idx = headers.iter().position(|h| h == "synonyms");
    let inferred_idx = headers.iter().position(|h| h == "inferred");

    for result in reader.records() {
        let record = result?;
        let id = record.get(id_idx).unwrap_or("").to_string();
        if id.is_empty() {
            continue;
        }
        let label = record.get(name_idx).filter(|s| !s.is_empty()).map(str::to_string);

        let mut concept = Concept::new(Prefix::Reactome, id);
        concept.concept_types = vec!["reaction".to_string()];
        concept.status = ConceptStatus::Active;
        if let Some(idx) = synonyms_idx {
            let raw = record.get(idx).unwrap_or("");
            if !raw.is_empty() {
                concept.synonyms = Some(parse_synonyms(raw, label.as_deref()));
            }
        }
        concept.label = label;
        let inferred = inferred_idx
            .and_then(|idx| record.get(idx))
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        concept.extra = VocabularyExtra::Reactome { inferred };
        concepts.push(concept);
    }
    Ok(())
}

fn parse_edge_csv(path: &Path, label: RelationshipLabel, graph: &mut InternalGraph) -> BtsResult<()> {
    let mut reader = csv::Reader::from_path(path)?;
    for result in reader.records() {
        let record = result?;
        let from = record.get(0).unwrap_or("").to_string();
        let to = record.get(1).unwrap_or("").to_string();
        if !from.is_empty() && !to.is_empty() {
            graph.add_edge(from, to, label);
        }
    }
    Ok(())
}

fn col(headers: &csv::StringRecord, name: &str) -> BtsResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| crate::error::BtsError::ParseError {
            file: "reactome".to_string(),
            line: 0,
            message: format!("missing column {name}"),
        })
}
