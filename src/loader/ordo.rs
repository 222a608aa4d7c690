//! Orphanet Rare Disease Ontology loader (spec §4.1).
//!
//! `ordo.owl`'s `rdfs:subClassOf rdf:resource=...` is already child→parent,
//! so direct parents need no reversal. Two restriction shapes matter:
//! `BFO_0000050` (part_of) is folded into IS_A per the vocabulary table,
//! and `Orphanet_C056` (moved_to) becomes a REPLACED_BY edge, deprecated →
//! successor.

use std::path::Path;

use async_trait::async_trait;

use super::owl::parse_owl_classes;
use super::{LoaderMetadata, ParsedVocabulary, VocabularyLoader};
use crate::config::Config;
use crate::download;
use crate::error::BtsResult;
use crate::model::{
    Concept, ConceptStatus, InternalGraph, Prefix, RelationshipLabel, SimilarityMethod,
};

const ORDO_OWL_URL: &str =
    "https://www.orphadata.com/data/ontologies/ordo/last_version/ORDO_en_4.4.owl";
const ORDO_IRI_PREFIX: &str = "http://www.orphadata.org/ORDO/Orphanet_";
const PART_OF_PROPERTY: &str = "http://www.orphadata.org/ORDO/Orphanet_C016";
const MOVED_TO_PROPERTY: &str = "http://www.orphadata.org/ORDO/Orphanet_C056";

pub struct OrdoLoader;

#[async_trait]
impl VocabularyLoader for OrdoLoader {
    fn metadata(&self) -> LoaderMetadata {
        LoaderMetadata {
            prefix: Prefix::Ordo,
            name: "ordo",
            file_paths: vec!["ordo/ordo.owl".to_string()],
            annotations: vec![Prefix::HgncSymbol, Prefix::Hpo, Prefix::Omim, Prefix::Snomed],
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
        download::download_file(client, ORDO_OWL_URL, &config.data_dir, "ordo/ordo.owl", None)
            .await
    }

    fn parse(&self, data_dir: &Path) -> BtsResult<ParsedVocabulary> {
        let file = std::fs::File::open(data_dir.join("ordo/ordo.owl"))?;
        let classes = parse_owl_classes(std::io::BufReader::new(file))?;

        let mut concepts = Vec::new();
        let mut graph = InternalGraph::new();

        for class in &classes {
            let Some(id) = ordo_id(&class.iri) else {
                continue;
            };

            let mut concept = Concept::new(Prefix::Ordo, id.clone());
            concept.concept_types = vec!["Class".to_string()];
            concept.label = class.label.clone();
            concept.definition = class.definition.clone();
            concept.comment = class.comment.clone();
            concept.status = if class.deprecated {
                ConceptStatus::Deprecated
            } else {
                ConceptStatus::Active
            };
            concepts.push(concept);

            for parent in &class.sub_class_of {
                if let Some(parent_id) = ordo_id(parent) {
                    graph.add_edge(id.clone(), parent_id, RelationshipLabel::IsA);
                }
            }

            for restriction in &class.restrictions {
                let Some(target_id) = ordo_id(&restriction.target) else {
                    continue;
                };
                if restriction.property == PART_OF_PROPERTY {
                    graph.add_edge(id.clone(), target_id, RelationshipLabel::IsA);
                } else if restriction.property == MOVED_TO_PROPERTY {
                    graph.add_edge(id.clone(), target_id, RelationshipLabel::ReplacedBy);
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

fn ordo_id(iri: &str) -> Option<String> {
    iri.strip_prefix(ORDO_IRI_PREFIX).map(|s| s.to_string())
}
