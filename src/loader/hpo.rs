//! Human Phenotype Ontology loader (spec §4.1).
//!
//! `hp.owl` IS_A edges are child→parent already in the source ontology
//! (`rdfs:subClassOf`), so no reversal is needed... except the Python
//! original walks the edges the other way when it builds its own graph
//! (`hpo_graph.add_edge(parent, child)`), so here we store the direction
//! `rdfs:subClassOf` actually encodes: child → parent. Obsolete classes'
//! `hasAlternativeId`/`consider` annotations become REPLACED_BY edges
//! (deprecated → successor) merged into the same graph.

use std::path::Path;

use async_trait::async_trait;

use super::owl::parse_owl_classes;
use crate::config::Config;
use crate::download;
use crate::error::BtsResult;
use crate::model::{
    Concept, ConceptStatus, InternalGraph, Prefix, RelationshipLabel, SimilarityMethod,
};
use super::{LoaderMetadata, ParsedVocabulary, VocabularyLoader};

const HPO_OWL_URL: &str = "https://purl.obolibrary.org/obo/hp.owl";
const HP_IRI_PREFIX: &str = "http://purl.obolibrary.org/obo/HP_";

pub struct HpoLoader;

#[async_trait]
impl VocabularyLoader for HpoLoader {
    fn metadata(&self) -> LoaderMetadata {
        LoaderMetadata {
            prefix: Prefix::Hpo,
            name: "hpo",
            file_paths: vec!["hpo/hp.owl".to_string()],
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
        download::download_file(client, HPO_OWL_URL, &config.data_dir, "hpo/hp.owl", None).await
    }

    fn parse(&self, data_dir: &Path) -> BtsResult<ParsedVocabulary> {
        let file = std::fs::File::open(data_dir.join("hpo/hp.owl"))?;
        let classes = parse_owl_classes(std::io::BufReader::new(file))?;

        let mut concepts = Vec::new();
        let mut graph = InternalGraph::new();

        for class in &classes {
            let Some(id) = hp_id(&class.iri) else {
                continue;
            };

            let mut concept = Concept::new(Prefix::Hpo, id.clone());
            concept.concept_types = vec!["Class".to_string()];
            concept.label = class.label.clone();
            concept.definition = class.definition.clone();
            concept.comment = class.comment.clone();
            // HPO synonyms are always populated, even if empty, matching
            // the original loader's `synonyms=[]` default.
            concept.synonyms = Some(class.synonyms.clone());
            concept.status = if class.deprecated {
                ConceptStatus::Deprecated
            } else {
                ConceptStatus::Active
            };
            concepts.push(concept);

            for parent in &class.sub_class_of {
                if let Some(parent_id) = hp_id(parent) {
                    graph.add_edge(id.clone(), parent_id, RelationshipLabel::IsA);
                }
            }

            for alt_id in &class.alternative_ids {
                let alt_id = alt_id.trim_start_matches("HP:").to_string();
                graph.add_edge(alt_id, id.clone(), RelationshipLabel::ReplacedBy);
            }
            for considered in &class.consider {
                if let Some(successor) = hp_id(considered) {
                    graph.add_edge(id.clone(), successor, RelationshipLabel::ReplacedBy);
                } else {
                    let successor = considered.trim_start_matches("HP:").to_string();
                    graph.add_edge(id.clone(), successor, RelationshipLabel::ReplacedBy);
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

/// `http://purl.obolibrary.org/obo/HP_0000118` -> `0000118`. Also accepts
/// the bare `HP:0000118` form used in `hasAlternativeId`/`consider` text.
fn hp_id(iri: &str) -> Option<String> {
    if let Some(rest) = iri.strip_prefix(HP_IRI_PREFIX) {
        return Some(rest.to_string());
    }
    if let Some(rest) = iri.strip_prefix("HP:") {
        return Some(rest.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_hpo_owl(dir: &Path) {
        std::fs::create_dir_all(dir.join("hpo")).unwrap();
        let mut f = std::fs::File::create(dir.join("hpo/hp.owl")).unwrap();
        write!(
            f,
            r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                     xmlns:rdfs="http://www.w3.org/2000/01/rdf-schema#"
                     xmlns:owl="http://www.w3.org/2002/07/owl#"
                     xmlns:oboInOwl="http://www.geneontology.org/formats/oboInOwl#">
              <owl:Class rdf:about="http://purl.obolibrary.org/obo/HP_0000118">
                <rdfs:label>Phenotypic abnormality</rdfs:label>
              </owl:Class>
              <owl:Class rdf:about="http://purl.obolibrary.org/obo/HP_0001250">
                <rdfs:label>Seizure</rdfs:label>
                <rdfs:subClassOf rdf:resource="http://purl.obolibrary.org/obo/HP_0000118"/>
              </owl:Class>
              <owl:Class rdf:about="http://purl.obolibrary.org/obo/HP_0009999">
                <owl:deprecated>true</owl:deprecated>
                <oboInOwl:consider>HP:0001250</oboInOwl:consider>
              </owl:Class>
            </rdf:RDF>"#
        )
        .unwrap();
    }

    #[test]
    fn parses_concepts_and_is_a_edges_child_to_parent() {
        let dir = tempfile::tempdir().unwrap();
        write_hpo_owl(dir.path());

        let parsed = HpoLoader.parse(dir.path()).unwrap();
        assert_eq!(parsed.concepts.len(), 3);

        let seizure = parsed
            .concepts
            .iter()
            .find(|c| c.concept_id == "0001250")
            .unwrap();
        assert_eq!(seizure.label.as_deref(), Some("Seizure"));
        assert_eq!(seizure.synonyms, Some(vec![]));

        assert!(parsed.graph.edges.iter().any(|e| e.from_concept_id == "0001250"
            && e.to_concept_id == "0000118"
            && e.label == RelationshipLabel::IsA));
    }

    #[test]
    fn obsolete_class_produces_replaced_by_edge() {
        let dir = tempfile::tempdir().unwrap();
        write_hpo_owl(dir.path());

        let parsed = HpoLoader.parse(dir.path()).unwrap();
        let deprecated = parsed
            .concepts
            .iter()
            .find(|c| c.concept_id == "0009999")
            .unwrap();
        assert_eq!(deprecated.status, ConceptStatus::Deprecated);

        assert!(parsed.graph.edges.iter().any(|e| e.from_concept_id == "0009999"
            && e.to_concept_id == "0001250"
            && e.label == RelationshipLabel::ReplacedBy));
    }
}
